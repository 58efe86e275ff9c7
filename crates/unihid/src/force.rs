//! Force-effect lifecycle.
//!
//! A [`Force`] is one effect instance bound to one motor of one device. It is
//! created through the device, keeps its parameters locally, and only talks
//! to the hardware on [`write_params`](Force::write_params) /
//! [`set_active`](Force::set_active). When its parent device disconnects the
//! force is *orphaned*: the parent link is severed, the status drops to
//! inactive, and every write becomes a no-op, but the identifier, kind,
//! motor index, and parameters stay inspectable. Handles are `Rc<Force>`, so
//! an orphaned force outlives its parent for as long as the caller keeps it.
//!
//! The evented bridge models a single logical motor (index 0) whose gain is
//! a master control applied by the hardware. Aggregates expose the
//! concatenation of their members' motors and forward everything.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::trace;
use unihid_core::effect::translate;
use unihid_core::force::{ForceKind, ForceParams, ForceStatus};

use crate::bridge::{EffectSlot, RawEvent, FF_STATUS_PLAYING, FF_STATUS_STOPPED};
use crate::device::{Device, PhysicalLink, Source};
use crate::registry::{reserve_id, ForceId};

/// One force effect. See the module docs for the lifecycle.
pub struct Force {
    id: ForceId,
    kind: ForceKind,
    motor: u32,
    slot: EffectSlot,
    parent: RefCell<Weak<Device>>,
    params: RefCell<ForceParams>,
    status: Cell<ForceStatus>,
}

impl Force {
    fn new(parent: &Rc<Device>, kind: ForceKind, motor: u32, slot: EffectSlot) -> Rc<Force> {
        Rc::new(Force {
            id: ForceId(reserve_id()),
            kind,
            motor,
            slot,
            parent: RefCell::new(Rc::downgrade(parent)),
            params: RefCell::new(ForceParams::default_for(kind)),
            status: Cell::new(ForceStatus::Unknown),
        })
    }

    /// Runtime-unique identifier, usable with the parent device's force
    /// accessors.
    pub fn id(&self) -> ForceId {
        self.id
    }

    /// The kind this force was created as. Fixed for the force's lifetime.
    pub fn kind(&self) -> ForceKind {
        self.kind
    }

    /// Index of the motor applying this force. Forces created through an
    /// aggregate report the member's motor index, not the aggregate's.
    pub fn motor_index(&self) -> u32 {
        self.motor
    }

    /// The device applying this force; `None` once orphaned. Forces created
    /// through an aggregate report the owning member, not the aggregate.
    pub fn device(&self) -> Option<Rc<Device>> {
        self.parent.borrow().upgrade()
    }

    /// Whether the parent device has disconnected since creation.
    pub fn is_orphaned(&self) -> bool {
        self.parent.borrow().upgrade().is_none()
    }

    /// Last-known playback status. Always inactive once orphaned.
    pub fn status(&self) -> ForceStatus {
        self.status.get()
    }

    /// Copy of the current parameters.
    pub fn params(&self) -> ForceParams {
        *self.params.borrow()
    }

    /// Replaces the stored parameters. The new record is validated against
    /// the creation kind at the next [`write_params`](Self::write_params).
    pub fn set_params(&self, params: ForceParams) {
        *self.params.borrow_mut() = params;
    }

    /// Uploads the current parameters to the hardware.
    ///
    /// Returns `false` without side effects when the force is orphaned or
    /// the stored parameter family no longer matches the creation kind.
    pub fn write_params(&self) -> bool {
        let Some(descriptor) = translate(self.kind, &self.params.borrow()) else {
            return false;
        };
        let Some(dev) = self.device() else {
            return false;
        };
        let Some(link) = dev.source.physical() else {
            return false;
        };
        let mut bridge = link.bridge.borrow_mut();
        let Some(bridge) = bridge.as_mut() else {
            return false;
        };
        bridge.upload_effect(Some(self.slot), &descriptor).is_ok()
    }

    /// Starts or stops the force. Starting implicitly writes the parameters
    /// first; a rejected write leaves the force stopped. Does nothing when
    /// the force is orphaned or already in the requested state.
    pub fn set_active(&self, active: bool) {
        let Some(dev) = self.device() else {
            return;
        };
        if active {
            if self.status.get() == ForceStatus::Active || !self.write_params() {
                return;
            }
            // Condition effects react to position indefinitely; everything
            // else plays a single pass of its envelope.
            let repeat = if self.kind.is_condition() { i32::MAX } else { 1 };
            with_bridge(&dev, |bridge| {
                let _ = bridge.play_effect(self.slot, repeat);
            });
        } else {
            if self.status.get() == ForceStatus::Inactive {
                return;
            }
            with_bridge(&dev, |bridge| {
                let _ = bridge.stop_effect(self.slot);
            });
        }
    }

    /// Starts applying the force.
    pub fn start(&self) {
        self.set_active(true);
    }

    /// Stops applying the force.
    pub fn stop(&self) {
        self.set_active(false);
    }

    /// Severs the parent link. The identifier, kind, motor index, and
    /// parameters remain inspectable.
    pub(crate) fn orphan(&self) {
        *self.parent.borrow_mut() = Weak::new();
        self.status.set(ForceStatus::Inactive);
    }
}

fn with_bridge(dev: &Device, f: impl FnOnce(&mut dyn crate::bridge::DeviceBridge)) {
    if let Some(link) = dev.source.physical() {
        if let Some(bridge) = link.bridge.borrow_mut().as_mut() {
            f(bridge.as_mut());
        }
    }
}

/// Routes a force-status event from the bridge to the owning force.
pub(crate) fn handle_status_event(dev: &Device, link: &PhysicalLink, ev: &RawEvent) {
    let slot = ev.code as EffectSlot;
    let Some(force_id) = link.slot_to_force.borrow().get(&slot).copied() else {
        return;
    };
    if let Some(force) = dev.forces.borrow().get(&force_id) {
        force.status.set(match ev.value {
            FF_STATUS_STOPPED => ForceStatus::Inactive,
            FF_STATUS_PLAYING => ForceStatus::Active,
            _ => ForceStatus::Unknown,
        });
    }
}

/// Orphans every force of a disconnecting device and releases their slots.
/// The force objects stay in the device's table so they remain reachable by
/// id afterwards.
pub(crate) fn orphan_all(dev: &Device, link: &PhysicalLink) {
    let slots: Vec<(EffectSlot, ForceId)> = link.slot_to_force.borrow_mut().drain().collect();
    if slots.is_empty() {
        return;
    }
    let mut bridge = link.bridge.borrow_mut();
    for (slot, force_id) in slots {
        if let Some(bridge) = bridge.as_mut() {
            bridge.erase_effect(slot);
        }
        if let Some(force) = dev.forces.borrow().get(&force_id) {
            force.orphan();
        }
    }
}

impl Device {
    /// Number of motors capable of force effects; 0 when disconnected or
    /// without force support. Aggregates report the total over members.
    pub fn motor_count(&self) -> u32 {
        if !self.is_connected() {
            return 0;
        }
        match &self.source {
            Source::Physical(link) => u32::from(link.force_caps.get().kinds.any()),
            Source::Aggregate(link) => link.motor_map.borrow().len() as u32,
        }
    }

    /// Gain factor in `[0, 1]` applied to all forces on the motor; 0 when
    /// the device is disconnected or the motor does not exist.
    pub fn gain(&self, motor: u32) -> f32 {
        if motor >= self.motor_count() {
            return 0.0;
        }
        match &self.source {
            Source::Physical(link) => link.gain.get(),
            Source::Aggregate(link) => {
                let (member, real_motor) = link.motor_map.borrow()[motor as usize];
                link.members[member].gain(real_motor)
            }
        }
    }

    /// Sets the motor's gain, clamped to `[0, 1]`. Does nothing when the
    /// device is disconnected or the motor does not exist.
    pub fn set_gain(&self, motor: u32, gain: f32) {
        if motor >= self.motor_count() {
            return;
        }
        match &self.source {
            Source::Physical(link) => {
                let gain = gain.clamp(0.0, 1.0);
                link.gain.set(gain);
                if link.force_caps.get().supports_gain {
                    if let Some(bridge) = link.bridge.borrow_mut().as_mut() {
                        bridge.set_master_gain(gain);
                    }
                }
            }
            Source::Aggregate(link) => {
                let (member, real_motor) = link.motor_map.borrow()[motor as usize];
                link.members[member].set_gain(real_motor, gain);
            }
        }
    }

    /// Whether the motor supports forces of `kind`. Always `false` while
    /// disconnected.
    pub fn supports_force(&self, motor: u32, kind: ForceKind) -> bool {
        if motor >= self.motor_count() {
            return false;
        }
        match &self.source {
            Source::Physical(link) => link.force_caps.get().kinds.contains(kind),
            Source::Aggregate(link) => {
                let (member, real_motor) = link.motor_map.borrow()[motor as usize];
                link.members[member].supports_force(real_motor, kind)
            }
        }
    }

    /// Creates a force of `kind` on the motor.
    ///
    /// Fails (returns `None`, no side effects) when the device is
    /// disconnected, the motor does not support the kind, or the node's
    /// effect slots are exhausted; destroy unused forces to free slots.
    /// Aggregates create the force on the owning member and track it so both
    /// the member and the aggregate can manage it.
    pub fn try_create_force(self: &Rc<Self>, motor: u32, kind: ForceKind) -> Option<Rc<Force>> {
        if !self.supports_force(motor, kind) {
            return None;
        }
        match &self.source {
            Source::Physical(link) => {
                let caps = link.force_caps.get();
                if link.slot_to_force.borrow().len() as u32 >= caps.max_effects {
                    return None;
                }
                // Reserve the native slot up front with zeroed parameters of
                // the right family.
                let descriptor = translate(kind, &ForceParams::default_for(kind))?;
                let slot = {
                    let mut bridge = link.bridge.borrow_mut();
                    bridge.as_mut()?.upload_effect(None, &descriptor).ok()?
                };
                let force = Force::new(self, kind, motor, slot);
                trace!(device = %self.id, force = %force.id(), ?kind, "force created");
                link.slot_to_force.borrow_mut().insert(slot, force.id());
                self.forces.borrow_mut().insert(force.id(), Rc::clone(&force));
                Some(force)
            }
            Source::Aggregate(link) => {
                let (member_index, real_motor) = *link.motor_map.borrow().get(motor as usize)?;
                let force = link.members[member_index].try_create_force(real_motor, kind)?;
                link.force_to_member
                    .borrow_mut()
                    .insert(force.id(), member_index);
                Some(force)
            }
        }
    }

    /// Looks up a force created by this device. Works on disconnected
    /// devices and finds orphaned forces.
    pub fn force(&self, id: ForceId) -> Option<Rc<Force>> {
        match &self.source {
            Source::Physical(_) => self.forces.borrow().get(&id).cloned(),
            Source::Aggregate(link) => {
                let member = *link.force_to_member.borrow().get(&id)?;
                link.members[member].force(id)
            }
        }
    }

    /// Destroys a force created by this device: stops it, frees its native
    /// slot, and forgets it. Remaining handles observe it as orphaned.
    pub fn destroy_force(&self, id: ForceId) {
        match &self.source {
            Source::Physical(link) => {
                let Some(force) = self.forces.borrow_mut().remove(&id) else {
                    return;
                };
                if !force.is_orphaned() {
                    link.slot_to_force.borrow_mut().remove(&force.slot);
                    if let Some(bridge) = link.bridge.borrow_mut().as_mut() {
                        bridge.erase_effect(force.slot);
                    }
                    force.orphan();
                }
            }
            Source::Aggregate(link) => {
                let Some(member) = link.force_to_member.borrow_mut().remove(&id) else {
                    return;
                };
                link.members[member].destroy_force(id);
            }
        }
    }

    /// Destroys every force created by this device.
    pub fn destroy_all_forces(&self) {
        match &self.source {
            Source::Physical(_) => {
                let ids: Vec<ForceId> = self.forces.borrow().keys().copied().collect();
                for id in ids {
                    self.destroy_force(id);
                }
            }
            Source::Aggregate(link) => {
                let entries: Vec<(ForceId, usize)> =
                    link.force_to_member.borrow_mut().drain().collect();
                for (id, member) in entries {
                    link.members[member].destroy_force(id);
                }
            }
        }
    }
}
