//! The device model.
//!
//! A [`Device`] is one logical input source with a stable identifier, a
//! connection flag that only changes across update boundaries, and a typed
//! state block holding the replicated input cells. Dispatch over the three
//! device types goes through a tagged variant plus borrow-scoped views
//! ([`Mouse`], [`Keyboard`], [`Gamepad`]) rather than a class hierarchy; the
//! physical-vs-aggregate split is a second tagged variant on the source.
//!
//! All mutable state lives in `Cell`/`RefCell` fields, so devices are shared
//! as `Rc<Device>` handles: the registry owns one, aggregates own one per
//! member, and callers may keep as many as they like. A destroyed device's
//! handles stay valid and simply read as disconnected.

pub(crate) mod gamepad;
pub(crate) mod keyboard;
pub(crate) mod mouse;
pub(crate) mod physical;

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::{SystemTime, UNIX_EPOCH};

use unihid_core::cell::Timestamp;
use unihid_core::DeviceType;

use crate::bridge::{DeviceBridge, EffectSlot, ForceCapabilities, HardwareId, RawEvent};
use crate::force::Force;
use crate::registry::{CallbackId, DeviceId, ForceId, Registry};

pub(crate) use gamepad::GamepadState;
pub(crate) use keyboard::KeyboardState;
pub(crate) use mouse::{MouseAccum, MouseState};

/// Microseconds since the Unix epoch, sampled from the system clock.
pub(crate) fn now_micros() -> Timestamp {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as Timestamp
}

/// Connection to the underlying native node of a physical device.
pub(crate) struct PhysicalLink {
    pub(crate) hardware_id: HardwareId,
    /// Open bridge while connected; `None` while disconnected.
    pub(crate) bridge: RefCell<Option<Box<dyn DeviceBridge>>>,
    /// Events of the current group, waiting for the next sync marker.
    pub(crate) pending: RefCell<Vec<RawEvent>>,
    /// Force capabilities of the connected node; empty while disconnected.
    pub(crate) force_caps: Cell<ForceCapabilities>,
    /// Master gain of the single evented motor.
    pub(crate) gain: Cell<f32>,
    /// Live effect slots, for routing force-status events and slot cleanup.
    pub(crate) slot_to_force: RefCell<HashMap<EffectSlot, ForceId>>,
}

impl PhysicalLink {
    fn new(hardware_id: HardwareId) -> Self {
        Self {
            hardware_id,
            bridge: RefCell::new(None),
            pending: RefCell::new(Vec::with_capacity(16)),
            force_caps: Cell::new(ForceCapabilities::default()),
            gain: Cell::new(0.0),
            slot_to_force: RefCell::new(HashMap::new()),
        }
    }
}

/// Membership data of an aggregate device.
pub(crate) struct AggregateLink {
    pub(crate) members: Vec<Rc<Device>>,
    /// Aggregate motor index -> (member index, member motor index). Rebuilt
    /// on every connected update.
    pub(crate) motor_map: RefCell<Vec<(usize, u32)>>,
    /// Forces created through this aggregate -> owning member index.
    pub(crate) force_to_member: RefCell<HashMap<ForceId, usize>>,
    /// Per-member previous-absolute cache; only populated for mouse
    /// aggregates.
    pub(crate) mouse_prev: RefCell<Vec<MouseAccum>>,
}

/// Where a device's input comes from.
pub(crate) enum Source {
    Physical(PhysicalLink),
    Aggregate(AggregateLink),
}

impl Source {
    pub(crate) fn physical(&self) -> Option<&PhysicalLink> {
        match self {
            Source::Physical(link) => Some(link),
            Source::Aggregate(_) => None,
        }
    }

    pub(crate) fn aggregate(&self) -> Option<&AggregateLink> {
        match self {
            Source::Aggregate(link) => Some(link),
            Source::Physical(_) => None,
        }
    }
}

/// Per-type replicated state.
pub(crate) enum TypedState {
    Mouse(MouseState),
    Keyboard(KeyboardState),
    Gamepad(GamepadState),
}

impl TypedState {
    /// Zeroes every cell and accumulator on the disconnect transition.
    pub(crate) fn reset(&self) {
        match self {
            TypedState::Mouse(state) => state.reset(),
            TypedState::Keyboard(state) => state.reset(),
            TypedState::Gamepad(state) => state.reset(),
        }
    }
}

/// One logical input device.
pub struct Device {
    pub(crate) id: DeviceId,
    pub(crate) device_type: DeviceType,
    pub(crate) connected: Cell<bool>,
    pub(crate) last_update: Cell<Timestamp>,
    /// Callback ids registered through this device, removed in bulk on
    /// destruction.
    pub(crate) attached_callbacks: RefCell<Vec<CallbackId>>,
    /// Forces created by this device (physical devices only; aggregates
    /// track theirs in [`AggregateLink::force_to_member`]).
    pub(crate) forces: RefCell<HashMap<ForceId, Rc<Force>>>,
    pub(crate) source: Source,
    pub(crate) state: TypedState,
}

impl Device {
    pub(crate) fn new_physical(
        id: DeviceId,
        device_type: DeviceType,
        hardware_id: HardwareId,
    ) -> Rc<Device> {
        let state = match device_type {
            DeviceType::Mouse => TypedState::Mouse(MouseState::new_physical()),
            DeviceType::Keyboard => TypedState::Keyboard(KeyboardState::new()),
            DeviceType::Gamepad => TypedState::Gamepad(GamepadState::new_physical()),
            DeviceType::Unknown => unreachable!("no devices are created for unknown sources"),
        };
        Rc::new(Device {
            id,
            device_type,
            connected: Cell::new(false),
            last_update: Cell::new(0),
            attached_callbacks: RefCell::new(Vec::new()),
            forces: RefCell::new(HashMap::new()),
            source: Source::Physical(PhysicalLink::new(hardware_id)),
            state,
        })
    }

    pub(crate) fn new_aggregate(
        id: DeviceId,
        device_type: DeviceType,
        members: Vec<Rc<Device>>,
    ) -> Rc<Device> {
        let member_count = members.len();
        let state = match device_type {
            DeviceType::Mouse => TypedState::Mouse(MouseState::new_aggregate()),
            DeviceType::Keyboard => TypedState::Keyboard(KeyboardState::new()),
            DeviceType::Gamepad => TypedState::Gamepad(GamepadState::new_aggregate()),
            DeviceType::Unknown => unreachable!("aggregation rejects unknown types"),
        };
        Rc::new(Device {
            id,
            device_type,
            connected: Cell::new(false),
            last_update: Cell::new(0),
            attached_callbacks: RefCell::new(Vec::new()),
            forces: RefCell::new(HashMap::new()),
            source: Source::Aggregate(AggregateLink {
                members,
                motor_map: RefCell::new(Vec::new()),
                force_to_member: RefCell::new(HashMap::new()),
                mouse_prev: RefCell::new(vec![MouseAccum::default(); member_count]),
            }),
            state,
        })
    }

    /// Runtime-unique identifier. Unrelated to the hardware; meaningless
    /// beyond the lifetime of the process.
    pub fn id(&self) -> DeviceId {
        self.id
    }

    /// The device's constant type.
    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    /// Last-known connection flag. Only changes across an update boundary.
    /// An aggregate is connected iff all members were connected during its
    /// last update.
    pub fn is_connected(&self) -> bool {
        self.connected.get()
    }

    /// Whether this device is an aggregate over other devices.
    pub fn is_aggregate(&self) -> bool {
        matches!(self.source, Source::Aggregate(_))
    }

    /// Display name from the driver, or empty when disconnected. The format
    /// and encoding are whatever the native layer provides; aggregates
    /// format the member names as `Aggregate{a;b;}`.
    pub fn display_name(&self) -> String {
        if !self.is_connected() {
            return String::new();
        }
        match &self.source {
            Source::Physical(link) => link
                .bridge
                .borrow()
                .as_ref()
                .map(|bridge| bridge.display_name())
                .unwrap_or_default(),
            Source::Aggregate(link) => {
                let mut name = String::from("Aggregate{");
                for member in &link.members {
                    name.push_str(&member.display_name());
                    name.push(';');
                }
                name.push('}');
                name
            }
        }
    }

    /// Mouse view of this device, if it is one.
    pub fn as_mouse(&self) -> Option<Mouse<'_>> {
        match &self.state {
            TypedState::Mouse(state) => Some(Mouse { dev: self, state }),
            _ => None,
        }
    }

    /// Keyboard view of this device, if it is one.
    pub fn as_keyboard(&self) -> Option<Keyboard<'_>> {
        match &self.state {
            TypedState::Keyboard(state) => Some(Keyboard { dev: self, state }),
            _ => None,
        }
    }

    /// Gamepad view of this device, if it is one.
    pub fn as_gamepad(&self) -> Option<Gamepad<'_>> {
        match &self.state {
            TypedState::Gamepad(state) => Some(Gamepad { dev: self, state }),
            _ => None,
        }
    }

    /// Pulls pending native input and folds it into the device state.
    pub(crate) fn run_update(self: &Rc<Self>, reg: &Registry) {
        match &self.source {
            Source::Physical(_) => physical::update(self, reg),
            Source::Aggregate(_) => crate::aggregate::update(self, reg),
        }
    }
}

/// Borrow-scoped mouse surface of a [`Device`].
///
/// Obtained from [`Device::as_mouse`]; getters on a disconnected mouse
/// report zeros and infinite ages.
pub struct Mouse<'a> {
    pub(crate) dev: &'a Device,
    pub(crate) state: &'a MouseState,
}

/// Borrow-scoped keyboard surface of a [`Device`].
pub struct Keyboard<'a> {
    pub(crate) dev: &'a Device,
    pub(crate) state: &'a KeyboardState,
}

/// Borrow-scoped gamepad surface of a [`Device`].
pub struct Gamepad<'a> {
    pub(crate) dev: &'a Device,
    pub(crate) state: &'a GamepadState,
}
