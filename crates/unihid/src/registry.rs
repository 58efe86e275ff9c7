//! Identity allocation and the device registry.
//!
//! Identifiers come from one process-global monotonic 64-bit counter
//! starting at 1; value 0 is the reserved "global/no-device" sentinel and is
//! never assigned. Ids are never reused within a process, so a stale handle
//! can never alias a new object.
//!
//! The [`Registry`] is the single value holding all shared state: the device
//! map, the callback table, the member-to-aggregate link map, the bridge
//! provider, and the reentrancy flag. It is deliberately **not** thread
//! safe — the whole library is single-threaded and cooperative, driven by
//! explicit update calls; embed it behind your own lock if you must share
//! it. A process-wide default registry backs the free-function API in the
//! crate root.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use unihid_core::deduce::deduce_device_type;
use unihid_core::{DeviceStatus, DeviceType};

use crate::bridge::{platform_provider, BridgeProvider, DeviceBridge, HardwareId};
use crate::callback::CallbackTable;
use crate::device::{Device, Source};
use crate::error::{Error, Result};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Takes the next value from the process-global id counter.
pub(crate) fn reserve_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u64);

        impl $name {
            /// The raw identifier value.
            pub fn as_u64(self) -> u64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }
    };
}

id_newtype! {
    /// Runtime-unique device identifier. Value 0 is the global sentinel used
    /// internally for callbacks not bound to a device.
    DeviceId
}
id_newtype! {
    /// Runtime-unique callback registration identifier.
    CallbackId
}
id_newtype! {
    /// Runtime-unique force identifier.
    ForceId
}

impl DeviceId {
    /// The "no device / all devices" sentinel. Never assigned to a real
    /// device.
    pub const GLOBAL: DeviceId = DeviceId(0);
}

/// The library's shared state. See the module docs.
pub struct Registry {
    pub(crate) devices: RefCell<HashMap<DeviceId, Rc<Device>>>,
    /// Hardware ids with a live device, so re-discovery does not duplicate.
    known_hardware: RefCell<HashSet<HardwareId>>,
    pub(crate) callbacks: CallbackTable,
    pub(crate) in_callback: Cell<bool>,
    /// Member id -> ids of aggregates it belongs to.
    pub(crate) dev_to_aggr: RefCell<HashMap<DeviceId, Vec<DeviceId>>>,
    provider: RefCell<Box<dyn BridgeProvider>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    /// A registry backed by the platform's native bridge provider.
    pub fn new() -> Self {
        Self::with_provider(platform_provider())
    }

    /// A registry backed by a caller-supplied provider. This is the seam
    /// tests use to script synthetic devices.
    pub fn with_provider(provider: Box<dyn BridgeProvider>) -> Self {
        Self {
            devices: RefCell::new(HashMap::new()),
            known_hardware: RefCell::new(HashSet::new()),
            callbacks: CallbackTable::default(),
            in_callback: Cell::new(false),
            dev_to_aggr: RefCell::new(HashMap::new()),
            provider: RefCell::new(provider),
        }
    }

    /// Rejects management operations while a callback is running.
    pub(crate) fn guard(&self, operation: &'static str) -> Result<()> {
        if self.in_callback.get() {
            Err(Error::ReentrantCall { operation })
        } else {
            Ok(())
        }
    }

    pub(crate) fn open_bridge(
        &self,
        hardware_id: &HardwareId,
        expected: DeviceType,
    ) -> Option<Box<dyn DeviceBridge>> {
        self.provider.borrow_mut().open(hardware_id, expected)
    }

    // ── Discovery and updates ─────────────────────────────────────────────

    /// Walks the native enumeration and creates a device for every source
    /// that is not represented yet and whose type can be deduced. New
    /// devices appear disconnected until their first update.
    ///
    /// Returns the number of devices created.
    pub fn discover(&self) -> Result<usize> {
        self.guard("discover_devices")?;
        let summaries = self.provider.borrow_mut().scan()?;

        let mut created = 0;
        for summary in summaries {
            if self.known_hardware.borrow().contains(&summary.hardware_id) {
                continue;
            }
            let device_type = deduce_device_type(&summary.capabilities);
            if device_type == DeviceType::Unknown {
                // Not recognizably a mouse, keyboard, or gamepad.
                continue;
            }
            let dev = Device::new_physical(
                DeviceId(reserve_id()),
                device_type,
                summary.hardware_id.clone(),
            );
            debug!(device = %dev.id(), kind = ?device_type, "device discovered");
            self.known_hardware.borrow_mut().insert(summary.hardware_id);
            self.devices.borrow_mut().insert(dev.id(), Rc::clone(&dev));
            self.emit_status(&dev, DeviceStatus::Discovered);
            created += 1;
        }
        Ok(created)
    }

    /// Updates one device: pulls pending native events, reconnects if
    /// necessary, folds events into cells, and emits callbacks. Unknown ids
    /// do nothing.
    pub fn update_device(&self, id: DeviceId) -> Result<()> {
        self.guard("update_device")?;
        if let Some(dev) = self.device(id) {
            dev.run_update(self);
        }
        Ok(())
    }

    /// Updates every device in the registry. Members of aggregates are
    /// skipped — their aggregate updates them — so one physical device is
    /// not folded twice per tick.
    pub fn update_all(&self) -> Result<()> {
        self.guard("update_all_devices")?;
        let targets: Vec<Rc<Device>> = {
            let links = self.dev_to_aggr.borrow();
            self.devices
                .borrow()
                .values()
                .filter(|dev| !links.contains_key(&dev.id()))
                .cloned()
                .collect()
        };
        for dev in targets {
            dev.run_update(self);
        }
        Ok(())
    }

    // ── Lookup ────────────────────────────────────────────────────────────

    /// Number of devices, optionally ignoring disconnected ones.
    pub fn device_count(&self, ignore_disconnected: bool) -> usize {
        if ignore_disconnected {
            self.devices
                .borrow()
                .values()
                .filter(|dev| dev.is_connected())
                .count()
        } else {
            self.devices.borrow().len()
        }
    }

    /// Handles to every device, aggregates included.
    pub fn devices(&self, ignore_disconnected: bool) -> Vec<Rc<Device>> {
        self.devices
            .borrow()
            .values()
            .filter(|dev| !ignore_disconnected || dev.is_connected())
            .cloned()
            .collect()
    }

    fn devices_of_type(&self, device_type: DeviceType, ignore_disconnected: bool) -> Vec<Rc<Device>> {
        self.devices
            .borrow()
            .values()
            .filter(|dev| dev.device_type() == device_type)
            .filter(|dev| !ignore_disconnected || dev.is_connected())
            .cloned()
            .collect()
    }

    /// Handles to every mouse device.
    pub fn mice(&self, ignore_disconnected: bool) -> Vec<Rc<Device>> {
        self.devices_of_type(DeviceType::Mouse, ignore_disconnected)
    }

    /// Handles to every keyboard device.
    pub fn keyboards(&self, ignore_disconnected: bool) -> Vec<Rc<Device>> {
        self.devices_of_type(DeviceType::Keyboard, ignore_disconnected)
    }

    /// Handles to every gamepad device.
    pub fn gamepads(&self, ignore_disconnected: bool) -> Vec<Rc<Device>> {
        self.devices_of_type(DeviceType::Gamepad, ignore_disconnected)
    }

    /// Looks up a device by id.
    pub fn device(&self, id: DeviceId) -> Option<Rc<Device>> {
        if id == DeviceId::GLOBAL {
            return None;
        }
        self.devices.borrow().get(&id).cloned()
    }

    // ── Destruction ───────────────────────────────────────────────────────

    /// Destroys one device. Destruction cascades to every aggregate the
    /// device belongs to, transitively, members before their aggregates; a
    /// `Destroyed` status callback fires for each. Unknown ids do nothing.
    pub fn destroy_device(&self, id: DeviceId) -> Result<()> {
        self.guard("destroy_device")?;
        if self.device(id).is_none() {
            return Ok(());
        }

        if !self.dev_to_aggr.borrow().contains_key(&id) {
            // Not a member of anything; no cascade to compute.
            self.destroy_entry(id);
            return Ok(());
        }

        // Gather the id plus every aggregate reachable through membership.
        let mut targets = vec![id];
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            if let Some(aggregates) = self.dev_to_aggr.borrow().get(&current) {
                for &aggregate in aggregates {
                    if !targets.contains(&aggregate) {
                        targets.push(aggregate);
                        stack.push(aggregate);
                    }
                }
            }
        }
        self.destroy_hierarchy(targets)
    }

    /// Destroys every device, aggregates included.
    pub fn destroy_all(&self) -> Result<()> {
        self.guard("destroy_all_devices")?;
        let targets: Vec<DeviceId> = self.devices.borrow().keys().copied().collect();
        if targets.is_empty() {
            return Ok(());
        }
        self.destroy_hierarchy(targets)
    }

    /// Destroys a set of devices, members before the aggregates that contain
    /// them: each pass removes every target none of whose *targeted* members
    /// is still alive, so aggregates fall as soon as their targeted members
    /// are gone. A pass that removes nothing means the membership graph has
    /// a cycle, which construction declares undefined behavior; it is
    /// reported instead of looping.
    fn destroy_hierarchy(&self, mut targets: Vec<DeviceId>) -> Result<()> {
        while !targets.is_empty() {
            let mut remaining = Vec::new();
            for &id in &targets {
                if self.has_living_targeted_member(id, &targets) {
                    remaining.push(id);
                } else {
                    self.destroy_entry(id);
                }
            }
            if remaining.len() == targets.len() {
                return Err(Error::AggregateCycle);
            }
            targets = remaining;
        }
        Ok(())
    }

    fn has_living_targeted_member(&self, id: DeviceId, targets: &[DeviceId]) -> bool {
        let devices = self.devices.borrow();
        let Some(dev) = devices.get(&id) else {
            return false;
        };
        let Some(link) = dev.source.aggregate() else {
            return false;
        };
        link.members.iter().any(|member| {
            targets.contains(&member.id()) && devices.contains_key(&member.id())
        })
    }

    /// Destroys one registry entry: fires the `Destroyed` callback, removes
    /// the entry, drops its callbacks/forces/links, and leaves any
    /// outstanding handles reading as disconnected.
    fn destroy_entry(&self, id: DeviceId) {
        let Some(dev) = self.device(id) else {
            return;
        };
        self.emit_status(&dev, DeviceStatus::Destroyed);
        self.devices.borrow_mut().remove(&id);
        debug!(device = %id, "device destroyed");

        for callback in dev.attached_callbacks.take() {
            self.callbacks.remove(callback);
        }
        dev.destroy_all_forces();
        dev.connected.set(false);
        dev.last_update.set(0);

        match &dev.source {
            Source::Physical(link) => {
                *link.bridge.borrow_mut() = None;
                self.known_hardware.borrow_mut().remove(&link.hardware_id);
            }
            Source::Aggregate(link) => {
                // Unlink so the members are no longer held back by this
                // aggregate in later destruction passes.
                let mut links = self.dev_to_aggr.borrow_mut();
                for member in &link.members {
                    if let Some(aggregates) = links.get_mut(&member.id()) {
                        aggregates.retain(|&aggregate| aggregate != id);
                        if aggregates.is_empty() {
                            links.remove(&member.id());
                        }
                    }
                }
            }
        }
    }
}
