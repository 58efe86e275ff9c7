//! Scriptable in-memory bridge for tests.
//!
//! A [`MockHub`] stands in for the operating system: tests add nodes with
//! preset capabilities, script raw events onto them, and install the hub's
//! provider on a registry. The [`MockNode`] handle stays shared with the
//! test, so events can be pushed and force uploads inspected while the
//! library owns the "connection".
//!
//! ```no_run
//! use unihid::bridge::mock::MockHub;
//! use unihid::Registry;
//!
//! let hub = MockHub::new();
//! let mouse = hub.add_mouse("test mouse");
//! let registry = Registry::with_provider(hub.provider());
//! registry.discover().unwrap();
//! mouse.push_rel(unihid_core::keymap::code::REL_X, 5, 1_000);
//! mouse.push_syn(1_000);
//! registry.update_all().unwrap();
//! ```

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use unihid_core::axis::AbsAxisInfo;
use unihid_core::cell::Timestamp;
use unihid_core::deduce::{deduce_device_type, KeyBitmap, SourceCapabilities};
use unihid_core::effect::EffectDescriptor;
use unihid_core::keymap::{self, code};
use unihid_core::{Button, DeviceType, Key};

use super::{
    BridgeError, BridgeProvider, DeviceBridge, EffectSlot, EventClass, ForceCapabilities,
    HardwareId, NodeSummary, RawEvent,
};

struct NodeState {
    hardware_id: HardwareId,
    name: String,
    present: Cell<bool>,
    fail_reads: Cell<bool>,
    capabilities: RefCell<SourceCapabilities>,
    events: RefCell<VecDeque<RawEvent>>,
    keys_down: RefCell<HashSet<u16>>,
    abs_axes: RefCell<HashMap<u16, AbsAxisInfo>>,
    force: Cell<ForceCapabilities>,
    next_slot: Cell<EffectSlot>,
    uploads: RefCell<Vec<(EffectSlot, EffectDescriptor)>>,
    plays: RefCell<Vec<(EffectSlot, i32)>>,
    stops: RefCell<Vec<EffectSlot>>,
    erased: RefCell<Vec<EffectSlot>>,
    gain_writes: RefCell<Vec<f32>>,
}

/// Test-side handle to one scripted input node.
#[derive(Clone)]
pub struct MockNode {
    state: Rc<NodeState>,
}

/// A collection of scripted nodes acting as the operating system.
#[derive(Clone, Default)]
pub struct MockHub {
    nodes: Rc<RefCell<Vec<Rc<NodeState>>>>,
}

impl MockHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// The provider to install on a registry via
    /// [`Registry::with_provider`](crate::Registry::with_provider).
    pub fn provider(&self) -> Box<dyn BridgeProvider> {
        Box::new(MockProvider { hub: self.clone() })
    }

    /// Adds a node with explicit capabilities.
    pub fn add_node(&self, name: &str, capabilities: SourceCapabilities) -> MockNode {
        let state = Rc::new(NodeState {
            hardware_id: HardwareId::Unique(name.to_string()),
            name: name.to_string(),
            present: Cell::new(true),
            fail_reads: Cell::new(false),
            capabilities: RefCell::new(capabilities),
            events: RefCell::new(VecDeque::new()),
            keys_down: RefCell::new(HashSet::new()),
            abs_axes: RefCell::new(HashMap::new()),
            force: Cell::new(ForceCapabilities::default()),
            next_slot: Cell::new(0),
            uploads: RefCell::new(Vec::new()),
            plays: RefCell::new(Vec::new()),
            stops: RefCell::new(Vec::new()),
            erased: RefCell::new(Vec::new()),
            gain_writes: RefCell::new(Vec::new()),
        });
        self.nodes.borrow_mut().push(Rc::clone(&state));
        MockNode { state }
    }

    /// Adds a node that deduces as a mouse.
    pub fn add_mouse(&self, name: &str) -> MockNode {
        let mut caps = SourceCapabilities { has_sync: true, has_relative: true, ..Default::default() };
        for code in keymap::MOUSE_BUTTON_CODES {
            caps.keys.set(code);
        }
        self.add_node(name, caps)
    }

    /// Adds a node that deduces as a keyboard.
    pub fn add_keyboard(&self, name: &str) -> MockNode {
        let mut caps = SourceCapabilities { has_sync: true, ..Default::default() };
        for key in Key::all() {
            caps.keys.set(keymap::key_to_code(key));
        }
        self.add_node(name, caps)
    }

    /// Adds a node that deduces as a gamepad, with two thumbsticks and an
    /// analog dpad hat pre-configured.
    pub fn add_gamepad(&self, name: &str) -> MockNode {
        let mut caps = SourceCapabilities { has_sync: true, has_absolute: true, ..Default::default() };
        for button in Button::all() {
            caps.keys.set(keymap::button_to_code(button));
        }
        let node = self.add_node(name, caps);
        for axis in [code::ABS_X, code::ABS_Y, code::ABS_RX, code::ABS_RY] {
            node.set_abs_axis(axis, -32768, 32767, 0);
        }
        for axis in [code::ABS_HAT0X, code::ABS_HAT0Y] {
            node.set_abs_axis(axis, -1, 1, 0);
        }
        node
    }
}

impl MockNode {
    /// The node's hardware identity, as the registry sees it.
    pub fn hardware_id(&self) -> HardwareId {
        self.state.hardware_id.clone()
    }

    /// Plugs the node in or out. An absent node fails reconnection but does
    /// not interrupt an existing connection; combine with
    /// [`fail_reads`](Self::fail_reads) for a full unplug.
    pub fn set_present(&self, present: bool) {
        self.state.present.set(present);
    }

    /// Makes every subsequent read fail, as a vanished or faulted node
    /// would. The owning device disconnects on its next update.
    pub fn fail_reads(&self, fail: bool) {
        self.state.fail_reads.set(fail);
    }

    /// Configures force support.
    pub fn set_force(&self, force: ForceCapabilities) {
        self.state.force.set(force);
    }

    /// Sets one absolute axis' range and current value. Present axes answer
    /// the bridge's axis queries; set them before the device connects so
    /// normalizers are installed.
    pub fn set_abs_axis(&self, axis: u16, minimum: i32, maximum: i32, value: i32) {
        self.state
            .abs_axes
            .borrow_mut()
            .insert(axis, AbsAxisInfo { minimum, maximum, value });
    }

    /// Sets one key's bit in the global key state used for overrun resync.
    pub fn set_key_down(&self, code: u16, down: bool) {
        let mut keys = self.state.keys_down.borrow_mut();
        if down {
            keys.insert(code);
        } else {
            keys.remove(&code);
        }
    }

    /// Scripts one raw event.
    pub fn push_event(&self, class: EventClass, code: u16, value: i32, timestamp: Timestamp) {
        self.state
            .events
            .borrow_mut()
            .push_back(RawEvent { class, code, value, timestamp });
    }

    /// Scripts a relative-motion event.
    pub fn push_rel(&self, code: u16, value: i32, timestamp: Timestamp) {
        self.push_event(EventClass::Relative, code, value, timestamp);
    }

    /// Scripts an absolute-axis event.
    pub fn push_abs(&self, code: u16, value: i32, timestamp: Timestamp) {
        self.push_event(EventClass::Absolute, code, value, timestamp);
    }

    /// Scripts a digital key/button event.
    pub fn push_key(&self, code: u16, pressed: bool, timestamp: Timestamp) {
        self.push_event(EventClass::Key, code, i32::from(pressed), timestamp);
    }

    /// Scripts a sync report terminating the current event group.
    pub fn push_syn(&self, timestamp: Timestamp) {
        self.push_event(EventClass::Sync, super::SYN_REPORT, 0, timestamp);
    }

    /// Scripts a buffer-overrun marker.
    pub fn push_dropped(&self, timestamp: Timestamp) {
        self.push_event(EventClass::Sync, super::SYN_DROPPED, 0, timestamp);
    }

    /// Scripts a force-status event for an effect slot.
    pub fn push_ff_status(&self, slot: EffectSlot, value: i32, timestamp: Timestamp) {
        self.push_event(EventClass::ForceStatus, slot as u16, value, timestamp);
    }

    /// Every effect upload seen so far, in order.
    pub fn uploads(&self) -> Vec<(EffectSlot, EffectDescriptor)> {
        self.state.uploads.borrow().clone()
    }

    /// Every play request seen so far, as `(slot, repeat)`.
    pub fn plays(&self) -> Vec<(EffectSlot, i32)> {
        self.state.plays.borrow().clone()
    }

    /// Every stop request seen so far.
    pub fn stops(&self) -> Vec<EffectSlot> {
        self.state.stops.borrow().clone()
    }

    /// Every erased slot seen so far.
    pub fn erased(&self) -> Vec<EffectSlot> {
        self.state.erased.borrow().clone()
    }

    /// Every master-gain write seen so far.
    pub fn gain_writes(&self) -> Vec<f32> {
        self.state.gain_writes.borrow().clone()
    }
}

struct MockProvider {
    hub: MockHub,
}

impl BridgeProvider for MockProvider {
    fn scan(&mut self) -> Result<Vec<NodeSummary>, BridgeError> {
        Ok(self
            .hub
            .nodes
            .borrow()
            .iter()
            .filter(|node| node.present.get())
            .map(|node| NodeSummary {
                hardware_id: node.hardware_id.clone(),
                capabilities: *node.capabilities.borrow(),
            })
            .collect())
    }

    fn open(
        &mut self,
        hardware_id: &HardwareId,
        expected: DeviceType,
    ) -> Option<Box<dyn DeviceBridge>> {
        let nodes = self.hub.nodes.borrow();
        let node = nodes.iter().find(|node| {
            node.present.get()
                && node.hardware_id == *hardware_id
                && deduce_device_type(&node.capabilities.borrow()) == expected
        })?;
        // A fresh connection starts with an empty native buffer.
        node.events.borrow_mut().clear();
        Some(Box::new(MockBridge { state: Rc::clone(node) }))
    }
}

struct MockBridge {
    state: Rc<NodeState>,
}

impl DeviceBridge for MockBridge {
    fn read_event(&mut self) -> Result<Option<RawEvent>, BridgeError> {
        if self.state.fail_reads.get() {
            return Err(BridgeError::Io { detail: format!("node \"{}\" gone", self.state.name) });
        }
        Ok(self.state.events.borrow_mut().pop_front())
    }

    fn display_name(&self) -> String {
        self.state.name.clone()
    }

    fn global_key_state(&mut self) -> Result<KeyBitmap, BridgeError> {
        if self.state.fail_reads.get() {
            return Err(BridgeError::Io { detail: format!("node \"{}\" gone", self.state.name) });
        }
        let mut bitmap = KeyBitmap::new();
        for &code in self.state.keys_down.borrow().iter() {
            bitmap.set(code);
        }
        Ok(bitmap)
    }

    fn abs_axis(&mut self, code: u16) -> Option<AbsAxisInfo> {
        self.state.abs_axes.borrow().get(&code).copied()
    }

    fn force_capabilities(&mut self) -> ForceCapabilities {
        self.state.force.get()
    }

    fn upload_effect(
        &mut self,
        slot: Option<EffectSlot>,
        descriptor: &EffectDescriptor,
    ) -> Result<EffectSlot, BridgeError> {
        let slot = slot.unwrap_or_else(|| {
            let slot = self.state.next_slot.get();
            self.state.next_slot.set(slot + 1);
            slot
        });
        self.state.uploads.borrow_mut().push((slot, *descriptor));
        Ok(slot)
    }

    fn erase_effect(&mut self, slot: EffectSlot) {
        self.state.erased.borrow_mut().push(slot);
    }

    fn play_effect(&mut self, slot: EffectSlot, repeat: i32) -> Result<(), BridgeError> {
        self.state.plays.borrow_mut().push((slot, repeat));
        Ok(())
    }

    fn stop_effect(&mut self, slot: EffectSlot) -> Result<(), BridgeError> {
        self.state.stops.borrow_mut().push(slot);
        Ok(())
    }

    fn set_master_gain(&mut self, gain: f32) {
        self.state.gain_writes.borrow_mut().push(gain);
    }

    fn disable_autocenter(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_nodes_deduce_as_their_preset_type() {
        let hub = MockHub::new();
        let mouse = hub.add_mouse("m");
        let keyboard = hub.add_keyboard("k");
        let gamepad = hub.add_gamepad("g");
        for (node, expected) in [
            (mouse, DeviceType::Mouse),
            (keyboard, DeviceType::Keyboard),
            (gamepad, DeviceType::Gamepad),
        ] {
            let deduced = deduce_device_type(&node.state.capabilities.borrow());
            assert_eq!(deduced, expected);
        }
    }

    #[test]
    fn test_scan_skips_absent_nodes() {
        let hub = MockHub::new();
        let mouse = hub.add_mouse("m");
        hub.add_keyboard("k");
        mouse.set_present(false);
        let mut provider = MockProvider { hub: hub.clone() };
        let summaries = provider.scan().unwrap();
        assert_eq!(summaries.len(), 1);
    }

    #[test]
    fn test_open_matches_hardware_id_and_type() {
        let hub = MockHub::new();
        let mouse = hub.add_mouse("m");
        let mut provider = MockProvider { hub: hub.clone() };
        assert!(provider.open(&mouse.hardware_id(), DeviceType::Mouse).is_some());
        assert!(provider.open(&mouse.hardware_id(), DeviceType::Keyboard).is_none());
        assert!(provider
            .open(&HardwareId::Unique("absent".into()), DeviceType::Mouse)
            .is_none());
    }

    #[test]
    fn test_scripted_events_drain_in_order() {
        let hub = MockHub::new();
        let node = hub.add_mouse("m");
        node.push_rel(code::REL_X, 5, 1);
        node.push_syn(2);
        let mut provider = MockProvider { hub: hub.clone() };
        let mut bridge = provider.open(&node.hardware_id(), DeviceType::Mouse).unwrap();
        // Opening clears the buffer; push after connect.
        node.push_rel(code::REL_X, 7, 3);
        node.push_syn(4);
        let first = bridge.read_event().unwrap().unwrap();
        assert_eq!((first.class, first.code, first.value), (EventClass::Relative, code::REL_X, 7));
        assert!(bridge.read_event().unwrap().is_some());
        assert!(bridge.read_event().unwrap().is_none());
    }
}
