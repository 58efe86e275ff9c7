//! Integration tests for discovery and per-type state replication.
//!
//! These drive the library exclusively through its public API with a
//! scripted mock bridge standing in for the operating system: nodes are
//! added to a [`MockHub`], raw events are pushed onto them, and explicit
//! update calls fold the events into device state.
//!
//! Covered here:
//!
//! - discovery creates typed, initially disconnected devices, exactly once
//!   per hardware id;
//! - mouse motion/scroll accumulation, per-update deltas, and the
//!   high-vs-low-resolution wheel precedence;
//! - the keyboard pressed-key counter, including buffer-overrun
//!   resynchronization from the global key state;
//! - gamepad dpad digitalization, trigger cross-talk, and thumbstick
//!   normalization with the vertical axis negated;
//! - disconnect on read failure and reconnection on a later update.

use unihid::bridge::mock::{MockHub, MockNode};
use unihid::Registry;
use unihid_core::keymap::{self, code};
use unihid_core::Button;

fn make_registry(hub: &MockHub) -> Registry {
    Registry::with_provider(hub.provider())
}

/// Discovers and connects every node, returning a ready registry.
fn make_connected(hub: &MockHub) -> Registry {
    let registry = make_registry(hub);
    registry.discover().expect("discovery must succeed");
    registry.update_all().expect("first update must succeed");
    registry
}

fn key_code(key: unihid::Key) -> u16 {
    keymap::key_to_code(key)
}

// ── Discovery ─────────────────────────────────────────────────────────────────

#[test]
fn test_discover_creates_one_typed_device_per_node() {
    let hub = MockHub::new();
    hub.add_mouse("m");
    hub.add_keyboard("k");
    hub.add_gamepad("g");

    let registry = make_registry(&hub);
    let created = registry.discover().unwrap();
    assert_eq!(created, 3);
    assert_eq!(registry.mice(false).len(), 1);
    assert_eq!(registry.keyboards(false).len(), 1);
    assert_eq!(registry.gamepads(false).len(), 1);
}

#[test]
fn test_devices_start_disconnected_until_first_update() {
    let hub = MockHub::new();
    hub.add_mouse("m");
    let registry = make_registry(&hub);
    registry.discover().unwrap();

    let dev = registry.mice(false).pop().unwrap();
    assert!(!dev.is_connected());
    assert_eq!(dev.display_name(), "");
    assert_eq!(registry.device_count(true), 0);

    registry.update_all().unwrap();
    assert!(dev.is_connected());
    assert_eq!(dev.display_name(), "m");
    assert_eq!(registry.device_count(true), 1);
}

#[test]
fn test_rediscovery_does_not_duplicate_devices() {
    let hub = MockHub::new();
    hub.add_mouse("m");
    let registry = make_registry(&hub);
    assert_eq!(registry.discover().unwrap(), 1);
    assert_eq!(registry.discover().unwrap(), 0);
    assert_eq!(registry.device_count(false), 1);
}

#[test]
fn test_unrecognizable_nodes_are_ignored() {
    let hub = MockHub::new();
    // Sync only: no evidence for any type.
    hub.add_node("junk", unihid_core::deduce::SourceCapabilities {
        has_sync: true,
        ..Default::default()
    });
    let registry = make_registry(&hub);
    assert_eq!(registry.discover().unwrap(), 0);
}

#[test]
fn test_destroyed_hardware_can_be_rediscovered() {
    let hub = MockHub::new();
    hub.add_mouse("m");
    let registry = make_registry(&hub);
    registry.discover().unwrap();
    let id = registry.mice(false).pop().unwrap().id();
    registry.destroy_device(id).unwrap();
    assert_eq!(registry.device_count(false), 0);
    assert_eq!(registry.discover().unwrap(), 1);
}

// ── Mouse ─────────────────────────────────────────────────────────────────────

#[test]
fn test_mouse_motion_accumulates_across_groups_within_one_update() {
    let hub = MockHub::new();
    let node = hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    node.push_rel(code::REL_X, 5, 1_000);
    node.push_rel(code::REL_X, 10, 1_100);
    node.push_syn(1_100);
    node.push_rel(code::REL_X, -3, 1_200);
    node.push_syn(1_200);

    // Nothing is observable until the explicit update.
    assert_eq!(dev.as_mouse().unwrap().position(), (0, 0));

    registry.update_all().unwrap();
    let mouse = dev.as_mouse().unwrap();
    assert_eq!(mouse.delta(), (12, 0));
    assert_eq!(mouse.position(), (12, 0));
}

#[test]
fn test_mouse_deltas_reset_on_quiet_update_but_totals_persist() {
    let hub = MockHub::new();
    let node = hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    node.push_rel(code::REL_X, 7, 1_000);
    node.push_rel(code::REL_Y, -2, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    assert_eq!(dev.as_mouse().unwrap().delta(), (7, -2));

    registry.update_all().unwrap();
    let mouse = dev.as_mouse().unwrap();
    assert_eq!(mouse.delta(), (0, 0));
    assert_eq!(mouse.position(), (7, -2));
}

#[test]
fn test_low_resolution_wheel_scales_by_notch() {
    let hub = MockHub::new();
    let node = hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    node.push_rel(code::REL_WHEEL, 2, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    assert_eq!(dev.as_mouse().unwrap().scroll(), (0, 240));
}

#[test]
fn test_high_resolution_wheel_wins_over_low_resolution() {
    let hub = MockHub::new();
    let node = hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    // Both resolutions in one group describe the same physical motion.
    node.push_rel(code::REL_WHEEL, 1, 1_000);
    node.push_rel(code::REL_WHEEL_HI_RES, 30, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    let mouse = dev.as_mouse().unwrap();
    assert_eq!(mouse.scroll(), (0, 30));
    assert_eq!(mouse.scroll_delta(), (0, 30));
}

#[test]
fn test_mouse_button_state_and_age() {
    let hub = MockHub::new();
    let node = hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    // Untouched button: released with infinite age.
    let (pressed, age) = dev.as_mouse().unwrap().button_state_with_age(0);
    assert!(!pressed);
    assert!(age.is_infinite());

    node.push_key(code::BTN_LEFT, true, 2_000);
    node.push_syn(2_000);
    registry.update_all().unwrap();
    let (pressed, age) = dev.as_mouse().unwrap().button_state_with_age(0);
    assert!(pressed);
    assert!(age.is_finite());
}

#[test]
fn test_mouse_button_threshold_roundtrip_clamps() {
    let hub = MockHub::new();
    hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();
    let mouse = dev.as_mouse().unwrap();

    mouse.set_button_threshold(0, 1.5);
    assert_eq!(mouse.button_threshold(0), 1.0);
    mouse.set_button_threshold(0, -0.5);
    assert_eq!(mouse.button_threshold(0), 0.0);
    // Out-of-range indices are ignored and read back as zero.
    mouse.set_button_threshold(99, 0.5);
    assert_eq!(mouse.button_threshold(99), 0.0);
}

// ── Keyboard ──────────────────────────────────────────────────────────────────

#[test]
fn test_keyboard_counter_follows_press_and_release() {
    let hub = MockHub::new();
    let node = hub.add_keyboard("k");
    let registry = make_connected(&hub);
    let dev = registry.keyboards(true).pop().unwrap();
    let a = key_code(unihid::Key::A);
    let b = key_code(unihid::Key::B);

    node.push_key(a, true, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    assert_eq!(dev.as_keyboard().unwrap().num_keys_pressed(), 1);
    assert!(dev.as_keyboard().unwrap().key_state(unihid::Key::A));

    node.push_key(a, false, 2_000);
    node.push_syn(2_000);
    registry.update_all().unwrap();
    assert_eq!(dev.as_keyboard().unwrap().num_keys_pressed(), 0);

    node.push_key(b, true, 3_000);
    node.push_syn(3_000);
    registry.update_all().unwrap();
    assert_eq!(dev.as_keyboard().unwrap().num_keys_pressed(), 1);
}

#[test]
fn test_buffer_overrun_resync_restores_true_counter() {
    let hub = MockHub::new();
    let node = hub.add_keyboard("k");
    let registry = make_connected(&hub);
    let dev = registry.keyboards(true).pop().unwrap();
    let a = key_code(unihid::Key::A);
    let b = key_code(unihid::Key::B);

    node.push_key(a, true, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    assert_eq!(dev.as_keyboard().unwrap().num_keys_pressed(), 1);

    // The buffer overruns and we lose the A-up and B-down events; the
    // node's true state is "only B held".
    node.set_key_down(b, true);
    node.push_dropped(2_000);
    registry.update_all().unwrap();

    let keyboard = dev.as_keyboard().unwrap();
    assert_eq!(keyboard.num_keys_pressed(), 1);
    assert!(!keyboard.key_state(unihid::Key::A));
    assert!(keyboard.key_state(unihid::Key::B));
}

#[test]
fn test_unmapped_key_codes_are_dropped_silently() {
    let hub = MockHub::new();
    let node = hub.add_keyboard("k");
    let registry = make_connected(&hub);
    let dev = registry.keyboards(true).pop().unwrap();

    // 84 has no table entry.
    node.push_key(84, true, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    assert_eq!(dev.as_keyboard().unwrap().num_keys_pressed(), 0);
}

// ── Gamepad ───────────────────────────────────────────────────────────────────

#[test]
fn test_hat_axis_digitalizes_into_opposite_dpad_buttons() {
    let hub = MockHub::new();
    let node = hub.add_gamepad("g");
    let registry = make_connected(&hub);
    let dev = registry.gamepads(true).pop().unwrap();

    node.push_abs(code::ABS_HAT0X, 1, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    let gamepad = dev.as_gamepad().unwrap();
    assert!(gamepad.button_state(Button::DpadRight));
    assert!(!gamepad.button_state(Button::DpadLeft));

    node.push_abs(code::ABS_HAT0X, -1, 2_000);
    node.push_syn(2_000);
    registry.update_all().unwrap();
    let gamepad = dev.as_gamepad().unwrap();
    assert!(!gamepad.button_state(Button::DpadRight));
    assert!(gamepad.button_state(Button::DpadLeft));
}

#[test]
fn test_digital_events_are_ignored_for_analog_backed_triggers() {
    let hub = MockHub::new();
    let node = hub.add_gamepad("g");
    // An analog left trigger is present before the device connects.
    node.set_abs_axis(code::ABS_HAT2Y, 0, 255, 0);
    let registry = make_connected(&hub);
    let dev = registry.gamepads(true).pop().unwrap();

    // The digital event for the same control must not reach the cell.
    node.push_key(keymap::code::BTN_TL2, true, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    assert!(!dev.as_gamepad().unwrap().button_state(Button::L2));

    node.push_abs(code::ABS_HAT2Y, 255, 2_000);
    node.push_syn(2_000);
    registry.update_all().unwrap();
    let gamepad = dev.as_gamepad().unwrap();
    assert!(gamepad.button_state(Button::L2));
    assert_eq!(gamepad.button_value(Button::L2), 1.0);
}

#[test]
fn test_purely_digital_buttons_still_work() {
    let hub = MockHub::new();
    let node = hub.add_gamepad("g");
    let registry = make_connected(&hub);
    let dev = registry.gamepads(true).pop().unwrap();

    node.push_key(keymap::code::BTN_SOUTH, true, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();
    assert!(dev.as_gamepad().unwrap().button_state(Button::South));
}

#[test]
fn test_thumbstick_normalizes_and_negates_vertical_axis() {
    let hub = MockHub::new();
    let node = hub.add_gamepad("g");
    let registry = make_connected(&hub);
    let dev = registry.gamepads(true).pop().unwrap();

    node.push_abs(code::ABS_X, 32767, 1_000);
    node.push_abs(code::ABS_Y, -32768, 1_000);
    node.push_syn(1_000);
    registry.update_all().unwrap();

    let (x, y) = dev.as_gamepad().unwrap().thumbstick(0);
    assert_eq!(x, 1.0);
    // Raw "up" is negative; the surface reports positive-up.
    assert_eq!(y, 1.0);
    assert_eq!(dev.as_gamepad().unwrap().thumbstick_count(), 2);
}

#[test]
fn test_thumbstick_out_of_range_index_reads_origin() {
    let hub = MockHub::new();
    hub.add_gamepad("g");
    let registry = make_connected(&hub);
    let dev = registry.gamepads(true).pop().unwrap();
    assert_eq!(dev.as_gamepad().unwrap().thumbstick(99), (0.0, 0.0));
}

// ── Connection lifecycle ──────────────────────────────────────────────────────

fn press_a(node: &MockNode, ts: u64) {
    node.push_key(key_code(unihid::Key::A), true, ts);
    node.push_syn(ts);
}

#[test]
fn test_read_failure_disconnects_and_zeroes_state() {
    let hub = MockHub::new();
    let node = hub.add_keyboard("k");
    let registry = make_connected(&hub);
    let dev = registry.keyboards(true).pop().unwrap();

    press_a(&node, 1_000);
    registry.update_all().unwrap();
    assert_eq!(dev.as_keyboard().unwrap().num_keys_pressed(), 1);

    node.fail_reads(true);
    registry.update_all().unwrap();
    assert!(!dev.is_connected());
    assert_eq!(dev.as_keyboard().unwrap().num_keys_pressed(), 0);
    assert!(!dev.as_keyboard().unwrap().key_state(unihid::Key::A));
    assert_eq!(dev.display_name(), "");
}

#[test]
fn test_next_update_reconnects_after_failure() {
    let hub = MockHub::new();
    let node = hub.add_keyboard("k");
    let registry = make_connected(&hub);
    let dev = registry.keyboards(true).pop().unwrap();

    node.fail_reads(true);
    registry.update_all().unwrap();
    assert!(!dev.is_connected());

    node.fail_reads(false);
    registry.update_all().unwrap();
    assert!(dev.is_connected());
    // The device object is the same; no duplicate was discovered.
    assert_eq!(registry.device_count(false), 1);
}

#[test]
fn test_connection_flag_only_changes_across_updates() {
    let hub = MockHub::new();
    let node = hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    // Failing the node does not change anything until an update runs.
    node.fail_reads(true);
    assert!(dev.is_connected());
    registry.update_all().unwrap();
    assert!(!dev.is_connected());
}

#[test]
fn test_absent_node_stays_disconnected() {
    let hub = MockHub::new();
    let node = hub.add_mouse("m");
    let registry = make_registry(&hub);
    registry.discover().unwrap();
    node.set_present(false);
    registry.update_all().unwrap();
    let dev = registry.mice(false).pop().unwrap();
    assert!(!dev.is_connected());
    assert_eq!(registry.devices(false).len(), 1);

    // Plugging it back in lets the next update connect.
    node.set_present(true);
    registry.update_all().unwrap();
    assert!(registry.mice(false).pop().unwrap().is_connected());
}

#[test]
fn test_type_deduction_must_match_for_reconnection() {
    let hub = MockHub::new();
    let mouse = hub.add_mouse("changeling");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    // The node vanishes and something else appears under the same hardware
    // id with keyboard capabilities; the mouse device must not adopt it.
    mouse.fail_reads(true);
    registry.update_all().unwrap();
    assert!(!dev.is_connected());
    mouse.set_present(false);
    hub.add_keyboard("changeling");
    registry.update_all().unwrap();
    assert!(!dev.is_connected());
}
