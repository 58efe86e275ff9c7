//! Integration tests for device aggregation: merge rules per type, identity
//! reuse, member-driven connection state, motor remapping, and the cascade
//! destruction of aggregation hierarchies.

use std::cell::RefCell;
use std::rc::Rc;

use unihid::bridge::mock::{MockHub, MockNode};
use unihid::bridge::ForceCapabilities;
use unihid::{Device, DeviceStatus, DeviceType, ForceKind, Key, Registry};
use unihid_core::keymap::{self, code};
use unihid_core::Button;

fn make_connected(hub: &MockHub) -> Registry {
    let registry = Registry::with_provider(hub.provider());
    registry.discover().unwrap();
    registry.update_all().unwrap();
    registry
}

fn device_named(registry: &Registry, name: &str) -> Rc<Device> {
    registry
        .devices(false)
        .into_iter()
        .find(|dev| dev.display_name() == name)
        .expect("device with that display name")
}

// ── Construction and identity ─────────────────────────────────────────────────

#[test]
fn test_single_id_returns_the_device_itself() {
    let hub = MockHub::new();
    hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    let same = registry
        .aggregate(&[dev.id()], DeviceType::Unknown)
        .unwrap()
        .unwrap();
    assert_eq!(same.id(), dev.id());
    assert!(!same.is_aggregate());
}

#[test]
fn test_empty_and_unknown_ids_yield_none() {
    let hub = MockHub::new();
    hub.add_mouse("m");
    let registry = make_connected(&hub);
    let dev = registry.mice(true).pop().unwrap();

    assert!(registry.aggregate(&[], DeviceType::Unknown).unwrap().is_none());
    let ghost = unihid::DeviceId::GLOBAL;
    assert!(registry
        .aggregate(&[dev.id(), ghost], DeviceType::Unknown)
        .unwrap()
        .is_none());
}

#[test]
fn test_mixed_types_fail_to_aggregate() {
    let hub = MockHub::new();
    hub.add_mouse("m");
    hub.add_keyboard("k");
    let registry = make_connected(&hub);
    let mouse = registry.mice(true).pop().unwrap();
    let keyboard = registry.keyboards(true).pop().unwrap();

    let result = registry
        .aggregate(&[mouse.id(), keyboard.id()], DeviceType::Unknown)
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn test_type_hint_must_match_the_members() {
    let hub = MockHub::new();
    hub.add_mouse("m1");
    hub.add_mouse("m2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.mice(true).iter().map(|dev| dev.id()).collect();

    assert!(registry.aggregate(&ids, DeviceType::Keyboard).unwrap().is_none());
    let aggregate = registry.aggregate(&ids, DeviceType::Mouse).unwrap().unwrap();
    assert!(aggregate.is_aggregate());
    assert_eq!(aggregate.device_type(), DeviceType::Mouse);
}

#[test]
fn test_same_member_set_reuses_the_aggregate_in_any_order() {
    let hub = MockHub::new();
    hub.add_mouse("m1");
    hub.add_mouse("m2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.mice(true).iter().map(|dev| dev.id()).collect();

    let first = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();
    let again = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();
    assert_eq!(first.id(), again.id());

    let reversed: Vec<_> = ids.iter().rev().copied().collect();
    let swapped = registry
        .aggregate(&reversed, DeviceType::Unknown)
        .unwrap()
        .unwrap();
    assert_eq!(first.id(), swapped.id(), "member order must not matter");
}

#[test]
fn test_subset_of_a_larger_aggregate_creates_a_new_one() {
    let hub = MockHub::new();
    hub.add_mouse("m1");
    hub.add_mouse("m2");
    hub.add_mouse("m3");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.mice(true).iter().map(|dev| dev.id()).collect();

    let all = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();
    let pair = registry
        .aggregate(&ids[..2], DeviceType::Unknown)
        .unwrap()
        .unwrap();
    assert_ne!(all.id(), pair.id(), "a strict subset is a different aggregate");
}

// ── Connection state ──────────────────────────────────────────────────────────

#[test]
fn test_aggregate_is_connected_iff_every_member_is() {
    let hub = MockHub::new();
    let n1 = hub.add_gamepad("g1");
    hub.add_gamepad("g2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.gamepads(true).iter().map(|dev| dev.id()).collect();
    let aggregate = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();

    // Fresh aggregates are disconnected until their first update.
    assert!(!aggregate.is_connected());
    registry.update_device(aggregate.id()).unwrap();
    assert!(aggregate.is_connected());

    n1.fail_reads(true);
    registry.update_device(aggregate.id()).unwrap();
    assert!(!aggregate.is_connected());

    n1.fail_reads(false);
    registry.update_device(aggregate.id()).unwrap();
    assert!(aggregate.is_connected());
}

#[test]
fn test_losing_a_member_clears_replicated_state() {
    let hub = MockHub::new();
    let n1 = hub.add_keyboard("k1");
    hub.add_keyboard("k2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.keyboards(true).iter().map(|dev| dev.id()).collect();
    let aggregate = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();

    n1.push_key(keymap::key_to_code(Key::A), true, 1_000);
    n1.push_syn(1_000);
    registry.update_device(aggregate.id()).unwrap();
    assert_eq!(aggregate.as_keyboard().unwrap().num_keys_pressed(), 1);

    n1.fail_reads(true);
    registry.update_device(aggregate.id()).unwrap();
    assert_eq!(aggregate.as_keyboard().unwrap().num_keys_pressed(), 0);
    assert!(!aggregate.as_keyboard().unwrap().key_state(Key::A));
}

#[test]
fn test_aggregate_display_name_lists_members() {
    let hub = MockHub::new();
    hub.add_mouse("m1");
    hub.add_mouse("m2");
    let registry = make_connected(&hub);
    let m1 = device_named(&registry, "m1");
    let m2 = device_named(&registry, "m2");
    let aggregate = registry
        .aggregate(&[m1.id(), m2.id()], DeviceType::Unknown)
        .unwrap()
        .unwrap();
    registry.update_device(aggregate.id()).unwrap();
    assert_eq!(aggregate.display_name(), "Aggregate{m1;m2;}");
}

// ── Merge rules ───────────────────────────────────────────────────────────────

#[test]
fn test_mouse_aggregate_sums_member_deltas() {
    let hub = MockHub::new();
    let n1 = hub.add_mouse("m1");
    let n2 = hub.add_mouse("m2");
    let registry = make_connected(&hub);
    let m1 = device_named(&registry, "m1");
    let m2 = device_named(&registry, "m2");
    let aggregate = registry
        .aggregate(&[m1.id(), m2.id()], DeviceType::Unknown)
        .unwrap()
        .unwrap();

    // Baseline update establishes the per-member caches.
    registry.update_device(aggregate.id()).unwrap();

    n1.push_rel(code::REL_X, 5, 1_000);
    n1.push_syn(1_000);
    n2.push_rel(code::REL_X, 3, 1_000);
    n2.push_rel(code::REL_Y, -4, 1_000);
    n2.push_syn(1_000);
    registry.update_device(aggregate.id()).unwrap();

    let mouse = aggregate.as_mouse().unwrap();
    assert_eq!(mouse.delta(), (8, -4));
    assert_eq!(mouse.position(), (8, -4));

    // A quiet tick leaves totals alone and zeroes the deltas.
    registry.update_device(aggregate.id()).unwrap();
    let mouse = aggregate.as_mouse().unwrap();
    assert_eq!(mouse.delta(), (0, 0));
    assert_eq!(mouse.position(), (8, -4));
}

#[test]
fn test_mouse_aggregate_first_observation_is_not_a_delta() {
    let hub = MockHub::new();
    let n1 = hub.add_mouse("m1");
    hub.add_mouse("m2");
    let registry = make_connected(&hub);

    // The member accumulates motion before the aggregate exists.
    n1.push_rel(code::REL_X, 100, 1_000);
    n1.push_syn(1_000);
    registry.update_all().unwrap();

    let ids: Vec<_> = registry.mice(true).iter().map(|dev| dev.id()).collect();
    let aggregate = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();
    registry.update_device(aggregate.id()).unwrap();

    let mouse = aggregate.as_mouse().unwrap();
    assert_eq!(
        mouse.position(),
        (0, 0),
        "pre-existing member totals must not appear as aggregate motion"
    );
}

#[test]
fn test_mouse_aggregate_buttons_take_the_member_maximum() {
    let hub = MockHub::new();
    let n1 = hub.add_mouse("m1");
    let n2 = hub.add_mouse("m2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.mice(true).iter().map(|dev| dev.id()).collect();
    let aggregate = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();

    n1.push_key(code::BTN_LEFT, true, 1_000);
    n1.push_syn(1_000);
    registry.update_device(aggregate.id()).unwrap();
    assert!(aggregate.as_mouse().unwrap().button_state(0));
    assert_eq!(aggregate.as_mouse().unwrap().button_count(), 8);

    // Releasing on one member while the other still holds keeps it pressed.
    n1.push_key(code::BTN_LEFT, false, 2_000);
    n1.push_syn(2_000);
    n2.push_key(code::BTN_LEFT, true, 2_000);
    n2.push_syn(2_000);
    registry.update_device(aggregate.id()).unwrap();
    assert!(aggregate.as_mouse().unwrap().button_state(0));

    n2.push_key(code::BTN_LEFT, false, 3_000);
    n2.push_syn(3_000);
    registry.update_device(aggregate.id()).unwrap();
    assert!(!aggregate.as_mouse().unwrap().button_state(0));
}

#[test]
fn test_keyboard_aggregate_merges_by_maximum_and_counts_once() {
    let hub = MockHub::new();
    let n1 = hub.add_keyboard("k1");
    let n2 = hub.add_keyboard("k2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.keyboards(true).iter().map(|dev| dev.id()).collect();
    let aggregate = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();

    // The same key held on both members counts once on the aggregate.
    let a = keymap::key_to_code(Key::A);
    n1.push_key(a, true, 1_000);
    n1.push_syn(1_000);
    n2.push_key(a, true, 1_000);
    n2.push_syn(1_000);
    registry.update_device(aggregate.id()).unwrap();
    assert_eq!(aggregate.as_keyboard().unwrap().num_keys_pressed(), 1);

    // Releasing on one member is not a release while the other holds.
    n1.push_key(a, false, 2_000);
    n1.push_syn(2_000);
    registry.update_device(aggregate.id()).unwrap();
    assert!(aggregate.as_keyboard().unwrap().key_state(Key::A));

    n2.push_key(a, false, 3_000);
    n2.push_syn(3_000);
    registry.update_device(aggregate.id()).unwrap();
    assert!(!aggregate.as_keyboard().unwrap().key_state(Key::A));
    assert_eq!(aggregate.as_keyboard().unwrap().num_keys_pressed(), 0);
}

#[test]
fn test_gamepad_aggregate_concatenates_thumbsticks() {
    let hub = MockHub::new();
    hub.add_gamepad("g1");
    let n2 = hub.add_gamepad("g2");
    let registry = make_connected(&hub);
    let g1 = device_named(&registry, "g1");
    let g2 = device_named(&registry, "g2");
    let aggregate = registry
        .aggregate(&[g1.id(), g2.id()], DeviceType::Unknown)
        .unwrap()
        .unwrap();
    registry.update_device(aggregate.id()).unwrap();

    let gamepad = aggregate.as_gamepad().unwrap();
    assert_eq!(gamepad.thumbstick_count(), 4, "two members with two sticks each");

    // Stick index 2 is the first stick of the second member.
    n2.push_abs(code::ABS_X, 32767, 1_000);
    n2.push_syn(1_000);
    registry.update_device(aggregate.id()).unwrap();
    let gamepad = aggregate.as_gamepad().unwrap();
    assert_eq!(gamepad.thumbstick(2), (1.0, 0.0));
    assert_eq!(gamepad.thumbstick(0), (0.0, 0.0));
}

#[test]
fn test_gamepad_aggregate_buttons_take_the_member_maximum() {
    let hub = MockHub::new();
    let n1 = hub.add_gamepad("g1");
    hub.add_gamepad("g2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.gamepads(true).iter().map(|dev| dev.id()).collect();
    let aggregate = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();

    n1.push_key(keymap::code::BTN_SOUTH, true, 1_000);
    n1.push_syn(1_000);
    registry.update_device(aggregate.id()).unwrap();
    assert!(aggregate.as_gamepad().unwrap().button_state(Button::South));
}

// ── Motors through aggregates ─────────────────────────────────────────────────

fn add_rumble_pad(hub: &MockHub, name: &str) -> MockNode {
    let node = hub.add_gamepad(name);
    node.set_force(ForceCapabilities {
        kinds: [ForceKind::Rumble].into_iter().collect(),
        supports_gain: true,
        supports_autocenter: false,
        max_effects: 4,
    });
    node
}

#[test]
fn test_aggregate_motors_append_member_motors_in_order() {
    let hub = MockHub::new();
    add_rumble_pad(&hub, "g1");
    let n2 = add_rumble_pad(&hub, "g2");
    let registry = make_connected(&hub);
    let g1 = device_named(&registry, "g1");
    let g2 = device_named(&registry, "g2");
    let aggregate = registry
        .aggregate(&[g1.id(), g2.id()], DeviceType::Unknown)
        .unwrap()
        .unwrap();

    registry.update_device(aggregate.id()).unwrap();
    assert_eq!(aggregate.motor_count(), 2);
    assert!(aggregate.supports_force(1, ForceKind::Rumble));

    // Motor 1 belongs to the second member; the force lands there.
    let force = aggregate.try_create_force(1, ForceKind::Rumble).unwrap();
    assert_eq!(force.device().unwrap().id(), g2.id());
    assert_eq!(force.motor_index(), 0, "member-local motor index");
    assert_eq!(n2.uploads().len(), 1);

    // The aggregate can look the force up and destroy it.
    assert!(aggregate.force(force.id()).is_some());
    aggregate.destroy_force(force.id());
    assert!(aggregate.force(force.id()).is_none());
    assert_eq!(n2.erased().len(), 1);
}

#[test]
fn test_aggregate_gain_reads_and_writes_member_motors() {
    let hub = MockHub::new();
    add_rumble_pad(&hub, "g1");
    add_rumble_pad(&hub, "g2");
    let registry = make_connected(&hub);
    let g1 = device_named(&registry, "g1");
    let g2 = device_named(&registry, "g2");
    let aggregate = registry
        .aggregate(&[g1.id(), g2.id()], DeviceType::Unknown)
        .unwrap()
        .unwrap();
    registry.update_device(aggregate.id()).unwrap();

    aggregate.set_gain(1, 0.5);
    assert_eq!(aggregate.gain(1), 0.5);
    assert_eq!(g2.gain(0), 0.5, "the write went to the member's motor");
    assert_eq!(g1.gain(0), 1.0);
}

// ── Cascade destruction ───────────────────────────────────────────────────────

#[test]
fn test_destroying_a_member_cascades_through_the_hierarchy() {
    let hub = MockHub::new();
    hub.add_gamepad("g1");
    hub.add_gamepad("g2");
    hub.add_gamepad("g3");
    let registry = Rc::new(Registry::with_provider(hub.provider()));
    registry.discover().unwrap();
    registry.update_all().unwrap();

    let d1 = device_named(&registry, "g1");
    let d2 = device_named(&registry, "g2");
    let d3 = device_named(&registry, "g3");
    let a = registry
        .aggregate(&[d1.id(), d2.id()], DeviceType::Unknown)
        .unwrap()
        .unwrap();
    let b = registry
        .aggregate(&[a.id(), d3.id()], DeviceType::Unknown)
        .unwrap()
        .unwrap();

    let destroyed = Rc::new(RefCell::new(Vec::new()));
    {
        let destroyed = Rc::clone(&destroyed);
        registry
            .register_status_callback(None, Some(DeviceStatus::Destroyed), move |dev, _| {
                destroyed.borrow_mut().push(dev.id());
            })
            .unwrap();
    }

    registry.destroy_device(d1.id()).unwrap();

    // The member falls first, then the aggregate that contained it, then
    // the aggregate above that.
    assert_eq!(*destroyed.borrow(), vec![d1.id(), a.id(), b.id()]);
    assert!(registry.device(d1.id()).is_none());
    assert!(registry.device(a.id()).is_none());
    assert!(registry.device(b.id()).is_none());

    // Unrelated devices survive, free of stale links.
    assert!(registry.device(d2.id()).is_some());
    assert!(registry.device(d3.id()).is_some());
    assert_eq!(registry.device_count(false), 2);
    registry.update_all().unwrap();
    assert!(d2.is_connected());
}

#[test]
fn test_destroying_the_aggregate_leaves_members_alive() {
    let hub = MockHub::new();
    hub.add_mouse("m1");
    hub.add_mouse("m2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.mice(true).iter().map(|dev| dev.id()).collect();
    let aggregate = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();

    registry.destroy_device(aggregate.id()).unwrap();
    assert!(registry.device(aggregate.id()).is_none());
    assert_eq!(registry.mice(false).len(), 2);

    // With the links gone, the members may form a fresh aggregate.
    let fresh = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();
    assert_ne!(fresh.id(), aggregate.id());
}

#[test]
fn test_destroy_all_handles_hierarchies() {
    let hub = MockHub::new();
    hub.add_mouse("m1");
    hub.add_mouse("m2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.mice(true).iter().map(|dev| dev.id()).collect();
    registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();

    registry.destroy_all().unwrap();
    assert_eq!(registry.device_count(false), 0);
}

#[test]
fn test_destroyed_aggregate_handles_read_as_disconnected() {
    let hub = MockHub::new();
    hub.add_mouse("m1");
    hub.add_mouse("m2");
    let registry = make_connected(&hub);
    let ids: Vec<_> = registry.mice(true).iter().map(|dev| dev.id()).collect();
    let aggregate = registry.aggregate(&ids, DeviceType::Unknown).unwrap().unwrap();
    registry.update_device(aggregate.id()).unwrap();
    assert!(aggregate.is_connected());

    registry.destroy_device(aggregate.id()).unwrap();
    assert!(!aggregate.is_connected());
    assert_eq!(aggregate.display_name(), "");
}
