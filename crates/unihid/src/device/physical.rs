//! Update protocol for bridge-backed devices.
//!
//! Each update tick: reconnect if necessary, then drain the node's pending
//! events without blocking. Events accumulate in a group buffer until a sync
//! report marks the group complete, at which point the typed handler folds
//! the whole group into cells. A dropped-buffer marker discards the group
//! and resynchronizes from full native state instead. Any read error flips
//! the device to disconnected; the next update retries from scratch — there
//! is no recovery attempt within a single tick.

use tracing::{debug, warn};
use unihid_core::cell::Timestamp;
use unihid_core::DeviceStatus;

use crate::bridge::{EventClass, ForceCapabilities, SYN_DROPPED, SYN_REPORT};
use crate::registry::Registry;

use super::gamepad::AbsSnapshot;
use super::{gamepad, keyboard, mouse, now_micros, Device, PhysicalLink, TypedState};

pub(crate) fn update(dev: &Device, reg: &Registry) {
    let Some(link) = dev.source.physical() else {
        return;
    };
    if !dev.is_connected() && !try_connect(dev, link, reg) {
        return;
    }

    dev.last_update.set(now_micros());
    if let TypedState::Mouse(state) = &dev.state {
        state.begin_update();
    }

    loop {
        let read = {
            let mut bridge = link.bridge.borrow_mut();
            match bridge.as_mut() {
                Some(bridge) => bridge.read_event(),
                None => return,
            }
        };
        match read {
            Ok(Some(ev)) => match ev.class {
                EventClass::Sync if ev.code == SYN_DROPPED => {
                    // Buffer overrun: the group is incomplete, drop it and
                    // rebuild from full state.
                    link.pending.borrow_mut().clear();
                    resync_after_overrun(dev, link, reg, ev.timestamp);
                    if !dev.is_connected() {
                        return;
                    }
                }
                EventClass::Sync if ev.code == SYN_REPORT => {
                    dev.last_update.set(dev.last_update.get().max(ev.timestamp));
                    let events = std::mem::take(&mut *link.pending.borrow_mut());
                    match &dev.state {
                        TypedState::Mouse(state) => mouse::handle_group(dev, state, &events, reg),
                        TypedState::Keyboard(state) => {
                            keyboard::handle_group(dev, state, &events, reg)
                        }
                        TypedState::Gamepad(state) => {
                            gamepad::handle_group(dev, state, &events, reg)
                        }
                    }
                }
                EventClass::Sync => {}
                EventClass::ForceStatus => crate::force::handle_status_event(dev, link, &ev),
                _ => link.pending.borrow_mut().push(ev),
            },
            Ok(None) => break,
            Err(err) => {
                warn!(device = %dev.id, error = %err, "bridge read failed, disconnecting");
                disconnect(dev, reg);
                return;
            }
        }
    }
}

fn try_connect(dev: &Device, link: &PhysicalLink, reg: &Registry) -> bool {
    let Some(mut bridge) = reg.open_bridge(&link.hardware_id, dev.device_type) else {
        return false;
    };

    let caps = bridge.force_capabilities();
    link.force_caps.set(caps);
    // The native gain resets with the connection; re-assert full output.
    link.gain.set(1.0);
    if caps.supports_gain {
        bridge.set_master_gain(1.0);
    }
    if caps.supports_autocenter {
        bridge.disable_autocenter();
    }

    if let TypedState::Gamepad(state) = &dev.state {
        let snapshot = AbsSnapshot::query(bridge.as_mut());
        gamepad::on_connected(state, &snapshot);
    }

    *link.bridge.borrow_mut() = Some(bridge);
    dev.connected.set(true);
    debug!(device = %dev.id, kind = ?dev.device_type, "device connected");
    reg.emit_status(dev, DeviceStatus::Connected);
    true
}

/// Transitions a physical device to disconnected: orphans its forces,
/// releases the bridge, zeroes the replicated state, and notifies status
/// callbacks. Safe to call redundantly.
pub(crate) fn disconnect(dev: &Device, reg: &Registry) {
    if !dev.is_connected() {
        return;
    }
    let Some(link) = dev.source.physical() else {
        return;
    };

    dev.connected.set(false);
    dev.last_update.set(0);
    link.pending.borrow_mut().clear();

    // Orphan before closing: releasing the effect slots needs the bridge.
    crate::force::orphan_all(dev, link);
    link.force_caps.set(ForceCapabilities::default());
    link.gain.set(0.0);
    *link.bridge.borrow_mut() = None;

    dev.state.reset();
    debug!(device = %dev.id, "device disconnected");
    reg.emit_status(dev, DeviceStatus::Disconnected);
}

fn resync_after_overrun(dev: &Device, link: &PhysicalLink, reg: &Registry, timestamp: Timestamp) {
    // Snapshot everything first so no bridge borrow is held while the typed
    // resync emits callbacks.
    let snapshot = {
        let mut bridge = link.bridge.borrow_mut();
        let Some(bridge) = bridge.as_mut() else {
            return;
        };
        match bridge.global_key_state() {
            Ok(keys) => {
                let abs = matches!(dev.state, TypedState::Gamepad(_))
                    .then(|| AbsSnapshot::query(bridge.as_mut()));
                Some((keys, abs))
            }
            Err(err) => {
                warn!(device = %dev.id, error = %err, "state query failed during resync");
                None
            }
        }
    };

    let Some((keys, abs)) = snapshot else {
        disconnect(dev, reg);
        return;
    };

    match &dev.state {
        TypedState::Mouse(state) => mouse::resync(dev, state, reg, &keys, timestamp),
        TypedState::Keyboard(state) => keyboard::resync(dev, state, reg, &keys, timestamp),
        TypedState::Gamepad(state) => {
            let abs = abs.expect("snapshot taken for gamepads above");
            gamepad::resync(dev, state, reg, &keys, &abs, timestamp);
        }
    }
}
