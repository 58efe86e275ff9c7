//! Device aggregation.
//!
//! An aggregate binds two or more devices of one type into a virtual device
//! with the same surface. Updating the aggregate updates every member in
//! order and then merges:
//!
//! - *Mouse*: member deltas (derived against a per-member previous-absolute
//!   cache) are summed; button values are the max over members; the button
//!   count is the max over members.
//! - *Keyboard*: each key's analog value is the max over members, folded
//!   through the aggregate's own cells so the digital rule and pressed
//!   counter apply to the merged value.
//! - *Gamepad*: button values are the max over members; thumbsticks are
//!   concatenated in member order, never averaged.
//!
//! The aggregate is connected iff every member was connected during its last
//! update; losing any member clears the aggregate's replicated state. Its
//! motors are the members' motors appended in order, and forces created
//! through it live on the owning member.
//!
//! Aggregates may themselves be members. Creating a *circular* chain is
//! undefined behavior (it cannot happen through this API, which fixes the
//! member list at creation); destruction still detects a cycle defensively.

use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;
use unihid_core::cell::InputCell;
use unihid_core::{Button, DeviceType, Key};

use crate::device::{keyboard, now_micros, AggregateLink, Device, MouseAccum, MouseState, TypedState};
use crate::registry::{reserve_id, DeviceId, Registry};
use crate::Result;

impl Registry {
    /// Aggregates the devices named by `ids` into one virtual device.
    ///
    /// - With a single id, the device itself is returned — no aggregate is
    ///   created.
    /// - When the same member *set* has already been aggregated, the
    ///   existing aggregate is returned; the comparison ignores order, so
    ///   `[a, b]` and `[b, a]` reuse one aggregate.
    /// - A `type_hint` other than [`DeviceType::Unknown`] additionally
    ///   requires the result to be of that type.
    ///
    /// Returns `Ok(None)` when `ids` is empty, names a missing device, or
    /// mixes device types. Duplicate ids in one call are undefined behavior.
    pub fn aggregate(
        &self,
        ids: &[DeviceId],
        type_hint: DeviceType,
    ) -> Result<Option<Rc<Device>>> {
        self.guard("aggregate")?;

        if ids.is_empty() {
            return Ok(None);
        }
        if ids.len() == 1 {
            // Single target: hand back the device itself.
            let dev = self.device(ids[0]);
            return Ok(dev
                .filter(|dev| type_hint == DeviceType::Unknown || dev.device_type() == type_hint));
        }

        if let Some(existing) = self.find_existing_aggregate(ids) {
            return Ok(Some(existing));
        }

        let mut members = Vec::with_capacity(ids.len());
        for &id in ids {
            match self.device(id) {
                Some(dev) => members.push(dev),
                None => return Ok(None),
            }
        }

        let device_type = if type_hint == DeviceType::Unknown {
            members[0].device_type()
        } else {
            type_hint
        };
        if members.iter().any(|member| member.device_type() != device_type) {
            return Ok(None);
        }

        let aggregate = Device::new_aggregate(DeviceId(reserve_id()), device_type, members);
        {
            let mut links = self.dev_to_aggr.borrow_mut();
            let link = aggregate.source.aggregate().expect("just built as aggregate");
            for member in &link.members {
                links.entry(member.id()).or_default().push(aggregate.id());
            }
        }
        debug!(device = %aggregate.id(), kind = ?device_type, members = ids.len(), "aggregate created");
        self.devices
            .borrow_mut()
            .insert(aggregate.id(), Rc::clone(&aggregate));
        Ok(Some(aggregate))
    }

    /// Finds an aggregate whose member set equals `ids`, by intersecting the
    /// members' aggregate back-references.
    fn find_existing_aggregate(&self, ids: &[DeviceId]) -> Option<Rc<Device>> {
        let candidates: HashSet<DeviceId> = {
            let links = self.dev_to_aggr.borrow();
            let mut candidates: HashSet<DeviceId> =
                links.get(&ids[0])?.iter().copied().collect();
            for id in &ids[1..] {
                let aggregates = links.get(id)?;
                candidates.retain(|candidate| aggregates.contains(candidate));
                if candidates.is_empty() {
                    return None;
                }
            }
            candidates
        };
        // Every requested id is a member of each candidate; equal member
        // counts then make the sets identical.
        candidates.into_iter().find_map(|candidate| {
            let dev = self.device(candidate)?;
            let members = dev.source.aggregate()?.members.len();
            (members == ids.len()).then_some(dev)
        })
    }
}

/// Updates an aggregate: members first, then the connection flag, then the
/// per-type merge.
pub(crate) fn update(dev: &Device, reg: &Registry) {
    let Some(link) = dev.source.aggregate() else {
        return;
    };

    let mut connected = true;
    for member in &link.members {
        member.run_update(reg);
        if !member.is_connected() {
            connected = false;
            break;
        }
    }

    if connected != dev.is_connected() {
        dev.connected.set(connected);
        if !connected {
            dev.last_update.set(0);
            link.motor_map.borrow_mut().clear();
            clear_merged_state(dev, link);
        }
    }

    if connected {
        {
            let mut motors = link.motor_map.borrow_mut();
            motors.clear();
            for (index, member) in link.members.iter().enumerate() {
                for motor in 0..member.motor_count() {
                    motors.push((index, motor));
                }
            }
        }
        dev.last_update.set(now_micros());

        match &dev.state {
            TypedState::Mouse(state) => merge_mouse(dev, link, state, reg),
            TypedState::Keyboard(state) => merge_keyboard(dev, link, state, reg),
            TypedState::Gamepad(state) => merge_gamepad(dev, link, state, reg),
        }
    }
}

fn clear_merged_state(dev: &Device, link: &AggregateLink) {
    for accum in link.mouse_prev.borrow_mut().iter_mut() {
        *accum = MouseAccum::default();
    }
    dev.state.reset();
    // Aggregate cell vectors shrink back to nothing; they are re-sized from
    // the members on the next connected update.
    match &dev.state {
        TypedState::Mouse(state) => state.buttons.borrow_mut().clear(),
        TypedState::Gamepad(state) => state.sticks.borrow_mut().clear(),
        TypedState::Keyboard(_) => {}
    }
}

fn merge_mouse(dev: &Device, link: &AggregateLink, state: &MouseState, reg: &Registry) {
    // The aggregate addresses as many buttons as its widest member.
    let mut button_count = 0u32;
    for member in &link.members {
        if let Some(mouse) = member.as_mouse() {
            button_count = button_count.max(mouse.button_count());
        }
    }
    {
        let mut buttons = state.buttons.borrow_mut();
        if buttons.len() != button_count as usize {
            buttons.clear();
            buttons.resize(button_count as usize, InputCell::default());
        }
    }

    let mut new_values = vec![0.0f32; button_count as usize];
    let (mut dx, mut dy, mut sdx, mut sdy) = (0i64, 0i64, 0i64, 0i64);
    {
        let mut prev = link.mouse_prev.borrow_mut();
        for (index, member) in link.members.iter().enumerate() {
            let Some(mouse) = member.as_mouse() else {
                continue;
            };
            let (x, y) = mouse.position();
            let (sx, sy) = mouse.scroll();
            let accum = &mut prev[index];
            if accum.available {
                dx += x - accum.x;
                dy += y - accum.y;
                sdx += sx - accum.sx;
                sdy += sy - accum.sy;
            } else {
                // First observation of this member; its whole accumulated
                // position must not count as one delta.
                accum.available = true;
            }
            accum.x = x;
            accum.y = y;
            accum.sx = sx;
            accum.sy = sy;

            let shared = button_count.min(mouse.button_count());
            for button in 0..shared {
                let value = mouse.button_value(button);
                let slot = &mut new_values[button as usize];
                *slot = slot.max(value);
            }
        }
    }

    let mut data = state.data.get();
    data.x += dx;
    data.y += dy;
    data.dx = dx;
    data.dy = dy;
    data.sx += sdx;
    data.sy += sdy;
    data.sdx = sdx;
    data.sdy = sdy;
    state.data.set(data);

    if dx != 0 || dy != 0 {
        reg.emit_mouse_move(dev, data.x, data.y, dx, dy);
    }
    if sdx != 0 || sdy != 0 {
        reg.emit_mouse_scroll(dev, data.sx, data.sy, sdx, sdy);
    }

    let timestamp = dev.last_update.get();
    for button in 0..button_count {
        let value = new_values[button as usize];
        let write = state.buttons.borrow_mut()[button as usize].apply(value, timestamp);
        if write.changed {
            reg.emit_mouse_button(dev, button, value, write.pressed);
        }
    }
}

fn merge_keyboard(
    dev: &Device,
    link: &AggregateLink,
    state: &crate::device::KeyboardState,
    reg: &Registry,
) {
    let mut new_values = [0.0f32; Key::COUNT];
    for member in &link.members {
        let Some(keyboard) = member.as_keyboard() else {
            continue;
        };
        for key in Key::all() {
            let slot = &mut new_values[key.index()];
            *slot = slot.max(keyboard.key_value(key));
        }
    }

    let timestamp = dev.last_update.get();
    for key in Key::all() {
        keyboard::apply_key(dev, state, reg, key, new_values[key.index()], timestamp);
    }
}

fn merge_gamepad(
    dev: &Device,
    link: &AggregateLink,
    state: &crate::device::GamepadState,
    reg: &Registry,
) {
    let stick_count: usize = link
        .members
        .iter()
        .filter_map(|member| member.as_gamepad())
        .map(|gamepad| gamepad.thumbstick_count() as usize)
        .sum();

    // A changed stick count means a member (re-)connected with different
    // hardware; start the concatenation over and re-announce every stick.
    let stick_reset = state.sticks.borrow().len() != stick_count;
    if stick_reset {
        let mut sticks = state.sticks.borrow_mut();
        sticks.clear();
        sticks.resize(stick_count, [0.0, 0.0]);
    }

    let mut new_values = [0.0f32; Button::COUNT];
    let mut stick_index = 0u32;
    for member in &link.members {
        let Some(gamepad) = member.as_gamepad() else {
            continue;
        };

        for stick in 0..gamepad.thumbstick_count() {
            let (x, y) = gamepad.thumbstick(stick);
            let changed = {
                let mut sticks = state.sticks.borrow_mut();
                let stored = &mut sticks[stick_index as usize];
                let changed = stored[0] != x || stored[1] != y || stick_reset;
                *stored = [x, y];
                changed
            };
            if changed {
                reg.emit_thumbstick(dev, stick_index, x, y);
            }
            stick_index += 1;
        }

        for button in Button::all() {
            let slot = &mut new_values[button.index()];
            *slot = slot.max(gamepad.button_value(button));
        }
    }

    let timestamp = dev.last_update.get();
    for button in Button::all() {
        let value = new_values[button.index()];
        let write = state.buttons.borrow_mut()[button.index()].apply(value, timestamp);
        if write.changed {
            reg.emit_gamepad_button(dev, button, value, write.pressed);
        }
    }
}
