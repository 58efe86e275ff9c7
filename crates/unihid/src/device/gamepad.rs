//! Gamepad state replication.
//!
//! Sixteen button cells plus two thumbsticks reporting normalized positions
//! in `[-1, +1]` with the vertical axis negated so positive is up. Triggers
//! and the dpad arrive either as absolute axes or as digital key events,
//! depending on the hardware:
//!
//! - A dpad exposed as a hat axis is *digitalized*: values on one side of
//!   zero drive one dpad button, values on the other side drive the
//!   opposite, each through the normal cell rule.
//! - When a button has an absolute axis behind it, later digital events for
//!   the same button are ignored; the analog stream is the source of truth
//!   for hardware that sends both.
//!
//! Within one sync group, X/Y changes to the same thumbstick coalesce into a
//! single observation so callbacks see whole positions, not half-updated
//! ones.

use unihid_core::axis::{normalize_abs, AbsAxisInfo, AxisNormalizer};
use unihid_core::cell::{timestamp_delta_seconds, InputCell, Timestamp};
use unihid_core::deduce::KeyBitmap;
use unihid_core::keymap::{self, code};
use unihid_core::Button;

use std::cell::RefCell;

use crate::bridge::{EventClass, RawEvent};
use crate::registry::Registry;

use super::{Device, Gamepad, Source};

/// Thumbsticks on a physical gamepad.
pub(crate) const NUM_THUMBSTICKS: usize = 2;

/// Trigger slots: `(axis code, slot index, button)` in query order.
const TRIGGER_AXES: [(u16, usize, Button); 4] = [
    (code::ABS_HAT1Y, 0, Button::L1),
    (code::ABS_HAT1X, 1, Button::R1),
    (code::ABS_HAT2Y, 2, Button::L2),
    (code::ABS_HAT2X, 3, Button::R2),
];

/// Dpad hat axes: `(axis code, slot index, positive button, negative button)`.
const DPAD_AXES: [(u16, usize, Button, Button); 2] = [
    (code::ABS_HAT0X, 0, Button::DpadRight, Button::DpadLeft),
    (code::ABS_HAT0Y, 1, Button::DpadUp, Button::DpadDown),
];

/// Buttons that are always digital and resync straight from the key bitmap.
const DIGITAL_ONLY_BUTTONS: [Button; 8] = [
    Button::North,
    Button::South,
    Button::West,
    Button::East,
    Button::ThumbLeft,
    Button::ThumbRight,
    Button::Select,
    Button::Start,
];

/// Normalizers installed from the connected node's axis ranges.
#[derive(Default)]
pub(crate) struct GamepadNorms {
    /// X, Y, RX, RY in that order; stick `t` uses slots `2t` and `2t + 1`.
    pub stick_axes: [AxisNormalizer; NUM_THUMBSTICKS * 2],
    pub triggers: [AxisNormalizer; 4],
    pub dpad: [AxisNormalizer; 2],
    /// Buttons backed by an absolute axis; digital events for them are
    /// ignored.
    pub analog_button: [bool; Button::COUNT],
}

pub(crate) struct GamepadState {
    pub(crate) buttons: RefCell<[InputCell; Button::COUNT]>,
    /// Normalized stick positions; fixed at two entries on physical pads,
    /// grows to the member sum on aggregates.
    pub(crate) sticks: RefCell<Vec<[f32; 2]>>,
    pub(crate) norms: RefCell<GamepadNorms>,
}

impl GamepadState {
    pub(crate) fn new_physical() -> Self {
        Self {
            buttons: RefCell::new([InputCell::default(); Button::COUNT]),
            sticks: RefCell::new(vec![[0.0, 0.0]; NUM_THUMBSTICKS]),
            norms: RefCell::new(GamepadNorms::default()),
        }
    }

    pub(crate) fn new_aggregate() -> Self {
        Self {
            buttons: RefCell::new([InputCell::default(); Button::COUNT]),
            sticks: RefCell::new(Vec::new()),
            norms: RefCell::new(GamepadNorms::default()),
        }
    }

    pub(crate) fn reset(&self) {
        for cell in self.buttons.borrow_mut().iter_mut() {
            cell.reset();
        }
        let mut sticks = self.sticks.borrow_mut();
        for stick in sticks.iter_mut() {
            *stick = [0.0, 0.0];
        }
        *self.norms.borrow_mut() = GamepadNorms::default();
    }
}

/// Snapshot of absolute-axis state taken before a buffer-overrun resync, so
/// the bridge borrow is released before any callback runs.
pub(crate) struct AbsSnapshot {
    pub dpad: [Option<AbsAxisInfo>; 2],
    pub triggers: [Option<AbsAxisInfo>; 4],
    pub sticks: [Option<AbsAxisInfo>; NUM_THUMBSTICKS * 2],
}

impl AbsSnapshot {
    pub(crate) fn query(bridge: &mut dyn crate::bridge::DeviceBridge) -> Self {
        let mut snapshot = AbsSnapshot {
            dpad: [None; 2],
            triggers: [None; 4],
            sticks: [None; NUM_THUMBSTICKS * 2],
        };
        for (axis, slot, _, _) in DPAD_AXES {
            snapshot.dpad[slot] = bridge.abs_axis(axis);
        }
        for (axis, slot, _) in TRIGGER_AXES {
            snapshot.triggers[slot] = bridge.abs_axis(axis);
        }
        for (slot, axis) in [code::ABS_X, code::ABS_Y, code::ABS_RX, code::ABS_RY]
            .into_iter()
            .enumerate()
        {
            snapshot.sticks[slot] = bridge.abs_axis(axis);
        }
        snapshot
    }
}

/// Installs normalizers from the freshly connected node's axis ranges and
/// marks which buttons now have an analog source of truth.
pub(crate) fn on_connected(state: &GamepadState, snapshot: &AbsSnapshot) {
    let mut norms = state.norms.borrow_mut();
    for (_, slot, positive, negative) in DPAD_AXES {
        if let Some(info) = snapshot.dpad[slot] {
            norms.dpad[slot] = AxisNormalizer::new(info.minimum, info.maximum);
            norms.analog_button[positive.index()] = true;
            norms.analog_button[negative.index()] = true;
        }
    }
    for (_, slot, button) in TRIGGER_AXES {
        if let Some(info) = snapshot.triggers[slot] {
            norms.triggers[slot] = AxisNormalizer::new(info.minimum, info.maximum);
            norms.analog_button[button.index()] = true;
        }
    }
    for slot in 0..NUM_THUMBSTICKS * 2 {
        norms.stick_axes[slot] = match snapshot.sticks[slot] {
            Some(info) => AxisNormalizer::new(info.minimum, info.maximum),
            None => AxisNormalizer::default(),
        };
    }
}

/// X/Y changes to one thumbstick within a sync group, coalesced.
#[derive(Default)]
struct StickGroup {
    target: u32,
    x: i32,
    y: i32,
    has_target: bool,
    has_x: bool,
    has_y: bool,
}

impl StickGroup {
    fn clear(&mut self) {
        self.has_target = false;
        self.has_x = false;
        self.has_y = false;
    }

    fn set_x(&mut self, index: u32, raw: i32) {
        if self.has_target && self.target != index {
            self.clear();
        }
        self.target = index;
        self.x = raw;
        self.has_target = true;
        self.has_x = true;
    }

    fn set_y(&mut self, index: u32, raw: i32) {
        if self.has_target && self.target != index {
            self.clear();
        }
        self.target = index;
        self.y = raw;
        self.has_target = true;
        self.has_y = true;
    }
}

fn apply_button_cell(
    dev: &Device,
    state: &GamepadState,
    reg: &Registry,
    button: Button,
    value: f32,
    timestamp: Timestamp,
) {
    let write = state.buttons.borrow_mut()[button.index()].apply(value, timestamp);
    if write.changed {
        reg.emit_gamepad_button(dev, button, value, write.pressed);
    }
}

/// Drives the two digital dpad cells from one normalized hat-axis value.
fn digitalize_dpad(
    dev: &Device,
    state: &GamepadState,
    reg: &Registry,
    normalized: f32,
    timestamp: Timestamp,
    positive: Button,
    negative: Button,
) {
    apply_button_cell(dev, state, reg, positive, normalized.max(0.0), timestamp);
    apply_button_cell(dev, state, reg, negative, (-normalized).max(0.0), timestamp);
}

fn handle_digital(
    dev: &Device,
    state: &GamepadState,
    reg: &Registry,
    button: Button,
    raw: i32,
    timestamp: Timestamp,
) {
    // Hardware may send digital and analog events for the same control; once
    // a normalizer is installed the analog stream is authoritative.
    if state.norms.borrow().analog_button[button.index()] {
        return;
    }
    let value = if raw != 0 { 1.0 } else { 0.0 };
    apply_button_cell(dev, state, reg, button, value, timestamp);
}

/// Folds one sync-delimited group of events into the gamepad state.
pub(crate) fn handle_group(
    dev: &Device,
    state: &GamepadState,
    events: &[RawEvent],
    reg: &Registry,
) {
    let mut stick = StickGroup::default();

    for ev in events {
        match ev.class {
            EventClass::Absolute => match ev.code {
                code::ABS_HAT0X => {
                    let n = state.norms.borrow().dpad[0].normalize(ev.value);
                    digitalize_dpad(
                        dev,
                        state,
                        reg,
                        n,
                        ev.timestamp,
                        Button::DpadRight,
                        Button::DpadLeft,
                    );
                }
                code::ABS_HAT0Y => {
                    let n = state.norms.borrow().dpad[1].normalize(ev.value);
                    digitalize_dpad(
                        dev,
                        state,
                        reg,
                        n,
                        ev.timestamp,
                        Button::DpadUp,
                        Button::DpadDown,
                    );
                }
                code::ABS_HAT1Y | code::ABS_HAT1X | code::ABS_HAT2Y | code::ABS_HAT2X => {
                    let (slot, button) = match ev.code {
                        code::ABS_HAT1Y => (0, Button::L1),
                        code::ABS_HAT1X => (1, Button::R1),
                        code::ABS_HAT2Y => (2, Button::L2),
                        _ => (3, Button::R2),
                    };
                    let value = state.norms.borrow().triggers[slot].normalize(ev.value);
                    apply_button_cell(dev, state, reg, button, value, ev.timestamp);
                }
                code::ABS_X => stick.set_x(0, ev.value),
                code::ABS_Y => stick.set_y(0, ev.value),
                code::ABS_RX => stick.set_x(1, ev.value),
                code::ABS_RY => stick.set_y(1, ev.value),
                _ => {}
            },
            EventClass::Key => {
                if let Some(button) = keymap::button_from_code(ev.code) {
                    handle_digital(dev, state, reg, button, ev.value, ev.timestamp);
                }
            }
            _ => {}
        }
    }

    if stick.has_target {
        let index = stick.target as usize;
        let applied = {
            let norms = state.norms.borrow();
            let mut sticks = state.sticks.borrow_mut();
            sticks.get_mut(index).map(|stored| {
                let mut changed = false;
                if stick.has_x {
                    let x = norms.stick_axes[index * 2].normalize(stick.x);
                    changed |= x != stored[0];
                    stored[0] = x;
                }
                if stick.has_y {
                    // Native vertical axes grow downward; the surface
                    // reports positive-up.
                    let y = -norms.stick_axes[index * 2 + 1].normalize(stick.y);
                    changed |= y != stored[1];
                    stored[1] = y;
                }
                (changed, *stored)
            })
        };
        if let Some((true, position)) = applied {
            reg.emit_thumbstick(dev, stick.target, position[0], position[1]);
        }
    }
}

/// Rebuilds the full gamepad state after a buffer overrun, preferring
/// absolute-axis snapshots and falling back to the digital key bitmap.
pub(crate) fn resync(
    dev: &Device,
    state: &GamepadState,
    reg: &Registry,
    keys: &KeyBitmap,
    snapshot: &AbsSnapshot,
    timestamp: Timestamp,
) {
    let digital_from_bitmap = |button: Button| -> f32 {
        if keys.get(keymap::button_to_code(button)) {
            1.0
        } else {
            0.0
        }
    };

    for (_, slot, positive, negative) in DPAD_AXES {
        match snapshot.dpad[slot] {
            Some(info) => digitalize_dpad(
                dev,
                state,
                reg,
                normalize_abs(info),
                timestamp,
                positive,
                negative,
            ),
            None => {
                apply_button_cell(dev, state, reg, positive, digital_from_bitmap(positive), timestamp);
                apply_button_cell(dev, state, reg, negative, digital_from_bitmap(negative), timestamp);
            }
        }
    }

    for (_, slot, button) in TRIGGER_AXES {
        let value = match snapshot.triggers[slot] {
            Some(info) => normalize_abs(info),
            None => digital_from_bitmap(button),
        };
        apply_button_cell(dev, state, reg, button, value, timestamp);
    }

    for index in 0..NUM_THUMBSTICKS {
        let x = snapshot.sticks[index * 2].map(normalize_abs).unwrap_or(0.0);
        let y = -snapshot.sticks[index * 2 + 1].map(normalize_abs).unwrap_or(0.0);
        let changed = {
            let mut sticks = state.sticks.borrow_mut();
            let stored = &mut sticks[index];
            let changed = stored[0] != x || stored[1] != y;
            *stored = [x, y];
            changed
        };
        if changed {
            reg.emit_thumbstick(dev, index as u32, x, y);
        }
    }

    for button in DIGITAL_ONLY_BUTTONS {
        apply_button_cell(dev, state, reg, button, digital_from_bitmap(button), timestamp);
    }
}

impl Gamepad<'_> {
    /// Sets one button or trigger threshold, clamped to `[0, 1]`.
    pub fn set_button_threshold(&self, button: Button, threshold: f32) {
        self.state.buttons.borrow_mut()[button.index()].set_threshold(threshold);
    }

    /// Sets every button and trigger threshold.
    pub fn set_global_threshold(&self, threshold: f32) {
        for cell in self.state.buttons.borrow_mut().iter_mut() {
            cell.set_threshold(threshold);
        }
    }

    /// One button's threshold. The default is 0.
    pub fn button_threshold(&self, button: Button) -> f32 {
        self.state.buttons.borrow()[button.index()].threshold()
    }

    /// One button or trigger's normalized analog value in `[0, 1]`.
    pub fn button_value(&self, button: Button) -> f32 {
        if self.dev.is_connected() {
            self.state.buttons.borrow()[button.index()].value()
        } else {
            0.0
        }
    }

    /// One button's digital state.
    pub fn button_state(&self, button: Button) -> bool {
        self.button_state_with_age(button).0
    }

    /// One button's digital state plus seconds since its last transition.
    pub fn button_state_with_age(&self, button: Button) -> (bool, f32) {
        if self.dev.is_connected() {
            let cells = self.state.buttons.borrow();
            let cell = &cells[button.index()];
            let age = timestamp_delta_seconds(cell.timestamp(), self.dev.last_update.get());
            (cell.pressed(), age)
        } else {
            (false, f32::INFINITY)
        }
    }

    /// Number of thumbsticks; 0 while disconnected. Aggregates report the
    /// sum over members.
    pub fn thumbstick_count(&self) -> u32 {
        if !self.dev.is_connected() {
            return 0;
        }
        match &self.dev.source {
            Source::Physical(_) => NUM_THUMBSTICKS as u32,
            Source::Aggregate(_) => self.state.sticks.borrow().len() as u32,
        }
    }

    /// One thumbstick's position, `x` and `y` each in `[-1, +1]` with
    /// positive y pointing up. Out-of-range indices report the origin.
    pub fn thumbstick(&self, index: u32) -> (f32, f32) {
        if !self.dev.is_connected() {
            return (0.0, 0.0);
        }
        self.state
            .sticks
            .borrow()
            .get(index as usize)
            .map(|stick| (stick[0], stick[1]))
            .unwrap_or((0.0, 0.0))
    }
}
