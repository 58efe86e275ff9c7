//! Mouse state replication.
//!
//! Coordinates and scroll are accumulated signed 64-bit sums in a unit that
//! has no relation to screen space. Deltas are per-update: they are zeroed at
//! the start of every update tick and then folded from the tick's relative
//! events. Wheels come in two resolutions; when a group carries both, the
//! high-resolution events win and the low-resolution ones are dropped,
//! otherwise low-resolution notches are scaled by 120.

use unihid_core::cell::{timestamp_delta_seconds, InputCell, Timestamp};
use unihid_core::deduce::KeyBitmap;
use unihid_core::keymap::{self, code, NUM_MOUSE_BUTTONS};

use std::cell::{Cell, RefCell};

use crate::bridge::{EventClass, RawEvent};
use crate::registry::Registry;

use super::{Device, Mouse, Source};

/// Multiplier applied to low-resolution wheel notches.
const WHEEL_NOTCH: i64 = 120;

/// Accumulated mouse coordinates and their per-update deltas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MouseData {
    pub x: i64,
    pub y: i64,
    pub dx: i64,
    pub dy: i64,
    pub sx: i64,
    pub sy: i64,
    pub sdx: i64,
    pub sdy: i64,
}

/// Previous absolute totals of one aggregate member, for delta derivation.
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MouseAccum {
    pub x: i64,
    pub y: i64,
    pub sx: i64,
    pub sy: i64,
    /// False until the first observation; the first delta would otherwise
    /// jump by the member's whole accumulated position.
    pub available: bool,
}

pub(crate) struct MouseState {
    pub(crate) data: Cell<MouseData>,
    pub(crate) buttons: RefCell<Vec<InputCell>>,
}

impl MouseState {
    pub(crate) fn new_physical() -> Self {
        Self {
            data: Cell::new(MouseData::default()),
            buttons: RefCell::new(vec![InputCell::default(); NUM_MOUSE_BUTTONS]),
        }
    }

    pub(crate) fn new_aggregate() -> Self {
        Self {
            data: Cell::new(MouseData::default()),
            buttons: RefCell::new(Vec::new()),
        }
    }

    pub(crate) fn reset(&self) {
        self.data.set(MouseData::default());
        for cell in self.buttons.borrow_mut().iter_mut() {
            cell.reset();
        }
    }

    /// Zeroes the per-update deltas; runs at the start of every update tick.
    pub(crate) fn begin_update(&self) {
        let mut data = self.data.get();
        data.dx = 0;
        data.dy = 0;
        data.sdx = 0;
        data.sdy = 0;
        self.data.set(data);
    }
}

/// Folds one sync-delimited group of events into the mouse state.
pub(crate) fn handle_group(
    dev: &Device,
    state: &MouseState,
    events: &[RawEvent],
    reg: &Registry,
) {
    // Totals within this group; sync markers usually separate motion from
    // scroll, but nothing guarantees it.
    let (mut dx, mut dy) = (0i64, 0i64);
    let (mut sdx, mut sdy) = (0i64, 0i64);
    let (mut hrsdx, mut hrsdy) = (0i64, 0i64);

    for ev in events {
        match ev.class {
            EventClass::Relative => match ev.code {
                code::REL_X => dx += i64::from(ev.value),
                code::REL_Y => dy += i64::from(ev.value),
                code::REL_HWHEEL => sdx += i64::from(ev.value),
                code::REL_WHEEL => sdy += i64::from(ev.value),
                code::REL_HWHEEL_HI_RES => hrsdx += i64::from(ev.value),
                code::REL_WHEEL_HI_RES => hrsdy += i64::from(ev.value),
                _ => {}
            },
            EventClass::Key => {
                if let Some(index) = keymap::mouse_button_index(ev.code) {
                    apply_button(dev, state, reg, index, ev.value != 0, ev.timestamp);
                }
            }
            _ => {}
        }
    }

    if dx != 0 || dy != 0 {
        let mut data = state.data.get();
        data.x += dx;
        data.y += dy;
        data.dx += dx;
        data.dy += dy;
        state.data.set(data);
        reg.emit_mouse_move(dev, data.x, data.y, dx, dy);
    }

    if hrsdx != 0 || hrsdy != 0 {
        // High-resolution wheel data is present; the low-resolution notches
        // describe the same motion and are dropped.
        apply_scroll(dev, state, reg, hrsdx, hrsdy);
    } else if sdx != 0 || sdy != 0 {
        apply_scroll(dev, state, reg, sdx * WHEEL_NOTCH, sdy * WHEEL_NOTCH);
    }
}

fn apply_scroll(dev: &Device, state: &MouseState, reg: &Registry, sdx: i64, sdy: i64) {
    let mut data = state.data.get();
    data.sx += sdx;
    data.sy += sdy;
    data.sdx += sdx;
    data.sdy += sdy;
    state.data.set(data);
    reg.emit_mouse_scroll(dev, data.sx, data.sy, sdx, sdy);
}

fn apply_button(
    dev: &Device,
    state: &MouseState,
    reg: &Registry,
    index: u32,
    pressed: bool,
    timestamp: Timestamp,
) {
    let value = if pressed { 1.0 } else { 0.0 };
    let write = {
        let mut buttons = state.buttons.borrow_mut();
        match buttons.get_mut(index as usize) {
            Some(cell) => cell.apply(value, timestamp),
            None => return,
        }
    };
    if write.changed {
        reg.emit_mouse_button(dev, index, value, write.pressed);
    }
}

/// Rebuilds button state from the global key bitmap after a buffer overrun.
pub(crate) fn resync(
    dev: &Device,
    state: &MouseState,
    reg: &Registry,
    keys: &KeyBitmap,
    timestamp: Timestamp,
) {
    for index in 0..NUM_MOUSE_BUTTONS as u32 {
        let pressed = keys.get(code::BTN_LEFT + index as u16);
        apply_button(dev, state, reg, index, pressed, timestamp);
    }
}

impl Mouse<'_> {
    /// Cumulative cursor position. Zeros while disconnected.
    pub fn position(&self) -> (i64, i64) {
        let data = self.read();
        (data.x, data.y)
    }

    /// Position change between the last two updates.
    pub fn delta(&self) -> (i64, i64) {
        let data = self.read();
        (data.dx, data.dy)
    }

    /// Cumulative scroll totals.
    pub fn scroll(&self) -> (i64, i64) {
        let data = self.read();
        (data.sx, data.sy)
    }

    /// Scroll change between the last two updates.
    pub fn scroll_delta(&self) -> (i64, i64) {
        let data = self.read();
        (data.sdx, data.sdy)
    }

    /// Number of addressable buttons; 0 while disconnected. Indices 0, 1,
    /// and 2 are the left, right, and middle buttons.
    pub fn button_count(&self) -> u32 {
        match &self.dev.source {
            Source::Physical(_) => {
                if self.dev.is_connected() {
                    NUM_MOUSE_BUTTONS as u32
                } else {
                    0
                }
            }
            Source::Aggregate(_) => self.state.buttons.borrow().len() as u32,
        }
    }

    /// Sets one button's press threshold, clamped to `[0, 1]`. Out-of-range
    /// indices do nothing.
    pub fn set_button_threshold(&self, index: u32, threshold: f32) {
        if let Some(cell) = self.state.buttons.borrow_mut().get_mut(index as usize) {
            cell.set_threshold(threshold);
        }
    }

    /// Sets every button's press threshold.
    pub fn set_global_threshold(&self, threshold: f32) {
        for cell in self.state.buttons.borrow_mut().iter_mut() {
            cell.set_threshold(threshold);
        }
    }

    /// One button's threshold; 0 for out-of-range indices.
    pub fn button_threshold(&self, index: u32) -> f32 {
        self.state
            .buttons
            .borrow()
            .get(index as usize)
            .map(InputCell::threshold)
            .unwrap_or(0.0)
    }

    /// One button's normalized analog value in `[0, 1]`.
    pub fn button_value(&self, index: u32) -> f32 {
        if !self.dev.is_connected() {
            return 0.0;
        }
        self.state
            .buttons
            .borrow()
            .get(index as usize)
            .map(InputCell::value)
            .unwrap_or(0.0)
    }

    /// One button's digital state.
    pub fn button_state(&self, index: u32) -> bool {
        self.button_state_with_age(index).0
    }

    /// One button's digital state plus seconds since its last transition.
    /// The age is infinite for invalid indices and untouched buttons.
    pub fn button_state_with_age(&self, index: u32) -> (bool, f32) {
        if self.dev.is_connected() {
            if let Some(cell) = self.state.buttons.borrow().get(index as usize) {
                let age = timestamp_delta_seconds(cell.timestamp(), self.dev.last_update.get());
                return (cell.pressed(), age);
            }
        }
        (false, f32::INFINITY)
    }

    fn read(&self) -> MouseData {
        if self.dev.is_connected() {
            self.state.data.get()
        } else {
            MouseData::default()
        }
    }
}
