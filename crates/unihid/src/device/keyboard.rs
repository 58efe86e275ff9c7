//! Keyboard state replication.
//!
//! One cell per cross-platform key, plus a pressed-key counter kept in sync
//! with digital transitions through the counted cell fold. Native codes with
//! no table entry are dropped before they reach a cell.

use unihid_core::cell::{timestamp_delta_seconds, InputCell, Timestamp};
use unihid_core::deduce::KeyBitmap;
use unihid_core::keymap;
use unihid_core::Key;

use std::cell::{Cell, RefCell};

use crate::bridge::{EventClass, RawEvent};
use crate::registry::Registry;

use super::{Device, Keyboard};

pub(crate) struct KeyboardState {
    pub(crate) cells: RefCell<[InputCell; Key::COUNT]>,
    pub(crate) pressed: Cell<u32>,
}

impl KeyboardState {
    pub(crate) fn new() -> Self {
        Self {
            cells: RefCell::new([InputCell::default(); Key::COUNT]),
            pressed: Cell::new(0),
        }
    }

    pub(crate) fn reset(&self) {
        for cell in self.cells.borrow_mut().iter_mut() {
            cell.reset();
        }
        self.pressed.set(0);
    }
}

/// Folds one key observation, keeping the pressed counter consistent before
/// any callback can read it.
pub(crate) fn apply_key(
    dev: &Device,
    state: &KeyboardState,
    reg: &Registry,
    key: Key,
    value: f32,
    timestamp: Timestamp,
) {
    let write = {
        let mut counter = state.pressed.get();
        let mut cells = state.cells.borrow_mut();
        let write = cells[key.index()].apply_counted(value, timestamp, &mut counter);
        drop(cells);
        state.pressed.set(counter);
        write
    };
    if write.changed {
        reg.emit_key(dev, key, value, write.pressed);
    }
}

/// Folds one sync-delimited group of events into the keyboard state.
pub(crate) fn handle_group(
    dev: &Device,
    state: &KeyboardState,
    events: &[RawEvent],
    reg: &Registry,
) {
    for ev in events {
        if ev.class != EventClass::Key {
            continue;
        }
        let Some(key) = keymap::key_from_code(ev.code) else {
            // No cross-platform representation; dropped silently.
            continue;
        };
        let value = if ev.value != 0 { 1.0 } else { 0.0 };
        apply_key(dev, state, reg, key, value, ev.timestamp);
    }
}

/// Rebuilds every key's state from the global key bitmap after a buffer
/// overrun. Running all keys through the counted fold restores the true
/// pressed count even when press or release events were lost.
pub(crate) fn resync(
    dev: &Device,
    state: &KeyboardState,
    reg: &Registry,
    keys: &KeyBitmap,
    timestamp: Timestamp,
) {
    for key in Key::all() {
        let value = if keys.get(keymap::key_to_code(key)) { 1.0 } else { 0.0 };
        apply_key(dev, state, reg, key, value, timestamp);
    }
}

impl Keyboard<'_> {
    /// Number of keys currently pressed; 0 while disconnected. Hardware
    /// ghosting limits may cap this below the physical truth.
    pub fn num_keys_pressed(&self) -> u32 {
        if self.dev.is_connected() {
            self.state.pressed.get()
        } else {
            0
        }
    }

    /// Sets one key's press threshold, clamped to `[0, 1]`.
    pub fn set_key_threshold(&self, key: Key, threshold: f32) {
        self.state.cells.borrow_mut()[key.index()].set_threshold(threshold);
    }

    /// Sets every key's press threshold.
    pub fn set_global_threshold(&self, threshold: f32) {
        for cell in self.state.cells.borrow_mut().iter_mut() {
            cell.set_threshold(threshold);
        }
    }

    /// One key's threshold. The default is 0.
    pub fn key_threshold(&self, key: Key) -> f32 {
        self.state.cells.borrow()[key.index()].threshold()
    }

    /// One key's normalized analog value in `[0, 1]`.
    pub fn key_value(&self, key: Key) -> f32 {
        if self.dev.is_connected() {
            self.state.cells.borrow()[key.index()].value()
        } else {
            0.0
        }
    }

    /// One key's digital state.
    pub fn key_state(&self, key: Key) -> bool {
        self.key_state_with_age(key).0
    }

    /// One key's digital state plus seconds since its last transition. The
    /// age is infinite for keys that were never touched.
    pub fn key_state_with_age(&self, key: Key) -> (bool, f32) {
        if self.dev.is_connected() {
            let cells = self.state.cells.borrow();
            let cell = &cells[key.index()];
            let age = timestamp_delta_seconds(cell.timestamp(), self.dev.last_update.get());
            (cell.pressed(), age)
        } else {
            (false, f32::INFINITY)
        }
    }
}
