//! The per-channel input cell.
//!
//! Every button, key, and trigger is backed by one [`InputCell`]: the
//! timestamp of the last accepted digital transition, the current digital
//! state, the press threshold, and the normalized analog value. Devices fold
//! raw events into cells and read them back through getters; the cell is the
//! only place where the analog→digital decision is made.
//!
//! # Anti-bounce rule
//!
//! The digital state follows the analog value through a hysteresis band
//! around the threshold `t`: with margin `m = min(t, 1 - t) * 0.025`, a
//! pressed cell releases only when the value drops to `t - m` or below, and a
//! released cell presses only when the value rises above `t + m`. Values that
//! hover exactly around the threshold therefore cannot flap the state.

/// Microseconds since a fixed epoch. Zero is reserved for "never written".
pub type Timestamp = u64;

/// Fraction of the threshold headroom used as the hysteresis margin.
const ANTI_BOUNCE: f32 = 0.025;

/// Applies the hysteresis rule: returns the new digital state for an analog
/// `value` given the `threshold` and the `current` digital state.
pub fn digital_state(value: f32, threshold: f32, current: bool) -> bool {
    let m = threshold.min(1.0 - threshold) * ANTI_BOUNCE;
    value > if current { threshold - m } else { threshold + m }
}

/// Seconds elapsed from `first` to `second`; infinite when `first` is the
/// reserved "never written" timestamp.
pub fn timestamp_delta_seconds(first: Timestamp, second: Timestamp) -> f32 {
    if first != 0 {
        second.wrapping_sub(first) as f32 * 1e-6
    } else {
        f32::INFINITY
    }
}

/// Result of folding one observation into a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellWrite {
    /// Whether the cell was actually modified (analog value changed, digital
    /// state changed, or a first write that lands pressed). Callers use this
    /// to decide whether to emit a change callback.
    pub changed: bool,
    /// The digital state after the write.
    pub pressed: bool,
}

/// One input channel: timestamp, digital state, threshold, analog value.
///
/// The state bit would fit in the timestamp's unused high bit, but packing
/// buys nothing once alignment pads the record, so the flag is explicit.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct InputCell {
    timestamp: Timestamp,
    pressed: bool,
    threshold: f32,
    value: f32,
}

impl InputCell {
    /// Timestamp of the most recent accepted digital transition, or 0 if the
    /// cell has never been written.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Current digital state.
    pub fn pressed(&self) -> bool {
        self.pressed
    }

    /// Current press threshold in `[0, 1]`.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Sets the press threshold, clamped to `[0, 1]`. Takes effect on the
    /// next write; the stored digital state is not recomputed.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold.clamp(0.0, 1.0);
    }

    /// Current normalized analog value in `[0, 1]`.
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Seconds since the last digital transition as of `now`; infinite if the
    /// cell has never been written.
    pub fn age_seconds(&self, now: Timestamp) -> f32 {
        timestamp_delta_seconds(self.timestamp, now)
    }

    /// Folds a new observation into the cell.
    ///
    /// The digital state is recomputed under the anti-bounce rule. On a state
    /// change (or the cell's very first write) the timestamp is refreshed; on
    /// a value change (or first write) the analog value is stored. The write
    /// counts as a change when the value or state differ from before, or when
    /// the first write immediately lands in the pressed state.
    pub fn apply(&mut self, new_value: f32, timestamp: Timestamp) -> CellWrite {
        let old_state = self.pressed;
        let new_state = digital_state(new_value, self.threshold, old_state);
        let value_changed = new_value != self.value;
        let state_changed = new_state != old_state;
        let first_write = self.timestamp == 0;

        if state_changed || first_write {
            self.timestamp = timestamp;
            self.pressed = new_state;
        }
        if value_changed || first_write {
            self.value = new_value;
        }

        CellWrite {
            changed: value_changed || state_changed || (first_write && new_state),
            pressed: new_state,
        }
    }

    /// Keyboard variant of [`apply`](Self::apply) that keeps a shared
    /// pressed-key counter in sync with digital transitions.
    ///
    /// On the very first write the previous digital state is a spurious
    /// `false`, so a first write that stays released must not decrement the
    /// counter.
    pub fn apply_counted(
        &mut self,
        new_value: f32,
        timestamp: Timestamp,
        counter: &mut u32,
    ) -> CellWrite {
        let old_state = self.pressed;
        let new_state = digital_state(new_value, self.threshold, old_state);
        let value_changed = new_value != self.value;
        let state_changed = new_state != old_state;
        let first_write = self.timestamp == 0;

        if state_changed || first_write {
            self.timestamp = timestamp;
            self.pressed = new_state;
            if new_state {
                *counter += 1;
            } else if !first_write {
                *counter = counter.saturating_sub(1);
            }
        }
        if value_changed || first_write {
            self.value = new_value;
        }

        CellWrite {
            changed: value_changed || state_changed || (first_write && new_state),
            pressed: new_state,
        }
    }

    /// Returns the cell to its never-written state, keeping nothing.
    pub fn reset(&mut self) {
        *self = InputCell::default();
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
