//! Normalization of absolute-axis readings.
//!
//! Bridges report absolute axes as raw integers inside a device-specific
//! `[min, max]` range. The normalizer maps that range onto `[-1, +1]` with
//! zero as the fixed midpoint: negative raw values scale by the negative
//! subrange, positive raw values by the positive subrange. Both inverse
//! factors are precomputed at construction so per-event normalization is two
//! multiplies and a clamp, with no range recomputation.

/// Raw range and current value of one absolute axis, as queried from a
/// bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AbsAxisInfo {
    pub minimum: i32,
    pub maximum: i32,
    pub value: i32,
}

/// Precomputed affine scaling from a raw axis range into `[-1, +1]`.
///
/// The default normalizer has an empty range and maps every input to 0.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AxisNormalizer {
    min: i32,
    max: i32,
    inv_negative: f64,
    inv_positive: f64,
}

impl AxisNormalizer {
    /// Builds a normalizer for the raw range `[min, max]`.
    ///
    /// Degenerate ranges (`max <= min`) produce the zero normalizer.
    pub fn new(min: i32, max: i32) -> Self {
        if max <= min {
            return Self::default();
        }

        // The negative subrange runs from min up to min(max, 0); the positive
        // subrange from max(min, 0) up to max. An absent subrange gets an
        // inverse factor of 0 so its side normalizes to 0.
        let neg_floor = max.min(0);
        let pos_floor = min.max(0);
        let inv_negative = if neg_floor > min {
            1.0 / f64::from(neg_floor - min)
        } else {
            0.0
        };
        let inv_positive = if max > pos_floor {
            1.0 / f64::from(max - pos_floor)
        } else {
            0.0
        };

        Self { min, max, inv_negative, inv_positive }
    }

    /// Normalizes a raw reading into `[-1, +1]`.
    pub fn normalize(&self, raw: i32) -> f32 {
        if self.max <= self.min {
            return 0.0;
        }
        let raw = raw.clamp(self.min, self.max);
        if raw < 0 {
            let floor = self.max.min(0);
            ((f64::from(raw - floor) * self.inv_negative) as f32).clamp(-1.0, 0.0)
        } else {
            let floor = self.min.max(0);
            ((f64::from(raw - floor) * self.inv_positive) as f32).clamp(0.0, 1.0)
        }
    }
}

/// One-shot normalization of an axis reading without keeping a normalizer.
pub fn normalize_abs(info: AbsAxisInfo) -> f32 {
    AxisNormalizer::new(info.minimum, info.maximum).normalize(info.value)
}

// ── Tests ─────────────────────────────────────────────────────────────────────
