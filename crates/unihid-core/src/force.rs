//! Force-feedback domain types.
//!
//! A force is one effect instance applied by one motor: a rumble, a constant
//! or ramped push, a periodic wave, or a condition effect that reacts to the
//! axis position (spring, friction, damper, inertia). The parameter records
//! here are platform-neutral; translation into native effect descriptors
//! lives in [`crate::effect`].

use serde::{Deserialize, Serialize};

/// All force kinds a motor can support.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ForceKind {
    /// Classic vibration. The least expressive kind, but the most widely
    /// supported, which makes it the usual fallback.
    Rumble = 0,
    /// Constant amount of force.
    Constant,
    /// Force that changes linearly over the effect duration.
    Ramp,
    /// Periodic force, sine wave.
    Sine,
    /// Periodic force, triangle wave.
    Triangle,
    /// Periodic force, square wave.
    Square,
    /// Periodic force, upward sawtooth wave.
    SawtoothUp,
    /// Periodic force, downward sawtooth wave.
    SawtoothDown,
    /// Condition force opposing displacement from a center.
    Spring,
    /// Condition force mimicking friction.
    Friction,
    /// Condition force mimicking damping.
    Damper,
    /// Condition force mimicking inertia.
    Inertia,
}

impl ForceKind {
    /// Total number of force kinds.
    pub const COUNT: usize = 12;

    /// The parameter family this kind is configured with.
    pub fn family(self) -> ForceFamily {
        match self {
            ForceKind::Rumble => ForceFamily::Rumble,
            ForceKind::Constant => ForceFamily::Constant,
            ForceKind::Ramp => ForceFamily::Ramp,
            ForceKind::Sine
            | ForceKind::Triangle
            | ForceKind::Square
            | ForceKind::SawtoothUp
            | ForceKind::SawtoothDown => ForceFamily::Periodic,
            ForceKind::Spring | ForceKind::Friction | ForceKind::Damper | ForceKind::Inertia => {
                ForceFamily::Condition
            }
        }
    }

    /// Whether this is one of the condition kinds.
    pub fn is_condition(self) -> bool {
        self.family() == ForceFamily::Condition
    }

    /// Iterates over every kind in discriminant order.
    pub fn all() -> impl Iterator<Item = ForceKind> {
        [
            ForceKind::Rumble,
            ForceKind::Constant,
            ForceKind::Ramp,
            ForceKind::Sine,
            ForceKind::Triangle,
            ForceKind::Square,
            ForceKind::SawtoothUp,
            ForceKind::SawtoothDown,
            ForceKind::Spring,
            ForceKind::Friction,
            ForceKind::Damper,
            ForceKind::Inertia,
        ]
        .into_iter()
    }
}

/// Parameter families shared by several [`ForceKind`]s.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ForceFamily {
    Rumble,
    Constant,
    Ramp,
    Periodic,
    Condition,
}

/// A set of force kinds, used for motor capability queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForceKindSet(u16);

impl ForceKindSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Adds a kind to the set.
    pub fn insert(&mut self, kind: ForceKind) {
        self.0 |= 1 << kind as u16;
    }

    /// Returns whether the set contains `kind`.
    pub fn contains(&self, kind: ForceKind) -> bool {
        self.0 & (1 << kind as u16) != 0
    }

    /// Returns whether the set contains any kind at all.
    pub fn any(&self) -> bool {
        self.0 != 0
    }
}

impl FromIterator<ForceKind> for ForceKindSet {
    fn from_iter<T: IntoIterator<Item = ForceKind>>(iter: T) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

/// Last-known playback state of a force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ForceStatus {
    /// The driver or runtime does not report playback state.
    Unknown = 0,
    /// The force is known to be stopped.
    Inactive,
    /// The force is known to be playing.
    Active,
}

/// Attack/sustain/release envelope bounding an effect.
///
/// Gains are in `[0, 1]`; times are seconds. When the three times sum to more
/// than [`ForceEnvelope::MAX_TOTAL_SECONDS`] the translation layer scales all
/// of them down uniformly so the sum lands exactly on the cap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ForceEnvelope {
    pub attack_time: f32,
    pub attack_gain: f32,
    pub sustain_time: f32,
    pub sustain_gain: f32,
    pub release_time: f32,
    pub release_gain: f32,
}

impl ForceEnvelope {
    /// Maximum total time any force can be active, in seconds.
    pub const MAX_TOTAL_SECONDS: f32 = 32.0;
}

/// Parameters for [`ForceKind::Rumble`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RumbleParams {
    /// Intensity of the low-frequency motor in `[0, 1]`, if present.
    pub low_frequency: f32,
    /// Intensity of the high-frequency motor in `[0, 1]`, if present.
    pub high_frequency: f32,
}

/// Parameters for [`ForceKind::Constant`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConstantParams {
    pub envelope: ForceEnvelope,
    /// Raw amount of force applied (affected by gain).
    pub magnitude: f32,
}

/// Parameters for [`ForceKind::Ramp`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RampParams {
    pub envelope: ForceEnvelope,
    /// Force applied at the start of the ramp.
    pub magnitude_start: f32,
    /// Force applied at the end of the ramp.
    pub magnitude_end: f32,
}

/// Parameters for the periodic kinds (sine through sawtooth-down).
///
/// The waveform itself is fixed by the force's creation kind, not by the
/// parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PeriodicParams {
    pub envelope: ForceEnvelope,
    /// Peak amount of force applied.
    pub magnitude: f32,
    /// Wave frequency in Hz.
    pub frequency: f32,
    /// Horizontal shift of the wave in `[0, 1]`.
    pub phase: f32,
    /// Vertical shift of the wave, in magnitude units.
    pub offset: f32,
}

/// Parameters for the condition kinds (spring, friction, damper, inertia).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionParams {
    /// Raw amount of force applied.
    pub magnitude: f32,
    /// Maximum force applied in the left/negative area.
    pub left_saturation: f32,
    /// Maximum force applied in the right/positive area.
    pub right_saturation: f32,
    /// Force multiplier for the left/negative area in `[-1, 1]`.
    pub left_coefficient: f32,
    /// Force multiplier for the right/positive area in `[-1, 1]`.
    pub right_coefficient: f32,
    /// Area around the center in which no force is applied, in `[0, 1]`.
    pub deadzone: f32,
    /// Deadzone offset in `[-1, 1]`.
    pub center: f32,
}

/// The parameters of a force, tagged by family.
///
/// A force created with a given [`ForceKind`] only accepts parameters of the
/// matching family; writing any other family is rejected without side
/// effects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ForceParams {
    Rumble(RumbleParams),
    Constant(ConstantParams),
    Ramp(RampParams),
    Periodic(PeriodicParams),
    Condition(ConditionParams),
}

impl ForceParams {
    /// Zeroed parameters of the family matching `kind`.
    pub fn default_for(kind: ForceKind) -> Self {
        match kind.family() {
            ForceFamily::Rumble => ForceParams::Rumble(RumbleParams::default()),
            ForceFamily::Constant => ForceParams::Constant(ConstantParams::default()),
            ForceFamily::Ramp => ForceParams::Ramp(RampParams::default()),
            ForceFamily::Periodic => ForceParams::Periodic(PeriodicParams::default()),
            ForceFamily::Condition => ForceParams::Condition(ConditionParams::default()),
        }
    }

    /// The family this parameter record belongs to.
    pub fn family(&self) -> ForceFamily {
        match self {
            ForceParams::Rumble(_) => ForceFamily::Rumble,
            ForceParams::Constant(_) => ForceFamily::Constant,
            ForceParams::Ramp(_) => ForceFamily::Ramp,
            ForceParams::Periodic(_) => ForceFamily::Periodic,
            ForceParams::Condition(_) => ForceFamily::Condition,
        }
    }

    /// Whether these parameters can configure a force of `kind`.
    pub fn matches_kind(&self, kind: ForceKind) -> bool {
        self.family() == kind.family()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_families_partition_the_twelve_kinds() {
        let condition_kinds = ForceKind::all().filter(|k| k.is_condition()).count();
        assert_eq!(condition_kinds, 4);
        let periodic_kinds = ForceKind::all()
            .filter(|k| k.family() == ForceFamily::Periodic)
            .count();
        assert_eq!(periodic_kinds, 5);
        assert_eq!(ForceKind::all().count(), ForceKind::COUNT);
    }

    #[test]
    fn test_default_params_match_their_kind() {
        for kind in ForceKind::all() {
            let params = ForceParams::default_for(kind);
            assert!(params.matches_kind(kind), "{kind:?}");
        }
    }

    #[test]
    fn test_params_reject_foreign_kind() {
        let params = ForceParams::Rumble(RumbleParams::default());
        assert!(!params.matches_kind(ForceKind::Spring));
        // Periodic params fit any of the five waveform kinds.
        let params = ForceParams::Periodic(PeriodicParams::default());
        assert!(params.matches_kind(ForceKind::Sine));
        assert!(params.matches_kind(ForceKind::SawtoothDown));
        assert!(!params.matches_kind(ForceKind::Rumble));
    }

    #[test]
    fn test_force_kind_set_insert_and_query() {
        let mut set = ForceKindSet::empty();
        assert!(!set.any());
        set.insert(ForceKind::Rumble);
        set.insert(ForceKind::Sine);
        assert!(set.contains(ForceKind::Rumble));
        assert!(set.contains(ForceKind::Sine));
        assert!(!set.contains(ForceKind::Spring));
        assert!(set.any());
    }

    #[test]
    fn test_force_kind_set_from_iterator() {
        let set: ForceKindSet = ForceKind::all().collect();
        for kind in ForceKind::all() {
            assert!(set.contains(kind));
        }
    }
}
