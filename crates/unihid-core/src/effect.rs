//! Translation of abstract force parameters into native effect descriptors.
//!
//! The evented bridge uploads effects as fixed-point records: durations in
//! milliseconds, magnitudes as symmetric signed 16-bit values, levels/phases
//! as unsigned 16-bit fractions. Each force family translates through a pure
//! function from [`ForceParams`] to an [`EffectDescriptor`]; the bridge ships
//! the descriptor verbatim. A bridge with different native units (the
//! reading-chain variant keeps unit floats, for instance) adds its own
//! translation alongside rather than reinterpreting this one.
//!
//! All out-of-range inputs clamp: magnitudes to the signed 16-bit range,
//! phase and deadzone to `[0, 1]`, coefficients to `[-1, 1]`, saturations to
//! non-negative. Envelope times scale down uniformly whenever their sum
//! exceeds [`ForceEnvelope::MAX_TOTAL_SECONDS`].

use crate::force::{ForceEnvelope, ForceKind, ForceParams};

/// Envelope portion of a native descriptor: attack and fade ramps in
/// milliseconds with 15-bit gain levels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnvelopeSpec {
    pub attack_ms: u16,
    pub attack_level: u16,
    pub fade_ms: u16,
    pub fade_level: u16,
}

/// Waveform selector for periodic effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    SawtoothUp,
    SawtoothDown,
}

/// The family-specific payload of a native effect descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffectShape {
    Rumble {
        /// Strong (low-frequency) motor magnitude.
        strong: u16,
        /// Weak (high-frequency) motor magnitude.
        weak: u16,
    },
    Constant {
        level: i16,
        envelope: EnvelopeSpec,
    },
    Ramp {
        start_level: i16,
        end_level: i16,
        envelope: EnvelopeSpec,
    },
    Periodic {
        waveform: Waveform,
        period_ms: u16,
        magnitude: i16,
        offset: i16,
        /// Horizontal shift as a 16-bit fraction of one period.
        phase: u16,
        envelope: EnvelopeSpec,
    },
    Condition {
        right_saturation: u16,
        left_saturation: u16,
        right_coefficient: i16,
        left_coefficient: i16,
        deadband: u16,
        center: i16,
    },
}

/// A complete native effect record, ready for upload through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectDescriptor {
    /// The force kind the effect was created as. Condition kinds share one
    /// shape, so bridges need this to pick the native effect type.
    pub kind: ForceKind,
    /// Total playback length in milliseconds. Families without an envelope
    /// play for the full envelope cap.
    pub duration_ms: u16,
    pub shape: EffectShape,
}

/// Playback length used by families that carry no envelope.
const FULL_DURATION_MS: u16 = (ForceEnvelope::MAX_TOTAL_SECONDS * 1e3) as u16;

/// Magnitudes are expressed in thousandths, so the representable range in
/// abstract units is ±32.767.
fn translate_magnitude(magnitude: f32) -> i16 {
    const LIMIT: f32 = i16::MAX as f32 / 1e3;
    (magnitude.clamp(-LIMIT, LIMIT) * 1e3) as i16
}

fn unit_fraction(value: f32) -> u16 {
    (value.clamp(0.0, 1.0) * f32::from(u16::MAX)) as u16
}

fn signed_fraction(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}

/// Scale factor that brings the envelope's total time under the cap.
fn envelope_scale(envelope: &ForceEnvelope) -> f32 {
    let total = envelope.attack_time.max(0.0)
        + envelope.sustain_time.max(0.0)
        + envelope.release_time.max(0.0);
    1.0 / (total / ForceEnvelope::MAX_TOTAL_SECONDS).max(1.0)
}

/// Translates an envelope into its native spec and the sustain duration.
///
/// When the three times sum beyond the cap they are scaled down uniformly, so
/// their proportions survive and the translated sum lands on the cap.
fn translate_envelope(envelope: &ForceEnvelope) -> (EnvelopeSpec, u16) {
    let m = envelope_scale(envelope);
    let duration_ms = (envelope.sustain_time.max(0.0) * m * 1e3) as u16;
    let spec = EnvelopeSpec {
        attack_ms: (envelope.attack_time.max(0.0) * m * 1e3) as u16,
        attack_level: (envelope.attack_gain.clamp(0.0, 1.0) * f32::from(i16::MAX)) as u16,
        fade_ms: (envelope.release_time.max(0.0) * m * 1e3) as u16,
        fade_level: (envelope.release_gain.clamp(0.0, 1.0) * f32::from(i16::MAX)) as u16,
    };
    (spec, duration_ms)
}

fn waveform_for(kind: ForceKind) -> Option<Waveform> {
    match kind {
        ForceKind::Sine => Some(Waveform::Sine),
        ForceKind::Triangle => Some(Waveform::Triangle),
        ForceKind::Square => Some(Waveform::Square),
        ForceKind::SawtoothUp => Some(Waveform::SawtoothUp),
        ForceKind::SawtoothDown => Some(Waveform::SawtoothDown),
        _ => None,
    }
}

/// Translates force parameters into a native descriptor for an effect created
/// as `kind`.
///
/// Returns `None` when the parameter family does not match the kind (the
/// caller reports this as a rejected write).
pub fn translate(kind: ForceKind, params: &ForceParams) -> Option<EffectDescriptor> {
    if !params.matches_kind(kind) {
        return None;
    }

    let descriptor = match params {
        ForceParams::Rumble(p) => EffectDescriptor {
            kind,
            duration_ms: FULL_DURATION_MS,
            shape: EffectShape::Rumble {
                strong: unit_fraction(p.low_frequency),
                weak: unit_fraction(p.high_frequency),
            },
        },
        ForceParams::Constant(p) => {
            let (envelope, duration_ms) = translate_envelope(&p.envelope);
            EffectDescriptor {
                kind,
                duration_ms,
                shape: EffectShape::Constant {
                    level: translate_magnitude(p.magnitude),
                    envelope,
                },
            }
        }
        ForceParams::Ramp(p) => {
            let (envelope, duration_ms) = translate_envelope(&p.envelope);
            EffectDescriptor {
                kind,
                duration_ms,
                shape: EffectShape::Ramp {
                    start_level: translate_magnitude(p.magnitude_start),
                    end_level: translate_magnitude(p.magnitude_end),
                    envelope,
                },
            }
        }
        ForceParams::Periodic(p) => {
            let (envelope, duration_ms) = translate_envelope(&p.envelope);
            let period = (1e3 / p.frequency).min(f32::from(u16::MAX));
            EffectDescriptor {
                kind,
                duration_ms,
                shape: EffectShape::Periodic {
                    // waveform_for cannot fail here: the family check above
                    // already proved the kind is periodic.
                    waveform: waveform_for(kind)?,
                    period_ms: (period as u16).max(1),
                    magnitude: translate_magnitude(p.magnitude),
                    offset: translate_magnitude(p.offset),
                    phase: unit_fraction(p.phase),
                    envelope,
                },
            }
        }
        ForceParams::Condition(p) => EffectDescriptor {
            kind,
            duration_ms: FULL_DURATION_MS,
            shape: EffectShape::Condition {
                right_saturation: translate_magnitude(p.right_saturation).max(0) as u16,
                left_saturation: translate_magnitude(p.left_saturation).max(0) as u16,
                right_coefficient: signed_fraction(p.right_coefficient),
                left_coefficient: signed_fraction(p.left_coefficient),
                deadband: unit_fraction(p.deadzone),
                center: signed_fraction(p.center),
            },
        },
    };

    Some(descriptor)
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::force::{
        ConditionParams, ConstantParams, PeriodicParams, RampParams, RumbleParams,
    };

    fn make_envelope(attack: f32, sustain: f32, release: f32) -> ForceEnvelope {
        ForceEnvelope {
            attack_time: attack,
            attack_gain: 1.0,
            sustain_time: sustain,
            sustain_gain: 1.0,
            release_time: release,
            release_gain: 0.5,
        }
    }

    #[test]
    fn test_envelope_within_cap_translates_unscaled() {
        let (spec, duration) = translate_envelope(&make_envelope(1.0, 2.0, 3.0));
        assert_eq!(spec.attack_ms, 1_000);
        assert_eq!(duration, 2_000);
        assert_eq!(spec.fade_ms, 3_000);
    }

    #[test]
    fn test_oversized_envelope_scales_uniformly_to_the_cap() {
        // 20 + 20 + 20 = 60 s, which must compress to 32 s at 1:1:1.
        let (spec, duration) = translate_envelope(&make_envelope(20.0, 20.0, 20.0));
        assert_eq!(spec.attack_ms, duration);
        assert_eq!(spec.fade_ms, duration);
        let total = u32::from(spec.attack_ms) + u32::from(duration) + u32::from(spec.fade_ms);
        // Each of the three truncates from 10666.67 ms individually.
        assert!((31_996..=32_000).contains(&total), "total was {total}");
    }

    #[test]
    fn test_ramp_descriptor_keeps_scaled_proportions() {
        let params = ForceParams::Ramp(RampParams {
            envelope: make_envelope(20.0, 20.0, 20.0),
            magnitude_start: 0.5,
            magnitude_end: 1.0,
        });
        let descriptor = translate(ForceKind::Ramp, &params).unwrap();
        let EffectShape::Ramp { start_level, end_level, envelope } = descriptor.shape else {
            panic!("expected a ramp shape");
        };
        assert_eq!(start_level, 500);
        assert_eq!(end_level, 1_000);
        assert_eq!(envelope.attack_ms, descriptor.duration_ms);
        assert_eq!(envelope.fade_ms, descriptor.duration_ms);
    }

    #[test]
    fn test_negative_envelope_times_count_as_zero() {
        let (spec, duration) = translate_envelope(&make_envelope(-5.0, 2.0, -1.0));
        assert_eq!(spec.attack_ms, 0);
        assert_eq!(duration, 2_000);
        assert_eq!(spec.fade_ms, 0);
    }

    #[test]
    fn test_magnitude_clamps_to_signed_16_bit() {
        assert_eq!(translate_magnitude(1.0), 1_000);
        assert_eq!(translate_magnitude(-1.0), -1_000);
        assert_eq!(translate_magnitude(1_000.0), i16::MAX);
        assert_eq!(translate_magnitude(-1_000.0), -i16::MAX);
    }

    #[test]
    fn test_rumble_translates_to_unit_fractions_with_full_duration() {
        let params = ForceParams::Rumble(RumbleParams {
            low_frequency: 1.0,
            high_frequency: 0.5,
        });
        let descriptor = translate(ForceKind::Rumble, &params).unwrap();
        assert_eq!(descriptor.duration_ms, 32_000);
        let EffectShape::Rumble { strong, weak } = descriptor.shape else {
            panic!("expected a rumble shape");
        };
        assert_eq!(strong, u16::MAX);
        assert_eq!(weak, u16::MAX / 2);
    }

    #[test]
    fn test_periodic_period_comes_from_frequency() {
        let params = ForceParams::Periodic(PeriodicParams {
            frequency: 50.0,
            magnitude: 1.0,
            phase: 0.5,
            ..Default::default()
        });
        let descriptor = translate(ForceKind::Square, &params).unwrap();
        let EffectShape::Periodic { waveform, period_ms, phase, .. } = descriptor.shape else {
            panic!("expected a periodic shape");
        };
        assert_eq!(waveform, Waveform::Square);
        assert_eq!(period_ms, 20);
        assert_eq!(phase, u16::MAX / 2);
    }

    #[test]
    fn test_periodic_period_has_a_floor_of_one_ms() {
        let params = ForceParams::Periodic(PeriodicParams {
            frequency: 1e9,
            ..Default::default()
        });
        let descriptor = translate(ForceKind::Sine, &params).unwrap();
        let EffectShape::Periodic { period_ms, .. } = descriptor.shape else {
            panic!("expected a periodic shape");
        };
        assert_eq!(period_ms, 1);
    }

    #[test]
    fn test_condition_saturations_clamp_to_non_negative() {
        let params = ForceParams::Condition(ConditionParams {
            left_saturation: -2.0,
            right_saturation: 0.5,
            left_coefficient: -3.0,
            right_coefficient: 0.25,
            deadzone: 2.0,
            center: -1.5,
            ..Default::default()
        });
        let descriptor = translate(ForceKind::Spring, &params).unwrap();
        let EffectShape::Condition {
            left_saturation,
            right_saturation,
            left_coefficient,
            right_coefficient,
            deadband,
            center,
        } = descriptor.shape
        else {
            panic!("expected a condition shape");
        };
        assert_eq!(left_saturation, 0);
        assert_eq!(right_saturation, 500);
        assert_eq!(left_coefficient, -i16::MAX);
        assert_eq!(right_coefficient, (0.25 * f32::from(i16::MAX)) as i16);
        assert_eq!(deadband, u16::MAX);
        assert_eq!(center, -i16::MAX);
    }

    #[test]
    fn test_translate_rejects_mismatched_family() {
        let params = ForceParams::Constant(ConstantParams::default());
        assert!(translate(ForceKind::Rumble, &params).is_none());
        assert!(translate(ForceKind::Constant, &params).is_some());
    }
}
