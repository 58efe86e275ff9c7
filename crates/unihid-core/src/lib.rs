//! # unihid-core
//!
//! Pure domain layer of the unihid input library. This crate holds everything
//! that can be specified without touching an operating system: the closed
//! cross-platform key and button sets, the translation tables between native
//! codes and those sets, the per-channel input cell with its anti-bounce
//! rule, absolute-axis normalization, capability-based device-type deduction,
//! and the force-effect parameter model with its translation into native
//! effect descriptors.
//!
//! The runtime crate (`unihid`) builds the device registry, callback
//! dispatch, and OS bridge adapters on top of these types. Keeping this layer
//! free of I/O means every rule in it is testable with plain values.
//!
//! - **`codes`** – `Key` (112 entries), `Button` (16 entries), `DeviceType`,
//!   `DeviceStatus`.
//! - **`keymap`** – native code tables in both directions, plus the
//!   recognition and blacklist sets used by type deduction.
//! - **`cell`** – the timestamp/state/threshold/value cell every digital or
//!   analog channel is stored in.
//! - **`axis`** – precomputed normalization from raw axis ranges to
//!   `[-1, +1]`.
//! - **`deduce`** – proof-score classification of raw sources.
//! - **`force`** – force kinds, envelopes, and the parameter sum type.
//! - **`effect`** – pure translation from parameters to native descriptors.

pub mod axis;
pub mod cell;
pub mod codes;
pub mod deduce;
pub mod effect;
pub mod force;
pub mod keymap;

pub use axis::{normalize_abs, AbsAxisInfo, AxisNormalizer};
pub use cell::{digital_state, timestamp_delta_seconds, CellWrite, InputCell, Timestamp};
pub use codes::{Button, DeviceStatus, DeviceType, Key};
pub use deduce::{deduce_device_type, KeyBitmap, SourceCapabilities};
pub use effect::{EffectDescriptor, EffectShape, EnvelopeSpec, Waveform};
pub use force::{
    ConditionParams, ConstantParams, ForceEnvelope, ForceFamily, ForceKind, ForceKindSet,
    ForceParams, ForceStatus, PeriodicParams, RampParams, RumbleParams,
};
