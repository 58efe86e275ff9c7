//! OS bridge contracts.
//!
//! A *bridge* is the thin seam between the device core and one operating
//! system's input subsystem. The core only ever talks to these traits; the
//! concrete adapters ([`evdev`] on Linux, [`mock`] everywhere) parse native
//! records into [`RawEvent`]s and carry effect descriptors the other way.
//!
//! The contract models the *evented* native shape: one stream of timestamped
//! `(class, code, value)` records per input node, with sync markers
//! separating event groups and a dropped marker signalling buffer overrun. A
//! reading-chain native API (current/previous polled readings) would
//! implement the same provider/bridge pair by diffing readings into events.
//!
//! # Testability
//!
//! The [`BridgeProvider`] seam is what makes the whole library testable
//! without hardware: tests install a [`mock::MockHub`] provider on a
//! registry and script raw events directly.

use thiserror::Error;
use unihid_core::axis::AbsAxisInfo;
use unihid_core::cell::Timestamp;
use unihid_core::deduce::{KeyBitmap, SourceCapabilities};
use unihid_core::effect::EffectDescriptor;
use unihid_core::force::ForceKindSet;
use unihid_core::DeviceType;

pub mod mock;

#[cfg(target_os = "linux")]
pub mod evdev;

/// Event classes of the evented bridge contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventClass {
    /// Synchronization marker; `code` is [`SYN_REPORT`] or [`SYN_DROPPED`].
    Sync,
    /// Digital key/button change; `code` is a native key code.
    Key,
    /// Relative motion; `code` is a `REL_*` axis.
    Relative,
    /// Absolute axis change; `code` is an `ABS_*` axis.
    Absolute,
    /// Force-effect playback status; `code` is the effect slot.
    ForceStatus,
}

/// Sync code terminating one group of events.
pub const SYN_REPORT: u16 = 0;
/// Sync code signalling that the native event buffer overran and events were
/// lost; the device must resynchronize from full state.
pub const SYN_DROPPED: u16 = 3;

/// Force-status value for a stopped effect.
pub const FF_STATUS_STOPPED: i32 = 0;
/// Force-status value for a playing effect.
pub const FF_STATUS_PLAYING: i32 = 1;

/// One native input record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEvent {
    pub class: EventClass,
    pub code: u16,
    pub value: i32,
    /// Microseconds on the bridge's configured clock.
    pub timestamp: Timestamp,
}

/// Identity of a physical input source, stable across reconnects.
///
/// Three fallbacks, strongest first: a driver-provided unique id string, the
/// physical location plus bus metadata, and finally the bare node index. Two
/// ids are equal only when the same fallback level matches; the core relies
/// solely on equality and hashing.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HardwareId {
    /// Driver-provided unique identifier.
    Unique(String),
    /// Physical location plus bus/vendor/product/version metadata.
    Physical {
        location: String,
        bus: u16,
        vendor: u16,
        product: u16,
        version: u16,
    },
    /// Weakest fallback: the enumeration index of the node.
    Node(u32),
}

/// Errors reported by bridge adapters.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Opening an input node was refused. Permanent: surfaces from discovery
    /// with an explanation instead of being retried.
    #[error("access to input node \"{node}\" denied; is the user allowed to read input devices?")]
    PermissionDenied { node: String },

    /// An I/O failure on an open node. Transient: the owning device
    /// disconnects and the next update retries.
    #[error("input node I/O failure: {detail}")]
    Io { detail: String },
}

/// Force-related capabilities of one node, queried once per connect.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ForceCapabilities {
    /// Effect kinds the node supports.
    pub kinds: ForceKindSet,
    /// Whether the node honors a master gain control.
    pub supports_gain: bool,
    /// Whether the node has an autocenter control (disabled on connect so
    /// condition effects are not fought by the driver).
    pub supports_autocenter: bool,
    /// How many effect slots can be allocated at once.
    pub max_effects: u32,
}

/// Slot handle for an uploaded effect, assigned by the native layer.
pub type EffectSlot = i16;

/// Summary of one enumerated input node, enough to decide whether to create
/// a device for it.
#[derive(Debug, Clone)]
pub struct NodeSummary {
    pub hardware_id: HardwareId,
    pub capabilities: SourceCapabilities,
}

/// An open connection to one input node.
///
/// Reads never block: [`read_event`](Self::read_event) returns `Ok(None)`
/// once no more events are immediately available. Any `Err` is treated as a
/// disconnect by the owning device.
pub trait DeviceBridge {
    /// Pops the next pending native event, if any.
    fn read_event(&mut self) -> Result<Option<RawEvent>, BridgeError>;

    /// Display name reported by the driver, or empty if unavailable.
    fn display_name(&self) -> String;

    /// Snapshot of the node's current global key state, used to
    /// resynchronize after a buffer overrun.
    fn global_key_state(&mut self) -> Result<KeyBitmap, BridgeError>;

    /// Range and current value of one absolute axis, or `None` if the node
    /// does not have that axis.
    fn abs_axis(&mut self, code: u16) -> Option<AbsAxisInfo>;

    /// Force capabilities of the node.
    fn force_capabilities(&mut self) -> ForceCapabilities;

    /// Uploads an effect descriptor. With `slot == None` a new slot is
    /// allocated; otherwise the existing slot is reprogrammed in place.
    fn upload_effect(
        &mut self,
        slot: Option<EffectSlot>,
        descriptor: &EffectDescriptor,
    ) -> Result<EffectSlot, BridgeError>;

    /// Releases an effect slot, stopping it if it is playing.
    fn erase_effect(&mut self, slot: EffectSlot);

    /// Starts playback of an uploaded effect. `repeat` follows the native
    /// convention: 1 plays once, larger values loop.
    fn play_effect(&mut self, slot: EffectSlot, repeat: i32) -> Result<(), BridgeError>;

    /// Stops playback of an effect.
    fn stop_effect(&mut self, slot: EffectSlot) -> Result<(), BridgeError>;

    /// Writes the master gain in `[0, 1]`. Only meaningful when
    /// [`ForceCapabilities::supports_gain`] is set.
    fn set_master_gain(&mut self, gain: f32);

    /// Disables the driver's autocenter spring, if present.
    fn disable_autocenter(&mut self);
}

/// Enumeration and (re-)connection of input nodes.
pub trait BridgeProvider {
    /// Enumerates all currently present input nodes.
    ///
    /// Nodes that fail to open for transient reasons are skipped; a
    /// permission failure aborts the scan with
    /// [`BridgeError::PermissionDenied`].
    fn scan(&mut self) -> Result<Vec<NodeSummary>, BridgeError>;

    /// Opens the node whose hardware id and deduced type both match, or
    /// returns `None` when no such node is currently present.
    fn open(
        &mut self,
        hardware_id: &HardwareId,
        expected: DeviceType,
    ) -> Option<Box<dyn DeviceBridge>>;
}

/// Provider used on platforms without a shipped adapter: sees no nodes.
pub struct NullProvider;

impl BridgeProvider for NullProvider {
    fn scan(&mut self) -> Result<Vec<NodeSummary>, BridgeError> {
        Ok(Vec::new())
    }

    fn open(
        &mut self,
        _hardware_id: &HardwareId,
        _expected: DeviceType,
    ) -> Option<Box<dyn DeviceBridge>> {
        None
    }
}

/// The default provider for the current platform.
pub(crate) fn platform_provider() -> Box<dyn BridgeProvider> {
    #[cfg(target_os = "linux")]
    {
        Box::new(evdev::EvdevProvider::new())
    }
    #[cfg(not(target_os = "linux"))]
    {
        Box::new(NullProvider)
    }
}
