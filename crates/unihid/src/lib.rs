//! # unihid
//!
//! A unified abstraction over mice, keyboards, and gamepads. Disparate
//! operating-system input subsystems — an evented character-device stream on
//! one family, a polled reading-chain API on another — are normalized into a
//! single device model with identical semantics, plus an optional
//! force-feedback layer and an optional aggregation layer that composes
//! several physical devices into one logical device.
//!
//! # How it works
//!
//! Progress is driven entirely by the caller: nothing happens between calls
//! to [`discover_devices`], [`update_all_devices`], or a device update. An
//! update pulls whatever events the OS has buffered, folds them into
//! per-channel cells (timestamp, digital state, threshold, analog value,
//! with an anti-bounce rule around the threshold), and fires any registered
//! callbacks synchronously on the calling thread. Between updates, every
//! getter answers from the snapshot the last update produced.
//!
//! ```no_run
//! unihid::discover_devices().unwrap();
//! loop {
//!     unihid::update_all_devices().unwrap();
//!     for dev in unihid::get_mice(true) {
//!         let mouse = dev.as_mouse().unwrap();
//!         let (dx, dy) = mouse.delta();
//!         if dx != 0 || dy != 0 {
//!             println!("{}: moved {dx},{dy}", dev.display_name());
//!         }
//!     }
//! }
//! ```
//!
//! The free functions above delegate to a thread-local default [`Registry`];
//! embedders that want explicit state (or a scripted bridge, see
//! [`bridge::mock`]) construct their own registry and call the same methods
//! on it.
//!
//! # Threading
//!
//! The library is single-threaded and cooperative. Registries, devices, and
//! forces are not `Send`; drive them from one thread or add your own mutual
//! exclusion.
//!
//! # Callbacks
//!
//! Callbacks run synchronously inside update calls. Management operations
//! (registering callbacks, destroying devices, updating, discovering,
//! aggregating) are rejected with [`Error::ReentrantCall`] while a callback
//! is on the stack; reading device state is fine. The chronological order of
//! events affecting a single input is preserved; ordering across different
//! inputs within one tick is unspecified.

pub mod bridge;

mod aggregate;
mod callback;
mod device;
mod error;
mod force;
mod registry;

use std::rc::Rc;

pub use device::{Device, Gamepad, Keyboard, Mouse};
pub use error::{Error, Result};
pub use force::Force;
pub use registry::{CallbackId, DeviceId, ForceId, Registry};

// The pure domain layer, re-exported for convenience: key/button codes,
// force parameters, cells, and the translation tables.
pub use unihid_core;
pub use unihid_core::force::{
    ConditionParams, ConstantParams, ForceEnvelope, ForceKind, ForceParams, ForceStatus,
    PeriodicParams, RampParams, RumbleParams,
};
pub use unihid_core::{Button, DeviceStatus, DeviceType, Key};

std::thread_local! {
    static DEFAULT_REGISTRY: Registry = Registry::new();
}

/// Runs `f` against this thread's default registry, the one behind the
/// crate-level free functions.
pub fn with_default_registry<R>(f: impl FnOnce(&Registry) -> R) -> R {
    DEFAULT_REGISTRY.with(|registry| f(registry))
}

/// Searches for input sources without a device yet and creates devices for
/// them. New devices appear disconnected until their first update. Returns
/// the number of devices created.
pub fn discover_devices() -> Result<usize> {
    with_default_registry(|registry| registry.discover())
}

/// Updates every device. Members of aggregates are updated through their
/// aggregate rather than directly.
pub fn update_all_devices() -> Result<()> {
    with_default_registry(|registry| registry.update_all())
}

/// Destroys every device, aggregates included. Handles held by the caller
/// read as disconnected afterwards; the underlying hardware can be
/// re-discovered.
pub fn destroy_all_devices() -> Result<()> {
    with_default_registry(|registry| registry.destroy_all())
}

/// Total number of devices, optionally ignoring disconnected ones.
pub fn get_device_count(ignore_disconnected: bool) -> usize {
    with_default_registry(|registry| registry.device_count(ignore_disconnected))
}

/// Handles to every device, aggregates included.
pub fn get_devices(ignore_disconnected: bool) -> Vec<Rc<Device>> {
    with_default_registry(|registry| registry.devices(ignore_disconnected))
}

/// Handles to every mouse.
pub fn get_mice(ignore_disconnected: bool) -> Vec<Rc<Device>> {
    with_default_registry(|registry| registry.mice(ignore_disconnected))
}

/// Handles to every keyboard.
pub fn get_keyboards(ignore_disconnected: bool) -> Vec<Rc<Device>> {
    with_default_registry(|registry| registry.keyboards(ignore_disconnected))
}

/// Handles to every gamepad.
pub fn get_gamepads(ignore_disconnected: bool) -> Vec<Rc<Device>> {
    with_default_registry(|registry| registry.gamepads(ignore_disconnected))
}

/// Looks up a device by id.
pub fn get_device(id: DeviceId) -> Option<Rc<Device>> {
    with_default_registry(|registry| registry.device(id))
}

/// Destroys one device, cascading to every aggregate it belongs to.
pub fn destroy_device(id: DeviceId) -> Result<()> {
    with_default_registry(|registry| registry.destroy_device(id))
}

/// Aggregates the given devices into one virtual device. See
/// [`Registry::aggregate`].
pub fn aggregate(ids: &[DeviceId], type_hint: DeviceType) -> Result<Option<Rc<Device>>> {
    with_default_registry(|registry| registry.aggregate(ids, type_hint))
}

/// Unregisters a callback of any kind.
pub fn unregister_callback(id: CallbackId) -> Result<()> {
    with_default_registry(|registry| registry.unregister_callback(id))
}

/// Unregisters every callback.
pub fn unregister_all_callbacks() -> Result<()> {
    with_default_registry(|registry| registry.unregister_all_callbacks())
}

/// Registers a status callback over all devices, optionally filtered to one
/// kind of status change.
pub fn register_global_status_callback(
    filter: Option<DeviceStatus>,
    callback: impl Fn(&Device, DeviceStatus) + 'static,
) -> Result<CallbackId> {
    with_default_registry(|registry| registry.register_status_callback(None, filter, callback))
}

/// Registers a move callback over all mice.
pub fn register_global_mouse_move_callback(
    callback: impl Fn(&Device, i64, i64, i64, i64) + 'static,
) -> Result<CallbackId> {
    with_default_registry(|registry| registry.register_mouse_move_callback(None, callback))
}

/// Registers a scroll callback over all mice.
pub fn register_global_mouse_scroll_callback(
    callback: impl Fn(&Device, i64, i64, i64, i64) + 'static,
) -> Result<CallbackId> {
    with_default_registry(|registry| registry.register_mouse_scroll_callback(None, callback))
}

/// Registers a button callback over all mice, optionally filtered to one
/// button index.
pub fn register_global_mouse_button_callback(
    button: Option<u32>,
    callback: impl Fn(&Device, u32, f32, bool) + 'static,
) -> Result<CallbackId> {
    with_default_registry(|registry| {
        registry.register_mouse_button_callback(None, button, callback)
    })
}

/// Registers a key callback over all keyboards, optionally filtered to one
/// key.
pub fn register_global_key_callback(
    key: Option<Key>,
    callback: impl Fn(&Device, Key, f32, bool) + 'static,
) -> Result<CallbackId> {
    with_default_registry(|registry| registry.register_key_callback(None, key, callback))
}

/// Registers a button callback over all gamepads, optionally filtered to
/// one button.
pub fn register_global_gamepad_button_callback(
    button: Option<Button>,
    callback: impl Fn(&Device, Button, f32, bool) + 'static,
) -> Result<CallbackId> {
    with_default_registry(|registry| {
        registry.register_gamepad_button_callback(None, button, callback)
    })
}

/// Registers a thumbstick callback over all gamepads, optionally filtered
/// to one stick index.
pub fn register_global_thumbstick_callback(
    index: Option<u32>,
    callback: impl Fn(&Device, u32, f32, f32) + 'static,
) -> Result<CallbackId> {
    with_default_registry(|registry| registry.register_thumbstick_callback(None, index, callback))
}
