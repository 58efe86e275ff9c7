//! Callback registration and dispatch.
//!
//! One global table holds every callback, keyed by a `(device-or-global,
//! kind, optional filter)` composite. For an event of kind `K` on device `D`
//! with discriminator `V`, dispatch walks four buckets in priority order:
//!
//! 1. `(D, K, V)` — device-specific, filtered
//! 2. `(D, K, –)` — device-specific, any value
//! 3. `(global, K, V)` — global, filtered
//! 4. `(global, K, –)` — global, any value
//!
//! Within one bucket the order is unspecified (currently insertion order; do
//! not rely on it). Handlers are type-erased records with a kind tag; each
//! emit function downcasts through a match when invoking.
//!
//! # Reentrancy guard
//!
//! A registry-wide flag is set for the duration of every invocation,
//! including unwinds. Management operations check it and fail with
//! [`Error::ReentrantCall`](crate::Error::ReentrantCall) instead of
//! corrupting the structures they would have walked. Reading device state
//! from inside a callback is fine.
//!
//! # Lazy cleanup
//!
//! Unregistering removes the handler immediately but leaves the dispatch
//! index entry behind; the next dispatch that trips over the dead id prunes
//! it.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use unihid_core::{Button, DeviceStatus, Key};

use crate::device::Device;
use crate::error::Result;
use crate::registry::{reserve_id, CallbackId, DeviceId, Registry};

/// Event kinds a callback can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum CallbackKind {
    Status,
    MouseMove,
    MouseScroll,
    MouseButton,
    KeyboardKey,
    GamepadButton,
    GamepadThumbstick,
}

/// Type-erased callback record.
pub(crate) enum Handler {
    Status(Box<dyn Fn(&Device, DeviceStatus)>),
    MouseMove(Box<dyn Fn(&Device, i64, i64, i64, i64)>),
    MouseScroll(Box<dyn Fn(&Device, i64, i64, i64, i64)>),
    MouseButton(Box<dyn Fn(&Device, u32, f32, bool)>),
    KeyboardKey(Box<dyn Fn(&Device, Key, f32, bool)>),
    GamepadButton(Box<dyn Fn(&Device, Button, f32, bool)>),
    GamepadThumbstick(Box<dyn Fn(&Device, u32, f32, f32)>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct DispatchKey {
    device: DeviceId,
    kind: CallbackKind,
    filter: Option<u64>,
}

/// The global callback store: handlers by id, plus the dispatch index.
#[derive(Default)]
pub(crate) struct CallbackTable {
    handlers: RefCell<HashMap<CallbackId, Rc<Handler>>>,
    index: RefCell<HashMap<DispatchKey, Vec<CallbackId>>>,
}

impl CallbackTable {
    fn insert(&self, id: CallbackId, key: DispatchKey, handler: Handler) {
        self.handlers.borrow_mut().insert(id, Rc::new(handler));
        self.index.borrow_mut().entry(key).or_default().push(id);
    }

    /// Removes the handler; its index entry is pruned lazily on the next
    /// dispatch that encounters it.
    pub(crate) fn remove(&self, id: CallbackId) {
        self.handlers.borrow_mut().remove(&id);
    }

    pub(crate) fn clear(&self) {
        self.handlers.borrow_mut().clear();
    }

    /// Invokes every live handler in one bucket, pruning dead ids.
    ///
    /// The handler clone is deliberate: no table borrow is held while user
    /// code runs, so callbacks may freely register... which the reentrancy
    /// flag then rejects, but without memory unsafety either way.
    fn dispatch_bucket(&self, key: DispatchKey, flag: &Cell<bool>, invoke: &dyn Fn(&Handler)) {
        let ids: Vec<CallbackId> = match self.index.borrow().get(&key) {
            Some(ids) => ids.clone(),
            None => return,
        };
        let mut dead = Vec::new();
        for id in ids {
            let handler = self.handlers.borrow().get(&id).cloned();
            match handler {
                Some(handler) => {
                    let _scope = CallbackScope::enter(flag);
                    invoke(&handler);
                }
                None => dead.push(id),
            }
        }
        if !dead.is_empty() {
            if let Some(ids) = self.index.borrow_mut().get_mut(&key) {
                ids.retain(|id| !dead.contains(id));
            }
        }
    }
}

/// Sets the reentrancy flag for one invocation, clearing it again on both
/// normal and unwinding exits.
struct CallbackScope<'a> {
    flag: &'a Cell<bool>,
}

impl<'a> CallbackScope<'a> {
    fn enter(flag: &'a Cell<bool>) -> Self {
        flag.set(true);
        Self { flag }
    }
}

impl Drop for CallbackScope<'_> {
    fn drop(&mut self) {
        self.flag.set(false);
    }
}

// ── Registration ──────────────────────────────────────────────────────────────

impl Registry {
    fn insert_callback(
        &self,
        operation: &'static str,
        device: Option<DeviceId>,
        kind: CallbackKind,
        filter: Option<u64>,
        handler: Handler,
    ) -> Result<CallbackId> {
        self.guard(operation)?;
        let id = CallbackId(reserve_id());
        let key = DispatchKey {
            device: device.unwrap_or(DeviceId::GLOBAL),
            kind,
            filter,
        };
        self.callbacks.insert(id, key, handler);
        if let Some(device) = device {
            // Track on the device so destruction removes it in one pass.
            if let Some(dev) = self.device(device) {
                dev.attached_callbacks.borrow_mut().push(id);
            }
        }
        Ok(id)
    }

    /// Registers a device-status callback. `device == None` subscribes to
    /// every device; `filter` narrows to one status change.
    pub fn register_status_callback(
        &self,
        device: Option<DeviceId>,
        filter: Option<DeviceStatus>,
        callback: impl Fn(&Device, DeviceStatus) + 'static,
    ) -> Result<CallbackId> {
        self.insert_callback(
            "register_status_callback",
            device,
            CallbackKind::Status,
            filter.map(|status| status as u64),
            Handler::Status(Box::new(callback)),
        )
    }

    /// Registers a mouse-move callback `(device, x, y, dx, dy)`. Values may
    /// be finer-grained than the per-update delta: one callback fires per
    /// folded event group.
    pub fn register_mouse_move_callback(
        &self,
        device: Option<DeviceId>,
        callback: impl Fn(&Device, i64, i64, i64, i64) + 'static,
    ) -> Result<CallbackId> {
        self.insert_callback(
            "register_mouse_move_callback",
            device,
            CallbackKind::MouseMove,
            None,
            Handler::MouseMove(Box::new(callback)),
        )
    }

    /// Registers a mouse-scroll callback `(device, sx, sy, sdx, sdy)`.
    pub fn register_mouse_scroll_callback(
        &self,
        device: Option<DeviceId>,
        callback: impl Fn(&Device, i64, i64, i64, i64) + 'static,
    ) -> Result<CallbackId> {
        self.insert_callback(
            "register_mouse_scroll_callback",
            device,
            CallbackKind::MouseScroll,
            None,
            Handler::MouseScroll(Box::new(callback)),
        )
    }

    /// Registers a mouse-button callback `(device, index, value, pressed)`,
    /// optionally filtered to one button index.
    pub fn register_mouse_button_callback(
        &self,
        device: Option<DeviceId>,
        button: Option<u32>,
        callback: impl Fn(&Device, u32, f32, bool) + 'static,
    ) -> Result<CallbackId> {
        self.insert_callback(
            "register_mouse_button_callback",
            device,
            CallbackKind::MouseButton,
            button.map(u64::from),
            Handler::MouseButton(Box::new(callback)),
        )
    }

    /// Registers a keyboard-key callback `(device, key, value, pressed)`,
    /// optionally filtered to one key.
    pub fn register_key_callback(
        &self,
        device: Option<DeviceId>,
        key: Option<Key>,
        callback: impl Fn(&Device, Key, f32, bool) + 'static,
    ) -> Result<CallbackId> {
        self.insert_callback(
            "register_key_callback",
            device,
            CallbackKind::KeyboardKey,
            key.map(|key| key.index() as u64),
            Handler::KeyboardKey(Box::new(callback)),
        )
    }

    /// Registers a gamepad-button callback `(device, button, value,
    /// pressed)`, optionally filtered to one button.
    pub fn register_gamepad_button_callback(
        &self,
        device: Option<DeviceId>,
        button: Option<Button>,
        callback: impl Fn(&Device, Button, f32, bool) + 'static,
    ) -> Result<CallbackId> {
        self.insert_callback(
            "register_gamepad_button_callback",
            device,
            CallbackKind::GamepadButton,
            button.map(|button| button.index() as u64),
            Handler::GamepadButton(Box::new(callback)),
        )
    }

    /// Registers a thumbstick callback `(device, index, x, y)`, optionally
    /// filtered to one stick index.
    pub fn register_thumbstick_callback(
        &self,
        device: Option<DeviceId>,
        index: Option<u32>,
        callback: impl Fn(&Device, u32, f32, f32) + 'static,
    ) -> Result<CallbackId> {
        self.insert_callback(
            "register_thumbstick_callback",
            device,
            CallbackKind::GamepadThumbstick,
            index.map(u64::from),
            Handler::GamepadThumbstick(Box::new(callback)),
        )
    }

    /// Unregisters one callback of any kind.
    pub fn unregister_callback(&self, id: CallbackId) -> Result<()> {
        self.guard("unregister_callback")?;
        self.callbacks.remove(id);
        Ok(())
    }

    /// Unregisters every callback, global and device-attached alike.
    pub fn unregister_all_callbacks(&self) -> Result<()> {
        self.guard("unregister_all_callbacks")?;
        self.callbacks.clear();
        Ok(())
    }
}

// ── Dispatch ──────────────────────────────────────────────────────────────────

impl Registry {
    fn dispatch(
        &self,
        dev: &Device,
        kind: CallbackKind,
        filter: Option<u64>,
        invoke: &dyn Fn(&Handler),
    ) {
        let device = dev.id();
        let mut buckets: [Option<DispatchKey>; 4] = [None; 4];
        let mut n = 0;
        let mut push = |device, filter| {
            buckets[n] = Some(DispatchKey { device, kind, filter });
            n += 1;
        };
        if let Some(value) = filter {
            push(device, Some(value));
        }
        push(device, None);
        if let Some(value) = filter {
            push(DeviceId::GLOBAL, Some(value));
        }
        push(DeviceId::GLOBAL, None);

        for key in buckets.into_iter().flatten() {
            self.callbacks.dispatch_bucket(key, &self.in_callback, invoke);
        }
    }

    pub(crate) fn emit_status(&self, dev: &Device, status: DeviceStatus) {
        self.dispatch(dev, CallbackKind::Status, Some(status as u64), &|handler| {
            if let Handler::Status(f) = handler {
                f(dev, status);
            }
        });
    }

    pub(crate) fn emit_mouse_move(&self, dev: &Device, x: i64, y: i64, dx: i64, dy: i64) {
        self.dispatch(dev, CallbackKind::MouseMove, None, &|handler| {
            if let Handler::MouseMove(f) = handler {
                f(dev, x, y, dx, dy);
            }
        });
    }

    pub(crate) fn emit_mouse_scroll(&self, dev: &Device, sx: i64, sy: i64, sdx: i64, sdy: i64) {
        self.dispatch(dev, CallbackKind::MouseScroll, None, &|handler| {
            if let Handler::MouseScroll(f) = handler {
                f(dev, sx, sy, sdx, sdy);
            }
        });
    }

    pub(crate) fn emit_mouse_button(&self, dev: &Device, index: u32, value: f32, pressed: bool) {
        self.dispatch(
            dev,
            CallbackKind::MouseButton,
            Some(u64::from(index)),
            &|handler| {
                if let Handler::MouseButton(f) = handler {
                    f(dev, index, value, pressed);
                }
            },
        );
    }

    pub(crate) fn emit_key(&self, dev: &Device, key: Key, value: f32, pressed: bool) {
        self.dispatch(
            dev,
            CallbackKind::KeyboardKey,
            Some(key.index() as u64),
            &|handler| {
                if let Handler::KeyboardKey(f) = handler {
                    f(dev, key, value, pressed);
                }
            },
        );
    }

    pub(crate) fn emit_gamepad_button(
        &self,
        dev: &Device,
        button: Button,
        value: f32,
        pressed: bool,
    ) {
        self.dispatch(
            dev,
            CallbackKind::GamepadButton,
            Some(button.index() as u64),
            &|handler| {
                if let Handler::GamepadButton(f) = handler {
                    f(dev, button, value, pressed);
                }
            },
        );
    }

    pub(crate) fn emit_thumbstick(&self, dev: &Device, index: u32, x: f32, y: f32) {
        self.dispatch(
            dev,
            CallbackKind::GamepadThumbstick,
            Some(u64::from(index)),
            &|handler| {
                if let Handler::GamepadThumbstick(f) = handler {
                    f(dev, index, x, y);
                }
            },
        );
    }
}
