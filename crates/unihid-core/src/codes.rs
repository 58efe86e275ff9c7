//! Cross-platform input codes.
//!
//! These are the closed sets every bridge translates into: 112 keyboard keys
//! and 16 gamepad buttons. The values are influenced by physical layout, not
//! by any vendor naming scheme — `Button::North` is the upper face button no
//! matter whether the pad labels it `Y` or `X`. Native codes with no entry in
//! these sets are discarded at the bridge boundary.

use serde::{Deserialize, Serialize};

/// Device categories a raw input source can resolve to.
///
/// Every device has exactly one constant type. Hardware that produces several
/// kinds of input is virtually always split into multiple nodes by the driver,
/// so multi-type devices are not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeviceType {
    /// The source could not be classified; no device is created for it.
    Unknown = 0,
    Mouse,
    Keyboard,
    Gamepad,
}

/// A change in a device's lifecycle, as reported to status callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum DeviceStatus {
    /// The device was discovered and a registry entry was created for it.
    Discovered = 0,
    /// The device (re-)connected to the underlying hardware or driver.
    Connected,
    /// The device disconnected, either physically or due to a bridge error.
    Disconnected,
    /// The device is about to be destroyed; its handles go stale after this.
    Destroyed,
}

/// Cross-platform keyboard keys.
///
/// The set is fixed at [`Key::COUNT`] entries. Discriminants are sequential
/// from zero so the key can index fixed-size cell tables directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Key {
    Esc = 0,
    Enter,
    Backspace,
    Tab,
    Space,
    CapsLock,
    ShiftLeft,
    ShiftRight,
    AltLeft,
    AltRight,
    CtrlLeft,
    CtrlRight,

    Digit0,
    Digit1,
    Digit2,
    Digit3,
    Digit4,
    Digit5,
    Digit6,
    Digit7,
    Digit8,
    Digit9,

    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
    L,
    M,
    N,
    O,
    P,
    Q,
    R,
    S,
    T,
    U,
    V,
    W,
    X,
    Y,
    Z,

    Minus,
    Equal,
    BracketLeft,
    BracketRight,
    Semicolon,
    Apostrophe,
    Grave,
    Comma,
    Dot,
    Slash,
    Backslash,
    /// The "102nd" key present on ISO layouts, most commonly angle brackets.
    Intl102,

    NumLock,
    ScrollLock,
    Pause,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,

    ArrowLeft,
    ArrowUp,
    ArrowRight,
    ArrowDown,

    Numpad0,
    Numpad1,
    Numpad2,
    Numpad3,
    Numpad4,
    Numpad5,
    Numpad6,
    Numpad7,
    Numpad8,
    Numpad9,
    NumpadDecimal,
    NumpadPlus,
    NumpadMinus,
    NumpadMultiply,
    NumpadSlash,

    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
    F16,
    F17,
    F18,
    F19,
    F20,
    F21,
    F22,
    F23,
    F24,
}

impl Key {
    /// Total number of cross-platform keys.
    pub const COUNT: usize = 112;

    /// Returns the key with the given table index, if any.
    pub const fn from_index(index: usize) -> Option<Key> {
        if index < Self::COUNT {
            // Discriminants are sequential from 0, so the transmute-free path
            // is a table lookup.
            Some(ALL_KEYS[index])
        } else {
            None
        }
    }

    /// The key's index into fixed-size per-key tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Iterates over every key in discriminant order.
    pub fn all() -> impl Iterator<Item = Key> {
        ALL_KEYS.iter().copied()
    }
}

/// Cross-platform gamepad buttons, identified by physical location.
///
/// Discriminants are sequential from zero so the button can index fixed-size
/// cell tables directly. `L2`/`R2` (the triggers) are buttons with analog
/// values on hardware that reports them as axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Button {
    /// Upper face button (often labelled Y or X).
    North = 0,
    /// Lower face button (often labelled A or B).
    South,
    /// Left face button (often labelled X or Y).
    West,
    /// Right face button (often labelled B or A).
    East,
    DpadUp,
    DpadDown,
    DpadLeft,
    DpadRight,
    /// Left shoulder button.
    L1,
    /// Left trigger.
    L2,
    /// Right shoulder button.
    R1,
    /// Right trigger.
    R2,
    /// Left thumbstick press.
    ThumbLeft,
    /// Right thumbstick press.
    ThumbRight,
    /// Left menu button ("view" on some controllers).
    Select,
    /// Right menu button ("menu" on some controllers).
    Start,
}

impl Button {
    /// Total number of cross-platform buttons.
    pub const COUNT: usize = 16;

    /// Returns the button with the given table index, if any.
    pub const fn from_index(index: usize) -> Option<Button> {
        if index < Self::COUNT {
            Some(ALL_BUTTONS[index])
        } else {
            None
        }
    }

    /// The button's index into fixed-size per-button tables.
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Iterates over every button in discriminant order.
    pub fn all() -> impl Iterator<Item = Button> {
        ALL_BUTTONS.iter().copied()
    }
}

const ALL_KEYS: [Key; Key::COUNT] = [
    Key::Esc,
    Key::Enter,
    Key::Backspace,
    Key::Tab,
    Key::Space,
    Key::CapsLock,
    Key::ShiftLeft,
    Key::ShiftRight,
    Key::AltLeft,
    Key::AltRight,
    Key::CtrlLeft,
    Key::CtrlRight,
    Key::Digit0,
    Key::Digit1,
    Key::Digit2,
    Key::Digit3,
    Key::Digit4,
    Key::Digit5,
    Key::Digit6,
    Key::Digit7,
    Key::Digit8,
    Key::Digit9,
    Key::A,
    Key::B,
    Key::C,
    Key::D,
    Key::E,
    Key::F,
    Key::G,
    Key::H,
    Key::I,
    Key::J,
    Key::K,
    Key::L,
    Key::M,
    Key::N,
    Key::O,
    Key::P,
    Key::Q,
    Key::R,
    Key::S,
    Key::T,
    Key::U,
    Key::V,
    Key::W,
    Key::X,
    Key::Y,
    Key::Z,
    Key::Minus,
    Key::Equal,
    Key::BracketLeft,
    Key::BracketRight,
    Key::Semicolon,
    Key::Apostrophe,
    Key::Grave,
    Key::Comma,
    Key::Dot,
    Key::Slash,
    Key::Backslash,
    Key::Intl102,
    Key::NumLock,
    Key::ScrollLock,
    Key::Pause,
    Key::Insert,
    Key::Delete,
    Key::Home,
    Key::End,
    Key::PageUp,
    Key::PageDown,
    Key::ArrowLeft,
    Key::ArrowUp,
    Key::ArrowRight,
    Key::ArrowDown,
    Key::Numpad0,
    Key::Numpad1,
    Key::Numpad2,
    Key::Numpad3,
    Key::Numpad4,
    Key::Numpad5,
    Key::Numpad6,
    Key::Numpad7,
    Key::Numpad8,
    Key::Numpad9,
    Key::NumpadDecimal,
    Key::NumpadPlus,
    Key::NumpadMinus,
    Key::NumpadMultiply,
    Key::NumpadSlash,
    Key::F1,
    Key::F2,
    Key::F3,
    Key::F4,
    Key::F5,
    Key::F6,
    Key::F7,
    Key::F8,
    Key::F9,
    Key::F10,
    Key::F11,
    Key::F12,
    Key::F13,
    Key::F14,
    Key::F15,
    Key::F16,
    Key::F17,
    Key::F18,
    Key::F19,
    Key::F20,
    Key::F21,
    Key::F22,
    Key::F23,
    Key::F24,
];

const ALL_BUTTONS: [Button; Button::COUNT] = [
    Button::North,
    Button::South,
    Button::West,
    Button::East,
    Button::DpadUp,
    Button::DpadDown,
    Button::DpadLeft,
    Button::DpadRight,
    Button::L1,
    Button::L2,
    Button::R1,
    Button::R2,
    Button::ThumbLeft,
    Button::ThumbRight,
    Button::Select,
    Button::Start,
];

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_indices_are_sequential_and_roundtrip() {
        for (i, key) in Key::all().enumerate() {
            assert_eq!(key.index(), i);
            assert_eq!(Key::from_index(i), Some(key));
        }
    }

    #[test]
    fn test_key_from_index_rejects_out_of_range() {
        assert_eq!(Key::from_index(Key::COUNT), None);
        assert_eq!(Key::from_index(usize::MAX), None);
    }

    #[test]
    fn test_button_indices_are_sequential_and_roundtrip() {
        for (i, button) in Button::all().enumerate() {
            assert_eq!(button.index(), i);
            assert_eq!(Button::from_index(i), Some(button));
        }
    }

    #[test]
    fn test_button_from_index_rejects_out_of_range() {
        assert_eq!(Button::from_index(Button::COUNT), None);
    }

    #[test]
    fn test_key_serde_roundtrip_uses_variant_names() {
        let json = serde_json::to_string(&Key::Intl102).unwrap();
        assert_eq!(json, "\"Intl102\"");
        assert_eq!(serde_json::from_str::<Key>(&json).unwrap(), Key::Intl102);
    }
}
