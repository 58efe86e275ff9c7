//! Translation tables between evented-bridge native codes and the
//! cross-platform [`Key`]/[`Button`] sets.
//!
//! The evented bridge reports inputs as `(class, code, value)` records where
//! `code` is a 16-bit native key/axis number. These tables are the single
//! place that knows which native codes correspond to which cross-platform
//! values; unmapped codes are dropped at the point of translation.
//!
//! Reverse lookups exist for two consumers: type deduction counts how many of
//! a source's advertised key capabilities fall into each category, and the
//! buffer-overrun resynchronizer queries the global key bitmap by native code.

use crate::codes::{Button, Key};

/// Native code constants used by the evented bridge contract.
///
/// Values follow the de-facto event-device numbering so the Linux adapter is
/// a pass-through; any other evented backend renumbers into this space.
pub mod code {
    // Relative axes.
    pub const REL_X: u16 = 0x00;
    pub const REL_Y: u16 = 0x01;
    pub const REL_HWHEEL: u16 = 0x06;
    pub const REL_WHEEL: u16 = 0x08;
    pub const REL_WHEEL_HI_RES: u16 = 0x0b;
    pub const REL_HWHEEL_HI_RES: u16 = 0x0c;

    // Absolute axes.
    pub const ABS_X: u16 = 0x00;
    pub const ABS_Y: u16 = 0x01;
    pub const ABS_RX: u16 = 0x03;
    pub const ABS_RY: u16 = 0x04;
    pub const ABS_HAT0X: u16 = 0x10;
    pub const ABS_HAT0Y: u16 = 0x11;
    pub const ABS_HAT1X: u16 = 0x12;
    pub const ABS_HAT1Y: u16 = 0x13;
    pub const ABS_HAT2X: u16 = 0x14;
    pub const ABS_HAT2Y: u16 = 0x15;

    // Mouse buttons. The eight codes from BTN_LEFT to BTN_TASK are indexed
    // 0..8 on the mouse surface.
    pub const BTN_LEFT: u16 = 0x110;
    pub const BTN_RIGHT: u16 = 0x111;
    pub const BTN_MIDDLE: u16 = 0x112;
    pub const BTN_SIDE: u16 = 0x113;
    pub const BTN_EXTRA: u16 = 0x114;
    pub const BTN_FORWARD: u16 = 0x115;
    pub const BTN_BACK: u16 = 0x116;
    pub const BTN_TASK: u16 = 0x117;

    // Gamepad buttons.
    pub const BTN_SOUTH: u16 = 0x130;
    pub const BTN_EAST: u16 = 0x131;
    pub const BTN_NORTH: u16 = 0x133;
    pub const BTN_WEST: u16 = 0x134;
    pub const BTN_TL: u16 = 0x136;
    pub const BTN_TR: u16 = 0x137;
    pub const BTN_TL2: u16 = 0x138;
    pub const BTN_TR2: u16 = 0x139;
    pub const BTN_SELECT: u16 = 0x13a;
    pub const BTN_START: u16 = 0x13b;
    pub const BTN_THUMBL: u16 = 0x13d;
    pub const BTN_THUMBR: u16 = 0x13e;
    pub const BTN_DPAD_UP: u16 = 0x220;
    pub const BTN_DPAD_DOWN: u16 = 0x221;
    pub const BTN_DPAD_LEFT: u16 = 0x222;
    pub const BTN_DPAD_RIGHT: u16 = 0x223;

    // Tool/stylus/touch codes that disqualify a source during deduction.
    pub const BTN_TOOL_PEN: u16 = 0x140;
    pub const BTN_TOOL_RUBBER: u16 = 0x141;
    pub const BTN_TOOL_BRUSH: u16 = 0x142;
    pub const BTN_TOOL_PENCIL: u16 = 0x143;
    pub const BTN_TOOL_AIRBRUSH: u16 = 0x144;
    pub const BTN_TOOL_FINGER: u16 = 0x145;
    pub const BTN_TOOL_LENS: u16 = 0x147;
    pub const BTN_TOOL_QUINTTAP: u16 = 0x148;
    pub const BTN_STYLUS3: u16 = 0x149;
    pub const BTN_TOUCH: u16 = 0x14a;
    pub const BTN_STYLUS: u16 = 0x14b;
    pub const BTN_STYLUS2: u16 = 0x14c;
    pub const BTN_TOOL_DOUBLETAP: u16 = 0x14d;
    pub const BTN_TOOL_TRIPLETAP: u16 = 0x14e;
    pub const BTN_TOOL_QUADTAP: u16 = 0x14f;
    pub const BTN_WHEEL: u16 = 0x150;
    pub const BTN_GEAR_UP: u16 = 0x151;
}

/// Number of addressable mouse buttons (`BTN_LEFT` through `BTN_TASK`).
pub const NUM_MOUSE_BUTTONS: usize = 8;

/// Mouse button codes used for recognition scoring and overrun resync.
pub const MOUSE_BUTTON_CODES: [u16; NUM_MOUSE_BUTTONS] = [
    code::BTN_LEFT,
    code::BTN_RIGHT,
    code::BTN_MIDDLE,
    code::BTN_SIDE,
    code::BTN_EXTRA,
    code::BTN_FORWARD,
    code::BTN_BACK,
    code::BTN_TASK,
];

/// Key codes that are usually only present on tools, styluses, and touch
/// surfaces. A source advertising these loses deduction proof across the
/// board, which keeps drawing tablets and touchscreens out of the registry.
pub const BLACKLIST_CODES: [u16; 17] = [
    code::BTN_TOOL_PEN,
    code::BTN_TOOL_RUBBER,
    code::BTN_TOOL_BRUSH,
    code::BTN_TOOL_PENCIL,
    code::BTN_TOOL_AIRBRUSH,
    code::BTN_TOOL_FINGER,
    code::BTN_TOOL_LENS,
    code::BTN_TOOL_QUINTTAP,
    code::BTN_STYLUS3,
    code::BTN_TOUCH,
    code::BTN_STYLUS,
    code::BTN_STYLUS2,
    code::BTN_TOOL_DOUBLETAP,
    code::BTN_TOOL_TRIPLETAP,
    code::BTN_TOOL_QUADTAP,
    code::BTN_WHEEL,
    code::BTN_GEAR_UP,
];

/// Translates a native key code into a cross-platform [`Key`].
///
/// Returns `None` for codes with no cross-platform meaning; callers drop
/// such events silently. A few obsolete or redundant native codes alias onto
/// their closest key (keypad Enter and Linefeed fold into [`Key::Enter`],
/// the international keypad comma folds into [`Key::NumpadDecimal`]).
pub fn key_from_code(code: u16) -> Option<Key> {
    let key = match code {
        1 => Key::Esc,
        2 => Key::Digit1,
        3 => Key::Digit2,
        4 => Key::Digit3,
        5 => Key::Digit4,
        6 => Key::Digit5,
        7 => Key::Digit6,
        8 => Key::Digit7,
        9 => Key::Digit8,
        10 => Key::Digit9,
        11 => Key::Digit0,
        12 => Key::Minus,
        13 => Key::Equal,
        14 => Key::Backspace,
        15 => Key::Tab,
        16 => Key::Q,
        17 => Key::W,
        18 => Key::E,
        19 => Key::R,
        20 => Key::T,
        21 => Key::Y,
        22 => Key::U,
        23 => Key::I,
        24 => Key::O,
        25 => Key::P,
        26 => Key::BracketLeft,
        27 => Key::BracketRight,
        28 => Key::Enter,
        29 => Key::CtrlLeft,
        30 => Key::A,
        31 => Key::S,
        32 => Key::D,
        33 => Key::F,
        34 => Key::G,
        35 => Key::H,
        36 => Key::J,
        37 => Key::K,
        38 => Key::L,
        39 => Key::Semicolon,
        40 => Key::Apostrophe,
        41 => Key::Grave,
        42 => Key::ShiftLeft,
        43 => Key::Backslash,
        44 => Key::Z,
        45 => Key::X,
        46 => Key::C,
        47 => Key::V,
        48 => Key::B,
        49 => Key::N,
        50 => Key::M,
        51 => Key::Comma,
        52 => Key::Dot,
        53 => Key::Slash,
        54 => Key::ShiftRight,
        55 => Key::NumpadMultiply,
        56 => Key::AltLeft,
        57 => Key::Space,
        58 => Key::CapsLock,
        59 => Key::F1,
        60 => Key::F2,
        61 => Key::F3,
        62 => Key::F4,
        63 => Key::F5,
        64 => Key::F6,
        65 => Key::F7,
        66 => Key::F8,
        67 => Key::F9,
        68 => Key::F10,
        69 => Key::NumLock,
        70 => Key::ScrollLock,
        71 => Key::Numpad7,
        72 => Key::Numpad8,
        73 => Key::Numpad9,
        74 => Key::NumpadMinus,
        75 => Key::Numpad4,
        76 => Key::Numpad5,
        77 => Key::Numpad6,
        78 => Key::NumpadPlus,
        79 => Key::Numpad1,
        80 => Key::Numpad2,
        81 => Key::Numpad3,
        82 => Key::Numpad0,
        83 => Key::NumpadDecimal,
        86 => Key::Intl102,
        87 => Key::F11,
        88 => Key::F12,
        // Keypad Enter has no distinct cross-platform representation.
        96 => Key::Enter,
        97 => Key::CtrlRight,
        98 => Key::NumpadSlash,
        100 => Key::AltRight,
        // Linefeed is obsolete; alias to Enter.
        101 => Key::Enter,
        102 => Key::Home,
        103 => Key::ArrowUp,
        104 => Key::PageUp,
        105 => Key::ArrowLeft,
        106 => Key::ArrowRight,
        107 => Key::End,
        108 => Key::ArrowDown,
        109 => Key::PageDown,
        110 => Key::Insert,
        111 => Key::Delete,
        119 => Key::Pause,
        // International keypad comma is the locale variant of the decimal.
        121 => Key::NumpadDecimal,
        183 => Key::F13,
        184 => Key::F14,
        185 => Key::F15,
        186 => Key::F16,
        187 => Key::F17,
        188 => Key::F18,
        189 => Key::F19,
        190 => Key::F20,
        191 => Key::F21,
        192 => Key::F22,
        193 => Key::F23,
        194 => Key::F24,
        _ => return None,
    };
    Some(key)
}

/// Translates a cross-platform [`Key`] back to its canonical native code.
///
/// Keys with several native aliases report the primary code (so
/// [`Key::Enter`] maps to the main Enter key, not keypad Enter).
pub fn key_to_code(key: Key) -> u16 {
    match key {
        Key::Esc => 1,
        Key::Digit1 => 2,
        Key::Digit2 => 3,
        Key::Digit3 => 4,
        Key::Digit4 => 5,
        Key::Digit5 => 6,
        Key::Digit6 => 7,
        Key::Digit7 => 8,
        Key::Digit8 => 9,
        Key::Digit9 => 10,
        Key::Digit0 => 11,
        Key::Minus => 12,
        Key::Equal => 13,
        Key::Backspace => 14,
        Key::Tab => 15,
        Key::Q => 16,
        Key::W => 17,
        Key::E => 18,
        Key::R => 19,
        Key::T => 20,
        Key::Y => 21,
        Key::U => 22,
        Key::I => 23,
        Key::O => 24,
        Key::P => 25,
        Key::BracketLeft => 26,
        Key::BracketRight => 27,
        Key::Enter => 28,
        Key::CtrlLeft => 29,
        Key::A => 30,
        Key::S => 31,
        Key::D => 32,
        Key::F => 33,
        Key::G => 34,
        Key::H => 35,
        Key::J => 36,
        Key::K => 37,
        Key::L => 38,
        Key::Semicolon => 39,
        Key::Apostrophe => 40,
        Key::Grave => 41,
        Key::ShiftLeft => 42,
        Key::Backslash => 43,
        Key::Z => 44,
        Key::X => 45,
        Key::C => 46,
        Key::V => 47,
        Key::B => 48,
        Key::N => 49,
        Key::M => 50,
        Key::Comma => 51,
        Key::Dot => 52,
        Key::Slash => 53,
        Key::ShiftRight => 54,
        Key::NumpadMultiply => 55,
        Key::AltLeft => 56,
        Key::Space => 57,
        Key::CapsLock => 58,
        Key::F1 => 59,
        Key::F2 => 60,
        Key::F3 => 61,
        Key::F4 => 62,
        Key::F5 => 63,
        Key::F6 => 64,
        Key::F7 => 65,
        Key::F8 => 66,
        Key::F9 => 67,
        Key::F10 => 68,
        Key::NumLock => 69,
        Key::ScrollLock => 70,
        Key::Numpad7 => 71,
        Key::Numpad8 => 72,
        Key::Numpad9 => 73,
        Key::NumpadMinus => 74,
        Key::Numpad4 => 75,
        Key::Numpad5 => 76,
        Key::Numpad6 => 77,
        Key::NumpadPlus => 78,
        Key::Numpad1 => 79,
        Key::Numpad2 => 80,
        Key::Numpad3 => 81,
        Key::Numpad0 => 82,
        Key::NumpadDecimal => 83,
        Key::Intl102 => 86,
        Key::F11 => 87,
        Key::F12 => 88,
        Key::CtrlRight => 97,
        Key::NumpadSlash => 98,
        Key::AltRight => 100,
        Key::Home => 102,
        Key::ArrowUp => 103,
        Key::PageUp => 104,
        Key::ArrowLeft => 105,
        Key::ArrowRight => 106,
        Key::End => 107,
        Key::ArrowDown => 108,
        Key::PageDown => 109,
        Key::Insert => 110,
        Key::Delete => 111,
        Key::Pause => 119,
        Key::F13 => 183,
        Key::F14 => 184,
        Key::F15 => 185,
        Key::F16 => 186,
        Key::F17 => 187,
        Key::F18 => 188,
        Key::F19 => 189,
        Key::F20 => 190,
        Key::F21 => 191,
        Key::F22 => 192,
        Key::F23 => 193,
        Key::F24 => 194,
    }
}

/// Translates a native gamepad key code into a cross-platform [`Button`].
///
/// Covers the face/shoulder/menu block and the digital dpad block; every
/// other code (including `BTN_C`, `BTN_Z`, `BTN_MODE`) returns `None`.
pub fn button_from_code(code: u16) -> Option<Button> {
    let button = match code {
        code::BTN_SOUTH => Button::South,
        code::BTN_EAST => Button::East,
        code::BTN_NORTH => Button::North,
        code::BTN_WEST => Button::West,
        code::BTN_TL => Button::L1,
        code::BTN_TR => Button::R1,
        code::BTN_TL2 => Button::L2,
        code::BTN_TR2 => Button::R2,
        code::BTN_SELECT => Button::Select,
        code::BTN_START => Button::Start,
        code::BTN_THUMBL => Button::ThumbLeft,
        code::BTN_THUMBR => Button::ThumbRight,
        code::BTN_DPAD_UP => Button::DpadUp,
        code::BTN_DPAD_DOWN => Button::DpadDown,
        code::BTN_DPAD_LEFT => Button::DpadLeft,
        code::BTN_DPAD_RIGHT => Button::DpadRight,
        _ => return None,
    };
    Some(button)
}

/// Translates a cross-platform [`Button`] back to its native key code.
pub fn button_to_code(button: Button) -> u16 {
    match button {
        Button::South => code::BTN_SOUTH,
        Button::East => code::BTN_EAST,
        Button::North => code::BTN_NORTH,
        Button::West => code::BTN_WEST,
        Button::L1 => code::BTN_TL,
        Button::R1 => code::BTN_TR,
        Button::L2 => code::BTN_TL2,
        Button::R2 => code::BTN_TR2,
        Button::Select => code::BTN_SELECT,
        Button::Start => code::BTN_START,
        Button::ThumbLeft => code::BTN_THUMBL,
        Button::ThumbRight => code::BTN_THUMBR,
        Button::DpadUp => code::BTN_DPAD_UP,
        Button::DpadDown => code::BTN_DPAD_DOWN,
        Button::DpadLeft => code::BTN_DPAD_LEFT,
        Button::DpadRight => code::BTN_DPAD_RIGHT,
    }
}

/// Maps a native mouse button code to its index on the mouse surface.
///
/// Index 0, 1, 2 are left, right, and middle; the remaining indices cover
/// side/extra/forward/back/task buttons in native code order.
pub fn mouse_button_index(code: u16) -> Option<u32> {
    if (code::BTN_LEFT..=code::BTN_TASK).contains(&code) {
        Some(u32::from(code - code::BTN_LEFT))
    } else {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_key_roundtrips_through_its_canonical_code() {
        for key in Key::all() {
            let code = key_to_code(key);
            assert_eq!(
                key_from_code(code),
                Some(key),
                "canonical code {code} of {key:?} must map back"
            );
        }
    }

    #[test]
    fn test_aliased_codes_fold_onto_primary_keys() {
        // Keypad Enter and Linefeed both read as Enter.
        assert_eq!(key_from_code(96), Some(Key::Enter));
        assert_eq!(key_from_code(101), Some(Key::Enter));
        // International keypad comma reads as the decimal key.
        assert_eq!(key_from_code(121), Some(Key::NumpadDecimal));
        // But the canonical reverse mapping stays on the primary codes.
        assert_eq!(key_to_code(Key::Enter), 28);
        assert_eq!(key_to_code(Key::NumpadDecimal), 83);
    }

    #[test]
    fn test_unmapped_key_codes_are_dropped() {
        assert_eq!(key_from_code(0), None);
        assert_eq!(key_from_code(84), None);
        assert_eq!(key_from_code(255), None);
        assert_eq!(key_from_code(0x1ff), None);
    }

    #[test]
    fn test_every_button_roundtrips_through_its_code() {
        for button in Button::all() {
            assert_eq!(button_from_code(button_to_code(button)), Some(button));
        }
    }

    #[test]
    fn test_unmapped_button_codes_are_dropped() {
        // BTN_C, BTN_Z and BTN_MODE sit inside the gamepad block but have no
        // cross-platform representation.
        assert_eq!(button_from_code(0x132), None);
        assert_eq!(button_from_code(0x135), None);
        assert_eq!(button_from_code(0x13c), None);
    }

    #[test]
    fn test_mouse_button_indices_follow_code_order() {
        assert_eq!(mouse_button_index(code::BTN_LEFT), Some(0));
        assert_eq!(mouse_button_index(code::BTN_RIGHT), Some(1));
        assert_eq!(mouse_button_index(code::BTN_MIDDLE), Some(2));
        assert_eq!(mouse_button_index(code::BTN_TASK), Some(7));
        assert_eq!(mouse_button_index(code::BTN_SOUTH), None);
    }
}
