//! Device-type deduction from raw capability bitfields.
//!
//! A raw input source does not announce "I am a mouse". Instead it advertises
//! event classes (relative, absolute, force-feedback, sync) and a bitmap of
//! key codes it can emit. Deduction accumulates per-type proof scores from
//! those capabilities and picks the highest-scoring type, requiring a score
//! of at least 2; ties and weak evidence yield [`DeviceType::Unknown`] and
//! the source is ignored.
//!
//! Sources that advertise tool/stylus/touch codes lose proof across the
//! board, which keeps tablets and touchscreens from masquerading as mice.

use crate::codes::{Button, DeviceType, Key};
use crate::keymap;

/// Number of 64-bit words in a [`KeyBitmap`], covering codes `0..768`.
const KEY_BITMAP_WORDS: usize = 12;

/// Bitmap of native key codes a source can emit, as reported by the bridge's
/// capability query (and by the global key-state query during resync).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBitmap {
    words: [u64; KEY_BITMAP_WORDS],
}

impl Default for KeyBitmap {
    fn default() -> Self {
        Self { words: [0; KEY_BITMAP_WORDS] }
    }
}

impl KeyBitmap {
    /// An empty bitmap.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bit for `code`. Codes beyond the bitmap range are ignored.
    pub fn set(&mut self, code: u16) {
        let (word, bit) = (usize::from(code) / 64, usize::from(code) % 64);
        if word < KEY_BITMAP_WORDS {
            self.words[word] |= 1 << bit;
        }
    }

    /// Returns whether the bit for `code` is set.
    pub fn get(&self, code: u16) -> bool {
        let (word, bit) = (usize::from(code) / 64, usize::from(code) % 64);
        word < KEY_BITMAP_WORDS && self.words[word] & (1 << bit) != 0
    }

    /// Fills the bitmap from raw bytes in ascending bit order.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bitmap = Self::new();
        for (i, &byte) in bytes.iter().enumerate() {
            for bit in 0..8 {
                if byte & (1 << bit) != 0 {
                    bitmap.set((i * 8 + bit) as u16);
                }
            }
        }
        bitmap
    }
}

/// Everything deduction needs to know about a raw source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SourceCapabilities {
    /// The source emits sync markers separating event groups. Required; the
    /// replication engine cannot fold an unsynchronized stream.
    pub has_sync: bool,
    /// The source emits relative-motion events.
    pub has_relative: bool,
    /// The source emits absolute-axis events.
    pub has_absolute: bool,
    /// The source supports force-feedback effects.
    pub has_force_feedback: bool,
    /// Key codes the source can emit.
    pub keys: KeyBitmap,
}

/// Deduces the most likely device type for a source, or
/// [`DeviceType::Unknown`] when the evidence is insufficient or ambiguous.
pub fn deduce_device_type(caps: &SourceCapabilities) -> DeviceType {
    if !caps.has_sync {
        // Event groups cannot be delimited; the source is unusable.
        return DeviceType::Unknown;
    }

    let mut proof_mouse: i32 = 0;
    let mut proof_keyboard: i32 = 0;
    let mut proof_gamepad: i32 = 0;

    if caps.has_relative {
        // Only mice generate relative motion.
        proof_mouse += 1;
        proof_keyboard -= 1;
        proof_gamepad -= 1;
    }
    if caps.has_absolute {
        // Absolute axes point at gamepads; touchscreens are handled by the
        // blacklist below rather than here.
        proof_gamepad += 1;
        proof_mouse -= 1;
        proof_keyboard -= 1;
    }
    if caps.has_force_feedback {
        proof_gamepad += 1;
    }

    // Count how many advertised key codes fall into each category.
    let keyboard_codes = Key::all()
        .filter(|&key| caps.keys.get(keymap::key_to_code(key)))
        .count() as i32;
    let gamepad_codes = Button::all()
        .filter(|&button| caps.keys.get(keymap::button_to_code(button)))
        .count() as i32;
    let mouse_codes = keymap::MOUSE_BUTTON_CODES
        .iter()
        .filter(|&&code| caps.keys.get(code))
        .count() as i32;

    for &code in &keymap::BLACKLIST_CODES {
        if caps.keys.get(code) {
            proof_mouse -= 1;
            proof_keyboard -= 1;
            proof_gamepad -= 1;
        }
    }

    if mouse_codes > 0 && keyboard_codes + gamepad_codes <= 0 {
        proof_mouse += 2;
        proof_keyboard -= 1;
        proof_gamepad -= 1;
    } else if keyboard_codes > 0 && gamepad_codes <= 0 {
        // Keyboards have barely any other evidence, so key codes weigh more.
        proof_keyboard += 3;
        proof_mouse -= 1;
        proof_gamepad -= 1;
    } else if gamepad_codes > 0 {
        proof_gamepad += 2;
        proof_mouse -= 1;
        proof_keyboard -= 1;
    }

    let (deduced, proof) = if proof_mouse > proof_keyboard && proof_mouse > proof_gamepad {
        (DeviceType::Mouse, proof_mouse)
    } else if proof_keyboard > proof_gamepad {
        (DeviceType::Keyboard, proof_keyboard)
    } else {
        (DeviceType::Gamepad, proof_gamepad)
    };

    if proof > 1 {
        deduced
    } else {
        DeviceType::Unknown
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
