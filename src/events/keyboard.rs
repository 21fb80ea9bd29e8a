//! Keyboard translation
//!
//! Translated key samples carry the platform scancode. On Linux that is the
//! evdev keycode, which is mapped to the toolkit's HID usage scancodes here.

use std::collections::HashMap;

use tracing::trace;

use super::toolkit::Scancode;

/// Linux evdev keycodes
pub mod keycodes {
    pub const KEY_ESC: u8 = 1;
    pub const KEY_1: u8 = 2;
    pub const KEY_2: u8 = 3;
    pub const KEY_3: u8 = 4;
    pub const KEY_4: u8 = 5;
    pub const KEY_5: u8 = 6;
    pub const KEY_6: u8 = 7;
    pub const KEY_7: u8 = 8;
    pub const KEY_8: u8 = 9;
    pub const KEY_9: u8 = 10;
    pub const KEY_0: u8 = 11;
    pub const KEY_MINUS: u8 = 12;
    pub const KEY_EQUAL: u8 = 13;
    pub const KEY_BACKSPACE: u8 = 14;
    pub const KEY_TAB: u8 = 15;
    pub const KEY_Q: u8 = 16;
    pub const KEY_W: u8 = 17;
    pub const KEY_E: u8 = 18;
    pub const KEY_R: u8 = 19;
    pub const KEY_T: u8 = 20;
    pub const KEY_Y: u8 = 21;
    pub const KEY_U: u8 = 22;
    pub const KEY_I: u8 = 23;
    pub const KEY_O: u8 = 24;
    pub const KEY_P: u8 = 25;
    pub const KEY_LEFTBRACE: u8 = 26;
    pub const KEY_RIGHTBRACE: u8 = 27;
    pub const KEY_ENTER: u8 = 28;
    pub const KEY_LEFTCTRL: u8 = 29;
    pub const KEY_A: u8 = 30;
    pub const KEY_S: u8 = 31;
    pub const KEY_D: u8 = 32;
    pub const KEY_F: u8 = 33;
    pub const KEY_G: u8 = 34;
    pub const KEY_H: u8 = 35;
    pub const KEY_J: u8 = 36;
    pub const KEY_K: u8 = 37;
    pub const KEY_L: u8 = 38;
    pub const KEY_SEMICOLON: u8 = 39;
    pub const KEY_APOSTROPHE: u8 = 40;
    pub const KEY_GRAVE: u8 = 41;
    pub const KEY_LEFTSHIFT: u8 = 42;
    pub const KEY_BACKSLASH: u8 = 43;
    pub const KEY_Z: u8 = 44;
    pub const KEY_X: u8 = 45;
    pub const KEY_C: u8 = 46;
    pub const KEY_V: u8 = 47;
    pub const KEY_B: u8 = 48;
    pub const KEY_N: u8 = 49;
    pub const KEY_M: u8 = 50;
    pub const KEY_COMMA: u8 = 51;
    pub const KEY_DOT: u8 = 52;
    pub const KEY_SLASH: u8 = 53;
    pub const KEY_RIGHTSHIFT: u8 = 54;
    pub const KEY_KPASTERISK: u8 = 55;
    pub const KEY_LEFTALT: u8 = 56;
    pub const KEY_SPACE: u8 = 57;
    pub const KEY_CAPSLOCK: u8 = 58;
    pub const KEY_F1: u8 = 59;
    pub const KEY_F2: u8 = 60;
    pub const KEY_F3: u8 = 61;
    pub const KEY_F4: u8 = 62;
    pub const KEY_F5: u8 = 63;
    pub const KEY_F6: u8 = 64;
    pub const KEY_F7: u8 = 65;
    pub const KEY_F8: u8 = 66;
    pub const KEY_F9: u8 = 67;
    pub const KEY_F10: u8 = 68;
    pub const KEY_NUMLOCK: u8 = 69;
    pub const KEY_SCROLLLOCK: u8 = 70;
    pub const KEY_KP7: u8 = 71;
    pub const KEY_KP8: u8 = 72;
    pub const KEY_KP9: u8 = 73;
    pub const KEY_KPMINUS: u8 = 74;
    pub const KEY_KP4: u8 = 75;
    pub const KEY_KP5: u8 = 76;
    pub const KEY_KP6: u8 = 77;
    pub const KEY_KPPLUS: u8 = 78;
    pub const KEY_KP1: u8 = 79;
    pub const KEY_KP2: u8 = 80;
    pub const KEY_KP3: u8 = 81;
    pub const KEY_KP0: u8 = 82;
    pub const KEY_KPDOT: u8 = 83;
    pub const KEY_102ND: u8 = 86;
    pub const KEY_F11: u8 = 87;
    pub const KEY_F12: u8 = 88;
    pub const KEY_KPENTER: u8 = 96;
    pub const KEY_RIGHTCTRL: u8 = 97;
    pub const KEY_KPSLASH: u8 = 98;
    pub const KEY_SYSRQ: u8 = 99;
    pub const KEY_RIGHTALT: u8 = 100;
    pub const KEY_HOME: u8 = 102;
    pub const KEY_UP: u8 = 103;
    pub const KEY_PAGEUP: u8 = 104;
    pub const KEY_LEFT: u8 = 105;
    pub const KEY_RIGHT: u8 = 106;
    pub const KEY_END: u8 = 107;
    pub const KEY_DOWN: u8 = 108;
    pub const KEY_PAGEDOWN: u8 = 109;
    pub const KEY_INSERT: u8 = 110;
    pub const KEY_DELETE: u8 = 111;
    pub const KEY_MUTE: u8 = 113;
    pub const KEY_VOLUMEDOWN: u8 = 114;
    pub const KEY_VOLUMEUP: u8 = 115;
    pub const KEY_POWER: u8 = 116;
    pub const KEY_KPEQUAL: u8 = 117;
    pub const KEY_PAUSE: u8 = 119;
    pub const KEY_LEFTMETA: u8 = 125;
    pub const KEY_RIGHTMETA: u8 = 126;
    pub const KEY_COMPOSE: u8 = 127;
    pub const KEY_F13: u8 = 183;
}

/// Keymap selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum KeymapKind {
    /// Linux evdev table
    #[default]
    Linux,
    /// Pass platform scancodes through unchanged
    Raw,
}

impl KeymapKind {
    /// Parse a configuration name; `auto` resolves to the platform table
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "auto" | "linux" => Some(KeymapKind::Linux),
            "raw" => Some(KeymapKind::Raw),
            _ => None,
        }
    }
}

/// Platform scancode to toolkit scancode table
#[derive(Debug, Clone)]
pub struct Keymap {
    kind: KeymapKind,
    table: HashMap<u8, u32>,
}

impl Keymap {
    /// Build the table for a keymap kind
    pub fn new(kind: KeymapKind) -> Self {
        let mut keymap = Self {
            kind,
            table: HashMap::new(),
        };
        if kind == KeymapKind::Linux {
            keymap.initialize_linux_map();
        }
        keymap
    }

    /// Keymap kind
    pub fn kind(&self) -> KeymapKind {
        self.kind
    }

    /// Number of mapped keys
    pub fn mapped_key_count(&self) -> usize {
        self.table.len()
    }

    /// Translate a platform scancode; misses map to [`Scancode::UNKNOWN`]
    pub fn translate(&self, code: u8) -> Scancode {
        match self.kind {
            KeymapKind::Raw => Scancode(code as u32),
            KeymapKind::Linux => match self.table.get(&code) {
                Some(usage) => Scancode(*usage),
                None => {
                    trace!("No toolkit scancode for keycode {}", code);
                    Scancode::UNKNOWN
                }
            },
        }
    }

    fn initialize_linux_map(&mut self) {
        use keycodes::*;

        let mappings = [
            (KEY_A, 4),
            (KEY_B, 5),
            (KEY_C, 6),
            (KEY_D, 7),
            (KEY_E, 8),
            (KEY_F, 9),
            (KEY_G, 10),
            (KEY_H, 11),
            (KEY_I, 12),
            (KEY_J, 13),
            (KEY_K, 14),
            (KEY_L, 15),
            (KEY_M, 16),
            (KEY_N, 17),
            (KEY_O, 18),
            (KEY_P, 19),
            (KEY_Q, 20),
            (KEY_R, 21),
            (KEY_S, 22),
            (KEY_T, 23),
            (KEY_U, 24),
            (KEY_V, 25),
            (KEY_W, 26),
            (KEY_X, 27),
            (KEY_Y, 28),
            (KEY_Z, 29),
            (KEY_1, 30),
            (KEY_2, 31),
            (KEY_3, 32),
            (KEY_4, 33),
            (KEY_5, 34),
            (KEY_6, 35),
            (KEY_7, 36),
            (KEY_8, 37),
            (KEY_9, 38),
            (KEY_0, 39),
            (KEY_ENTER, 40),
            (KEY_ESC, 41),
            (KEY_BACKSPACE, 42),
            (KEY_TAB, 43),
            (KEY_SPACE, 44),
            (KEY_MINUS, 45),
            (KEY_EQUAL, 46),
            (KEY_LEFTBRACE, 47),
            (KEY_RIGHTBRACE, 48),
            (KEY_BACKSLASH, 49),
            (KEY_SEMICOLON, 51),
            (KEY_APOSTROPHE, 52),
            (KEY_GRAVE, 53),
            (KEY_COMMA, 54),
            (KEY_DOT, 55),
            (KEY_SLASH, 56),
            (KEY_CAPSLOCK, 57),
            (KEY_F1, 58),
            (KEY_F2, 59),
            (KEY_F3, 60),
            (KEY_F4, 61),
            (KEY_F5, 62),
            (KEY_F6, 63),
            (KEY_F7, 64),
            (KEY_F8, 65),
            (KEY_F9, 66),
            (KEY_F10, 67),
            (KEY_F11, 68),
            (KEY_F12, 69),
            (KEY_SYSRQ, 70),
            (KEY_SCROLLLOCK, 71),
            (KEY_PAUSE, 72),
            (KEY_INSERT, 73),
            (KEY_HOME, 74),
            (KEY_PAGEUP, 75),
            (KEY_DELETE, 76),
            (KEY_END, 77),
            (KEY_PAGEDOWN, 78),
            (KEY_RIGHT, 79),
            (KEY_LEFT, 80),
            (KEY_DOWN, 81),
            (KEY_UP, 82),
            (KEY_NUMLOCK, 83),
            (KEY_KPSLASH, 84),
            (KEY_KPASTERISK, 85),
            (KEY_KPMINUS, 86),
            (KEY_KPPLUS, 87),
            (KEY_KPENTER, 88),
            (KEY_KP1, 89),
            (KEY_KP2, 90),
            (KEY_KP3, 91),
            (KEY_KP4, 92),
            (KEY_KP5, 93),
            (KEY_KP6, 94),
            (KEY_KP7, 95),
            (KEY_KP8, 96),
            (KEY_KP9, 97),
            (KEY_KP0, 98),
            (KEY_KPDOT, 99),
            (KEY_102ND, 100),
            (KEY_COMPOSE, 101),
            (KEY_POWER, 102),
            (KEY_KPEQUAL, 103),
            (KEY_MUTE, 127),
            (KEY_VOLUMEUP, 128),
            (KEY_VOLUMEDOWN, 129),
            (KEY_LEFTCTRL, 224),
            (KEY_LEFTSHIFT, 225),
            (KEY_LEFTALT, 226),
            (KEY_LEFTMETA, 227),
            (KEY_RIGHTCTRL, 228),
            (KEY_RIGHTSHIFT, 229),
            (KEY_RIGHTALT, 230),
            (KEY_RIGHTMETA, 231),
        ];
        self.table.extend(mappings);

        // F13..F24 are contiguous on both sides
        for offset in 0..12u8 {
            self.table.insert(KEY_F13 + offset, 104 + offset as u32);
        }
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new(KeymapKind::default())
    }
}
