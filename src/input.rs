//! Input state: key codes, keyboard snapshots, and mouse state.
//!
//! The key enumeration is dense: printable ASCII keys carry their
//! character code, extended keys follow in a fixed block, and
//! [`Key::Any`] is a virtual key that reads as pressed whenever any
//! physical key went down. OS key codes are mapped through the total
//! [`Key::from_code`]; unknown codes land on [`Key::Unknown`].
//!
//! Event translation (the OS event pump) is the embedder's job: it feeds
//! [`Keyboard::key_event`] / the [`Mouse`] fields, and gameplay code reads
//! the queries.

/// Number of key slots in the state arrays.
pub const KEY_COUNT: usize = 512;

macro_rules! keys {
    ($(($variant:ident, $value:expr)),+ $(,)?) => {
        /// A physical (or virtual) key.
        #[repr(u16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Key {
            $($variant = $value),+
        }

        impl Key {
            /// Every key, for iteration and reverse lookup.
            pub const ALL: &'static [Key] = &[$(Key::$variant),+];

            /// Total mapping from a raw key code; unknown codes map to
            /// [`Key::Unknown`].
            pub fn from_code(code: u32) -> Key {
                $(if code == $value { return Key::$variant; })+
                Key::Unknown
            }
        }
    };
}

keys! {
    (Unknown, 0),
    (Return, 13),
    (Escape, 27),
    (Backspace, 8),
    (Tab, 9),
    (Space, 32),
    (Exclaim, 33),
    (QuoteDbl, 34),
    (Hash, 35),
    (Dollar, 36),
    (Percent, 37),
    (Ampersand, 38),
    (Quote, 39),
    (LeftParen, 40),
    (RightParen, 41),
    (Asterisk, 42),
    (Plus, 43),
    (Comma, 44),
    (Minus, 45),
    (Period, 46),
    (Slash, 47),
    (Num0, 48),
    (Num1, 49),
    (Num2, 50),
    (Num3, 51),
    (Num4, 52),
    (Num5, 53),
    (Num6, 54),
    (Num7, 55),
    (Num8, 56),
    (Num9, 57),
    (Colon, 58),
    (Semicolon, 59),
    (Less, 60),
    (Equals, 61),
    (Greater, 62),
    (Question, 63),
    (At, 64),
    (LeftBracket, 91),
    (Backslash, 92),
    (RightBracket, 93),
    (Caret, 94),
    (Underscore, 95),
    (Backquote, 96),
    (A, 97),
    (B, 98),
    (C, 99),
    (D, 100),
    (E, 101),
    (F, 102),
    (G, 103),
    (H, 104),
    (I, 105),
    (J, 106),
    (K, 107),
    (L, 108),
    (M, 109),
    (N, 110),
    (O, 111),
    (P, 112),
    (Q, 113),
    (R, 114),
    (S, 115),
    (T, 116),
    (U, 117),
    (V, 118),
    (W, 119),
    (X, 120),
    (Y, 121),
    (Z, 122),
    (CapsLock, 123),
    (F1, 124),
    (F2, 125),
    (F3, 126),
    (F4, 127),
    (F5, 128),
    (F6, 129),
    (F7, 130),
    (F8, 131),
    (F9, 132),
    (F10, 133),
    (F11, 134),
    (F12, 135),
    (PrintScreen, 136),
    (ScrollLock, 137),
    (Pause, 138),
    (Insert, 139),
    (Home, 140),
    (PageUp, 141),
    (Delete, 142),
    (End, 143),
    (PageDown, 144),
    (Right, 145),
    (Left, 146),
    (Down, 147),
    (Up, 148),
    (NumLockClear, 149),
    (KpDivide, 150),
    (KpMultiply, 151),
    (KpMinus, 152),
    (KpPlus, 153),
    (KpEnter, 154),
    (Kp1, 155),
    (Kp2, 156),
    (Kp3, 157),
    (Kp4, 158),
    (Kp5, 159),
    (Kp6, 160),
    (Kp7, 161),
    (Kp8, 162),
    (Kp9, 163),
    (Kp0, 164),
    (KpPeriod, 165),
    (Application, 166),
    (Power, 167),
    (KpEquals, 168),
    (F13, 169),
    (F14, 170),
    (F15, 171),
    (F16, 172),
    (F17, 173),
    (F18, 174),
    (F19, 175),
    (F20, 176),
    (F21, 177),
    (F22, 178),
    (F23, 179),
    (F24, 180),
    (Help, 181),
    (Menu, 182),
    (Select, 183),
    (Stop, 184),
    (Again, 185),
    (Undo, 186),
    (Cut, 187),
    (Copy, 188),
    (Paste, 189),
    (Find, 190),
    (Mute, 191),
    (VolumeUp, 192),
    (VolumeDown, 193),
    (KpComma, 194),
    (AltErase, 196),
    (SysReq, 197),
    (Cancel, 198),
    (Clear, 199),
    (Prior, 200),
    (Return2, 201),
    (Separator, 202),
    (KpLeftParen, 214),
    (KpRightParen, 215),
    (KpTab, 218),
    (KpBackspace, 219),
    (LCtrl, 254),
    (LShift, 255),
    (LAlt, 256),
    (LGui, 257),
    (RCtrl, 258),
    (RShift, 259),
    (RAlt, 260),
    (RGui, 261),
    (Mode, 262),
    (AudioNext, 263),
    (AudioPrev, 264),
    (AudioStop, 265),
    (AudioPlay, 266),
    (AudioMute, 267),
    (MediaSelect, 268),
    (AcSearch, 273),
    (AcHome, 274),
    (AcBack, 275),
    (AcForward, 276),
    (AcStop, 277),
    (AcRefresh, 278),
    (AcBookmarks, 279),
    (BrightnessDown, 280),
    (BrightnessUp, 281),
    (DisplaySwitch, 282),
    (Eject, 286),
    (Sleep, 287),
    (Any, 288),
}

impl Key {
    /// Index into the keyboard state arrays.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Mouse buttons.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
    X1 = 3,
    X2 = 4,
}

const MOUSE_BUTTON_COUNT: usize = 5;

/// Keyboard state with previous-frame comparison and per-key timestamps.
pub struct Keyboard {
    down: [bool; KEY_COUNT],
    prev: [bool; KEY_COUNT],
    timestamps: [f64; KEY_COUNT],
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}

impl Keyboard {
    /// Fresh state with every key up.
    pub fn new() -> Keyboard {
        Keyboard {
            down: [false; KEY_COUNT],
            prev: [false; KEY_COUNT],
            timestamps: [0.0; KEY_COUNT],
        }
    }

    /// Roll the current state into the previous-frame snapshot. Call once
    /// per frame before feeding events.
    pub fn begin_frame(&mut self) {
        self.prev = self.down;
    }

    /// Feed one key transition. `time` is the event timestamp in seconds.
    ///
    /// Any down transition also presses the virtual [`Key::Any`].
    pub fn key_event(&mut self, key: Key, is_down: bool, time: f64) {
        let index = key.index();
        self.down[index] = is_down;
        self.timestamps[index] = time;
        if is_down {
            self.down[Key::Any.index()] = true;
            self.timestamps[Key::Any.index()] = time;
        } else if key != Key::Any {
            // Any stays down while at least one physical key is held.
            let any_down = self
                .down
                .iter()
                .enumerate()
                .any(|(i, &d)| d && i != Key::Any.index());
            self.down[Key::Any.index()] = any_down;
        }
    }

    /// Whether the key is currently held.
    pub fn key_down(&self, key: Key) -> bool {
        self.down[key.index()]
    }

    /// Whether the key is currently up.
    pub fn key_up(&self, key: Key) -> bool {
        !self.down[key.index()]
    }

    /// Down this frame, up the previous one.
    pub fn key_just_pressed(&self, key: Key) -> bool {
        self.down[key.index()] && !self.prev[key.index()]
    }

    /// Up this frame, down the previous one.
    pub fn key_just_released(&self, key: Key) -> bool {
        !self.down[key.index()] && self.prev[key.index()]
    }

    /// Timestamp of the key's last transition.
    pub fn key_timestamp(&self, key: Key) -> f64 {
        self.timestamps[key.index()]
    }

    /// Either control key held.
    pub fn ctrl(&self) -> bool {
        self.key_down(Key::LCtrl) || self.key_down(Key::RCtrl)
    }

    /// Either shift key held.
    pub fn shift(&self) -> bool {
        self.key_down(Key::LShift) || self.key_down(Key::RShift)
    }

    /// Either alt key held.
    pub fn alt(&self) -> bool {
        self.key_down(Key::LAlt) || self.key_down(Key::RAlt)
    }

    /// Either GUI (super) key held.
    pub fn gui(&self) -> bool {
        self.key_down(Key::LGui) || self.key_down(Key::RGui)
    }

    /// Drop every key to the up state.
    pub fn clear(&mut self) {
        self.down = [false; KEY_COUNT];
        self.prev = [false; KEY_COUNT];
    }
}

/// Mouse state fed by the embedder per frame.
#[derive(Debug, Clone, Default)]
pub struct Mouse {
    /// Cursor position in window coordinates.
    pub x: f32,
    pub y: f32,
    /// Motion since the last frame.
    pub delta_x: f32,
    pub delta_y: f32,
    /// Wheel motion this frame.
    pub wheel: f32,
    /// Whether the last click was a double click.
    pub double_click: bool,

    buttons: [bool; MOUSE_BUTTON_COUNT],
    buttons_prev: [bool; MOUSE_BUTTON_COUNT],
}

impl Mouse {
    /// Roll button state into the previous-frame snapshot and clear the
    /// per-frame deltas.
    pub fn begin_frame(&mut self) {
        self.buttons_prev = self.buttons;
        self.delta_x = 0.0;
        self.delta_y = 0.0;
        self.wheel = 0.0;
        self.double_click = false;
    }

    /// Feed one button transition.
    pub fn button_event(&mut self, button: MouseButton, is_down: bool) {
        self.buttons[button as usize] = is_down;
    }

    /// Whether the button is held.
    pub fn button_down(&self, button: MouseButton) -> bool {
        self.buttons[button as usize]
    }

    /// Down this frame, up the previous one.
    pub fn button_just_pressed(&self, button: MouseButton) -> bool {
        self.buttons[button as usize] && !self.buttons_prev[button as usize]
    }

    /// Up this frame, down the previous one.
    pub fn button_just_released(&self, button: MouseButton) -> bool {
        !self.buttons[button as usize] && self.buttons_prev[button as usize]
    }
}
