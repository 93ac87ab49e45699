use serde::{Deserialize, Serialize};

pub const NUM_KEYS: usize = 16;

/// Key's variants are the 16 keys from the CHIP-8's hexadecimal keyboard.
/// The recommended key mapping is:
///
/// Keypad                   Keyboard
/// +-+-+-+-+                +-+-+-+-+
/// |1|2|3|C|                |1|2|3|4|
/// +-+-+-+-+                +-+-+-+-+
/// |4|5|6|D|                |Q|W|E|R|
/// +-+-+-+-+       =>       +-+-+-+-+
/// |7|8|9|E|                |A|S|D|F|
/// +-+-+-+-+                +-+-+-+-+
/// |A|0|B|F|                |Z|X|C|V|
/// +-+-+-+-+                +-+-+-+-+
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Key {
    Key1,
    Key2,
    Key3,
    C,
    Key4,
    Key5,
    Key6,
    D,
    Key7,
    Key8,
    Key9,
    E,
    A,
    Key0,
    B,
    F,
}

impl Key {
    /// The hex value the key reports to the program.
    pub fn code(self) -> u8 {
        match self {
            Key::Key0 => 0x0,
            Key::Key1 => 0x1,
            Key::Key2 => 0x2,
            Key::Key3 => 0x3,
            Key::Key4 => 0x4,
            Key::Key5 => 0x5,
            Key::Key6 => 0x6,
            Key::Key7 => 0x7,
            Key::Key8 => 0x8,
            Key::Key9 => 0x9,
            Key::A => 0xA,
            Key::B => 0xB,
            Key::C => 0xC,
            Key::D => 0xD,
            Key::E => 0xE,
            Key::F => 0xF,
        }
    }

    pub fn from_code(code: u8) -> Option<Key> {
        let key = match code {
            0x0 => Key::Key0,
            0x1 => Key::Key1,
            0x2 => Key::Key2,
            0x3 => Key::Key3,
            0x4 => Key::Key4,
            0x5 => Key::Key5,
            0x6 => Key::Key6,
            0x7 => Key::Key7,
            0x8 => Key::Key8,
            0x9 => Key::Key9,
            0xA => Key::A,
            0xB => Key::B,
            0xC => Key::C,
            0xD => Key::D,
            0xE => Key::E,
            0xF => Key::F,
            _ => return None,
        };
        Some(key)
    }

    /// Map a host keyboard character using the layout in the table above.
    pub fn from_qwerty(c: char) -> Option<Key> {
        match c.to_ascii_lowercase() {
            '1' => Some(Key::Key1),
            '2' => Some(Key::Key2),
            '3' => Some(Key::Key3),
            '4' => Some(Key::C),
            'q' => Some(Key::Key4),
            'w' => Some(Key::Key5),
            'e' => Some(Key::Key6),
            'r' => Some(Key::D),
            'a' => Some(Key::Key7),
            's' => Some(Key::Key8),
            'd' => Some(Key::Key9),
            'f' => Some(Key::E),
            'z' => Some(Key::A),
            'x' => Some(Key::Key0),
            'c' => Some(Key::B),
            'v' => Some(Key::F),
            _ => None,
        }
    }
}

/// Implemented by whatever the host uses for input. The scheduler asks it
/// once per tick which keys are held down.
pub trait AsKeyboard {
    fn keys_down(&self) -> Vec<Key>;
}

/// An input source with nothing pressed, for headless runs.
pub struct NoKeys;

impl AsKeyboard for NoKeys {
    fn keys_down(&self) -> Vec<Key> {
        Vec::new()
    }
}

/// State of the FX0A instruction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum KeyWait {
    #[default]
    Idle,
    /// Execution is parked until a key is down; its code goes into the
    /// register.
    AwaitingKey { register: u8 },
}

/// Contains the state (up or down) of the CHIP-8's 16 keys, as well as any
/// state related to keyboard input
pub struct Keyboard {
    key_input: [bool; NUM_KEYS],
    wait: KeyWait,
}

impl Keyboard {
    pub fn new() -> Self {
        Keyboard {
            key_input: [false; NUM_KEYS],
            wait: KeyWait::Idle,
        }
    }

    pub fn handle_key_down(&mut self, k: Key) {
        self.key_input[k.code() as usize] = true;
    }

    pub fn handle_key_up(&mut self, k: Key) {
        self.key_input[k.code() as usize] = false;
    }

    /// Replace the snapshot with exactly the given keys held down.
    pub fn update(&mut self, keys_down: &[Key]) {
        self.key_input = [false; NUM_KEYS];
        for k in keys_down {
            self.handle_key_down(*k);
        }
    }

    /// Return whether the key with the given hex code is down. Only the low
    /// nibble of `code` is looked at.
    pub fn get_key_state(&self, code: u8) -> bool {
        self.key_input[(code & 0xF) as usize]
    }

    /// Lowest-numbered key currently down.
    pub fn first_pressed(&self) -> Option<u8> {
        self.key_input.iter().position(|down| *down).map(|i| i as u8)
    }

    /// Called when the KeyOpGet Op finds no key down. The interpreter stays
    /// parked until [`Keyboard::unblock`] finds one.
    pub fn block(&mut self, register: u8) {
        self.wait = KeyWait::AwaitingKey { register };
    }

    /// If we're parked on FX0A and a key is down, leave the waiting state and
    /// return the register to fill and the key's code.
    pub fn unblock(&mut self) -> Option<(u8, u8)> {
        match self.wait {
            KeyWait::AwaitingKey { register } => {
                let code = self.first_pressed()?;
                self.wait = KeyWait::Idle;
                Some((register, code))
            }
            KeyWait::Idle => None,
        }
    }

    pub fn is_blocking(&self) -> bool {
        self.wait != KeyWait::Idle
    }

    pub fn wait_state(&self) -> KeyWait {
        self.wait
    }
}

impl Default for Keyboard {
    fn default() -> Self {
        Self::new()
    }
}
