use minifb::Key;

/// What the VM needs from the hex keypad. Read at the moment an input
/// instruction executes, nothing is queued.
pub trait Keypad {
    fn is_pressed(&self, key: u8) -> bool;
    /// Lowest numbered key currently held
    fn pressed_key(&self) -> Option<u8>;
}

#[derive(Debug, Clone, Default)]
pub struct KeypadState {
    keys: [bool; 16],
}

impl KeypadState {
    pub fn new() -> Self {
        Self { keys: [false; 16] }
    }

    pub fn reset(&mut self) {
        self.keys = [false; 16];
    }

    pub fn press(&mut self, key: u8) {
        if let Some(k) = self.keys.get_mut(key as usize) {
            *k = true;
        }
    }

    pub fn release(&mut self, key: u8) {
        if let Some(k) = self.keys.get_mut(key as usize) {
            *k = false;
        }
    }

    /// Replace the state with the window keys currently down
    pub fn update_from_window(&mut self, keys: &[Key]) {
        self.reset();
        for key in keys {
            if let Some(n) = key_to_num(*key) {
                self.press(n);
            }
        }
    }
}

impl Keypad for KeypadState {
    fn is_pressed(&self, key: u8) -> bool {
        self.keys.get(key as usize).copied().unwrap_or(false)
    }

    fn pressed_key(&self) -> Option<u8> {
        self.keys.iter().position(|&k| k).map(|k| k as u8)
    }
}

// 1 2 3 C        1 2 3 4
// 4 5 6 D   <-   Q W E R
// 7 8 9 E        A S D F
// A 0 B F        Z X C V
pub fn key_to_num(key: Key) -> Option<u8> {
    match key {
        Key::Key1 => Some(0x1),
        Key::Key2 => Some(0x2),
        Key::Key3 => Some(0x3),
        Key::Key4 => Some(0xC),
        Key::Q => Some(0x4),
        Key::W => Some(0x5),
        Key::E => Some(0x6),
        Key::R => Some(0xD),
        Key::A => Some(0x7),
        Key::S => Some(0x8),
        Key::D => Some(0x9),
        Key::F => Some(0xE),
        Key::Z => Some(0xA),
        Key::X => Some(0x0),
        Key::C => Some(0xB),
        Key::V => Some(0xF),
        _ => None,
    }
}
