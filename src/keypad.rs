use crate::constants::KEY_COUNT;

pub type KeyState = [bool; KEY_COUNT];

/// Hex keypad state, overwritten by the host before each cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct KeyPad {
    state: KeyState,
}

impl KeyPad {
    pub fn set_state(&mut self, state: KeyState) {
        self.state = state;
    }

    pub fn press(&mut self, key: u8) {
        if let Some(pressed) = self.state.get_mut(key as usize) {
            *pressed = true;
        }
    }

    pub fn release(&mut self, key: u8) {
        if let Some(pressed) = self.state.get_mut(key as usize) {
            *pressed = false;
        }
    }

    /// Keys beyond 0xF are never pressed.
    pub fn is_key_pressed(&self, key: u8) -> bool {
        self.state.get(key as usize).copied().unwrap_or(false)
    }

    /// Lowest pressed key index, if any.
    pub fn first_pressed(&self) -> Option<u8> {
        self.state.iter().position(|pressed| *pressed).map(|key| key as u8)
    }

    pub fn state(&self) -> KeyState {
        self.state
    }
}
