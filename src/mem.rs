use std::{
    fs::File,
    io::{
        self,
        Read,
    },
    path::Path,
};

use thiserror::Error;

use crate::constants;

#[rustfmt::skip]
pub const FONT: [u8; constants::FONT_SIZE] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9

    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80  // F
];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamError {
    #[error("invalid address {0:#05X}")]
    InvalidAddress(usize),
}

/// The 4 KiB address space: font glyphs at `FONT_OFFSET`, program at `MEMORY_OFFSET`.
#[derive(Clone)]
pub struct Ram {
    memory: [u8; constants::TOTAL_RAM],
}

impl Ram {
    pub fn load(rom: &Rom, font: &[u8; constants::FONT_SIZE]) -> Self {
        let mut ram = Ram::from(rom);
        ram.memory[constants::FONT_OFFSET..constants::FONT_OFFSET + font.len()].copy_from_slice(font);

        ram
    }

    /// Reads the big-endian word at `address`, failing if either byte lies outside memory.
    pub fn op_code(&self, address: usize) -> Result<u16, RamError> {
        let high = self.get(address)? as u16;
        let low = self.get(address + 1)? as u16;
        Ok((high << 8) | low)
    }

    pub fn get<T: Into<usize>>(&self, index: T) -> Result<u8, RamError> {
        let idx = index.into();
        self.memory.get(idx).ok_or(RamError::InvalidAddress(idx)).copied()
    }

    pub fn get_mut<T: Into<usize>>(&mut self, index: T) -> Result<&mut u8, RamError> {
        let idx = index.into();
        self.memory.get_mut(idx).ok_or(RamError::InvalidAddress(idx))
    }

    /// `len` bytes starting at `start`, or the first out-of-range address.
    pub fn slice(&self, start: usize, len: usize) -> Result<&[u8], RamError> {
        let end = Self::checked_end(start, len)?;
        Ok(&self.memory[start..end])
    }

    pub fn slice_mut(&mut self, start: usize, len: usize) -> Result<&mut [u8], RamError> {
        let end = Self::checked_end(start, len)?;
        Ok(&mut self.memory[start..end])
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.memory
    }

    fn checked_end(start: usize, len: usize) -> Result<usize, RamError> {
        let end = start + len;
        if end > constants::TOTAL_RAM {
            return Err(RamError::InvalidAddress(start.max(constants::TOTAL_RAM)));
        }
        Ok(end)
    }
}

impl Default for Ram {
    fn default() -> Self {
        Ram { memory: [0; constants::TOTAL_RAM] }
    }
}

impl From<&Rom> for Ram {
    fn from(value: &Rom) -> Self {
        let mut ram = Ram::default();
        let length = std::cmp::min(constants::AVAILABLE_RAM, value.len());
        ram.memory[constants::MEMORY_OFFSET..constants::MEMORY_OFFSET + length]
            .copy_from_slice(&value.data()[..length]);

        ram
    }
}

/// General purpose registers V0-VF.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    registers: [u8; constants::REGISTER_COUNT],
}

impl Register {
    pub const VF: u8 = 0xF;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: u8) -> u8 {
        self.registers[(key & 0xF) as usize]
    }

    pub fn set(&mut self, key: u8, val: u8) {
        self.registers[(key & 0xF) as usize] = val;
    }

    pub fn get_mut(&mut self, key: u8) -> &mut u8 {
        &mut self.registers[(key & 0xF) as usize]
    }

    pub fn set_x_y(&mut self, x: u8, y: u8) {
        self.set(x, self.get(y));
    }

    pub fn cmp_registers(&self, x: u8, y: u8) -> bool {
        self.get(x) == self.get(y)
    }

    pub fn set_flag(&mut self, flag: bool) {
        self.set(Self::VF, flag as u8);
    }

    pub fn as_array(&self) -> [u8; constants::REGISTER_COUNT] {
        self.registers
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    #[error("call stack is full ({depth} entries)", depth = constants::STACK_DEPTH)]
    Overflow,

    #[error("call stack is empty")]
    Underflow,
}

/// Fixed-capacity return address stack.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AddressStack {
    slots: [u16; constants::STACK_DEPTH],
    len: usize,
}

impl AddressStack {
    pub fn push<T: Into<u16>>(&mut self, val: T) -> Result<(), StackError> {
        let slot = self.slots.get_mut(self.len).ok_or(StackError::Overflow)?;
        *slot = val.into();
        self.len += 1;
        Ok(())
    }

    pub fn pop<T: From<u16>>(&mut self) -> Result<T, StackError> {
        if self.len == 0 {
            return Err(StackError::Underflow);
        }
        self.len -= 1;
        Ok(T::from(self.slots[self.len]))
    }

    pub fn peek(&self) -> Option<u16> {
        self.as_slice().last().copied()
    }

    pub fn is_full(&self) -> bool {
        self.len == constants::STACK_DEPTH
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn len(&self) -> usize {
        self.len
    }

    /// Live entries, oldest first.
    pub fn as_slice(&self) -> &[u16] {
        &self.slots[..self.len]
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    #[error("rom is empty")]
    Empty,

    #[error("out of memory {rom_size:?} > {ram_size:?}")]
    OutOfMemory { rom_size: usize, ram_size: usize },

    #[error("font table must be {size} bytes, got {0}", size = constants::FONT_SIZE)]
    InvalidFont(usize),
}

#[derive(Error, Debug)]
pub enum RomError {
    #[error("loading rom failed {0}")]
    IoError(#[from] io::Error),

    #[error(transparent)]
    Invalid(#[from] LoadError),
}

/// A program image that is known to fit above `MEMORY_OFFSET`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rom {
    data: Vec<u8>,
}

impl Rom {
    pub fn from_bytes(data: impl Into<Vec<u8>>) -> Result<Self, LoadError> {
        let data = data.into();

        if data.is_empty() {
            return Err(LoadError::Empty);
        }

        if data.len() > constants::AVAILABLE_RAM {
            return Err(LoadError::OutOfMemory {
                rom_size: data.len(),
                ram_size: constants::AVAILABLE_RAM,
            });
        }

        Ok(Self { data })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, RomError> {
        let mut file = File::open(path)?;
        let mut data = vec![];

        file.read_to_end(&mut data)?;

        Ok(Self::from_bytes(data)?)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Validates an optional replacement font, falling back to the built-in one.
pub fn font_table(font: Option<&[u8]>) -> Result<[u8; constants::FONT_SIZE], LoadError> {
    match font {
        None => Ok(FONT),
        Some(bytes) => bytes.try_into().map_err(|_| LoadError::InvalidFont(bytes.len())),
    }
}
