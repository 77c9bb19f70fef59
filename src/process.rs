#![allow(non_snake_case)]
use rand::Rng;
use thiserror::Error;

use crate::{
    constants,
    display::Display,
    emulator::{
        ProgramCounter,
        Quirks,
    },
    keypad::KeyPad,
    mem::{
        AddressStack,
        Ram,
        RamError,
        Register,
        StackError,
    },
    timer::Timers,
};

/// A recoverable execution fault. The faulting instruction has no effect.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    #[error("memory fault at {address:#05X}")]
    MemoryFault { address: usize },

    #[error("stack overflow")]
    StackOverflow,

    #[error("stack underflow")]
    StackUnderflow,

    #[error("unknown opcode {0:#06X}")]
    UnknownOpcode(u16),
}

impl From<RamError> for Fault {
    fn from(value: RamError) -> Self {
        match value {
            RamError::InvalidAddress(address) => Fault::MemoryFault { address },
        }
    }
}

impl From<StackError> for Fault {
    fn from(value: StackError) -> Self {
        match value {
            StackError::Overflow => Fault::StackOverflow,
            StackError::Underflow => Fault::StackUnderflow,
        }
    }
}

pub fn op_00E0(display: &mut Display) {
    display.clear();
}

pub fn op_00EE(pc: &mut ProgramCounter, stack: &mut AddressStack) -> Result<(), Fault> {
    let address = stack.peek().ok_or(StackError::Underflow)?;
    pc.jump(address)?;
    stack.pop::<u16>()?;
    Ok(())
}

pub fn op_1NNN(pc: &mut ProgramCounter, nnn: u16) -> Result<(), Fault> {
    pc.jump(nnn)?;
    Ok(())
}

pub fn op_2NNN(stack: &mut AddressStack, pc: &mut ProgramCounter, nnn: u16) -> Result<(), Fault> {
    stack.push(pc.address())?;
    pc.jump(nnn)?;
    Ok(())
}

pub fn op_3XNN(register: &Register, x: u8, nn: u8, pc: &mut ProgramCounter) -> Result<(), Fault> {
    if register.get(x) == nn {
        pc.increment()?;
    }
    Ok(())
}

pub fn op_4XNN(register: &Register, x: u8, nn: u8, pc: &mut ProgramCounter) -> Result<(), Fault> {
    if register.get(x) != nn {
        pc.increment()?;
    }
    Ok(())
}

pub fn op_5XY0(register: &Register, x: u8, y: u8, pc: &mut ProgramCounter) -> Result<(), Fault> {
    if register.cmp_registers(x, y) {
        pc.increment()?;
    }
    Ok(())
}

pub fn op_6XNN(register: &mut Register, x: u8, nn: u8) {
    register.set(x, nn);
}

pub fn op_7XNN(register: &mut Register, x: u8, nn: u8) {
    register.set(x, register.get(x).wrapping_add(nn));
}

pub fn op_8XY0(register: &mut Register, x: u8, y: u8) {
    register.set_x_y(x, y);
}

pub fn op_8XY1(register: &mut Register, x: u8, y: u8) {
    let vy = register.get(y);
    *register.get_mut(x) |= vy;
}

pub fn op_8XY2(register: &mut Register, x: u8, y: u8) {
    let vy = register.get(y);
    *register.get_mut(x) &= vy;
}

pub fn op_8XY3(register: &mut Register, x: u8, y: u8) {
    let vy = register.get(y);
    *register.get_mut(x) ^= vy;
}

pub fn op_8XY4(register: &mut Register, x: u8, y: u8) {
    let (val, overflow) = register.get(x).overflowing_add(register.get(y));
    register.set(x, val);
    register.set_flag(overflow);
}

pub fn op_8XY5(register: &mut Register, x: u8, y: u8) {
    let (vx, vy) = (register.get(x), register.get(y));
    register.set(x, vx.wrapping_sub(vy));
    register.set_flag(vx > vy);
}

pub fn op_8XY6(quirks: &Quirks, register: &mut Register, x: u8, y: u8) {
    let source = if quirks.shift_reads_vy { register.get(y) } else { register.get(x) };
    register.set(x, source >> 1);
    register.set_flag(source & 1 == 1);
}

pub fn op_8XY7(register: &mut Register, x: u8, y: u8) {
    let (vx, vy) = (register.get(x), register.get(y));
    register.set(x, vy.wrapping_sub(vx));
    register.set_flag(vy > vx);
}

pub fn op_8XYE(quirks: &Quirks, register: &mut Register, x: u8, y: u8) {
    let source = if quirks.shift_reads_vy { register.get(y) } else { register.get(x) };
    register.set(x, source << 1);
    register.set_flag(source >> 7 == 1);
}

pub fn op_9XY0(register: &Register, x: u8, y: u8, pc: &mut ProgramCounter) -> Result<(), Fault> {
    if !register.cmp_registers(x, y) {
        pc.increment()?;
    }
    Ok(())
}

pub fn op_ANNN(index_register: &mut u16, nnn: u16) {
    *index_register = nnn & constants::MAX_ADDRESS as u16;
}

pub fn op_BNNN(register: &Register, pc: &mut ProgramCounter, nnn: u16) -> Result<(), Fault> {
    pc.jump(nnn + register.get(0x0) as u16)?;
    Ok(())
}

pub fn op_CXNN<R: Rng>(register: &mut Register, rng: &mut R, x: u8, nn: u8) {
    register.set(x, rng.gen::<u8>() & nn);
}

/// Returns `Ok(())` once the sprite is on screen; VF holds the collision flag.
#[allow(clippy::too_many_arguments)]
pub fn op_DXYN(
    quirks: &Quirks,
    memory: &Ram,
    register: &mut Register,
    display: &mut Display,
    index_register: u16,
    x: u8,
    y: u8,
    n: u8,
) -> Result<(), Fault> {
    let sprite = memory.slice(index_register as usize, n as usize)?;
    let collision = display.draw_sprite(register.get(x), register.get(y), sprite, quirks.wrap_sprites);
    register.set_flag(collision);
    Ok(())
}

pub fn op_EX9E(register: &Register, keypad: &KeyPad, pc: &mut ProgramCounter, x: u8) -> Result<(), Fault> {
    if keypad.is_key_pressed(register.get(x)) {
        pc.increment()?;
    }
    Ok(())
}

pub fn op_EXA1(register: &Register, keypad: &KeyPad, pc: &mut ProgramCounter, x: u8) -> Result<(), Fault> {
    if !keypad.is_key_pressed(register.get(x)) {
        pc.increment()?;
    }
    Ok(())
}

pub fn op_FX07(register: &mut Register, x: u8, timers: &Timers) {
    register.set(x, timers.delay);
}

/// Polls for a key: rewinds PC onto this instruction until one is down.
/// Returns whether the machine is still waiting.
pub fn op_FX0A(register: &mut Register, pc: &mut ProgramCounter, keypad: &KeyPad, x: u8) -> Result<bool, Fault> {
    match keypad.first_pressed() {
        Some(key) => {
            register.set(x, key);
            Ok(false)
        }
        None => {
            pc.decrement()?;
            Ok(true)
        }
    }
}

pub fn op_FX15(register: &Register, x: u8, timers: &mut Timers) {
    timers.delay = register.get(x);
}

pub fn op_FX18(register: &Register, x: u8, timers: &mut Timers) {
    timers.sound = register.get(x);
}

pub fn op_FX1E(register: &Register, x: u8, index_register: &mut u16) {
    *index_register = index_register.wrapping_add(register.get(x) as u16);
}

pub fn op_FX29(register: &Register, index_register: &mut u16, x: u8) {
    let glyph = (register.get(x) & 0xF) as usize;
    *index_register = (constants::FONT_OFFSET + constants::FONT_GLYPH_SIZE * glyph) as u16;
}

pub fn op_FX33(register: &Register, memory: &mut Ram, x: u8, index_register: u16) -> Result<(), Fault> {
    let val = register.get(x);
    let digits = memory.slice_mut(index_register as usize, 3)?;
    digits.copy_from_slice(&[val / 100, (val / 10) % 10, val % 10]);
    Ok(())
}

pub fn op_FX55(register: &Register, memory: &mut Ram, index_register: u16, x: u8) -> Result<(), Fault> {
    let count = x as usize + 1;
    let destination = memory.slice_mut(index_register as usize, count)?;
    destination.copy_from_slice(&register.as_array()[..count]);
    Ok(())
}

pub fn op_FX65(register: &mut Register, memory: &Ram, index_register: u16, x: u8) -> Result<(), Fault> {
    let source = memory.slice(index_register as usize, x as usize + 1)?;
    for (i, byte) in source.iter().enumerate() {
        register.set(i as u8, *byte);
    }
    Ok(())
}
