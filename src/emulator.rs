use clap::ValueEnum;
use log::{
    debug,
    trace,
    warn,
};
use rand::{
    rngs::StdRng,
    SeedableRng,
};
use thiserror::Error;

use crate::{
    constants,
    display::{
        Display,
        FrameBuffer,
    },
    instruction::{
        decode,
        Instruction,
    },
    keypad::{
        KeyPad,
        KeyState,
    },
    mem::{
        font_table,
        AddressStack,
        FONT,
        LoadError,
        Ram,
        RamError,
        Register,
        Rom,
    },
    process::{
        self,
        Fault,
    },
    timer::Timers,
};

/// Historical interpreters whose behaviour the quirk presets follow.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Interpreter {
    #[default]
    CosmacVip,
    Chip48,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quirks {
    /// `8xy6`/`8xyE` shift Vy into Vx; otherwise Vx shifts in place.
    pub shift_reads_vy: bool,
    /// Sprites wrap around the screen edges instead of being clipped.
    pub wrap_sprites: bool,
}

impl Default for Quirks {
    fn default() -> Self {
        Interpreter::default().into()
    }
}

impl From<Interpreter> for Quirks {
    fn from(value: Interpreter) -> Self {
        match value {
            Interpreter::CosmacVip => Quirks { shift_reads_vy: true, wrap_sprites: false },
            Interpreter::Chip48 => Quirks { shift_reads_vy: false, wrap_sprites: false },
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MachineConfig {
    pub quirks: Quirks,
    /// Any fault halts the machine instead of being recorded and skipped.
    pub strict: bool,
    /// Seed for `Cxnn`; entropy when unset.
    pub seed: Option<u64>,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachineError {
    #[error("no rom loaded")]
    NotLoaded,

    #[error("machine halted after {0}")]
    Halted(Fault),

    #[error(transparent)]
    Fault(#[from] Fault),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostics {
    pub instructions: u64,
    pub unknown_opcodes: u64,
    pub stack_overflows: u64,
    pub stack_underflows: u64,
    pub memory_faults: u64,
}

impl Diagnostics {
    fn record(&mut self, fault: &Fault) {
        match fault {
            Fault::MemoryFault { .. } => self.memory_faults += 1,
            Fault::StackOverflow => self.stack_overflows += 1,
            Fault::StackUnderflow => self.stack_underflows += 1,
            Fault::UnknownOpcode(_) => self.unknown_opcodes += 1,
        }
    }
}

/// What a single `step()` did, for the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepOutcome {
    pub instruction: Option<Instruction>,
    pub display_changed: bool,
    pub sound_active: bool,
    /// Set when the instruction was rejected; the machine carried on.
    pub fault: Option<Fault>,
}

/// Copy of the CPU registers, detached from the live machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuSnapshot {
    pub pc: u16,
    pub index: u16,
    pub v: [u8; constants::REGISTER_COUNT],
    pub stack: Vec<u16>,
    pub delay_timer: u8,
    pub sound_timer: u8,
    pub waiting_for_key: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramCounter(u16);

impl ProgramCounter {
    pub fn new(address: u16) -> Self {
        Self(address)
    }

    pub fn address(&self) -> u16 {
        self.0
    }

    pub fn inner(&self) -> usize {
        self.0 as usize
    }

    /// Moves to the next instruction.
    ///
    /// Running the last word of memory leaves PC one past the end, which
    /// [`ProgramCounter::ensure_in_memory`] reports; anything further is refused.
    pub fn increment(&mut self) -> Result<(), RamError> {
        let next = self.inner() + constants::INSTRUCTION_SIZE as usize;
        if next > constants::TOTAL_RAM {
            return Err(RamError::InvalidAddress(next));
        }
        self.0 = next as u16;
        Ok(())
    }

    pub fn ensure_in_memory(&self) -> Result<(), RamError> {
        if self.inner() > constants::MAX_ADDRESS {
            return Err(RamError::InvalidAddress(self.inner()));
        }
        Ok(())
    }

    pub fn decrement(&mut self) -> Result<(), RamError> {
        let previous = self
            .0
            .checked_sub(constants::INSTRUCTION_SIZE)
            .ok_or(RamError::InvalidAddress(self.inner()))?;
        self.0 = previous;
        Ok(())
    }

    pub fn jump<T: Into<usize>>(&mut self, address: T) -> Result<(), RamError> {
        let address = address.into();
        if address > constants::MAX_ADDRESS {
            return Err(RamError::InvalidAddress(address));
        }
        self.0 = address as u16;
        Ok(())
    }
}

impl Default for ProgramCounter {
    fn default() -> Self {
        Self(constants::MEMORY_OFFSET as u16)
    }
}

#[derive(Clone)]
struct Image {
    rom: Rom,
    font: [u8; constants::FONT_SIZE],
}

/// The whole virtual machine: memory, CPU, timers, display and keypad.
///
/// `step()` runs one instruction and `tick()` runs one 60 Hz timer
/// decrement; the host decides how often each is called.
pub struct Machine {
    config: MachineConfig,
    image: Option<Image>,
    halted: Option<Fault>,
    memory: Ram,
    pc: ProgramCounter,
    stack: AddressStack,
    register: Register,
    index_register: u16,
    timers: Timers,
    keypad: KeyPad,
    display: Display,
    rng: StdRng,
    waiting_for_key: bool,
    diagnostics: Diagnostics,
}

impl Machine {
    pub fn new(config: MachineConfig) -> Self {
        Self {
            config,
            image: None,
            halted: None,
            memory: Ram::default(),
            pc: ProgramCounter::default(),
            stack: AddressStack::default(),
            register: Register::new(),
            index_register: 0,
            timers: Timers::default(),
            keypad: KeyPad::default(),
            display: Display::default(),
            rng: Self::seeded_rng(config.seed),
            waiting_for_key: false,
            diagnostics: Diagnostics::default(),
        }
    }

    /// Copies `rom` to 0x200 and the font (or the built-in one) to 0x050,
    /// then resets every other piece of state.
    ///
    /// A failed load leaves the machine unloaded.
    pub fn load(&mut self, rom: &[u8], font: Option<&[u8]>) -> Result<(), LoadError> {
        let image = Rom::from_bytes(rom).and_then(|rom| font_table(font).map(|font| Image { rom, font }));

        match image {
            Ok(image) => {
                self.install(image);
                Ok(())
            }
            Err(err) => {
                warn!("rejected rom: {err}");
                self.image = None;
                Err(err)
            }
        }
    }

    pub fn load_rom(&mut self, rom: Rom) {
        self.install(Image { rom, font: FONT });
    }

    /// Restarts the loaded program from scratch.
    pub fn reset(&mut self) -> Result<(), MachineError> {
        let image = self.image.clone().ok_or(MachineError::NotLoaded)?;
        self.install(image);
        Ok(())
    }

    fn install(&mut self, image: Image) {
        debug!("loading {} byte rom", image.rom.len());
        self.memory = Ram::load(&image.rom, &image.font);
        self.pc = ProgramCounter::default();
        self.stack = AddressStack::default();
        self.register = Register::new();
        self.index_register = 0;
        self.timers = Timers::default();
        self.keypad = KeyPad::default();
        self.display = Display::default();
        self.rng = Self::seeded_rng(self.config.seed);
        self.waiting_for_key = false;
        self.diagnostics = Diagnostics::default();
        self.halted = None;
        self.image = Some(image);
    }

    fn seeded_rng(seed: Option<u64>) -> StdRng {
        seed.map(StdRng::seed_from_u64).unwrap_or_else(StdRng::from_entropy)
    }

    fn ensure_runnable(&self) -> Result<(), MachineError> {
        if self.image.is_none() {
            return Err(MachineError::NotLoaded);
        }
        if let Some(fault) = self.halted {
            return Err(MachineError::Halted(fault));
        }
        Ok(())
    }

    /// Fetches, decodes and executes one instruction.
    pub fn step(&mut self) -> Result<StepOutcome, MachineError> {
        self.ensure_runnable()?;

        let (instruction, result) = match self.fetch() {
            Ok(instruction) => (Some(instruction), self.execute(instruction)),
            Err(fault) => (None, Err(fault)),
        };

        self.diagnostics.instructions += 1;

        let mut outcome = StepOutcome {
            instruction,
            display_changed: false,
            sound_active: self.timers.sound_active(),
            fault: None,
        };

        let fault = match result {
            Ok(display_changed) => {
                outcome.display_changed = display_changed;
                self.pc.ensure_in_memory().err().map(Fault::from)
            }
            Err(fault) => Some(fault),
        };

        if let Some(fault) = fault {
            self.diagnostics.record(&fault);
            warn!("{fault} near {:#05X}", self.pc.address());

            if self.config.strict {
                self.halted = Some(fault);
                return Err(MachineError::Fault(fault));
            }
            outcome.fault = Some(fault);
        }

        Ok(outcome)
    }

    fn fetch(&mut self) -> Result<Instruction, Fault> {
        let word = self.memory.op_code(self.pc.inner())?;
        let address = self.pc.address();
        self.pc.increment()?;

        let instruction = decode(word).instruction();
        trace!("{address:03X}: {word:04X} {instruction}");

        Ok(instruction)
    }

    /// Applies `instruction`; `Ok(true)` when the display changed.
    fn execute(&mut self, instruction: Instruction) -> Result<bool, Fault> {
        use Instruction::*;

        let quirks = self.config.quirks;
        let register = &mut self.register;
        let pc = &mut self.pc;

        match instruction {
            Clear => {
                process::op_00E0(&mut self.display);
                return Ok(true);
            }
            Return => process::op_00EE(pc, &mut self.stack)?,
            Jump(nnn) => process::op_1NNN(pc, nnn)?,
            Call(nnn) => process::op_2NNN(&mut self.stack, pc, nnn)?,
            SkipEqImm { x, nn } => process::op_3XNN(register, x, nn, pc)?,
            SkipNeImm { x, nn } => process::op_4XNN(register, x, nn, pc)?,
            SkipEqReg { x, y } => process::op_5XY0(register, x, y, pc)?,
            SkipNeReg { x, y } => process::op_9XY0(register, x, y, pc)?,
            LoadImm { x, nn } => process::op_6XNN(register, x, nn),
            AddImm { x, nn } => process::op_7XNN(register, x, nn),
            Move { x, y } => process::op_8XY0(register, x, y),
            Or { x, y } => process::op_8XY1(register, x, y),
            And { x, y } => process::op_8XY2(register, x, y),
            Xor { x, y } => process::op_8XY3(register, x, y),
            AddReg { x, y } => process::op_8XY4(register, x, y),
            Sub { x, y } => process::op_8XY5(register, x, y),
            ShiftRight { x, y } => process::op_8XY6(&quirks, register, x, y),
            SubNeg { x, y } => process::op_8XY7(register, x, y),
            ShiftLeft { x, y } => process::op_8XYE(&quirks, register, x, y),
            LoadIndex(nnn) => process::op_ANNN(&mut self.index_register, nnn),
            JumpOffset(nnn) => process::op_BNNN(register, pc, nnn)?,
            Random { x, nn } => process::op_CXNN(register, &mut self.rng, x, nn),
            Draw { x, y, n } => {
                process::op_DXYN(
                    &quirks,
                    &self.memory,
                    register,
                    &mut self.display,
                    self.index_register,
                    x,
                    y,
                    n,
                )?;
                return Ok(true);
            }
            SkipKeyPressed { x } => process::op_EX9E(register, &self.keypad, pc, x)?,
            SkipKeyNotPressed { x } => process::op_EXA1(register, &self.keypad, pc, x)?,
            LoadDelay { x } => process::op_FX07(register, x, &self.timers),
            WaitKey { x } => {
                self.waiting_for_key = process::op_FX0A(register, pc, &self.keypad, x)?;
            }
            SetDelay { x } => process::op_FX15(register, x, &mut self.timers),
            SetSound { x } => process::op_FX18(register, x, &mut self.timers),
            AddIndex { x } => process::op_FX1E(register, x, &mut self.index_register),
            LoadFont { x } => process::op_FX29(register, &mut self.index_register, x),
            StoreBcd { x } => process::op_FX33(register, &mut self.memory, x, self.index_register)?,
            StoreRegisters { x } => process::op_FX55(register, &mut self.memory, self.index_register, x)?,
            LoadRegisters { x } => process::op_FX65(register, &self.memory, self.index_register, x)?,
            Unknown(word) => return Err(Fault::UnknownOpcode(word)),
        }

        Ok(false)
    }

    /// One 60 Hz timer decrement. Returns whether the tone should sound.
    pub fn tick(&mut self) -> Result<bool, MachineError> {
        self.ensure_runnable()?;
        self.timers.tick();
        Ok(self.timers.sound_active())
    }

    /// Replaces the whole key matrix; call before each cycle.
    pub fn set_keys(&mut self, keys: KeyState) {
        self.keypad.set_state(keys);
    }

    pub fn keypad_mut(&mut self) -> &mut KeyPad {
        &mut self.keypad
    }

    pub fn display(&self) -> &Display {
        &self.display
    }

    pub fn frame(&self) -> FrameBuffer {
        self.display.snapshot()
    }

    pub fn sound_active(&self) -> bool {
        self.timers.sound_active()
    }

    pub fn timers(&self) -> Timers {
        self.timers
    }

    pub fn memory(&self) -> &[u8] {
        self.memory.as_slice()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    pub fn is_loaded(&self) -> bool {
        self.image.is_some()
    }

    pub fn halted(&self) -> Option<Fault> {
        self.halted
    }

    /// Decodes the word at PC without executing it.
    pub fn peek_instruction(&self) -> Option<Instruction> {
        self.memory
            .op_code(self.pc.inner())
            .ok()
            .map(|word| decode(word).instruction())
    }

    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            pc: self.pc.address(),
            index: self.index_register,
            v: self.register.as_array(),
            stack: self.stack.as_slice().to_vec(),
            delay_timer: self.timers.delay,
            sound_timer: self.timers.sound,
            waiting_for_key: self.waiting_for_key,
        }
    }
}

impl Default for Machine {
    fn default() -> Self {
        Self::new(MachineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(program: &[u8]) -> Machine {
        let mut machine = Machine::new(MachineConfig { seed: Some(1), ..Default::default() });
        machine.load(program, None).unwrap();
        machine
    }

    #[test]
    fn test_step_before_load() {
        let mut machine = Machine::default();
        assert_eq!(machine.step(), Err(MachineError::NotLoaded));
        assert_eq!(machine.tick(), Err(MachineError::NotLoaded));
    }

    #[test]
    fn test_failed_load_unloads() {
        let mut machine = machine(&[0x00, 0xE0]);
        assert_eq!(machine.load(&[], None), Err(LoadError::Empty));
        assert!(!machine.is_loaded());
        assert_eq!(machine.step(), Err(MachineError::NotLoaded));
    }

    #[test]
    fn test_load_rejects_bad_font() {
        let mut machine = Machine::default();
        assert_eq!(machine.load(&[0x00, 0xE0], Some(&[1, 2, 3][..])), Err(LoadError::InvalidFont(3)));
    }

    #[test]
    fn test_load_places_custom_font() {
        let font = [0xAA; constants::FONT_SIZE];
        let mut machine = Machine::default();
        machine.load(&[0x00, 0xE0], Some(&font[..])).unwrap();
        assert_eq!(machine.memory()[constants::FONT_OFFSET], 0xAA);
        assert_eq!(machine.memory()[constants::FONT_OFFSET + constants::FONT_SIZE - 1], 0xAA);
    }

    #[test]
    fn test_clear_reports_display_change() {
        let mut machine = machine(&[0x00, 0xE0, 0x60, 0x01]);
        let outcome = machine.step().unwrap();
        assert!(outcome.display_changed);
        assert_eq!(outcome.instruction, Some(Instruction::Clear));
        assert!(!machine.step().unwrap().display_changed);
    }

    #[test]
    fn test_unknown_opcode_is_counted_and_skipped() {
        let mut machine = machine(&[0x01, 0x23, 0x60, 0x07]);
        let outcome = machine.step().unwrap();
        assert_eq!(outcome.fault, Some(Fault::UnknownOpcode(0x0123)));
        assert_eq!(machine.diagnostics().unknown_opcodes, 1);
        machine.step().unwrap();
        assert_eq!(machine.snapshot().v[0], 0x07);
    }

    #[test]
    fn test_strict_mode_halts() {
        let mut machine = Machine::new(MachineConfig { strict: true, ..Default::default() });
        machine.load(&[0x00, 0xEE], None).unwrap();
        assert_eq!(machine.step(), Err(MachineError::Fault(Fault::StackUnderflow)));
        assert_eq!(machine.step(), Err(MachineError::Halted(Fault::StackUnderflow)));
        assert_eq!(machine.halted(), Some(Fault::StackUnderflow));

        machine.reset().unwrap();
        assert_eq!(machine.halted(), None);
        assert_eq!(machine.snapshot().pc, 0x200);
    }

    #[test]
    fn test_stack_overflow_rejects_call() {
        // 0x200: CALL 0x200, forever
        let mut machine = machine(&[0x22, 0x00]);
        for _ in 0..constants::STACK_DEPTH {
            assert_eq!(machine.step().unwrap().fault, None);
        }
        let outcome = machine.step().unwrap();
        assert_eq!(outcome.fault, Some(Fault::StackOverflow));
        assert_eq!(machine.snapshot().stack.len(), constants::STACK_DEPTH);
        assert_eq!(machine.snapshot().pc, 0x202);
        assert_eq!(machine.diagnostics().stack_overflows, 1);
    }

    fn full_rom(first: [u8; 2], last: [u8; 2]) -> Vec<u8> {
        let mut rom = vec![0; constants::AVAILABLE_RAM];
        rom[..2].copy_from_slice(&first);
        rom[constants::AVAILABLE_RAM - 2..].copy_from_slice(&last);
        rom
    }

    #[test]
    fn test_last_word_of_full_rom_runs() {
        // JP 0xFFE, then at 0xFFE: JP 0x200
        let mut machine = machine(&full_rom([0x1F, 0xFE], [0x12, 0x00]));
        machine.step().unwrap();
        assert_eq!(machine.snapshot().pc, 0xFFE);

        let outcome = machine.step().unwrap();
        assert_eq!(outcome.instruction, Some(Instruction::Jump(0x200)));
        assert_eq!(outcome.fault, None);
        assert_eq!(machine.snapshot().pc, 0x200);
        assert_eq!(machine.diagnostics().memory_faults, 0);
    }

    #[test]
    fn test_running_off_the_end_faults() {
        // JP 0xFFE, then at 0xFFE: LD V0, 0x01
        let mut machine = machine(&full_rom([0x1F, 0xFE], [0x60, 0x01]));
        machine.step().unwrap();

        let outcome = machine.step().unwrap();
        assert_eq!(outcome.instruction, Some(Instruction::LoadImm { x: 0x0, nn: 0x01 }));
        assert_eq!(outcome.fault, Some(Fault::MemoryFault { address: 0x1000 }));
        assert_eq!(machine.snapshot().v[0], 0x01);

        let outcome = machine.step().unwrap();
        assert_eq!(outcome.instruction, None);
        assert_eq!(outcome.fault, Some(Fault::MemoryFault { address: 0x1000 }));
        assert_eq!(machine.snapshot().pc, 0x1000);
        assert_eq!(machine.diagnostics().memory_faults, 2);
    }

    #[test]
    fn test_seeded_random_is_reproducible() {
        let program = [0xC0, 0xFF, 0xC1, 0xFF];
        let mut first = machine(&program);
        let mut second = machine(&program);
        for _ in 0..2 {
            first.step().unwrap();
            second.step().unwrap();
        }
        assert_eq!(first.snapshot().v, second.snapshot().v);
    }

    #[test]
    fn test_tick_reports_sound() {
        // LD V0, 2; LD ST, V0
        let mut machine = machine(&[0x60, 0x02, 0xF0, 0x18]);
        machine.step().unwrap();
        assert!(machine.step().unwrap().sound_active);
        assert_eq!(machine.tick(), Ok(true));
        assert_eq!(machine.tick(), Ok(false));
        assert_eq!(machine.tick(), Ok(false));
    }

    #[test]
    fn test_peek_and_snapshot_do_not_mutate() {
        let mut machine = machine(&[0x23, 0x00]);
        machine.step().unwrap();
        let snapshot = machine.snapshot();
        assert_eq!(snapshot.stack, vec![0x202]);
        assert_eq!(machine.peek_instruction(), Some(Instruction::Unknown(0x0000)));
        assert_eq!(machine.snapshot(), snapshot);
    }

    #[test]
    fn test_quirk_presets() {
        assert!(Quirks::default().shift_reads_vy);
        assert!(!Quirks::from(Interpreter::Chip48).shift_reads_vy);
        assert!(!Quirks::default().wrap_sprites);
    }
}
