//! A CHIP-8 virtual machine.
//!
//! [`Machine`] owns memory, registers, timers, the framebuffer and the key
//! matrix. Hosts call [`Machine::step`] at the CPU clock rate and
//! [`Machine::tick`] at 60 Hz; [`shared::Runner`] does both from two threads.
pub mod cli;
pub mod constants;
pub mod display;
pub mod emulator;
pub mod host;
pub mod instruction;
pub mod keypad;
pub mod mem;
pub mod process;
pub mod shared;
pub mod timer;

pub use display::{
    Display,
    FrameBuffer,
};
pub use emulator::{
    CpuSnapshot,
    Diagnostics,
    Interpreter,
    Machine,
    MachineConfig,
    MachineError,
    Quirks,
    StepOutcome,
};
pub use host::run;
pub use instruction::{
    decode,
    Instruction,
    InstructionData,
};
pub use keypad::KeyState;
pub use mem::{
    LoadError,
    Rom,
    RomError,
};
pub use process::Fault;
