use std::path::PathBuf;

use clap::Parser;

use crate::{
    constants,
    emulator::{
        Interpreter,
        MachineConfig,
        Quirks,
    },
};

#[derive(Parser, Debug, Clone)]
#[command(version, about = "CHIP-8 virtual machine")]
pub struct Args {
    /// Path to the CHIP-8 ROM
    pub rom: PathBuf,

    /// Instructions executed per second
    #[arg(long, default_value_t = constants::INSTRUCTIONS_PER_SECOND)]
    pub ips: u32,

    /// Size of one CHIP-8 pixel on screen
    #[arg(long, default_value_t = 10)]
    pub scale: i32,

    /// Quirk preset
    #[arg(long, value_enum, default_value_t = Interpreter::CosmacVip)]
    pub interpreter: Interpreter,

    /// Wrap sprites around the screen edges instead of clipping them
    #[arg(long)]
    pub wrap_sprites: bool,

    /// Halt on the first fault instead of skipping the instruction
    #[arg(long)]
    pub strict: bool,

    /// Seed for the random number instruction
    #[arg(long)]
    pub seed: Option<u64>,

    /// Start paused in single-step mode
    #[arg(long)]
    pub debug: bool,

    /// Where F12 screenshots are written
    #[arg(long, default_value = "screenshots")]
    pub screenshot_dir: PathBuf,
}

impl Args {
    pub fn machine_config(&self) -> MachineConfig {
        let mut quirks = Quirks::from(self.interpreter);
        quirks.wrap_sprites |= self.wrap_sprites;

        MachineConfig { quirks, strict: self.strict, seed: self.seed }
    }
}
