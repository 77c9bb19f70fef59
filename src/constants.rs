pub const TOTAL_RAM: usize = 0x1000;
pub const MAX_ADDRESS: usize = TOTAL_RAM - 1;
pub const MEMORY_OFFSET: usize = 0x200;
pub const AVAILABLE_RAM: usize = TOTAL_RAM - MEMORY_OFFSET;
pub const FONT_OFFSET: usize = 0x050;
pub const FONT_GLYPH_SIZE: usize = 5;
pub const FONT_SIZE: usize = FONT_GLYPH_SIZE * 16;
pub const STACK_DEPTH: usize = 16;
pub const REGISTER_COUNT: usize = 16;
pub const KEY_COUNT: usize = 16;
pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;
pub const INSTRUCTION_SIZE: u16 = 2;
pub const INSTRUCTIONS_PER_SECOND: u32 = 700;
pub const TIMER_HZ: u32 = 60;
