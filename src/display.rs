use std::fmt;

use image::{
    Rgb,
    RgbImage,
};

use crate::constants::{
    DISPLAY_HEIGHT,
    DISPLAY_WIDTH,
};

pub type FrameBuffer = [[bool; DISPLAY_WIDTH]; DISPLAY_HEIGHT];

pub const PIXEL_ON: Rgb<u8> = Rgb([0, 255, 0]);
pub const PIXEL_OFF: Rgb<u8> = Rgb([0, 0, 0]);

/// Monochrome 64x32 framebuffer with XOR sprite drawing.
#[derive(Clone, PartialEq, Eq)]
pub struct Display {
    cells: FrameBuffer,
}

impl Display {
    pub fn clear(&mut self) {
        self.cells = [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT];
    }

    pub fn get(&self, x: usize, y: usize) -> bool {
        self.cells
            .get(y)
            .and_then(|row| row.get(x))
            .copied()
            .unwrap_or(false)
    }

    /// XORs `sprite` (one byte per row, MSB leftmost) onto the grid with its
    /// origin at `(x mod 64, y mod 32)`.
    ///
    /// Bits that land past the right or bottom edge are dropped, or wrapped
    /// to the opposite edge when `wrap` is set. Returns whether any lit cell
    /// was switched off.
    pub fn draw_sprite(&mut self, x: u8, y: u8, sprite: &[u8], wrap: bool) -> bool {
        let start_x = x as usize % DISPLAY_WIDTH;
        let start_y = y as usize % DISPLAY_HEIGHT;
        let mut collision = false;

        for (row, byte) in sprite.iter().enumerate() {
            let mut screen_y = start_y + row;
            if screen_y >= DISPLAY_HEIGHT {
                if !wrap {
                    break;
                }
                screen_y %= DISPLAY_HEIGHT;
            }

            for column in 0..8 {
                if (byte >> (7 - column)) & 1 == 0 {
                    continue;
                }

                let mut screen_x = start_x + column;
                if screen_x >= DISPLAY_WIDTH {
                    if !wrap {
                        break;
                    }
                    screen_x %= DISPLAY_WIDTH;
                }

                let cell = &mut self.cells[screen_y][screen_x];
                collision |= *cell;
                *cell ^= true;
            }
        }

        collision
    }

    pub fn snapshot(&self) -> FrameBuffer {
        self.cells
    }

    pub fn lit(&self) -> usize {
        self.cells.iter().flatten().filter(|cell| **cell).count()
    }

    /// Renders the grid as an RGB image, each cell `scale` pixels wide.
    pub fn to_image(&self, scale: u32) -> RgbImage {
        let scale = scale.max(1);
        RgbImage::from_fn(DISPLAY_WIDTH as u32 * scale, DISPLAY_HEIGHT as u32 * scale, |x, y| {
            if self.get((x / scale) as usize, (y / scale) as usize) {
                PIXEL_ON
            } else {
                PIXEL_OFF
            }
        })
    }
}

impl Default for Display {
    fn default() -> Self {
        Self { cells: [[false; DISPLAY_WIDTH]; DISPLAY_HEIGHT] }
    }
}

impl fmt::Debug for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Display").field("lit", &self.lit()).finish()
    }
}

impl fmt::Display for Display {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.iter() {
            for cell in row.iter() {
                f.write_str(if *cell { "#" } else { "." })?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
