use std::{
    f32::consts::TAU,
    fs,
    path::{
        Path,
        PathBuf,
    },
};

use anyhow::{
    Context,
    Result,
};
use log::{
    error,
    info,
};
use macroquad::{
    audio::{
        load_sound_from_bytes,
        play_sound,
        stop_sound,
        PlaySoundParams,
        Sound,
    },
    color::{
        self,
        Color,
    },
    input::{
        is_key_down,
        is_key_pressed,
        KeyCode,
    },
    shapes::draw_rectangle,
    text::draw_text,
    time::get_frame_time,
    window::{
        clear_background,
        next_frame,
        Conf,
    },
};

use crate::{
    cli::Args,
    constants,
    display::FrameBuffer,
    emulator::Machine,
    keypad::KeyState,
    mem::Rom,
};

const PIXEL_COLOR: Color = Color { r: 0.0, g: 1.0, b: 0.0, a: 1.0 };
const SAMPLE_RATE: u32 = 44_000;
const BEEP_HZ: u32 = 440;
const BEEP_PERIODS: u32 = 100;
// Cap on catch-up work after a stalled frame.
const MAX_STEPS_PER_FRAME: f32 = 1_000.0;

#[rustfmt::skip]
const KEYMAP: [(KeyCode, u8); constants::KEY_COUNT] = [
    (KeyCode::Key1, 0x1), (KeyCode::Key2, 0x2), (KeyCode::Key3, 0x3), (KeyCode::Key4, 0xC),
    (KeyCode::Q, 0x4),    (KeyCode::W, 0x5),    (KeyCode::E, 0x6),    (KeyCode::R, 0xD),
    (KeyCode::A, 0x7),    (KeyCode::S, 0x8),    (KeyCode::D, 0x9),    (KeyCode::F, 0xE),
    (KeyCode::Z, 0xA),    (KeyCode::X, 0x0),    (KeyCode::C, 0xB),    (KeyCode::V, 0xF),
];

pub fn window_conf(args: &Args) -> Conf {
    Conf {
        window_title: "chip8vm".to_owned(),
        window_width: constants::DISPLAY_WIDTH as i32 * args.scale,
        window_height: constants::DISPLAY_HEIGHT as i32 * args.scale,
        window_resizable: false,
        ..Default::default()
    }
}

fn read_keys() -> KeyState {
    let mut keys = [false; constants::KEY_COUNT];
    for (code, key) in KEYMAP {
        keys[key as usize] = is_key_down(code);
    }
    keys
}

/// A looping 440 Hz sine tone as a 16-bit mono WAV file.
pub fn beep_wav() -> Vec<u8> {
    let samples = SAMPLE_RATE / BEEP_HZ * BEEP_PERIODS;
    let data_len = samples * 2;

    let mut wav = Vec::with_capacity(44 + data_len as usize);
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(36 + data_len).to_le_bytes());
    wav.extend_from_slice(b"WAVEfmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&1u16.to_le_bytes());
    wav.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
    wav.extend_from_slice(&(SAMPLE_RATE * 2).to_le_bytes());
    wav.extend_from_slice(&2u16.to_le_bytes());
    wav.extend_from_slice(&16u16.to_le_bytes());
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());

    for i in 0..samples {
        let phase = TAU * (i * BEEP_HZ) as f32 / SAMPLE_RATE as f32;
        let sample = (phase.sin() * i16::MAX as f32 * 0.3) as i16;
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

fn render(frame: &FrameBuffer, scale: f32) {
    clear_background(color::BLACK);
    for (y, row) in frame.iter().enumerate() {
        for (x, lit) in row.iter().enumerate() {
            if *lit {
                draw_rectangle(x as f32 * scale, y as f32 * scale, scale, scale, PIXEL_COLOR);
            }
        }
    }
}

fn render_debug(machine: &Machine) {
    let snapshot = machine.snapshot();
    let next = machine
        .peek_instruction()
        .map(|instruction| instruction.to_string())
        .unwrap_or_default();

    draw_text(&format!("PAUSED  PC {:03X}  I {:03X}  {next}", snapshot.pc, snapshot.index), 4.0, 16.0, 18.0, color::YELLOW);
    draw_text(&format!("V {:02X?}", snapshot.v), 4.0, 32.0, 14.0, color::YELLOW);
}

fn save_screenshot(machine: &Machine, dir: &Path, scale: u32, count: usize) -> Result<PathBuf> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let path = dir.join(format!("frame-{count:04}.png"));
    machine.display().to_image(scale).save(&path)?;
    Ok(path)
}

struct Beeper {
    sound: Sound,
    playing: bool,
}

impl Beeper {
    fn update(&mut self, active: bool) {
        if active == self.playing {
            return;
        }
        if active {
            play_sound(&self.sound, PlaySoundParams { looped: true, volume: 0.5 });
        } else {
            stop_sound(&self.sound);
        }
        self.playing = active;
    }
}

/// Runs the desktop host until Escape is pressed.
pub async fn run(args: Args) -> Result<()> {
    let rom = Rom::load(&args.rom).with_context(|| format!("loading {}", args.rom.display()))?;
    info!("loaded {} ({} bytes)", args.rom.display(), rom.len());

    let mut machine = Machine::new(args.machine_config());
    machine.load_rom(rom);

    let mut beeper = Beeper { sound: load_sound_from_bytes(&beep_wav()).await?, playing: false };

    let scale = args.scale.max(1) as f32;
    let mut frame = machine.frame();
    let mut paused = args.debug;
    let mut halted = false;
    let mut screenshots = 0;
    let mut cpu_budget = 0.0f32;
    let mut timer_budget = 0.0f32;

    loop {
        if is_key_pressed(KeyCode::Escape) {
            break;
        }
        if is_key_pressed(KeyCode::P) {
            paused = !paused;
            info!("{}", if paused { "paused" } else { "resumed" });
        }
        if is_key_pressed(KeyCode::F12) {
            match save_screenshot(&machine, &args.screenshot_dir, scale as u32, screenshots) {
                Ok(path) => info!("saved {}", path.display()),
                Err(err) => error!("screenshot failed: {err:#}"),
            }
            screenshots += 1;
        }

        machine.set_keys(read_keys());

        let dt = get_frame_time();
        let mut steps = 0u32;
        if paused {
            if is_key_pressed(KeyCode::Space) || is_key_pressed(KeyCode::N) {
                steps = 1;
            }
        } else if !halted {
            cpu_budget = (cpu_budget + dt * args.ips as f32).min(MAX_STEPS_PER_FRAME);
            timer_budget += dt * constants::TIMER_HZ as f32;
            steps = cpu_budget as u32;
            cpu_budget -= steps as f32;
        }

        for _ in 0..steps {
            match machine.step() {
                Ok(outcome) => {
                    if outcome.display_changed {
                        frame = machine.frame();
                    }
                }
                Err(err) => {
                    error!("{err}");
                    halted = true;
                    break;
                }
            }
        }

        while timer_budget >= 1.0 && !halted {
            timer_budget -= 1.0;
            if let Err(err) = machine.tick() {
                error!("{err}");
                halted = true;
            }
        }
        beeper.update(!paused && !halted && machine.sound_active());

        render(&frame, scale);
        if paused {
            render_debug(&machine);
        }

        next_frame().await
    }

    let diagnostics = machine.diagnostics();
    info!(
        "executed {} instructions ({} unknown, {} stack overflows, {} stack underflows, {} memory faults)",
        diagnostics.instructions,
        diagnostics.unknown_opcodes,
        diagnostics.stack_overflows,
        diagnostics.stack_underflows,
        diagnostics.memory_faults
    );

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_beep_wav_header() {
        let wav = beep_wav();
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..16], b"WAVEfmt ");
        assert_eq!(&wav[36..40], b"data");
        let data_len = u32::from_le_bytes([wav[40], wav[41], wav[42], wav[43]]) as usize;
        assert_eq!(wav.len(), 44 + data_len);
        assert_eq!(u32::from_le_bytes([wav[4], wav[5], wav[6], wav[7]]) as usize, wav.len() - 8);
    }

    #[test]
    fn test_beep_wav_loops_cleanly() {
        let wav = beep_wav();
        assert_eq!(i16::from_le_bytes([wav[44], wav[45]]), 0);
    }

    #[test]
    fn test_keymap_covers_every_key() {
        let mut seen = [false; constants::KEY_COUNT];
        for (_, key) in KEYMAP {
            seen[key as usize] = true;
        }
        assert!(seen.iter().all(|seen| *seen));
    }
}
