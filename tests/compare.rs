mod compare {
    use chip8vm::{
        constants,
        display::{
            PIXEL_OFF,
            PIXEL_ON,
        },
        mem::FONT,
        Machine,
        MachineConfig,
    };
    use image::RgbImage;
    use image_compare::{
        Algorithm,
        Similarity,
    };

    pub const PIXEL_SIZE: u32 = 10;

    /// Draws glyphs 0-3 side by side, five pixels apart.
    #[rustfmt::skip]
    pub const DIGITS: [u16; 10] = [
        0x6000, 0x6100, 0x6200, // V0 digit, V1 x, V2 y
        0xF029, 0xD125,         // LD F, V0; DRW V1, V2, 5
        0x7001, 0x7105,         // next digit, next column
        0x3004, 0x1206,         // loop until V0 == 4
        0x1212,
    ];

    pub fn run_program(program: &[u16], steps: usize) -> Machine {
        let bytes: Vec<u8> = program.iter().flat_map(|word| word.to_be_bytes()).collect();
        let mut machine = Machine::new(MachineConfig::default());
        machine.load(&bytes, None).unwrap();
        for _ in 0..steps {
            machine.step().unwrap();
        }
        machine
    }

    pub fn expected_digits(glyphs: &[usize]) -> RgbImage {
        let width = constants::DISPLAY_WIDTH as u32 * PIXEL_SIZE;
        let height = constants::DISPLAY_HEIGHT as u32 * PIXEL_SIZE;

        RgbImage::from_fn(width, height, |x, y| {
            let (column, row) = ((x / PIXEL_SIZE) as usize, (y / PIXEL_SIZE) as usize);
            let slot = column / constants::FONT_GLYPH_SIZE;
            let bit = column % constants::FONT_GLYPH_SIZE;

            let lit = row < constants::FONT_GLYPH_SIZE
                && glyphs.get(slot).is_some_and(|glyph| {
                    let byte = FONT[glyph * constants::FONT_GLYPH_SIZE + row];
                    (byte >> (7 - bit)) & 1 == 1
                });

            if lit {
                PIXEL_ON
            } else {
                PIXEL_OFF
            }
        })
    }

    pub fn compare_images(first: &RgbImage, second: &RgbImage) -> Similarity {
        image_compare::rgb_similarity_structure(&Algorithm::MSSIMSimple, first, second).unwrap()
    }
}

#[cfg(test)]
mod test {
    use crate::compare::{
        self,
        compare_images,
        expected_digits,
        run_program,
        DIGITS,
        PIXEL_SIZE,
    };

    const TOLERANCE: f64 = 0.0001;

    #[test]
    fn font_digits_match_reference() {
        let machine = run_program(&DIGITS, 40);
        assert_eq!(machine.snapshot().pc, 0x212);

        let generated = machine.display().to_image(PIXEL_SIZE);
        let baseline = expected_digits(&[0, 1, 2, 3]);
        let comparison_result = compare_images(&baseline, &generated);

        assert!(
            1.0 - comparison_result.score < TOLERANCE,
            "Font digits comparison score too low: {}",
            comparison_result.score
        );
    }

    #[test]
    fn wrong_digits_do_not_match() {
        let machine = run_program(&DIGITS, 40);
        let generated = machine.display().to_image(PIXEL_SIZE);
        let baseline = expected_digits(&[0, 1, 2, 8]);
        let comparison_result = compare_images(&baseline, &generated);

        assert!(
            1.0 - comparison_result.score > TOLERANCE,
            "Mismatched digits compared equal: {}",
            comparison_result.score
        );
    }

    #[test]
    fn screenshot_round_trips_through_png() {
        let machine = run_program(&compare::DIGITS, 40);
        let dir = std::env::temp_dir().join(format!("chip8vm-compare-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("digits.png");

        machine.display().to_image(PIXEL_SIZE).save(&path).unwrap();
        let reloaded = image::open(&path).unwrap().into_rgb8();
        let comparison_result = compare_images(&expected_digits(&[0, 1, 2, 3]), &reloaded);

        assert!(1.0 - comparison_result.score < TOLERANCE);
        let _ = std::fs::remove_dir_all(dir);
    }
}
