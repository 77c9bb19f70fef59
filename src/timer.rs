/// Delay and sound countdowns, each decremented once per 60 Hz tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Timers {
    pub delay: u8,
    pub sound: u8,
}

impl Timers {
    /// Decrements both counters, flooring at zero.
    pub fn tick(&mut self) {
        self.delay = self.delay.saturating_sub(1);
        self.sound = self.sound.saturating_sub(1);
    }

    pub fn sound_active(&self) -> bool {
        self.sound > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timers_start_at_zero() {
        let timers = Timers::default();
        assert_eq!(timers.delay, 0);
        assert!(!timers.sound_active());
    }

    #[test]
    fn test_tick_floors_at_zero() {
        let mut timers = Timers { delay: 2, sound: 0 };
        timers.tick();
        timers.tick();
        timers.tick();
        assert_eq!(timers, Timers::default());
    }

    #[test]
    fn test_counters_are_independent() {
        let mut timers = Timers { delay: 10, sound: 1 };
        assert!(timers.sound_active());
        timers.tick();
        assert_eq!(timers.delay, 9);
        assert!(!timers.sound_active());
    }

    #[test]
    fn test_decay_matches_tick_count() {
        for (start, ticks) in [(0u8, 5usize), (5, 5), (200, 30), (3, 255)] {
            let mut timers = Timers { delay: start, sound: start };
            for _ in 0..ticks {
                timers.tick();
            }
            let expected = (start as usize).saturating_sub(ticks) as u8;
            assert_eq!(timers.delay, expected);
            assert_eq!(timers.sound, expected);
        }
    }
}
