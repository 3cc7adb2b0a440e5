//! Weather cycle: clear skies with occasional rain.

use crate::hash::Xorshift32;
use serde::{Deserialize, Serialize};

/// Shortest clear spell, in ticks.
const MIN_CLEAR: u32 = 12_000;
const MAX_CLEAR: u32 = 36_000;
/// Rain passes quicker than clear weather.
const MIN_RAIN: u32 = 2_400;
const MAX_RAIN: u32 = 12_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Clear,
    Raining,
}

/// Current weather plus the countdown to the next flip.
#[derive(Debug, Clone)]
pub struct WeatherState {
    pub current: Weather,
    ticks_until_change: u32,
}

impl WeatherState {
    pub fn new() -> Self {
        Self {
            current: Weather::Clear,
            ticks_until_change: MIN_CLEAR,
        }
    }

    /// Advance one tick; returns the new weather when it flips.
    pub fn tick(&mut self, rng: &mut Xorshift32) -> Option<Weather> {
        if self.ticks_until_change > 0 {
            self.ticks_until_change -= 1;
            return None;
        }
        self.current = match self.current {
            Weather::Clear => {
                self.ticks_until_change = MIN_RAIN + rng.next_below(MAX_RAIN - MIN_RAIN);
                Weather::Raining
            }
            Weather::Raining => {
                self.ticks_until_change = MIN_CLEAR + rng.next_below(MAX_CLEAR - MIN_CLEAR);
                Weather::Clear
            }
        };
        Some(self.current)
    }
}

impl Default for WeatherState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weather_alternates_between_clear_and_rain() {
        let mut rng = Xorshift32::new(9);
        let mut weather = WeatherState::new();
        let mut flips = Vec::new();
        for _ in 0..200_000 {
            if let Some(next) = weather.tick(&mut rng) {
                flips.push(next);
            }
        }
        assert!(flips.len() >= 2, "expected at least one full cycle");
        for pair in flips.windows(2) {
            assert_ne!(pair[0], pair[1], "weather must alternate");
        }
        assert_eq!(flips[0], Weather::Raining);
    }

    #[test]
    fn no_flip_before_the_countdown_expires() {
        let mut rng = Xorshift32::new(9);
        let mut weather = WeatherState::new();
        for _ in 0..1_000 {
            assert!(weather.tick(&mut rng).is_none());
        }
        assert_eq!(weather.current, Weather::Clear);
    }
}
