//! World clock: tick counter and day/night cycle.

use serde::{Deserialize, Serialize};

/// Ticks per in-game day (20 minutes at 20 TPS).
pub const TICKS_PER_DAY: u64 = 24_000;

/// How often time packets go out, in world ticks. Clients advance their
/// own clocks between updates, so a coarse cadence is enough.
pub const TIME_BROADCAST_INTERVAL: u64 = 100;

/// Monotonic tick counter plus the wrapping day-time value clients show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldTime {
    /// Total ticks since the world was created.
    pub tick: u64,
    /// Position within the current day, `0..TICKS_PER_DAY`.
    pub day_time: u64,
}

impl WorldTime {
    pub fn new(day_time: u64) -> Self {
        Self {
            tick: 0,
            day_time: day_time % TICKS_PER_DAY,
        }
    }

    /// Advance one world tick. Returns true when a time broadcast is due.
    pub fn advance(&mut self) -> bool {
        self.tick += 1;
        self.day_time = (self.day_time + 1) % TICKS_PER_DAY;
        self.tick % TIME_BROADCAST_INTERVAL == 0
    }

    /// Daylight covers the first half of the cycle.
    pub fn is_day(&self) -> bool {
        self.day_time < TICKS_PER_DAY / 2
    }
}

impl Default for WorldTime {
    fn default() -> Self {
        // Start shortly after sunrise.
        Self::new(1_000)
    }
}
