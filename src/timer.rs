use std::time::{Duration, Instant};

pub const TIMER_DEC_PER_SECOND: u64 = 60;

#[derive(Debug, Clone, Copy, Default)]
pub struct Timer {
    pub count: u8,
}

impl Timer {
    pub fn set(&mut self, value: u8) {
        self.count = value;
    }

    /// Count down once, stopping at zero. Returns whether it was running.
    pub fn tick(&mut self) -> bool {
        if self.count == 0 {
            return false;
        }
        self.count -= 1;
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Timers {
    pub delay: Timer,
    pub sound: Timer,
}

impl Timers {
    pub fn tick(&mut self) {
        self.delay.tick();
        self.sound.tick();
    }
}

/// Wall clock for the host loop: how many 60Hz periods have passed since
/// the last poll. Instruction execution never goes through this.
#[derive(Debug)]
pub struct TickClock {
    last_updated: Instant,
    period: Duration,
}

impl TickClock {
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    pub fn starting_at(start: Instant) -> Self {
        Self {
            last_updated: start,
            period: Duration::from_nanos(1_000_000_000 / TIMER_DEC_PER_SECOND),
        }
    }

    pub fn poll(&mut self) -> u32 {
        self.poll_at(Instant::now())
    }

    pub fn poll_at(&mut self, now: Instant) -> u32 {
        let elapsed = now.saturating_duration_since(self.last_updated);
        let ticks = (elapsed.as_nanos() / self.period.as_nanos()) as u32;
        // keep the remainder so the rate doesn't drift
        self.last_updated += self.period * ticks;
        ticks
    }
}

impl Default for TickClock {
    fn default() -> Self {
        Self::new()
    }
}
