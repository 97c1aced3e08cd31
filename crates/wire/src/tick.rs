use std::time::Duration;

const TICK_WRAP_THRESHOLD: u32 = u32::MAX / 2;

/// Wrapping comparison for tick counters.
#[inline]
pub fn tick_greater_than(t1: u32, t2: u32) -> bool {
    ((t1 > t2) && (t1 - t2 <= TICK_WRAP_THRESHOLD))
        || ((t1 < t2) && (t2 - t1 > TICK_WRAP_THRESHOLD))
}

#[inline]
pub fn tick_reached(current: u32, threshold: u32) -> bool {
    current == threshold || tick_greater_than(current, threshold)
}

/// Number of whole ticks covering `duration`, rounded up.
pub fn ticks_for(duration: Duration, tick_rate: u32) -> u32 {
    let ticks = (duration.as_nanos() * tick_rate as u128).div_ceil(1_000_000_000);
    u32::try_from(ticks).unwrap_or(u32::MAX)
}

/// Longest wall-clock gap credited in one call; a stalled loop catches up
/// by at most this much.
const MAX_STEP: Duration = Duration::from_millis(250);

/// Turns wall-clock deltas into a whole number of fixed-length ticks.
pub struct FixedTimestep {
    tick_rate: u32,
    tick_duration: Duration,
    backlog: Duration,
}

impl FixedTimestep {
    pub fn new(tick_rate: u32) -> Self {
        let tick_rate = tick_rate.max(1);
        Self {
            tick_rate,
            tick_duration: Duration::from_secs(1) / tick_rate,
            backlog: Duration::ZERO,
        }
    }

    pub fn tick_rate(&self) -> u32 {
        self.tick_rate
    }

    pub fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    pub fn advance(&mut self, elapsed: Duration) {
        self.backlog += elapsed.min(MAX_STEP);
    }

    pub fn pending_ticks(&self) -> u32 {
        (self.backlog.as_nanos() / self.tick_duration.as_nanos()) as u32
    }

    pub fn consume_tick(&mut self) -> bool {
        match self.backlog.checked_sub(self.tick_duration) {
            Some(rest) => {
                self.backlog = rest;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.backlog = Duration::ZERO;
    }
}
