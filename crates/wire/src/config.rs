use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::frame::ReserveLayout;
use crate::tick::ticks_for;

pub const DEFAULT_TICK_RATE: u32 = 60;
pub const DEFAULT_MAX_FRAGMENTS: u32 = 4096;

/// Simulated link impairment for outgoing frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkConditionerConfig {
    pub enabled: bool,
    pub latency_ms: u32,
    /// Chance in percent (0-100) that a frame is lost. Lost reliable frames
    /// are delivered late instead of dropped.
    pub loss_percent: f32,
    /// Chance in percent (0-100) that an unreliable frame swaps places with
    /// the one queued before it.
    pub reorder_percent: f32,
    pub seed: Option<u64>,
}

impl LinkConditionerConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms as u64)
    }

    /// Extra delay charged to a reliable frame that was "lost" and resent.
    pub fn resend_penalty(&self) -> Duration {
        self.latency() * 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub tick_rate: u32,
    /// Bytes reserved after the tick field at the start of every frame.
    pub extra_reserve: usize,
    pub min_disconnect_ticks: u32,
    pub disconnect_grace_ms: u64,
    pub max_fragments: u32,
    pub link_conditioner: Option<LinkConditionerConfig>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: DEFAULT_TICK_RATE,
            extra_reserve: 0,
            min_disconnect_ticks: 2,
            disconnect_grace_ms: 100,
            max_fragments: DEFAULT_MAX_FRAGMENTS,
            link_conditioner: None,
        }
    }
}

impl SessionConfig {
    pub fn reserve_layout(&self) -> ReserveLayout {
        ReserveLayout::new(self.extra_reserve)
    }

    /// Ticks a disconnecting remote keeps draining before the hard stop.
    pub fn disconnect_drain_ticks(&self) -> u32 {
        let grace = ticks_for(
            Duration::from_millis(self.disconnect_grace_ms),
            self.tick_rate,
        );
        self.min_disconnect_ticks.max(grace)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_window_takes_larger_bound() {
        let config = SessionConfig::default();
        assert_eq!(config.disconnect_drain_ticks(), 6);

        let slow = SessionConfig {
            tick_rate: 10,
            ..Default::default()
        };
        assert_eq!(slow.disconnect_drain_ticks(), 2);
    }

    #[test]
    fn resend_penalty_is_round_trip() {
        let sim = LinkConditionerConfig {
            enabled: true,
            latency_ms: 40,
            ..Default::default()
        };
        assert_eq!(sim.resend_penalty(), Duration::from_millis(80));
    }
}
