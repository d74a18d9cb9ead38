//! Reconstructs inter-operation timing from the trace's cumulative
//! `delta_us` stamps (§4.4).

use std::thread;
use std::time::{Duration, Instant};

pub struct DelayGate {
    enabled: bool,
    prev_cumulative_us: u64,
}

impl DelayGate {
    pub fn new(enabled: bool) -> DelayGate {
        DelayGate {
            enabled,
            prev_cumulative_us: 0,
        }
    }

    /// Sleeps for the positive increment since the last call, then
    /// advances the cumulative marker. Returns the wall time actually
    /// spent sleeping, to be charged onto `total_delay_time`. A no-op
    /// (and zero duration) when disabled.
    pub fn advance(&mut self, delta_us: u64) -> Duration {
        if !self.enabled {
            self.prev_cumulative_us = delta_us;
            return Duration::default();
        }
        let increment = delta_us.saturating_sub(self.prev_cumulative_us);
        self.prev_cumulative_us = delta_us;
        if increment == 0 {
            return Duration::default();
        }
        let start = Instant::now();
        thread::sleep(Duration::from_micros(increment));
        start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_gate_never_sleeps() {
        let mut gate = DelayGate::new(false);
        let elapsed = gate.advance(1_000_000);
        assert!(elapsed.is_zero());
    }

    #[test]
    fn non_monotonic_delta_clamps_to_zero() {
        let mut gate = DelayGate::new(true);
        let _ = gate.advance(4000);
        let elapsed = gate.advance(1000);
        // prev_cumulative_us (4000) > delta_us (1000): no sleep.
        assert!(elapsed.is_zero());
    }

    #[test]
    fn monotonic_deltas_sleep_the_increment() {
        let mut gate = DelayGate::new(true);
        let a = gate.advance(0);
        assert!(a.is_zero());
        let b = gate.advance(1000);
        assert!(b >= Duration::from_micros(1000));
    }
}
