// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Periodic timer driven by the spin loop.

use super::Node;
use std::fmt;
use std::time::{Duration, Instant};

/// Timer callback. Receives the node so it can publish or re-arm.
pub type TimerCallback = Box<dyn FnMut(&mut Node) + Send>;

pub(crate) struct TimerState {
    pub(crate) callback: TimerCallback,
    pub(crate) period: Duration,
    pub(crate) last_fired_at: Instant,
}

impl TimerState {
    pub(crate) fn new(period: Duration, callback: TimerCallback) -> Self {
        Self {
            callback,
            period,
            last_fired_at: Instant::now(),
        }
    }

    /// Time left before the next firing; zero when due.
    pub(crate) fn remaining(&self, now: Instant) -> Duration {
        self.period
            .saturating_sub(now.saturating_duration_since(self.last_fired_at))
    }
}

impl fmt::Debug for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerState")
            .field("period", &self.period)
            .field("last_fired_at", &self.last_fired_at)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remaining() {
        let timer = TimerState::new(Duration::from_millis(100), Box::new(|_| {}));
        let start = timer.last_fired_at;
        assert_eq!(timer.remaining(start), Duration::from_millis(100));
        assert_eq!(
            timer.remaining(start + Duration::from_millis(30)),
            Duration::from_millis(70)
        );
        assert_eq!(
            timer.remaining(start + Duration::from_millis(250)),
            Duration::ZERO
        );
    }
}
