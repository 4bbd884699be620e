//! Per-session turn timer.
//!
//! The timer is plain data owned by the session worker; the worker's select
//! loop sleeps until [`TurnTimer::deadline`]. Each arming records the turn
//! serial it was armed for, so an expiry that lost the race against a
//! client's own `end_unit_action` is rejected by the engine as stale.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub(crate) enum TurnTimer {
    #[default]
    Idle,
    Running {
        deadline: Instant,
        serial: u64,
    },
    /// Every participant is absent; the countdown keeps its remaining time.
    Paused {
        remaining: Duration,
        serial: u64,
    },
}

impl TurnTimer {
    /// Starts a fresh countdown for turn `serial`.
    pub fn arm(&mut self, serial: u64, duration: Duration, paused: bool) {
        *self = if paused {
            Self::Paused {
                remaining: duration,
                serial,
            }
        } else {
            Self::Running {
                deadline: Instant::now() + duration,
                serial,
            }
        };
    }

    pub fn stop(&mut self) {
        *self = Self::Idle;
    }

    pub fn pause(&mut self) {
        if let Self::Running { deadline, serial } = *self {
            *self = Self::Paused {
                remaining: deadline.saturating_duration_since(Instant::now()),
                serial,
            };
        }
    }

    pub fn resume(&mut self) {
        if let Self::Paused { remaining, serial } = *self {
            *self = Self::Running {
                deadline: Instant::now() + remaining,
                serial,
            };
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Self::Running { deadline, .. } => Some(*deadline),
            _ => None,
        }
    }

    pub fn serial(&self) -> Option<u64> {
        match self {
            Self::Idle => None,
            Self::Running { serial, .. } | Self::Paused { serial, .. } => Some(*serial),
        }
    }

    pub fn remaining(&self) -> Option<Duration> {
        match self {
            Self::Idle => None,
            Self::Running { deadline, .. } => {
                Some(deadline.saturating_duration_since(Instant::now()))
            }
            Self::Paused { remaining, .. } => Some(*remaining),
        }
    }

    pub fn remaining_ms(&self) -> Option<u64> {
        self.remaining()
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, Self::Paused { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn pause_keeps_the_remaining_time() {
        let mut timer = TurnTimer::default();
        timer.arm(3, Duration::from_secs(30), false);

        tokio::time::advance(Duration::from_secs(12)).await;
        timer.pause();
        assert_eq!(timer.remaining(), Some(Duration::from_secs(18)));
        assert_eq!(timer.deadline(), None);

        tokio::time::advance(Duration::from_secs(100)).await;
        timer.resume();
        assert_eq!(timer.remaining(), Some(Duration::from_secs(18)));
        assert_eq!(timer.serial(), Some(3));
    }

    #[test]
    fn armed_paused_never_has_a_deadline() {
        let mut timer = TurnTimer::default();
        timer.arm(1, Duration::from_secs(5), true);
        assert!(timer.is_paused());
        assert_eq!(timer.deadline(), None);
        timer.stop();
        assert_eq!(timer.remaining_ms(), None);
    }
}
