//! Runtime configuration structures and loaders.
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use battle_core::BattleRules;
use chrono::TimeDelta;

use crate::events::EventContext;

/// Configuration shared by the runtime, its session workers and background tasks.
#[derive(Clone, Debug)]
pub struct RuntimeConfig {
    pub rules: BattleRules,
    /// Time a participant has to finish their turn.
    pub turn_duration: Duration,
    /// Interval between persistence cycles.
    pub persist_interval: Duration,
    /// A cycle taking longer than this is logged as slow; it is never aborted.
    pub persist_soft_budget: Duration,
    /// Battle events kept per session for paging.
    pub event_ring_capacity: usize,
    /// Ring events included in a `battle_state` snapshot by default.
    pub state_event_count: usize,
    /// Bound of each session worker's command queue.
    pub command_buffer: usize,
    pub data_dir: PathBuf,
    pub event_cleanup_interval: Duration,
    pub retention: RetentionPolicy,
    /// Fixed dice seed; each session derives its own stream from it.
    pub dice_seed: Option<u64>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rules: BattleRules::default(),
            turn_duration: Duration::from_secs(30),
            persist_interval: Duration::from_secs(30),
            persist_soft_budget: Duration::from_millis(2000),
            event_ring_capacity: 500,
            state_event_count: 50,
            command_buffer: 64,
            data_dir: default_data_dir(),
            event_cleanup_interval: Duration::from_secs(3600),
            retention: RetentionPolicy::default(),
            dice_seed: None,
        }
    }
}

impl RuntimeConfig {
    /// Construct configuration from process environment variables.
    ///
    /// Environment variables:
    /// - `BATTLE_TURN_SECONDS` - Turn timer duration (default: 30)
    /// - `BATTLE_PERSIST_INTERVAL_SECS` - Persistence cycle interval (default: 30)
    /// - `BATTLE_PERSIST_SOFT_BUDGET_MS` - Slow-cycle warning threshold (default: 2000)
    /// - `BATTLE_EVENT_RING_CAPACITY` - Battle events kept per session (default: 500)
    /// - `BATTLE_STATE_EVENT_COUNT` - Events in a state snapshot (default: 50)
    /// - `BATTLE_COMMAND_BUFFER` - Session command queue size (default: 64)
    /// - `BATTLE_DATA_DIR` - Storage root (default: platform-specific)
    /// - `BATTLE_EVENT_CLEANUP_INTERVAL_SECS` - Event log purge interval (default: 3600)
    /// - `BATTLE_RETENTION_SYSTEM_DAYS` / `_ACCOUNT_DAYS` / `_MATCH_DAYS` (default: 30 / 90 / 14)
    /// - `BATTLE_DICE_SEED` - Fixed dice seed for reproducible runs (default: random)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(secs) = read_env::<u64>("BATTLE_TURN_SECONDS") {
            config.turn_duration = Duration::from_secs(secs.max(1));
        }
        if let Some(secs) = read_env::<u64>("BATTLE_PERSIST_INTERVAL_SECS") {
            config.persist_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(ms) = read_env::<u64>("BATTLE_PERSIST_SOFT_BUDGET_MS") {
            config.persist_soft_budget = Duration::from_millis(ms);
        }
        if let Some(capacity) = read_env::<usize>("BATTLE_EVENT_RING_CAPACITY") {
            config.event_ring_capacity = capacity.max(1);
        }
        if let Some(count) = read_env::<usize>("BATTLE_STATE_EVENT_COUNT") {
            config.state_event_count = count;
        }
        if let Some(capacity) = read_env::<usize>("BATTLE_COMMAND_BUFFER") {
            config.command_buffer = capacity.max(1);
        }
        if let Ok(dir) = env::var("BATTLE_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = read_env::<u64>("BATTLE_EVENT_CLEANUP_INTERVAL_SECS") {
            config.event_cleanup_interval = Duration::from_secs(secs.max(1));
        }
        if let Some(days) = read_env::<i64>("BATTLE_RETENTION_SYSTEM_DAYS") {
            config.retention.system_days = days;
        }
        if let Some(days) = read_env::<i64>("BATTLE_RETENTION_ACCOUNT_DAYS") {
            config.retention.account_days = days;
        }
        if let Some(days) = read_env::<i64>("BATTLE_RETENTION_MATCH_DAYS") {
            config.retention.match_days = days;
        }
        config.dice_seed = read_env::<u64>("BATTLE_DICE_SEED");

        config
    }

    pub fn with_turn_duration(mut self, duration: Duration) -> Self {
        self.turn_duration = duration;
        self
    }

    pub fn with_persist_interval(mut self, interval: Duration) -> Self {
        self.persist_interval = interval;
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_dice_seed(mut self, seed: u64) -> Self {
        self.dice_seed = Some(seed);
        self
    }
}

/// How long durable events are kept, per context.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetentionPolicy {
    pub system_days: i64,
    pub account_days: i64,
    pub match_days: i64,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            system_days: 30,
            account_days: 90,
            match_days: 14,
        }
    }
}

impl RetentionPolicy {
    /// Retention window of `context`; battle events are never stored.
    pub fn window(&self, context: EventContext) -> Option<TimeDelta> {
        let days = match context {
            EventContext::Battle => return None,
            EventContext::System => self.system_days,
            EventContext::Account => self.account_days,
            EventContext::Match => self.match_days,
        };
        TimeDelta::try_days(days.max(0))
    }
}

/// Platform data directory, e.g. `~/.local/share/battle` on Linux.
pub fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "battle")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("./battle-data"))
}

fn read_env<T>(key: &str) -> Option<T>
where
    T: std::str::FromStr,
{
    env::var(key).ok()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = RuntimeConfig::default();
        assert_eq!(config.turn_duration, Duration::from_secs(30));
        assert_eq!(config.persist_interval, Duration::from_secs(30));
        assert_eq!(config.event_ring_capacity, 500);
        assert_eq!(config.state_event_count, 50);
    }

    #[test]
    fn battle_events_have_no_retention_window() {
        let policy = RetentionPolicy::default();
        assert_eq!(policy.window(EventContext::Battle), None);
        assert_eq!(
            policy.window(EventContext::Match),
            TimeDelta::try_days(14)
        );
    }
}
