// Launcher configuration
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SwitchboardError};

/// Tuning knobs for a [`Launcher`](crate::Launcher).
///
/// `exit()` polls unit liveness at most `exit_poll_budget` times, sleeping
/// `exit_poll_interval_ms` between polls, so its worst case is roughly
/// `budget * interval`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Maximum liveness polls performed by `exit()`.
    pub exit_poll_budget: u32,
    /// Pause between two liveness polls.
    pub exit_poll_interval_ms: u64,
    /// How long a forced removal waits for a cooperative stop before aborting.
    pub remove_grace_ms: u64,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            exit_poll_budget: 5000,
            exit_poll_interval_ms: 1,
            remove_grace_ms: 100,
        }
    }
}

impl LauncherConfig {
    /// Defaults overridden by `SWITCHBOARD_*` environment variables.
    ///
    /// Unparseable values are ignored.
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            exit_poll_budget: env_parse("SWITCHBOARD_EXIT_POLL_BUDGET")
                .unwrap_or(default.exit_poll_budget),
            exit_poll_interval_ms: env_parse("SWITCHBOARD_EXIT_POLL_INTERVAL_MS")
                .unwrap_or(default.exit_poll_interval_ms),
            remove_grace_ms: env_parse("SWITCHBOARD_REMOVE_GRACE_MS")
                .unwrap_or(default.remove_grace_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.exit_poll_interval_ms == 0 {
            return Err(SwitchboardError::Config(
                "exit_poll_interval_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    pub fn exit_poll_interval(&self) -> Duration {
        Duration::from_millis(self.exit_poll_interval_ms)
    }

    pub fn remove_grace(&self) -> Duration {
        Duration::from_millis(self.remove_grace_ms)
    }
}

fn env_parse<V: std::str::FromStr>(key: &str) -> Option<V> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.is_empty())
        .and_then(|v| v.parse::<V>().ok())
}
