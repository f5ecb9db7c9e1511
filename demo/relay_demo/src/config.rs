use std::fs;
use std::path::Path;
use std::time::Duration;

use switchboard_core::LauncherConfig;

/// High-level configuration for the relay demo
#[derive(Clone, Debug)]
pub struct RelayDemoConfig {
    pub launcher: LauncherConfig,
    pub ticker: TickerConfig,
    /// How long the demo runs before asking every module to exit
    pub run_for_ms: u64,
}

/// Ticker module settings
#[derive(Clone, Debug)]
pub struct TickerConfig {
    pub ticks: u32,
    pub interval_ms: u64,
}

impl Default for TickerConfig {
    fn default() -> Self {
        Self {
            ticks: std::env::var("RELAY_DEMO_TICKS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(5),
            interval_ms: std::env::var("RELAY_DEMO_TICK_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(200),
        }
    }
}

impl TickerConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for RelayDemoConfig {
    fn default() -> Self {
        Self {
            launcher: LauncherConfig::from_env(),
            ticker: TickerConfig::default(),
            run_for_ms: std::env::var("RELAY_DEMO_RUN_FOR_MS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(1_500),
        }
    }
}

impl RelayDemoConfig {
    /// Load configuration from a TOML file (path via RELAY_DEMO_CONFIG or ./relay_demo.toml),
    /// overlaying values onto defaults and env-driven defaults.
    pub fn load() -> Self {
        let default = Self::default();
        let path = std::env::var("RELAY_DEMO_CONFIG").unwrap_or_else(|_| "relay_demo.toml".into());
        let p = Path::new(&path);
        if !p.exists() {
            tracing::info!(target: "relay_demo", path = %path, "No TOML config found; using defaults/env");
            return default;
        }
        match fs::read_to_string(p) {
            Ok(s) => Self::from_toml_str(&s).unwrap_or_else(|e| {
                tracing::warn!(target: "relay_demo", error = %e, "Failed to parse TOML; using defaults");
                default
            }),
            Err(e) => {
                tracing::warn!(target: "relay_demo", error = %e, "Failed to read TOML; using defaults");
                default
            }
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Self, toml::de::Error> {
        let overlay = toml::from_str::<RelayDemoToml>(s)?;
        Ok(overlay.overlay(Self::default()))
    }

    pub fn run_for(&self) -> Duration {
        Duration::from_millis(self.run_for_ms)
    }
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct RelayDemoToml {
    pub run_for_ms: Option<u64>,
    pub launcher: Option<LauncherToml>,
    pub ticker: Option<TickerToml>,
}

impl RelayDemoToml {
    fn overlay(self, mut base: RelayDemoConfig) -> RelayDemoConfig {
        if let Some(v) = self.run_for_ms {
            base.run_for_ms = v;
        }
        if let Some(l) = self.launcher {
            l.apply(&mut base.launcher);
        }
        if let Some(t) = self.ticker {
            t.apply(&mut base.ticker);
        }
        base
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct LauncherToml {
    pub exit_poll_budget: Option<u32>,
    pub exit_poll_interval_ms: Option<u64>,
    pub remove_grace_ms: Option<u64>,
}
impl LauncherToml {
    fn apply(self, l: &mut LauncherConfig) {
        if let Some(x) = self.exit_poll_budget {
            l.exit_poll_budget = x;
        }
        if let Some(x) = self.exit_poll_interval_ms {
            l.exit_poll_interval_ms = x;
        }
        if let Some(x) = self.remove_grace_ms {
            l.remove_grace_ms = x;
        }
    }
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
struct TickerToml {
    pub ticks: Option<u32>,
    pub interval_ms: Option<u64>,
}
impl TickerToml {
    fn apply(self, t: &mut TickerConfig) {
        if let Some(x) = self.ticks {
            t.ticks = x;
        }
        if let Some(x) = self.interval_ms {
            t.interval_ms = x;
        }
    }
}
