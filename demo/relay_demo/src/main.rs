mod config;
mod modules;

use std::sync::Arc;

use config::RelayDemoConfig;
use modules::{Console, Echo, Ticker};
use switchboard_core::telemetry::init_tracing;
use switchboard_core::{Command, Launcher};
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing("info,switchboard_core=info,relay_demo=info");

    info!(target: "relay_demo", "Starting relay demo: ticker → echo → console");

    // Load configuration (defaults + env + optional TOML overlay)
    let cfg = RelayDemoConfig::load();

    let launcher = Launcher::<Command>::with_config(cfg.launcher.clone())?;
    let console = Arc::new(Console::new());
    let _ = &launcher
        + Arc::new(Ticker::new(cfg.ticker.clone()))
        + Arc::new(Echo::new())
        + Arc::clone(&console);

    let started = launcher.launch_all();
    info!(target: "relay_demo", started, "Modules launched");

    launcher
        .outbox()
        .broadcast(Command::new("hello"))?;

    tokio::select! {
        _ = tokio::time::sleep(cfg.run_for()) => {
            info!(target: "relay_demo", "Run time elapsed");
        }
        res = signal::ctrl_c() => {
            res?;
            info!(target: "relay_demo", "Interrupted");
        }
    }

    let report = launcher.exit().await;
    info!(
        target: "relay_demo",
        clean = report.is_clean(),
        console_seen = console.seen(),
        report = %serde_json::to_string(&report)?,
        stats = %serde_json::to_string(&launcher.stats())?,
        "Shut down"
    );
    Ok(())
}
