// Switchboard Core Library
// Module launcher and message-routing runtime

pub mod config;
pub mod dispatcher;
pub mod envelope;
pub mod launcher;
pub mod module;
pub mod queue;
pub mod telemetry;

// Export core types
pub use config::LauncherConfig;
pub use envelope::{Command, DeliveryMode, Envelope};
pub use launcher::{AbandonedUnit, ExitReport, Launcher, ModuleRef};
pub use module::{ExitSignal, Module, ModuleContext, ModuleId};
pub use queue::{DispatchStats, DispatchStatsSnapshot, Outbox};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwitchboardError {
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    #[error("Unknown delivery mode: {0}")]
    UnknownDeliveryMode(i32),

    #[error("Dispatcher is closed")]
    DispatcherClosed,

    #[error("No tokio runtime available to host the launcher")]
    NoRuntime,

    #[error("Module error: {0}")]
    Module(String),

    #[error("Configuration error: {0}")]
    Config(String),
}
pub type Result<T> = std::result::Result<T, SwitchboardError>;
