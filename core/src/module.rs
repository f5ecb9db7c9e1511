// Module contract consumed by the launcher and the dispatcher
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::queue::Outbox;
use crate::Result;

/// Stable identity of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ModuleId(uuid::Uuid);

impl ModuleId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl Default for ModuleId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<uuid::Uuid> for ModuleId {
    fn from(id: uuid::Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A unit of independent work driven by a [`Launcher`](crate::Launcher).
///
/// The launcher runs [`start`](Module::start) on its own task once the module
/// is launched, while the dispatcher calls
/// [`receive_mailbox`](Module::receive_mailbox) from a different task. Both
/// take `&self`, so implementations keep their mutable state behind interior
/// mutability (a channel, a mutex, atomics).
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use switchboard_core::{Module, ModuleContext, ModuleId, Result};
///
/// struct Echo {
///     id: ModuleId,
/// }
///
/// #[async_trait]
/// impl Module<String> for Echo {
///     fn id(&self) -> ModuleId {
///         self.id
///     }
///     fn name(&self) -> &str {
///         "echo"
///     }
///     async fn start(&self, ctx: ModuleContext<String>) -> Result<()> {
///         ctx.exited().await;
///         Ok(())
///     }
///     fn exit(&self) {}
///     async fn receive_mailbox(&self, payload: String) {
///         println!("echo: {payload}");
///     }
/// }
/// ```
#[async_trait]
pub trait Module<T>: Send + Sync {
    /// Unique, stable identity. Used to resolve removals.
    fn id(&self) -> ModuleId;

    /// Routing name for addressed envelopes. Several modules may share one.
    fn name(&self) -> &str;

    /// Main work loop. Should return promptly once exit has been requested,
    /// either through [`exit`](Module::exit) or the context's exit signal.
    async fn start(&self, ctx: ModuleContext<T>) -> Result<()>;

    /// Requests cooperative termination of [`start`](Module::start).
    fn exit(&self);

    /// Inbound hook invoked by the dispatcher for every matching envelope.
    async fn receive_mailbox(&self, payload: T);
}

/// One-shot cooperative stop flag shared between the launcher and a module.
///
/// Once triggered it stays triggered.
#[derive(Debug, Clone)]
pub struct ExitSignal {
    tx: Arc<watch::Sender<bool>>,
}

impl ExitSignal {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once [`trigger`](ExitSignal::trigger) has been called.
    pub async fn triggered(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close underneath us.
        let _ = rx.wait_for(|exited| *exited).await;
    }
}

impl Default for ExitSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a module receives from the launcher when it is started.
pub struct ModuleContext<T> {
    module_id: ModuleId,
    outbox: Outbox<T>,
    exit: ExitSignal,
}

impl<T> ModuleContext<T> {
    pub(crate) fn new(module_id: ModuleId, outbox: Outbox<T>, exit: ExitSignal) -> Self {
        Self {
            module_id,
            outbox,
            exit,
        }
    }

    pub fn module_id(&self) -> ModuleId {
        self.module_id
    }

    /// Producer handle into the launcher's dispatch queue.
    pub fn outbox(&self) -> &Outbox<T> {
        &self.outbox
    }

    pub fn exit_signal(&self) -> &ExitSignal {
        &self.exit
    }

    pub fn exit_requested(&self) -> bool {
        self.exit.is_triggered()
    }

    /// Resolves once the launcher asks this module to stop.
    pub async fn exited(&self) {
        self.exit.triggered().await
    }
}

impl<T> Clone for ModuleContext<T> {
    fn clone(&self) -> Self {
        Self {
            module_id: self.module_id,
            outbox: self.outbox.clone(),
            exit: self.exit.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn exit_signal_wakes_waiters() {
        let signal = ExitSignal::new();
        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.triggered().await })
        };

        assert!(!signal.is_triggered());
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(500), waiter)
            .await
            .expect("waiter should wake")
            .expect("waiter task");
        assert!(signal.is_triggered());
    }

    #[tokio::test]
    async fn triggered_returns_immediately_when_already_set() {
        let signal = ExitSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.triggered())
            .await
            .expect("already triggered");
    }

    #[test]
    fn module_ids_are_unique() {
        assert_ne!(ModuleId::new(), ModuleId::new());
    }
}
