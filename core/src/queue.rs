// Dispatch queue: many producers, one dispatcher
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::trace;

use crate::envelope::Envelope;
use crate::{Result, SwitchboardError};

/// Counters shared by the producers and the dispatcher.
#[derive(Debug, Default)]
pub struct DispatchStats {
    enqueued: AtomicU64,
    dispatched: AtomicU64,
    delivered: AtomicU64,
    unmatched: AtomicU64,
}

/// Point-in-time copy of [`DispatchStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchStatsSnapshot {
    /// Envelopes accepted into the queue.
    pub enqueued: u64,
    /// Envelopes taken off the queue and routed.
    pub dispatched: u64,
    /// Individual `receive_mailbox` calls.
    pub delivered: u64,
    /// Addressed envelopes that matched no module.
    pub unmatched: u64,
}

impl DispatchStatsSnapshot {
    /// Envelopes still waiting in the queue (approximate under concurrency).
    pub fn backlog(&self) -> u64 {
        self.enqueued.saturating_sub(self.dispatched)
    }
}

impl DispatchStats {
    pub(crate) fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dispatched(&self, deliveries: u64) {
        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.delivered.fetch_add(deliveries, Ordering::Relaxed);
    }

    pub(crate) fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> DispatchStatsSnapshot {
        DispatchStatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dispatched: self.dispatched.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            unmatched: self.unmatched.load(Ordering::Relaxed),
        }
    }
}

/// Producer side of the dispatch queue.
///
/// Every module gets a clone in its [`ModuleContext`](crate::ModuleContext);
/// hosts can get one from [`Launcher::outbox`](crate::Launcher::outbox).
/// Sends never block: the queue is unbounded.
pub struct Outbox<T> {
    tx: mpsc::UnboundedSender<Envelope<T>>,
    stats: Arc<DispatchStats>,
}

impl<T> Clone for Outbox<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            stats: Arc::clone(&self.stats),
        }
    }
}

impl<T> Outbox<T> {
    /// Enqueues an envelope for the dispatcher.
    pub fn send(&self, envelope: Envelope<T>) -> Result<()> {
        trace!(target: "dispatch_queue", mode = ?envelope.mode(), "Enqueueing envelope");
        self.tx
            .send(envelope)
            .map_err(|_| SwitchboardError::DispatcherClosed)?;
        self.stats.record_enqueued();
        Ok(())
    }

    /// Enqueues `payload` for every registered module.
    pub fn broadcast(&self, payload: T) -> Result<()> {
        self.send(Envelope::broadcast(payload))
    }

    /// Enqueues `payload` for the modules named `addressee`.
    pub fn send_to(&self, addressee: impl Into<String>, payload: T) -> Result<()> {
        self.send(Envelope::addressed(payload, addressee))
    }

    /// True once the dispatcher side of the queue is gone.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, owned by the dispatcher.
pub(crate) type QueueReceiver<T> = mpsc::UnboundedReceiver<Envelope<T>>;

/// Creates the queue shared by all producers and the single dispatcher.
pub(crate) fn dispatch_queue<T>(stats: Arc<DispatchStats>) -> (Outbox<T>, QueueReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Outbox { tx, stats }, rx)
}
