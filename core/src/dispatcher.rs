// Dispatcher: drains the dispatch queue and routes envelopes
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::envelope::{DeliveryMode, Envelope};
use crate::launcher::registry::{self, Registry};
use crate::module::Module;
use crate::queue::{DispatchStats, QueueReceiver};

/// Single consumer of the dispatch queue.
///
/// Targets are resolved against the registry when an envelope is dequeued,
/// not when it was enqueued, so a module added in between still receives it.
pub(crate) struct Dispatcher<T> {
    registry: Registry<T>,
    rx: QueueReceiver<T>,
    stats: Arc<DispatchStats>,
}

impl<T: Clone + Send + 'static> Dispatcher<T> {
    pub(crate) fn new(registry: Registry<T>, rx: QueueReceiver<T>, stats: Arc<DispatchStats>) -> Self {
        Self {
            registry,
            rx,
            stats,
        }
    }

    pub(crate) fn spawn_on(self, runtime: &Handle) -> JoinHandle<()> {
        runtime.spawn(self.run())
    }

    async fn run(mut self) {
        info!(target: "dispatcher", "Dispatcher started");

        // Blocks while the queue is empty; ends when every producer is gone.
        while let Some(envelope) = self.rx.recv().await {
            self.route(envelope).await;
        }

        info!(target: "dispatcher", "Dispatcher stopped");
    }

    async fn route(&self, envelope: Envelope<T>) {
        let targets = self.targets(&envelope);

        if targets.is_empty() {
            if let Some(addressee) = envelope.addressee() {
                debug!(target: "dispatcher", addressee = %addressee, "No module matches addressee; dropping");
                self.stats.record_unmatched();
            }
            self.stats.record_dispatched(0);
            return;
        }

        let payload = envelope.into_payload();
        let mut deliveries = 0;
        if let Some((last, rest)) = targets.split_last() {
            for module in rest {
                deliveries += Self::deliver(module, payload.clone()).await as u64;
            }
            deliveries += Self::deliver(last, payload).await as u64;
        }
        self.stats.record_dispatched(deliveries);
    }

    // A panicking mailbox costs that module this envelope, not the dispatcher.
    async fn deliver(module: &Arc<dyn Module<T>>, payload: T) -> bool {
        match AssertUnwindSafe(module.receive_mailbox(payload))
            .catch_unwind()
            .await
        {
            Ok(()) => true,
            Err(_) => {
                error!(
                    target: "dispatcher",
                    module = %module.name(),
                    id = %module.id(),
                    "Module panicked in receive_mailbox; envelope skipped"
                );
                false
            }
        }
    }

    fn targets(&self, envelope: &Envelope<T>) -> Vec<Arc<dyn Module<T>>> {
        let registry = registry::read(&self.registry);
        match envelope.mode() {
            DeliveryMode::Broadcast => registry
                .iter()
                .map(|record| Arc::clone(&record.module))
                .collect(),
            DeliveryMode::Addressed => {
                let addressee = envelope.addressee().unwrap_or_default();
                registry
                    .iter()
                    .filter(|record| record.module.name() == addressee)
                    .map(|record| Arc::clone(&record.module))
                    .collect()
            }
        }
    }
}
