//! Shared test modules and helpers for launcher/dispatcher tests

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use switchboard_core::{Envelope, Module, ModuleContext, ModuleId, Outbox, Result};
use tokio::sync::Notify;

/// Polls `cond` until it holds or `limit` elapses.
pub async fn wait_until(limit: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    cond()
}

/// Flips a flag when the owning future is dropped, including on abort.
struct StopGuard(Arc<AtomicBool>);

impl Drop for StopGuard {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Records every payload it receives; optionally emits envelopes on start.
pub struct Recorder<T> {
    id: ModuleId,
    name: String,
    received: Mutex<Vec<T>>,
    on_start: Mutex<Vec<Envelope<T>>>,
    exit_calls: AtomicUsize,
    stopped: Arc<AtomicBool>,
}

impl<T: Clone + Send + 'static> Recorder<T> {
    pub fn new(name: &str) -> Arc<Self> {
        Self::emitting(name, Vec::new())
    }

    pub fn emitting(name: &str, on_start: Vec<Envelope<T>>) -> Arc<Self> {
        Arc::new(Self {
            id: ModuleId::new(),
            name: name.to_string(),
            received: Mutex::new(Vec::new()),
            on_start: Mutex::new(on_start),
            exit_calls: AtomicUsize::new(0),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn received(&self) -> Vec<T> {
        self.received.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.received.lock().unwrap().len()
    }

    pub fn exit_calls(&self) -> usize {
        self.exit_calls.load(Ordering::SeqCst)
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + 'static> Module<T> for Recorder<T> {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, ctx: ModuleContext<T>) -> Result<()> {
        let _guard = StopGuard(Arc::clone(&self.stopped));
        let pending: Vec<Envelope<T>> = std::mem::take(&mut *self.on_start.lock().unwrap());
        for envelope in pending {
            ctx.outbox().send(envelope)?;
        }
        ctx.exited().await;
        Ok(())
    }

    fn exit(&self) {
        self.exit_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn receive_mailbox(&self, payload: T) {
        self.received.lock().unwrap().push(payload);
    }
}

/// Ignores every exit request; only an abort stops it.
pub struct Stubborn {
    id: ModuleId,
    stopped: Arc<AtomicBool>,
}

impl Stubborn {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ModuleId::new(),
            stopped: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Send + 'static> Module<T> for Stubborn {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        "stubborn"
    }

    async fn start(&self, _ctx: ModuleContext<T>) -> Result<()> {
        let _guard = StopGuard(Arc::clone(&self.stopped));
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn exit(&self) {}

    async fn receive_mailbox(&self, _payload: T) {}
}

/// Holds the dispatcher inside `receive_mailbox` for `hold_on` until released.
pub struct Gate {
    id: ModuleId,
    hold_on: u32,
    pub entered: Notify,
    pub release: Notify,
    received: Mutex<Vec<u32>>,
}

impl Gate {
    pub fn new(hold_on: u32) -> Arc<Self> {
        Arc::new(Self {
            id: ModuleId::new(),
            hold_on,
            entered: Notify::new(),
            release: Notify::new(),
            received: Mutex::new(Vec::new()),
        })
    }

    pub fn received(&self) -> Vec<u32> {
        self.received.lock().unwrap().clone()
    }
}

#[async_trait]
impl Module<u32> for Gate {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        "gate"
    }

    async fn start(&self, ctx: ModuleContext<u32>) -> Result<()> {
        ctx.exited().await;
        Ok(())
    }

    fn exit(&self) {}

    async fn receive_mailbox(&self, payload: u32) {
        if payload == self.hold_on {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.received.lock().unwrap().push(payload);
    }
}

/// Replies to every `ping` addressed to it with a `pong` to the sender name.
pub struct Ponger {
    id: ModuleId,
    outbox: Mutex<Option<Outbox<String>>>,
}

impl Ponger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: ModuleId::new(),
            outbox: Mutex::new(None),
        })
    }
}

#[async_trait]
impl Module<String> for Ponger {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        "ponger"
    }

    async fn start(&self, ctx: ModuleContext<String>) -> Result<()> {
        *self.outbox.lock().unwrap() = Some(ctx.outbox().clone());
        ctx.exited().await;
        Ok(())
    }

    fn exit(&self) {}

    async fn receive_mailbox(&self, payload: String) {
        let Some(sender) = payload.strip_prefix("ping:") else {
            return;
        };
        let outbox = self.outbox.lock().unwrap().clone();
        if let Some(outbox) = outbox {
            let _ = outbox.send_to(sender, "pong".to_string());
        }
    }
}

/// Panics in `receive_mailbox` whenever it is handed `panic_on`.
pub struct Faulty {
    id: ModuleId,
    panic_on: u32,
}

impl Faulty {
    pub fn new(panic_on: u32) -> Arc<Self> {
        Arc::new(Self {
            id: ModuleId::new(),
            panic_on,
        })
    }
}

#[async_trait]
impl Module<u32> for Faulty {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        "faulty"
    }

    async fn start(&self, ctx: ModuleContext<u32>) -> Result<()> {
        ctx.exited().await;
        Ok(())
    }

    fn exit(&self) {}

    async fn receive_mailbox(&self, payload: u32) {
        if payload == self.panic_on {
            panic!("faulty module refuses payload {payload}");
        }
    }
}
