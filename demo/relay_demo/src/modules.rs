// Sample modules wired together by the demo
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use switchboard_core::{Command, ExitSignal, Module, ModuleContext, ModuleId, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::TickerConfig;

/// Broadcasts a numbered `tick` on a fixed interval.
pub struct Ticker {
    id: ModuleId,
    cfg: TickerConfig,
    stop: ExitSignal,
}

impl Ticker {
    pub fn new(cfg: TickerConfig) -> Self {
        Self {
            id: ModuleId::new(),
            cfg,
            stop: ExitSignal::new(),
        }
    }
}

#[async_trait]
impl Module<Command> for Ticker {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        "ticker"
    }

    async fn start(&self, ctx: ModuleContext<Command>) -> Result<()> {
        let mut interval = tokio::time::interval(self.cfg.interval());
        for n in 0..self.cfg.ticks {
            tokio::select! {
                _ = interval.tick() => {
                    ctx.outbox().broadcast(Command::with_data("tick", json!({ "n": n })))?;
                }
                _ = ctx.exited() => return Ok(()),
                _ = self.stop.triggered() => return Ok(()),
            }
        }
        ctx.outbox().send_to("console", Command::new("ticker.done"))?;
        ctx.exited().await;
        Ok(())
    }

    fn exit(&self) {
        self.stop.trigger();
    }

    async fn receive_mailbox(&self, payload: Command) {
        debug!(target: "relay_demo", module = "ticker", command = %payload.command, "Ignoring");
    }
}

/// Relays every tick it sees to the console, from its own task.
pub struct Echo {
    id: ModuleId,
    tx: mpsc::UnboundedSender<Command>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<Command>>>,
}

impl Echo {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            id: ModuleId::new(),
            tx,
            rx: Mutex::new(Some(rx)),
        }
    }
}

#[async_trait]
impl Module<Command> for Echo {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        "echo"
    }

    async fn start(&self, ctx: ModuleContext<Command>) -> Result<()> {
        let mut mailbox = self
            .rx
            .lock()
            .map_err(|_| switchboard_core::SwitchboardError::Module("echo mailbox poisoned".into()))?
            .take()
            .ok_or_else(|| switchboard_core::SwitchboardError::Module("echo started twice".into()))?;

        loop {
            tokio::select! {
                Some(cmd) = mailbox.recv() => {
                    if cmd.is("tick") {
                        let relayed = Command { command: "echo.tick".into(), data: cmd.data };
                        ctx.outbox().send_to("console", relayed)?;
                    }
                }
                _ = ctx.exited() => return Ok(()),
            }
        }
    }

    fn exit(&self) {}

    async fn receive_mailbox(&self, payload: Command) {
        let _ = self.tx.send(payload);
    }
}

/// Logs everything that reaches it.
pub struct Console {
    id: ModuleId,
    seen: AtomicU32,
}

impl Console {
    pub fn new() -> Self {
        Self {
            id: ModuleId::new(),
            seen: AtomicU32::new(0),
        }
    }

    pub fn seen(&self) -> u32 {
        self.seen.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl Module<Command> for Console {
    fn id(&self) -> ModuleId {
        self.id
    }

    fn name(&self) -> &str {
        "console"
    }

    async fn start(&self, ctx: ModuleContext<Command>) -> Result<()> {
        ctx.exited().await;
        Ok(())
    }

    fn exit(&self) {}

    async fn receive_mailbox(&self, payload: Command) {
        let n = self.seen.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            target: "relay_demo",
            seen = n,
            command = %payload.command,
            data = %payload.data.unwrap_or_default(),
            "console"
        );
    }
}
