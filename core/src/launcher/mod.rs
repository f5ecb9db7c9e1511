//! Launcher: module registry, execution-unit lifecycle and shutdown.
//! - registry.rs: module records shared with the dispatcher
//! - ops.rs: `+` / `-` registration operators

mod ops;
pub(crate) mod registry;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::LauncherConfig;
use crate::dispatcher::Dispatcher;
use crate::module::{ExitSignal, Module, ModuleContext, ModuleId};
use crate::queue::{dispatch_queue, DispatchStats, DispatchStatsSnapshot, Outbox};
use crate::{Result, SwitchboardError};

use registry::{ModuleRecord, Registry};

/// Identifies a registered module, by position or by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleRef {
    Index(usize),
    Id(ModuleId),
}

impl ModuleRef {
    fn resolve<T>(self, records: &[ModuleRecord<T>]) -> Result<usize> {
        match self {
            ModuleRef::Index(index) if index < records.len() => Ok(index),
            ModuleRef::Index(index) => Err(SwitchboardError::InvalidOperation(format!(
                "No module registered at index {}",
                index
            ))),
            ModuleRef::Id(id) => records
                .iter()
                .position(|record| record.module.id() == id)
                .ok_or_else(|| {
                    SwitchboardError::InvalidOperation(format!(
                        "The registry does not contain module {}",
                        id
                    ))
                }),
        }
    }
}

impl From<usize> for ModuleRef {
    fn from(index: usize) -> Self {
        ModuleRef::Index(index)
    }
}

impl From<ModuleId> for ModuleRef {
    fn from(id: ModuleId) -> Self {
        ModuleRef::Id(id)
    }
}

/// A unit still running when `exit()` ran out of polls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbandonedUnit {
    pub id: ModuleId,
    pub name: String,
}

/// Outcome of [`Launcher::exit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitReport {
    /// Modules that were asked to exit.
    pub signalled: usize,
    /// Liveness polls spent waiting.
    pub polls: u32,
    /// Units left running once the poll budget was exhausted.
    pub abandoned: Vec<AbandonedUnit>,
}

impl ExitReport {
    /// True when every launched unit terminated within the poll budget.
    pub fn is_clean(&self) -> bool {
        self.abandoned.is_empty()
    }
}

/// Launches modules on their own tasks and routes their messages.
///
/// The dispatch queue and its dispatcher task are created by the constructor
/// and live until the launcher is dropped; [`exit`](Launcher::exit) only stops
/// the modules. All registry operations take `&self`, so a launcher can be
/// shared behind an `Arc`.
///
/// # Examples
///
/// ```no_run
/// # use std::sync::Arc;
/// # use switchboard_core::{Command, Launcher, Module, Result};
/// # async fn demo(ticker: Arc<dyn Module<Command>>) -> Result<()> {
/// let launcher = Launcher::<Command>::new()?;
/// launcher.add(ticker);
/// launcher.launch_all();
///
/// launcher.outbox().broadcast(Command::new("hello"))?;
///
/// let report = launcher.exit().await;
/// assert!(report.is_clean());
/// # Ok(())
/// # }
/// ```
pub struct Launcher<T> {
    config: LauncherConfig,
    runtime: Handle,
    registry: Registry<T>,
    outbox: Outbox<T>,
    stats: Arc<DispatchStats>,
    dispatcher: JoinHandle<()>,
}

impl<T: Clone + Send + 'static> Launcher<T> {
    pub fn new() -> Result<Self> {
        Self::with_config(LauncherConfig::default())
    }

    /// Builds a launcher and spawns its dispatcher on the current tokio runtime.
    pub fn with_config(config: LauncherConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| SwitchboardError::NoRuntime)?;

        let stats = Arc::new(DispatchStats::default());
        let (outbox, rx) = dispatch_queue(Arc::clone(&stats));
        let registry: Registry<T> = Arc::default();
        let dispatcher =
            Dispatcher::new(Arc::clone(&registry), rx, Arc::clone(&stats)).spawn_on(&runtime);

        info!(target: "launcher", ?config, "Launcher created");
        Ok(Self {
            config,
            runtime,
            registry,
            outbox,
            stats,
            dispatcher,
        })
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    /// Registers a module without starting it.
    ///
    /// The module's outbox is bound to the dispatch queue here. Duplicate ids
    /// are accepted; callers are expected to avoid them.
    #[tracing::instrument(skip_all, fields(module = %module.name(), id = %module.id()))]
    pub fn add(&self, module: Arc<dyn Module<T>>) {
        let id = module.id();
        let ctx = ModuleContext::new(id, self.outbox.clone(), ExitSignal::new());

        let mut records = registry::write(&self.registry);
        if records.iter().any(|record| record.module.id() == id) {
            warn!(target: "launcher", "Module id registered twice");
        }
        records.push(ModuleRecord::new(module, ctx));
        debug!(target: "launcher", registered = records.len(), "Module added");
    }

    /// Starts the execution unit of one registered module.
    pub fn launch(&self, target: impl Into<ModuleRef>) -> Result<()> {
        let mut records = registry::write(&self.registry);
        let index = target.into().resolve(&records[..])?;
        let record = &mut records[index];
        if record.unit.launched() {
            return Err(SwitchboardError::InvalidOperation(format!(
                "Module {} ({}) is already launched",
                record.module.name(),
                record.module.id()
            )));
        }
        record.unit.launch(Arc::clone(&record.module), &self.runtime);
        Ok(())
    }

    /// Starts every unit that has not been launched yet; returns how many.
    pub fn launch_all(&self) -> usize {
        let mut records = registry::write(&self.registry);
        let mut started = 0;
        for record in records.iter_mut().filter(|record| !record.unit.launched()) {
            record.unit.launch(Arc::clone(&record.module), &self.runtime);
            started += 1;
        }
        info!(target: "launcher", started, "Launched pending modules");
        started
    }

    /// Unregisters a module.
    ///
    /// Fails with [`SwitchboardError::InvalidOperation`] when the module is not
    /// registered, or when it has been launched and `override_launch` is false.
    /// With `override_launch` a running unit is asked to exit, given
    /// [`LauncherConfig::remove_grace`] to comply, then aborted. A module that
    /// never yields back to the runtime can outlive the abort; that is logged.
    #[tracing::instrument(skip(self, target))]
    pub async fn remove(&self, target: impl Into<ModuleRef>, override_launch: bool) -> Result<()> {
        let record = self.detach(target.into(), override_launch)?;
        self.terminate(record).await;
        Ok(())
    }

    /// Removal that never waits: only modules that were never launched.
    pub(crate) fn remove_idle(&self, target: ModuleRef) -> Result<()> {
        let record = self.detach(target, false)?;
        debug!(target: "launcher", module = %record.module.name(), "Module removed");
        Ok(())
    }

    // Record, unit and exit signal leave the registry together under one lock.
    fn detach(&self, target: ModuleRef, override_launch: bool) -> Result<ModuleRecord<T>> {
        let mut records = registry::write(&self.registry);
        let index = target.resolve(&records[..])?;
        let record = &records[index];
        if record.unit.launched() && !override_launch {
            return Err(SwitchboardError::InvalidOperation(format!(
                "Cannot remove module {} ({}): it is already launched",
                record.module.name(),
                record.module.id()
            )));
        }
        Ok(records.remove(index))
    }

    async fn terminate(&self, record: ModuleRecord<T>) {
        let ModuleRecord { module, unit } = record;
        let name = module.name().to_string();
        let (exit, handle) = unit.into_parts();
        let Some(mut unit) = handle else {
            debug!(target: "launcher", module = %name, "Removed module that was never launched");
            return;
        };
        if unit.is_finished() {
            debug!(target: "launcher", module = %name, "Removed module whose unit already finished");
            return;
        }

        exit.trigger();
        module.exit();

        let grace = self.config.remove_grace();
        if tokio::time::timeout(grace, unit.handle_mut()).await.is_ok() {
            info!(target: "launcher", module = %name, "Module stopped within grace period");
            return;
        }

        warn!(target: "launcher", module = %name, ?grace, "Module ignored exit; aborting its unit");
        unit.abort();
        if tokio::time::timeout(grace, unit.handle_mut()).await.is_err() {
            warn!(target: "launcher", module = %name, "Aborted unit did not yield; leaving it orphaned");
        }
    }

    /// Asks every module to stop and waits, bounded, for their units to end.
    ///
    /// Polls at most [`LauncherConfig::exit_poll_budget`] times. Units still
    /// alive afterwards are abandoned, not aborted, and listed in the report.
    /// The dispatcher keeps running.
    #[tracing::instrument(skip(self))]
    pub async fn exit(&self) -> ExitReport {
        let modules: Vec<(Arc<dyn Module<T>>, ExitSignal)> = registry::read(&self.registry)
            .iter()
            .map(|record| (Arc::clone(&record.module), record.unit.exit_signal().clone()))
            .collect();

        for (module, exit) in &modules {
            exit.trigger();
            module.exit();
        }
        info!(target: "launcher", modules = modules.len(), "Exit signalled");

        let budget = self.config.exit_poll_budget;
        let interval = self.config.exit_poll_interval();
        let mut polls = 0;
        loop {
            let alive = self.alive_units();
            if alive.is_empty() {
                info!(target: "launcher", polls, "All units terminated");
                return ExitReport {
                    signalled: modules.len(),
                    polls,
                    abandoned: Vec::new(),
                };
            }
            if polls >= budget {
                warn!(
                    target: "launcher",
                    polls,
                    abandoned = alive.len(),
                    "Exit poll budget exhausted; abandoning running units"
                );
                return ExitReport {
                    signalled: modules.len(),
                    polls,
                    abandoned: alive,
                };
            }
            polls += 1;
            tokio::time::sleep(interval).await;
        }
    }

    fn alive_units(&self) -> Vec<AbandonedUnit> {
        registry::read(&self.registry)
            .iter()
            .filter(|record| record.unit.is_alive())
            .map(|record| AbandonedUnit {
                id: record.module.id(),
                name: record.module.name().to_string(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        registry::read(&self.registry).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `None` when nothing is registered at `index`.
    pub fn is_launched(&self, index: usize) -> Option<bool> {
        registry::read(&self.registry)
            .get(index)
            .map(|record| record.unit.launched())
    }

    /// `None` when nothing is registered at `index`.
    pub fn is_running(&self, index: usize) -> Option<bool> {
        registry::read(&self.registry)
            .get(index)
            .map(|record| record.unit.is_alive())
    }

    pub fn position(&self, id: ModuleId) -> Option<usize> {
        ModuleRef::Id(id)
            .resolve(&registry::read(&self.registry)[..])
            .ok()
    }

    /// Registered ids, in registry order.
    pub fn module_ids(&self) -> Vec<ModuleId> {
        registry::read(&self.registry)
            .iter()
            .map(|record| record.module.id())
            .collect()
    }

    /// Host-side producer handle into the dispatch queue.
    pub fn outbox(&self) -> Outbox<T> {
        self.outbox.clone()
    }

    pub fn stats(&self) -> DispatchStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn dispatcher_running(&self) -> bool {
        !self.dispatcher.is_finished()
    }
}

impl<T> Drop for Launcher<T> {
    fn drop(&mut self) {
        self.dispatcher.abort();
    }
}
