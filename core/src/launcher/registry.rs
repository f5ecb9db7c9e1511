// Module records shared between the launcher and the dispatcher
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::module::{ExitSignal, Module, ModuleContext};

pub(crate) type Registry<T> = Arc<RwLock<Vec<ModuleRecord<T>>>>;

// Poisoned only by a panic under the write lock, i.e. `module.id()` in `Launcher::add`.
pub(crate) fn read<T>(registry: &Registry<T>) -> RwLockReadGuard<'_, Vec<ModuleRecord<T>>> {
    registry.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(registry: &Registry<T>) -> RwLockWriteGuard<'_, Vec<ModuleRecord<T>>> {
    registry.write().unwrap_or_else(PoisonError::into_inner)
}

/// One registered module and the execution unit bound to its `start`.
pub(crate) struct ModuleRecord<T> {
    pub(crate) module: Arc<dyn Module<T>>,
    pub(crate) unit: ExecutionUnit<T>,
}

impl<T> ModuleRecord<T> {
    pub(crate) fn new(module: Arc<dyn Module<T>>, ctx: ModuleContext<T>) -> Self {
        Self {
            module,
            unit: ExecutionUnit { ctx, handle: None },
        }
    }
}

/// Task backing a module. Pending until launched; launched never reverts.
pub(crate) struct ExecutionUnit<T> {
    ctx: ModuleContext<T>,
    handle: Option<JoinHandle<()>>,
}

impl<T: Send + 'static> ExecutionUnit<T> {
    pub(crate) fn launched(&self) -> bool {
        self.handle.is_some()
    }

    /// A never-launched unit is not alive.
    pub(crate) fn is_alive(&self) -> bool {
        self.handle
            .as_ref()
            .map(|handle| !handle.is_finished())
            .unwrap_or(false)
    }

    pub(crate) fn exit_signal(&self) -> &ExitSignal {
        self.ctx.exit_signal()
    }

    pub(crate) fn launch(&mut self, module: Arc<dyn Module<T>>, runtime: &Handle) {
        let ctx = self.ctx.clone();
        let handle = runtime.spawn(async move {
            let name = module.name().to_string();
            let id = module.id();
            info!(target: "launcher", module = %name, id = %id, "Module started");
            match module.start(ctx).await {
                Ok(()) => info!(target: "launcher", module = %name, id = %id, "Module stopped"),
                Err(e) => {
                    warn!(target: "launcher", module = %name, id = %id, error = %e, "Module stopped with error")
                }
            }
        });
        self.handle = Some(handle);
    }

    pub(crate) fn into_parts(self) -> (ExitSignal, Option<DetachedUnit>) {
        (self.ctx.exit_signal().clone(), self.handle.map(DetachedUnit))
    }
}

/// Task of a module already taken out of the registry. Aborts on drop, so a
/// cancelled removal cannot leave the unit running unseen.
pub(crate) struct DetachedUnit(JoinHandle<()>);

impl DetachedUnit {
    pub(crate) fn is_finished(&self) -> bool {
        self.0.is_finished()
    }

    pub(crate) fn handle_mut(&mut self) -> &mut JoinHandle<()> {
        &mut self.0
    }

    pub(crate) fn abort(&self) {
        self.0.abort();
    }
}

impl Drop for DetachedUnit {
    fn drop(&mut self) {
        self.0.abort();
    }
}
