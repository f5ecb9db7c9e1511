// Operator-style registration: `&launcher + module`, `&launcher - &module`
use std::ops::{Add, Sub};
use std::sync::Arc;

use super::{Launcher, ModuleRef};
use crate::module::Module;
use crate::Result;

/// Same as [`Launcher::add`]; returns the launcher so additions chain.
impl<'a, T, M> Add<Arc<M>> for &'a Launcher<T>
where
    T: Clone + Send + 'static,
    M: Module<T> + 'static,
{
    type Output = &'a Launcher<T>;

    fn add(self, module: Arc<M>) -> Self::Output {
        Launcher::add(self, module);
        self
    }
}

/// Same as [`Launcher::remove`] without override: fails for launched modules.
impl<'a, 'm, T, M> Sub<&'m M> for &'a Launcher<T>
where
    T: Clone + Send + 'static,
    M: Module<T> + ?Sized,
{
    type Output = Result<&'a Launcher<T>>;

    fn sub(self, module: &'m M) -> Self::Output {
        self.remove_idle(ModuleRef::Id(module.id()))?;
        Ok(self)
    }
}
