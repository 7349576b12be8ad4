mod plan;
mod registry;

pub use plan::{FieldGroupMap, ProxyPlan};
pub use registry::ProxyRegistry;

use log::debug;
use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;

use crate::deferrable::Deferrable;
use crate::deferred::DeferredObject;
use crate::error::DeferResult;

/// A lazy wrapper around one instance of a deferrable type.
///
/// The proxy owns exactly one [`DeferredObject`] and the instance it
/// populates. Calling an intercepted method through [`invoke`](Proxy::invoke)
/// first ensures the method's field group has been injected, then runs the
/// call against the instance; methods outside the plan are forwarded
/// untouched. Each intercepted method names its field group, and the
/// per-instance `loaded` marker set guarantees a group is injected at most
/// once.
///
/// Cloning a proxy clones the handle, not the instance: clones share loaded
/// state. Two proxies obtained from separate resolutions of the same
/// identifier are fully independent.
pub struct Proxy<T: Deferrable> {
    shared: Rc<ProxyShared<T>>,
}

struct ProxyShared<T: Deferrable> {
    defer: DeferredObject<T>,
    plan: Arc<ProxyPlan>,
    instance: RefCell<T>,
    loaded: RefCell<HashSet<String>>,
}

impl<T: Deferrable> Proxy<T> {
    pub(crate) fn new(defer: DeferredObject<T>) -> DeferResult<Self> {
        let plan = ProxyRegistry::global().get_or_build::<T>(defer.config())?;
        Self::bind(defer, plan)
    }

    pub(crate) fn with_registry(
        defer: DeferredObject<T>,
        registry: &ProxyRegistry,
    ) -> DeferResult<Self> {
        let plan = registry.get_or_build::<T>(defer.config())?;
        Self::bind(defer, plan)
    }

    fn bind(defer: DeferredObject<T>, plan: Arc<ProxyPlan>) -> DeferResult<Self> {
        let instance = RefCell::new(T::import(&defer)?);
        Ok(Self {
            shared: Rc::new(ProxyShared {
                defer,
                plan,
                instance,
                loaded: RefCell::new(HashSet::new()),
            }),
        })
    }

    /// Runs `f` against the wrapped instance, injecting the method's field
    /// group first if `method` is intercepted and not yet loaded.
    pub fn invoke<R>(&self, method: &str, f: impl FnOnce(&T) -> R) -> DeferResult<R> {
        self.ensure_loaded(method)?;
        Ok(f(&self.shared.instance.borrow()))
    }

    /// Mutable counterpart of [`invoke`](Proxy::invoke), for forwarding
    /// mutating methods. A field written this way is treated as set by any
    /// later injection pass.
    pub fn invoke_mut<R>(&self, method: &str, f: impl FnOnce(&mut T) -> R) -> DeferResult<R> {
        self.ensure_loaded(method)?;
        Ok(f(&mut self.shared.instance.borrow_mut()))
    }

    /// Reads the current instance state without triggering any injection.
    pub fn peek<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.shared.instance.borrow())
    }

    fn ensure_loaded(&self, method: &str) -> DeferResult<()> {
        let group = match self.shared.plan.group_for(method) {
            Some(group) => group,
            None => return Ok(()),
        };
        let already_loaded = self.shared.loaded.borrow().contains(method);
        if already_loaded {
            return Ok(());
        }
        debug!(
            "Loading field group of '{}::{}'",
            self.shared.plan.type_name(),
            method
        );
        self.shared
            .defer
            .inject_into(&mut self.shared.instance.borrow_mut(), Some(group))?;
        self.shared.loaded.borrow_mut().insert(method.to_string());
        Ok(())
    }

    /// Whether the field group named by `method` has been injected into
    /// this instance.
    #[must_use]
    pub fn is_loaded(&self, method: &str) -> bool {
        self.shared.loaded.borrow().contains(method)
    }

    /// The field groups loaded so far, sorted for stable output.
    #[must_use]
    pub fn loaded_groups(&self) -> Vec<String> {
        let mut groups: Vec<String> = self.shared.loaded.borrow().iter().cloned().collect();
        groups.sort();
        groups
    }

    /// The deferred object owning this proxy's raw data.
    #[must_use]
    pub fn defer(&self) -> &DeferredObject<T> {
        &self.shared.defer
    }

    /// The dispatch plan this proxy was built against.
    #[must_use]
    pub fn plan(&self) -> &ProxyPlan {
        &self.shared.plan
    }
}

impl<T: Deferrable> Clone for Proxy<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: Deferrable> fmt::Debug for Proxy<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proxy")
            .field("type", &self.shared.plan.type_name())
            .field("loaded", &self.loaded_groups())
            .finish()
    }
}
