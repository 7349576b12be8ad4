use serde_json::Value;
use std::fmt;
use std::rc::Rc;

use crate::deferrable::Deferrable;
use crate::error::DeferResult;
use crate::proxy::Proxy;

/// Capability for resolving an opaque identifier into a materialized entity.
///
/// Implementations typically fetch raw field data for the identifier from an
/// external source, then wrap it in a deferred object so related entities
/// stay unresolved until a consumer touches them.
pub trait Loader<T: Deferrable> {
    fn load(&self, identifier: &Value) -> DeferResult<Proxy<T>>;
}

/// Shared handle to a loader, embeddable in references and field data.
pub type LoaderHandle<T> = Rc<dyn Loader<T>>;

/// An identifier paired with the loader that can resolve it.
///
/// A reference is a lookup key, never an owning pointer: it may be embedded
/// in field values and sequences without implying ownership of the entity it
/// points to. It is immutable after construction and does not memoize:
/// every [`resolve`](Reference::resolve) call re-invokes the loader.
pub struct Reference<T: Deferrable> {
    identifier: Value,
    loader: LoaderHandle<T>,
}

impl<T: Deferrable> Reference<T> {
    #[must_use]
    pub fn new(loader: LoaderHandle<T>, identifier: impl Into<Value>) -> Self {
        Self {
            identifier: identifier.into(),
            loader,
        }
    }

    #[must_use]
    pub fn identifier(&self) -> &Value {
        &self.identifier
    }

    /// Resolves the reference through its loader.
    ///
    /// Loader failures propagate unchanged; there is no caching and no
    /// retry. Each call may perform arbitrary work in the loader.
    pub fn resolve(&self) -> DeferResult<Proxy<T>> {
        self.loader.load(&self.identifier)
    }
}

impl<T: Deferrable> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self {
            identifier: self.identifier.clone(),
            loader: Rc::clone(&self.loader),
        }
    }
}

impl<T: Deferrable> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("identifier", &self.identifier)
            .finish_non_exhaustive()
    }
}
