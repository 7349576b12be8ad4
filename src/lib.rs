//! Lazy object materialization.
//!
//! A caller holds a lightweight [`Reference`] (an identifier plus a loader
//! handle) to an entity. The entity's full data is only fetched and injected
//! into an object instance when a consumer invokes a method that needs it:
//! a [`DeferredObject`] owns the raw field data and performs one-shot,
//! per-field injection, resolving nested references on the way, while a
//! [`Proxy`] wraps the target instance and triggers loading of exactly the
//! field group an intercepted method depends on before delegating to it.
//!
//! Interception is driven by a declarative [`FieldGroupMap`] (method name to
//! field-name list). The dispatch table synthesized from it, the
//! [`ProxyPlan`], is cached process-wide per (target type, prefix) pair by
//! the [`ProxyRegistry`] and persisted to a cache directory so later runs
//! skip synthesis entirely.

pub mod config;
pub mod deferrable;
pub mod deferred;
pub mod error;
pub mod proxy;
pub mod reference;
pub mod value;

pub use config::DeferConfig;
pub use deferrable::Deferrable;
pub use deferred::DeferredObject;
pub use error::{DeferError, DeferResult};
pub use proxy::{FieldGroupMap, Proxy, ProxyPlan, ProxyRegistry};
pub use reference::{Loader, LoaderHandle, Reference};
pub use value::{FieldValue, ResolvedValue};
