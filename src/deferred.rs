use log::debug;
use std::collections::HashMap;

use crate::config::DeferConfig;
use crate::deferrable::Deferrable;
use crate::error::DeferResult;
use crate::proxy::{Proxy, ProxyRegistry};
use crate::value::FieldValue;

/// Holder of raw, not-yet-injected field data for one entity.
///
/// A deferred object pairs the raw data with the target type and performs
/// one-shot, per-field injection into a live instance: a field whose current
/// value is already set is never overwritten by a later injection pass. The
/// target type itself is fixed at compile time through the `Deferrable`
/// bound, so injecting into an instance of the wrong type is unrepresentable.
///
/// Construction validates the configuration (prefix syntax, cache directory
/// existence and writability) and fails fast before any injection can occur.
pub struct DeferredObject<T: Deferrable> {
    data: HashMap<String, FieldValue<T>>,
    config: DeferConfig,
}

impl<T: Deferrable> std::fmt::Debug for DeferredObject<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredObject")
            .field("fields", &self.data.keys().collect::<Vec<_>>())
            .field("config", &self.config)
            .finish()
    }
}

impl<T: Deferrable> DeferredObject<T> {
    pub fn new(data: HashMap<String, FieldValue<T>>, config: DeferConfig) -> DeferResult<Self> {
        config.validate()?;
        Ok(Self { data, config })
    }

    /// One-shot constructor: validates, builds or fetches the proxy plan
    /// through the global registry, and wraps the data in a proxy.
    pub fn defer(data: HashMap<String, FieldValue<T>>, config: DeferConfig) -> DeferResult<Proxy<T>> {
        Self::new(data, config)?.into_proxy()
    }

    #[must_use]
    pub fn config(&self) -> &DeferConfig {
        &self.config
    }

    #[must_use]
    pub fn raw_fields(&self) -> &HashMap<String, FieldValue<T>> {
        &self.data
    }

    /// Constructs a fresh instance through the import hook and injects the
    /// requested fields into it.
    pub fn inject_data(&self, subset: Option<&[String]>) -> DeferResult<T> {
        let mut instance = T::import(self)?;
        self.inject_into(&mut instance, subset)?;
        Ok(instance)
    }

    /// Injects raw fields into an existing instance.
    ///
    /// For each raw field, skipped when `subset` excludes it: a field whose
    /// current value is already set is left alone, otherwise the raw value
    /// is resolved (references through their loaders, sequences walked
    /// recursively) and written through the privileged injection hook.
    ///
    /// The pass aborts on the first error; previously-written fields are
    /// not rolled back.
    pub fn inject_into(&self, instance: &mut T, subset: Option<&[String]>) -> DeferResult<()> {
        debug!(
            "Injecting into '{}' (subset: {:?})",
            T::type_name(),
            subset
        );
        for (field, raw) in &self.data {
            if let Some(fields) = subset {
                if !fields.iter().any(|f| f == field) {
                    continue;
                }
            }
            if instance.field_is_set(field)? {
                continue;
            }
            let resolved = raw.resolve()?;
            instance.inject_field(field, resolved)?;
        }
        Ok(())
    }

    /// Wraps this deferred object in a proxy, using the process-wide plan
    /// registry.
    pub fn into_proxy(self) -> DeferResult<Proxy<T>> {
        Proxy::new(self)
    }

    /// Wraps this deferred object in a proxy against an explicit registry.
    pub fn proxy_with(self, registry: &ProxyRegistry) -> DeferResult<Proxy<T>> {
        Proxy::with_registry(self, registry)
    }
}
