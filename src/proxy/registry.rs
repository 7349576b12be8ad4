use log::{debug, info, warn};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use super::plan::ProxyPlan;
use crate::config::DeferConfig;
use crate::deferrable::Deferrable;
use crate::error::{DeferError, DeferResult};

static GLOBAL: Lazy<ProxyRegistry> = Lazy::new(ProxyRegistry::new);

/// Process-wide cache of synthesized proxy plans, keyed by
/// (target type name, prefix).
///
/// Lifecycle: initialized empty, populated on demand, persisted to the cache
/// directory as one JSON artifact per pair, cleared only by explicit
/// invalidation or process restart. The registry mutex serializes concurrent
/// builders for the same pair, and artifact writes go through a temp file
/// plus atomic rename.
pub struct ProxyRegistry {
    plans: Mutex<HashMap<(String, String), Arc<ProxyPlan>>>,
    syntheses: AtomicUsize,
}

impl ProxyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            plans: Mutex::new(HashMap::new()),
            syntheses: AtomicUsize::new(0),
        }
    }

    /// The process-wide registry used by [`DeferredObject::into_proxy`].
    ///
    /// [`DeferredObject::into_proxy`]: crate::deferred::DeferredObject::into_proxy
    pub fn global() -> &'static ProxyRegistry {
        &GLOBAL
    }

    /// Returns the plan for `(T, config.prefix)`, building it at most once.
    ///
    /// Resolution order: in-memory cache, then the persisted artifact, then
    /// synthesis from the type's method list and field group map. In
    /// development mode both caches are bypassed and the plan is
    /// re-synthesized on every request.
    pub fn get_or_build<T: Deferrable>(&self, config: &DeferConfig) -> DeferResult<Arc<ProxyPlan>> {
        let type_name = T::type_name();
        let key = (type_name.clone(), config.prefix.clone());
        let mut plans = self
            .plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if !config.development_mode {
            if let Some(plan) = plans.get(&key) {
                debug!(
                    "Proxy plan cache hit for '{}' (prefix '{}')",
                    key.0, key.1
                );
                return Ok(Arc::clone(plan));
            }

            let path = artifact_path(config, &type_name);
            if path.exists() {
                match read_artifact(&path) {
                    Ok(plan) => {
                        if plan.type_name() != type_name || plan.prefix() != config.prefix {
                            return Err(DeferError::config(format!(
                                "artifact {} was built for '{}' with prefix '{}', not '{}' with prefix '{}'",
                                path.display(),
                                plan.type_name(),
                                plan.prefix(),
                                type_name,
                                config.prefix
                            )));
                        }
                        debug!("Loaded proxy plan artifact {}", path.display());
                        let plan = Arc::new(plan);
                        plans.insert(key, Arc::clone(&plan));
                        return Ok(plan);
                    }
                    Err(err) => {
                        warn!(
                            "Discarding unreadable proxy plan artifact {}: {}",
                            path.display(),
                            err
                        );
                    }
                }
            }
        }

        let plan = Arc::new(ProxyPlan::synthesize(
            &type_name,
            &config.prefix,
            T::methods(),
            &T::field_groups(),
        ));
        self.syntheses.fetch_add(1, Ordering::SeqCst);
        info!(
            "Synthesized proxy plan for '{}' with prefix '{}' ({} intercepted method(s))",
            type_name,
            config.prefix,
            plan.method_count()
        );
        write_artifact(config, &plan)?;
        plans.insert(key, Arc::clone(&plan));
        Ok(plan)
    }

    /// Number of plan syntheses this registry has performed.
    #[must_use]
    pub fn synthesis_count(&self) -> usize {
        self.syntheses.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops the cached plan for `(type_name, config.prefix)` from memory
    /// and deletes its persisted artifact. Returns whether anything was
    /// removed.
    pub fn invalidate(&self, config: &DeferConfig, type_name: &str) -> DeferResult<bool> {
        let key = (type_name.to_string(), config.prefix.clone());
        let removed_memory = self
            .plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&key)
            .is_some();

        let path = artifact_path(config, type_name);
        let removed_artifact = if path.exists() {
            fs::remove_file(&path)?;
            true
        } else {
            false
        };

        Ok(removed_memory || removed_artifact)
    }

    /// Drops every cached plan from memory. Persisted artifacts are left in
    /// place.
    pub fn clear(&self) {
        self.plans
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for ProxyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn artifact_path(config: &DeferConfig, type_name: &str) -> PathBuf {
    config
        .cache_dir
        .join(ProxyPlan::artifact_file_name(type_name, &config.prefix))
}

fn read_artifact(path: &Path) -> DeferResult<ProxyPlan> {
    let bytes = fs::read(path)?;
    let plan = serde_json::from_slice(&bytes)?;
    Ok(plan)
}

fn write_artifact(config: &DeferConfig, plan: &ProxyPlan) -> DeferResult<()> {
    let path = artifact_path(config, plan.type_name());
    let tmp = config.cache_dir.join(format!(
        ".{}.{}.tmp",
        plan.artifact_name(),
        std::process::id()
    ));
    fs::write(&tmp, serde_json::to_vec_pretty(plan)?)?;
    fs::rename(&tmp, &path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deferred::DeferredObject;
    use crate::error::DeferError;
    use crate::proxy::FieldGroupMap;
    use crate::value::ResolvedValue;
    use tempfile::tempdir;

    #[derive(Debug, Default)]
    struct Widget {
        name: Option<String>,
    }

    impl Deferrable for Widget {
        fn methods() -> &'static [&'static str] {
            &["get_name", "resize"]
        }

        fn field_groups() -> FieldGroupMap {
            FieldGroupMap::new().with_group("get_name", &["name"])
        }

        fn import(_defer: &DeferredObject<Self>) -> crate::error::DeferResult<Self> {
            Ok(Self::default())
        }

        fn field_is_set(&self, field: &str) -> crate::error::DeferResult<bool> {
            match field {
                "name" => Ok(self.name.is_some()),
                other => Err(DeferError::data_mismatch(other, "unknown field")),
            }
        }

        fn inject_field(
            &mut self,
            field: &str,
            value: ResolvedValue<Self>,
        ) -> crate::error::DeferResult<()> {
            match field {
                "name" => {
                    self.name = value.expect_scalar(field)?.as_str().map(String::from);
                    Ok(())
                }
                other => Err(DeferError::data_mismatch(other, "unknown field")),
            }
        }
    }

    #[test]
    fn builds_once_then_reuses_the_cached_plan() {
        let dir = tempdir().unwrap();
        let config = DeferConfig::new("__reg__", dir.path());
        let registry = ProxyRegistry::new();

        let first = registry.get_or_build::<Widget>(&config).unwrap();
        let second = registry.get_or_build::<Widget>(&config).unwrap();

        assert_eq!(registry.synthesis_count(), 1);
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.is_intercepted("get_name"));
        assert!(!first.is_intercepted("resize"));
    }

    #[test]
    fn a_fresh_registry_reuses_the_persisted_artifact() {
        let dir = tempdir().unwrap();
        let config = DeferConfig::new("__reg__", dir.path());

        let builder = ProxyRegistry::new();
        builder.get_or_build::<Widget>(&config).unwrap();
        assert_eq!(builder.synthesis_count(), 1);

        let reader = ProxyRegistry::new();
        let plan = reader.get_or_build::<Widget>(&config).unwrap();
        assert_eq!(reader.synthesis_count(), 0);
        assert!(plan.is_intercepted("get_name"));
    }

    #[test]
    fn development_mode_resynthesizes_every_request() {
        let dir = tempdir().unwrap();
        let config = DeferConfig::new("__reg__", dir.path()).with_development_mode(true);
        let registry = ProxyRegistry::new();

        registry.get_or_build::<Widget>(&config).unwrap();
        registry.get_or_build::<Widget>(&config).unwrap();
        assert_eq!(registry.synthesis_count(), 2);
    }

    #[test]
    fn mismatched_artifact_is_a_configuration_error() {
        let dir = tempdir().unwrap();
        let config = DeferConfig::new("__reg__", dir.path());

        let alien = ProxyPlan::synthesize("other::Thing", "__reg__", &[], &FieldGroupMap::new());
        let path = dir
            .path()
            .join(ProxyPlan::artifact_file_name(&Widget::type_name(), "__reg__"));
        fs::write(&path, serde_json::to_vec(&alien).unwrap()).unwrap();

        let registry = ProxyRegistry::new();
        let err = registry.get_or_build::<Widget>(&config).unwrap_err();
        assert!(matches!(err, DeferError::Config { .. }));
    }

    #[test]
    fn unreadable_artifact_is_resynthesized() {
        let dir = tempdir().unwrap();
        let config = DeferConfig::new("__reg__", dir.path());

        let path = dir
            .path()
            .join(ProxyPlan::artifact_file_name(&Widget::type_name(), "__reg__"));
        fs::write(&path, b"not json").unwrap();

        let registry = ProxyRegistry::new();
        let plan = registry.get_or_build::<Widget>(&config).unwrap();
        assert_eq!(registry.synthesis_count(), 1);
        assert!(plan.is_intercepted("get_name"));
    }

    #[test]
    fn invalidate_removes_the_plan_and_its_artifact() {
        let dir = tempdir().unwrap();
        let config = DeferConfig::new("__reg__", dir.path());
        let registry = ProxyRegistry::new();

        registry.get_or_build::<Widget>(&config).unwrap();
        let path = dir
            .path()
            .join(ProxyPlan::artifact_file_name(&Widget::type_name(), "__reg__"));
        assert!(path.exists());

        assert!(registry.invalidate(&config, &Widget::type_name()).unwrap());
        assert!(!path.exists());
        assert!(registry.is_empty());

        registry.get_or_build::<Widget>(&config).unwrap();
        assert_eq!(registry.synthesis_count(), 2);
    }
}
