use serde::{Deserialize, Serialize};
use std::env;
use std::fs::{self, OpenOptions};
use std::path::PathBuf;

use crate::error::{DeferError, DeferResult};

/// Default prefix for synthesized proxy plans.
pub const DEFAULT_PREFIX: &str = "__defer__";

/// Configuration for constructing deferred objects and their proxies.
///
/// The prefix namespaces synthesized plan artifacts so several independent
/// integrations can share one cache directory. Development mode forces plan
/// synthesis on every request instead of reusing cached artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeferConfig {
    pub prefix: String,
    pub cache_dir: PathBuf,
    pub development_mode: bool,
}

impl Default for DeferConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            cache_dir: env::temp_dir(),
            development_mode: false,
        }
    }
}

impl DeferConfig {
    #[must_use]
    pub fn new(prefix: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            prefix: prefix.into(),
            cache_dir: cache_dir.into(),
            development_mode: false,
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, cache_dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = cache_dir.into();
        self
    }

    #[must_use]
    pub fn with_development_mode(mut self, development_mode: bool) -> Self {
        self.development_mode = development_mode;
        self
    }

    /// Validates the prefix syntax and the cache directory.
    ///
    /// The prefix must be a non-empty namespace segment with no leading or
    /// trailing separator. The cache directory must exist and be writable,
    /// verified with a probe file that is removed afterwards.
    pub fn validate(&self) -> DeferResult<()> {
        if self.prefix.is_empty() {
            return Err(DeferError::config("the plan prefix must not be empty"));
        }
        if self.prefix.starts_with(':') {
            return Err(DeferError::config(format!(
                "the plan prefix ({}) must not start with a separator",
                self.prefix
            )));
        }
        if self.prefix.ends_with(':') {
            return Err(DeferError::config(format!(
                "the plan prefix ({}) must not end with a separator",
                self.prefix
            )));
        }
        if !self.cache_dir.is_dir() {
            return Err(DeferError::config(format!(
                "the cache directory ({}) does not exist",
                self.cache_dir.display()
            )));
        }
        let probe = self
            .cache_dir
            .join(format!(".defer-probe-{}", std::process::id()));
        match OpenOptions::new().write(true).create(true).open(&probe) {
            Ok(_) => {
                let _ = fs::remove_file(&probe);
                Ok(())
            }
            Err(_) => Err(DeferError::config(format!(
                "the cache directory ({}) is not writable",
                self.cache_dir.display()
            ))),
        }
    }
}
