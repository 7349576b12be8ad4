use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Declarative mapping from an intercepted method name to the ordered list
/// of fields that method requires before it may execute.
///
/// Absence of an entry means "do not intercept this method".
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldGroupMap {
    groups: BTreeMap<String, Vec<String>>,
}

impl FieldGroupMap {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_group(mut self, method: impl Into<String>, fields: &[&str]) -> Self {
        self.insert(method, fields);
        self
    }

    pub fn insert(&mut self, method: impl Into<String>, fields: &[&str]) {
        self.groups.insert(
            method.into(),
            fields.iter().map(|field| (*field).to_string()).collect(),
        );
    }

    #[must_use]
    pub fn group(&self, method: &str) -> Option<&[String]> {
        self.groups.get(method).map(|fields| fields.as_slice())
    }

    #[must_use]
    pub fn contains(&self, method: &str) -> bool {
        self.groups.contains_key(method)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.groups.iter()
    }
}

/// The synthesized dispatch table for one (target type, prefix) pair.
///
/// A plan records which methods are intercepted and which field group each
/// one loads. Plans are persisted to the cache directory as JSON artifacts
/// and reused until explicitly invalidated, except in development mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyPlan {
    type_name: String,
    prefix: String,
    methods: BTreeMap<String, Vec<String>>,
    built_at: DateTime<Utc>,
}

impl ProxyPlan {
    /// Builds a plan by intersecting the type's instance methods with the
    /// declarative group map. Map entries naming unknown methods are
    /// ignored; methods without a map entry are not intercepted.
    #[must_use]
    pub fn synthesize(
        type_name: &str,
        prefix: &str,
        methods: &[&str],
        groups: &FieldGroupMap,
    ) -> Self {
        let mut intercepted = BTreeMap::new();
        for method in methods {
            if let Some(fields) = groups.group(method) {
                intercepted.insert((*method).to_string(), fields.to_vec());
            }
        }
        Self {
            type_name: type_name.to_string(),
            prefix: prefix.to_string(),
            methods: intercepted,
            built_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The field group an intercepted method loads, if any.
    #[must_use]
    pub fn group_for(&self, method: &str) -> Option<&[String]> {
        self.methods.get(method).map(|fields| fields.as_slice())
    }

    #[must_use]
    pub fn is_intercepted(&self, method: &str) -> bool {
        self.methods.contains_key(method)
    }

    #[must_use]
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }

    #[must_use]
    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    /// Deterministic, collision-free artifact file name for a (type, prefix)
    /// pair. Namespace and path separators are normalized to `-`.
    #[must_use]
    pub fn artifact_file_name(type_name: &str, prefix: &str) -> String {
        format!("{}-{}.json", sanitize(prefix), sanitize(type_name))
    }

    #[must_use]
    pub fn artifact_name(&self) -> String {
        Self::artifact_file_name(&self.type_name, &self.prefix)
    }
}

fn sanitize(segment: &str) -> String {
    segment.replace("::", "-").replace('/', "-").replace('\\', "-")
}
