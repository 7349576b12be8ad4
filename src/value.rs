use serde_json::Value;
use std::fmt;

use crate::deferrable::Deferrable;
use crate::error::{DeferError, DeferResult};
use crate::proxy::Proxy;
use crate::reference::Reference;

/// Raw field data held by a deferred object before injection.
///
/// Sequences may nest arbitrarily; every [`Reference`] inside them is
/// replaced in place during resolution while scalars pass through untouched.
pub enum FieldValue<T: Deferrable> {
    Scalar(Value),
    Reference(Reference<T>),
    List(Vec<FieldValue<T>>),
}

impl<T: Deferrable> FieldValue<T> {
    #[must_use]
    pub fn scalar(value: impl Into<Value>) -> Self {
        FieldValue::Scalar(value.into())
    }

    #[must_use]
    pub fn reference(reference: Reference<T>) -> Self {
        FieldValue::Reference(reference)
    }

    #[must_use]
    pub fn list(items: Vec<FieldValue<T>>) -> Self {
        FieldValue::List(items)
    }

    /// Resolves the raw value into an injectable one.
    ///
    /// References are resolved through their loaders, lists are walked
    /// recursively preserving element order, and scalars are cloned as-is.
    /// The first loader failure aborts the walk and propagates unchanged.
    pub fn resolve(&self) -> DeferResult<ResolvedValue<T>> {
        match self {
            FieldValue::Scalar(value) => Ok(ResolvedValue::Scalar(value.clone())),
            FieldValue::Reference(reference) => Ok(ResolvedValue::Entity(reference.resolve()?)),
            FieldValue::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(item.resolve()?);
                }
                Ok(ResolvedValue::List(resolved))
            }
        }
    }
}

impl<T: Deferrable> Clone for FieldValue<T> {
    fn clone(&self) -> Self {
        match self {
            FieldValue::Scalar(value) => FieldValue::Scalar(value.clone()),
            FieldValue::Reference(reference) => FieldValue::Reference(reference.clone()),
            FieldValue::List(items) => FieldValue::List(items.clone()),
        }
    }
}

impl<T: Deferrable> fmt::Debug for FieldValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            FieldValue::Reference(reference) => {
                f.debug_tuple("Reference").field(reference).finish()
            }
            FieldValue::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

/// A field value after reference resolution, ready for injection.
pub enum ResolvedValue<T: Deferrable> {
    Scalar(Value),
    Entity(Proxy<T>),
    List(Vec<ResolvedValue<T>>),
}

impl<T: Deferrable> ResolvedValue<T> {
    /// The shape of the value, for diagnostics.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            ResolvedValue::Scalar(_) => "a scalar",
            ResolvedValue::Entity(_) => "an entity",
            ResolvedValue::List(_) => "a list",
        }
    }

    /// Unwraps a scalar, or fails with a data mismatch for `field`.
    pub fn expect_scalar(self, field: &str) -> DeferResult<Value> {
        match self {
            ResolvedValue::Scalar(value) => Ok(value),
            other => Err(DeferError::data_mismatch(
                field,
                format!("expected a scalar value, got {}", other.kind()),
            )),
        }
    }

    /// Unwraps a resolved entity, or fails with a data mismatch for `field`.
    pub fn expect_entity(self, field: &str) -> DeferResult<Proxy<T>> {
        match self {
            ResolvedValue::Entity(proxy) => Ok(proxy),
            other => Err(DeferError::data_mismatch(
                field,
                format!("expected an entity, got {}", other.kind()),
            )),
        }
    }

    /// Unwraps a list, or fails with a data mismatch for `field`.
    pub fn expect_list(self, field: &str) -> DeferResult<Vec<ResolvedValue<T>>> {
        match self {
            ResolvedValue::List(items) => Ok(items),
            other => Err(DeferError::data_mismatch(
                field,
                format!("expected a list, got {}", other.kind()),
            )),
        }
    }
}

impl<T: Deferrable> Clone for ResolvedValue<T> {
    fn clone(&self) -> Self {
        match self {
            ResolvedValue::Scalar(value) => ResolvedValue::Scalar(value.clone()),
            ResolvedValue::Entity(proxy) => ResolvedValue::Entity(proxy.clone()),
            ResolvedValue::List(items) => ResolvedValue::List(items.clone()),
        }
    }
}

impl<T: Deferrable> fmt::Debug for ResolvedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResolvedValue::Scalar(value) => f.debug_tuple("Scalar").field(value).finish(),
            ResolvedValue::Entity(proxy) => f.debug_tuple("Entity").field(proxy).finish(),
            ResolvedValue::List(items) => f.debug_tuple("List").field(items).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeferConfig;
    use crate::deferred::DeferredObject;
    use crate::proxy::FieldGroupMap;
    use crate::reference::{Loader, LoaderHandle};
    use serde_json::json;
    use std::collections::HashMap;
    use std::fmt;
    use std::rc::Rc;
    use tempfile::tempdir;

    #[derive(Debug)]
    struct Num {
        value: Option<i64>,
    }

    impl Deferrable for Num {
        fn methods() -> &'static [&'static str] {
            &["value"]
        }

        fn field_groups() -> FieldGroupMap {
            FieldGroupMap::new().with_group("value", &["value"])
        }

        fn import(_defer: &DeferredObject<Self>) -> DeferResult<Self> {
            Ok(Self { value: None })
        }

        fn field_is_set(&self, field: &str) -> DeferResult<bool> {
            match field {
                "value" => Ok(self.value.is_some()),
                other => Err(DeferError::data_mismatch(other, "unknown field")),
            }
        }

        fn inject_field(&mut self, field: &str, value: ResolvedValue<Self>) -> DeferResult<()> {
            match field {
                "value" => {
                    self.value = value.expect_scalar(field)?.as_i64();
                    Ok(())
                }
                other => Err(DeferError::data_mismatch(other, "unknown field")),
            }
        }
    }

    struct NumLoader {
        config: DeferConfig,
    }

    impl Loader<Num> for NumLoader {
        fn load(&self, identifier: &Value) -> DeferResult<Proxy<Num>> {
            let mut data = HashMap::new();
            data.insert("value".to_string(), FieldValue::scalar(identifier.clone()));
            DeferredObject::defer(data, self.config.clone())
        }
    }

    #[derive(Debug)]
    struct Unreachable;

    impl fmt::Display for Unreachable {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "identifier is unreachable")
        }
    }

    impl std::error::Error for Unreachable {}

    struct FailingLoader;

    impl Loader<Num> for FailingLoader {
        fn load(&self, _identifier: &Value) -> DeferResult<Proxy<Num>> {
            Err(DeferError::resolution(Unreachable))
        }
    }

    fn num_loader(prefix: &str, dir: &std::path::Path) -> LoaderHandle<Num> {
        Rc::new(NumLoader {
            config: DeferConfig::new(prefix, dir),
        })
    }

    fn entity_value(resolved: &ResolvedValue<Num>) -> i64 {
        match resolved {
            ResolvedValue::Entity(proxy) => proxy
                .invoke("value", |num| num.value)
                .expect("value group should load")
                .expect("value should be injected"),
            other => panic!("expected an entity, got {}", other.kind()),
        }
    }

    #[test]
    fn scalars_resolve_untouched() {
        let raw = FieldValue::<Num>::scalar(json!({"nested": [1, 2, 3]}));
        match raw.resolve().unwrap() {
            ResolvedValue::Scalar(value) => assert_eq!(value, json!({"nested": [1, 2, 3]})),
            other => panic!("expected a scalar, got {}", other.kind()),
        }
    }

    #[test]
    fn lists_resolve_references_in_place_preserving_order() {
        let dir = tempdir().unwrap();
        let loader = num_loader("__value_list__", dir.path());

        let raw = FieldValue::list(vec![
            FieldValue::scalar(10),
            FieldValue::reference(Reference::new(Rc::clone(&loader), 7)),
            FieldValue::scalar("keep"),
        ]);

        let items = match raw.resolve().unwrap() {
            ResolvedValue::List(items) => items,
            other => panic!("expected a list, got {}", other.kind()),
        };
        assert_eq!(items.len(), 3);
        assert!(matches!(&items[0], ResolvedValue::Scalar(v) if *v == json!(10)));
        assert_eq!(entity_value(&items[1]), 7);
        assert!(matches!(&items[2], ResolvedValue::Scalar(v) if *v == json!("keep")));
    }

    #[test]
    fn nested_lists_resolve_recursively() {
        let dir = tempdir().unwrap();
        let loader = num_loader("__value_nested__", dir.path());

        let raw = FieldValue::list(vec![
            FieldValue::list(vec![
                FieldValue::reference(Reference::new(Rc::clone(&loader), 1)),
                FieldValue::scalar(2),
            ]),
            FieldValue::scalar(3),
        ]);

        let items = match raw.resolve().unwrap() {
            ResolvedValue::List(items) => items,
            other => panic!("expected a list, got {}", other.kind()),
        };
        let inner = match &items[0] {
            ResolvedValue::List(inner) => inner,
            other => panic!("expected a nested list, got {}", other.kind()),
        };
        assert_eq!(entity_value(&inner[0]), 1);
        assert!(matches!(&inner[1], ResolvedValue::Scalar(v) if *v == json!(2)));
        assert!(matches!(&items[1], ResolvedValue::Scalar(v) if *v == json!(3)));
    }

    #[test]
    fn loader_failures_propagate_unchanged() {
        let loader: LoaderHandle<Num> = Rc::new(FailingLoader);
        let raw = FieldValue::reference(Reference::new(loader, 42));
        let err = raw.resolve().unwrap_err();
        assert!(matches!(err, DeferError::Resolution(_)));
    }
}
