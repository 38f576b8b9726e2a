//! Service registry collaborator
//!
//! The engine never owns services; `RegistryGet` and `TaggedGet` nodes ask a
//! [`Registry`] for them. [`ServiceRegistry`] is the in-memory implementation
//! used by the [`Container`](crate::container::Container) facade.

use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tracing::{debug, trace, warn};

use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::lazy::resolve_value;
use crate::settings::Scope;
use crate::value::Value;

/// Errors raised by a registry
#[derive(Error, Debug)]
pub enum RegistryError {
    /// No entry under this key
    #[error("Service not found: {key}")]
    NotFound { key: String },

    /// The entry exists but producing its value failed
    #[error("Service {key} could not be resolved")]
    Resolution {
        key: String,
        #[source]
        source: Box<DiError>,
    },

    /// Any other registry-specific failure
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Keyed service lookup
pub trait Registry: Send + Sync {
    fn has(&self, key: &str) -> bool;

    /// Value registered under `key`
    fn get(&self, key: &str, ctx: &ResolutionContext<'_>) -> Result<Value, RegistryError>;

    /// Values of every entry tagged `tag`, in registration order
    fn get_by_tag(
        &self,
        tag: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Vec<Value>, RegistryError>;
}

/// Registry with no entries
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyRegistry;

impl Registry for EmptyRegistry {
    fn has(&self, _key: &str) -> bool {
        false
    }

    fn get(&self, key: &str, _ctx: &ResolutionContext<'_>) -> Result<Value, RegistryError> {
        Err(RegistryError::NotFound {
            key: key.to_string(),
        })
    }

    fn get_by_tag(
        &self,
        _tag: &str,
        _ctx: &ResolutionContext<'_>,
    ) -> Result<Vec<Value>, RegistryError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone)]
struct ServiceEntry {
    definition: Value,
    tags: Vec<String>,
    scope: Scope,
}

/// In-memory registry of service definitions
///
/// A definition is any [`Value`]; lazy definitions are resolved on first
/// `get` through the requesting context. Shared entries keep the first
/// resolved value, unique entries are resolved again on every `get`.
#[derive(Debug, Default)]
pub struct ServiceRegistry {
    entries: RwLock<IndexMap<String, ServiceEntry>>,
    instances: Mutex<FxHashMap<String, Value>>,
    locked: AtomicBool,
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a shared service
    pub fn set(&self, key: &str, definition: impl Into<Value>) -> DiResult<()> {
        self.define(key, definition.into(), Scope::Shared)
    }

    /// Register a service that is resolved anew on every lookup
    pub fn set_unique(&self, key: &str, definition: impl Into<Value>) -> DiResult<()> {
        self.define(key, definition.into(), Scope::Unique)
    }

    pub fn define(&self, key: &str, definition: Value, scope: Scope) -> DiResult<()> {
        self.ensure_open()?;
        if key.is_empty() {
            return Err(DiError::invalid_directive("<registry>", "service key is empty"));
        }

        let mut entries = self.entries.write();
        let tags = match entries.shift_remove(key) {
            Some(previous) => {
                warn!("Service {} redefined", key);
                previous.tags
            }
            None => Vec::new(),
        };
        entries.insert(
            key.to_string(),
            ServiceEntry {
                definition,
                tags,
                scope,
            },
        );
        self.instances.lock().remove(key);
        trace!("Defined service {} ({})", key, scope);
        Ok(())
    }

    /// Attach a tag to an existing service
    pub fn tag(&self, key: &str, tag: &str) -> DiResult<()> {
        self.ensure_open()?;
        let mut entries = self.entries.write();
        let entry = entries.get_mut(key).ok_or_else(|| {
            DiError::invalid_directive("<registry>", format!("cannot tag unknown service {key}"))
        })?;
        if !entry.tags.iter().any(|t| t == tag) {
            entry.tags.push(tag.to_string());
        }
        Ok(())
    }

    /// Reject further definitions and lock every lazy node they hold
    pub fn lock(&self) {
        if self.locked.swap(true, Ordering::AcqRel) {
            return;
        }
        let entries = self.entries.read();
        let mut seen = FxHashSet::default();
        for entry in entries.values() {
            entry.definition.lock_lazies(&mut seen);
        }
        debug!("Service registry locked with {} entries", entries.len());
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Keys in registration order
    pub fn keys(&self) -> Vec<String> {
        self.entries.read().keys().cloned().collect()
    }

    /// Whether a shared entry has already been materialized
    pub fn instantiated(&self, key: &str) -> bool {
        self.instances.lock().contains_key(key)
    }

    fn ensure_open(&self) -> DiResult<()> {
        if self.is_locked() {
            return Err(DiError::Locked {
                target: "service registry",
            });
        }
        Ok(())
    }
}

impl Registry for ServiceRegistry {
    fn has(&self, key: &str) -> bool {
        self.entries.read().contains_key(key)
    }

    fn get(&self, key: &str, ctx: &ResolutionContext<'_>) -> Result<Value, RegistryError> {
        let entry = self
            .entries
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound {
                key: key.to_string(),
            })?;

        if entry.scope == Scope::Shared {
            if let Some(hit) = self.instances.lock().get(key) {
                trace!("Service {} served from cache", key);
                return Ok(hit.clone());
            }
        }

        let resolution_error = |source: DiError| RegistryError::Resolution {
            key: key.to_string(),
            source: Box::new(source),
        };
        let _guard = ctx.enter(&format!("@{key}")).map_err(resolution_error)?;
        let value = resolve_value(&entry.definition, ctx).map_err(resolution_error)?;

        if entry.scope == Scope::Unique {
            return Ok(value);
        }
        debug!("Materialized service {}", key);
        Ok(self
            .instances
            .lock()
            .entry(key.to_string())
            .or_insert(value)
            .clone())
    }

    fn get_by_tag(
        &self,
        tag: &str,
        ctx: &ResolutionContext<'_>,
    ) -> Result<Vec<Value>, RegistryError> {
        let keys: Vec<String> = self
            .entries
            .read()
            .iter()
            .filter(|(_, entry)| entry.tags.iter().any(|t| t == tag))
            .map(|(key, _)| key.clone())
            .collect();
        keys.iter().map(|key| self.get(key, ctx)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::{LazyKind, LazyValue};
    use crate::lock::{Configuration, Frozen};
    use crate::value::Callable;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    fn counter_service(calls: Arc<AtomicUsize>) -> Value {
        let callable = Callable::new("next", move |_| {
            Ok(Value::Int(calls.fetch_add(1, Ordering::SeqCst) as i64))
        });
        Value::from(LazyValue::invoke(callable, vec![]))
    }

    #[test]
    fn test_shared_entry_resolved_once() {
        let frozen = Frozen::compile(Configuration::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ServiceRegistry::new();
        registry.set("counter", counter_service(calls.clone())).unwrap();

        let ctx = ResolutionContext::new(&frozen, &registry);
        assert!(!registry.instantiated("counter"));
        assert_eq!(registry.get("counter", &ctx).unwrap(), Value::Int(0));
        assert_eq!(registry.get("counter", &ctx).unwrap(), Value::Int(0));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(registry.instantiated("counter"));
    }

    #[test]
    fn test_unique_entry_resolved_every_time() {
        let frozen = Frozen::compile(Configuration::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let registry = ServiceRegistry::new();
        registry.set_unique("counter", counter_service(calls.clone())).unwrap();

        let ctx = ResolutionContext::new(&frozen, &registry);
        assert_eq!(registry.get("counter", &ctx).unwrap(), Value::Int(0));
        assert_eq!(registry.get("counter", &ctx).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_tags_in_registration_order() {
        let frozen = Frozen::compile(Configuration::default());
        let registry = ServiceRegistry::new();
        registry.set("b", "second").unwrap();
        registry.set("a", "first").unwrap();
        registry.set("c", "untagged").unwrap();
        registry.tag("b", "plugin").unwrap();
        registry.tag("a", "plugin").unwrap();

        let ctx = ResolutionContext::new(&frozen, &registry);
        let plugins = registry.get_by_tag("plugin", &ctx).unwrap();
        assert_eq!(plugins, vec![Value::from("second"), Value::from("first")]);
        assert!(registry.get_by_tag("missing", &ctx).unwrap().is_empty());
    }

    #[test]
    fn test_locked_registry_rejects_changes() {
        let registry = ServiceRegistry::new();
        registry.set("a", 1).unwrap();
        registry.lock();

        assert!(matches!(registry.set("b", 2), Err(DiError::Locked { .. })));
        assert!(matches!(registry.tag("a", "t"), Err(DiError::Locked { .. })));
        assert_eq!(registry.keys(), vec!["a"]);
    }

    #[test]
    fn test_lock_freezes_lazy_definitions() {
        let node = Arc::new(LazyValue::registry_get("target"));
        let nested = Arc::new(LazyValue::literal("inner"));
        let registry = ServiceRegistry::new();
        registry.set("svc", Value::Lazy(Arc::clone(&node))).unwrap();
        registry
            .set("list", Value::List(vec![Value::Lazy(Arc::clone(&nested))]))
            .unwrap();
        assert!(node.replace(LazyKind::Literal(Value::from("early"))).is_ok());

        registry.lock();
        assert!(node.is_locked());
        assert!(nested.is_locked());
        assert!(matches!(
            node.replace(LazyKind::Literal(Value::from("tampered"))),
            Err(DiError::Locked { .. })
        ));

        let frozen = Frozen::compile(Configuration::default());
        let ctx = ResolutionContext::new(&frozen, &registry);
        assert_eq!(registry.get("svc", &ctx).unwrap(), Value::from("early"));
    }

    #[test]
    fn test_self_referencing_service_is_a_cycle() {
        let frozen = Frozen::compile(Configuration::default());
        let registry = ServiceRegistry::new();
        registry
            .set("loop", LazyValue::registry_get("loop"))
            .unwrap();

        let ctx = ResolutionContext::new(&frozen, &registry);
        let err = registry.get("loop", &ctx).unwrap_err();
        // the outer lookup fails because the inner one hit the trail
        match err {
            RegistryError::Resolution { key, source } => {
                assert_eq!(key, "loop");
                match *source {
                    DiError::Delegation {
                        source: RegistryError::Resolution { source, .. },
                        ..
                    } => {
                        assert!(matches!(*source, DiError::CyclicDependency { .. }));
                    }
                    other => panic!("unexpected inner error: {other}"),
                }
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!registry.instantiated("loop"));
    }

    #[test]
    fn test_empty_registry() {
        let frozen = Frozen::compile(Configuration::default());
        let ctx = ResolutionContext::new(&frozen, &EmptyRegistry);
        assert!(!EmptyRegistry.has("x"));
        assert!(matches!(
            EmptyRegistry.get("x", &ctx),
            Err(RegistryError::NotFound { .. })
        ));
    }
}
