//! Per-type injection directives

use indexmap::IndexMap;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::trace;

use crate::error::{DiError, DiResult};
use crate::resolver::Arguments;
use crate::settings::Scope;
use crate::types::BuiltinType;
use crate::value::Value;

/// Explicit directives for one type
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InjectionSpec {
    /// Constructor arguments
    pub arguments: Arguments,
    /// Field assignments
    pub fields: IndexMap<String, Value>,
    /// Setter calls: method name to its argument list
    pub setters: IndexMap<String, Vec<Value>>,
}

impl InjectionSpec {
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty() && self.fields.is_empty() && self.setters.is_empty()
    }

    pub(crate) fn values(&self) -> impl Iterator<Item = &Value> {
        self.arguments
            .values()
            .chain(self.fields.values())
            .chain(self.setters.values().flatten())
    }
}

/// Mutable directive store for the configuring phase
#[derive(Debug, Default)]
pub struct InjectionSpecStore {
    specs: FxHashMap<String, InjectionSpec>,
    auto_bindings: IndexMap<String, Value>,
    scopes: FxHashMap<String, Scope>,
}

impl InjectionSpecStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_positional(
        &mut self,
        type_name: &str,
        position: usize,
        value: Value,
    ) -> DiResult<()> {
        self.spec_mut(type_name)?
            .arguments
            .positional
            .insert(position, value);
        trace!("{}: positional #{}", type_name, position);
        Ok(())
    }

    pub fn add_named(&mut self, type_name: &str, name: &str, value: Value) -> DiResult<()> {
        require_key(type_name, name, "parameter name")?;
        self.spec_mut(type_name)?
            .arguments
            .named
            .insert(name.to_string(), value);
        trace!("{}: named ${}", type_name, name);
        Ok(())
    }

    pub fn add_type_keyed(
        &mut self,
        type_name: &str,
        declared: &str,
        value: Value,
    ) -> DiResult<()> {
        require_class_name(type_name, declared)?;
        self.spec_mut(type_name)?
            .arguments
            .type_keyed
            .insert(declared.to_string(), value);
        trace!("{}: type-keyed {}", type_name, declared);
        Ok(())
    }

    pub fn add_field(&mut self, type_name: &str, field: &str, value: Value) -> DiResult<()> {
        require_key(type_name, field, "field name")?;
        self.spec_mut(type_name)?
            .fields
            .insert(field.to_string(), value);
        trace!("{}: field {}", type_name, field);
        Ok(())
    }

    /// Record a setter call; a later call for the same method replaces the earlier one
    pub fn add_setter(&mut self, type_name: &str, method: &str, args: Vec<Value>) -> DiResult<()> {
        require_key(type_name, method, "method name")?;
        self.spec_mut(type_name)?
            .setters
            .insert(method.to_string(), args);
        trace!("{}: setter {}", type_name, method);
        Ok(())
    }

    /// Register the canonical value for parameters declared as `declared`
    pub fn auto_bind(&mut self, declared: &str, value: Value) -> DiResult<()> {
        require_class_name(declared, declared)?;
        self.auto_bindings.insert(declared.to_string(), value);
        Ok(())
    }

    pub fn set_scope(&mut self, type_name: &str, scope: Scope) -> DiResult<()> {
        require_type(type_name)?;
        self.scopes.insert(type_name.to_string(), scope);
        Ok(())
    }

    pub fn spec(&self, type_name: &str) -> Option<&InjectionSpec> {
        self.specs.get(type_name)
    }

    /// Finish configuring
    pub fn freeze(self, default_scope: Scope) -> CompiledSpecs {
        CompiledSpecs {
            specs: self.specs,
            auto_bindings: self.auto_bindings,
            scopes: self.scopes,
            default_scope,
        }
    }

    fn spec_mut(&mut self, type_name: &str) -> DiResult<&mut InjectionSpec> {
        require_type(type_name)?;
        Ok(self.specs.entry(type_name.to_string()).or_default())
    }
}

fn require_type(type_name: &str) -> DiResult<()> {
    if type_name.is_empty() {
        return Err(DiError::invalid_directive("<anonymous>", "type name is empty"));
    }
    Ok(())
}

fn require_key(type_name: &str, key: &str, what: &str) -> DiResult<()> {
    if key.is_empty() {
        return Err(DiError::invalid_directive(type_name, format!("{what} is empty")));
    }
    Ok(())
}

fn require_class_name(type_name: &str, declared: &str) -> DiResult<()> {
    require_key(type_name, declared, "type key")?;
    if BuiltinType::from_name(declared).is_some() {
        return Err(DiError::invalid_directive(
            type_name,
            format!("{declared} is a built-in type and cannot be type-keyed"),
        ));
    }
    Ok(())
}

/// Frozen directives, shared by every resolution after lock
#[derive(Debug, Default)]
pub struct CompiledSpecs {
    specs: FxHashMap<String, InjectionSpec>,
    auto_bindings: IndexMap<String, Value>,
    scopes: FxHashMap<String, Scope>,
    default_scope: Scope,
}

impl CompiledSpecs {
    pub fn spec(&self, type_name: &str) -> Option<&InjectionSpec> {
        self.specs.get(type_name)
    }

    pub fn auto_bindings(&self) -> &IndexMap<String, Value> {
        &self.auto_bindings
    }

    pub fn scope(&self, type_name: &str) -> Scope {
        self.scopes
            .get(type_name)
            .copied()
            .unwrap_or(self.default_scope)
    }

    /// Lock every lazy node held by a directive or auto-binding
    pub(crate) fn lock_lazies(&self) {
        let mut seen = FxHashSet::default();
        for spec in self.specs.values() {
            spec.values().for_each(|v| v.lock_lazies(&mut seen));
        }
        self.auto_bindings
            .values()
            .for_each(|v| v.lock_lazies(&mut seen));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::LazyValue;

    #[test]
    fn test_directives_accumulate_per_type() {
        let mut store = InjectionSpecStore::new();
        store.add_positional("Widget", 0, Value::from("a")).unwrap();
        store.add_named("Widget", "name", Value::from("b")).unwrap();
        store.add_field("Widget", "color", Value::from("red")).unwrap();
        store
            .add_setter("Widget", "set_size", vec![Value::Int(3)])
            .unwrap();

        let spec = store.spec("Widget").unwrap();
        assert_eq!(spec.arguments.positional[&0], Value::from("a"));
        assert_eq!(spec.arguments.named["name"], Value::from("b"));
        assert_eq!(spec.fields["color"], Value::from("red"));
        assert_eq!(spec.setters["set_size"], vec![Value::Int(3)]);
        assert!(store.spec("Other").is_none());
    }

    #[test]
    fn test_setter_replaced_not_merged() {
        let mut store = InjectionSpecStore::new();
        store
            .add_setter("Widget", "configure", vec![Value::Int(1), Value::Int(2)])
            .unwrap();
        store
            .add_setter("Widget", "configure", vec![Value::Int(9)])
            .unwrap();

        assert_eq!(store.spec("Widget").unwrap().setters["configure"], vec![Value::Int(9)]);
    }

    #[test]
    fn test_invalid_directives() {
        let mut store = InjectionSpecStore::new();
        assert!(matches!(
            store.add_named("", "x", Value::Null),
            Err(DiError::InvalidDirective { .. })
        ));
        assert!(store.add_named("Widget", "", Value::Null).is_err());
        assert!(store.add_setter("Widget", "", vec![]).is_err());
        assert!(store.add_type_keyed("Widget", "int", Value::Int(1)).is_err());
        assert!(store.auto_bind("string", Value::Null).is_err());
        assert!(store.spec("Widget").is_none());
    }

    #[test]
    fn test_scope_defaults() {
        let mut store = InjectionSpecStore::new();
        store.set_scope("Request", Scope::Unique).unwrap();

        let compiled = store.freeze(Scope::Shared);
        assert_eq!(compiled.scope("Request"), Scope::Unique);
        assert_eq!(compiled.scope("Widget"), Scope::Shared);
    }

    #[test]
    fn test_freeze_locks_lazy_values() {
        let node = std::sync::Arc::new(LazyValue::registry_get("logger"));
        let mut store = InjectionSpecStore::new();
        store
            .add_named("Widget", "logger", Value::Lazy(node.clone()))
            .unwrap();

        let compiled = store.freeze(Scope::Shared);
        assert!(!node.is_locked());
        compiled.lock_lazies();
        assert!(node.is_locked());
    }
}
