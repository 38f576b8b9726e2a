//! Merge injection specs across a type's hierarchy

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use super::store::{CompiledSpecs, InjectionSpec};
use crate::error::DiResult;
use crate::resolver::Arguments;
use crate::types::TypeIntrospector;
use crate::value::Value;

/// Effective directives for one type after merging its ancestry
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnifiedSpec {
    pub type_name: String,
    pub arguments: Arguments,
    /// Applied in first-declaration order, ancestors first
    pub fields: IndexMap<String, Value>,
    /// Applied in first-declaration order, ancestors first
    pub setters: IndexMap<String, Vec<Value>>,
}

impl UnifiedSpec {
    fn empty(type_name: &str) -> Self {
        Self {
            type_name: type_name.to_string(),
            ..Self::default()
        }
    }

    fn merge(
        &mut self,
        arguments: &Arguments,
        fields: &IndexMap<String, Value>,
        setters: &IndexMap<String, Vec<Value>>,
    ) {
        self.arguments.overlay(arguments);
        for (name, value) in fields {
            self.fields.insert(name.clone(), value.clone());
        }
        // same-name setter replaces the whole argument list
        for (method, args) in setters {
            self.setters.insert(method.clone(), args.clone());
        }
    }

    fn merge_unified(&mut self, other: &UnifiedSpec) {
        self.merge(&other.arguments, &other.fields, &other.setters);
    }

    fn merge_spec(&mut self, spec: &InjectionSpec) {
        self.merge(&spec.arguments, &spec.fields, &spec.setters);
    }
}

/// Memoizing spec merger
///
/// Precedence, lowest first: mixins, interfaces, parent, own spec.
pub struct SpecUnifier {
    specs: Arc<CompiledSpecs>,
    cache: RwLock<FxHashMap<String, Arc<UnifiedSpec>>>,
}

impl SpecUnifier {
    pub fn new(specs: Arc<CompiledSpecs>) -> Self {
        Self {
            specs,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn unify(
        &self,
        introspector: &TypeIntrospector,
        type_name: &str,
    ) -> DiResult<Arc<UnifiedSpec>> {
        if let Some(hit) = self.cache.read().get(type_name) {
            return Ok(Arc::clone(hit));
        }

        let descriptor = introspector.describe(type_name)?;
        let mut unified = UnifiedSpec::empty(type_name);

        for mixin in &descriptor.mixins {
            let inherited = self.unify(introspector, mixin)?;
            unified.merge_unified(&inherited);
        }
        for interface in &descriptor.interfaces {
            let inherited = self.unify(introspector, interface)?;
            unified.merge_unified(&inherited);
        }
        if let Some(parent) = &descriptor.parent {
            let inherited = self.unify(introspector, parent)?;
            unified.merge_unified(&inherited);
        }
        if let Some(own) = self.specs.spec(type_name) {
            unified.merge_spec(own);
        }

        debug!(
            "Unified {}: {} fields, {} setters",
            type_name,
            unified.fields.len(),
            unified.setters.len()
        );

        let mut cache = self.cache.write();
        let entry = cache
            .entry(type_name.to_string())
            .or_insert_with(|| Arc::new(unified));
        Ok(Arc::clone(entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Scope;
    use crate::spec::InjectionSpecStore;
    use crate::types::{TypeCatalog, TypeDefinition};

    fn introspector() -> TypeIntrospector {
        let mut catalog = TypeCatalog::new();
        catalog.register(TypeDefinition::mixin("Loggable")).unwrap();
        catalog.register(TypeDefinition::interface("Service")).unwrap();
        catalog
            .register(TypeDefinition::abstract_class("Base").implements("Service"))
            .unwrap();
        catalog
            .register(TypeDefinition::class("Widget").extends("Base").uses("Loggable"))
            .unwrap();
        TypeIntrospector::new(catalog)
    }

    fn unifier(store: InjectionSpecStore) -> SpecUnifier {
        SpecUnifier::new(Arc::new(store.freeze(Scope::Shared)))
    }

    #[test]
    fn test_precedence_own_over_parent_over_interface_over_mixin() {
        let mut store = InjectionSpecStore::new();
        for (type_name, tag) in [("Loggable", "mixin"), ("Service", "iface"), ("Base", "parent")] {
            store.add_named(type_name, "source", Value::from(tag)).unwrap();
            store.add_field(type_name, tag, Value::Bool(true)).unwrap();
        }
        store.add_named("Service", "only_iface", Value::Int(1)).unwrap();
        store.add_named("Loggable", "only_mixin", Value::Int(2)).unwrap();
        store.add_named("Widget", "source", Value::from("own")).unwrap();

        let unified = unifier(store).unify(&introspector(), "Widget").unwrap();
        assert_eq!(unified.arguments.named["source"], Value::from("own"));
        assert_eq!(unified.arguments.named["only_iface"], Value::Int(1));
        assert_eq!(unified.arguments.named["only_mixin"], Value::Int(2));
        let fields: Vec<&str> = unified.fields.keys().map(String::as_str).collect();
        assert_eq!(fields, vec!["mixin", "iface", "parent"]);
    }

    #[test]
    fn test_parent_spec_reaches_through_interfaces() {
        let mut store = InjectionSpecStore::new();
        store.add_positional("Service", 0, Value::from("svc")).unwrap();

        let unified = unifier(store).unify(&introspector(), "Widget").unwrap();
        assert_eq!(unified.arguments.positional[&0], Value::from("svc"));
    }

    #[test]
    fn test_setter_list_replaced_and_keeps_first_position() {
        let mut store = InjectionSpecStore::new();
        store
            .add_setter("Base", "set_a", vec![Value::Int(1), Value::Int(2)])
            .unwrap();
        store.add_setter("Base", "set_b", vec![Value::Int(3)]).unwrap();
        store.add_setter("Widget", "set_c", vec![]).unwrap();
        store.add_setter("Widget", "set_a", vec![Value::Int(9)]).unwrap();

        let unified = unifier(store).unify(&introspector(), "Widget").unwrap();
        let order: Vec<&str> = unified.setters.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["set_a", "set_b", "set_c"]);
        assert_eq!(unified.setters["set_a"], vec![Value::Int(9)]);
    }

    #[test]
    fn test_unify_is_memoized() {
        let introspector = introspector();
        let unifier = unifier(InjectionSpecStore::new());

        let first = unifier.unify(&introspector, "Widget").unwrap();
        let second = unifier.unify(&introspector, "Widget").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(first.arguments.is_empty());
        assert_eq!(first.type_name, "Widget");
    }

    #[test]
    fn test_unknown_type_propagates() {
        let unifier = unifier(InjectionSpecStore::new());
        assert!(unifier.unify(&introspector(), "Nope").is_err());
    }
}
