//! Structural descriptions of registered types
//!
//! `describe` turns a [`TypeDefinition`] into an immutable
//! [`TypeDescriptor`]: inherited constructor, merged methods and fields, and
//! the linearized ancestry (parent chain, then interfaces, then mixins, first
//! occurrence wins). Results are memoized per type and never recomputed.

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::debug;

use super::catalog::TypeCatalog;
use super::definition::{
    BuiltinType, ConstructorFn, FieldDescriptor, MethodDescriptor, MethodFn, ParamDescriptor,
    TypeDefinition, TypeKind,
};
use crate::error::{DiError, DiResult};

/// Immutable structural facts about one type
#[derive(Debug, Clone, PartialEq)]
pub struct TypeDescriptor {
    pub name: String,
    pub kind: TypeKind,
    /// Constructor parameters, inherited from the parent when not declared
    pub constructor: Vec<ParamDescriptor>,
    /// Settable methods: own, then mixins', then inherited, then interface signatures
    pub methods: Vec<MethodDescriptor>,
    pub fields: Vec<FieldDescriptor>,
    pub parent: Option<String>,
    pub interfaces: Vec<String>,
    pub mixins: Vec<String>,
    /// Parent chain, then every interface, then every mixin
    pub ancestry: Vec<String>,
}

impl TypeDescriptor {
    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn is_instantiable(&self) -> bool {
        self.kind == TypeKind::Class
    }

    /// True for the type itself and everything in its ancestry
    pub fn is_a(&self, type_name: &str) -> bool {
        self.name == type_name || self.ancestry.iter().any(|a| a == type_name)
    }
}

/// Descriptor plus the behaviour needed to build and mutate instances
pub(crate) struct Introspected {
    pub(crate) descriptor: Arc<TypeDescriptor>,
    pub(crate) constructor: Option<ConstructorFn>,
    pub(crate) methods: FxHashMap<String, MethodFn>,
    parent_chain: Vec<String>,
    all_interfaces: Vec<String>,
    all_mixins: Vec<String>,
}

/// Memoizing front end over a [`TypeCatalog`]
pub struct TypeIntrospector {
    catalog: TypeCatalog,
    cache: RwLock<FxHashMap<String, Arc<Introspected>>>,
}

impl TypeIntrospector {
    pub fn new(catalog: TypeCatalog) -> Self {
        Self {
            catalog,
            cache: RwLock::new(FxHashMap::default()),
        }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// Describe a type, computing and caching the descriptor on first use
    pub fn describe(&self, type_name: &str) -> DiResult<Arc<TypeDescriptor>> {
        Ok(Arc::clone(&self.inspect(type_name)?.descriptor))
    }

    /// `sub` is `sup` or has `sup` in its ancestry
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        self.describe(sub)
            .map(|descriptor| descriptor.is_a(sup))
            .unwrap_or(false)
    }

    /// Known, inspectable, concrete class
    pub fn is_instantiable(&self, type_name: &str) -> bool {
        self.describe(type_name)
            .map(|descriptor| descriptor.is_instantiable())
            .unwrap_or(false)
    }

    pub(crate) fn inspect(&self, type_name: &str) -> DiResult<Arc<Introspected>> {
        let mut visiting = Vec::new();
        self.inspect_in(type_name, &mut visiting)
    }

    fn inspect_in(
        &self,
        type_name: &str,
        visiting: &mut Vec<String>,
    ) -> DiResult<Arc<Introspected>> {
        if let Some(hit) = self.cache.read().get(type_name) {
            return Ok(Arc::clone(hit));
        }

        if BuiltinType::from_name(type_name).is_some() {
            return Err(DiError::ReflectionUnavailable {
                type_name: type_name.to_string(),
            });
        }
        let definition = self
            .catalog
            .get(type_name)
            .cloned()
            .ok_or_else(|| DiError::type_not_found(type_name))?;
        if definition.opaque {
            return Err(DiError::ReflectionUnavailable {
                type_name: type_name.to_string(),
            });
        }

        if visiting.iter().any(|v| v == type_name) {
            let mut path = visiting.clone();
            path.push(type_name.to_string());
            return Err(DiError::InvalidTypeHierarchy {
                type_name: type_name.to_string(),
                reason: format!("cycle {}", path.join(" -> ")),
            });
        }

        visiting.push(type_name.to_string());
        let computed = self.compute(&definition, visiting);
        visiting.pop();

        let introspected = Arc::new(computed?);
        debug!(
            "Described {} with {} constructor params, ancestry [{}]",
            type_name,
            introspected.descriptor.constructor.len(),
            introspected.descriptor.ancestry.join(", ")
        );

        let mut cache = self.cache.write();
        let entry = cache
            .entry(type_name.to_string())
            .or_insert_with(|| Arc::clone(&introspected));
        Ok(Arc::clone(entry))
    }

    fn compute(&self, def: &TypeDefinition, visiting: &mut Vec<String>) -> DiResult<Introspected> {
        let parent = match &def.parent {
            Some(parent) => {
                if matches!(def.kind, TypeKind::Interface | TypeKind::Mixin) {
                    return Err(hierarchy_error(
                        def,
                        format!("a {} cannot extend a class", def.kind),
                    ));
                }
                let info = self.inspect_in(parent, visiting)?;
                if !matches!(info.descriptor.kind, TypeKind::Class | TypeKind::AbstractClass) {
                    return Err(hierarchy_error(
                        def,
                        format!("parent {} is a {}", parent, info.descriptor.kind),
                    ));
                }
                Some(info)
            }
            None => None,
        };

        let interfaces = self.inspect_all(def, &def.interfaces, TypeKind::Interface, visiting)?;
        if def.kind == TypeKind::Interface && !def.mixins.is_empty() {
            return Err(hierarchy_error(def, "an interface cannot use mixins".to_string()));
        }
        let mixins = self.inspect_all(def, &def.mixins, TypeKind::Mixin, visiting)?;

        let mut parent_chain = Vec::new();
        if let Some(p) = &parent {
            parent_chain.push(p.descriptor.name.clone());
            parent_chain.extend(p.parent_chain.iter().cloned());
        }

        let mut all_interfaces = Vec::new();
        for i in &interfaces {
            push_unique(&mut all_interfaces, &i.descriptor.name);
        }
        for i in &interfaces {
            extend_unique(&mut all_interfaces, &i.all_interfaces);
        }
        if let Some(p) = &parent {
            extend_unique(&mut all_interfaces, &p.all_interfaces);
        }

        let mut all_mixins = Vec::new();
        for m in &mixins {
            push_unique(&mut all_mixins, &m.descriptor.name);
        }
        for m in &mixins {
            extend_unique(&mut all_mixins, &m.all_mixins);
        }
        if let Some(p) = &parent {
            extend_unique(&mut all_mixins, &p.all_mixins);
        }

        let mut ancestry = Vec::new();
        extend_unique(&mut ancestry, &parent_chain);
        extend_unique(&mut ancestry, &all_interfaces);
        extend_unique(&mut ancestry, &all_mixins);

        let (constructor, constructor_hook) = match (&def.constructor, &parent) {
            (Some(ctor), _) => (ctor.params.clone(), ctor.hook.clone()),
            (None, Some(p)) => (p.descriptor.constructor.clone(), p.constructor.clone()),
            (None, None) => (Vec::new(), None),
        };

        let mut methods: IndexMap<String, (MethodDescriptor, Option<MethodFn>)> = IndexMap::new();
        for m in &def.methods {
            methods
                .entry(m.descriptor.name.clone())
                .or_insert_with(|| (m.descriptor.clone(), m.hook.clone()));
        }
        let inherited = mixins
            .iter()
            .chain(parent.iter())
            .chain(interfaces.iter());
        for source in inherited {
            for m in &source.descriptor.methods {
                methods
                    .entry(m.name.clone())
                    .or_insert_with(|| (m.clone(), source.methods.get(&m.name).cloned()));
            }
        }

        let mut fields: IndexMap<String, FieldDescriptor> = IndexMap::new();
        for f in &def.fields {
            fields.entry(f.name.clone()).or_insert_with(|| f.clone());
        }
        for source in mixins.iter().chain(parent.iter()) {
            for f in &source.descriptor.fields {
                fields.entry(f.name.clone()).or_insert_with(|| f.clone());
            }
        }

        let hooks = methods
            .iter()
            .filter_map(|(name, (_, hook))| hook.clone().map(|h| (name.clone(), h)))
            .collect();

        let descriptor = TypeDescriptor {
            name: def.name.clone(),
            kind: def.kind,
            constructor,
            methods: methods.into_values().map(|(m, _)| m).collect(),
            fields: fields.into_values().collect(),
            parent: def.parent.clone(),
            interfaces: def.interfaces.clone(),
            mixins: def.mixins.clone(),
            ancestry,
        };

        Ok(Introspected {
            descriptor: Arc::new(descriptor),
            constructor: constructor_hook,
            methods: hooks,
            parent_chain,
            all_interfaces,
            all_mixins,
        })
    }

    fn inspect_all(
        &self,
        def: &TypeDefinition,
        names: &[String],
        expected: TypeKind,
        visiting: &mut Vec<String>,
    ) -> DiResult<Vec<Arc<Introspected>>> {
        let mut out = Vec::with_capacity(names.len());
        for name in names {
            let info = self.inspect_in(name, visiting)?;
            if info.descriptor.kind != expected {
                return Err(hierarchy_error(
                    def,
                    format!("{} is a {}, expected {}", name, info.descriptor.kind, expected),
                ));
            }
            out.push(info);
        }
        Ok(out)
    }
}

fn hierarchy_error(def: &TypeDefinition, reason: String) -> DiError {
    DiError::InvalidTypeHierarchy {
        type_name: def.name.clone(),
        reason,
    }
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn extend_unique(list: &mut Vec<String>, names: &[String]) {
    for name in names {
        push_unique(list, name);
    }
}
