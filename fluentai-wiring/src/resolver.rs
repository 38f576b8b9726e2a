//! Constructor parameter resolution
//!
//! Each parameter walks a fixed chain and the first step that yields a value
//! wins:
//!
//! 1. positional argument
//! 2. named argument
//! 3. type-keyed argument for the declared class
//! 4. global auto-binding for the declared class
//! 5. declared default
//! 6. `null` for nullable parameters
//! 7. `Autowire` of the declared class, when it is concrete
//! 8. otherwise [`DiError::UnresolvableParameter`]
//!
//! Steps 1-3 are tried against each [`Arguments`] layer in turn, so caller
//! overrides (first layer) beat unified directives (second layer).

use indexmap::IndexMap;
use std::collections::BTreeMap;
use tracing::trace;

use crate::error::{DiError, DiResult};
use crate::lazy::LazyValue;
use crate::types::{ParamDescriptor, TypeIntrospector};
use crate::value::Value;

/// Positional, named and type-keyed argument maps
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    pub positional: BTreeMap<usize, Value>,
    pub named: IndexMap<String, Value>,
    pub type_keyed: IndexMap<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn at(mut self, position: usize, value: impl Into<Value>) -> Self {
        self.positional.insert(position, value.into());
        self
    }

    pub fn named(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.named.insert(name.into(), value.into());
        self
    }

    pub fn typed(mut self, type_name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.type_keyed.insert(type_name.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty() && self.type_keyed.is_empty()
    }

    /// Overwrite same-key entries with `other`'s
    pub fn overlay(&mut self, other: &Arguments) {
        for (position, value) in &other.positional {
            self.positional.insert(*position, value.clone());
        }
        for (name, value) in &other.named {
            self.named.insert(name.clone(), value.clone());
        }
        for (type_name, value) in &other.type_keyed {
            self.type_keyed.insert(type_name.clone(), value.clone());
        }
    }

    pub fn values(&self) -> impl Iterator<Item = &Value> {
        self.positional
            .values()
            .chain(self.named.values())
            .chain(self.type_keyed.values())
    }
}

/// Which step of the chain produced an argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgumentSource {
    Positional,
    Named,
    TypeKeyed,
    AutoBound,
    Default,
    Null,
    Autowire,
}

/// Winning value for one parameter; lazy values are not yet resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedArgument {
    pub value: Value,
    pub source: ArgumentSource,
}

impl ResolvedArgument {
    fn new(value: Value, source: ArgumentSource) -> Self {
        Self { value, source }
    }
}

pub struct ParameterResolver<'a> {
    introspector: &'a TypeIntrospector,
    auto_bindings: &'a IndexMap<String, Value>,
}

impl<'a> ParameterResolver<'a> {
    pub fn new(
        introspector: &'a TypeIntrospector,
        auto_bindings: &'a IndexMap<String, Value>,
    ) -> Self {
        Self {
            introspector,
            auto_bindings,
        }
    }

    /// Resolve one parameter of `target` against the argument layers
    pub fn resolve_parameter(
        &self,
        target: &str,
        param: &ParamDescriptor,
        layers: &[&Arguments],
    ) -> DiResult<ResolvedArgument> {
        let resolved = self.walk_chain(target, param, layers)?;
        trace!(
            "{}::${} resolved from {:?}",
            target,
            param.name,
            resolved.source
        );
        Ok(resolved)
    }

    fn walk_chain(
        &self,
        target: &str,
        param: &ParamDescriptor,
        layers: &[&Arguments],
    ) -> DiResult<ResolvedArgument> {
        let declared = param.declared_class();

        for layer in layers {
            if let Some(value) = layer.positional.get(&param.position) {
                return Ok(ResolvedArgument::new(value.clone(), ArgumentSource::Positional));
            }
            if let Some(value) = layer.named.get(&param.name) {
                return Ok(ResolvedArgument::new(value.clone(), ArgumentSource::Named));
            }
            if let Some(value) = declared.and_then(|d| layer.type_keyed.get(d)) {
                self.check_type_keyed(target, param, value)?;
                return Ok(ResolvedArgument::new(value.clone(), ArgumentSource::TypeKeyed));
            }
        }

        if let Some(value) = declared.and_then(|d| self.auto_bindings.get(d)) {
            return Ok(ResolvedArgument::new(value.clone(), ArgumentSource::AutoBound));
        }

        if let Some(default) = &param.default {
            return Ok(ResolvedArgument::new(default.clone(), ArgumentSource::Default));
        }

        if param.nullable {
            return Ok(ResolvedArgument::new(Value::Null, ArgumentSource::Null));
        }

        if let Some(class) = declared.filter(|d| self.introspector.is_instantiable(d)) {
            return Ok(ResolvedArgument::new(
                Value::from(LazyValue::autowire(class)),
                ArgumentSource::Autowire,
            ));
        }

        Err(DiError::UnresolvableParameter {
            target: target.to_string(),
            name: param.name.clone(),
            position: param.position,
        })
    }

    /// Reject a type-keyed value whose runtime type does not fit the
    /// parameter, unless it equals the parameter's default. Lazy values are
    /// accepted here and must be re-checked once resolved.
    pub fn check_type_keyed(
        &self,
        target: &str,
        param: &ParamDescriptor,
        value: &Value,
    ) -> DiResult<()> {
        let Some(declared) = param.declared_class() else {
            return Ok(());
        };
        if value.is_lazy() || self.is_compatible(declared, param, value) {
            return Ok(());
        }
        if param.default.as_ref() == Some(value) {
            return Ok(());
        }
        Err(DiError::AmbiguousTypeKeyedValue {
            target: target.to_string(),
            parameter: param.name.clone(),
            declared: declared.to_string(),
            actual: value.runtime_type(),
        })
    }

    fn is_compatible(&self, declared: &str, param: &ParamDescriptor, value: &Value) -> bool {
        match value {
            Value::Object(obj) => self.introspector.is_subtype(obj.type_name(), declared),
            Value::Null => param.nullable,
            _ => false,
        }
    }
}
