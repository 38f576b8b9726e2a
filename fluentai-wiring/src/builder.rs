//! Instance construction
//!
//! A build runs to completion or fails without publishing anything: the
//! shared cache is written only after construction, field assignment and
//! every setter call have succeeded.

use anyhow::anyhow;
use tracing::{debug, trace};

use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::lazy::resolve_value;
use crate::lock::Frozen;
use crate::resolver::{ArgumentSource, Arguments, ParameterResolver};
use crate::settings::Scope;
use crate::spec::UnifiedSpec;
use crate::types::definition::assign_by_param_name;
use crate::types::introspector::Introspected;
use crate::types::TypeDescriptor;
use crate::value::{Instance, ObjectRef, Value};

pub struct InstanceBuilder<'a> {
    state: &'a Frozen,
}

impl<'a> InstanceBuilder<'a> {
    pub fn new(state: &'a Frozen) -> Self {
        Self { state }
    }

    /// Build `type_name`, honouring its scope
    ///
    /// Non-empty `overrides` make the build private: the shared cache is
    /// neither consulted nor updated.
    pub fn build(
        &self,
        ctx: &ResolutionContext<'_>,
        type_name: &str,
        overrides: &Arguments,
    ) -> DiResult<ObjectRef> {
        let cacheable = overrides.is_empty() && self.state.specs.scope(type_name) == Scope::Shared;
        if cacheable {
            if let Some(hit) = self.state.shared_instance(type_name) {
                trace!("Shared instance of {} served from cache", type_name);
                return Ok(hit);
            }
        }

        let _guard = ctx.enter(type_name)?;

        let info = self.state.introspector.inspect(type_name)?;
        let descriptor = &info.descriptor;
        if !descriptor.is_instantiable() {
            return Err(DiError::NotInstantiable {
                type_name: type_name.to_string(),
                kind: descriptor.kind.to_string(),
            });
        }
        let unified = self.state.unifier.unify(&self.state.introspector, type_name)?;

        let args = self.constructor_args(ctx, descriptor, &unified, overrides)?;
        let instance = Instance::new(type_name);
        match &info.constructor {
            Some(hook) => hook(&*instance, &args[..]).map_err(|source| DiError::ConstructionFailed {
                type_name: type_name.to_string(),
                source,
            })?,
            None => assign_by_param_name(&instance, &descriptor.constructor, &args),
        }

        for (field, value) in &unified.fields {
            if descriptor.field(field).is_none() {
                return Err(DiError::UnknownField {
                    type_name: type_name.to_string(),
                    field: field.clone(),
                });
            }
            instance.set(field.clone(), resolve_value(value, ctx)?);
        }

        for (method, args) in &unified.setters {
            let args = args
                .iter()
                .map(|arg| resolve_value(arg, ctx))
                .collect::<DiResult<Vec<_>>>()?;
            call_method(&info, &instance, method, &args)?;
        }

        debug!(
            "Built {} ({} args, {} fields, {} setters)",
            type_name,
            args.len(),
            unified.fields.len(),
            unified.setters.len()
        );

        if !cacheable {
            return Ok(instance);
        }
        Ok(self
            .state
            .shared
            .lock()
            .entry(type_name.to_string())
            .or_insert(instance)
            .clone())
    }

    fn constructor_args(
        &self,
        ctx: &ResolutionContext<'_>,
        descriptor: &TypeDescriptor,
        unified: &UnifiedSpec,
        overrides: &Arguments,
    ) -> DiResult<Vec<Value>> {
        let resolver =
            ParameterResolver::new(&self.state.introspector, self.state.specs.auto_bindings());
        let layers = [overrides, &unified.arguments];

        descriptor
            .constructor
            .iter()
            .map(|param| {
                let resolved = resolver.resolve_parameter(&descriptor.name, param, &layers)?;
                let value = resolve_value(&resolved.value, ctx)?;
                if resolved.source == ArgumentSource::TypeKeyed && resolved.value.is_lazy() {
                    resolver.check_type_keyed(&descriptor.name, param, &value)?;
                }
                Ok(value)
            })
            .collect()
    }
}

/// Invoke `method` on `instance` with resolved arguments
///
/// Missing trailing arguments fall back to the parameter's default, then to
/// `null` when nullable. Methods without a body store each argument in the
/// field named after its parameter.
pub(crate) fn call_method(
    info: &Introspected,
    instance: &Instance,
    method: &str,
    args: &[Value],
) -> DiResult<Value> {
    let type_name = &info.descriptor.name;
    let signature = info
        .descriptor
        .method(method)
        .ok_or_else(|| DiError::UnknownSetter {
            type_name: type_name.clone(),
            method: method.to_string(),
        })?;

    let setter_failed = |source: anyhow::Error| DiError::SetterFailed {
        type_name: type_name.clone(),
        method: method.to_string(),
        source,
    };

    if args.len() > signature.params.len() {
        return Err(setter_failed(anyhow!(
            "too many arguments (expected at most {}, got {})",
            signature.params.len(),
            args.len()
        )));
    }

    let mut args = args.to_vec();
    for param in signature.params.iter().skip(args.len()) {
        match &param.default {
            Some(default) => args.push(default.clone()),
            None if param.nullable => args.push(Value::Null),
            None => {
                return Err(setter_failed(anyhow!(
                    "missing argument ${} (expected at least {}, got {})",
                    param.name,
                    signature.required_params(),
                    args.len()
                )))
            }
        }
    }

    trace!("Calling {}::{} with {} args", type_name, method, args.len());
    match info.methods.get(method) {
        Some(hook) => hook(instance, &args[..]).map_err(setter_failed),
        None => {
            assign_by_param_name(instance, &signature.params, &args);
            Ok(Value::Null)
        }
    }
}

#[cfg(test)]
#[path = "builder_tests.rs"]
mod tests;
