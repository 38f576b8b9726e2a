//! Resolution engine front end

use std::sync::Arc;

use crate::analysis::{self, DependencyAnalysis};
use crate::builder::InstanceBuilder;
use crate::context::ResolutionContext;
use crate::error::DiResult;
use crate::lazy::{resolve_value, FileLoader};
use crate::lock::{Configuration, Frozen, LockController};
use crate::registry::{EmptyRegistry, Registry};
use crate::resolver::Arguments;
use crate::settings::{EngineSettings, Scope};
use crate::spec::UnifiedSpec;
use crate::types::{TypeDefinition, TypeDescriptor, TypeIntrospector};
use crate::value::{ObjectRef, Value};

/// Type catalog, injection specs and the lock that freezes them
///
/// Every mutator fails with [`DiError::Locked`](crate::DiError::Locked) after
/// [`lock`](Engine::lock); every build fails with
/// [`DiError::NotLocked`](crate::DiError::NotLocked) before it.
#[derive(Default)]
pub struct Engine {
    controller: LockController,
}

impl Engine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            controller: LockController::new(Configuration::with_settings(settings)),
        }
    }

    pub fn register_type(&self, definition: TypeDefinition) -> DiResult<()> {
        self.controller
            .configure(|config| config.catalog.register(definition))
    }

    pub fn add_positional(
        &self,
        type_name: &str,
        position: usize,
        value: impl Into<Value>,
    ) -> DiResult<()> {
        let value = value.into();
        self.controller
            .configure(|config| config.specs.add_positional(type_name, position, value))
    }

    pub fn add_named(&self, type_name: &str, name: &str, value: impl Into<Value>) -> DiResult<()> {
        let value = value.into();
        self.controller
            .configure(|config| config.specs.add_named(type_name, name, value))
    }

    pub fn add_type_keyed(
        &self,
        type_name: &str,
        declared: &str,
        value: impl Into<Value>,
    ) -> DiResult<()> {
        let value = value.into();
        self.controller
            .configure(|config| config.specs.add_type_keyed(type_name, declared, value))
    }

    pub fn add_field(&self, type_name: &str, field: &str, value: impl Into<Value>) -> DiResult<()> {
        let value = value.into();
        self.controller
            .configure(|config| config.specs.add_field(type_name, field, value))
    }

    pub fn add_setter(&self, type_name: &str, method: &str, args: Vec<Value>) -> DiResult<()> {
        self.controller
            .configure(|config| config.specs.add_setter(type_name, method, args))
    }

    pub fn auto_bind(&self, declared: &str, value: impl Into<Value>) -> DiResult<()> {
        let value = value.into();
        self.controller
            .configure(|config| config.specs.auto_bind(declared, value))
    }

    pub fn set_scope(&self, type_name: &str, scope: Scope) -> DiResult<()> {
        self.controller
            .configure(|config| config.specs.set_scope(type_name, scope))
    }

    /// Replace the host load primitive used by `FileLoad` nodes
    pub fn set_file_loader(&self, loader: impl FileLoader + 'static) -> DiResult<()> {
        self.controller.configure(|config| {
            config.file_loader = Arc::new(loader);
            Ok(())
        })
    }

    /// Freeze the engine; irreversible and idempotent
    pub fn lock(&self) -> Arc<Frozen> {
        self.controller.lock()
    }

    pub fn is_locked(&self) -> bool {
        self.controller.is_locked()
    }

    /// Frozen state; fails with `NotLocked` before lock
    pub fn frozen(&self) -> DiResult<Arc<Frozen>> {
        self.controller.frozen()
    }

    /// Structural description of a registered type
    pub fn describe(&self, type_name: &str) -> DiResult<Arc<TypeDescriptor>> {
        let open = self.controller.inspect(|config| {
            TypeIntrospector::new(config.catalog.clone()).describe(type_name)
        });
        match open {
            Some(described) => described,
            None => self.frozen()?.introspector().describe(type_name),
        }
    }

    /// Effective directives for a type across its hierarchy
    pub fn unify(&self, type_name: &str) -> DiResult<Arc<UnifiedSpec>> {
        let frozen = self.frozen()?;
        frozen.unifier.unify(&frozen.introspector, type_name)
    }

    /// Build without a registry
    pub fn build(&self, type_name: &str) -> DiResult<ObjectRef> {
        self.build_with(&EmptyRegistry, type_name, &Arguments::new())
    }

    /// Build with a registry and caller overrides
    pub fn build_with(
        &self,
        registry: &dyn Registry,
        type_name: &str,
        overrides: &Arguments,
    ) -> DiResult<ObjectRef> {
        let frozen = self.frozen()?;
        let ctx = ResolutionContext::new(&frozen, registry);
        InstanceBuilder::new(&frozen).build(&ctx, type_name, overrides)
    }

    /// Resolve an arbitrary value, lazy or not
    pub fn resolve(&self, registry: &dyn Registry, value: &Value) -> DiResult<Value> {
        let frozen = self.frozen()?;
        let ctx = ResolutionContext::new(&frozen, registry);
        resolve_value(value, &ctx)
    }

    /// Static view of what building `type_name` would pull in
    pub fn analyze(&self, type_name: &str) -> DiResult<DependencyAnalysis> {
        analysis::analyze(&*self.frozen()?, type_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DiError;
    use crate::lazy::LazyValue;
    use crate::types::ParamDescriptor;

    fn engine() -> Engine {
        let engine = Engine::new();
        engine
            .register_type(TypeDefinition::class("Clock").no_arg_constructor())
            .unwrap();
        engine
            .register_type(
                TypeDefinition::class("Scheduler")
                    .param(ParamDescriptor::new("clock").of_type("Clock")),
            )
            .unwrap();
        engine
    }

    #[test]
    fn test_build_requires_lock() {
        let engine = engine();
        assert!(matches!(engine.build("Clock"), Err(DiError::NotLocked)));
        assert!(matches!(engine.unify("Clock"), Err(DiError::NotLocked)));

        engine.lock();
        assert!(engine.build("Clock").is_ok());
    }

    #[test]
    fn test_mutators_fail_after_lock() {
        let engine = engine();
        engine.lock();

        assert!(matches!(
            engine.add_named("Scheduler", "clock", Value::Null),
            Err(DiError::Locked { .. })
        ));
        assert!(matches!(
            engine.register_type(TypeDefinition::class("Late")),
            Err(DiError::Locked { .. })
        ));
        assert!(engine.set_scope("Clock", Scope::Unique).is_err());
        assert!(engine.frozen().unwrap().specs().spec("Scheduler").is_none());
    }

    #[test]
    fn test_describe_before_and_after_lock() {
        let engine = engine();
        assert_eq!(engine.describe("Scheduler").unwrap().constructor.len(), 1);

        engine.lock();
        let first = engine.describe("Scheduler").unwrap();
        let second = engine.describe("Scheduler").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_autowired_dependency_is_shared() {
        let engine = engine();
        engine.lock();

        let scheduler = engine.build("Scheduler").unwrap();
        let clock = engine.build("Clock").unwrap();
        assert_eq!(scheduler.get("clock"), Some(Value::Object(clock)));
    }

    #[test]
    fn test_lock_freezes_spec_lazies() {
        let engine = engine();
        let node = Arc::new(LazyValue::autowire("Clock"));
        engine
            .add_named("Scheduler", "clock", Value::Lazy(Arc::clone(&node)))
            .unwrap();
        assert!(!node.is_locked());

        engine.lock();
        assert!(node.is_locked());
        assert!(matches!(
            node.replace(crate::lazy::LazyKind::Literal(Value::Null)),
            Err(DiError::Locked { .. })
        ));
    }

    #[test]
    fn test_resolve_plain_and_lazy_values() {
        let engine = engine();
        engine.lock();

        assert_eq!(engine.resolve(&EmptyRegistry, &Value::Int(4)).unwrap(), Value::Int(4));
        let clock = engine
            .resolve(&EmptyRegistry, &Value::from(LazyValue::autowire("Clock")))
            .unwrap();
        assert_eq!(clock.as_object().unwrap().type_name(), "Clock");
    }
}
