//! Container facade: an engine paired with a service registry

use tracing::debug;

use crate::context::ResolutionContext;
use crate::engine::Engine;
use crate::error::{DiError, DiResult};
use crate::lazy::resolve_value;
use crate::registry::{Registry, ServiceRegistry};
use crate::resolver::Arguments;
use crate::settings::EngineSettings;
use crate::value::{ObjectRef, Value};

/// Wiring engine plus the services its lazy values can reach
///
/// Configure through [`engine`](Container::engine) and
/// [`services`](Container::services), then [`lock`](Container::lock). Every
/// lookup locks implicitly, so the first `get` freezes the container.
#[derive(Default)]
pub struct Container {
    engine: Engine,
    services: ServiceRegistry,
}

impl Container {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        Self {
            engine: Engine::with_settings(settings),
            services: ServiceRegistry::new(),
        }
    }

    /// Create a new container builder
    pub fn builder() -> ContainerBuilder {
        ContainerBuilder::new()
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn services(&self) -> &ServiceRegistry {
        &self.services
    }

    /// Register a shared service
    pub fn set(&self, key: &str, definition: impl Into<Value>) -> DiResult<()> {
        self.services.set(key, definition)
    }

    /// Freeze both the engine and the registry
    pub fn lock(&self) {
        self.engine.lock();
        self.services.lock();
    }

    pub fn is_locked(&self) -> bool {
        self.engine.is_locked() && self.services.is_locked()
    }

    pub fn has(&self, key: &str) -> bool {
        self.services.has(key)
    }

    /// Value of the service registered under `key`
    pub fn get(&self, key: &str) -> DiResult<Value> {
        self.lock();
        let frozen = self.engine.frozen()?;
        let ctx = ResolutionContext::new(&frozen, &self.services);
        self.services
            .get(key, &ctx)
            .map_err(|source| DiError::Delegation {
                operation: "get",
                key: key.to_string(),
                source,
            })
    }

    pub fn get_object(&self, key: &str) -> DiResult<ObjectRef> {
        match self.get(key)? {
            Value::Object(obj) => Ok(obj),
            other => Err(DiError::InvalidValue {
                expected: "object",
                actual: other.type_name(),
            }),
        }
    }

    /// Values of every service tagged `tag`, in registration order
    pub fn tagged(&self, tag: &str) -> DiResult<Vec<Value>> {
        self.lock();
        let frozen = self.engine.frozen()?;
        let ctx = ResolutionContext::new(&frozen, &self.services);
        self.services
            .get_by_tag(tag, &ctx)
            .map_err(|source| DiError::Delegation {
                operation: "get_by_tag",
                key: tag.to_string(),
                source,
            })
    }

    /// Build `type_name` with its configured scope
    pub fn build(&self, type_name: &str) -> DiResult<ObjectRef> {
        self.new_instance(type_name, &Arguments::new())
    }

    /// Build `type_name` with caller overrides; never served from or stored
    /// in the shared cache when `overrides` is non-empty
    pub fn new_instance(&self, type_name: &str, overrides: &Arguments) -> DiResult<ObjectRef> {
        self.lock();
        self.engine.build_with(&self.services, type_name, overrides)
    }

    /// Resolve a value against this container
    pub fn resolve(&self, value: &Value) -> DiResult<Value> {
        self.lock();
        let frozen = self.engine.frozen()?;
        let ctx = ResolutionContext::new(&frozen, &self.services);
        resolve_value(value, &ctx)
    }
}

/// A unit of container configuration
///
/// `define` runs while the container is open. `modify` runs after lock and
/// can only read, so it is the place to fetch services and call into them.
pub trait Module: Send + Sync {
    fn define(&self, container: &Container) -> DiResult<()>;

    fn modify(&self, _container: &Container) -> DiResult<()> {
        Ok(())
    }
}

/// Assembles a container from modules
#[derive(Default)]
pub struct ContainerBuilder {
    settings: EngineSettings,
    modules: Vec<Box<dyn Module>>,
}

impl ContainerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn settings(mut self, settings: EngineSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn module(mut self, module: impl Module + 'static) -> Self {
        self.modules.push(Box::new(module));
        self
    }

    /// Run every `define`, lock, then run every `modify`
    pub fn build(self) -> DiResult<Container> {
        let container = Container::with_settings(self.settings);
        for module in &self.modules {
            module.define(&container)?;
        }
        container.lock();
        for module in &self.modules {
            module.modify(&container)?;
        }
        debug!("Container built from {} modules", self.modules.len());
        Ok(container)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::LazyValue;
    use crate::types::{ParamDescriptor, TypeDefinition};
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct CoreModule;

    impl Module for CoreModule {
        fn define(&self, container: &Container) -> DiResult<()> {
            container
                .engine()
                .register_type(TypeDefinition::class("Clock").no_arg_constructor())?;
            container.set("clock", LazyValue::autowire("Clock"))
        }
    }

    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl Module for Recorder {
        fn define(&self, container: &Container) -> DiResult<()> {
            self.0.lock().push(format!("define locked={}", container.is_locked()));
            Ok(())
        }

        fn modify(&self, container: &Container) -> DiResult<()> {
            let clock = container.get_object("clock")?;
            self.0
                .lock()
                .push(format!("modify locked={} {}", container.is_locked(), clock.type_name()));
            Ok(())
        }
    }

    #[test]
    fn test_modules_define_then_lock_then_modify() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let container = Container::builder()
            .module(CoreModule)
            .module(Recorder(Arc::clone(&log)))
            .build()
            .unwrap();

        assert!(container.is_locked());
        assert_eq!(
            *log.lock(),
            vec!["define locked=false".to_string(), "modify locked=true Clock".to_string()]
        );
    }

    #[test]
    fn test_get_locks_and_shares() {
        let container = Container::new();
        container
            .engine()
            .register_type(TypeDefinition::class("Clock").no_arg_constructor())
            .unwrap();
        container.set("clock", LazyValue::autowire("Clock")).unwrap();

        let first = container.get_object("clock").unwrap();
        assert!(container.is_locked());
        let second = container.get_object("clock").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &container.build("Clock").unwrap()));
        assert!(matches!(container.set("late", 1), Err(DiError::Locked { .. })));
    }

    #[test]
    fn test_missing_service_is_a_delegation_error() {
        let container = Container::new();
        let err = container.get("nope").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Delegation);
    }

    #[test]
    fn test_new_instance_with_registry_backed_argument() {
        let container = Container::new();
        container
            .engine()
            .register_type(TypeDefinition::class("Greeter").param(ParamDescriptor::new("name")))
            .unwrap();
        container.set("default_name", "world").unwrap();
        container
            .engine()
            .add_named("Greeter", "name", LazyValue::registry_get("default_name"))
            .unwrap();

        let greeter = container.build("Greeter").unwrap();
        assert_eq!(greeter.get("name"), Some(Value::from("world")));

        let custom = container
            .new_instance("Greeter", &Arguments::new().at(0, "ada"))
            .unwrap();
        assert_eq!(custom.get("name"), Some(Value::from("ada")));
    }
}
