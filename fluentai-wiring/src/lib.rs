//! Declarative object-graph wiring for FluentAi
//!
//! This crate assembles object graphs from registered type definitions and
//! per-type injection directives. Constructor arguments are resolved through
//! a fixed fallback chain, deferred values form a lazy DAG that is resolved
//! on demand, and an irreversible lock freezes the configuration before the
//! first build.
//!
//! ```
//! use fluentai_wiring::prelude::*;
//!
//! let container = Container::new();
//! let engine = container.engine();
//! engine.register_type(TypeDefinition::interface("LoggerInterface")).unwrap();
//! engine
//!     .register_type(
//!         TypeDefinition::class("FileLogger")
//!             .implements("LoggerInterface")
//!             .no_arg_constructor(),
//!     )
//!     .unwrap();
//! engine
//!     .register_type(
//!         TypeDefinition::class("Mailer")
//!             .param(ParamDescriptor::new("host").of_type("string"))
//!             .param(ParamDescriptor::new("logger").of_type("LoggerInterface")),
//!     )
//!     .unwrap();
//! engine.add_named("Mailer", "host", "smtp.local").unwrap();
//! engine.auto_bind("LoggerInterface", LazyValue::autowire("FileLogger")).unwrap();
//!
//! let mailer = container.build("Mailer").unwrap();
//! assert_eq!(mailer.get("host"), Some(Value::from("smtp.local")));
//! ```

pub mod analysis;
pub mod builder;
pub mod container;
pub mod context;
pub mod engine;
pub mod error;
pub mod lazy;
pub mod lock;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod spec;
pub mod types;
pub mod value;

#[cfg(feature = "config")]
pub mod config;

pub use analysis::{DependencyAnalysis, ParameterPlan};
pub use builder::InstanceBuilder;
pub use container::{Container, ContainerBuilder, Module};
pub use context::ResolutionContext;
pub use engine::Engine;
pub use error::{DiError, DiResult, ErrorKind};
pub use lazy::{DefaultFileLoader, FileLoader, LazyKind, LazyValue};
pub use lock::{Configuration, Frozen, LockController};
pub use registry::{EmptyRegistry, Registry, RegistryError, ServiceRegistry};
pub use resolver::{ArgumentSource, Arguments, ParameterResolver, ResolvedArgument};
pub use settings::{EngineSettings, Scope};
pub use spec::{InjectionSpec, InjectionSpecStore, SpecUnifier, UnifiedSpec};
pub use types::{
    ParamDescriptor, TypeCatalog, TypeDefinition, TypeDescriptor, TypeIntrospector, TypeKind,
};
pub use value::{Callable, Instance, ObjectRef, Value};

#[cfg(feature = "config")]
pub use config::WiringConfig;

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        Arguments, Callable, Container, ContainerBuilder, DiError, DiResult, Engine, LazyValue,
        Module, ObjectRef, ParamDescriptor, Scope, TypeDefinition, Value,
    };

    #[cfg(feature = "config")]
    pub use crate::WiringConfig;
}
