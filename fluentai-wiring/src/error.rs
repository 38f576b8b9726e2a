//! Error types for the wiring engine

use std::path::PathBuf;
use thiserror::Error;

use crate::registry::RegistryError;

/// Result type alias for wiring operations
pub type DiResult<T> = Result<T, DiError>;

/// Broad classification of a [`DiError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A mutation was rejected before it touched any state
    Configuration,
    /// The current build cannot complete
    Resolution,
    /// The registry collaborator failed
    Delegation,
    /// A `FileLoad` node could not produce its value
    FileLoad,
    /// A host callback (constructor, method, callable) failed
    Host,
}

/// Errors that can occur while configuring or resolving
#[derive(Error, Debug)]
pub enum DiError {
    /// Mutation attempted after the owner was locked
    #[error("{target} is locked and cannot be modified")]
    Locked { target: &'static str },

    /// A directive was malformed
    #[error("Invalid directive for {type_name}: {reason}")]
    InvalidDirective { type_name: String, reason: String },

    /// Resolution attempted while the engine is still configurable
    #[error("Engine is not locked; call lock() before building")]
    NotLocked,

    /// Type name is not known to the catalog
    #[error("Type not found: {type_name}")]
    TypeNotFound { type_name: String },

    /// Type is known but carries no structural facts
    #[error("Reflection unavailable for type: {type_name}")]
    ReflectionUnavailable { type_name: String },

    /// Parent/interface/mixin declarations form a cycle or name the wrong kind
    #[error("Invalid type hierarchy for {type_name}: {reason}")]
    InvalidTypeHierarchy { type_name: String, reason: String },

    /// Abstract classes, interfaces and mixins cannot be built
    #[error("Type {type_name} is not instantiable ({kind})")]
    NotInstantiable { type_name: String, kind: String },

    /// No step of the fallback chain produced a value
    #[error("Unresolvable parameter ${name} at position {position} of {target}")]
    UnresolvableParameter {
        target: String,
        name: String,
        position: usize,
    },

    /// A type-keyed value does not fit the parameter it was matched to
    #[error(
        "Type-keyed value for parameter ${parameter} of {target} is a {actual}, \
         which is not compatible with {declared}"
    )]
    AmbiguousTypeKeyedValue {
        target: String,
        parameter: String,
        declared: String,
        actual: String,
    },

    /// A build re-entered a type (or service) that was still in progress
    #[error("Cyclic dependency detected: {path}")]
    CyclicDependency { path: String },

    /// Setter directive names a method the type does not have
    #[error("Setter method {method} not found on {type_name}")]
    UnknownSetter { type_name: String, method: String },

    /// Field directive names a field the type does not declare
    #[error("Field {field} not found on {type_name}")]
    UnknownField { type_name: String, field: String },

    /// Invoke target did not resolve to something callable
    #[error("Invoke target is not callable: got {actual}")]
    NotCallable { actual: String },

    /// A value had the wrong shape for where it was used
    #[error("Invalid value: expected {expected}, got {actual}")]
    InvalidValue {
        expected: &'static str,
        actual: &'static str,
    },

    /// The registry collaborator raised an error
    #[error("Registry {operation} failed for {key}")]
    Delegation {
        operation: &'static str,
        key: String,
        #[source]
        source: RegistryError,
    },

    /// `FileLoad` path missing or unreadable
    #[error("File not found or unreadable: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// The file loader failed after the file was found
    #[error("Failed to load {}", path.display())]
    FileLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    /// Constructor hook failed
    #[error("Failed to construct {type_name}")]
    ConstructionFailed {
        type_name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Setter hook failed
    #[error("Setter {method} failed on {type_name}")]
    SetterFailed {
        type_name: String,
        method: String,
        #[source]
        source: anyhow::Error,
    },

    /// Callable invoked by an `Invoke` node failed
    #[error("Invocation of {name} failed")]
    InvocationFailed {
        name: String,
        #[source]
        source: anyhow::Error,
    },

    /// Configuration document error
    #[cfg(feature = "config")]
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DiError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            DiError::Locked { .. } | DiError::InvalidDirective { .. } | DiError::NotLocked => {
                ErrorKind::Configuration
            }
            #[cfg(feature = "config")]
            DiError::Config(_) => ErrorKind::Configuration,
            DiError::TypeNotFound { .. }
            | DiError::ReflectionUnavailable { .. }
            | DiError::InvalidTypeHierarchy { .. }
            | DiError::NotInstantiable { .. }
            | DiError::UnresolvableParameter { .. }
            | DiError::AmbiguousTypeKeyedValue { .. }
            | DiError::CyclicDependency { .. }
            | DiError::UnknownSetter { .. }
            | DiError::UnknownField { .. }
            | DiError::NotCallable { .. }
            | DiError::InvalidValue { .. } => ErrorKind::Resolution,
            DiError::Delegation { .. } => ErrorKind::Delegation,
            DiError::FileNotFound { .. } | DiError::FileLoad { .. } => ErrorKind::FileLoad,
            DiError::ConstructionFailed { .. }
            | DiError::SetterFailed { .. }
            | DiError::InvocationFailed { .. } => ErrorKind::Host,
        }
    }

    pub(crate) fn invalid_directive(type_name: &str, reason: impl Into<String>) -> Self {
        DiError::InvalidDirective {
            type_name: type_name.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn type_not_found(type_name: &str) -> Self {
        DiError::TypeNotFound {
            type_name: type_name.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
