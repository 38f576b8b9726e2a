//! Injection directives and their unification across type hierarchies

pub mod store;
pub mod unifier;

pub use store::{CompiledSpecs, InjectionSpec, InjectionSpecStore};
pub use unifier::{SpecUnifier, UnifiedSpec};
