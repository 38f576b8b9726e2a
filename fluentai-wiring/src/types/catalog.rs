//! Catalog of registered type definitions

use rustc_hash::FxHashMap;
use std::sync::Arc;
use tracing::trace;

use super::definition::{BuiltinType, TypeDefinition};
use crate::error::{DiError, DiResult};

/// Every type the engine knows about, keyed by name
#[derive(Debug, Default, Clone)]
pub struct TypeCatalog {
    definitions: FxHashMap<String, Arc<TypeDefinition>>,
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a definition; names are unique and may not shadow built-ins
    pub fn register(&mut self, definition: TypeDefinition) -> DiResult<()> {
        let name = definition.name.clone();
        if name.is_empty() {
            return Err(DiError::invalid_directive("<anonymous>", "type name is empty"));
        }
        if BuiltinType::from_name(&name).is_some() {
            return Err(DiError::invalid_directive(&name, "built-in type names are reserved"));
        }
        if self.definitions.contains_key(&name) {
            return Err(DiError::invalid_directive(&name, "type is already registered"));
        }

        trace!("Registered type {} ({})", name, definition.kind);
        self.definitions.insert(name, Arc::new(definition));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<TypeDefinition>> {
        self.definitions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.definitions.keys().cloned().collect();
        names.sort();
        names
    }
}
