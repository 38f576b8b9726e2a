//! Engine-wide settings

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Instance caching policy for a type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// One cached instance per type
    #[default]
    Shared,
    /// A fresh instance for every build
    Unique,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Shared => write!(f, "shared"),
            Scope::Unique => write!(f, "unique"),
        }
    }
}

/// Settings fixed at construction and carried into the frozen engine
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Scope for types without an explicit `set_scope`
    pub default_scope: Scope,
    /// Base directory for relative `FileLoad` paths
    pub file_root: Option<PathBuf>,
}

impl EngineSettings {
    pub fn with_default_scope(mut self, scope: Scope) -> Self {
        self.default_scope = scope;
        self
    }

    pub fn with_file_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.file_root = Some(root.into());
        self
    }

    /// Anchor a `FileLoad` path at `file_root` unless it is absolute
    pub fn resolve_path(&self, path: &str) -> PathBuf {
        let path = Path::new(path);
        match &self.file_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_scope_is_shared() {
        assert_eq!(EngineSettings::default().default_scope, Scope::Shared);
    }

    #[test]
    fn test_resolve_path_against_root() {
        let settings = EngineSettings::default().with_file_root("/etc/app");
        assert_eq!(settings.resolve_path("db.json"), PathBuf::from("/etc/app/db.json"));
        assert_eq!(settings.resolve_path("/tmp/x.json"), PathBuf::from("/tmp/x.json"));
    }

    #[test]
    fn test_scope_deserializes_lowercase() {
        let settings: EngineSettings =
            serde_json::from_str(r#"{"default_scope": "unique"}"#).unwrap();
        assert_eq!(settings.default_scope, Scope::Unique);
        assert!(settings.file_root.is_none());
    }
}
