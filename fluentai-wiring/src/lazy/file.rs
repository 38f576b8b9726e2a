//! Host load primitive behind `FileLoad` nodes

use anyhow::Context;
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::error::{DiError, DiResult};
use crate::value::Value;

/// Turns a readable file into a value
pub trait FileLoader: Send + Sync {
    fn load(&self, path: &Path) -> anyhow::Result<Value>;
}

/// Parses `.json` (and `.toml` with the `config` feature); any other file
/// yields its text
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultFileLoader;

impl FileLoader for DefaultFileLoader {
    fn load(&self, path: &Path) -> anyhow::Result<Value> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => {
                let json: serde_json::Value = serde_json::from_str(&text)
                    .with_context(|| format!("parsing {} as JSON", path.display()))?;
                Ok(Value::from(json))
            }
            #[cfg(feature = "config")]
            Some("toml") => {
                let table: toml::Value = toml::from_str(&text)
                    .with_context(|| format!("parsing {} as TOML", path.display()))?;
                Ok(Value::from(table))
            }
            _ => Ok(Value::Str(text)),
        }
    }
}

/// Check that `path` is a readable file, then hand it to the loader
pub(crate) fn load(loader: &dyn FileLoader, path: &Path) -> DiResult<Value> {
    if !path.is_file() || fs::File::open(path).is_err() {
        return Err(DiError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    debug!("Loading {}", path.display());
    loader.load(path).map_err(|source| DiError::FileLoad {
        path: path.to_path_buf(),
        source,
    })
}
