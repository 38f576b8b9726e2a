//! Configuration-based wiring
//!
//! A wiring document carries engine settings, per-type directives,
//! auto-bindings and services. Plain data is taken literally; a one-key map
//! whose key starts with `$` describes a lazy value:
//!
//! | directive | value |
//! |---|---|
//! | `$service` | registry key |
//! | `$tagged` | registry tag |
//! | `$new` | type name, or `{ type, named, positional }` |
//! | `$file` | path (may itself be a directive) |
//! | `$call` | `{ target, args }` |
//! | `$literal` | any value, taken as-is |
//!
//! Lists and maps that contain a lazy value become `ArrayOf` nodes.
//!
//! ```toml
//! [settings]
//! default_scope = "shared"
//!
//! [types.Mailer]
//! scope = "unique"
//! named = { host = "smtp.local" }
//! typed = { LoggerInterface = { "$service" = "logger" } }
//! setters = { set_retries = [3] }
//!
//! [services.logger]
//! value = { "$new" = "FileLogger" }
//! tags = ["logging"]
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::debug;

use crate::container::Container;
use crate::error::{DiError, DiResult};
use crate::lazy::LazyValue;
use crate::resolver::Arguments;
use crate::settings::{EngineSettings, Scope};
use crate::value::Value;

/// Directives for one type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeDirectives {
    pub scope: Option<Scope>,
    /// Keyed by zero-based position
    pub positional: IndexMap<String, Json>,
    pub named: IndexMap<String, Json>,
    pub typed: IndexMap<String, Json>,
    pub fields: IndexMap<String, Json>,
    pub setters: IndexMap<String, Vec<Json>>,
}

/// One registry entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub value: Json,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Wiring document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WiringConfig {
    pub settings: EngineSettings,
    pub types: IndexMap<String, TypeDirectives>,
    pub auto_bind: IndexMap<String, Json>,
    pub services: IndexMap<String, ServiceConfig>,
}

impl WiringConfig {
    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> DiResult<Self> {
        toml::from_str(toml_str)
            .map_err(|e| DiError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load configuration from JSON string
    pub fn from_json(json_str: &str) -> DiResult<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| DiError::Config(format!("Failed to parse JSON: {}", e)))
    }

    /// Apply directives and services to an open container
    ///
    /// `settings` are not applied here; use [`into_container`](Self::into_container).
    pub fn apply(&self, container: &Container) -> DiResult<()> {
        let engine = container.engine();

        for (type_name, directives) in &self.types {
            if let Some(scope) = directives.scope {
                engine.set_scope(type_name, scope)?;
            }
            for (position, value) in &directives.positional {
                let position = parse_position(type_name, position)?;
                engine.add_positional(type_name, position, directive_value(value)?)?;
            }
            for (name, value) in &directives.named {
                engine.add_named(type_name, name, directive_value(value)?)?;
            }
            for (declared, value) in &directives.typed {
                engine.add_type_keyed(type_name, declared, directive_value(value)?)?;
            }
            for (field, value) in &directives.fields {
                engine.add_field(type_name, field, directive_value(value)?)?;
            }
            for (method, args) in &directives.setters {
                let args = args.iter().map(directive_value).collect::<DiResult<Vec<_>>>()?;
                engine.add_setter(type_name, method, args)?;
            }
        }

        for (declared, value) in &self.auto_bind {
            engine.auto_bind(declared, directive_value(value)?)?;
        }

        let services = container.services();
        for (key, service) in &self.services {
            services.define(key, directive_value(&service.value)?, service.scope)?;
            for tag in &service.tags {
                services.tag(key, tag)?;
            }
        }

        debug!(
            "Applied wiring config: {} types, {} auto-bindings, {} services",
            self.types.len(),
            self.auto_bind.len(),
            self.services.len()
        );
        Ok(())
    }

    /// New container with these settings and directives, not yet locked
    pub fn into_container(self) -> DiResult<Container> {
        let container = Container::with_settings(self.settings.clone());
        self.apply(&container)?;
        Ok(container)
    }
}

fn parse_position(type_name: &str, key: &str) -> DiResult<usize> {
    key.parse().map_err(|_| {
        DiError::Config(format!(
            "positional key {:?} for {} is not a zero-based index",
            key, type_name
        ))
    })
}

/// Convert a document value, expanding `$` directives into lazy nodes
pub fn directive_value(json: &Json) -> DiResult<Value> {
    match json {
        Json::Object(map) if map.len() == 1 => {
            let (key, inner) = map.iter().next().ok_or_else(|| config_error("empty directive"))?;
            match key.strip_prefix('$') {
                Some(directive) => expand(directive, inner),
                None => collection(json),
            }
        }
        _ => collection(json),
    }
}

fn collection(json: &Json) -> DiResult<Value> {
    match json {
        Json::Array(items) => {
            let items = items.iter().map(directive_value).collect::<DiResult<Vec<_>>>()?;
            if items.iter().any(Value::is_lazy) {
                Ok(Value::from(LazyValue::array_of(items)))
            } else {
                Ok(Value::List(items))
            }
        }
        Json::Object(map) => {
            let items = map
                .iter()
                .map(|(key, value)| Ok((key.clone(), directive_value(value)?)))
                .collect::<DiResult<IndexMap<_, _>>>()?;
            if items.values().any(Value::is_lazy) {
                Ok(Value::from(LazyValue::array_of_map(items)))
            } else {
                Ok(Value::Map(items))
            }
        }
        scalar => Ok(Value::from(scalar.clone())),
    }
}

fn expand(directive: &str, inner: &Json) -> DiResult<Value> {
    let node = match directive {
        "service" => LazyValue::registry_get(expect_str(directive, inner)?),
        "tagged" => LazyValue::tagged(expect_str(directive, inner)?),
        "new" => match inner {
            Json::String(type_name) => LazyValue::autowire(type_name.as_str()),
            Json::Object(spec) => {
                let type_name = spec
                    .get("type")
                    .and_then(Json::as_str)
                    .ok_or_else(|| config_error("$new requires a \"type\" string"))?;
                LazyValue::new_instance(type_name, new_overrides(type_name, spec)?)
            }
            _ => return Err(config_error("$new expects a type name or a table")),
        },
        "file" => LazyValue::file_load(directive_value(inner)?),
        "call" => {
            let target = inner
                .get("target")
                .ok_or_else(|| config_error("$call requires a \"target\""))?;
            let args = match inner.get("args") {
                Some(Json::Array(args)) => {
                    args.iter().map(directive_value).collect::<DiResult<Vec<_>>>()?
                }
                Some(_) => return Err(config_error("$call \"args\" must be a list")),
                None => Vec::new(),
            };
            LazyValue::invoke(directive_value(target)?, args)
        }
        "literal" => return Ok(Value::from(inner.clone())),
        other => return Err(config_error(&format!("unknown directive ${other}"))),
    };
    Ok(Value::from(node))
}

fn new_overrides(type_name: &str, spec: &serde_json::Map<String, Json>) -> DiResult<Arguments> {
    let mut overrides = Arguments::new();
    if let Some(named) = spec.get("named").and_then(Json::as_object) {
        for (name, value) in named {
            overrides = overrides.named(name.as_str(), directive_value(value)?);
        }
    }
    if let Some(positional) = spec.get("positional").and_then(Json::as_object) {
        for (position, value) in positional {
            overrides = overrides.at(parse_position(type_name, position)?, directive_value(value)?);
        }
    }
    Ok(overrides)
}

fn expect_str<'j>(directive: &str, json: &'j Json) -> DiResult<&'j str> {
    json.as_str()
        .ok_or_else(|| config_error(&format!("${directive} expects a string")))
}

fn config_error(message: &str) -> DiError {
    DiError::Config(message.to_string())
}
