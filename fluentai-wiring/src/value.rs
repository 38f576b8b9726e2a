//! Runtime value representation
//!
//! Everything the engine moves around (directive values, constructor
//! arguments, registry entries, built objects) is a [`Value`]. Objects,
//! callables and lazy nodes are reference types and compare by identity;
//! everything else compares structurally.

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::fmt;
use std::sync::Arc;

use crate::error::{DiError, DiResult};
use crate::lazy::LazyValue;

/// Shared handle to a built object
pub type ObjectRef = Arc<Instance>;

/// Signature of a host callable reachable through `Invoke` nodes
pub type NativeFn = dyn Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync;

/// Runtime value types
#[derive(Clone)]
pub enum Value {
    /// Null value
    Null,

    /// Boolean value
    Bool(bool),

    /// Integer value
    Int(i64),

    /// Floating point value
    Float(f64),

    /// String value
    Str(String),

    /// Ordered list of values
    List(Vec<Value>),

    /// Insertion-ordered map of values
    Map(IndexMap<String, Value>),

    /// Object built by the engine (or handed in by the host)
    Object(ObjectRef),

    /// Host callable
    Callable(Callable),

    /// Deferred value, resolved on demand
    Lazy(Arc<LazyValue>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_lazy(&self) -> bool {
        matches!(self, Value::Lazy(_))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Callable(_))
    }

    /// Name of the value's variant
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Map(_) => "map",
            Value::Object(_) => "object",
            Value::Callable(_) => "callable",
            Value::Lazy(_) => "lazy",
        }
    }

    /// Runtime type as reported in errors; objects report their class
    pub fn runtime_type(&self) -> String {
        match self {
            Value::Object(obj) => obj.type_name().to_string(),
            other => other.type_name().to_string(),
        }
    }

    pub fn as_str(&self) -> DiResult<&str> {
        match self {
            Value::Str(s) => Ok(s),
            _ => Err(DiError::InvalidValue {
                expected: "string",
                actual: self.type_name(),
            }),
        }
    }

    pub fn as_int(&self) -> DiResult<i64> {
        match self {
            Value::Int(n) => Ok(*n),
            _ => Err(DiError::InvalidValue {
                expected: "int",
                actual: self.type_name(),
            }),
        }
    }

    pub fn as_object(&self) -> DiResult<&ObjectRef> {
        match self {
            Value::Object(obj) => Ok(obj),
            _ => Err(DiError::InvalidValue {
                expected: "object",
                actual: self.type_name(),
            }),
        }
    }

    pub fn as_list(&self) -> DiResult<&[Value]> {
        match self {
            Value::List(items) => Ok(items),
            _ => Err(DiError::InvalidValue {
                expected: "list",
                actual: self.type_name(),
            }),
        }
    }

    pub fn as_lazy(&self) -> Option<&Arc<LazyValue>> {
        match self {
            Value::Lazy(node) => Some(node),
            _ => None,
        }
    }

    /// Lock every lazy node reachable from this value
    pub(crate) fn lock_lazies(&self, seen: &mut FxHashSet<usize>) {
        match self {
            Value::Lazy(node) => node.lock_deep(seen),
            Value::List(items) => items.iter().for_each(|v| v.lock_lazies(seen)),
            Value::Map(map) => map.values().for_each(|v| v.lock_lazies(seen)),
            _ => {}
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Callable(a), Value::Callable(b)) => Arc::ptr_eq(&a.function, &b.function),
            (Value::Lazy(a), Value::Lazy(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(n) => write!(f, "{}", n),
            Value::Float(x) => write!(f, "{}", x),
            Value::Str(s) => write!(f, "{:?}", s),
            Value::List(items) => f.debug_list().entries(items).finish(),
            Value::Map(map) => f.debug_map().entries(map.iter()).finish(),
            Value::Object(obj) => write!(f, "<{}>", obj.type_name()),
            Value::Callable(c) => write!(f, "<callable {}>", c.name),
            Value::Lazy(node) => write!(f, "<lazy {}>", node.kind_name()),
        }
    }
}

/// A constructed object: its class name plus an ordered field table
pub struct Instance {
    type_name: String,
    fields: RwLock<IndexMap<String, Value>>,
}

impl Instance {
    /// Allocate an empty object of the given class
    pub fn new(type_name: impl Into<String>) -> ObjectRef {
        Arc::new(Self {
            type_name: type_name.into(),
            fields: RwLock::new(IndexMap::new()),
        })
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Read a field
    pub fn get(&self, field: &str) -> Option<Value> {
        self.fields.read().get(field).cloned()
    }

    /// Write a field, returning the previous value
    pub fn set(&self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.fields.write().insert(field.into(), value)
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.read().contains_key(field)
    }

    /// Field names in assignment order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.read().keys().cloned().collect()
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type_name", &self.type_name)
            .field("fields", &*self.fields.read())
            .finish()
    }
}

/// Named host function
#[derive(Clone)]
pub struct Callable {
    name: String,
    function: Arc<NativeFn>,
}

impl Callable {
    pub fn new<F>(name: impl Into<String>, function: F) -> Self
    where
        F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            function: Arc::new(function),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Invoke with already-resolved arguments
    pub fn call(&self, args: &[Value]) -> DiResult<Value> {
        (self.function)(args).map_err(|source| DiError::InvocationFailed {
            name: self.name.clone(),
            source,
        })
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable").field("name", &self.name).finish()
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Self {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::List(items)
    }
}

impl From<IndexMap<String, Value>> for Value {
    fn from(map: IndexMap<String, Value>) -> Self {
        Value::Map(map)
    }
}

impl From<ObjectRef> for Value {
    fn from(obj: ObjectRef) -> Self {
        Value::Object(obj)
    }
}

impl From<Callable> for Value {
    fn from(c: Callable) -> Self {
        Value::Callable(c)
    }
}

impl From<LazyValue> for Value {
    fn from(node: LazyValue) -> Self {
        Value::Lazy(Arc::new(node))
    }
}

impl From<Arc<LazyValue>> for Value {
    fn from(node: Arc<LazyValue>) -> Self {
        Value::Lazy(node)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Str(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(feature = "config")]
impl From<toml::Value> for Value {
    fn from(value: toml::Value) -> Self {
        match value {
            toml::Value::String(s) => Value::Str(s),
            toml::Value::Integer(n) => Value::Int(n),
            toml::Value::Float(x) => Value::Float(x),
            toml::Value::Boolean(b) => Value::Bool(b),
            toml::Value::Datetime(dt) => Value::Str(dt.to_string()),
            toml::Value::Array(items) => Value::List(items.into_iter().map(Value::from).collect()),
            toml::Value::Table(table) => {
                Value::Map(table.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
