//! Manually registered type definitions
//!
//! Rust has no runtime reflection, so every type the engine can build is
//! described up front: its kind, constructor parameters, methods, fields and
//! place in the hierarchy. Behaviour is optional. Without a constructor hook
//! each constructor argument is stored in the field named after its
//! parameter; without a method hook each method argument is stored the same
//! way.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::value::{Instance, Value};

/// Constructor behaviour: initialise a freshly allocated instance
pub type ConstructorFn = Arc<dyn Fn(&Instance, &[Value]) -> anyhow::Result<()> + Send + Sync>;

/// Method behaviour: run against an instance with resolved arguments
pub type MethodFn = Arc<dyn Fn(&Instance, &[Value]) -> anyhow::Result<Value> + Send + Sync>;

/// What sort of type a definition describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    Class,
    AbstractClass,
    Interface,
    Mixin,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeKind::Class => write!(f, "class"),
            TypeKind::AbstractClass => write!(f, "abstract class"),
            TypeKind::Interface => write!(f, "interface"),
            TypeKind::Mixin => write!(f, "mixin"),
        }
    }
}

/// Built-in scalar and pseudo types that carry no structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltinType {
    String,
    Int,
    Float,
    Bool,
    Array,
    Callable,
    Iterable,
    Object,
    Mixed,
}

impl BuiltinType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "string" => Some(BuiltinType::String),
            "int" => Some(BuiltinType::Int),
            "float" => Some(BuiltinType::Float),
            "bool" => Some(BuiltinType::Bool),
            "array" => Some(BuiltinType::Array),
            "callable" => Some(BuiltinType::Callable),
            "iterable" => Some(BuiltinType::Iterable),
            "object" => Some(BuiltinType::Object),
            "mixed" => Some(BuiltinType::Mixed),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            BuiltinType::String => "string",
            BuiltinType::Int => "int",
            BuiltinType::Float => "float",
            BuiltinType::Bool => "bool",
            BuiltinType::Array => "array",
            BuiltinType::Callable => "callable",
            BuiltinType::Iterable => "iterable",
            BuiltinType::Object => "object",
            BuiltinType::Mixed => "mixed",
        }
    }
}

/// Declared type of a parameter or field
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeHint {
    Builtin(BuiltinType),
    /// A class or interface name
    Named(String),
}

impl TypeHint {
    pub fn parse(name: &str) -> Self {
        match BuiltinType::from_name(name) {
            Some(builtin) => TypeHint::Builtin(builtin),
            None => TypeHint::Named(name.to_string()),
        }
    }

    /// The class/interface name, if this hint names one
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeHint::Named(name) => Some(name),
            TypeHint::Builtin(_) => None,
        }
    }
}

impl fmt::Display for TypeHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeHint::Builtin(b) => write!(f, "{}", b.name()),
            TypeHint::Named(name) => write!(f, "{}", name),
        }
    }
}

/// One constructor or method parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    /// Zero-based position, assigned when the parameter is added to a definition
    pub position: usize,
    pub name: String,
    pub type_hint: Option<TypeHint>,
    pub nullable: bool,
    pub default: Option<Value>,
}

impl ParamDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            position: 0,
            name: name.into(),
            type_hint: None,
            nullable: false,
            default: None,
        }
    }

    /// Declare the parameter's type (`"string"`, `"LoggerInterface"`, ...)
    pub fn of_type(mut self, type_name: &str) -> Self {
        self.type_hint = Some(TypeHint::parse(type_name));
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Required unless it has a default or accepts null
    pub fn is_required(&self) -> bool {
        !self.has_default() && !self.nullable
    }

    /// Declared class/interface name, if the hint names one
    pub fn declared_class(&self) -> Option<&str> {
        self.type_hint.as_ref().and_then(TypeHint::class_name)
    }
}

/// A settable method
#[derive(Debug, Clone, PartialEq)]
pub struct MethodDescriptor {
    pub name: String,
    pub params: Vec<ParamDescriptor>,
    /// Type that declared the method
    pub declared_in: String,
}

impl MethodDescriptor {
    pub fn required_params(&self) -> usize {
        self.params.iter().filter(|p| p.is_required()).count()
    }
}

/// A directly assignable field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_hint: Option<TypeHint>,
    pub declared_in: String,
}

#[derive(Clone, Default)]
pub(crate) struct ConstructorDef {
    pub(crate) params: Vec<ParamDescriptor>,
    pub(crate) hook: Option<ConstructorFn>,
}

#[derive(Clone)]
pub(crate) struct MethodDef {
    pub(crate) descriptor: MethodDescriptor,
    pub(crate) hook: Option<MethodFn>,
}

/// Host-supplied description of one type
#[derive(Clone)]
pub struct TypeDefinition {
    pub(crate) name: String,
    pub(crate) kind: TypeKind,
    pub(crate) opaque: bool,
    pub(crate) parent: Option<String>,
    pub(crate) interfaces: Vec<String>,
    pub(crate) mixins: Vec<String>,
    pub(crate) constructor: Option<ConstructorDef>,
    pub(crate) methods: Vec<MethodDef>,
    pub(crate) fields: Vec<FieldDescriptor>,
}

impl TypeDefinition {
    fn with_kind(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            opaque: false,
            parent: None,
            interfaces: Vec::new(),
            mixins: Vec::new(),
            constructor: None,
            methods: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Class)
    }

    pub fn abstract_class(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::AbstractClass)
    }

    pub fn interface(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Interface)
    }

    pub fn mixin(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Mixin)
    }

    /// A known type whose structure cannot be inspected
    pub fn opaque(name: impl Into<String>) -> Self {
        let mut def = Self::with_kind(name, TypeKind::Class);
        def.opaque = true;
        def
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Implemented interfaces; on an interface, the interfaces it extends
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    pub fn uses(mut self, mixin: impl Into<String>) -> Self {
        self.mixins.push(mixin.into());
        self
    }

    /// Append a constructor parameter, declaring the constructor if needed
    pub fn param(mut self, mut param: ParamDescriptor) -> Self {
        let ctor = self.constructor.get_or_insert_with(ConstructorDef::default);
        param.position = ctor.params.len();
        ctor.params.push(param);
        self
    }

    /// Declare an explicit constructor with no parameters
    pub fn no_arg_constructor(mut self) -> Self {
        self.constructor.get_or_insert_with(ConstructorDef::default);
        self
    }

    pub fn constructor_hook<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.constructor
            .get_or_insert_with(ConstructorDef::default)
            .hook = Some(Arc::new(hook));
        self
    }

    pub fn field(self, name: impl Into<String>) -> Self {
        self.push_field(name.into(), None)
    }

    pub fn typed_field(self, name: impl Into<String>, type_name: &str) -> Self {
        self.push_field(name.into(), Some(TypeHint::parse(type_name)))
    }

    fn push_field(mut self, name: String, type_hint: Option<TypeHint>) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            type_hint,
            declared_in: self.name.clone(),
        });
        self
    }

    /// Declare a method with the default field-assigning body
    pub fn method(self, name: impl Into<String>, params: Vec<ParamDescriptor>) -> Self {
        self.push_method(name.into(), params, None)
    }

    pub fn method_with<F>(
        self,
        name: impl Into<String>,
        params: Vec<ParamDescriptor>,
        body: F,
    ) -> Self
    where
        F: Fn(&Instance, &[Value]) -> anyhow::Result<Value> + Send + Sync + 'static,
    {
        self.push_method(name.into(), params, Some(Arc::new(body)))
    }

    /// Single-parameter method with the default body
    pub fn setter(self, name: impl Into<String>, param: ParamDescriptor) -> Self {
        self.method(name, vec![param])
    }

    fn push_method(
        mut self,
        name: String,
        params: Vec<ParamDescriptor>,
        hook: Option<MethodFn>,
    ) -> Self {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(position, mut p)| {
                p.position = position;
                p
            })
            .collect();
        self.methods.push(MethodDef {
            descriptor: MethodDescriptor {
                name,
                params,
                declared_in: self.name.clone(),
            },
            hook,
        });
        self
    }
}

impl fmt::Debug for TypeDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDefinition")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("opaque", &self.opaque)
            .field("parent", &self.parent)
            .field("interfaces", &self.interfaces)
            .field("mixins", &self.mixins)
            .finish_non_exhaustive()
    }
}

/// Store each argument in the field named after its parameter
pub(crate) fn assign_by_param_name(
    instance: &Instance,
    params: &[ParamDescriptor],
    args: &[Value],
) {
    for (param, arg) in params.iter().zip(args) {
        instance.set(param.name.clone(), arg.clone());
    }
}
