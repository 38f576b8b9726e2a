//! Type definitions, the catalog that holds them, and the introspector that
//! turns them into immutable descriptors.

pub mod catalog;
pub mod definition;
pub mod introspector;

pub use catalog::TypeCatalog;
pub use definition::{
    BuiltinType, ConstructorFn, FieldDescriptor, MethodDescriptor, MethodFn, ParamDescriptor,
    TypeDefinition, TypeHint, TypeKind,
};
pub use introspector::{TypeDescriptor, TypeIntrospector};
