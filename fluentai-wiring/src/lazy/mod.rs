//! Deferred value nodes
//!
//! A [`LazyValue`] is a small tagged variant that produces a [`Value`] when
//! resolved against a [`ResolutionContext`]. Nodes can reference other
//! nodes, so configuration forms a DAG that is walked on demand. Resolution
//! locks the node but never memoizes; shared registry entries are cached by
//! the registry itself.

pub mod file;

pub use file::{DefaultFileLoader, FileLoader};

use indexmap::IndexMap;
use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::trace;

use crate::context::ResolutionContext;
use crate::error::{DiError, DiResult};
use crate::resolver::Arguments;
use crate::value::Value;

/// The variants a lazy node can take
#[derive(Debug, Clone)]
pub enum LazyKind {
    /// A fixed value
    Literal(Value),
    /// A registry entry by key
    RegistryGet(String),
    /// Every registry entry carrying a tag
    TaggedGet(String),
    /// A build of the named type, optionally with caller overrides
    Autowire {
        type_name: String,
        overrides: Arguments,
    },
    /// Call a callable (or an `[object, "method"]` pair) with arguments
    Invoke { target: Value, args: Vec<Value> },
    /// A list or map whose elements are resolved one by one
    ArrayOf(Value),
    /// The host's load primitive applied to a path
    FileLoad(Value),
}

impl LazyKind {
    pub fn name(&self) -> &'static str {
        match self {
            LazyKind::Literal(_) => "literal",
            LazyKind::RegistryGet(_) => "registry-get",
            LazyKind::TaggedGet(_) => "tagged-get",
            LazyKind::Autowire { .. } => "autowire",
            LazyKind::Invoke { .. } => "invoke",
            LazyKind::ArrayOf(_) => "array-of",
            LazyKind::FileLoad(_) => "file-load",
        }
    }

    fn children(&self) -> Vec<&Value> {
        match self {
            LazyKind::Literal(value) | LazyKind::ArrayOf(value) | LazyKind::FileLoad(value) => {
                vec![value]
            }
            LazyKind::Autowire { overrides, .. } => overrides.values().collect(),
            LazyKind::Invoke { target, args } => {
                std::iter::once(target).chain(args.iter()).collect()
            }
            LazyKind::RegistryGet(_) | LazyKind::TaggedGet(_) => Vec::new(),
        }
    }
}

/// A lockable deferred value
#[derive(Debug)]
pub struct LazyValue {
    kind: RwLock<LazyKind>,
    locked: AtomicBool,
}

impl LazyValue {
    pub fn new(kind: LazyKind) -> Self {
        Self {
            kind: RwLock::new(kind),
            locked: AtomicBool::new(false),
        }
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::new(LazyKind::Literal(value.into()))
    }

    pub fn registry_get(key: impl Into<String>) -> Self {
        Self::new(LazyKind::RegistryGet(key.into()))
    }

    pub fn tagged(tag: impl Into<String>) -> Self {
        Self::new(LazyKind::TaggedGet(tag.into()))
    }

    pub fn autowire(type_name: impl Into<String>) -> Self {
        Self::new_instance(type_name, Arguments::new())
    }

    /// Autowire with explicit constructor overrides
    pub fn new_instance(type_name: impl Into<String>, overrides: Arguments) -> Self {
        Self::new(LazyKind::Autowire {
            type_name: type_name.into(),
            overrides,
        })
    }

    pub fn invoke(target: impl Into<Value>, args: Vec<Value>) -> Self {
        Self::new(LazyKind::Invoke {
            target: target.into(),
            args,
        })
    }

    pub fn array_of(items: Vec<Value>) -> Self {
        Self::new(LazyKind::ArrayOf(Value::List(items)))
    }

    pub fn array_of_map(items: IndexMap<String, Value>) -> Self {
        Self::new(LazyKind::ArrayOf(Value::Map(items)))
    }

    pub fn file_load(path: impl Into<Value>) -> Self {
        Self::new(LazyKind::FileLoad(path.into()))
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.read().name()
    }

    /// Snapshot of the node's current variant
    pub fn kind(&self) -> LazyKind {
        self.kind.read().clone()
    }

    /// Target type when this node is an `Autowire`
    pub fn autowire_target(&self) -> Option<String> {
        match &*self.kind.read() {
            LazyKind::Autowire { type_name, .. } => Some(type_name.clone()),
            _ => None,
        }
    }

    pub fn lock(&self) {
        self.locked.store(true, Ordering::Release);
    }

    pub fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    /// Mutate the node in place; fails once locked
    pub fn update(&self, f: impl FnOnce(&mut LazyKind)) -> DiResult<()> {
        if self.is_locked() {
            return Err(DiError::Locked { target: "lazy value" });
        }
        f(&mut self.kind.write());
        Ok(())
    }

    /// Replace the node's variant
    pub fn replace(&self, kind: LazyKind) -> DiResult<()> {
        self.update(|current| *current = kind)
    }

    /// Append an argument to an `Invoke` node
    pub fn push_arg(&self, arg: impl Into<Value>) -> DiResult<()> {
        let arg = arg.into();
        let mut result = Ok(());
        self.update(|kind| match kind {
            LazyKind::Invoke { args, .. } => args.push(arg),
            other => {
                result = Err(DiError::InvalidValue {
                    expected: "invoke node",
                    actual: other.name(),
                })
            }
        })?;
        result
    }

    /// Append an item to a list-shaped `ArrayOf` node
    pub fn push_item(&self, item: impl Into<Value>) -> DiResult<()> {
        let item = item.into();
        let mut result = Ok(());
        self.update(|kind| match kind {
            LazyKind::ArrayOf(Value::List(items)) => items.push(item),
            other => {
                result = Err(DiError::InvalidValue {
                    expected: "list array-of node",
                    actual: other.name(),
                })
            }
        })?;
        result
    }

    /// Lock this node and every node reachable from it
    pub(crate) fn lock_deep(&self, seen: &mut FxHashSet<usize>) {
        let addr = self as *const LazyValue as usize;
        if !seen.insert(addr) {
            return;
        }
        self.lock();
        for child in self.kind.read().children() {
            child.lock_lazies(seen);
        }
    }

    /// Produce this node's value
    pub fn resolve(&self, ctx: &ResolutionContext<'_>) -> DiResult<Value> {
        self.lock();
        let kind = self.kind();
        let _active = ctx.enter_node(self as *const LazyValue as usize, kind.name())?;
        trace!("Resolving {} node", kind.name());

        match kind {
            LazyKind::Literal(value) => Ok(value),
            LazyKind::RegistryGet(key) => ctx
                .registry()
                .get(&key, ctx)
                .map_err(|source| DiError::Delegation {
                    operation: "get",
                    key,
                    source,
                }),
            LazyKind::TaggedGet(tag) => ctx
                .registry()
                .get_by_tag(&tag, ctx)
                .map(Value::List)
                .map_err(|source| DiError::Delegation {
                    operation: "get_by_tag",
                    key: tag,
                    source,
                }),
            LazyKind::Autowire {
                type_name,
                overrides,
            } => ctx.build(&type_name, &overrides).map(Value::Object),
            LazyKind::Invoke { target, args } => {
                let target = resolve_value(&target, ctx)?;
                let args = args
                    .iter()
                    .map(|arg| resolve_value(arg, ctx))
                    .collect::<DiResult<Vec<_>>>()?;
                invoke(&target, &args, ctx)
            }
            LazyKind::ArrayOf(items) => match items {
                Value::List(items) => items
                    .iter()
                    .map(|item| resolve_value(item, ctx))
                    .collect::<DiResult<Vec<_>>>()
                    .map(Value::List),
                Value::Map(items) => items
                    .iter()
                    .map(|(key, item)| Ok((key.clone(), resolve_value(item, ctx)?)))
                    .collect::<DiResult<IndexMap<_, _>>>()
                    .map(Value::Map),
                other => Err(DiError::InvalidValue {
                    expected: "list or map",
                    actual: other.type_name(),
                }),
            },
            LazyKind::FileLoad(path) => {
                let path = resolve_value(&path, ctx)?;
                let path = ctx.settings().resolve_path(path.as_str()?);
                file::load(ctx.file_loader(), &path)
            }
        }
    }
}

/// Resolve `value` if it is a lazy node, otherwise return it unchanged
pub fn resolve_value(value: &Value, ctx: &ResolutionContext<'_>) -> DiResult<Value> {
    match value {
        Value::Lazy(node) => node.resolve(ctx),
        other => Ok(other.clone()),
    }
}

fn invoke(target: &Value, args: &[Value], ctx: &ResolutionContext<'_>) -> DiResult<Value> {
    match target {
        Value::Callable(callable) => callable.call(args),
        Value::List(pair) if pair.len() == 2 => match (&pair[0], &pair[1]) {
            (Value::Object(obj), Value::Str(method)) => ctx.call_method(obj, method, args),
            _ => Err(DiError::NotCallable {
                actual: format!("[{}, {}]", pair[0].runtime_type(), pair[1].runtime_type()),
            }),
        },
        other => Err(DiError::NotCallable {
            actual: other.runtime_type(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{Configuration, Frozen};
    use crate::registry::EmptyRegistry;
    use std::sync::Arc;

    #[test]
    fn test_locked_node_rejects_mutation() {
        let node = LazyValue::invoke(Value::Null, vec![]);
        node.push_arg(1).unwrap();
        node.lock();

        assert!(matches!(node.push_arg(2), Err(DiError::Locked { .. })));
        match node.kind() {
            LazyKind::Invoke { args, .. } => assert_eq!(args, vec![Value::Int(1)]),
            other => panic!("unexpected kind {other:?}"),
        }
    }

    #[test]
    fn test_push_on_wrong_kind() {
        let node = LazyValue::literal(1);
        assert!(matches!(node.push_arg(2), Err(DiError::InvalidValue { .. })));
        assert!(matches!(node.push_item(2), Err(DiError::InvalidValue { .. })));
    }

    #[test]
    fn test_lock_deep_reaches_children() {
        let inner = Arc::new(LazyValue::registry_get("svc"));
        let outer =
            LazyValue::array_of(vec![Value::Int(1), Value::Lazy(Arc::clone(&inner))]);

        outer.lock_deep(&mut FxHashSet::default());
        assert!(outer.is_locked());
        assert!(inner.is_locked());
    }

    #[test]
    fn test_autowire_target() {
        assert_eq!(LazyValue::autowire("Clock").autowire_target().as_deref(), Some("Clock"));
        assert_eq!(LazyValue::literal(1).autowire_target(), None);
    }

    #[test]
    fn test_node_containing_itself_is_a_cycle() {
        let frozen = Frozen::compile(Configuration::default());
        let ctx = ResolutionContext::new(&frozen, &EmptyRegistry);

        let node = Arc::new(LazyValue::array_of(vec![Value::Int(1)]));
        node.push_item(Value::Lazy(Arc::clone(&node))).unwrap();
        match node.resolve(&ctx) {
            Err(DiError::CyclicDependency { path }) => assert_eq!(path, "array-of -> array-of"),
            other => panic!("expected a cycle, got {other:?}"),
        }

        let call = Arc::new(LazyValue::invoke(Value::Null, vec![]));
        let wrapper = Value::from(LazyValue::array_of(vec![Value::Lazy(Arc::clone(&call))]));
        call.push_arg(wrapper).unwrap();
        assert!(matches!(
            call.resolve(&ctx),
            Err(DiError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_shared_node_resolves_twice_in_one_list() {
        let frozen = Frozen::compile(Configuration::default());
        let ctx = ResolutionContext::new(&frozen, &EmptyRegistry);

        let shared = Arc::new(LazyValue::literal("same"));
        let list = LazyValue::array_of(vec![
            Value::Lazy(Arc::clone(&shared)),
            Value::Lazy(Arc::clone(&shared)),
        ]);
        assert_eq!(
            list.resolve(&ctx).unwrap(),
            Value::List(vec![Value::from("same"), Value::from("same")])
        );
    }
}
