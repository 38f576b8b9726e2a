//! Per-request resolution state

use std::cell::RefCell;

use crate::builder::{self, InstanceBuilder};
use crate::error::{DiError, DiResult};
use crate::lazy::FileLoader;
use crate::lock::Frozen;
use crate::registry::Registry;
use crate::resolver::Arguments;
use crate::settings::EngineSettings;
use crate::types::TypeIntrospector;
use crate::value::{ObjectRef, Value};

/// Everything a lazy node or registry needs while one top-level build runs
///
/// The context borrows the frozen engine state and the registry for the
/// duration of a request and tracks the in-progress trail of type names and
/// registry keys, so that re-entering one of them is reported as a cycle
/// instead of recursing forever. Lazy nodes are tracked separately by address,
/// which catches a node that was made to contain itself.
pub struct ResolutionContext<'a> {
    state: &'a Frozen,
    registry: &'a dyn Registry,
    trail: RefCell<Vec<String>>,
    nodes: RefCell<Vec<(usize, &'static str)>>,
}

impl<'a> ResolutionContext<'a> {
    pub fn new(state: &'a Frozen, registry: &'a dyn Registry) -> Self {
        Self {
            state,
            registry,
            trail: RefCell::new(Vec::new()),
            nodes: RefCell::new(Vec::new()),
        }
    }

    pub fn registry(&self) -> &'a dyn Registry {
        self.registry
    }

    pub fn settings(&self) -> &'a EngineSettings {
        &self.state.settings
    }

    pub fn file_loader(&self) -> &'a dyn FileLoader {
        self.state.file_loader.as_ref()
    }

    pub fn introspector(&self) -> &'a TypeIntrospector {
        &self.state.introspector
    }

    /// Build `type_name` through the engine this context belongs to
    pub fn build(&self, type_name: &str, overrides: &Arguments) -> DiResult<ObjectRef> {
        InstanceBuilder::new(self.state).build(self, type_name, overrides)
    }

    /// Call a method on an engine-known object with resolved arguments
    pub fn call_method(
        &self,
        object: &ObjectRef,
        method: &str,
        args: &[Value],
    ) -> DiResult<Value> {
        let info = self.state.introspector.inspect(object.type_name())?;
        builder::call_method(&info, object, method, args)
    }

    /// Push `label` onto the trail; fails if it is already in progress
    pub fn enter(&self, label: &str) -> DiResult<TrailGuard<'_>> {
        let mut trail = self.trail.borrow_mut();
        if let Some(start) = trail.iter().position(|entry| entry == label) {
            let mut path = trail[start..].to_vec();
            path.push(label.to_string());
            return Err(DiError::CyclicDependency {
                path: path.join(" -> "),
            });
        }
        trail.push(label.to_string());
        Ok(TrailGuard { trail: &self.trail })
    }

    /// Mark the lazy node at `addr` as in progress; fails if it already is
    pub(crate) fn enter_node(
        &self,
        addr: usize,
        kind: &'static str,
    ) -> DiResult<TrailGuard<'_, (usize, &'static str)>> {
        let mut nodes = self.nodes.borrow_mut();
        if let Some(start) = nodes.iter().position(|(active, _)| *active == addr) {
            let mut path: Vec<&str> = nodes[start..].iter().map(|(_, name)| *name).collect();
            path.push(kind);
            return Err(DiError::CyclicDependency {
                path: path.join(" -> "),
            });
        }
        nodes.push((addr, kind));
        Ok(TrailGuard { trail: &self.nodes })
    }

    /// Snapshot of what is currently being resolved, outermost first
    pub fn trail(&self) -> Vec<String> {
        self.trail.borrow().clone()
    }
}

/// Pops its trail entry when dropped
#[must_use]
pub struct TrailGuard<'c, T = String> {
    trail: &'c RefCell<Vec<T>>,
}

impl<T> Drop for TrailGuard<'_, T> {
    fn drop(&mut self) {
        self.trail.borrow_mut().pop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{Configuration, Frozen};
    use crate::registry::EmptyRegistry;

    #[test]
    fn test_trail_guard_pops_on_drop() {
        let frozen = Frozen::compile(Configuration::default());
        let ctx = ResolutionContext::new(&frozen, &EmptyRegistry);

        {
            let _a = ctx.enter("A").unwrap();
            let _b = ctx.enter("B").unwrap();
            assert_eq!(ctx.trail(), vec!["A", "B"]);
        }
        assert!(ctx.trail().is_empty());
    }

    #[test]
    fn test_reentry_reports_cycle_path() {
        let frozen = Frozen::compile(Configuration::default());
        let ctx = ResolutionContext::new(&frozen, &EmptyRegistry);

        let _root = ctx.enter("Root").unwrap();
        let _a = ctx.enter("A").unwrap();
        let _b = ctx.enter("B").unwrap();
        match ctx.enter("A") {
            Err(DiError::CyclicDependency { path }) => assert_eq!(path, "A -> B -> A"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a cycle"),
        }
        assert_eq!(ctx.trail().len(), 3);
    }

    #[test]
    fn test_node_reentry_reports_cycle() {
        let frozen = Frozen::compile(Configuration::default());
        let ctx = ResolutionContext::new(&frozen, &EmptyRegistry);

        {
            let _outer = ctx.enter_node(0x10, "invoke").unwrap();
            let _inner = ctx.enter_node(0x20, "array-of").unwrap();
            match ctx.enter_node(0x10, "invoke") {
                Err(DiError::CyclicDependency { path }) => {
                    assert_eq!(path, "invoke -> array-of -> invoke")
                }
                Err(other) => panic!("unexpected error: {other}"),
                Ok(_) => panic!("expected a cycle"),
            }
        }
        // released nodes can be entered again
        assert!(ctx.enter_node(0x10, "invoke").is_ok());
        assert!(ctx.trail().is_empty());
    }
}
