//! Static dependency analysis
//!
//! Walks the autowire edges a build would follow without constructing
//! anything: for each type, the constructor plan the resolver would choose
//! and the types it would autowire from its arguments, fields and setters.

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tracing::trace;

use crate::error::DiResult;
use crate::lock::Frozen;
use crate::resolver::{ArgumentSource, ParameterResolver};
use crate::value::Value;

/// How one constructor parameter would be satisfied
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterPlan {
    pub name: String,
    pub position: usize,
    /// `None` when no step of the chain applies
    pub source: Option<ArgumentSource>,
    /// Type the parameter would be autowired from, if any
    pub autowires: Option<String>,
}

/// Result of analyzing a type's dependency graph
#[derive(Debug, Clone, PartialEq)]
pub struct DependencyAnalysis {
    pub type_name: String,
    pub parameters: Vec<ParameterPlan>,
    pub direct_deps: Vec<String>,
    /// Every reachable type, depth-first, excluding the root
    pub transitive_deps: Vec<String>,
    pub dependency_depth: usize,
    pub has_cycles: bool,
    /// First cycle found, closed on its starting type
    pub cycle: Option<Vec<String>>,
    /// `Type::$param` entries that would fail to resolve
    pub unresolved: Vec<String>,
}

struct Node {
    parameters: Vec<ParameterPlan>,
    deps: Vec<String>,
}

pub fn analyze(state: &Frozen, type_name: &str) -> DiResult<DependencyAnalysis> {
    let mut graph: IndexMap<String, Node> = IndexMap::new();
    let mut unresolved = Vec::new();
    collect(state, type_name, &mut graph, &mut unresolved)?;

    let mut pending: Vec<String> = graph
        .get(type_name)
        .map(|node| node.deps.clone())
        .unwrap_or_default();
    while let Some(next) = pending.pop() {
        if graph.contains_key(&next) {
            continue;
        }
        match collect(state, &next, &mut graph, &mut unresolved) {
            Ok(()) => {
                if let Some(node) = graph.get(&next) {
                    pending.extend(node.deps.iter().cloned());
                }
            }
            Err(err) => {
                unresolved.push(format!("{next}: {err}"));
                graph.insert(
                    next,
                    Node {
                        parameters: Vec::new(),
                        deps: Vec::new(),
                    },
                );
            }
        }
    }

    let cycle = find_cycle(&graph, type_name);
    let mut transitive = Vec::new();
    collect_transitive(&graph, type_name, &mut FxHashSet::default(), &mut transitive);
    transitive.retain(|name| name != type_name);

    let root = graph.shift_remove(type_name);
    let (parameters, direct_deps) = root
        .map(|node| (node.parameters, node.deps))
        .unwrap_or_default();

    Ok(DependencyAnalysis {
        type_name: type_name.to_string(),
        dependency_depth: depth(&graph, &direct_deps, &mut FxHashSet::default()),
        parameters,
        direct_deps,
        transitive_deps: transitive,
        has_cycles: cycle.is_some(),
        cycle,
        unresolved,
    })
}

fn collect(
    state: &Frozen,
    type_name: &str,
    graph: &mut IndexMap<String, Node>,
    unresolved: &mut Vec<String>,
) -> DiResult<()> {
    let descriptor = state.introspector.describe(type_name)?;
    let unified = state.unifier.unify(&state.introspector, type_name)?;
    let resolver = ParameterResolver::new(&state.introspector, state.specs.auto_bindings());

    let mut deps = Vec::new();
    let mut parameters = Vec::with_capacity(descriptor.constructor.len());
    for param in &descriptor.constructor {
        let plan = match resolver.resolve_parameter(type_name, param, &[&unified.arguments]) {
            Ok(resolved) => ParameterPlan {
                name: param.name.clone(),
                position: param.position,
                source: Some(resolved.source),
                autowires: autowire_target(&resolved.value),
            },
            Err(_) => {
                unresolved.push(format!("{}::${}", type_name, param.name));
                ParameterPlan {
                    name: param.name.clone(),
                    position: param.position,
                    source: None,
                    autowires: None,
                }
            }
        };
        if let Some(target) = &plan.autowires {
            push_unique(&mut deps, target);
        }
        parameters.push(plan);
    }

    let injected = unified
        .fields
        .values()
        .chain(unified.setters.values().flatten());
    for target in injected.filter_map(autowire_target) {
        push_unique(&mut deps, &target);
    }

    trace!("{} depends on [{}]", type_name, deps.join(", "));
    graph.insert(type_name.to_string(), Node { parameters, deps });
    Ok(())
}

fn autowire_target(value: &Value) -> Option<String> {
    value.as_lazy().and_then(|node| node.autowire_target())
}

fn push_unique(list: &mut Vec<String>, name: &str) {
    if !list.iter().any(|n| n == name) {
        list.push(name.to_string());
    }
}

fn find_cycle(graph: &IndexMap<String, Node>, start: &str) -> Option<Vec<String>> {
    let mut visited = FxHashSet::default();
    let mut rec_stack = Vec::new();
    dfs_cycle_check(graph, start, &mut visited, &mut rec_stack)
}

fn dfs_cycle_check(
    graph: &IndexMap<String, Node>,
    node: &str,
    visited: &mut FxHashSet<String>,
    rec_stack: &mut Vec<String>,
) -> Option<Vec<String>> {
    if let Some(start) = rec_stack.iter().position(|n| n == node) {
        let mut cycle = rec_stack[start..].to_vec();
        cycle.push(node.to_string());
        return Some(cycle);
    }
    if !visited.insert(node.to_string()) {
        return None;
    }

    rec_stack.push(node.to_string());
    if let Some(entry) = graph.get(node) {
        for dep in &entry.deps {
            if let Some(cycle) = dfs_cycle_check(graph, dep, visited, rec_stack) {
                return Some(cycle);
            }
        }
    }
    rec_stack.pop();
    None
}

fn collect_transitive(
    graph: &IndexMap<String, Node>,
    node: &str,
    visited: &mut FxHashSet<String>,
    out: &mut Vec<String>,
) {
    if !visited.insert(node.to_string()) {
        return;
    }
    out.push(node.to_string());
    if let Some(entry) = graph.get(node) {
        for dep in &entry.deps {
            collect_transitive(graph, dep, visited, out);
        }
    }
}

/// Longest autowire chain below the root; cycles are cut at the first revisit
fn depth(graph: &IndexMap<String, Node>, deps: &[String], path: &mut FxHashSet<String>) -> usize {
    deps.iter()
        .map(|dep| {
            if !path.insert(dep.clone()) {
                return 0;
            }
            let below = graph
                .get(dep)
                .map(|node| depth(graph, &node.deps, path))
                .unwrap_or(0);
            path.remove(dep);
            below + 1
        })
        .max()
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lazy::LazyValue;
    use crate::lock::Configuration;
    use crate::types::{ParamDescriptor, TypeDefinition};

    fn frozen(extra: impl FnOnce(&mut Configuration)) -> Frozen {
        let mut config = Configuration::default();
        config.catalog.register(TypeDefinition::class("Clock").no_arg_constructor()).unwrap();
        config
            .catalog
            .register(
                TypeDefinition::class("Cache")
                    .param(ParamDescriptor::new("clock").of_type("Clock")),
            )
            .unwrap();
        config
            .catalog
            .register(
                TypeDefinition::class("Repo")
                    .param(ParamDescriptor::new("cache").of_type("Cache"))
                    .param(ParamDescriptor::new("dsn").of_type("string"))
                    .field("audit"),
            )
            .unwrap();
        extra(&mut config);
        Frozen::compile(config)
    }

    #[test]
    fn test_plan_and_depth() {
        let state = frozen(|config| {
            config.specs.add_named("Repo", "dsn", Value::from("sqlite::memory:")).unwrap();
        });
        let analysis = analyze(&state, "Repo").unwrap();

        assert_eq!(analysis.parameters[0].source, Some(ArgumentSource::Autowire));
        assert_eq!(analysis.parameters[0].autowires.as_deref(), Some("Cache"));
        assert_eq!(analysis.parameters[1].source, Some(ArgumentSource::Named));
        assert_eq!(analysis.direct_deps, vec!["Cache"]);
        assert_eq!(analysis.transitive_deps, vec!["Cache", "Clock"]);
        assert_eq!(analysis.dependency_depth, 2);
        assert!(!analysis.has_cycles);
        assert!(analysis.unresolved.is_empty());
    }

    #[test]
    fn test_unresolvable_parameter_reported() {
        let state = frozen(|_| {});
        let analysis = analyze(&state, "Repo").unwrap();
        assert_eq!(analysis.parameters[1].source, None);
        assert_eq!(analysis.unresolved, vec!["Repo::$dsn"]);
    }

    #[test]
    fn test_field_autowire_edge_and_cycle() {
        let state = frozen(|config| {
            config.specs.add_named("Repo", "dsn", Value::from("x")).unwrap();
            config
                .catalog
                .register(
                    TypeDefinition::class("Audit")
                        .param(ParamDescriptor::new("repo").of_type("Repo")),
                )
                .unwrap();
            config
                .specs
                .add_field("Repo", "audit", Value::from(LazyValue::autowire("Audit")))
                .unwrap();
        });
        let analysis = analyze(&state, "Repo").unwrap();

        assert_eq!(analysis.direct_deps, vec!["Cache", "Audit"]);
        assert!(analysis.has_cycles);
        assert_eq!(
            analysis.cycle,
            Some(vec!["Repo".to_string(), "Audit".to_string(), "Repo".to_string()])
        );
    }
}
