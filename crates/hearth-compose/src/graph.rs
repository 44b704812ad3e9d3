//! Dependency graph management using `petgraph`.
//!
//! Builds a directed acyclic graph from service dependencies and resolves
//! a deterministic topological ordering: among services whose dependencies
//! are all satisfied, the one inserted first comes first.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use hearth_common::error::{HearthError, Result};
use petgraph::Direction;
use petgraph::graph::NodeIndex;

/// A dependency graph of services.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Internal petgraph representation. Edges point from a dependency to
    /// its dependent.
    graph: petgraph::Graph<String, ()>,
    /// Name lookup.
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Creates an empty dependency graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a service node, returning the existing node if the name is known.
    pub fn add_service(&mut self, name: impl Into<String>) -> NodeIndex {
        let name = name.into();
        if let Some(&idx) = self.index.get(&name) {
            return idx;
        }
        let idx = self.graph.add_node(name.clone());
        let _ = self.index.insert(name, idx);
        idx
    }

    /// Returns the node for a service name.
    #[must_use]
    pub fn node(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(name).copied()
    }

    /// Adds a dependency edge: `dependent` depends on `dependency`.
    ///
    /// The graph edge points from `dependency` to `dependent`
    /// so that topological order yields dependencies first.
    pub fn add_dependency(&mut self, dependent: NodeIndex, dependency: NodeIndex) {
        let _ = self.graph.update_edge(dependency, dependent, ());
    }

    /// Returns the number of services in the graph.
    #[must_use]
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the graph has no services.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Returns a topological ordering of services for deployment.
    ///
    /// Dependencies appear before the services that depend on them; ties
    /// are broken by insertion order so the result is stable.
    ///
    /// # Errors
    ///
    /// Returns [`HearthError::DependencyCycle`] naming the services of a
    /// cycle if the graph is not acyclic.
    pub fn resolve_order(&self) -> Result<Vec<String>> {
        let mut in_degree: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| {
                self.graph
                    .neighbors_directed(n, Direction::Incoming)
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|n| in_degree[n.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(self.graph[node].clone());
            for next in self.graph.neighbors_directed(node, Direction::Outgoing) {
                in_degree[next.index()] -= 1;
                if in_degree[next.index()] == 0 {
                    ready.push(Reverse(next));
                }
            }
        }

        if order.len() == self.graph.node_count() {
            Ok(order)
        } else {
            Err(HearthError::DependencyCycle {
                services: self.find_cycle(),
            })
        }
    }

    /// Names the members of one cycle, in insertion order.
    fn find_cycle(&self) -> Vec<String> {
        let cyclic = petgraph::algo::tarjan_scc(&self.graph)
            .into_iter()
            .find(|scc| scc.len() > 1 || self.graph.contains_edge(scc[0], scc[0]));
        let mut members = cyclic.unwrap_or_default();
        members.sort();
        members
            .into_iter()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Returns `true` if any service depends on `name`.
    #[must_use]
    pub fn has_dependents(&self, name: &str) -> bool {
        self.node(name).is_some_and(|n| {
            self.graph
                .neighbors_directed(n, Direction::Outgoing)
                .next()
                .is_some()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_graph_resolves_to_empty() {
        let graph = DependencyGraph::new();
        let order = graph.resolve_order().expect("should resolve");
        assert!(order.is_empty());
        assert!(graph.is_empty());
    }

    #[test]
    fn linear_dependency_chain() {
        let mut graph = DependencyGraph::new();
        let app = graph.add_service("nextcloud");
        let db = graph.add_service("postgres");
        graph.add_dependency(app, db);

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["postgres", "nextcloud"]);
    }

    #[test]
    fn ties_follow_insertion_order() {
        let mut graph = DependencyGraph::new();
        for name in ["zeta", "alpha", "mid"] {
            let _ = graph.add_service(name);
        }
        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn diamond_dependency_is_deterministic() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_service("a");
        let b = graph.add_service("b");
        let c = graph.add_service("c");
        let d = graph.add_service("d");
        graph.add_dependency(a, b);
        graph.add_dependency(a, c);
        graph.add_dependency(b, d);
        graph.add_dependency(c, d);

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["d", "b", "c", "a"]);
    }

    #[test]
    fn released_node_is_ordered_by_insertion_index() {
        let mut graph = DependencyGraph::new();
        let proxy = graph.add_service("proxy");
        let db = graph.add_service("db");
        let _ = graph.add_service("dns");
        graph.add_dependency(proxy, db);

        let order = graph.resolve_order().expect("should resolve");
        assert_eq!(order, vec!["db", "proxy", "dns"]);
    }

    #[test]
    fn two_node_cycle_detection() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_service("a");
        let b = graph.add_service("b");
        graph.add_dependency(a, b);
        graph.add_dependency(b, a);

        let err = graph.resolve_order().unwrap_err();
        assert!(
            matches!(err, HearthError::DependencyCycle { ref services } if *services == ["a", "b"]),
            "got: {err}"
        );
    }

    #[test]
    fn three_node_cycle_excludes_acyclic_members() {
        let mut graph = DependencyGraph::new();
        let root = graph.add_service("root");
        let a = graph.add_service("a");
        let b = graph.add_service("b");
        let c = graph.add_service("c");
        graph.add_dependency(a, root);
        graph.add_dependency(a, b);
        graph.add_dependency(b, c);
        graph.add_dependency(c, a);

        let msg = graph.resolve_order().unwrap_err().to_string();
        assert!(msg.contains("a, b, c"), "got: {msg}");
        assert!(!msg.contains("root"), "got: {msg}");
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let mut graph = DependencyGraph::new();
        let a = graph.add_service("a");
        graph.add_dependency(a, a);
        assert!(graph.resolve_order().is_err());
    }

    #[test]
    fn has_dependents_follows_direct_edges() {
        let mut graph = DependencyGraph::new();
        let db = graph.add_service("db");
        let api = graph.add_service("api");
        let web = graph.add_service("web");
        let _ = graph.add_service("dns");
        graph.add_dependency(api, db);
        graph.add_dependency(web, api);

        assert!(graph.has_dependents("db"));
        assert!(graph.has_dependents("api"));
        assert!(!graph.has_dependents("web"));
        assert!(!graph.has_dependents("dns"));
        assert!(!graph.has_dependents("unknown"));
    }

    #[test]
    fn add_service_is_idempotent() {
        let mut graph = DependencyGraph::new();
        let first = graph.add_service("db");
        let second = graph.add_service("db");
        assert_eq!(first, second);
        assert_eq!(graph.len(), 1);
    }
}
