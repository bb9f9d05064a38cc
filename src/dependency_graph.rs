//! Validates the acyclic component dependency graph at construction
//! time. Components are wired together with concrete handles (an
//! `Arc<dyn Component>` passed into a constructor), so a cycle can only
//! come from a bug in how the graph is assembled — this module exists to
//! catch that bug loudly instead of deadlocking `dependencies_ready`
//! checks at runtime.

use std::collections::{HashMap, HashSet, VecDeque};

use tracing::debug;

use crate::error::{ReconcileError, Result};

#[derive(Debug, Default)]
pub struct DependencyGraph {
    edges: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that `component` depends on `requires`. Both are inserted
    /// as nodes even if `requires` has no further dependencies.
    pub fn add_dependency(&mut self, component: impl Into<String>, requires: impl Into<String>) {
        let component = component.into();
        let requires = requires.into();
        self.edges.entry(requires.clone()).or_default();
        self.edges.entry(component).or_default().push(requires);
    }

    pub fn add_component(&mut self, component: impl Into<String>) {
        self.edges.entry(component.into()).or_default();
    }

    /// Kahn's algorithm: returns components in an order where every
    /// dependency precedes its dependents, or a `CircularDependency`
    /// error naming one of the nodes left over once no more
    /// zero-in-degree nodes exist.
    pub fn topological_order(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> = self.edges.keys().map(|k| (k.as_str(), 0)).collect();
        let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

        for (component, requires) in &self.edges {
            for dep in requires {
                *in_degree.get_mut(component.as_str()).unwrap() += 1;
                dependents.entry(dep.as_str()).or_default().push(component.as_str());
            }
        }

        let mut queue: VecDeque<&str> =
            in_degree.iter().filter(|(_, deg)| **deg == 0).map(|(name, _)| *name).collect();
        let mut order = Vec::with_capacity(self.edges.len());
        let mut visited: HashSet<&str> = HashSet::new();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            order.push(node.to_string());
            if let Some(next) = dependents.get(node) {
                for &dependent in next {
                    let deg = in_degree.get_mut(dependent).unwrap();
                    *deg -= 1;
                    if *deg == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if order.len() != self.edges.len() {
            let remaining: Vec<&str> =
                self.edges.keys().map(|s| s.as_str()).filter(|n| !visited.contains(n)).collect();
            return Err(ReconcileError::CircularDependency(remaining.join(", ")));
        }

        debug!(order = ?order, "resolved component dependency order");
        Ok(order)
    }

    pub fn validate(&self) -> Result<()> {
        self.topological_order().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_chain_orders_dependencies_first() {
        let mut g = DependencyGraph::new();
        g.add_dependency("HttpProxy", "Master");
        g.add_dependency("YtsaurusClient", "HttpProxy");
        let order = g.topological_order().unwrap();
        let pos = |n: &str| order.iter().position(|x| x == n).unwrap();
        assert!(pos("Master") < pos("HttpProxy"));
        assert!(pos("HttpProxy") < pos("YtsaurusClient"));
    }

    #[test]
    fn cycle_is_rejected() {
        let mut g = DependencyGraph::new();
        g.add_dependency("A", "B");
        g.add_dependency("B", "A");
        assert!(g.validate().is_err());
    }

    #[test]
    fn disconnected_components_still_order() {
        let mut g = DependencyGraph::new();
        g.add_component("Discovery");
        g.add_dependency("Scheduler", "Master");
        let order = g.topological_order().unwrap();
        assert_eq!(order.len(), 3);
    }
}
