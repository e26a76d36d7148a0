/// Dependency edge bookkeeping shared by stack resources and manifests
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet, VecDeque};

use crate::error::ContractViolation;

/// `from` must not be applied before `to` exists
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyEdge {
    pub from: String,
    pub to: String,
}

impl DependencyEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl std::fmt::Display for DependencyEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} -> {}", self.from, self.to)
    }
}

/// Directed acyclic graph of node ids in insertion order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyGraph {
    nodes: Vec<String>,
    edges: Vec<DependencyEdge>,
}

impl DependencyGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node id
    pub fn add_node(&mut self, id: impl Into<String>) -> Result<(), ContractViolation> {
        let id = id.into();
        if id.is_empty() {
            return Err(ContractViolation::EmptyField { field: "node id" });
        }
        if self.contains(&id) {
            return Err(ContractViolation::DuplicateNode(id));
        }
        self.nodes.push(id);
        Ok(())
    }

    /// Record that `from` depends on `to`
    ///
    /// Rejects unknown nodes, self edges, duplicates and any edge that would
    /// close a cycle, so the graph stays a DAG at all times.
    pub fn add_dependency(&mut self, from: &str, to: &str) -> Result<(), ContractViolation> {
        for id in [from, to] {
            if !self.contains(id) {
                return Err(ContractViolation::UnknownNode(id.to_string()));
            }
        }
        if from == to {
            return Err(ContractViolation::SelfDependency(from.to_string()));
        }
        if self.edges.iter().any(|e| e.from == from && e.to == to) {
            return Err(ContractViolation::DuplicateDependency {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        if self.reaches(to, from) {
            return Err(ContractViolation::DependencyCycle {
                from: from.to_string(),
                to: to.to_string(),
            });
        }

        self.edges.push(DependencyEdge::new(from, to));
        Ok(())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n == id)
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// Direct dependencies of a node
    pub fn dependencies_of<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.edges
            .iter()
            .filter(move |e| e.from == id)
            .map(|e| e.to.as_str())
    }

    /// Order in which an applier may create the nodes
    ///
    /// Dependencies come first; ties keep insertion order.
    pub fn apply_order(&self) -> Vec<&str> {
        let mut pending: HashMap<&str, usize> = self
            .nodes
            .iter()
            .map(|n| (n.as_str(), self.dependencies_of(n).count()))
            .collect();

        let mut ready: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| pending[n] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.nodes.len());
        while let Some(node) = ready.pop_front() {
            order.push(node);
            // Dependents in insertion order
            for dependent in self.nodes.iter().map(String::as_str) {
                let waits_on_node = self
                    .edges
                    .iter()
                    .any(|e| e.from == dependent && e.to == node);
                if !waits_on_node {
                    continue;
                }
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.push_back(dependent);
                    }
                }
            }
        }

        order
    }

    /// Whether `target` is reachable from `start` by following edges
    fn reaches(&self, start: &str, target: &str) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![start];
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if seen.insert(node) {
                stack.extend(self.dependencies_of(node));
            }
        }
        false
    }
}
