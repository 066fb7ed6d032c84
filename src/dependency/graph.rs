//! Dependency graph and startup-order computation. Uses an adjacency
//! structure keyed by integer indices resolved from a name table, to
//! avoid circular pointer ownership; dependency edges store only ids.
//!
//! An edge `dependent -> dependency` means `dependent` requires
//! `dependency` to be `Running` before it may start: for every dependency
//! edge `a -> b`, `b`'s start must complete strictly before `a`'s start
//! begins.

use std::collections::{HashMap, VecDeque};

use crate::dependency::error::DependencyError;
use crate::model::ids::InstanceId;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    index_of: HashMap<InstanceId, usize>,
    ids: Vec<InstanceId>,
    /// `dependencies[i]` holds the indices that instance `i` depends on.
    dependencies: Vec<Vec<usize>>,
    /// `dependents[i]` holds the indices that depend on instance `i`.
    dependents: Vec<Vec<usize>>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn index_for(&mut self, id: &InstanceId) -> usize {
        if let Some(&idx) = self.index_of.get(id) {
            return idx;
        }
        let idx = self.ids.len();
        self.ids.push(id.clone());
        self.dependencies.push(Vec::new());
        self.dependents.push(Vec::new());
        self.index_of.insert(id.clone(), idx);
        idx
    }

    /// Registers `dependent` as requiring `dependency` to be running first.
    pub fn add_edge(&mut self, dependent: &InstanceId, dependency: &InstanceId) {
        let dependent_idx = self.index_for(dependent);
        let dependency_idx = self.index_for(dependency);
        self.dependencies[dependent_idx].push(dependency_idx);
        self.dependents[dependency_idx].push(dependent_idx);
    }

    pub fn ensure_known(&mut self, id: &InstanceId) {
        self.index_for(id);
    }

    /// Removes a single edge, leaving both nodes in the graph. A no-op if
    /// either id or the edge itself is unknown.
    pub fn remove_edge(&mut self, dependent: &InstanceId, dependency: &InstanceId) {
        let (Some(&dependent_idx), Some(&dependency_idx)) =
            (self.index_of.get(dependent), self.index_of.get(dependency))
        else {
            return;
        };
        self.dependencies[dependent_idx].retain(|&i| i != dependency_idx);
        self.dependents[dependency_idx].retain(|&i| i != dependent_idx);
    }

    pub fn direct_dependencies(&self, id: &InstanceId) -> Vec<InstanceId> {
        match self.index_of.get(id) {
            Some(&idx) => self.dependencies[idx]
                .iter()
                .map(|&i| self.ids[i].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn direct_dependents(&self, id: &InstanceId) -> Vec<InstanceId> {
        match self.index_of.get(id) {
            Some(&idx) => self.dependents[idx]
                .iter()
                .map(|&i| self.ids[i].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Computes layered startup order: layer 0 has no dependencies, layer N
    /// contains every node whose dependencies are all satisfied by layers
    /// `0..N`. Within a layer, ids are sorted lexicographically so the
    /// result is deterministic across runs given the same edges.
    pub fn compute_startup_order(&self) -> Result<Vec<Vec<InstanceId>>, DependencyError> {
        let n = self.ids.len();
        let mut in_degree: Vec<usize> = self.dependencies.iter().map(Vec::len).collect();
        let mut layers: Vec<Vec<InstanceId>> = Vec::new();
        let mut remaining = n;
        let mut processed = vec![false; n];

        loop {
            let mut ready: Vec<usize> = (0..n)
                .filter(|&i| !processed[i] && in_degree[i] == 0)
                .collect();
            if ready.is_empty() {
                break;
            }
            ready.sort_by(|&a, &b| self.ids[a].as_str().cmp(self.ids[b].as_str()));

            for &idx in &ready {
                processed[idx] = true;
                remaining -= 1;
                for &dependent in &self.dependents[idx] {
                    in_degree[dependent] -= 1;
                }
            }
            layers.push(ready.iter().map(|&i| self.ids[i].clone()).collect());
        }

        if remaining > 0 {
            let cycle_members: Vec<InstanceId> = (0..n)
                .filter(|&i| !processed[i])
                .map(|i| self.ids[i].clone())
                .collect();
            return Err(DependencyError::Cycle(cycle_members));
        }

        Ok(layers)
    }

    /// Recursively walks dependencies of `id` depth-first, used by
    /// `StartInstance`'s recursive dependency-aware start. Returns an error
    /// rather than recursing past `max_depth`.
    pub fn dependency_chain(
        &self,
        id: &InstanceId,
        max_depth: usize,
    ) -> Result<Vec<InstanceId>, DependencyError> {
        let mut visited = std::collections::HashSet::new();
        let mut chain = Vec::new();
        self.walk(id, 0, max_depth, &mut visited, &mut chain)?;
        Ok(chain)
    }

    fn walk(
        &self,
        id: &InstanceId,
        depth: usize,
        max_depth: usize,
        visited: &mut std::collections::HashSet<InstanceId>,
        chain: &mut Vec<InstanceId>,
    ) -> Result<(), DependencyError> {
        if depth >= max_depth {
            return Err(DependencyError::Cycle(vec![id.clone()]));
        }
        if !visited.insert(id.clone()) {
            return Ok(());
        }
        for dep in self.direct_dependencies(id) {
            self.walk(&dep, depth + 1, max_depth, visited, chain)?;
            if !chain.contains(&dep) {
                chain.push(dep);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> InstanceId {
        InstanceId::new(s).unwrap()
    }

    #[test]
    fn computes_diamond_dependency_layers_in_order() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&id("b"), &id("a"));
        graph.add_edge(&id("c"), &id("a"));
        graph.add_edge(&id("d"), &id("b"));
        graph.add_edge(&id("d"), &id("c"));

        let layers = graph.compute_startup_order().unwrap();
        assert_eq!(
            layers,
            vec![vec![id("a")], vec![id("b"), id("c")], vec![id("d")]]
        );
    }

    #[test]
    fn cycle_is_detected() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&id("a"), &id("b"));
        graph.add_edge(&id("b"), &id("a"));

        assert!(matches!(
            graph.compute_startup_order(),
            Err(DependencyError::Cycle(_))
        ));
    }

    #[test]
    fn same_layer_is_sorted_lexicographically() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&id("zeta"), &id("root"));
        graph.add_edge(&id("alpha"), &id("root"));

        let layers = graph.compute_startup_order().unwrap();
        assert_eq!(layers[1], vec![id("alpha"), id("zeta")]);
    }

    #[test]
    fn remove_edge_drops_the_dependency_both_ways() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&id("b"), &id("a"));
        assert_eq!(graph.direct_dependencies(&id("b")), vec![id("a")]);
        assert_eq!(graph.direct_dependents(&id("a")), vec![id("b")]);

        graph.remove_edge(&id("b"), &id("a"));
        assert!(graph.direct_dependencies(&id("b")).is_empty());
        assert!(graph.direct_dependents(&id("a")).is_empty());
    }

    #[test]
    fn dependency_chain_walks_transitively() {
        let mut graph = DependencyGraph::new();
        graph.add_edge(&id("c"), &id("b"));
        graph.add_edge(&id("b"), &id("a"));

        let chain = graph.dependency_chain(&id("c"), 10).unwrap();
        assert_eq!(chain, vec![id("a"), id("b")]);
    }
}
