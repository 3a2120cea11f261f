//! Dependency graph over resolved resources and the orders derived from it.

use crate::CoreError;
use slipway_schema::{Address, Configuration, ResourceId};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Directed graph whose edges point from a resource to each resource it
/// links to. Nodes are kept in declaration order; node indices double as
/// the declaration-order tie-break.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    ids: Vec<ResourceId>,
    addresses: Vec<Address>,
    index: HashMap<ResourceId, usize>,
    dependencies: Vec<Vec<usize>>,
    dependents: Vec<Vec<usize>>,
    order: Vec<usize>,
    position: Vec<usize>,
    level: Vec<usize>,
}

impl DependencyGraph {
    /// Build the graph of a resolved configuration.
    ///
    /// Fails with [`CoreError::Cycle`] if the links are not acyclic.
    pub fn build(config: &Configuration) -> Result<Self, CoreError> {
        let ids = config.ids();
        let index: HashMap<ResourceId, usize> =
            ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();

        let mut addresses = Vec::with_capacity(ids.len());
        let mut edges = Vec::new();
        for (i, id) in ids.iter().enumerate() {
            let Some(resource) = config.get(*id) else {
                continue;
            };
            addresses.push(resource.address());
            for link in resource.links() {
                if let Some(&j) = index.get(&link) {
                    edges.push((i, j));
                }
            }
        }
        Self::assemble(ids, addresses, &edges)
    }

    /// Build a graph from addresses and `(dependent, dependency)` index pairs.
    pub fn from_edges(addresses: Vec<Address>, edges: &[(usize, usize)]) -> Result<Self, CoreError> {
        let mut per_kind: HashMap<_, usize> = HashMap::new();
        let ids = addresses
            .iter()
            .map(|a| {
                let n = per_kind.entry(a.kind).or_insert(0);
                *n += 1;
                ResourceId::new(a.kind, *n - 1)
            })
            .collect();
        Self::assemble(ids, addresses, edges)
    }

    fn assemble(
        ids: Vec<ResourceId>,
        addresses: Vec<Address>,
        edges: &[(usize, usize)],
    ) -> Result<Self, CoreError> {
        let n = ids.len();
        let index = ids.iter().enumerate().map(|(i, id)| (*id, i)).collect();
        let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];
        for &(from, to) in edges {
            if from >= n || to >= n || dependencies[from].contains(&to) {
                continue;
            }
            dependencies[from].push(to);
            dependents[to].push(from);
        }

        let order = topological_order(&dependencies, &dependents).map_err(|node| {
            CoreError::Cycle {
                address: addresses[node].clone(),
            }
        })?;

        let mut position = vec![0; n];
        let mut level = vec![0; n];
        for (pos, &node) in order.iter().enumerate() {
            position[node] = pos;
            level[node] = dependencies[node]
                .iter()
                .map(|&d| level[d] + 1)
                .max()
                .unwrap_or(0);
        }

        Ok(Self {
            ids,
            addresses,
            index,
            dependencies,
            dependents,
            order,
            position,
            level,
        })
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn address(&self, id: ResourceId) -> Option<&Address> {
        self.index.get(&id).map(|&i| &self.addresses[i])
    }

    /// Index of `id` in the apply order.
    pub fn position(&self, id: ResourceId) -> Option<usize> {
        self.index.get(&id).map(|&i| self.position[i])
    }

    /// Dependency level: 0 for resources without dependencies, otherwise one
    /// more than the deepest dependency.
    pub fn level(&self, id: ResourceId) -> Option<usize> {
        self.index.get(&id).map(|&i| self.level[i])
    }

    /// Every resource after all of its dependencies. Ready resources are taken
    /// in declaration order.
    pub fn apply_order(&self) -> Vec<ResourceId> {
        self.order.iter().map(|&i| self.ids[i]).collect()
    }

    /// The exact reverse of [`apply_order`](Self::apply_order).
    pub fn destroy_order(&self) -> Vec<ResourceId> {
        self.order.iter().rev().map(|&i| self.ids[i]).collect()
    }

    pub fn apply_addresses(&self) -> Vec<Address> {
        self.order.iter().map(|&i| self.addresses[i].clone()).collect()
    }

    /// Resources grouped by dependency level, each group in declaration order.
    pub fn levels(&self) -> Vec<Vec<ResourceId>> {
        let depth = self.level.iter().max().map_or(0, |m| m + 1);
        let mut levels: Vec<Vec<ResourceId>> = vec![Vec::new(); depth];
        for (i, &l) in self.level.iter().enumerate() {
            levels[l].push(self.ids[i]);
        }
        levels
    }

    pub fn dependencies(&self, id: ResourceId) -> Vec<ResourceId> {
        self.neighbours(id, &self.dependencies)
    }

    pub fn dependents(&self, id: ResourceId) -> Vec<ResourceId> {
        self.neighbours(id, &self.dependents)
    }

    fn neighbours(&self, id: ResourceId, adjacency: &[Vec<usize>]) -> Vec<ResourceId> {
        let Some(&i) = self.index.get(&id) else {
            return Vec::new();
        };
        let mut out: Vec<usize> = adjacency[i].clone();
        out.sort_unstable();
        out.into_iter().map(|j| self.ids[j]).collect()
    }

    /// Everything `id` depends on, directly or transitively.
    pub fn transitive_dependencies(&self, id: ResourceId) -> HashSet<ResourceId> {
        let mut seen = HashSet::new();
        let Some(&start) = self.index.get(&id) else {
            return seen;
        };
        let mut stack = self.dependencies[start].clone();
        while let Some(node) = stack.pop() {
            if seen.insert(self.ids[node]) {
                stack.extend(self.dependencies[node].iter().copied());
            }
        }
        seen
    }
}

/// Kahn's algorithm with a min-heap as the ready set.
///
/// On a cycle returns a node that lies on it.
fn topological_order(
    dependencies: &[Vec<usize>],
    dependents: &[Vec<usize>],
) -> Result<Vec<usize>, usize> {
    let n = dependencies.len();
    let mut unmet: Vec<usize> = dependencies.iter().map(Vec::len).collect();
    let mut ready: BinaryHeap<Reverse<usize>> = (0..n)
        .filter(|&i| unmet[i] == 0)
        .map(Reverse)
        .collect();

    let mut order = Vec::with_capacity(n);
    while let Some(Reverse(node)) = ready.pop() {
        order.push(node);
        for &dependent in &dependents[node] {
            unmet[dependent] -= 1;
            if unmet[dependent] == 0 {
                ready.push(Reverse(dependent));
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }

    // Every node left has an unmet dependency that is also left, so walking
    // those dependencies must revisit a node, and that node is on a cycle.
    let mut node = (0..n).find(|&i| unmet[i] > 0).unwrap_or(0);
    let mut visited = HashSet::new();
    while visited.insert(node) {
        match dependencies[node].iter().find(|&&d| unmet[d] > 0) {
            Some(&next) => node = next,
            None => break,
        }
    }
    Err(node)
}

/// Apply order of a resolved configuration.
pub fn order(config: &Configuration) -> Result<Vec<ResourceId>, CoreError> {
    Ok(DependencyGraph::build(config)?.apply_order())
}
