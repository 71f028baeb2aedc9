use crate::{BranchId, BusId, NetworkRef};
use petgraph::visit::EdgeRef;
use std::collections::{HashSet, VecDeque};

/// Groups buses into islands (breadth-first search) with the given branches
/// treated as out of service.
///
/// Islands come back in graph order of their first bus. Unknown branch ids in
/// `removed` are ignored.
pub fn islands(network: &NetworkRef, removed: &[BranchId]) -> Vec<Vec<BusId>> {
    let graph = network.graph();
    let cut: HashSet<_> = removed
        .iter()
        .filter_map(|id| network.branch_edge(*id))
        .collect();

    let mut visited = HashSet::new();
    let mut islands = Vec::new();
    for start in graph.node_indices() {
        if !visited.insert(start) {
            continue;
        }
        let mut members = Vec::new();
        let mut queue = VecDeque::from([start]);
        while let Some(node) = queue.pop_front() {
            members.push(graph[node].id);
            for edge in graph.edges(node) {
                if cut.contains(&edge.id()) {
                    continue;
                }
                let next = if edge.source() == node {
                    edge.target()
                } else {
                    edge.source()
                };
                if visited.insert(next) {
                    queue.push_back(next);
                }
            }
        }
        islands.push(members);
    }
    islands
}

/// Number of islands after removing `removed`.
pub fn island_count(network: &NetworkRef, removed: &[BranchId]) -> usize {
    islands(network, removed).len()
}

/// Parses a label of the form `branch 7(2-5)` back to its branch id.
pub fn parse_branch_label(label: &str) -> Option<BranchId> {
    let rest = label.trim().strip_prefix("branch ")?;
    let (id, tail) = rest.split_once('(')?;
    if !tail.ends_with(')') {
        return None;
    }
    id.trim().parse().ok().map(BranchId::new)
}
