use std::collections::{BTreeSet, HashMap};
use crate::dag::node::{DatasetTable, TaskNode};

/// Errors that can occur during DAG resolution.
#[derive(Debug, thiserror::Error)]
pub enum DagError {
    #[error("No producer found for dataset: {0}")]
    MissingProducer(String),

    #[error("Multiple producers for dataset '{0}': {1:?}")]
    AmbiguousProducer(String, Vec<String>),

    #[error("Cycle detected in DAG involving stages: {0:?}")]
    CycleDetected(Vec<String>),
}

/// A resolved DAG with execution order. Node references are indices into
/// the slice passed to [`resolve`].
#[derive(Debug)]
pub struct ResolvedDag {
    /// Nodes in topological order (safe to execute in this sequence).
    pub order: Vec<usize>,
}

/// Resolve stage nodes into an execution DAG based on the datasets they read
/// and bind.
///
/// Among nodes that are ready at the same time the one declared first runs
/// first, so a declaration order that already respects dependencies comes
/// back unchanged.
pub fn resolve(nodes: &[TaskNode], datasets: &DatasetTable) -> Result<ResolvedDag, DagError> {
    // Build producer index: dataset -> node
    let mut producers: HashMap<usize, usize> = HashMap::new();
    for (idx, node) in nodes.iter().enumerate() {
        for data in &node.produces {
            if let Some(existing) = producers.get(&data.0) {
                return Err(DagError::AmbiguousProducer(
                    datasets.name(*data).to_string(),
                    vec![nodes[*existing].name.clone(), node.name.clone()],
                ));
            }
            producers.insert(data.0, idx);
        }
    }

    let mut dependencies: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nodes.len()];
    let mut dependents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); nodes.len()];

    for (idx, node) in nodes.iter().enumerate() {
        for data in &node.consumes {
            let producer = producers
                .get(&data.0)
                .copied()
                .ok_or_else(|| DagError::MissingProducer(datasets.name(*data).to_string()))?;
            dependencies[idx].insert(producer);
            dependents[producer].insert(idx);
        }
    }

    // Kahn's algorithm; the ready set is ordered by declaration index.
    let mut in_degree: Vec<usize> = dependencies.iter().map(BTreeSet::len).collect();
    let mut ready: BTreeSet<usize> = (0..nodes.len()).filter(|i| in_degree[*i] == 0).collect();
    let mut order = Vec::with_capacity(nodes.len());

    while let Some(node) = ready.pop_first() {
        order.push(node);
        for dependent in &dependents[node] {
            in_degree[*dependent] -= 1;
            if in_degree[*dependent] == 0 {
                ready.insert(*dependent);
            }
        }
    }

    if order.len() != nodes.len() {
        let remaining: Vec<String> = in_degree
            .iter()
            .enumerate()
            .filter(|(_, deg)| **deg > 0)
            .map(|(idx, _)| nodes[idx].name.clone())
            .collect();
        return Err(DagError::CycleDetected(remaining));
    }

    Ok(ResolvedDag { order })
}
