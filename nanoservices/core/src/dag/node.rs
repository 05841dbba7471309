use std::collections::HashMap;

/// Interned dataset name. Only valid against the [`DatasetTable`] that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DatasetId(pub usize);

/// Name <-> id table for the datasets of one dataflow.
#[derive(Debug, Clone, Default)]
pub struct DatasetTable {
    names: Vec<String>,
    index: HashMap<String, DatasetId>,
}

impl DatasetTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, issuing a new one the first time it is seen.
    pub fn intern(&mut self, name: &str) -> DatasetId {
        if let Some(id) = self.index.get(name) {
            return *id;
        }
        let id = DatasetId(self.names.len());
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        id
    }

    pub fn get(&self, name: &str) -> Option<DatasetId> {
        self.index.get(name).copied()
    }

    pub fn name(&self, id: DatasetId) -> &str {
        &self.names[id.0]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskRole {
    Source,
    Transform,
    Sink,
}

/// Represents a single stage in the DAG with its data contracts.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub name: String,
    pub role: TaskRole,
    pub produces: Vec<DatasetId>,
    pub consumes: Vec<DatasetId>,
}

impl TaskNode {
    pub fn source(name: impl Into<String>, produces: DatasetId) -> Self {
        Self {
            name: name.into(),
            role: TaskRole::Source,
            produces: vec![produces],
            consumes: Vec::new(),
        }
    }

    pub fn transform(name: impl Into<String>, consumes: Vec<DatasetId>, produces: Vec<DatasetId>) -> Self {
        Self {
            name: name.into(),
            role: TaskRole::Transform,
            produces,
            consumes,
        }
    }

    pub fn sink(name: impl Into<String>, consumes: DatasetId) -> Self {
        Self {
            name: name.into(),
            role: TaskRole::Sink,
            produces: Vec::new(),
            consumes: vec![consumes],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let mut table = DatasetTable::new();
        let raw = table.intern("raw");
        let ok = table.intern("validation_ok");
        assert_eq!(table.intern("raw"), raw);
        assert_ne!(raw, ok);
        assert_eq!(table.name(ok), "validation_ok");
        assert_eq!(table.get("missing"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn source_node_only_produces() {
        let node = TaskNode::source("people", DatasetId(0));
        assert!(node.consumes.is_empty());
        assert_eq!(node.produces, vec![DatasetId(0)]);
        assert_eq!(node.role, TaskRole::Source);
    }

    #[test]
    fn sink_node_only_consumes() {
        let node = TaskNode::sink("raw-ok", DatasetId(1));
        assert!(node.produces.is_empty());
        assert_eq!(node.consumes, vec![DatasetId(1)]);
    }

    #[test]
    fn validation_node_produces_two_branches() {
        let node = TaskNode::transform("validation", vec![DatasetId(0)], vec![DatasetId(1), DatasetId(2)]);
        assert_eq!(node.consumes, vec![DatasetId(0)]);
        assert_eq!(node.produces.len(), 2);
    }
}
