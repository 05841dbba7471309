pub mod node;
pub mod resolver;

pub use node::{DatasetId, DatasetTable, TaskNode, TaskRole};
pub use resolver::{resolve, DagError, ResolvedDag};
