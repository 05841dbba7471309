pub use etlflow_core as core;
pub use etlflow_utils as utils;

// Convenience re-exports for common usage
pub use etlflow_core::builder::{DataflowBuilder, DataflowPlan};
pub use etlflow_core::config::{ConfigError, Settings};
pub use etlflow_core::engine::EtlEngine;
pub use etlflow_core::events::{ChannelSink, EventBus, LineageEvent, LineageSink};
pub use etlflow_core::executor::{Execution, ExecutionStatus};
pub use etlflow_core::sources::traits::Source;
pub use etlflow_core::store::{Store, StoreSink};
pub use etlflow_core::transforms::traits::Transform;
pub use etlflow_core::destinations::traits::Destination;
pub use etlflow_utils::{Dataset, EtlResult, Record};
