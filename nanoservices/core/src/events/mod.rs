pub mod bus;
pub mod sink;
pub mod types;

pub use bus::{ChannelSink, EventBus};
pub use sink::{FanOut, LineageSink};
pub use types::{LineageEntry, LineageEvent, ValidationErrorFact};
