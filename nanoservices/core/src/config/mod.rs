pub mod loader;
pub mod model;
pub mod settings;
pub mod types;

pub use loader::{load_dataflows, load_metadata, parse_metadata, ConfigError, DocumentFormat};
pub use model::{Dataflow, TransformationKind, WriteMode};
pub use settings::Settings;
