pub mod file;
pub mod traits;

pub use file::JsonFileDestination;
pub use traits::Destination;
