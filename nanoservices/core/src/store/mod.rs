pub mod db;
pub mod sink;

pub use db::Store;
pub use sink::StoreSink;
