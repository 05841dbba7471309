pub mod error;
pub mod record;

use error::Error;

pub use record::{Dataset, FieldFailure, Fields, Record};

pub type EtlResult<T> = Result<T, Error>;
