pub mod add_fields;
pub mod functions;
pub mod rules;
pub mod traits;
pub mod validate;

pub use add_fields::AddFields;
pub use functions::FieldFunction;
pub use rules::Rule;
pub use traits::{StageContext, StageOutput, Transform};
pub use validate::ValidateFields;
