use serde_json::{Map, Value};

/// Format produced by `current_timestamp`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Format produced by `current_date`.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Field-computation functions available to `add_fields`.
///
/// None of them read the record; each call may return a fresh value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldFunction {
    CurrentTimestamp,
    CurrentDate,
    UnixTimestamp,
    Uuid,
    /// Returns the static `value` argument unchanged.
    Literal,
}

impl FieldFunction {
    pub const ALL: [FieldFunction; 5] = [
        FieldFunction::CurrentTimestamp,
        FieldFunction::CurrentDate,
        FieldFunction::UnixTimestamp,
        FieldFunction::Uuid,
        FieldFunction::Literal,
    ];

    pub fn from_name(name: &str) -> Option<FieldFunction> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldFunction::CurrentTimestamp => "current_timestamp",
            FieldFunction::CurrentDate => "current_date",
            FieldFunction::UnixTimestamp => "unix_timestamp",
            FieldFunction::Uuid => "uuid",
            FieldFunction::Literal => "literal",
        }
    }

    /// Static arguments that must be present in the document.
    pub fn required_args(self) -> &'static [&'static str] {
        match self {
            FieldFunction::Literal => &["value"],
            _ => &[],
        }
    }

    pub fn apply(self, args: &Map<String, Value>) -> Value {
        match self {
            FieldFunction::CurrentTimestamp => {
                Value::String(chrono::Local::now().format(TIMESTAMP_FORMAT).to_string())
            }
            FieldFunction::CurrentDate => {
                Value::String(chrono::Local::now().format(DATE_FORMAT).to_string())
            }
            FieldFunction::UnixTimestamp => Value::from(chrono::Utc::now().timestamp()),
            FieldFunction::Uuid => Value::String(uuid::Uuid::new_v4().to_string()),
            FieldFunction::Literal => args.get("value").cloned().unwrap_or(Value::Null),
        }
    }
}

pub fn available() -> Vec<&'static str> {
    FieldFunction::ALL.iter().map(|f| f.name()).collect()
}
