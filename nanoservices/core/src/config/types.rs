//! Document shape of a dataflow definition, as written by users.
//!
//! These types only describe structure. Names, rules, functions and dataset
//! references are checked by [`crate::config::model::Dataflow::from_config`].

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataConfig {
    pub dataflows: Vec<DataflowConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataflowConfig {
    pub name: String,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub transformations: Vec<TransformationConfig>,
    #[serde(default)]
    pub sinks: Vec<SinkConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    /// Glob pattern, e.g. `/data/input/events/person/*`
    pub path: String,
    pub format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformationConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub params: TransformationParams,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransformationParams {
    pub input: String,
    /// For `validate_fields`
    pub validations: Option<Vec<FieldValidationConfig>>,
    /// For `add_fields`
    #[serde(rename = "addFields", alias = "add_fields")]
    pub add_fields: Option<Vec<AddFieldConfig>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FieldValidationConfig {
    pub field: String,
    pub validations: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AddFieldConfig {
    pub name: String,
    pub function: String,
    /// Static arguments handed to the function, e.g. `{ value: "EU" }` for `literal`.
    #[serde(default)]
    pub args: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    pub name: String,
    pub input: String,
    pub paths: Vec<String>,
    pub format: String,
    #[serde(rename = "saveMode", alias = "save_mode")]
    pub save_mode: String,
}
