use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Ordered field map of a record.
pub type Fields = Map<String, Value>;

/// Field name written alongside the data of a record that failed validation.
pub const VALIDATION_ERRORS_FIELD: &str = "arraycoderrorbyfield";

/// One failed (field, rule) pair carried by a record in a failing branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldFailure {
    pub field: String,
    pub rule: String,
}

/// The unit of data flowing through a dataflow.
///
/// Field data sits behind an `Arc`, so stages that only touch provenance
/// (validation) share it with their input; stages that write fields copy it
/// on first write.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    id: String,
    source_file: Arc<str>,
    fields: Arc<Fields>,
    trail: Vec<String>,
    failures: Vec<FieldFailure>,
}

impl Record {
    pub fn new(id: impl Into<String>, source_file: impl Into<Arc<str>>, fields: Fields) -> Self {
        Self {
            id: id.into(),
            source_file: source_file.into(),
            fields: Arc::new(fields),
            trail: Vec::new(),
            failures: Vec::new(),
        }
    }

    /// Build a record loaded from `source_file` into dataset `origin`.
    ///
    /// The object's own `id` field (string or number) becomes the record id;
    /// otherwise a fresh UUID is assigned.
    pub fn loaded(fields: Fields, source_file: impl Into<Arc<str>>, origin: &str) -> Self {
        let id = match fields.get("id") {
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        };
        let mut record = Self::new(id, source_file, fields);
        record.trail.push(origin.to_string());
        record
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source_file(&self) -> &str {
        &self.source_file
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    /// Field access by name; absence is `None`, never an error.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Write or overwrite a field, copying the shared field map if needed.
    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        Arc::make_mut(&mut self.fields).insert(field.into(), value);
    }

    pub fn trail(&self) -> &[String] {
        &self.trail
    }

    /// Stages traversed so far, e.g. `people->validate_fields->validation_ok`.
    pub fn trail_path(&self) -> String {
        self.trail.join("->")
    }

    pub fn push_step(&mut self, step: impl Into<String>) {
        self.trail.push(step.into());
    }

    pub fn failures(&self) -> &[FieldFailure] {
        &self.failures
    }

    pub fn set_failures(&mut self, failures: Vec<FieldFailure>) {
        self.failures = failures;
    }

    pub fn is_valid(&self) -> bool {
        self.failures.is_empty()
    }

    /// JSON object written by sinks: the fields, plus a
    /// `arraycoderrorbyfield: {field: [rule, ...]}` map for failing records.
    pub fn to_output(&self) -> Value {
        let mut out = (*self.fields).clone();
        if !self.failures.is_empty() {
            let mut by_field = Map::new();
            for failure in &self.failures {
                let rules = by_field
                    .entry(failure.field.clone())
                    .or_insert_with(|| Value::Array(Vec::new()));
                if let Value::Array(rules) = rules {
                    rules.push(Value::String(failure.rule.clone()));
                }
            }
            out.insert(VALIDATION_ERRORS_FIELD.to_string(), Value::Object(by_field));
        }
        Value::Object(out)
    }
}

/// An immutable, cheaply clonable sequence of records bound to a dataset name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset(pub Arc<Vec<Record>>);

impl Dataset {
    pub fn new(records: Vec<Record>) -> Self {
        Dataset(Arc::new(records))
    }

    pub fn records(&self) -> &[Record] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.0.iter()
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Dataset::new(iter.into_iter().collect())
    }
}
