use std::path::Path;
use crate::config::model::{self, Dataflow};
use crate::config::types::MetadataConfig;
use crate::dag::resolver::DagError;
use crate::transforms::{functions, rules};

/// Static errors found before a run starts. Every semantic variant carries
/// the path of the offending field in the document.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: {message}")]
    Invalid { path: String, message: String },
    #[error("{path}: unknown transformation type '{kind}' (expected validate_fields or add_fields)")]
    UnknownTransformation { path: String, kind: String },
    #[error("{path}: unknown validation rule '{rule}' (available: {})", rules::available().join(", "))]
    UnknownRule { path: String, rule: String },
    #[error("{path}: unknown field function '{function}' (available: {})", functions::available().join(", "))]
    UnknownFunction { path: String, function: String },
    #[error("{path}: function '{function}' requires argument '{argument}'")]
    MissingArgument { path: String, function: String, argument: String },
    #[error("{path}: input '{input}' is not produced by any source or earlier transformation")]
    UnresolvedInput { path: String, input: String },
    #[error("{path}: dataset '{name}' is already produced elsewhere")]
    DuplicateDataset { path: String, name: String },
    #[error("{path}: dataflow '{name}' is defined more than once")]
    DuplicateDataflow { path: String, name: String },
    #[error("{path}: unsupported format '{format}' (only JSON is supported)")]
    UnsupportedFormat { path: String, format: String },
    #[error("{path}: unknown save mode '{mode}' (expected OVERWRITE or APPEND)")]
    UnknownSaveMode { path: String, mode: String },
    #[error("DAG resolution failed: {0}")]
    Graph(#[from] DagError),
}

impl ConfigError {
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        ConfigError::Invalid { path: path.into(), message: message.into() }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
}

impl DocumentFormat {
    /// `.json` files are JSON, anything else is read as YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => DocumentFormat::Json,
            _ => DocumentFormat::Yaml,
        }
    }
}

/// Load a metadata document from a YAML or JSON file.
pub fn load_metadata(path: impl AsRef<Path>) -> Result<MetadataConfig, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)?;
    parse_metadata(&content, DocumentFormat::from_path(path))
}

/// Parse a metadata document from a string.
pub fn parse_metadata(text: &str, format: DocumentFormat) -> Result<MetadataConfig, ConfigError> {
    let config: MetadataConfig = match format {
        DocumentFormat::Yaml => serde_yaml::from_str(text)?,
        DocumentFormat::Json => serde_json::from_str(text)?,
    };
    Ok(config)
}

/// Load a metadata file and validate every dataflow in it.
pub fn load_dataflows(path: impl AsRef<Path>) -> Result<Vec<Dataflow>, ConfigError> {
    let config = load_metadata(path)?;
    model::validate_metadata(&config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::{TransformationKind, WriteMode};

    #[test]
    fn parse_yaml_dataflow() {
        let yaml = r#"
dataflows:
  - name: people
    sources:
      - name: person_inputs
        path: "/data/input/events/person/*"
        format: JSON
    transformations:
      - name: validation
        type: validate_fields
        params:
          input: person_inputs
          validations:
            - field: office
              validations: [notEmpty]
            - field: age
              validations: [notNull]
      - name: ok_with_date
        type: add_fields
        params:
          input: validation_ok
          addFields:
            - name: dt
              function: current_timestamp
    sinks:
      - name: raw-ok
        input: ok_with_date
        paths: ["/data/output/events/person"]
        format: JSON
        saveMode: OVERWRITE
      - name: raw-ko
        input: validation_ko
        paths: ["/data/output/discards/person"]
        format: JSON
        saveMode: APPEND
"#;

        let config = parse_metadata(yaml, DocumentFormat::Yaml).unwrap();
        assert_eq!(config.dataflows.len(), 1);
        let flow = &config.dataflows[0];
        assert_eq!(flow.name, "people");
        assert_eq!(flow.sources[0].path, "/data/input/events/person/*");
        assert_eq!(flow.transformations[0].kind, "validate_fields");
        assert_eq!(flow.transformations[1].params.add_fields.as_ref().unwrap()[0].function, "current_timestamp");
        assert_eq!(flow.sinks[1].save_mode, "APPEND");

        let dataflows = model::validate_metadata(&config).unwrap();
        assert!(matches!(dataflows[0].transformations[0].kind, TransformationKind::ValidateFields(_)));
        assert_eq!(dataflows[0].sinks[1].mode, WriteMode::Append);
    }

    #[test]
    fn parse_json_dataflow() {
        let json = r#"{
  "dataflows": [{
    "name": "prueba-acceso",
    "sources": [{"name": "person_inputs", "path": "/data/input/*", "format": "JSON"}],
    "transformations": [{
      "name": "validation",
      "type": "validate_fields",
      "params": {"input": "person_inputs", "validations": [{"field": "office", "validations": ["notEmpty"]}]}
    }],
    "sinks": [{"input": "validation_ok", "name": "raw-ok", "paths": ["/out"], "format": "JSON", "saveMode": "OVERWRITE"}]
  }]
}"#;

        let config = parse_metadata(json, DocumentFormat::Json).unwrap();
        assert_eq!(config.dataflows[0].name, "prueba-acceso");
        assert_eq!(config.dataflows[0].sinks[0].input, "validation_ok");
    }

    #[test]
    fn malformed_document_is_rejected() {
        let err = parse_metadata("dataflows: {not: a list}", DocumentFormat::Yaml).unwrap_err();
        assert!(matches!(err, ConfigError::Yaml(_)));

        let err = parse_metadata("{\"dataflows\": [", DocumentFormat::Json).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn format_follows_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("metadata.json")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("metadata.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("metadata.yaml")), DocumentFormat::Yaml);
        assert_eq!(DocumentFormat::from_path(Path::new("metadata")), DocumentFormat::Yaml);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metadata.json");
        std::fs::write(
            &path,
            r#"{"dataflows": [{"name": "f", "sources": [{"name": "s", "path": "/x/*", "format": "json"}],
                "sinks": [{"name": "out", "input": "s", "paths": ["/y"], "format": "JSON", "saveMode": "append"}]}]}"#,
        )
        .unwrap();

        let dataflows = load_dataflows(&path).unwrap();
        assert_eq!(dataflows[0].name, "f");
        assert_eq!(dataflows[0].sinks[0].mode, WriteMode::Append);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_metadata("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
