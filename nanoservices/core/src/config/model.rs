//! Validated, typed dataflow definitions.

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use serde_json::{Map, Value};

use crate::config::loader::ConfigError;
use crate::config::types::{DataflowConfig, MetadataConfig, SinkConfig, SourceConfig, TransformationConfig};
use crate::transforms::functions::FieldFunction;
use crate::transforms::rules::Rule;

pub const VALIDATE_FIELDS: &str = "validate_fields";
pub const ADD_FIELDS: &str = "add_fields";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
}

impl Format {
    fn parse(value: &str, path: &str) -> Result<Self, ConfigError> {
        if value.eq_ignore_ascii_case("json") {
            Ok(Format::Json)
        } else {
            Err(ConfigError::UnsupportedFormat { path: path.to_string(), format: value.to_string() })
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    /// Replace the destination content with exactly the dataset.
    Overwrite,
    /// Add the dataset after whatever the destination already holds.
    Append,
}

impl WriteMode {
    fn parse(value: &str, path: &str) -> Result<Self, ConfigError> {
        match value.to_ascii_uppercase().as_str() {
            "OVERWRITE" => Ok(WriteMode::Overwrite),
            "APPEND" => Ok(WriteMode::Append),
            _ => Err(ConfigError::UnknownSaveMode { path: path.to_string(), mode: value.to_string() }),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            WriteMode::Overwrite => "OVERWRITE",
            WriteMode::Append => "APPEND",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Dataflow {
    pub name: String,
    pub sources: Vec<Source>,
    pub transformations: Vec<Transformation>,
    pub sinks: Vec<Sink>,
}

#[derive(Debug, Clone)]
pub struct Source {
    /// Dataset name this source seeds.
    pub name: String,
    pub pattern: String,
    pub format: Format,
}

#[derive(Debug, Clone)]
pub struct Transformation {
    pub name: String,
    pub input: String,
    pub kind: TransformationKind,
}

#[derive(Debug, Clone)]
pub enum TransformationKind {
    ValidateFields(Vec<FieldRules>),
    AddFields(Vec<FieldAddition>),
}

impl TransformationKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TransformationKind::ValidateFields(_) => VALIDATE_FIELDS,
            TransformationKind::AddFields(_) => ADD_FIELDS,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldRules {
    pub field: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldAddition {
    pub field: String,
    pub function: FieldFunction,
    pub args: Map<String, Value>,
}

#[derive(Debug, Clone)]
pub struct Sink {
    pub name: String,
    pub input: String,
    pub paths: Vec<PathBuf>,
    pub format: Format,
    pub mode: WriteMode,
}

/// Dataset names a validation stage binds.
pub fn ok_name(transformation: &str) -> String {
    format!("{transformation}_ok")
}

pub fn ko_name(transformation: &str) -> String {
    format!("{transformation}_ko")
}

impl Transformation {
    /// Dataset names this transformation binds, in a fixed order.
    pub fn outputs(&self) -> Vec<String> {
        match self.kind {
            TransformationKind::ValidateFields(_) => vec![ok_name(&self.name), ko_name(&self.name)],
            TransformationKind::AddFields(_) => vec![self.name.clone()],
        }
    }
}

/// Validate every dataflow of a document. Dataflow names must be unique.
pub fn validate_metadata(config: &MetadataConfig) -> Result<Vec<Dataflow>, ConfigError> {
    let mut seen = HashSet::new();
    let mut dataflows = Vec::with_capacity(config.dataflows.len());
    for (i, flow) in config.dataflows.iter().enumerate() {
        let path = format!("dataflows[{i}]");
        if !seen.insert(flow.name.as_str()) {
            return Err(ConfigError::DuplicateDataflow { path: format!("{path}.name"), name: flow.name.clone() });
        }
        dataflows.push(Dataflow::from_config(flow, &path)?);
    }
    Ok(dataflows)
}

impl Dataflow {
    /// Check a dataflow document and build its typed form.
    ///
    /// Inputs must refer to a source or to an output of an earlier
    /// transformation; sinks may read any produced dataset.
    pub fn from_config(config: &DataflowConfig, path: &str) -> Result<Self, ConfigError> {
        if config.name.trim().is_empty() {
            return Err(ConfigError::invalid(format!("{path}.name"), "dataflow name must not be empty"));
        }

        // dataset name -> path of its producer
        let mut produced: HashMap<String, String> = HashMap::new();

        let mut sources = Vec::with_capacity(config.sources.len());
        for (i, src) in config.sources.iter().enumerate() {
            let at = format!("{path}.sources[{i}]");
            let source = Source::from_config(src, &at)?;
            bind(&mut produced, source.name.clone(), format!("{at}.name"))?;
            sources.push(source);
        }

        let mut transformations = Vec::with_capacity(config.transformations.len());
        for (i, t) in config.transformations.iter().enumerate() {
            let at = format!("{path}.transformations[{i}]");
            let transformation = Transformation::from_config(t, &at)?;
            if !produced.contains_key(&transformation.input) {
                return Err(ConfigError::UnresolvedInput {
                    path: format!("{at}.params.input"),
                    input: transformation.input.clone(),
                });
            }
            for output in transformation.outputs() {
                bind(&mut produced, output, format!("{at}.name"))?;
            }
            transformations.push(transformation);
        }

        let mut sinks = Vec::with_capacity(config.sinks.len());
        for (i, s) in config.sinks.iter().enumerate() {
            let at = format!("{path}.sinks[{i}]");
            let sink = Sink::from_config(s, &at)?;
            if !produced.contains_key(&sink.input) {
                return Err(ConfigError::UnresolvedInput { path: format!("{at}.input"), input: sink.input.clone() });
            }
            sinks.push(sink);
        }

        Ok(Dataflow { name: config.name.clone(), sources, transformations, sinks })
    }
}

fn bind(produced: &mut HashMap<String, String>, name: String, at: String) -> Result<(), ConfigError> {
    if produced.contains_key(&name) {
        return Err(ConfigError::DuplicateDataset { path: at, name });
    }
    produced.insert(name, at);
    Ok(())
}

impl Source {
    fn from_config(config: &SourceConfig, path: &str) -> Result<Self, ConfigError> {
        if config.name.trim().is_empty() {
            return Err(ConfigError::invalid(format!("{path}.name"), "source name must not be empty"));
        }
        if config.path.trim().is_empty() {
            return Err(ConfigError::invalid(format!("{path}.path"), "source path must not be empty"));
        }
        Ok(Source {
            name: config.name.clone(),
            pattern: config.path.clone(),
            format: Format::parse(&config.format, &format!("{path}.format"))?,
        })
    }
}

impl Transformation {
    fn from_config(config: &TransformationConfig, path: &str) -> Result<Self, ConfigError> {
        if config.name.trim().is_empty() {
            return Err(ConfigError::invalid(format!("{path}.name"), "transformation name must not be empty"));
        }
        let params = &config.params;
        let kind = match config.kind.as_str() {
            VALIDATE_FIELDS => {
                let Some(validations) = &params.validations else {
                    return Err(ConfigError::invalid(
                        format!("{path}.params.validations"),
                        "validate_fields requires a validations list",
                    ));
                };
                let mut fields = Vec::with_capacity(validations.len());
                for (i, v) in validations.iter().enumerate() {
                    let at = format!("{path}.params.validations[{i}]");
                    let mut rules = Vec::with_capacity(v.validations.len());
                    for (j, name) in v.validations.iter().enumerate() {
                        let rule = Rule::from_name(name).ok_or_else(|| ConfigError::UnknownRule {
                            path: format!("{at}.validations[{j}]"),
                            rule: name.clone(),
                        })?;
                        rules.push(rule);
                    }
                    fields.push(FieldRules { field: v.field.clone(), rules });
                }
                TransformationKind::ValidateFields(fields)
            }
            ADD_FIELDS => {
                let Some(additions) = &params.add_fields else {
                    return Err(ConfigError::invalid(
                        format!("{path}.params.addFields"),
                        "add_fields requires an addFields list",
                    ));
                };
                let mut fields = Vec::with_capacity(additions.len());
                for (i, a) in additions.iter().enumerate() {
                    let at = format!("{path}.params.addFields[{i}]");
                    let function = FieldFunction::from_name(&a.function).ok_or_else(|| ConfigError::UnknownFunction {
                        path: format!("{at}.function"),
                        function: a.function.clone(),
                    })?;
                    if let Some(missing) = function.required_args().iter().find(|arg| !a.args.contains_key(**arg)) {
                        return Err(ConfigError::MissingArgument {
                            path: format!("{at}.args"),
                            function: a.function.clone(),
                            argument: missing.to_string(),
                        });
                    }
                    fields.push(FieldAddition { field: a.name.clone(), function, args: a.args.clone() });
                }
                TransformationKind::AddFields(fields)
            }
            other => {
                return Err(ConfigError::UnknownTransformation { path: format!("{path}.type"), kind: other.to_string() });
            }
        };
        Ok(Transformation { name: config.name.clone(), input: params.input.clone(), kind })
    }
}

impl Sink {
    fn from_config(config: &SinkConfig, path: &str) -> Result<Self, ConfigError> {
        if config.paths.is_empty() {
            return Err(ConfigError::invalid(format!("{path}.paths"), "sink needs at least one path"));
        }
        Ok(Sink {
            name: config.name.clone(),
            input: config.input.clone(),
            paths: config.paths.iter().map(PathBuf::from).collect(),
            format: Format::parse(&config.format, &format!("{path}.format"))?,
            mode: WriteMode::parse(&config.save_mode, &format!("{path}.saveMode"))?,
        })
    }
}
