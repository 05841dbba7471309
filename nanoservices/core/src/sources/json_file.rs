use async_trait::async_trait;
use serde_json::{Deserializer, Value};
use std::path::PathBuf;

use etlflow_utils::error::Error;
use etlflow_utils::{Dataset, EtlResult, Record};
use super::traits::Source;

/// Reads JSON objects from every file matching a glob pattern.
///
/// A file may hold a single object, an array of objects, or a stream of
/// objects separated by whitespace (newline-delimited JSON). Files are read
/// in sorted path order and records keep their order within a file.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    name: String,
    pattern: String,
}

impl JsonFileSource {
    pub fn new(name: impl Into<String>, pattern: impl Into<String>) -> Self {
        Self { name: name.into(), pattern: pattern.into() }
    }

    /// Regular files matched by the pattern, sorted.
    fn matched_files(&self) -> EtlResult<Vec<PathBuf>> {
        let entries = glob::glob(&self.pattern)
            .map_err(|e| Error::source_failed(&self.name, format!("invalid pattern '{}': {e}", self.pattern)))?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| Error::source_failed(&self.name, e))?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

#[async_trait]
impl Source for JsonFileSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn produces(&self) -> &str {
        &self.name
    }

    async fn extract(&self) -> EtlResult<Dataset> {
        let files = self.matched_files()?;
        if files.is_empty() {
            return Err(Error::source_failed(
                &self.name,
                format!("pattern '{}' matched no files", self.pattern),
            ));
        }

        let mut records = Vec::new();
        for file in &files {
            let text = tokio::fs::read_to_string(file)
                .await
                .map_err(|e| Error::source_failed(&self.name, format!("{}: {e}", file.display())))?;
            let before = records.len();
            parse_file(&text, &file.display().to_string(), &self.name, &mut records)
                .map_err(|reason| Error::source_failed(&self.name, format!("{}: {reason}", file.display())))?;
            tracing::debug!(source = %self.name, file = %file.display(), records = records.len() - before, "file loaded");
        }

        tracing::info!(source = %self.name, files = files.len(), records = records.len(), "source extracted");
        Ok(Dataset::new(records))
    }
}

fn parse_file(text: &str, file: &str, origin: &str, out: &mut Vec<Record>) -> Result<(), String> {
    let origin_file: std::sync::Arc<str> = file.into();
    for value in Deserializer::from_str(text).into_iter::<Value>() {
        match value.map_err(|e| format!("invalid JSON: {e}"))? {
            Value::Object(fields) => out.push(Record::loaded(fields, origin_file.clone(), origin)),
            Value::Array(items) => {
                for (i, item) in items.into_iter().enumerate() {
                    let Value::Object(fields) = item else {
                        return Err(format!("array element {i} is not a JSON object"));
                    };
                    out.push(Record::loaded(fields, origin_file.clone(), origin));
                }
            }
            other => return Err(format!("expected a JSON object or array, found {}", type_name(&other))),
        }
    }
    Ok(())
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write(dir: &std::path::Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).unwrap();
    }

    #[tokio::test]
    async fn reads_arrays_objects_and_streams_in_file_order() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "b.json", r#"{"id": "b1"}
{"id": "b2"}"#);
        write(dir.path(), "a.json", r#"[{"id": "a1"}, {"id": "a2"}]"#);
        write(dir.path(), "c.json", r#"{"id": "c1", "name": "x"}"#);

        let pattern = format!("{}/*.json", dir.path().display());
        let source = JsonFileSource::new("people", pattern);
        let data = source.extract().await.unwrap();

        let ids: Vec<&str> = data.iter().map(|r| r.id()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1", "b2", "c1"]);
        assert!(data.records()[0].source_file().ends_with("a.json"));
        assert_eq!(data.records()[4].get("name"), Some(&json!("x")));
        assert_eq!(data.records()[0].trail_path(), "people");
    }

    #[tokio::test]
    async fn zero_matches_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = JsonFileSource::new("people", format!("{}/*.json", dir.path().display()));
        let err = source.extract().await.unwrap_err();
        assert!(matches!(err, Error::Source { ref name, .. } if name == "people"));
        assert!(err.to_string().contains("matched no files"));
    }

    #[tokio::test]
    async fn unparseable_file_is_a_source_error() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "good.json", r#"{"id": 1}"#);
        write(dir.path(), "bad.json", r#"{"id": 1"#);
        let source = JsonFileSource::new("people", format!("{}/*", dir.path().display()));
        let err = source.extract().await.unwrap_err();
        assert!(err.to_string().contains("bad.json"), "{err}");
    }

    #[tokio::test]
    async fn scalar_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "nums.json", "[1, 2]");
        let source = JsonFileSource::new("people", format!("{}/*", dir.path().display()));
        let err = source.extract().await.unwrap_err();
        assert!(err.to_string().contains("not a JSON object"), "{err}");
    }

    #[tokio::test]
    async fn directories_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        write(dir.path(), "one.json", r#"{"k": 1}"#);
        let source = JsonFileSource::new("people", format!("{}/*", dir.path().display()));
        assert_eq!(source.extract().await.unwrap().len(), 1);
    }
}
