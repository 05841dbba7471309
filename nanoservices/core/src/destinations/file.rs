use async_trait::async_trait;
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use etlflow_utils::error::Error;
use etlflow_utils::{Dataset, EtlResult};
use super::traits::Destination;
use crate::config::model::WriteMode;

/// File written inside every destination directory.
pub const OUTPUT_FILE: &str = "output.json";

/// Writes a dataset as newline-delimited JSON to `<path>/output.json` for
/// each configured path.
///
/// `Overwrite` replaces the file through a temporary file and a rename.
/// `Append` adds lines to whatever is already there, so running it twice
/// writes every record twice.
#[derive(Debug, Clone)]
pub struct JsonFileDestination {
    name: String,
    input: String,
    paths: Vec<PathBuf>,
    mode: WriteMode,
}

impl JsonFileDestination {
    pub fn new(name: impl Into<String>, input: impl Into<String>, paths: Vec<PathBuf>, mode: WriteMode) -> Self {
        Self { name: name.into(), input: input.into(), paths, mode }
    }

    async fn write_one(&self, dir: &Path, body: &[u8]) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir).await?;
        let target = dir.join(OUTPUT_FILE);
        match self.mode {
            WriteMode::Overwrite => {
                let tmp = dir.join(format!(".{OUTPUT_FILE}.{}.tmp", uuid::Uuid::new_v4()));
                if let Err(e) = replace_via(&tmp, &target, body).await {
                    let _ = fs::remove_file(&tmp).await;
                    return Err(e);
                }
            }
            WriteMode::Append => {
                let mut file = OpenOptions::new().create(true).append(true).open(&target).await?;
                file.write_all(body).await?;
                file.flush().await?;
            }
        }
        Ok(target)
    }
}

/// Write `body` to `tmp`, then rename it over `target`. The caller removes
/// `tmp` on error.
async fn replace_via(tmp: &Path, target: &Path, body: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(tmp).await?;
    file.write_all(body).await?;
    file.flush().await?;
    file.sync_all().await?;
    drop(file);
    fs::rename(tmp, target).await
}

/// One JSON document per line.
pub fn to_ndjson(data: &Dataset) -> EtlResult<Vec<u8>> {
    let mut body = Vec::new();
    for record in data.iter() {
        serde_json::to_writer(&mut body, &record.to_output())?;
        body.push(b'\n');
    }
    Ok(body)
}

#[async_trait]
impl Destination for JsonFileDestination {
    fn name(&self) -> &str {
        &self.name
    }

    fn consumes(&self) -> &str {
        &self.input
    }

    async fn load(&self, data: &Dataset) -> EtlResult<Vec<PathBuf>> {
        let body = to_ndjson(data)?;

        // every path is attempted even if another one fails
        let results = join_all(self.paths.iter().map(|dir| self.write_one(dir, &body))).await;

        let mut written = Vec::with_capacity(results.len());
        let mut failures = Vec::new();
        for (dir, result) in self.paths.iter().zip(results) {
            match result {
                Ok(path) => written.push(path),
                Err(e) => {
                    tracing::error!(sink = %self.name, path = %dir.display(), error = %e, "sink path failed");
                    failures.push((dir.display().to_string(), e.to_string()));
                }
            }
        }

        if !failures.is_empty() {
            return Err(Error::Sink { name: self.name.clone(), failures });
        }

        tracing::info!(
            sink = %self.name,
            mode = self.mode.as_str(),
            paths = written.len(),
            records = data.len(),
            "sink written"
        );
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use etlflow_utils::{FieldFailure, Fields, Record};
    use serde_json::{json, Value};

    fn data(n: usize) -> Dataset {
        (0..n)
            .map(|i| {
                let mut r = Record::new(i.to_string(), "in.json", Fields::new());
                r.set("n", json!(i));
                r
            })
            .collect()
    }

    fn lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn overwrite_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("events/person");
        let sink = JsonFileDestination::new("raw-ok", "ok", vec![out.clone()], WriteMode::Overwrite);

        sink.load(&data(3)).await.unwrap();
        let once = std::fs::read(out.join(OUTPUT_FILE)).unwrap();
        sink.load(&data(3)).await.unwrap();
        let twice = std::fs::read(out.join(OUTPUT_FILE)).unwrap();

        assert_eq!(once, twice);
        assert_eq!(lines(&out.join(OUTPUT_FILE)).len(), 3);
        // no temporary files left behind
        assert_eq!(std::fs::read_dir(&out).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn append_doubles_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("discards");
        let sink = JsonFileDestination::new("raw-ko", "ko", vec![out.clone()], WriteMode::Append);

        sink.load(&data(2)).await.unwrap();
        sink.load(&data(2)).await.unwrap();

        let ns: Vec<Value> = lines(&out.join(OUTPUT_FILE)).into_iter().map(|v| v["n"].clone()).collect();
        assert_eq!(ns, vec![json!(0), json!(1), json!(0), json!(1)]);
    }

    #[tokio::test]
    async fn every_path_gets_a_full_copy() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a");
        let b = dir.path().join("b");
        let sink = JsonFileDestination::new("fan", "ok", vec![a.clone(), b.clone()], WriteMode::Overwrite);

        let written = sink.load(&data(4)).await.unwrap();
        assert_eq!(written, vec![a.join(OUTPUT_FILE), b.join(OUTPUT_FILE)]);
        assert_eq!(lines(&a.join(OUTPUT_FILE)), lines(&b.join(OUTPUT_FILE)));
    }

    #[tokio::test]
    async fn one_bad_path_fails_the_sink_but_not_the_others() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();
        let good = dir.path().join("good");
        let sink = JsonFileDestination::new("mixed", "ok", vec![blocker.join("out"), good.clone()], WriteMode::Overwrite);

        let err = sink.load(&data(1)).await.unwrap_err();
        let Error::Sink { name, failures } = err else { panic!("expected sink error") };
        assert_eq!(name, "mixed");
        assert_eq!(failures.len(), 1);
        assert!(good.join(OUTPUT_FILE).exists());
    }

    #[tokio::test]
    async fn failed_overwrite_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        // a non-empty directory where the output file should go makes the rename fail
        std::fs::create_dir_all(out.join(OUTPUT_FILE).join("occupied")).unwrap();
        let sink = JsonFileDestination::new("stuck", "ok", vec![out.clone()], WriteMode::Overwrite);

        let err = sink.load(&data(2)).await.unwrap_err();
        assert!(matches!(err, Error::Sink { ref failures, .. } if failures.len() == 1));

        let names: Vec<String> = std::fs::read_dir(&out)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![OUTPUT_FILE.to_string()]);
    }

    #[test]
    fn failing_records_carry_errors_by_field() {
        let mut r = Record::new("1", "in.json", Fields::new());
        r.set("name", json!("Miguel"));
        r.set("office", json!(""));
        r.set_failures(vec![FieldFailure { field: "office".into(), rule: "notEmpty".into() }]);
        let body = to_ndjson(&Dataset::new(vec![r])).unwrap();
        let text = String::from_utf8(body).unwrap();
        assert_eq!(
            text.trim_end(),
            r#"{"name":"Miguel","office":"","arraycoderrorbyfield":{"office":["notEmpty"]}}"#
        );
    }
}
