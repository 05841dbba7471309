use thiserror::Error;
use reqwest::Error as ReqwestError;
use tokio::io::Error as TokioIoError;

/// Errors that end a single dataflow run.
///
/// Configuration problems are caught before a run starts and live in
/// `etlflow_core::config::ConfigError`; everything here happens while a run
/// is in flight.
#[derive(Debug, Error)]
pub enum Error {
    #[error("source '{name}' failed: {reason}")]
    Source { name: String, reason: String },

    #[error("graph error: {0}")]
    Graph(String),

    #[error("sink '{name}' failed for {} path(s): {}", .failures.len(), format_failures(.failures))]
    Sink {
        name: String,
        /// (destination path, reason) for every path that could not be written.
        failures: Vec<(String, String)>,
    },

    #[error("sink '{sink}' has nothing to write: input '{input}' was never bound")]
    UnboundSinkInput { sink: String, input: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("unknown dataflow: {0}")]
    UnknownDataflow(String),

    #[error("Tokio Error: {0}")]
    TokioError(#[from] TokioIoError),

    #[error("JSON Error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Reqwest Error: {0}")]
    HttpError(#[from] ReqwestError),

    #[error("Store Error: {0}")]
    StoreError(#[from] rusqlite::Error),
}

impl Error {
    pub fn source_failed(name: impl Into<String>, reason: impl ToString) -> Self {
        Error::Source { name: name.into(), reason: reason.to_string() }
    }
}

fn format_failures(failures: &[(String, String)]) -> String {
    failures
        .iter()
        .map(|(path, reason)| format!("{path}: {reason}"))
        .collect::<Vec<_>>()
        .join("; ")
}
