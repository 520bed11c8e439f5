use thiserror::Error;

use crate::schema::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FieldProblem {
    #[error("is missing")]
    Missing,
    #[error("is not a string")]
    NotAString,
    #[error("is empty")]
    Empty,
    #[error("must be exactly 10 characters")]
    BadNpiLength,
}

/// A single field that failed validation, optionally tagged with the record's
/// position in the batch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}{} {}", record_prefix(.index), .field, .problem)]
pub struct FieldError {
    pub index: Option<usize>,
    pub field: Field,
    pub problem: FieldProblem,
}

impl FieldError {
    pub fn new(field: Field, problem: FieldProblem) -> Self {
        Self {
            index: None,
            field,
            problem,
        }
    }

    pub fn at(mut self, index: usize) -> Self {
        self.index = Some(index);
        self
    }
}

fn record_prefix(index: &Option<usize>) -> String {
    index.map(|i| format!("record {i}: ")).unwrap_or_default()
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported file type {0:?}; only CSV or JSON files can be uploaded")]
    UnsupportedFileType(String),

    #[error("The JSON did not match the required format: {0}")]
    FormatMismatch(String),

    #[error("The CSV header must be exactly first_name,last_name,npi")]
    HeaderMismatch,

    #[error("The file contained no usable practitioner records")]
    EmptyBatch,

    #[error("Failed reading {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl IngestError {
    /// Stable machine-readable reason code.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::UnsupportedFileType(_) => "invalid-file-type",
            IngestError::FormatMismatch(_) => "format-mismatch",
            IngestError::HeaderMismatch => "header-mismatch",
            IngestError::EmptyBatch => "empty-batch",
            IngestError::Read { .. } => "read-failed",
        }
    }
}

/// Everything needed to reproduce a failed lookup call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}\n  url:  {}\n  body: {}", status_line(.status_code, .message), .attempted_url, .attempted_body)]
pub struct DispatchError {
    pub status_code: Option<u16>,
    pub message: String,
    pub attempted_url: String,
    pub attempted_body: String,
}

fn status_line(status_code: &Option<u16>, message: &str) -> String {
    match status_code {
        Some(code) => format!("HTTP {code}: {message}"),
        None => format!("Request failed: {message}"),
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("No results to download yet; submit a query first")]
    NoResponse,

    #[error("A request is still pending; wait for it to finish before downloading")]
    RequestPending,

    #[error("Failed serializing results: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("No result group named {0:?}")]
    UnknownGroup(String),

    #[error("Failed writing CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Failed writing {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
