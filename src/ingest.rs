//! Uploaded/pasted file ingestion: type detection, parsing and schema checks.

use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use serde_json::Value;

use crate::constants::{CSV_HEADER, MIME_CSV, MIME_EXCEL_CSV, MIME_JSON, MIME_UNKNOWN, NPI_LEN};
use crate::error::IngestError;
use crate::schema::{PractitionerRecord, validate_batch_shape};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Csv,
    Json,
}

/// Maps a declared content type onto a supported file kind.
pub fn classify(content_type: &str) -> Result<FileKind, IngestError> {
    let normalized = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    match normalized.as_str() {
        MIME_CSV | MIME_EXCEL_CSV => Ok(FileKind::Csv),
        MIME_JSON => Ok(FileKind::Json),
        _ => Err(IngestError::UnsupportedFileType(content_type.to_string())),
    }
}

/// Best-effort content type from a file extension.
pub fn content_type_for_path(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|x| x.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match extension.as_str() {
        "csv" => MIME_CSV,
        "json" => MIME_JSON,
        _ => MIME_UNKNOWN,
    }
}

/// Outcome of parsing a file. Never partially applied.
#[derive(Debug)]
pub enum IngestionResult {
    Valid(Vec<PractitionerRecord>),
    Invalid(IngestError),
}

impl IngestionResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, IngestionResult::Valid(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub name: String,
    pub size_bytes: u64,
}

#[derive(Debug)]
pub struct Ingestion {
    pub summary: FileSummary,
    pub result: IngestionResult,
}

#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub path: PathBuf,
    pub content_type: String,
}

impl UploadedFile {
    /// Uses the declared type if given, otherwise guesses from the extension.
    pub fn new(path: impl Into<PathBuf>, content_type: Option<&str>) -> Self {
        let path = path.into();
        let content_type = content_type
            .map(str::to_string)
            .unwrap_or_else(|| content_type_for_path(&path).to_string());
        Self { path, content_type }
    }
}

/// Reads and validates an uploaded file. Unsupported types are rejected before
/// the contents are read.
pub async fn ingest(file: &UploadedFile) -> Ingestion {
    let name = file
        .path
        .file_name()
        .and_then(|x| x.to_str())
        .unwrap_or_default()
        .to_string();
    let size_bytes = tokio::fs::metadata(&file.path)
        .await
        .map(|m| m.len())
        .unwrap_or_default();
    let summary = FileSummary { name, size_bytes };

    let kind = match classify(&file.content_type) {
        Ok(kind) => kind,
        Err(err) => {
            tracing::warn!("rejecting {}: {}", summary.name, err);
            return Ingestion {
                summary,
                result: IngestionResult::Invalid(err),
            };
        }
    };

    let result = match tokio::fs::read(&file.path).await {
        Ok(bytes) => ingest_bytes(kind, &bytes),
        Err(source) => IngestionResult::Invalid(IngestError::Read {
            path: file.path.display().to_string(),
            source,
        }),
    };
    match &result {
        IngestionResult::Valid(records) => tracing::info!(
            "ingested {} ({} bytes): {} records",
            summary.name,
            summary.size_bytes,
            records.len()
        ),
        IngestionResult::Invalid(err) => {
            tracing::warn!("ingestion of {} failed [{}]: {}", summary.name, err.reason(), err)
        }
    }
    Ingestion { summary, result }
}

pub fn ingest_text(kind: FileKind, text: &str) -> IngestionResult {
    ingest_bytes(kind, text.as_bytes())
}

/// Parses raw file contents. A leading UTF-8 byte-order mark is ignored.
pub fn ingest_bytes(kind: FileKind, bytes: &[u8]) -> IngestionResult {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    match kind {
        FileKind::Json => match std::str::from_utf8(bytes) {
            Ok(text) => parse_json_text(text),
            Err(err) => IngestionResult::Invalid(IngestError::FormatMismatch(format!(
                "file is not valid UTF-8 ({err})"
            ))),
        },
        FileKind::Csv => parse_csv_bytes(bytes),
    }
}

/// Parses `{"practitioners": [...]}`; any invalid record rejects the whole text.
pub fn parse_json_text(text: &str) -> IngestionResult {
    let text = text.strip_prefix('\u{FEFF}').unwrap_or(text);
    let value: Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(err) => return IngestionResult::Invalid(IngestError::FormatMismatch(err.to_string())),
    };
    match validate_batch_shape(&value) {
        Ok(records) => IngestionResult::Valid(records),
        Err(err) => IngestionResult::Invalid(err),
    }
}

pub fn parse_csv_text(text: &str) -> IngestionResult {
    parse_csv_bytes(text.as_bytes())
}

/// Parses `first_name,last_name,npi` CSV. Malformed or undecodable rows are
/// dropped; only a header mismatch rejects the file. Zero surviving rows is
/// still `Valid`. Cells are split on every comma (no quoting).
pub fn parse_csv_bytes(bytes: &[u8]) -> IngestionResult {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .trim(Trim::All)
        .from_reader(bytes);

    let header_ok = match reader.headers() {
        Ok(headers) => headers.iter().eq(CSV_HEADER),
        Err(err) => {
            tracing::debug!("unreadable CSV header: {err}");
            false
        }
    };
    if !header_ok {
        return IngestionResult::Invalid(IngestError::HeaderMismatch);
    }

    let mut records = Vec::new();
    let mut dropped = 0usize;
    for row in reader.records() {
        match row {
            Ok(row) => match record_from_row(&row) {
                Some(record) => records.push(record),
                None => {
                    dropped += 1;
                    tracing::debug!(
                        "dropping malformed CSV row {}: {:?}",
                        row.position().map(|p| p.line()).unwrap_or_default(),
                        row
                    );
                }
            },
            Err(err) => {
                dropped += 1;
                tracing::debug!("dropping undecodable CSV row: {err}");
            }
        }
    }
    if dropped > 0 {
        tracing::warn!("dropped {dropped} malformed CSV rows");
    }
    IngestionResult::Valid(records)
}

fn record_from_row(row: &StringRecord) -> Option<PractitionerRecord> {
    if row.len() != CSV_HEADER.len() {
        return None;
    }
    let (first_name, last_name, npi) = (row.get(0)?, row.get(1)?, row.get(2)?);
    if first_name.is_empty() || last_name.is_empty() || npi.chars().count() != NPI_LEN {
        return None;
    }
    Some(PractitionerRecord::new(first_name, last_name, npi))
}
