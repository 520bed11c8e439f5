//! Pure state transitions over a [`QueryBatch`].
//!
//! Every operation takes the current batch by value and returns the next one,
//! so callers can keep the previous batch around (failed ingestion is a no-op).

use std::{fmt, str::FromStr};

use crate::error::IngestError;
use crate::ingest::IngestionResult;
use crate::schema::{EndpointSelector, Field, PractitionerRecord, QueryBatch};

/// The three mutually exclusive ways of assembling a batch. Switching modes
/// never touches the batch itself.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InputMode {
    #[default]
    Manual,
    PasteJson,
    Upload,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            InputMode::Manual => "manual",
            InputMode::PasteJson => "json",
            InputMode::Upload => "upload",
        })
    }
}

impl FromStr for InputMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "manual" | "form" => Ok(InputMode::Manual),
            "json" | "paste" => Ok(InputMode::PasteJson),
            "upload" | "file" => Ok(InputMode::Upload),
            other => Err(format!("unknown mode {other:?} (expected manual, json or upload)")),
        }
    }
}

pub fn add_record(mut batch: QueryBatch) -> QueryBatch {
    batch.practitioners.push(PractitionerRecord::default());
    batch
}

/// Replaces one field of the record at `index`.
///
/// Panics if `index` is out of range; callers only ever hold valid indices.
pub fn update_record(
    mut batch: QueryBatch,
    index: usize,
    field: Field,
    value: impl Into<String>,
) -> QueryBatch {
    let len = batch.practitioners.len();
    assert!(index < len, "update_record index {index} out of range for batch of {len}");
    batch.practitioners[index].set(field, value);
    batch
}

/// Removes the record at `index`. The last remaining record is never removed.
///
/// Panics if `index` is out of range.
pub fn remove_record(mut batch: QueryBatch, index: usize) -> QueryBatch {
    let len = batch.practitioners.len();
    assert!(index < len, "remove_record index {index} out of range for batch of {len}");
    if len > 1 {
        batch.practitioners.remove(index);
    }
    batch
}

pub fn set_endpoint(batch: QueryBatch, endpoint: EndpointSelector) -> QueryBatch {
    QueryBatch { endpoint, ..batch }
}

pub fn set_consensus(batch: QueryBatch, consensus: bool) -> QueryBatch {
    QueryBatch { consensus, ..batch }
}

/// Applies an ingestion outcome. On success the practitioner list is replaced
/// wholesale and the query options are kept; on failure the batch comes back
/// unchanged together with the reason.
pub fn merge_ingested(
    batch: QueryBatch,
    result: IngestionResult,
) -> (QueryBatch, Option<IngestError>) {
    match result {
        IngestionResult::Valid(records) if records.is_empty() => {
            (batch, Some(IngestError::EmptyBatch))
        }
        IngestionResult::Valid(records) => (
            QueryBatch {
                practitioners: records,
                ..batch
            },
            None,
        ),
        IngestionResult::Invalid(err) => (batch, Some(err)),
    }
}

pub fn clear() -> QueryBatch {
    QueryBatch::default()
}
