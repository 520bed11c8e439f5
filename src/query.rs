//! One-shot mode: build a batch, submit it once, print and optionally save
//! the results.

use std::{io::Write, path::PathBuf, time::Duration};

use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};

use crate::builder;
use crate::dispatch::{DispatchStatus, Dispatcher};
use crate::ingest::{self, FileKind, UploadedFile};
use crate::present::{ResultsView, SortDirection, download_results, export_file_name, export_table_csv};
use crate::render;
use crate::response::Column;
use crate::schema::{EndpointSelector, PractitionerRecord, QueryBatch};

/// Where the batch comes from. `Single` skips the batch and looks up one
/// practitioner on its own.
#[derive(Debug, Clone)]
pub enum BatchSource {
    Records(Vec<PractitionerRecord>),
    Single(PractitionerRecord),
    Json(String),
    File {
        path: PathBuf,
        content_type: Option<String>,
    },
}

#[derive(Debug, Clone)]
pub struct QueryPlan {
    pub source: BatchSource,
    pub endpoint: EndpointSelector,
    pub consensus: bool,
    pub page_size: usize,
    pub sort: Option<(Column, SortDirection)>,
    pub download_dir: Option<PathBuf>,
    pub export_csv_dir: Option<PathBuf>,
}

pub async fn build_batch<W: Write>(plan: &QueryPlan, out: &mut W) -> Result<QueryBatch> {
    let batch = builder::set_consensus(
        builder::set_endpoint(QueryBatch::default(), plan.endpoint),
        plan.consensus,
    );
    let result = match &plan.source {
        BatchSource::Records(records) => ingest::IngestionResult::Valid(records.clone()),
        BatchSource::Single(record) => ingest::IngestionResult::Valid(vec![record.clone()]),
        BatchSource::Json(text) => ingest::ingest_text(FileKind::Json, text),
        BatchSource::File { path, content_type } => {
            let ingestion = ingest::ingest(&UploadedFile::new(path, content_type.as_deref())).await;
            writeln!(
                out,
                "File uploaded: {} (Size: {} bytes)",
                ingestion.summary.name, ingestion.summary.size_bytes
            )?;
            ingestion.result
        }
    };
    let (batch, error) = builder::merge_ingested(batch, result);
    if let Some(err) = error {
        bail!("Invalid input [{}]: {}", err.reason(), err);
    }
    Ok(batch)
}

/// Runs the plan to completion and writes the rendered results to `out`.
pub async fn run_query<W: Write>(mut dispatcher: Dispatcher, plan: QueryPlan, out: &mut W) -> Result<()> {
    let batch = build_batch(&plan, out).await?;
    let submitted = match &plan.source {
        BatchSource::Single(record) => dispatcher.submit_single(record, plan.endpoint, plan.consensus),
        _ => dispatcher.submit(&batch),
    };
    if let Err(errors) = submitted {
        write!(out, "{}", render::render_field_errors(&errors))?;
        bail!("batch failed validation ({} problems)", errors.len());
    }

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]") {
        spinner.set_style(style);
    }
    spinner.set_message(format!("Looking up {} practitioners", batch.len()));
    spinner.enable_steady_tick(Duration::from_millis(120));
    let status = dispatcher.settle().await;
    spinner.finish_and_clear();

    if status == DispatchStatus::Error {
        if let Some(err) = dispatcher.error() {
            write!(out, "{}", render::render_dispatch_error(err))?;
        }
        bail!("lookup failed");
    }
    let Some(response) = dispatcher.response() else {
        bail!("lookup finished without a response");
    };

    let mut view = ResultsView::new(plan.page_size);
    view.load(response);
    if let Some((column, direction)) = plan.sort {
        let keys: Vec<String> = view.tables().iter().map(|t| t.key().to_string()).collect();
        for key in keys {
            if let Some(table) = view.table_mut(&key) {
                table.sort_by(column, direction);
            }
        }
    }
    write!(out, "{}", render::render_results(&view))?;

    if let Some(dir) = &plan.download_dir {
        let path = download_results(Some(response), dispatcher.is_pending(), dir)?;
        writeln!(out, "saved {}", path.display())?;
    }
    if let Some(dir) = &plan.export_csv_dir {
        for table in view.tables() {
            let path = dir.join(export_file_name(table.key()));
            export_table_csv(table, &path)
                .with_context(|| format!("Failed exporting group {}", table.key()))?;
            writeln!(out, "exported {}", path.display())?;
        }
    }
    Ok(())
}
