//! Line-driven interactive session. The session is the single owner of the
//! batch, dispatcher and presentation state; user commands and request
//! completions are processed one at a time on the same task.

use std::{
    path::{Path, PathBuf},
    str::FromStr,
};

use anyhow::Context;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::builder::{self, InputMode};
use crate::constants::REQUIRED_JSON_FORMAT;
use crate::dispatch::{Applied, Completion, DispatchStatus, Dispatcher, SubmitOutcome};
use crate::ingest::{self, FileKind, FileSummary, IngestionResult, UploadedFile};
use crate::present::{ResultsView, SortDirection, download_results, export_table_csv};
use crate::render;
use crate::response::Column;
use crate::schema::{EndpointSelector, Field, PractitionerRecord, QueryBatch};

pub const HELP: &str = "\
Commands:
  mode manual|json|upload        switch input mode (keeps the batch)
  add                            append a blank record            [manual]
  set INDEX FIELD VALUE          edit first_name/last_name/npi    [manual]
  remove INDEX                   remove a record (never the last) [manual]
  paste JSON                     replace records from pasted JSON [json]
  upload PATH [MIME]             replace records from a CSV/JSON  [upload]
  unload                         remove the selected file         [upload]
  endpoint NAME                  All, Kaiser, Humana, Cigna, PacificSource, Centene
  consensus true|false
  show                           print the current batch
  submit | wait | retry | cancel | dismiss
  lookup FIRST LAST NPI          look up one practitioner (batch untouched)
  results                        print result tables
  toggle KEY                     collapse/expand a result group
  sort KEY COLUMN [asc|desc]     sort a result group
  page KEY N                     go to page N (1-based) of a result group
  download [DIR]                 write data.json with the live results
  export KEY PATH                write one result group as CSV
  clear                          reset the batch
  help | quit
";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Mode(InputMode),
    Add,
    Set {
        index: usize,
        field: Field,
        value: String,
    },
    Remove(usize),
    Paste(String),
    Upload {
        path: PathBuf,
        content_type: Option<String>,
    },
    Unload,
    Endpoint(EndpointSelector),
    Consensus(bool),
    Show,
    Submit,
    Lookup(PractitionerRecord),
    Wait,
    Retry,
    Cancel,
    Dismiss,
    Results,
    Toggle(String),
    Sort {
        key: String,
        column: Column,
        direction: Option<SortDirection>,
    },
    Page {
        key: String,
        page: usize,
    },
    Download(Option<PathBuf>),
    Export {
        key: String,
        path: PathBuf,
    },
    Clear,
    Help,
    Quit,
}

fn parse_bool(text: &str) -> Result<bool, String> {
    match text.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        other => Err(format!("expected true or false, got {other:?}")),
    }
}

fn parse_index(text: &str) -> Result<usize, String> {
    text.parse::<usize>()
        .map_err(|_| format!("expected a record index, got {text:?}"))
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (verb, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let args: Vec<&str> = rest.split_whitespace().collect();
        let need = |n: usize, usage: &str| -> Result<(), String> {
            if args.len() < n {
                Err(format!("usage: {usage}"))
            } else {
                Ok(())
            }
        };

        let command = match verb.to_ascii_lowercase().as_str() {
            "mode" => {
                need(1, "mode manual|json|upload")?;
                Command::Mode(args[0].parse()?)
            }
            "add" => Command::Add,
            "set" => {
                need(2, "set INDEX FIELD VALUE")?;
                let index = parse_index(args[0])?;
                let field = args[1].parse()?;
                let value = rest
                    .splitn(3, char::is_whitespace)
                    .nth(2)
                    .unwrap_or("")
                    .trim()
                    .to_string();
                Command::Set {
                    index,
                    field,
                    value,
                }
            }
            "remove" => {
                need(1, "remove INDEX")?;
                Command::Remove(parse_index(args[0])?)
            }
            "paste" => {
                if rest.is_empty() {
                    return Err("usage: paste JSON".to_string());
                }
                Command::Paste(rest.to_string())
            }
            "upload" => {
                need(1, "upload PATH [MIME]")?;
                Command::Upload {
                    path: PathBuf::from(args[0]),
                    content_type: args.get(1).map(|s| s.to_string()),
                }
            }
            "unload" => Command::Unload,
            "endpoint" => {
                need(1, "endpoint NAME")?;
                Command::Endpoint(args[0].parse()?)
            }
            "consensus" => {
                need(1, "consensus true|false")?;
                Command::Consensus(parse_bool(args[0])?)
            }
            "show" => Command::Show,
            "submit" => Command::Submit,
            "lookup" => {
                need(3, "lookup FIRST LAST NPI")?;
                Command::Lookup(PractitionerRecord::new(args[0], args[1], args[2]))
            }
            "wait" => Command::Wait,
            "retry" => Command::Retry,
            "cancel" => Command::Cancel,
            "dismiss" => Command::Dismiss,
            "results" => Command::Results,
            "toggle" => {
                need(1, "toggle KEY")?;
                Command::Toggle(args[0].to_string())
            }
            "sort" => {
                need(2, "sort KEY COLUMN [asc|desc]")?;
                // Column headers may contain spaces ("Full Name").
                let (column_words, direction) = match args.last().map(|s| s.parse::<SortDirection>()) {
                    Some(Ok(direction)) if args.len() > 2 => (&args[1..args.len() - 1], Some(direction)),
                    _ => (&args[1..], None),
                };
                Command::Sort {
                    key: args[0].to_string(),
                    column: column_words.join(" ").parse()?,
                    direction,
                }
            }
            "page" => {
                need(2, "page KEY N")?;
                let page = args[1]
                    .parse::<usize>()
                    .ok()
                    .filter(|p| *p >= 1)
                    .ok_or_else(|| format!("expected a page number >= 1, got {:?}", args[1]))?;
                Command::Page {
                    key: args[0].to_string(),
                    page,
                }
            }
            "download" => Command::Download(args.first().map(PathBuf::from)),
            "export" => {
                need(2, "export KEY PATH")?;
                Command::Export {
                    key: args[0].to_string(),
                    path: PathBuf::from(args[1]),
                }
            }
            "clear" => Command::Clear,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(format!("unknown command {other:?}; type help")),
        };
        Ok(command)
    }
}

/// What the upload control currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadPanel {
    pub file: Option<FileSummary>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reply {
    pub text: String,
    pub quit: bool,
}

impl Reply {
    fn text(text: impl Into<String>) -> Self {
        let mut text = text.into();
        if !text.ends_with('\n') {
            text.push('\n');
        }
        Self { text, quit: false }
    }
}

enum Event {
    Line(Option<String>),
    Completion(Completion),
}

pub struct Session {
    mode: InputMode,
    batch: QueryBatch,
    upload: UploadPanel,
    dispatcher: Dispatcher,
    results: ResultsView,
    download_dir: PathBuf,
}

impl Session {
    pub fn new(dispatcher: Dispatcher, page_size: usize, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            mode: InputMode::default(),
            batch: QueryBatch::default(),
            upload: UploadPanel::default(),
            dispatcher,
            results: ResultsView::new(page_size),
            download_dir: download_dir.into(),
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn batch(&self) -> &QueryBatch {
        &self.batch
    }

    pub fn upload_panel(&self) -> &UploadPanel {
        &self.upload
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn results(&self) -> &ResultsView {
        &self.results
    }

    /// Reads commands until `quit` or end of input, applying request
    /// completions as they arrive in between.
    pub async fn run<R, W>(&mut self, input: R, out: &mut W) -> anyhow::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: std::io::Write,
    {
        let mut lines = input.lines();
        loop {
            let event = tokio::select! {
                line = lines.next_line() => Event::Line(line.context("Failed reading command input")?),
                Some(completion) = self.dispatcher.recv() => Event::Completion(completion),
            };
            match event {
                Event::Line(None) => break,
                Event::Line(Some(line)) => {
                    if line.trim().is_empty() || line.trim_start().starts_with('#') {
                        continue;
                    }
                    let reply = match line.parse::<Command>() {
                        Ok(command) => self.handle(command).await,
                        Err(message) => Reply::text(message),
                    };
                    out.write_all(reply.text.as_bytes())
                        .context("Failed writing output")?;
                    out.flush().context("Failed flushing output")?;
                    if reply.quit {
                        break;
                    }
                }
                Event::Completion(completion) => {
                    if let Some(text) = self.on_completion(completion) {
                        out.write_all(text.as_bytes()).context("Failed writing output")?;
                        out.flush().context("Failed flushing output")?;
                    }
                }
            }
        }
        Ok(())
    }

    pub async fn handle(&mut self, command: Command) -> Reply {
        match command {
            Command::Mode(mode) => {
                self.mode = mode;
                Reply::text(format!("mode: {mode}"))
            }
            Command::Add => self.in_mode(InputMode::Manual, |s| {
                s.replace_batch(builder::add_record);
                Reply::text(format!("added record [{}]", s.batch.len() - 1))
            }),
            Command::Set {
                index,
                field,
                value,
            } => self.in_mode(InputMode::Manual, |s| {
                if let Some(reply) = s.check_index(index) {
                    return reply;
                }
                s.replace_batch(|b| builder::update_record(b, index, field, value));
                Reply::text(format!("[{index}] {field} updated"))
            }),
            Command::Remove(index) => self.in_mode(InputMode::Manual, |s| {
                if let Some(reply) = s.check_index(index) {
                    return reply;
                }
                if s.batch.len() == 1 {
                    return Reply::text("the last record cannot be removed; use clear to reset it");
                }
                s.replace_batch(|b| builder::remove_record(b, index));
                Reply::text(format!("removed record [{index}]"))
            }),
            Command::Paste(text) => self.in_mode(InputMode::PasteJson, |s| {
                let result = ingest::ingest_text(FileKind::Json, &text);
                match s.merge(result) {
                    Ok(count) => Reply::text(format!("loaded {count} records from pasted JSON")),
                    Err(message) => Reply::text(format!(
                        "{message}\nRequired format:\n{REQUIRED_JSON_FORMAT}"
                    )),
                }
            }),
            Command::Upload { path, content_type } => {
                if self.mode != InputMode::Upload {
                    return wrong_mode(InputMode::Upload);
                }
                self.upload_file(&path, content_type.as_deref()).await
            }
            Command::Unload => self.in_mode(InputMode::Upload, |s| {
                s.upload = UploadPanel::default();
                Reply::text("file removed")
            }),
            Command::Endpoint(endpoint) => {
                self.replace_batch(|b| builder::set_endpoint(b, endpoint));
                Reply::text(format!("endpoint: {endpoint}"))
            }
            Command::Consensus(consensus) => {
                self.replace_batch(|b| builder::set_consensus(b, consensus));
                Reply::text(format!(
                    "consensus: {}",
                    if consensus { "True" } else { "False" }
                ))
            }
            Command::Show => {
                let mut text = render::render_batch(&self.batch, self.mode);
                if let Some(file) = &self.upload.file {
                    text.push_str(&format!(
                        "file: {} (Size: {} bytes)\n",
                        file.name, file.size_bytes
                    ));
                }
                if let Some(error) = &self.upload.error {
                    text.push_str(&format!("file error: {error}\n"));
                }
                Reply::text(text)
            }
            Command::Submit => match self.dispatcher.submit(&self.batch) {
                Ok(SubmitOutcome::Started(seq)) => Reply::text(format!("submitted request #{seq}")),
                Ok(SubmitOutcome::Queued) => {
                    Reply::text("a request is pending; this submission will be sent when it finishes")
                }
                Err(errors) => Reply::text(render::render_field_errors(&errors)),
            },
            Command::Lookup(record) => {
                match self
                    .dispatcher
                    .submit_single(&record, self.batch.endpoint, self.batch.consensus)
                {
                    Ok(SubmitOutcome::Started(seq)) => {
                        Reply::text(format!("looking up {} as request #{seq}", record.npi))
                    }
                    Ok(SubmitOutcome::Queued) => {
                        Reply::text("a request is pending; this lookup will be sent when it finishes")
                    }
                    Err(errors) => Reply::text(render::render_field_errors(&errors)),
                }
            }
            Command::Wait => {
                let mut text = String::new();
                while self.dispatcher.is_pending() {
                    match self.dispatcher.recv().await {
                        Some(completion) => {
                            if let Some(update) = self.on_completion(completion) {
                                text.push_str(&update);
                            }
                        }
                        None => break,
                    }
                }
                if text.is_empty() {
                    text.push_str("nothing pending");
                }
                Reply::text(text)
            }
            Command::Retry => match self.dispatcher.retry() {
                Some(SubmitOutcome::Started(seq)) => Reply::text(format!("retrying as request #{seq}")),
                Some(SubmitOutcome::Queued) => Reply::text("retry queued behind the pending request"),
                None => Reply::text("nothing to retry"),
            },
            Command::Cancel => {
                if self.dispatcher.cancel() {
                    Reply::text("stopped waiting for the pending request")
                } else {
                    Reply::text("no request pending")
                }
            }
            Command::Dismiss => {
                self.dispatcher.dismiss_error();
                Reply::text("error dismissed")
            }
            Command::Results => Reply::text(self.results_text()),
            Command::Toggle(key) => match self.results.toggle(&key) {
                Some(true) => Reply::text(format!("{key}: expanded")),
                Some(false) => Reply::text(format!("{key}: collapsed")),
                None => unknown_group(&key),
            },
            Command::Sort {
                key,
                column,
                direction,
            } => {
                let Some(table) = self.results.table_mut(&key) else {
                    return unknown_group(&key);
                };
                match direction {
                    Some(direction) => table.sort_by(column, direction),
                    None => {
                        table.toggle_sort(column);
                    }
                }
                self.table_reply(&key)
            }
            Command::Page { key, page } => {
                let Some(table) = self.results.table_mut(&key) else {
                    return unknown_group(&key);
                };
                table.set_page(page - 1);
                self.table_reply(&key)
            }
            Command::Download(dir) => {
                let dir = dir.unwrap_or_else(|| self.download_dir.clone());
                match download_results(
                    self.dispatcher.response(),
                    self.dispatcher.is_pending(),
                    &dir,
                ) {
                    Ok(path) => Reply::text(format!("saved {}", path.display())),
                    Err(err) => Reply::text(err.to_string()),
                }
            }
            Command::Export { key, path } => match self.results.table(&key) {
                Some(table) => match export_table_csv(table, &path) {
                    Ok(()) => Reply::text(format!("exported {key} to {}", path.display())),
                    Err(err) => Reply::text(err.to_string()),
                },
                None => unknown_group(&key),
            },
            Command::Clear => {
                self.batch = builder::clear();
                self.upload = UploadPanel::default();
                Reply::text("batch cleared")
            }
            Command::Help => Reply::text(HELP),
            Command::Quit => Reply {
                text: String::new(),
                quit: true,
            },
        }
    }

    /// Applies a completion and refreshes the tables if it was accepted.
    pub fn on_completion(&mut self, completion: Completion) -> Option<String> {
        match self.dispatcher.apply(completion) {
            Applied::Accepted(DispatchStatus::Success) => {
                if let Some(response) = self.dispatcher.response() {
                    self.results.load(response);
                }
                Some(self.results_text())
            }
            Applied::Accepted(_) => {
                self.results.clear();
                Some(self.results_text())
            }
            Applied::Superseded(seq) => Some(format!("sent queued request #{seq}\n")),
            Applied::Stale => None,
        }
    }

    fn table_reply(&self, key: &str) -> Reply {
        match self.results.table(key) {
            Some(table) => Reply::text(render::render_table(table, self.results.is_expanded(key))),
            None => unknown_group(key),
        }
    }

    fn results_text(&self) -> String {
        match self.dispatcher.status() {
            DispatchStatus::Pending => "Loading...\n".to_string(),
            DispatchStatus::Error => match self.dispatcher.error() {
                Some(err) => render::render_dispatch_error(err),
                None => String::new(),
            },
            DispatchStatus::Success => render::render_results(&self.results),
            DispatchStatus::Idle => "No results yet.\n".to_string(),
        }
    }

    async fn upload_file(&mut self, path: &Path, content_type: Option<&str>) -> Reply {
        // A new selection always clears the previous validation message.
        self.upload.error = None;
        let file = UploadedFile::new(path, content_type);
        let ingestion = ingest::ingest(&file).await;
        let summary = format!(
            "File uploaded: {} (Size: {} bytes)",
            ingestion.summary.name, ingestion.summary.size_bytes
        );
        self.upload.file = Some(ingestion.summary);
        match self.merge(ingestion.result) {
            Ok(count) => Reply::text(format!("{summary}\nloaded {count} records")),
            Err(message) => {
                self.upload.error = Some(message.clone());
                Reply::text(format!("{summary}\nInvalid file format: {message}"))
            }
        }
    }

    fn merge(&mut self, result: IngestionResult) -> Result<usize, String> {
        let batch = std::mem::take(&mut self.batch);
        let (batch, error) = builder::merge_ingested(batch, result);
        self.batch = batch;
        match error {
            None => Ok(self.batch.len()),
            Some(err) => Err(err.to_string()),
        }
    }

    fn replace_batch(&mut self, transition: impl FnOnce(QueryBatch) -> QueryBatch) {
        let batch = std::mem::take(&mut self.batch);
        self.batch = transition(batch);
    }

    fn in_mode(&mut self, mode: InputMode, action: impl FnOnce(&mut Self) -> Reply) -> Reply {
        if self.mode == mode {
            action(self)
        } else {
            wrong_mode(mode)
        }
    }

    fn check_index(&self, index: usize) -> Option<Reply> {
        (index >= self.batch.len()).then(|| {
            Reply::text(format!(
                "no record [{index}]; the batch has {} records",
                self.batch.len()
            ))
        })
    }
}

fn wrong_mode(mode: InputMode) -> Reply {
    Reply::text(format!("switch to {mode} mode first (mode {mode})"))
}

fn unknown_group(key: &str) -> Reply {
    Reply::text(format!("no result group {key:?}"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dispatch::LookupKind;
    use crate::dispatch::testing::{GatedTransport, response_for};

    fn session() -> (Arc<GatedTransport>, Session) {
        let transport = Arc::new(GatedTransport::default());
        let dispatcher = Dispatcher::new(transport.clone());
        (transport, Session::new(dispatcher, 10, std::env::temp_dir()))
    }

    #[test]
    fn parses_commands_with_free_text() {
        assert_eq!(
            "set 0 first_name Mary Ann".parse::<Command>(),
            Ok(Command::Set {
                index: 0,
                field: Field::FirstName,
                value: "Mary Ann".to_string()
            })
        );
        assert_eq!(
            "sort 123 Full Name desc".parse::<Command>(),
            Ok(Command::Sort {
                key: "123".to_string(),
                column: Column::FullName,
                direction: Some(SortDirection::Descending)
            })
        );
        assert_eq!(
            "sort 123 NPI".parse::<Command>(),
            Ok(Command::Sort {
                key: "123".to_string(),
                column: Column::Npi,
                direction: None
            })
        );
        assert_eq!("mode json".parse::<Command>(), Ok(Command::Mode(InputMode::PasteJson)));
        assert!("page k 0".parse::<Command>().is_err());
        assert!("frobnicate".parse::<Command>().is_err());
        assert!("set x npi 1".parse::<Command>().is_err());
        assert_eq!(
            "lookup John Doe 1234567890".parse::<Command>(),
            Ok(Command::Lookup(PractitionerRecord::new("John", "Doe", "1234567890")))
        );
        assert!("lookup John Doe".parse::<Command>().is_err());
    }

    #[tokio::test]
    async fn lookup_leaves_batch_alone() {
        let (transport, mut s) = session();
        s.handle(Command::Endpoint(EndpointSelector::Kaiser)).await;
        let before = s.batch().clone();
        let gate = transport.gate("1234567890");
        let reply = s
            .handle(Command::Lookup(PractitionerRecord::new("John", "Doe", "1234567890")))
            .await;
        assert_eq!(reply.text, "looking up 1234567890 as request #1\n");
        gate.send(Ok(response_for("1234567890", "Kaiser"))).unwrap();
        let reply = s.handle(Command::Wait).await;
        assert!(reply.text.contains("1234567890"));
        assert_eq!(s.batch(), &before);
        {
            let calls = transport.calls.lock().unwrap();
            assert_eq!(calls[0].kind, LookupKind::Single);
            assert_eq!(calls[0].endpoint, EndpointSelector::Kaiser);
        }

        let reply = s
            .handle(Command::Lookup(PractitionerRecord::new("John", "Doe", "123")))
            .await;
        assert!(reply.text.contains("npi"));
    }

    #[tokio::test]
    async fn mode_switch_keeps_batch() {
        let (_t, mut s) = session();
        s.handle(Command::Set {
            index: 0,
            field: Field::FirstName,
            value: "John".into(),
        })
        .await;
        s.handle(Command::Mode(InputMode::Upload)).await;
        s.handle(Command::Mode(InputMode::Manual)).await;
        assert_eq!(s.batch().practitioners[0].first_name, "John");
    }

    #[tokio::test]
    async fn manual_edits_are_gated_by_mode() {
        let (_t, mut s) = session();
        s.handle(Command::Mode(InputMode::PasteJson)).await;
        let reply = s.handle(Command::Add).await;
        assert!(reply.text.contains("switch to manual mode"));
        assert_eq!(s.batch().len(), 1);
    }

    #[tokio::test]
    async fn bad_index_is_reported_not_fatal() {
        let (_t, mut s) = session();
        let reply = s.handle(Command::Remove(4)).await;
        assert!(reply.text.contains("no record [4]"));
        let reply = s
            .handle(Command::Set {
                index: 1,
                field: Field::Npi,
                value: "1".into(),
            })
            .await;
        assert!(reply.text.contains("no record [1]"));
    }

    #[tokio::test]
    async fn failed_paste_keeps_previous_batch() {
        let (_t, mut s) = session();
        s.handle(Command::Mode(InputMode::PasteJson)).await;
        s.handle(Command::Paste(
            r#"{"practitioners":[{"npi":"1234567890","first_name":"John","last_name":"Doe"}]}"#.into(),
        ))
        .await;
        let before = s.batch().clone();
        let reply = s
            .handle(Command::Paste(r#"{"practitioners":[{"npi":"1234567890"}]}"#.into()))
            .await;
        assert!(reply.text.contains("Required format"));
        assert_eq!(s.batch(), &before);
        assert_eq!(
            s.batch().practitioners,
            vec![PractitionerRecord::new("John", "Doe", "1234567890")]
        );
    }

    #[tokio::test]
    async fn completion_loads_tables_and_clear_keeps_them() {
        let (transport, mut s) = session();
        for (field, value) in [
            (Field::FirstName, "John"),
            (Field::LastName, "Doe"),
            (Field::Npi, "1234567890"),
        ] {
            s.handle(Command::Set {
                index: 0,
                field,
                value: value.into(),
            })
            .await;
        }
        let gate = transport.gate("1234567890");
        let reply = s.handle(Command::Submit).await;
        assert_eq!(reply.text, "submitted request #1\n");

        let reply = s.handle(Command::Download(None)).await;
        assert!(reply.text.contains("still pending"));

        gate.send(Ok(response_for("1234567890", "Kaiser"))).unwrap();
        s.handle(Command::Wait).await;
        assert!(s.results().table("1234567890").is_some());

        s.handle(Command::Clear).await;
        assert_eq!(s.batch(), &QueryBatch::default());
        assert!(s.results().table("1234567890").is_some());
        assert!(s.dispatcher().response().is_some());
    }

    #[tokio::test]
    async fn toggle_reports_state() {
        let (transport, mut s) = session();
        s.handle(Command::Mode(InputMode::PasteJson)).await;
        s.handle(Command::Paste(
            r#"{"practitioners":[{"npi":"1234567890","first_name":"John","last_name":"Doe"}]}"#.into(),
        ))
        .await;
        let gate = transport.gate("1234567890");
        s.handle(Command::Submit).await;
        gate.send(Ok(response_for("1234567890", "Cigna"))).unwrap();
        s.handle(Command::Wait).await;

        let reply = s.handle(Command::Toggle("1234567890".into())).await;
        assert_eq!(reply.text, "1234567890: collapsed\n");
        let reply = s.handle(Command::Toggle("0000000000".into())).await;
        assert!(reply.text.contains("no result group"));
    }
}
