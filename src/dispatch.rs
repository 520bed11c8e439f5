//! Request lifecycle: Idle -> Pending -> {Success, Error}.
//!
//! Every request that actually goes out gets a sequence number. Completions
//! come back over a channel and are applied only if their number is still the
//! one in flight, so a stale answer can never overwrite newer state. A submit
//! while a request is pending is queued; further submits replace the queued
//! one, and the queued request supersedes the in-flight answer.

use std::{sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{
    Client, StatusCode, Url,
    header::{ACCEPT, CONTENT_TYPE, RETRY_AFTER},
};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

use crate::common::{error_message_from_body, is_retryable_status, parse_retry_after, truncate_for_log};
use crate::constants::{MIME_JSON, USER_AGENT};
use crate::error::{DispatchError, FieldError, FieldProblem};
use crate::response::{QueryResponse, ResultRow};
use crate::schema::{EndpointSelector, Field, PractitionerRecord, QueryBatch};

/// Per-record wire shape; field order matches the service contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WireRecord {
    pub npi: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<&PractitionerRecord> for WireRecord {
    fn from(record: &PractitionerRecord) -> Self {
        Self {
            npi: record.npi.clone(),
            first_name: record.first_name.clone(),
            last_name: record.last_name.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LookupBody {
    pub practitioners: Vec<WireRecord>,
}

/// Batch lookups POST the practitioner list; single lookups GET one
/// practitioner passed as query parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Batch,
    Single,
}

/// One outbound lookup. Endpoint and consensus travel as query parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LookupRequest {
    pub kind: LookupKind,
    pub endpoint: EndpointSelector,
    pub consensus: bool,
    pub body: LookupBody,
}

impl LookupRequest {
    pub fn new(records: &[PractitionerRecord], endpoint: EndpointSelector, consensus: bool) -> Self {
        Self {
            kind: LookupKind::Batch,
            endpoint,
            consensus,
            body: LookupBody {
                practitioners: records.iter().map(WireRecord::from).collect(),
            },
        }
    }

    pub fn single(record: &PractitionerRecord, endpoint: EndpointSelector, consensus: bool) -> Self {
        Self {
            kind: LookupKind::Single,
            ..Self::new(std::slice::from_ref(record), endpoint, consensus)
        }
    }

    pub fn query_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::with_capacity(6);
        if let (LookupKind::Single, Some(record)) = (self.kind, self.body.practitioners.first()) {
            params.push(("first_name", record.first_name.clone()));
            params.push(("last_name", record.last_name.clone()));
            params.push(("npi", record.npi.clone()));
        }
        params.push(("endpoint", self.endpoint.as_str().to_string()));
        params.push(("format", "JSON".to_string()));
        let consensus = if self.consensus { "True" } else { "False" };
        params.push(("consensus", consensus.to_string()));
        params
    }

    pub fn url(&self, base_url: &str) -> Result<Url, String> {
        Url::parse_with_params(base_url, self.query_params())
            .map_err(|e| format!("invalid base URL {base_url:?}: {e}"))
    }

    /// Best-effort display URL, used for error context even when the base is bad.
    pub fn display_url(&self, base_url: &str) -> String {
        match self.url(base_url) {
            Ok(url) => url.to_string(),
            Err(_) => {
                let query: Vec<String> = self
                    .query_params()
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                format!("{base_url}?{}", query.join("&"))
            }
        }
    }

    /// What goes in the request body; single lookups send none.
    pub fn sent_body(&self) -> String {
        match self.kind {
            LookupKind::Batch => self.body_json(),
            LookupKind::Single => String::new(),
        }
    }

    pub fn body_json(&self) -> String {
        serde_json::to_string(&self.body).unwrap_or_default()
    }

    pub fn first_npi(&self) -> Option<&str> {
        self.body.practitioners.first().map(|r| r.npi.as_str())
    }
}

/// The remote lookup service.
#[async_trait]
pub trait LookupTransport: Send + Sync {
    async fn lookup(&self, request: &LookupRequest) -> Result<QueryResponse, DispatchError>;
}

pub struct HttpTransport {
    client: Client,
    base_url: String,
    max_retries: u32,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration, max_retries: u32) -> anyhow::Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .context("Failed creating HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            max_retries,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LookupTransport for HttpTransport {
    async fn lookup(&self, request: &LookupRequest) -> Result<QueryResponse, DispatchError> {
        let body = request.sent_body();
        let fail = |status_code: Option<u16>, message: String| DispatchError {
            status_code,
            message,
            attempted_url: request.display_url(&self.base_url),
            attempted_body: body.clone(),
        };
        let url = request.url(&self.base_url).map_err(|msg| fail(None, msg))?;

        let attempts = self.max_retries + 1;
        let mut backoff = Duration::from_secs(1);

        for attempt in 1..=attempts {
            let builder = match request.kind {
                LookupKind::Batch => self
                    .client
                    .post(url.clone())
                    .header(CONTENT_TYPE, MIME_JSON)
                    .body(body.clone()),
                LookupKind::Single => self.client.get(url.clone()),
            };
            let response = builder.header(ACCEPT, MIME_JSON).send().await;

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let text = resp
                            .text()
                            .await
                            .map_err(|e| fail(None, format!("Failed reading response body: {e}")))?;
                        return parse_lookup_body(request, &text).map_err(|e| {
                            fail(
                                Some(status.as_u16()),
                                format!(
                                    "Unexpected response shape ({e}). Body: {}",
                                    truncate_for_log(&text)
                                ),
                            )
                        });
                    }

                    let retry_after = parse_retry_after(resp.headers().get(RETRY_AFTER));
                    let text = resp.text().await.unwrap_or_default();
                    if is_retryable_status(status) && attempt < attempts {
                        tracing::warn!(
                            "lookup returned {} (attempt {}/{}); retrying",
                            status,
                            attempt,
                            attempts
                        );
                        tokio::time::sleep(retry_after.unwrap_or(backoff)).await;
                        backoff = (backoff + backoff).min(Duration::from_secs(60));
                        continue;
                    }
                    return Err(fail(Some(status.as_u16()), status_message(status, &text)));
                }
                Err(err) => {
                    if attempt < attempts {
                        tracing::warn!("lookup transport error (attempt {attempt}/{attempts}): {err}");
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff + backoff).min(Duration::from_secs(60));
                        continue;
                    }
                    let message = if err.is_timeout() {
                        format!("Request timed out: {err}")
                    } else {
                        err.to_string()
                    };
                    return Err(fail(None, message));
                }
            }
        }

        Err(fail(None, "Unexpected lookup flow".to_string()))
    }
}

/// Single lookups answer with a flat row list; it is grouped under the NPI.
/// A grouped object is accepted as well.
fn parse_lookup_body(request: &LookupRequest, text: &str) -> Result<QueryResponse, serde_json::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum SingleBody {
        Rows(Vec<ResultRow>),
        Groups(QueryResponse),
    }

    match request.kind {
        LookupKind::Batch => serde_json::from_str(text),
        LookupKind::Single => Ok(match serde_json::from_str::<SingleBody>(text)? {
            SingleBody::Rows(rows) => {
                let key = request.first_npi().unwrap_or_default().to_string();
                QueryResponse::from_groups([(key, rows)])
            }
            SingleBody::Groups(groups) => groups,
        }),
    }
}

fn status_message(status: StatusCode, body: &str) -> String {
    let detail = error_message_from_body(body);
    if detail.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        detail
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchStatus {
    Idle,
    Pending,
    Success,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The request went out with this sequence number.
    Started(u64),
    /// A request is already pending; this one will go out when it settles.
    Queued,
}

#[derive(Debug)]
pub struct Completion {
    pub seq: u64,
    pub result: Result<QueryResponse, DispatchError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted(DispatchStatus),
    /// Not the request in flight (cancelled or older); ignored.
    Stale,
    /// Was in flight but a newer submit was waiting; ignored and the newer one sent.
    Superseded(u64),
}

pub struct Dispatcher {
    transport: Arc<dyn LookupTransport>,
    next_seq: u64,
    in_flight: Option<u64>,
    queued: Option<LookupRequest>,
    last_request: Option<LookupRequest>,
    response: Option<QueryResponse>,
    error: Option<DispatchError>,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn LookupTransport>) -> Self {
        let (tx, rx) = unbounded_channel();
        Self {
            transport,
            next_seq: 0,
            in_flight: None,
            queued: None,
            last_request: None,
            response: None,
            error: None,
            tx,
            rx,
        }
    }

    pub fn status(&self) -> DispatchStatus {
        if self.in_flight.is_some() {
            DispatchStatus::Pending
        } else if self.error.is_some() {
            DispatchStatus::Error
        } else if self.response.is_some() {
            DispatchStatus::Success
        } else {
            DispatchStatus::Idle
        }
    }

    pub fn is_pending(&self) -> bool {
        self.in_flight.is_some()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn has_queued(&self) -> bool {
        self.queued.is_some()
    }

    pub fn response(&self) -> Option<&QueryResponse> {
        self.response.as_ref()
    }

    pub fn error(&self) -> Option<&DispatchError> {
        self.error.as_ref()
    }

    pub fn last_request(&self) -> Option<&LookupRequest> {
        self.last_request.as_ref()
    }

    /// Validates the batch and sends it, or queues it behind the pending request.
    pub fn submit(&mut self, batch: &QueryBatch) -> Result<SubmitOutcome, Vec<FieldError>> {
        let records = batch.finalize()?;
        let request = LookupRequest::new(records, batch.endpoint, batch.consensus);
        Ok(self.submit_request(request))
    }

    /// Validates one practitioner and looks it up on its own. All three
    /// fields are required.
    pub fn submit_single(
        &mut self,
        record: &PractitionerRecord,
        endpoint: EndpointSelector,
        consensus: bool,
    ) -> Result<SubmitOutcome, Vec<FieldError>> {
        let mut errors = record.submission_errors();
        if record.npi.is_empty() {
            errors.push(FieldError::new(Field::Npi, FieldProblem::Empty));
        }
        if !errors.is_empty() {
            return Err(errors);
        }
        Ok(self.submit_request(LookupRequest::single(record, endpoint, consensus)))
    }

    pub fn submit_request(&mut self, request: LookupRequest) -> SubmitOutcome {
        if let Some(seq) = self.in_flight {
            if self.queued.replace(request).is_some() {
                tracing::debug!("collapsed queued re-submission behind #{seq}");
            } else {
                tracing::info!("request #{seq} pending; queued re-submission");
            }
            return SubmitOutcome::Queued;
        }
        SubmitOutcome::Started(self.fire(request))
    }

    /// Re-sends the last request that went out, if any.
    pub fn retry(&mut self) -> Option<SubmitOutcome> {
        let request = self.last_request.clone()?;
        Some(self.submit_request(request))
    }

    /// Stops waiting for the in-flight request; its answer will be discarded.
    /// Any queued re-submission is dropped.
    pub fn cancel(&mut self) -> bool {
        self.queued = None;
        match self.in_flight.take() {
            Some(seq) => {
                tracing::info!("cancelled request #{seq}");
                true
            }
            None => false,
        }
    }

    /// Error -> Idle.
    pub fn dismiss_error(&mut self) {
        self.error = None;
    }

    fn fire(&mut self, request: LookupRequest) -> u64 {
        self.next_seq += 1;
        let seq = self.next_seq;
        self.in_flight = Some(seq);
        self.last_request = Some(request.clone());
        tracing::info!(
            "submitting request #{} ({:?}): {} practitioners endpoint={} consensus={}",
            seq,
            request.kind,
            request.body.practitioners.len(),
            request.endpoint,
            request.consensus
        );
        tracing::debug!("request #{} body: {}", seq, request.sent_body());

        let transport = Arc::clone(&self.transport);
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = transport.lookup(&request).await;
            let _ = tx.send(Completion { seq, result });
        });
        seq
    }

    /// Waits for the next completion of any request, stale ones included.
    pub async fn recv(&mut self) -> Option<Completion> {
        self.rx.recv().await
    }

    pub fn apply(&mut self, completion: Completion) -> Applied {
        if self.in_flight != Some(completion.seq) {
            tracing::warn!("discarding stale response for request #{}", completion.seq);
            return Applied::Stale;
        }
        self.in_flight = None;

        if let Some(next) = self.queued.take() {
            tracing::info!(
                "discarding response for request #{}; newer submission waiting",
                completion.seq
            );
            return Applied::Superseded(self.fire(next));
        }

        match completion.result {
            Ok(response) => {
                tracing::info!(
                    "request #{} succeeded: {} groups, {} rows",
                    completion.seq,
                    response.len(),
                    response.row_count()
                );
                self.response = Some(response);
                self.error = None;
            }
            Err(err) => {
                tracing::warn!("request #{} failed: {}", completion.seq, err.message);
                self.response = None;
                self.error = Some(err);
            }
        }
        Applied::Accepted(self.status())
    }

    /// Drives completions until nothing is in flight.
    pub async fn settle(&mut self) -> DispatchStatus {
        while self.in_flight.is_some() {
            match self.rx.recv().await {
                Some(completion) => {
                    self.apply(completion);
                }
                None => break,
            }
        }
        self.status()
    }
}
