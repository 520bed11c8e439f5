#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header::RETRY_AFTER},
    response::{IntoResponse, Response},
    routing::post,
};
use serde_json::{Map, Value, json};

#[derive(Debug, Clone, Copy)]
pub enum Behavior {
    /// One group per practitioner, in request order.
    Echo,
    NotFound,
    Malformed,
    /// 503 for the first `n` calls, then `Echo`.
    Unavailable(usize),
}

#[derive(Debug, Clone)]
pub struct Seen {
    pub params: HashMap<String, String>,
    pub body: Value,
    pub content_type: Option<String>,
}

#[derive(Clone)]
struct MockState {
    behavior: Behavior,
    seen: Arc<Mutex<Vec<Seen>>>,
}

pub struct MockService {
    pub base_url: String,
    pub seen: Arc<Mutex<Vec<Seen>>>,
}

impl MockService {
    pub fn calls(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

pub async fn spawn(behavior: Behavior) -> MockService {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        behavior,
        seen: seen.clone(),
    };
    let app = Router::new()
        .route("/api/getdata", post(getdata).get(getdata_single))
        .with_state(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    MockService {
        base_url: format!("http://{addr}/api/getdata"),
        seen,
    }
}

/// A URL nothing is listening on.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/api/getdata")
}

async fn getdata(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let calls_before = {
        let mut seen = state.seen.lock().unwrap();
        seen.push(Seen {
            params: params.clone(),
            body: body.clone(),
            content_type: headers
                .get("content-type")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        });
        seen.len() - 1
    };

    match state.behavior {
        Behavior::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Could not find practitioner"})),
        )
            .into_response(),
        Behavior::Malformed => (StatusCode::OK, "[1, 2, 3]").into_response(),
        Behavior::Unavailable(n) if calls_before < n => {
            (StatusCode::SERVICE_UNAVAILABLE, [(RETRY_AFTER, "0")], "busy").into_response()
        }
        Behavior::Echo | Behavior::Unavailable(_) => Json(echo(&params, &body)).into_response(),
    }
}

/// Single lookup: the practitioner comes in the query string and the answer
/// is a flat row list.
async fn getdata_single(
    State(state): State<MockState>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    state.seen.lock().unwrap().push(Seen {
        params: params.clone(),
        body: Value::Null,
        content_type: None,
    });

    let Some(npi) = params.get("npi") else {
        return (StatusCode::BAD_REQUEST, Json(json!({"message": "npi is required"}))).into_response();
    };
    match state.behavior {
        Behavior::NotFound => (
            StatusCode::NOT_FOUND,
            Json(json!({"message": format!(
                "Could not find practitioner with name {} {}",
                params.get("first_name").map(String::as_str).unwrap_or_default(),
                params.get("last_name").map(String::as_str).unwrap_or_default()
            )})),
        )
            .into_response(),
        Behavior::Malformed => (StatusCode::OK, "[1, 2, 3]").into_response(),
        Behavior::Echo | Behavior::Unavailable(_) => {
            let body = json!({"practitioners": [{
                "npi": npi,
                "first_name": params.get("first_name"),
                "last_name": params.get("last_name"),
            }]});
            let rows = echo(&params, &body)[npi.as_str()].clone();
            Json(rows).into_response()
        }
    }
}

fn echo(params: &HashMap<String, String>, body: &Value) -> Value {
    let endpoint = params.get("endpoint").map(String::as_str).unwrap_or("All");
    let source = if endpoint == "All" { "Kaiser" } else { endpoint };
    let consensus = params.get("consensus").map(String::as_str) == Some("True");

    let mut groups = Map::new();
    for practitioner in body["practitioners"].as_array().into_iter().flatten() {
        let npi = practitioner["npi"].as_str().unwrap_or_default();
        let full_name = format!(
            "{} {}",
            practitioner["first_name"].as_str().unwrap_or_default(),
            practitioner["last_name"].as_str().unwrap_or_default()
        );
        let mut rows = vec![json!({
            "Endpoint": source,
            "DateRetrieved": "2024-05-01",
            "FullName": full_name,
            "NPI": npi,
            "City": "Portland",
            "State": "OR",
            "AccuracyScore": 8,
        })];
        if consensus {
            rows.push(json!({
                "Endpoint": "Consensus",
                "FullName": full_name,
                "NPI": npi,
                "City": "Portland",
                "AccuracyScore": 10,
            }));
        }
        groups.insert(npi.to_string(), Value::Array(rows));
    }
    Value::Object(groups)
}
