//! In-process stand-in for the Safe transaction service
//!
//! Serves the owner and delegate endpoints from memory and records every
//! request so tests can assert on exactly what the client sent.

#![allow(dead_code)]

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use safe_delegator::{
    Address, ChainId, ChainRegistry, ClientConfig, FixedClock, SafeAddress, SafeServiceClient,
};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// 2023-11-14T22:13:20Z, TOTP window 472222
pub const NOW: u64 = 1_700_000_000;
pub const WINDOW: u64 = 472_222;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub path: String,
    pub query: Option<String>,
    pub body: Option<Value>,
}

#[derive(Debug, Clone)]
struct StoredDelegate {
    safe: String,
    delegator: String,
    delegate: String,
    label: String,
}

#[derive(Default)]
struct ServiceState {
    base_url: String,
    owner_safes: HashMap<String, Vec<String>>,
    delegates: Vec<StoredDelegate>,
    requests: Vec<RecordedRequest>,
    fail_next_mutation: Option<(StatusCode, String)>,
    delay: Option<Duration>,
    page_size: Option<usize>,
    next_link: Option<String>,
}

type Shared = Arc<Mutex<ServiceState>>;

pub struct MockSafeService {
    state: Shared,
    base_url: String,
}

impl MockSafeService {
    pub async fn start() -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock service");
        let base_url = format!("http://{}", listener.local_addr().unwrap());

        let state: Shared = Arc::new(Mutex::new(ServiceState {
            base_url: base_url.clone(),
            ..Default::default()
        }));

        let app = Router::new()
            .route("/api/v1/owners/:owner/safes/", get(owner_safes))
            .route(
                "/api/v1/delegates/",
                get(list_delegates).post(add_delegate),
            )
            .route(
                "/api/v1/delegates/:delegate/",
                delete(remove_delegate),
            )
            .with_state(state.clone());

        tokio::spawn(async move {
            axum::serve(listener, app)
                .await
                .expect("Mock service failed");
        });

        Self { state, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Registry that routes mainnet to this mock
    pub fn registry(&self) -> ChainRegistry {
        ChainRegistry::empty()
            .with_endpoint(ChainId::MAINNET, "mainnet", &self.base_url)
            .unwrap()
    }

    /// Client pointed at this mock, with the clock frozen at [`NOW`]
    pub fn client(&self) -> SafeServiceClient {
        self.client_with_timeout(Duration::from_secs(15))
    }

    pub fn client_with_timeout(&self, timeout: Duration) -> SafeServiceClient {
        let config = ClientConfig::default()
            .with_registry(self.registry())
            .with_timeout(timeout);
        SafeServiceClient::new(config)
            .unwrap()
            .with_clock(Arc::new(FixedClock(NOW)))
    }

    pub fn set_owner_safes(&self, owner: &str, safes: &[&str]) {
        self.state.lock().unwrap().owner_safes.insert(
            owner.to_ascii_lowercase(),
            safes.iter().map(|s| s.to_string()).collect(),
        );
    }

    pub fn insert_delegate(&self, safe: &str, delegator: &str, delegate: &str, label: &str) {
        self.state.lock().unwrap().delegates.push(StoredDelegate {
            safe: safe.to_string(),
            delegator: delegator.to_string(),
            delegate: delegate.to_string(),
            label: label.to_string(),
        });
    }

    /// The next POST or DELETE answers with `status` and `body`
    pub fn fail_next_mutation(&self, status: u16, body: &str) {
        self.state.lock().unwrap().fail_next_mutation =
            Some((StatusCode::from_u16(status).unwrap(), body.to_string()));
    }

    pub fn set_delay(&self, delay: Duration) {
        self.state.lock().unwrap().delay = Some(delay);
    }

    pub fn set_page_size(&self, page_size: usize) {
        self.state.lock().unwrap().page_size = Some(page_size);
    }

    /// Pages that have a successor advertise `link` as `next` instead
    pub fn set_next_link(&self, link: &str) {
        self.state.lock().unwrap().next_link = Some(link.to_string());
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn requests_with_method(&self, method: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == method)
            .collect()
    }
}

/// Fetches the owner's Safes and returns the one matching `safe`
pub async fn owned_safe(client: &SafeServiceClient, owner: &str, safe: &str) -> SafeAddress {
    client
        .list_owner_safes(ChainId::MAINNET, &Address::new(owner))
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.as_str().eq_ignore_ascii_case(safe))
        .expect("Safe not owned by owner")
}

fn record(state: &Shared, method: &'static str, uri: &Uri, body: Option<Value>) -> Option<Duration> {
    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method,
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        body,
    });
    state.delay
}

async fn pause(delay: Option<Duration>) {
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
}

async fn owner_safes(State(state): State<Shared>, Path(owner): Path<String>, uri: Uri) -> Json<Value> {
    let delay = record(&state, "GET", &uri, None);
    pause(delay).await;

    let safes = state
        .lock()
        .unwrap()
        .owner_safes
        .get(&owner.to_ascii_lowercase())
        .cloned()
        .unwrap_or_default();
    Json(json!({ "safes": safes }))
}

async fn list_delegates(
    State(state): State<Shared>,
    Query(params): Query<HashMap<String, String>>,
    uri: Uri,
) -> Json<Value> {
    let delay = record(&state, "GET", &uri, None);
    pause(delay).await;

    let state = state.lock().unwrap();
    let matches = |value: &str, key: &str| {
        params
            .get(key)
            .is_none_or(|wanted| wanted.eq_ignore_ascii_case(value))
    };
    let results: Vec<Value> = state
        .delegates
        .iter()
        .filter(|d| matches(&d.safe, "safe") && matches(&d.delegator, "delegator"))
        .map(|d| {
            json!({
                "safe": d.safe,
                "delegate": d.delegate,
                "delegator": d.delegator,
                "label": d.label,
            })
        })
        .collect();

    let offset: usize = params
        .get("offset")
        .and_then(|o| o.parse().ok())
        .unwrap_or(0);
    let page_size = state.page_size.unwrap_or(usize::MAX);
    let end = offset.saturating_add(page_size).min(results.len());
    let next = (end < results.len()).then(|| {
        if let Some(link) = &state.next_link {
            return link.clone();
        }
        format!(
            "{}/api/v1/delegates/?safe={}&delegator={}&offset={end}",
            state.base_url,
            params.get("safe").cloned().unwrap_or_default(),
            params.get("delegator").cloned().unwrap_or_default(),
        )
    });

    let page = results[offset.min(end)..end].to_vec();
    Json(json!({
        "count": results.len(),
        "next": next,
        "previous": null,
        "results": page,
    }))
}

async fn add_delegate(
    State(state): State<Shared>,
    uri: Uri,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let delay = record(&state, "POST", &uri, Some(body.clone()));
    pause(delay).await;

    let mut state = state.lock().unwrap();
    if let Some((status, message)) = state.fail_next_mutation.take() {
        return (status, Json(json!({ "detail": message })));
    }

    let field = |name: &str| body[name].as_str().unwrap_or_default().to_string();
    let (safe, delegator, delegate, label) = (
        field("safe"),
        field("delegator"),
        field("delegate"),
        field("label"),
    );

    let existing = state.delegates.iter().position(|d| {
        d.safe.eq_ignore_ascii_case(&safe)
            && d.delegator.eq_ignore_ascii_case(&delegator)
            && d.delegate.eq_ignore_ascii_case(&delegate)
    });
    match existing {
        Some(index) => state.delegates[index].label = label.clone(),
        None => state.delegates.push(StoredDelegate {
            safe: safe.clone(),
            delegator: delegator.clone(),
            delegate: delegate.clone(),
            label: label.clone(),
        }),
    }

    (
        StatusCode::CREATED,
        Json(json!({
            "safe": safe,
            "delegate": delegate,
            "delegator": delegator,
            "label": label,
        })),
    )
}

async fn remove_delegate(
    State(state): State<Shared>,
    Path(delegate): Path<String>,
    uri: Uri,
    Json(body): Json<Value>,
) -> Response {
    let delay = record(&state, "DELETE", &uri, Some(body.clone()));
    pause(delay).await;

    let mut state = state.lock().unwrap();
    if let Some((status, message)) = state.fail_next_mutation.take() {
        return (status, Json(json!({ "detail": message }))).into_response();
    }

    let delegator = body["delegator"].as_str().unwrap_or_default().to_string();
    let before = state.delegates.len();
    state.delegates.retain(|d| {
        !(d.delegate.eq_ignore_ascii_case(&delegate) && d.delegator.eq_ignore_ascii_case(&delegator))
    });

    if state.delegates.len() == before {
        (StatusCode::NOT_FOUND, Json(json!({ "detail": "Not found." }))).into_response()
    } else {
        StatusCode::NO_CONTENT.into_response()
    }
}
