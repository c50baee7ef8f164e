//! In-process mock of the test-management API.
//!
//! The server runs on its own thread with its own tokio runtime, since the
//! blocking client cannot be driven from inside another runtime. Every
//! request is recorded so tests can assert exactly which calls were made and
//! in what order.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use axum::body::Bytes;
use axum::extract::{Path as UrlPath, RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{patch, post, put};
use axum::{Json, Router};
use runledger_client::{Client, ClientConfig};
use runledger_core::{Diagnostics, Level};
use serde_json::{json, Value};
use tokio::net::TcpListener;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: &'static str,
    pub name: String,
}

impl Call {
    pub fn new(kind: &'static str, name: &str) -> Self {
        Self {
            kind,
            name: name.to_string(),
        }
    }
}

/// Failure injection, keyed by attachment name.
#[derive(Debug, Default, Clone)]
pub struct Behavior {
    pub fail_initialize_for: Option<String>,
    pub fail_put_for: Option<(String, u16)>,
    pub fail_sync_for: Option<String>,
    pub create_run_status: Option<u16>,
    pub import_status: Option<u16>,
    pub run_warnings: Vec<String>,
    /// GET /runs/{id} answers 503 this many times before serving.
    pub fail_get_times: usize,
    /// GET /runs/{id} answers 200 with a body that is not JSON.
    pub garbled_get_run: bool,
    /// DELETE endpoints answer 204 with no body.
    pub empty_deletes: bool,
    /// initialize hands out an upload URL nothing listens on.
    pub dead_upload_url_for: Option<String>,
}

#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub name: String,
    pub content_type: Option<String>,
    pub data: Option<Vec<u8>>,
    pub linked_to: Option<String>,
}

#[derive(Default)]
pub struct MockState {
    pub root: String,
    pub behavior: Behavior,
    pub calls: Vec<Call>,
    pub uploads: HashMap<String, StoredUpload>,
    /// run id -> (payload, linked upload ids)
    pub runs: HashMap<String, (Value, Vec<String>)>,
    pub run_order: Vec<String>,
    pub imports: Vec<Value>,
    pub auth_headers: Vec<(&'static str, Option<String>)>,
    next_id: u64,
}

impl MockState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}-{}-{}", self.next_id, &uuid::Uuid::new_v4().simple().to_string()[..8])
    }

    fn record(&mut self, kind: &'static str, name: &str, headers: &HeaderMap) {
        self.calls.push(Call::new(kind, name));
        let auth = headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        self.auth_headers.push((kind, auth));
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockServer {
    pub root: String,
    pub state: Shared,
}

impl MockServer {
    pub fn api_url(&self) -> String {
        format!("{}/api/v1", self.root)
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn call_kinds(&self) -> Vec<&'static str> {
        self.calls().into_iter().map(|c| c.kind).collect()
    }

    /// Calls that touched the attachment called `name`.
    pub fn calls_for(&self, name: &str) -> Vec<&'static str> {
        self.calls()
            .into_iter()
            .filter(|c| c.name == name)
            .map(|c| c.kind)
            .collect()
    }

    pub fn upload_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c.kind, "initialize" | "put" | "sync"))
            .count()
    }

    pub fn linked_names(&self, run_id: &str) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state
            .runs
            .get(run_id)
            .map(|(_, ids)| ids.iter().map(|id| state.uploads[id].name.clone()).collect())
            .unwrap_or_default()
    }

    pub fn stored_unlinked(&self) -> Vec<String> {
        self.state
            .lock()
            .unwrap()
            .uploads
            .values()
            .filter(|u| u.data.is_some() && u.linked_to.is_none())
            .map(|u| u.name.clone())
            .collect()
    }

    pub fn run_count(&self) -> usize {
        self.state.lock().unwrap().runs.len()
    }
}

pub fn spawn_server(behavior: Behavior) -> MockServer {
    let state: Shared = Arc::new(Mutex::new(MockState {
        behavior,
        ..Default::default()
    }));
    let shared = state.clone();
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async move {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let root = format!("http://{}", listener.local_addr().unwrap());
            shared.lock().unwrap().root = root.clone();
            tx.send(root).unwrap();
            axum::serve(listener, router(shared)).await.unwrap();
        });
    });
    let root = rx.recv().unwrap();
    MockServer { root, state }
}

fn dead_root() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}

/// A base URL nothing is listening on.
pub fn dead_url() -> String {
    format!("{}/api/v1", dead_root())
}

fn router(state: Shared) -> Router {
    Router::new()
        .route("/api/v1/uploads/initialize", post(initialize))
        .route("/api/v1/uploads/sync", post(sync))
        .route("/storage/{id}", put(store))
        .route(
            "/api/v1/runs",
            post(create_run).get(list_runs).delete(delete_runs),
        )
        .route("/api/v1/runs/{id}", axum::routing::get(get_run))
        .route("/api/v1/import", post(import))
        .route("/api/v1/units/{serial}", patch(update_unit))
        .route("/api/v1/units", axum::routing::delete(delete_units))
        .with_state(state)
}

fn error_response(status: u16, message: &str) -> Response {
    (
        StatusCode::from_u16(status).unwrap(),
        Json(json!({"error": {"message": message}})),
    )
        .into_response()
}

async fn initialize(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    let name = body["name"].as_str().unwrap_or_default().to_string();
    state.record("initialize", &name, &headers);
    if state.behavior.fail_initialize_for.as_deref() == Some(name.as_str()) {
        return error_response(503, "storage unavailable");
    }
    let id = state.next_id("upload");
    let root = if state.behavior.dead_upload_url_for.as_deref() == Some(name.as_str()) {
        dead_root()
    } else {
        state.root.clone()
    };
    let upload_url = format!("{root}/storage/{id}");
    state.uploads.insert(
        id.clone(),
        StoredUpload {
            name,
            content_type: None,
            data: None,
            linked_to: None,
        },
    );
    Json(json!({"id": id, "uploadUrl": upload_url})).into_response()
}

async fn store(
    State(state): State<Shared>,
    UrlPath(id): UrlPath<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let mut state = state.lock().unwrap();
    let Some(name) = state.uploads.get(&id).map(|u| u.name.clone()) else {
        return (StatusCode::NOT_FOUND, "no such upload").into_response();
    };
    state.record("put", &name, &headers);
    if let Some((fail_name, status)) = state.behavior.fail_put_for.clone() {
        if fail_name == name {
            return (StatusCode::from_u16(status).unwrap(), "upstream exploded").into_response();
        }
    }
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    if let Some(upload) = state.uploads.get_mut(&id) {
        upload.content_type = content_type;
        upload.data = Some(body.to_vec());
    }
    StatusCode::OK.into_response()
}

async fn sync(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    let upload_id = body["upload_id"].as_str().unwrap_or_default().to_string();
    let run_id = body["run_id"].as_str().unwrap_or_default().to_string();
    let name = state
        .uploads
        .get(&upload_id)
        .map(|u| u.name.clone())
        .unwrap_or_default();
    state.record("sync", &name, &headers);
    if state.behavior.fail_sync_for.as_deref() == Some(name.as_str()) {
        return error_response(502, "link service down");
    }
    if !state.runs.contains_key(&run_id) {
        return error_response(404, "run not found");
    }
    let stored = state
        .uploads
        .get(&upload_id)
        .map(|u| u.data.is_some())
        .unwrap_or(false);
    if !stored {
        return error_response(409, "upload has no data");
    }
    if let Some(upload) = state.uploads.get_mut(&upload_id) {
        upload.linked_to = Some(run_id.clone());
    }
    if let Some((_, linked)) = state.runs.get_mut(&run_id) {
        linked.push(upload_id);
    }
    (StatusCode::OK, Json(json!({}))).into_response()
}

fn created_response(state: &mut MockState, id: &str) -> Response {
    let url = format!("{}/runs/{id}", state.root);
    let mut body = json!({"id": id, "url": url, "message": "Run created"});
    if !state.behavior.run_warnings.is_empty() {
        body["warnings"] = json!(state.behavior.run_warnings);
    }
    Json(body).into_response()
}

async fn create_run(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    let serial = body["unit_under_test"]["serial_number"]
        .as_str()
        .unwrap_or_default()
        .to_string();
    state.record("create_run", &serial, &headers);
    if let Some(status) = state.behavior.create_run_status {
        return error_response(status, "Validation failed: procedure_id is unknown");
    }
    let id = state.next_id("run");
    state.runs.insert(id.clone(), (body, Vec::new()));
    state.run_order.push(id.clone());
    created_response(&mut state, &id)
}

fn run_json(state: &MockState, id: &str) -> Option<Value> {
    let (payload, linked) = state.runs.get(id)?;
    let attachments: Vec<Value> = linked
        .iter()
        .map(|upload_id| {
            let upload = &state.uploads[upload_id];
            json!({
                "name": upload.name,
                "content_type": upload.content_type.clone().unwrap_or_default(),
                "size": upload.data.as_ref().map(|d| d.len()),
            })
        })
        .collect();
    Some(json!({
        "id": id,
        "run_passed": payload.get("run_passed").cloned().unwrap_or(Value::Null),
        "unit_under_test": payload.get("unit_under_test").cloned().unwrap_or(Value::Null),
        "procedure_id": payload.get("procedure_id").cloned().unwrap_or(Value::Null),
        "attachments": attachments,
    }))
}

async fn get_run(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(id): UrlPath<String>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.record("get_run", &id, &headers);
    if state.behavior.fail_get_times > 0 {
        state.behavior.fail_get_times -= 1;
        return error_response(503, "warming up");
    }
    if state.behavior.garbled_get_run {
        return (StatusCode::OK, "<html>proxy</html>").into_response();
    }
    match run_json(&state, &id) {
        Some(run) => Json(run).into_response(),
        None => error_response(404, &format!("run {id} not found")),
    }
}

fn query_values(raw: Option<String>, key: &str) -> Vec<String> {
    raw.unwrap_or_default()
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(k, _)| *k == key)
        .map(|(_, v)| v.to_string())
        .collect()
}

async fn list_runs(
    State(state): State<Shared>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Response {
    let mut state = state.lock().unwrap();
    let serial = query_values(raw, "serial_number").pop().unwrap_or_default();
    state.record("list_runs", &serial, &headers);
    let runs: Vec<Value> = state
        .run_order
        .iter()
        .filter(|id| state.runs[*id].0["unit_under_test"]["serial_number"] == serial.as_str())
        .filter_map(|id| run_json(&state, id))
        .collect();
    Json(json!({"runs": runs})).into_response()
}

async fn delete_runs(
    State(state): State<Shared>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Response {
    let mut state = state.lock().unwrap();
    let ids = query_values(raw, "ids");
    state.record("delete_runs", &ids.join(","), &headers);
    for id in &ids {
        state.runs.remove(id);
        state.run_order.retain(|r| r != id);
    }
    if state.behavior.empty_deletes {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(json!({"message": format!("{} run(s) deleted", ids.len())})).into_response()
}

async fn import(
    State(state): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    let upload_id = body["upload_id"].as_str().unwrap_or_default().to_string();
    let name = state
        .uploads
        .get(&upload_id)
        .map(|u| u.name.clone())
        .unwrap_or_default();
    state.record("import", &name, &headers);
    state.imports.push(body.clone());
    if let Some(status) = state.behavior.import_status {
        return error_response(status, "report could not be parsed");
    }
    if state.uploads.get(&upload_id).and_then(|u| u.data.as_ref()).is_none() {
        return error_response(400, "upload not found");
    }
    let id = state.next_id("run");
    state
        .runs
        .insert(id.clone(), (json!({"imported_from": upload_id}), Vec::new()));
    state.run_order.push(id.clone());
    created_response(&mut state, &id)
}

async fn update_unit(
    State(state): State<Shared>,
    headers: HeaderMap,
    UrlPath(serial): UrlPath<String>,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    let subs: Vec<String> = body["sub_units"]
        .as_array()
        .map(|subs| {
            subs.iter()
                .filter_map(|s| s["serial_number"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    state.record("update_unit", &format!("{serial}:{}", subs.join(",")), &headers);
    Json(json!({})).into_response()
}

async fn delete_units(
    State(state): State<Shared>,
    headers: HeaderMap,
    RawQuery(raw): RawQuery,
) -> Response {
    let mut state = state.lock().unwrap();
    let serials = query_values(raw, "serial_numbers");
    state.record("delete_units", &serials.join(","), &headers);
    if state.behavior.empty_deletes {
        return StatusCode::NO_CONTENT.into_response();
    }
    Json(json!({})).into_response()
}

// -- Client-side helpers --

#[derive(Default)]
pub struct Recorder {
    events: Mutex<Vec<(Level, String)>>,
}

impl Diagnostics for Recorder {
    fn emit(&self, level: Level, message: &str) {
        self.events.lock().unwrap().push((level, message.to_string()));
    }
}

impl Recorder {
    pub fn messages(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn any(&self, level: Level, needle: &str) -> bool {
        self.messages(level).iter().any(|m| m.contains(needle))
    }
}

pub fn client_with(config: ClientConfig) -> (Client, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let client = Client::with_diagnostics(config.with_get_retries(0), recorder.clone()).unwrap();
    (client, recorder)
}

/// Like [`client_with`] but keeps the configured GET retries.
pub fn retrying_client(config: ClientConfig, retries: u32) -> (Client, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let client =
        Client::with_diagnostics(config.with_get_retries(retries), recorder.clone()).unwrap();
    (client, recorder)
}

pub fn client_for(server: &MockServer) -> (Client, Arc<Recorder>) {
    client_with(ClientConfig::new(server.api_url()).with_api_key("test-key"))
}

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}
