//! In-process fakes for tests: a contents API and probe targets.

use crate::config::StoreConfig;
use crate::store::{ProbeStatus, Sample};

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use base64::Engine as _;
use chrono::{DateTime, SubsecRound, Utc};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Build a sample as the probe would, with millisecond timestamps.
pub fn sample_at(name: &str, timestamp: DateTime<Utc>) -> Sample {
    Sample {
        timestamp: timestamp.trunc_subsecs(3),
        target_name: name.to_string(),
        url: format!("http://{}.example/", name.to_lowercase()),
        status: ProbeStatus::Up,
        status_code: 200,
        response_time_ms: 12,
    }
}

/// Serve `router` on an ephemeral local port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Endpoints for probe tests.
///
/// - `/ok`: 200 after 10 ms
/// - `/status/{code}`: responds with `code`
/// - `/slow`: 200 after 5 s
pub async fn spawn_targets() -> String {
    let router = Router::new()
        .route(
            "/ok",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                "ok"
            }),
        )
        .route(
            "/status/{code}",
            get(|Path(code): Path<u16>| async move {
                StatusCode::from_u16(code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
            }),
        )
        .route(
            "/slow",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                "late"
            }),
        );
    serve(router).await
}

/// What the fake saw of one contents API call.
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub method: &'static str,
    pub authorization: Option<String>,
    pub accept: Option<String>,
    /// `ref` query parameter
    pub git_ref: Option<String>,
    /// `branch` field of a PUT body
    pub branch: Option<String>,
}

struct FakeFile {
    content: Vec<u8>,
    sha: String,
}

#[derive(Default)]
struct FakeRepoState {
    files: HashMap<String, FakeFile>,
    revision: u64,
    fail_reads: bool,
    write_status: Option<StatusCode>,
    omit_inline_content: bool,
    messages: Vec<String>,
    requests: Vec<RecordedRequest>,
}

impl FakeRepoState {
    fn next_sha(&mut self) -> String {
        self.revision += 1;
        format!("sha-{}", self.revision)
    }
}

type Shared = Arc<Mutex<FakeRepoState>>;

/// Minimal stand-in for the GitHub contents API with sha-checked updates.
#[derive(Clone)]
pub struct FakeGithub {
    pub base_url: String,
    state: Shared,
}

impl FakeGithub {
    pub async fn spawn() -> Self {
        let state: Shared = Arc::new(Mutex::new(FakeRepoState::default()));
        let router = Router::new()
            .route(
                "/repos/{owner}/{repo}/contents/{*path}",
                get(get_contents).put(put_contents),
            )
            .with_state(state.clone());
        let base_url = serve(router).await;
        Self { base_url, state }
    }

    pub fn store_config(&self, repo: &str, path: &str) -> StoreConfig {
        StoreConfig {
            api_url: self.base_url.clone(),
            repo: repo.to_string(),
            path: path.to_string(),
            token: Some("test-token".to_string()),
            ..Default::default()
        }
    }

    pub fn seed(&self, repo: &str, path: &str, samples: &[Sample]) {
        let content = serde_json::to_vec_pretty(samples).unwrap();
        let mut state = self.state.lock().unwrap();
        let sha = state.next_sha();
        state.files.insert(file_key(repo, path), FakeFile { content, sha });
    }

    pub fn raw_document(&self, repo: &str, path: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .files
            .get(&file_key(repo, path))
            .map(|f| String::from_utf8(f.content.clone()).unwrap())
    }

    pub fn document(&self, repo: &str, path: &str) -> Option<Vec<Sample>> {
        self.raw_document(repo, path)
            .map(|raw| serde_json::from_str(&raw).unwrap())
    }

    pub fn commit_messages(&self) -> Vec<String> {
        self.state.lock().unwrap().messages.clone()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().unwrap().requests.clone()
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.state.lock().unwrap().fail_reads = fail;
    }

    pub fn set_write_status(&self, status: Option<StatusCode>) {
        self.state.lock().unwrap().write_status = status;
    }

    /// When false, GETs answer like the API does for files over 1 MB.
    pub fn set_inline_content(&self, inline: bool) {
        self.state.lock().unwrap().omit_inline_content = !inline;
    }
}

fn file_key(repo: &str, path: &str) -> String {
    format!("{}/{}", repo, path)
}

fn header_value(headers: &HeaderMap, name: header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn message(status: StatusCode, text: &str) -> Response {
    (status, Json(json!({ "message": text }))).into_response()
}

async fn get_contents(
    State(state): State<Shared>,
    Path((owner, repo, path)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method: "GET",
        authorization: header_value(&headers, header::AUTHORIZATION),
        accept: header_value(&headers, header::ACCEPT),
        git_ref: query.get("ref").cloned(),
        branch: None,
    });
    if state.fail_reads {
        return message(StatusCode::INTERNAL_SERVER_ERROR, "Server Error");
    }

    let Some(file) = state.files.get(&file_key(&format!("{}/{}", owner, repo), &path)) else {
        return message(StatusCode::NOT_FOUND, "Not Found");
    };

    let wants_raw = header_value(&headers, header::ACCEPT).is_some_and(|v| v.contains("raw"));
    if wants_raw {
        return (StatusCode::OK, file.content.clone()).into_response();
    }

    if state.omit_inline_content {
        return Json(json!({ "sha": file.sha, "content": "", "encoding": "none" })).into_response();
    }

    // The real API wraps base64 content at 60 columns.
    let encoded = base64::engine::general_purpose::STANDARD.encode(&file.content);
    let wrapped: Vec<&str> = encoded
        .as_bytes()
        .chunks(60)
        .map(|c| std::str::from_utf8(c).unwrap())
        .collect();
    Json(json!({
        "sha": file.sha,
        "content": wrapped.join("\n"),
        "encoding": "base64",
    }))
    .into_response()
}

async fn put_contents(
    State(state): State<Shared>,
    Path((owner, repo, path)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let mut state = state.lock().unwrap();
    state.requests.push(RecordedRequest {
        method: "PUT",
        authorization: header_value(&headers, header::AUTHORIZATION),
        accept: header_value(&headers, header::ACCEPT),
        git_ref: None,
        branch: body.get("branch").and_then(Value::as_str).map(str::to_string),
    });
    if let Some(status) = state.write_status {
        return message(status, "Bad credentials");
    }

    let key = file_key(&format!("{}/{}", owner, repo), &path);
    let supplied = body.get("sha").and_then(Value::as_str);
    let existing = state.files.get(&key).map(|f| f.sha.clone());

    match (existing.as_deref(), supplied) {
        (Some(_), None) => {
            return message(
                StatusCode::UNPROCESSABLE_ENTITY,
                "Invalid request.\n\n\"sha\" wasn't supplied.",
            )
        }
        (Some(current), Some(given)) if current != given => {
            return message(StatusCode::CONFLICT, &format!("{} does not match {}", path, given))
        }
        (None, Some(_)) => return message(StatusCode::CONFLICT, "file was deleted"),
        _ => {}
    }

    let Some(content) = body
        .get("content")
        .and_then(Value::as_str)
        .and_then(|c| base64::engine::general_purpose::STANDARD.decode(c).ok())
    else {
        return message(StatusCode::UNPROCESSABLE_ENTITY, "content is not valid Base64");
    };

    if let Some(msg) = body.get("message").and_then(Value::as_str) {
        state.messages.push(msg.to_string());
    }

    let sha = state.next_sha();
    state.files.insert(key, FakeFile { content, sha: sha.clone() });

    let status = if existing.is_some() {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    (status, Json(json!({ "content": { "path": path, "sha": sha } }))).into_response()
}
