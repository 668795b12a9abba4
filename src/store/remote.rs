//! Remote document store backed by the GitHub contents API.
//!
//! The whole series lives in one JSON file. Every write replaces the file and
//! must quote the blob sha obtained from the preceding read; a stale sha is
//! rejected by the server and surfaces as [`StoreError::Conflict`].

use crate::config::StoreConfig;

use base64::Engine as _;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use super::models::Sample;

const ACCEPT_JSON: &str = "application/vnd.github.v3+json";
const ACCEPT_RAW: &str = "application/vnd.github.raw";

/// Store error types.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("document not found")]
    NotFound,
    #[error("version conflict: document changed since it was read")]
    Conflict,
    #[error("unexpected status {status}: {body}")]
    Status { status: StatusCode, body: String },
    #[error("invalid base64 content: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("invalid document: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid header value: {0}")]
    Header(#[from] reqwest::header::InvalidHeaderValue),
}

impl StoreError {
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict)
    }
}

/// A series as read from the store, with the version it was read at.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub samples: Vec<Sample>,
    /// Blob sha of the document; `None` when the document does not exist yet.
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContentsResponse {
    #[serde(default)]
    content: String,
    #[serde(default)]
    encoding: Option<String>,
    sha: String,
}

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    content: Option<ContentRef>,
}

#[derive(Debug, Deserialize)]
struct ContentRef {
    sha: String,
}

/// Client for one JSON document in a repository.
#[derive(Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    config: StoreConfig,
}

impl RemoteStore {
    /// Create a new store client for the given document location.
    pub fn new(config: StoreConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(token) = &config.token {
            let mut value = HeaderValue::from_str(&format!("token {}", token))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { client, config })
    }

    pub fn repo(&self) -> &str {
        &self.config.repo
    }

    fn contents_url(&self) -> String {
        format!(
            "{}/repos/{}/contents/{}",
            self.config.api_url.trim_end_matches('/'),
            self.config.repo,
            self.config.path.trim_start_matches('/')
        )
    }

    /// Fetch the current document, failing on any error including absence.
    pub async fn fetch(&self) -> Result<Snapshot, StoreError> {
        let response = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.config.branch.as_str())])
            .header(ACCEPT, ACCEPT_JSON)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }

        let file: ContentsResponse = response.json().await?;

        // Files over 1 MB come back without inline content.
        let bytes = if file.encoding.as_deref() == Some("none") {
            self.fetch_raw().await?
        } else {
            decode_content(&file.content)?
        };

        Ok(Snapshot {
            samples: parse_series(&bytes)?,
            version: Some(file.sha),
        })
    }

    async fn fetch_raw(&self) -> Result<Vec<u8>, StoreError> {
        let response = self
            .client
            .get(self.contents_url())
            .query(&[("ref", self.config.branch.as_str())])
            .header(ACCEPT, ACCEPT_RAW)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Status { status, body });
        }
        Ok(response.bytes().await?.to_vec())
    }

    /// Read the current document for a merge.
    ///
    /// A missing document is an empty series with no version. Any other
    /// failure is logged and also reported as an empty series with no
    /// version, so the caller cannot tell it apart from a fresh document.
    pub async fn read(&self) -> Snapshot {
        match self.fetch().await {
            Ok(snapshot) => snapshot,
            Err(StoreError::NotFound) => {
                tracing::info!(
                    "Store: {}/{} does not exist yet, starting empty",
                    self.config.repo,
                    self.config.path
                );
                Snapshot::default()
            }
            Err(e) => {
                tracing::error!(
                    "Store: failed to read {}/{}: {}",
                    self.config.repo,
                    self.config.path,
                    e
                );
                Snapshot::default()
            }
        }
    }

    /// Replace the document with `samples`.
    ///
    /// `version` must be the sha from the read this write is based on, or
    /// `None` to create the document. Returns the new version on success.
    pub async fn write(
        &self,
        samples: &[Sample],
        version: Option<&str>,
        message: &str,
    ) -> Result<Option<String>, StoreError> {
        let body = serde_json::to_string_pretty(samples)?;
        let request = UpdateRequest {
            message,
            content: base64::engine::general_purpose::STANDARD.encode(body.as_bytes()),
            branch: &self.config.branch,
            sha: version,
        };

        let response = self
            .client
            .put(self.contents_url())
            .header(ACCEPT, ACCEPT_JSON)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let updated: UpdateResponse = response.json().await?;
            return Ok(updated.content.map(|c| c.sha));
        }

        let body = response.text().await.unwrap_or_default();
        if is_conflict(status, &body) {
            return Err(StoreError::Conflict);
        }
        Err(StoreError::Status { status, body })
    }
}

fn is_conflict(status: StatusCode, body: &str) -> bool {
    status == StatusCode::CONFLICT
        || (status == StatusCode::UNPROCESSABLE_ENTITY && body.contains("sha"))
}

/// Decode base64 content as returned by the API, which wraps lines.
fn decode_content(content: &str) -> Result<Vec<u8>, StoreError> {
    let compact: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    Ok(base64::engine::general_purpose::STANDARD.decode(compact)?)
}

fn parse_series(bytes: &[u8]) -> Result<Vec<Sample>, StoreError> {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(bytes)?)
}
