//! Probe module for availability monitoring.
//!
//! A probe never fails: every outcome, including timeouts and transport
//! errors, becomes a [`Sample`].

mod http;

pub use http::*;

use crate::store::{ProbeStatus, Sample};
use crate::targets::Target;

use chrono::{SubsecRound, Utc};
use std::time::{Duration, Instant};
use thiserror::Error;

/// Probe error types.
#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("probe timed out after {0:?}")]
    Timeout(Duration),
    #[error("network error: {0}")]
    Network(String),
    #[error("invalid configuration: {0}")]
    Config(String),
}

/// Runs HTTP probes with a shared client and a fixed timeout.
#[derive(Clone)]
pub struct Prober {
    client: reqwest::Client,
    timeout: Duration,
}

impl Prober {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, ProbeError> {
        Ok(Self {
            client: build_http_client(user_agent, timeout)?,
            timeout,
        })
    }

    /// Probe a target once.
    pub async fn probe(&self, target: &Target) -> Sample {
        let timestamp = Utc::now().trunc_subsecs(3);
        let start = Instant::now();
        let result = run_http_probe(&self.client, &target.url, self.timeout).await;
        let response_time_ms = start.elapsed().as_millis() as u64;

        let status_code = match result {
            Ok(code) => code,
            Err(e) => {
                tracing::warn!("Probe: {} failed: {}", target.name, e);
                0
            }
        };
        let status = ProbeStatus::from_status_code(status_code);

        tracing::info!(
            "Probe: {} {} ({}) - {}ms",
            target.name,
            status,
            status_code,
            response_time_ms
        );

        Sample {
            timestamp,
            target_name: target.name.clone(),
            url: target.url.clone(),
            status,
            status_code,
            response_time_ms,
        }
    }
}
