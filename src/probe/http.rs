//! HTTP probe implementation.

use std::time::Duration;
use super::ProbeError;

/// Build the client shared by all HTTP probes.
///
/// The client-level timeout bounds the whole request, which is what unblocks
/// a hung target.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, ProbeError> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()
        .map_err(|e| ProbeError::Config(e.to_string()))
}

/// Run an HTTP GET against the given url.
///
/// Returns the response status code once headers arrive. The body is not
/// read.
pub async fn run_http_probe(
    client: &reqwest::Client,
    url: &str,
    timeout: Duration,
) -> Result<u16, ProbeError> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| {
            if e.is_timeout() {
                ProbeError::Timeout(timeout)
            } else {
                ProbeError::Network(e.to_string())
            }
        })?;

    Ok(response.status().as_u16())
}
