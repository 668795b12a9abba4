//! Stored sample types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Availability classification of a single probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    Up,
    Down,
}

impl ProbeStatus {
    /// `Up` iff the status code is in the 2xx range.
    pub fn from_status_code(code: u16) -> Self {
        if (200..300).contains(&code) {
            ProbeStatus::Up
        } else {
            ProbeStatus::Down
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Up => f.write_str("up"),
            ProbeStatus::Down => f.write_str("down"),
        }
    }
}

/// One observation of a single target's availability and latency.
///
/// JSON keys follow the dashboard's document format: `name`, `statusCode`,
/// `responseTime` (milliseconds).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    /// Start of the measurement
    #[serde(with = "iso_millis")]
    pub timestamp: DateTime<Utc>,
    /// Documents written before multi-target support carry no name.
    #[serde(rename = "name", default)]
    pub target_name: String,
    pub url: String,
    pub status: ProbeStatus,
    /// HTTP status, or 0 when no response arrived
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(rename = "responseTime")]
    pub response_time_ms: u64,
}

/// Commit message describing which targets a write updated and when.
pub fn update_message(samples: &[Sample]) -> String {
    let Some(latest) = samples.iter().map(|s| s.timestamp).max() else {
        return "Monitor update: no new samples".to_string();
    };

    let parts: Vec<String> = samples
        .iter()
        .map(|s| {
            if s.target_name.is_empty() {
                s.status.to_string()
            } else {
                format!("{} {}", s.target_name, s.status)
            }
        })
        .collect();

    format!(
        "Monitor update: {} at {}",
        parts.join(", "),
        iso_millis::format(&latest)
    )
}

/// ISO-8601 UTC timestamps with millisecond precision, e.g. `2024-05-01T12:00:00.000Z`.
pub mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn format(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    pub fn serialize<S: Serializer>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format(dt))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
