//! Retention policy and the merge of new samples into the stored series.

use crate::store::Sample;

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashSet;
use std::str::FromStr;
use std::time::Duration;

/// One probe per minute for one target over a week.
pub const DEFAULT_RETENTION_COUNT: usize = 10_080;

/// Default window for time-bound retention.
pub const DEFAULT_RETENTION_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Bound on the stored series. Fixed per deployment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep the most recently appended `n` samples across all targets.
    Count(usize),
    /// Keep samples no older than the window, relative to the merge time.
    Window(Duration),
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        RetentionPolicy::Count(DEFAULT_RETENTION_COUNT)
    }
}

impl FromStr for RetentionPolicy {
    type Err = String;

    /// Parse `count:<n>` or `window:<seconds>`; a bare `count` or `window`
    /// takes the default bound.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (kind, value) = match s.split_once(':') {
            Some((kind, value)) => (kind, Some(value.trim())),
            None => (s, None),
        };

        match (kind.to_ascii_lowercase().as_str(), value) {
            ("count", None) => Ok(RetentionPolicy::Count(DEFAULT_RETENTION_COUNT)),
            ("window", None) => Ok(RetentionPolicy::Window(DEFAULT_RETENTION_WINDOW)),
            ("count", Some(v)) => match v.parse::<usize>() {
                Ok(n) if n > 0 => Ok(RetentionPolicy::Count(n)),
                _ => Err(format!("invalid retention count: {}", v)),
            },
            ("window", Some(v)) => match v.parse::<u64>() {
                Ok(secs) if secs > 0 => Ok(RetentionPolicy::Window(Duration::from_secs(secs))),
                _ => Err(format!("invalid retention window: {}", v)),
            },
            _ => Err(format!("unknown retention policy: {}", s)),
        }
    }
}

impl std::fmt::Display for RetentionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetentionPolicy::Count(n) => write!(f, "count:{}", n),
            RetentionPolicy::Window(d) => write!(f, "window:{}", d.as_secs()),
        }
    }
}

/// Append `new` to `existing` and apply `policy` as of `now`.
///
/// New samples whose `(name, timestamp)` is already present, in the stored
/// series or earlier in the batch, are skipped. Samples are never modified;
/// the result is a filtered concatenation in append order.
pub fn merge(
    existing: Vec<Sample>,
    new: Vec<Sample>,
    policy: RetentionPolicy,
    now: DateTime<Utc>,
) -> Vec<Sample> {
    let mut series = existing;

    {
        let mut seen: HashSet<(String, DateTime<Utc>)> = series
            .iter()
            .map(|s| (s.target_name.clone(), s.timestamp))
            .collect();

        for sample in new {
            if seen.insert((sample.target_name.clone(), sample.timestamp)) {
                series.push(sample);
            } else {
                tracing::debug!(
                    "Retention: skipping duplicate sample for {} at {}",
                    sample.target_name,
                    sample.timestamp
                );
            }
        }
    }

    match policy {
        RetentionPolicy::Count(limit) => {
            if series.len() > limit {
                let excess = series.len() - limit;
                series.drain(..excess);
            }
        }
        RetentionPolicy::Window(window) => {
            // A window too large to represent keeps everything.
            let cutoff = ChronoDuration::from_std(window)
                .ok()
                .and_then(|w| now.checked_sub_signed(w));
            if let Some(cutoff) = cutoff {
                series.retain(|s| s.timestamp >= cutoff);
            }
        }
    }

    series
}
