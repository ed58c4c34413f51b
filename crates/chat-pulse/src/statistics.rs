//! Time-windowed frequency statistics.
//!
//! [`FrequencyTracker`] keeps one append-only timestamp log per key. Counting
//! with a bounded window prunes the logs in place, so memory stays bounded
//! without a separate sweep.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The time window statistics are computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WindowRepr", into = "WindowRepr")]
pub enum TimeWindow {
    /// Only events at most this old count.
    Bounded(Duration),
    /// Every event counts; nothing is pruned.
    Unbounded,
}

impl TimeWindow {
    pub fn secs(secs: u64) -> Self {
        Self::Bounded(Duration::from_secs(secs))
    }

    fn as_delta(&self) -> Option<chrono::Duration> {
        match self {
            Self::Bounded(d) => {
                Some(chrono::Duration::from_std(*d).unwrap_or(chrono::Duration::MAX))
            }
            Self::Unbounded => None,
        }
    }
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::secs(60)
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounded(d) => write!(f, "last {}s", d.as_secs()),
            Self::Unbounded => write!(f, "all time"),
        }
    }
}

impl FromStr for TimeWindow {
    type Err = String;

    /// Accepts `all` or a number of seconds.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Ok(Self::Unbounded);
        }
        match s.parse::<u64>() {
            Ok(0) => Err("time window must be positive".to_string()),
            Ok(secs) => Ok(Self::secs(secs)),
            Err(_) => Err(format!("invalid time window '{}', expected seconds or 'all'", s)),
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WindowRepr {
    Secs(u64),
    Keyword(String),
}

impl TryFrom<WindowRepr> for TimeWindow {
    type Error = String;

    fn try_from(repr: WindowRepr) -> Result<Self, Self::Error> {
        match repr {
            WindowRepr::Secs(0) => Err("time window must be positive".to_string()),
            WindowRepr::Secs(secs) => Ok(Self::secs(secs)),
            WindowRepr::Keyword(s) => s.parse(),
        }
    }
}

impl From<TimeWindow> for WindowRepr {
    fn from(window: TimeWindow) -> Self {
        match window {
            TimeWindow::Bounded(d) => Self::Secs(d.as_secs()),
            TimeWindow::Unbounded => Self::Keyword("all".to_string()),
        }
    }
}

/// Number of events of a key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyCount {
    pub key: String,
    pub count: u64,
}

/// Recency-weighted score of a key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyScore {
    pub key: String,
    pub score: f64,
}

/// Per-key timestamp logs.
///
/// Keys iterate in lexical order, which is the "snapshot order" ties are
/// broken by when ranking.
#[derive(Debug, Clone, Default)]
pub struct FrequencyTracker {
    logs: BTreeMap<String, Vec<DateTime<Utc>>>,
}

impl FrequencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. Duplicates and out-of-order timestamps are allowed.
    pub fn record(&mut self, key: &str, timestamp: DateTime<Utc>) {
        match self.logs.get_mut(key) {
            Some(log) => log.push(timestamp),
            None => {
                self.logs.insert(key.to_string(), vec![timestamp]);
            }
        }
    }

    /// Drop every event older than the window and every key left empty.
    ///
    /// Returns the number of keys removed.
    pub fn prune(&mut self, window: TimeWindow, now: DateTime<Utc>) -> usize {
        let Some(window) = window.as_delta() else {
            return 0;
        };

        let before = self.logs.len();
        self.logs.retain(|_, log| {
            log.retain(|ts| now.signed_duration_since(*ts) <= window);
            !log.is_empty()
        });
        before - self.logs.len()
    }

    /// Count events per key inside the window, pruning older ones first.
    pub fn snapshot_counts(&mut self, window: TimeWindow, now: DateTime<Utc>) -> Vec<KeyCount> {
        self.prune(window, now);
        self.logs
            .iter()
            .map(|(key, log)| KeyCount {
                key: key.clone(),
                count: log.len() as u64,
            })
            .collect()
    }

    /// Linearly decayed score per key, rounded to one decimal place.
    ///
    /// An event at `now` weighs 1 and one exactly `window` old weighs 0.
    /// Events timestamped after `now` weigh 1. Unbounded windows score raw
    /// counts. Does not prune.
    pub fn decay_scores(&self, window: TimeWindow, now: DateTime<Utc>) -> Vec<KeyScore> {
        let window_ms = match window {
            TimeWindow::Bounded(d) => d.as_secs_f64() * 1000.0,
            TimeWindow::Unbounded => {
                return self
                    .logs
                    .iter()
                    .map(|(key, log)| KeyScore {
                        key: key.clone(),
                        score: log.len() as f64,
                    })
                    .collect();
            }
        };

        self.logs
            .iter()
            .map(|(key, log)| {
                let total: f64 = log
                    .iter()
                    .map(|ts| {
                        let age_ms = now.signed_duration_since(*ts).num_milliseconds().max(0);
                        (1.0 - age_ms as f64 / window_ms).max(0.0)
                    })
                    .sum();
                KeyScore {
                    key: key.clone(),
                    score: round_tenth(total),
                }
            })
            .collect()
    }

    /// Stored log length of a key, `None` when the key does not exist.
    pub fn log_len(&self, key: &str) -> Option<usize> {
        self.logs.get(key).map(Vec::len)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.logs.contains_key(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.logs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.logs.is_empty()
    }

    pub fn clear(&mut self) {
        self.logs.clear();
    }
}

fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Sort counts descending, keeping input order for ties, and keep `limit`.
pub fn rank_counts(mut counts: Vec<KeyCount>, limit: usize) -> Vec<KeyCount> {
    counts.sort_by(|a, b| b.count.cmp(&a.count));
    counts.truncate(limit);
    counts
}

/// Sort scores descending, keeping input order for ties, and keep `limit`.
pub fn rank_scores(mut scores: Vec<KeyScore>, limit: usize) -> Vec<KeyScore> {
    scores.sort_by(|a, b| b.score.total_cmp(&a.score));
    scores.truncate(limit);
    scores
}
