use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub attempts: u32,
    pub last_error: String,
    /// False once a failure is known not to be fixable by another request.
    pub retryable: bool,
}

/// Failed file URLs and how many times each has been tried.
///
/// A URL leaves the ledger as soon as one attempt succeeds. Whatever is left
/// after the retry budget is spent is a permanent failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FailureLedger {
    entries: BTreeMap<String, FailureRecord>,
}

impl FailureLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more failed attempt for `url`, returning the new total.
    pub fn record_failure(&mut self, url: &str, error: impl Display, retryable: bool) -> u32 {
        let record = self
            .entries
            .entry(url.to_string())
            .or_insert_with(|| FailureRecord {
                attempts: 0,
                last_error: String::new(),
                retryable,
            });
        record.attempts += 1;
        record.last_error = error.to_string();
        record.retryable = retryable;
        record.attempts
    }

    /// Drop `url` after a successful attempt. Returns whether it was present.
    pub fn record_success(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    pub fn get(&self, url: &str) -> Option<&FailureRecord> {
        self.entries.get(url)
    }

    pub fn attempts(&self, url: &str) -> u32 {
        self.entries.get(url).map(|r| r.attempts).unwrap_or(0)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.entries.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FailureRecord)> {
        self.entries.iter().map(|(url, record)| (url.as_str(), record))
    }

    /// URLs that are retryable and have been tried fewer than `max_attempts` times.
    pub fn pending(&self, max_attempts: u32) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, r)| r.retryable && r.attempts < max_attempts)
            .map(|(url, _)| url.clone())
            .collect()
    }
}
