//! Sequential batch runner.
//!
//! Items are queried strictly one after another with a fixed pause after each
//! item, so a long batch never puts more than one request in flight against
//! the case API. Failures are retried a fixed number of times and then
//! recorded on the row; one bad item never stops the rest of the batch.
use crate::client::{QueryBackend, QueryField, RawRecord};
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::fmt;
use std::time::Duration;

use crate::util::Pacer;

pub const SEQUENCE_KEY: &str = "NO";
pub const QUERIED_VALUE_KEY: &str = "_queriedValue_";
pub const STATUS_KEY: &str = "_apiQueryStatus";

const DEFAULT_RETRY_BUDGET: u32 = 3;
const DEFAULT_PACING_MS: u64 = 300;

/// Outcome of querying one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryStatus {
    Success,
    NotFound,
    Failed(String),
}

impl fmt::Display for QueryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryStatus::Success => f.write_str("success"),
            QueryStatus::NotFound => f.write_str("not found"),
            QueryStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// One result row: the API fields plus the run-assigned bookkeeping columns.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRecord {
    pub no: usize,
    pub queried_value: String,
    pub status: QueryStatus,
    pub fields: RawRecord,
}

impl QueryRecord {
    /// Raw value for a column key; bookkeeping keys shadow API fields.
    pub fn value(&self, key: &str) -> Option<Value> {
        match key {
            SEQUENCE_KEY => Some(Value::from(self.no)),
            QUERIED_VALUE_KEY => Some(Value::String(self.queried_value.clone())),
            STATUS_KEY => Some(Value::String(self.status.to_string())),
            _ => self.fields.get(key).cloned(),
        }
    }
}

impl Serialize for QueryRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let reserved = [SEQUENCE_KEY, QUERIED_VALUE_KEY, STATUS_KEY];
        let extra = self
            .fields
            .iter()
            .filter(|(key, _)| !reserved.contains(&key.as_str()));
        let mut map = serializer.serialize_map(None)?;
        for (key, value) in extra {
            map.serialize_entry(key, value)?;
        }
        map.serialize_entry(STATUS_KEY, &self.status.to_string())?;
        map.serialize_entry(SEQUENCE_KEY, &self.no)?;
        map.serialize_entry(QUERIED_VALUE_KEY, &self.queried_value)?;
        map.end()
    }
}

/// Retry and pacing policy for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunnerConfig {
    /// Attempts per item, including the first.
    pub retry_budget: u32,
    /// Pause after every item.
    pub pacing: Duration,
    /// Pause before retrying a failed attempt.
    pub backoff: Duration,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::with_pacing(Duration::from_millis(DEFAULT_PACING_MS))
    }
}

impl RunnerConfig {
    /// Backoff is always twice the pacing delay.
    pub fn with_pacing(pacing: Duration) -> Self {
        Self {
            retry_budget: DEFAULT_RETRY_BUDGET,
            pacing,
            backoff: pacing * 2,
        }
    }
}

pub struct BatchRunner<'a, B: QueryBackend, P: Pacer> {
    backend: &'a mut B,
    pacer: P,
    config: RunnerConfig,
    progress: Option<&'a mut dyn FnMut(usize, usize)>,
}

impl<'a, B: QueryBackend, P: Pacer> BatchRunner<'a, B, P> {
    pub fn new(backend: &'a mut B, pacer: P, config: RunnerConfig) -> Self {
        Self {
            backend,
            pacer,
            config,
            progress: None,
        }
    }

    /// Call `progress(done, total)` after each item.
    pub fn with_progress(mut self, progress: &'a mut dyn FnMut(usize, usize)) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn run(&mut self, items: &[String], field: QueryField) -> Vec<QueryRecord> {
        let total = items.len();
        let mut results = Vec::with_capacity(total);
        tracing::info!(total, field = field.key(), "batch run started");

        for (index, item) in items.iter().enumerate() {
            let (status, fields) = self.query_item(field, item);
            tracing::info!(item = %item, status = %status, "item finished");
            results.push(QueryRecord {
                no: index + 1,
                queried_value: item.clone(),
                status,
                fields,
            });
            if let Some(progress) = self.progress.as_deref_mut() {
                progress(index + 1, total);
            }
            self.pacer.pause(self.config.pacing);
        }

        results
    }

    fn query_item(&mut self, field: QueryField, item: &str) -> (QueryStatus, RawRecord) {
        let mut remaining = self.config.retry_budget.max(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.backend.query(field, item) {
                Ok(records) => {
                    return match records.into_iter().next() {
                        Some(first) => (QueryStatus::Success, first),
                        None => (QueryStatus::NotFound, RawRecord::new()),
                    };
                }
                Err(err) => {
                    tracing::warn!(item, attempt, error = %err, "query attempt failed");
                    remaining -= 1;
                    if remaining == 0 {
                        return (QueryStatus::Failed(err.to_string()), RawRecord::new());
                    }
                    self.pacer.pause(self.config.backoff);
                }
            }
        }
    }
}
