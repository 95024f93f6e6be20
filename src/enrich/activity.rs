use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::enrich::capability::CapabilityError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CallStatus {
    Success,
    Error,
    Timeout,
}

/// One capability call
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub at: DateTime<Utc>,
    /// Which capability answered (`summarizer`, `classifier`, ...)
    pub service: String,
    /// What was asked of it (`summarize`, `classify`, ...)
    pub action: String,
    pub status: CallStatus,
    pub detail: Option<String>,
    pub duration_ms: u64,
}

impl ActivityRecord {
    pub fn from_result<T>(
        service: &str,
        action: &str,
        result: &Result<T, CapabilityError>,
        elapsed: Duration,
    ) -> Self {
        let (status, detail) = match result {
            Ok(_) => (CallStatus::Success, None),
            Err(CapabilityError::Timeout(_)) => (CallStatus::Timeout, None),
            Err(e) => (CallStatus::Error, Some(e.to_string())),
        };
        ActivityRecord {
            at: Utc::now(),
            service: service.to_string(),
            action: action.to_string(),
            status,
            detail,
            duration_ms: u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
        }
    }
}

/// Bounded record of external capability calls, newest first. Once full,
/// the oldest record is evicted.
pub struct ActivityLog {
    capacity: usize,
    records: Mutex<VecDeque<ActivityRecord>>,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Self {
        ActivityLog {
            capacity,
            records: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn record(&self, record: ActivityRecord) {
        if self.capacity == 0 {
            return;
        }
        let mut q = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        q.push_front(record);
        q.truncate(self.capacity);
    }

    /// Up to `limit` records, newest first
    pub fn recent(&self, limit: usize) -> Vec<ActivityRecord> {
        let q = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        q.iter().take(limit).cloned().collect()
    }

    /// Records strictly newer than `after`, newest first
    pub fn since(&self, after: DateTime<Utc>) -> Vec<ActivityRecord> {
        let q = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        q.iter().take_while(|r| r.at > after).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}
