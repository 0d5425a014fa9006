//! ScanHistory - Recent Scan Results (Ring Buffer)
//!
//! ## Responsibilities
//!
//! - Keep the last N presented results in memory
//! - Provide queries for the operator API

use crate::result_presenter::{PresentationKind, PresentationView};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// Default number of records kept
pub const DEFAULT_CAPACITY: usize = 200;

/// One presented scan result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRecord {
    pub record_id: u64,
    pub kind: PresentationKind,
    pub name: String,
    pub rut: String,
    pub plan: String,
    pub time: String,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl ScanRecord {
    pub fn from_view(view: &PresentationView) -> Self {
        Self {
            record_id: 0,
            kind: view.kind,
            name: view.name.clone(),
            rut: view.rut.clone(),
            plan: view.plan.clone(),
            time: view.time.clone(),
            error: view.error.clone(),
            recorded_at: Utc::now(),
        }
    }
}

/// Ring buffer for records
struct RecordRingBuffer {
    records: VecDeque<ScanRecord>,
    capacity: usize,
    next_id: u64,
}

impl RecordRingBuffer {
    fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
            next_id: 1,
        }
    }

    fn push(&mut self, mut record: ScanRecord) -> u64 {
        let id = self.next_id;
        record.record_id = id;
        self.next_id += 1;

        if self.records.len() >= self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        id
    }

    fn latest(&self, count: usize) -> Vec<ScanRecord> {
        self.records.iter().rev().take(count).cloned().collect()
    }

    fn by_kind(&self, kind: PresentationKind, count: usize) -> Vec<ScanRecord> {
        self.records
            .iter()
            .rev()
            .filter(|r| r.kind == kind)
            .take(count)
            .cloned()
            .collect()
    }
}

/// ScanHistory instance
pub struct ScanHistory {
    buffer: RwLock<RecordRingBuffer>,
}

impl ScanHistory {
    /// Create new ScanHistory
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(RecordRingBuffer::new(capacity)),
        }
    }

    /// Record a presented result
    pub async fn add(&self, record: ScanRecord) -> u64 {
        let mut buffer = self.buffer.write().await;
        let id = buffer.push(record);
        tracing::debug!(record_id = id, "Scan result recorded");
        id
    }

    /// Newest first
    pub async fn latest(&self, count: usize) -> Vec<ScanRecord> {
        self.buffer.read().await.latest(count)
    }

    pub async fn by_kind(&self, kind: PresentationKind, count: usize) -> Vec<ScanRecord> {
        self.buffer.read().await.by_kind(kind, count)
    }

    pub async fn count(&self) -> usize {
        self.buffer.read().await.records.len()
    }
}

impl Default for ScanHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
