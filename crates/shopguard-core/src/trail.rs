use crate::types::CorrelationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::VecDeque;
use tokio::sync::RwLock;

/// What a trail entry recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrailEntryKind {
    Assessment,
    OutcomeNotification,
}

/// One request/response exchange with the risk scoring service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrailEntry {
    pub index: u64,
    pub correlation_id: CorrelationId,
    pub kind: TrailEntryKind,
    pub label: String,
    pub request: Value,
    pub response: Option<Value>,
    pub error: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

/// Draft of an entry before the trail assigns its index.
#[derive(Debug, Clone)]
pub struct TrailRecord {
    pub correlation_id: CorrelationId,
    pub kind: TrailEntryKind,
    pub label: String,
    pub request: Value,
    pub response: Option<Value>,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct TrailState {
    next_index: u64,
    entries: VecDeque<TrailEntry>,
}

/// Bounded append-only log of gate exchanges, kept for display and troubleshooting.
///
/// Entries are never edited. Once `capacity` is reached the oldest entry is dropped.
#[derive(Debug)]
pub struct AssessmentTrail {
    capacity: usize,
    state: RwLock<TrailState>,
}

impl AssessmentTrail {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            state: RwLock::new(TrailState::default()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn append(&self, record: TrailRecord) -> TrailEntry {
        let mut state = self.state.write().await;
        let entry = TrailEntry {
            index: state.next_index,
            correlation_id: record.correlation_id,
            kind: record.kind,
            label: record.label,
            request: record.request,
            response: record.response,
            error: record.error,
            recorded_at: Utc::now(),
        };
        state.next_index += 1;

        if state.entries.len() == self.capacity {
            state.entries.pop_front();
        }
        state.entries.push_back(entry.clone());
        entry
    }

    pub async fn for_correlation(&self, correlation_id: &CorrelationId) -> Vec<TrailEntry> {
        self.state
            .read()
            .await
            .entries
            .iter()
            .filter(|entry| &entry.correlation_id == correlation_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for AssessmentTrail {
    fn default() -> Self {
        Self::new(1024)
    }
}
