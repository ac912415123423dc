use crate::provider::TxId;
use chrono::{
    DateTime,
    Utc,
};
use std::collections::VecDeque;

pub const ACTIVITY_LOG_CAP: usize = 50;

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ActivityRecord {
    pub tx_id: TxId,
    pub label: String,
    pub submitted_at: DateTime<Utc>,
}

/// Submitted transactions for this run, most recent first.
#[derive(Clone, Debug, Default)]
pub struct ActivityLog {
    records: VecDeque<ActivityRecord>,
}

impl ActivityLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, tx_id: TxId, label: impl Into<String>) {
        self.record_at(tx_id, label, Utc::now());
    }

    pub fn record_at(
        &mut self,
        tx_id: TxId,
        label: impl Into<String>,
        submitted_at: DateTime<Utc>,
    ) {
        self.records.push_front(ActivityRecord {
            tx_id,
            label: label.into(),
            submitted_at,
        });
        self.records.truncate(ACTIVITY_LOG_CAP);
    }

    pub fn iter(&self) -> impl Iterator<Item = &ActivityRecord> {
        self.records.iter()
    }

    pub fn latest(&self) -> Option<&ActivityRecord> {
        self.records.front()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
