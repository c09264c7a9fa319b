//! Per-participant result lifecycle.
//!
//! Each `(participant, item)` pair moves NotStarted → Started → Completed.
//! Incorrect attempts keep the pair in Started and bump a counter. A new
//! `start` on a pair overwrites the record (last attempt wins).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::types::ParticipantTuple;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub item_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: u64,
    pub incorrect_attempts: u32,
    #[serde(skip)]
    revision: u64,
    #[serde(skip)]
    flushed: bool,
}

impl AttemptRecord {
    fn fresh(item_id: &str, started_at: Option<DateTime<Utc>>, revision: u64) -> Self {
        Self {
            item_id: item_id.to_string(),
            started_at,
            completed: false,
            completed_at: None,
            elapsed_seconds: 0,
            incorrect_attempts: 0,
            revision,
            flushed: false,
        }
    }

    /// Bumped on every mutation; lets a flush acknowledgement tell whether
    /// the record changed while the save was in flight.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn is_flushed(&self) -> bool {
        self.flushed
    }
}

#[derive(Debug, Clone)]
pub struct ResultTracker {
    participant: ParticipantTuple,
    records: HashMap<String, AttemptRecord>,
    order: Vec<String>,
    next_revision: u64,
}

impl ResultTracker {
    pub fn new(participant: ParticipantTuple) -> Self {
        Self {
            participant,
            records: HashMap::new(),
            order: Vec::new(),
            next_revision: 1,
        }
    }

    pub fn participant(&self) -> &ParticipantTuple {
        &self.participant
    }

    fn bump(&mut self) -> u64 {
        let revision = self.next_revision;
        self.next_revision += 1;
        revision
    }

    fn remember(&mut self, item_id: &str) {
        if !self.records.contains_key(item_id) {
            self.order.push(item_id.to_string());
        }
    }

    /// The item became the active prompt for this participant.
    pub fn start(&mut self, item_id: &str, now: DateTime<Utc>) {
        let revision = self.bump();
        self.remember(item_id);
        if let Some(previous) = self.records.get(item_id) {
            tracing::debug!(
                "Overwriting attempt record: participant={}, item={}, was_completed={}",
                self.participant.session_participant_id,
                item_id,
                previous.completed
            );
        }
        self.records.insert(
            item_id.to_string(),
            AttemptRecord::fresh(item_id, Some(now), revision),
        );
    }

    /// A validation failed. Returns the accumulated count; completed records
    /// are left untouched.
    pub fn mark_incorrect(&mut self, item_id: &str) -> u32 {
        let revision = self.bump();
        self.remember(item_id);
        let record = self
            .records
            .entry(item_id.to_string())
            .or_insert_with(|| AttemptRecord::fresh(item_id, None, revision));
        if record.completed {
            return record.incorrect_attempts;
        }
        record.incorrect_attempts += 1;
        record.revision = revision;
        record.flushed = false;
        record.incorrect_attempts
    }

    /// A validation succeeded. A second completion of the same record is a
    /// no-op and returns `None`.
    pub fn mark_complete(&mut self, item_id: &str, now: DateTime<Utc>) -> Option<&AttemptRecord> {
        let revision = self.bump();
        self.remember(item_id);
        let record = self
            .records
            .entry(item_id.to_string())
            .or_insert_with(|| AttemptRecord::fresh(item_id, None, revision));
        if record.completed {
            return None;
        }
        record.elapsed_seconds = record
            .started_at
            .map(|started| (now - started).num_seconds().max(0) as u64)
            .unwrap_or(0);
        record.completed = true;
        record.completed_at = Some(now);
        record.revision = revision;
        record.flushed = false;
        Some(record)
    }

    pub fn result_for(&self, item_id: &str) -> Option<&AttemptRecord> {
        self.records.get(item_id)
    }

    /// Records in first-touched order.
    pub fn records(&self) -> impl Iterator<Item = &AttemptRecord> {
        self.order.iter().filter_map(|id| self.records.get(id))
    }

    pub fn completed_count(&self) -> usize {
        self.records.values().filter(|r| r.completed).count()
    }

    /// Completed records not yet acknowledged by the persistence layer.
    pub fn pending_flush(&self) -> Vec<AttemptRecord> {
        self.records()
            .filter(|r| r.completed && !r.flushed)
            .cloned()
            .collect()
    }

    /// Acknowledges a flushed record. Ignored if the record changed since
    /// the batch was prepared.
    pub fn mark_flushed(&mut self, item_id: &str, revision: u64) -> bool {
        match self.records.get_mut(item_id) {
            Some(record) if record.revision == revision => {
                record.flushed = true;
                true
            }
            _ => false,
        }
    }

    pub fn reset(&mut self) {
        self.records.clear();
        self.order.clear();
    }
}
