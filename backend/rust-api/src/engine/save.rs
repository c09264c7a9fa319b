//! Batched, partially failable persistence of every participant's results.
//!
//! Saving runs in three phases so the session lock is never held across a
//! network call: `prepare` snapshots unflushed records and flags each
//! participant in flight, `submit_batches` talks to the sink, `apply` folds
//! the outcomes back into the trackers.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use super::ports::{ResultSink, ResultSubmission};
use super::tracker::{AttemptRecord, ResultTracker};
use super::types::ParticipantTuple;

pub const LABEL_IDLE: &str = "Save Progress";
pub const LABEL_SAVING: &str = "Saving…";
pub const LABEL_SAVED: &str = "Saved!";
pub const SAVE_ERROR_BANNER: &str = "Failed to save progress, please try again";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveMode {
    #[default]
    Sequential,
    Concurrent,
}

#[derive(Debug, Clone)]
pub struct ParticipantBatch {
    pub session_id: String,
    pub participant: ParticipantTuple,
    pub records: Vec<AttemptRecord>,
    pub prepared_at: DateTime<Utc>,
}

impl ParticipantBatch {
    pub fn submissions(&self) -> Vec<ResultSubmission> {
        self.records
            .iter()
            .map(|record| ResultSubmission {
                content_id: record.item_id.clone(),
                session_student_id: self.participant.session_participant_id.clone(),
                session_id: self.session_id.clone(),
                time_taken_sec: record.elapsed_seconds,
                count_of_incorrect_attempts: record.incorrect_attempts,
                completed: record.completed,
                created_at: record.completed_at.unwrap_or(self.prepared_at),
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct SaveOutcome {
    pub session_participant_id: String,
    /// `(item_id, revision)` of every record in the submitted batch.
    pub acknowledged: Vec<(String, u64)>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveBatchStatus {
    pub any_saving: bool,
    pub all_saved: bool,
    pub failed_participant_ids: BTreeSet<String>,
}

#[derive(Debug, Default, Clone)]
struct ParticipantSaveState {
    in_flight: bool,
    last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct SaveCoordinator {
    states: HashMap<String, ParticipantSaveState>,
    has_saved: bool,
}

impl SaveCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshots the unflushed completed records of each selected
    /// participant. Participants with a save already in flight are skipped,
    /// so a rapid double submit cannot send the same batch twice.
    pub fn prepare(
        &mut self,
        session_id: &str,
        trackers: &[ResultTracker],
        only: Option<&BTreeSet<String>>,
        now: DateTime<Utc>,
    ) -> Vec<ParticipantBatch> {
        let mut batches = Vec::new();

        for tracker in trackers {
            let participant = tracker.participant();
            let id = &participant.session_participant_id;
            if only.is_some_and(|ids| !ids.contains(id)) {
                continue;
            }

            let state = self.states.entry(id.clone()).or_default();
            if state.in_flight {
                tracing::debug!("Save already in flight for participant {}, skipping", id);
                continue;
            }

            let records = tracker.pending_flush();
            if records.is_empty() {
                state.last_error = None;
                continue;
            }

            state.in_flight = true;
            batches.push(ParticipantBatch {
                session_id: session_id.to_string(),
                participant: participant.clone(),
                records,
                prepared_at: now,
            });
        }

        batches
    }

    /// Folds submission outcomes back in. A failure only affects its own
    /// participant.
    pub fn apply(&mut self, trackers: &mut [ResultTracker], outcomes: Vec<SaveOutcome>) {
        for outcome in outcomes {
            let state = self
                .states
                .entry(outcome.session_participant_id.clone())
                .or_default();
            state.in_flight = false;

            match outcome.error {
                Some(error) => {
                    state.last_error = Some(error);
                }
                None => {
                    state.last_error = None;
                    self.has_saved = true;
                    if let Some(tracker) = trackers.iter_mut().find(|t| {
                        t.participant().session_participant_id == outcome.session_participant_id
                    }) {
                        for (item_id, revision) in &outcome.acknowledged {
                            tracker.mark_flushed(item_id, *revision);
                        }
                    }
                }
            }
        }
    }

    /// Clears the in-flight flag of participants whose submission never
    /// reported back and records them as failed, so a scoped retry picks
    /// them up again.
    pub fn release(&mut self, session_participant_ids: &[String], error: &str) {
        for id in session_participant_ids {
            let state = self.states.entry(id.clone()).or_default();
            if state.in_flight {
                state.in_flight = false;
                state.last_error = Some(error.to_string());
            }
        }
    }

    pub fn failed_participant_ids(&self) -> BTreeSet<String> {
        self.states
            .iter()
            .filter(|(_, state)| state.last_error.is_some())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn last_error(&self, session_participant_id: &str) -> Option<&str> {
        self.states
            .get(session_participant_id)
            .and_then(|state| state.last_error.as_deref())
    }

    pub fn status(&self, trackers: &[ResultTracker]) -> SaveBatchStatus {
        let any_saving = self.states.values().any(|state| state.in_flight);
        let failed_participant_ids = self.failed_participant_ids();
        let nothing_pending = trackers.iter().all(|t| t.pending_flush().is_empty());
        SaveBatchStatus {
            any_saving,
            all_saved: !any_saving && failed_participant_ids.is_empty() && nothing_pending,
            failed_participant_ids,
        }
    }

    pub fn label(&self, trackers: &[ResultTracker]) -> &'static str {
        let status = self.status(trackers);
        if status.any_saving {
            LABEL_SAVING
        } else if status.all_saved && self.has_saved {
            LABEL_SAVED
        } else {
            LABEL_IDLE
        }
    }

    pub fn error_banner(&self) -> Option<&'static str> {
        self.states
            .values()
            .any(|state| state.last_error.is_some())
            .then_some(SAVE_ERROR_BANNER)
    }

    pub fn reset(&mut self) {
        self.states.clear();
        self.has_saved = false;
    }
}

async fn submit_one(sink: &dyn ResultSink, batch: ParticipantBatch) -> SaveOutcome {
    let session_participant_id = batch.participant.session_participant_id.clone();
    let acknowledged = batch
        .records
        .iter()
        .map(|record| (record.item_id.clone(), record.revision()))
        .collect();

    match sink.submit(&batch).await {
        Ok(()) => {
            tracing::info!(
                "Saved {} results for participant {} in session {}",
                batch.records.len(),
                session_participant_id,
                batch.session_id
            );
            SaveOutcome {
                session_participant_id,
                acknowledged,
                error: None,
            }
        }
        Err(e) => {
            tracing::error!(
                "Failed to save results for participant {} in session {}: {:#}",
                session_participant_id,
                batch.session_id,
                e
            );
            SaveOutcome {
                session_participant_id,
                acknowledged,
                error: Some(format!("{:#}", e)),
            }
        }
    }
}

pub async fn submit_batches(
    sink: &dyn ResultSink,
    batches: Vec<ParticipantBatch>,
    mode: SaveMode,
) -> Vec<SaveOutcome> {
    match mode {
        SaveMode::Sequential => {
            let mut outcomes = Vec::with_capacity(batches.len());
            for batch in batches {
                outcomes.push(submit_one(sink, batch).await);
            }
            outcomes
        }
        SaveMode::Concurrent => join_all(batches.into_iter().map(|b| submit_one(sink, b))).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct FlakySink {
        failing: Mutex<BTreeSet<String>>,
        submitted: Mutex<Vec<ResultSubmission>>,
    }

    impl FlakySink {
        fn failing_for(ids: &[&str]) -> Self {
            Self {
                failing: Mutex::new(ids.iter().map(|s| s.to_string()).collect()),
                submitted: Mutex::new(Vec::new()),
            }
        }

        fn heal(&self) {
            self.failing.lock().unwrap().clear();
        }

        fn submitted_for(&self, id: &str) -> usize {
            self.submitted
                .lock()
                .unwrap()
                .iter()
                .filter(|s| s.session_student_id == id)
                .count()
        }
    }

    #[async_trait]
    impl ResultSink for FlakySink {
        async fn submit(&self, batch: &ParticipantBatch) -> anyhow::Result<()> {
            if self
                .failing
                .lock()
                .unwrap()
                .contains(&batch.participant.session_participant_id)
            {
                anyhow::bail!("results API returned 503");
            }
            self.submitted
                .lock()
                .unwrap()
                .extend(batch.submissions());
            Ok(())
        }
    }

    fn trackers_with_completions(ids: &[&str]) -> Vec<ResultTracker> {
        let now = Utc::now();
        ids.iter()
            .map(|id| {
                let mut tracker =
                    ResultTracker::new(ParticipantTuple::new(format!("student-{}", id), *id));
                tracker.start("item-1", now);
                tracker.mark_complete("item-1", now);
                tracker
            })
            .collect()
    }

    #[tokio::test]
    async fn partial_failure_is_scoped_to_failing_participant() {
        let sink = FlakySink::failing_for(&["p2"]);
        let mut trackers = trackers_with_completions(&["p1", "p2", "p3"]);
        let mut coordinator = SaveCoordinator::new();

        let batches = coordinator.prepare("session-1", &trackers, None, Utc::now());
        assert_eq!(batches.len(), 3);
        assert!(coordinator.status(&trackers).any_saving);
        assert_eq!(coordinator.label(&trackers), LABEL_SAVING);

        let outcomes = submit_batches(&sink, batches, SaveMode::Concurrent).await;
        coordinator.apply(&mut trackers, outcomes);

        let status = coordinator.status(&trackers);
        assert_eq!(
            status.failed_participant_ids,
            BTreeSet::from(["p2".to_string()])
        );
        assert!(!status.all_saved);
        assert!(trackers[0].pending_flush().is_empty());
        assert_eq!(trackers[1].pending_flush().len(), 1);
        assert!(trackers[2].pending_flush().is_empty());
        assert_eq!(coordinator.error_banner(), Some(SAVE_ERROR_BANNER));

        sink.heal();
        let retry_ids = status.failed_participant_ids.clone();
        let batches = coordinator.prepare("session-1", &trackers, Some(&retry_ids), Utc::now());
        assert_eq!(batches.len(), 1);
        let outcomes = submit_batches(&sink, batches, SaveMode::Sequential).await;
        coordinator.apply(&mut trackers, outcomes);

        assert_eq!(sink.submitted_for("p1"), 1);
        assert_eq!(sink.submitted_for("p2"), 1);
        assert_eq!(sink.submitted_for("p3"), 1);
        let status = coordinator.status(&trackers);
        assert!(status.all_saved);
        assert_eq!(coordinator.label(&trackers), LABEL_SAVED);
        assert_eq!(coordinator.error_banner(), None);
    }

    #[tokio::test]
    async fn in_flight_participants_are_not_prepared_twice() {
        let trackers = trackers_with_completions(&["p1"]);
        let mut coordinator = SaveCoordinator::new();
        let first = coordinator.prepare("session-1", &trackers, None, Utc::now());
        let second = coordinator.prepare("session-1", &trackers, None, Utc::now());
        assert_eq!(first.len(), 1);
        assert!(second.is_empty());
    }

    #[test]
    fn released_batch_is_failed_and_retryable() {
        let trackers = trackers_with_completions(&["p1", "p2"]);
        let mut coordinator = SaveCoordinator::new();
        let batches = coordinator.prepare("session-1", &trackers, None, Utc::now());
        assert_eq!(batches.len(), 2);

        coordinator.release(&["p1".to_string()], "save interrupted");

        let status = coordinator.status(&trackers);
        assert!(status.any_saving);
        assert_eq!(
            status.failed_participant_ids,
            BTreeSet::from(["p1".to_string()])
        );
        let retry = coordinator.prepare(
            "session-1",
            &trackers,
            Some(&status.failed_participant_ids),
            Utc::now(),
        );
        assert_eq!(retry.len(), 1);
        assert_eq!(retry[0].participant.session_participant_id, "p1");
    }

    #[tokio::test]
    async fn saving_again_does_not_resubmit_flushed_records() {
        let sink = FlakySink::failing_for(&[]);
        let mut trackers = trackers_with_completions(&["p1"]);
        let mut coordinator = SaveCoordinator::new();

        for _ in 0..3 {
            let batches = coordinator.prepare("session-1", &trackers, None, Utc::now());
            let outcomes = submit_batches(&sink, batches, SaveMode::Sequential).await;
            coordinator.apply(&mut trackers, outcomes);
        }
        assert_eq!(sink.submitted_for("p1"), 1);
    }

    #[test]
    fn submissions_carry_payload_fields() {
        let trackers = trackers_with_completions(&["p1"]);
        let mut coordinator = SaveCoordinator::new();
        let batch = coordinator
            .prepare("session-9", &trackers, None, Utc::now())
            .remove(0);
        let submission = &batch.submissions()[0];
        assert_eq!(submission.content_id, "item-1");
        assert_eq!(submission.session_student_id, "p1");
        assert_eq!(submission.session_id, "session-9");
        assert!(submission.completed);
        assert_eq!(submission.count_of_incorrect_attempts, 0);
    }

    #[test]
    fn idle_label_before_first_save() {
        let trackers = trackers_with_completions(&["p1"]);
        let coordinator = SaveCoordinator::new();
        assert_eq!(coordinator.label(&trackers), LABEL_IDLE);
        assert_eq!(coordinator.error_banner(), None);
    }
}
