//! One multi-student game session.
//!
//! Owns the usable item list, the turn state, one tracker per participant,
//! the spinner state and the save coordinator. Timers (spin settle,
//! sequencing celebration) are deadlines checked against the injected clock
//! on every call, so nothing here blocks on wall-clock time.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use super::clock::{to_chrono, Clock, RandomSource};
use super::distributor::distribute;
use super::error::{EngineError, EngineResult};
use super::ports::ResultSink;
use super::save::{
    submit_batches, ParticipantBatch, SaveBatchStatus, SaveCoordinator, SaveMode, SaveOutcome,
};
use super::sequencing::{check_sequence, SequenceCheck};
use super::spinner::{SpinOutcome, SpinResolution, SpinState};
use super::tracker::{AttemptRecord, ResultTracker};
use super::turns::TurnState;
use super::types::{ExerciseItem, GameKind, ParticipantTuple};

pub const DEFAULT_SPIN_SETTLE_MS: u64 = 3000;
pub const DEFAULT_CELEBRATION_MS: u64 = 1500;

#[derive(Debug, Clone, Copy)]
pub struct EngineTimings {
    pub spin_settle: Duration,
    pub celebration: Duration,
}

impl Default for EngineTimings {
    fn default() -> Self {
        Self {
            spin_settle: Duration::from_millis(DEFAULT_SPIN_SETTLE_MS),
            celebration: Duration::from_millis(DEFAULT_CELEBRATION_MS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionSetup {
    /// Identifier of the therapy session the results belong to.
    pub session_id: String,
    pub game: GameKind,
    pub participants: Vec<ParticipantTuple>,
    /// The pool as fetched, before filtering and distribution.
    pub items: Vec<ExerciseItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitingSpin,
    Spinning,
    Active,
    Celebrating,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// Ordering still has empty slots; nothing was judged.
    Incomplete,
    Incorrect,
    Correct,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttemptFeedback {
    pub item_id: String,
    pub session_participant_id: String,
    pub outcome: AttemptOutcome,
    pub incorrect_attempts: u32,
    pub elapsed_seconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check: Option<SequenceCheck>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
    pub fraction: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemView {
    pub id: String,
    pub prompt: String,
    pub options: Vec<String>,
    pub option_urls: Vec<String>,
    /// Slot count for the sequencing game.
    pub slots: usize,
    /// Earlier result of the active participant for this item, if any.
    pub previous_result: Option<AttemptRecord>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionBadge {
    pub session_participant_id: String,
    pub elapsed_seconds: u64,
    pub incorrect_attempts: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ItemBadge {
    pub item_id: String,
    pub completed_by: Vec<CompletionBadge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SpinView {
    pub rotation_degrees: f64,
    pub is_spinning: bool,
    pub pending_selection_index: Option<usize>,
    pub settles_at: Option<DateTime<Utc>>,
    pub remaining_item_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SaveView {
    pub label: &'static str,
    pub error_banner: Option<&'static str>,
    pub status: SaveBatchStatus,
}

/// Everything a rendering layer needs to draw the current state.
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub id: String,
    pub session_id: String,
    pub game: GameKind,
    pub phase: Phase,
    pub turn_index: usize,
    pub progress: Progress,
    pub active_participant: ParticipantTuple,
    pub current_item: Option<ItemView>,
    pub spin: Option<SpinView>,
    pub badges: Vec<ItemBadge>,
    pub save: SaveView,
}

pub struct GameSession {
    id: String,
    session_id: String,
    game: GameKind,
    turns: TurnState,
    usable: Vec<ExerciseItem>,
    trackers: Vec<ResultTracker>,
    slot_by_participant: HashMap<String, usize>,
    spin: SpinState,
    active_item: Option<String>,
    celebrate_until: Option<DateTime<Utc>>,
    saves: SaveCoordinator,
    last_activity: DateTime<Utc>,
    clock: Arc<dyn Clock>,
    rng: Box<dyn RandomSource>,
    timings: EngineTimings,
}

impl GameSession {
    /// Builds a session from a resolved roster and fetched pool. Refuses an
    /// empty roster and a pool with nothing playable.
    pub fn start(
        setup: SessionSetup,
        clock: Arc<dyn Clock>,
        rng: Box<dyn RandomSource>,
        timings: EngineTimings,
    ) -> EngineResult<Self> {
        let mut seen = HashSet::new();
        let participants: Vec<ParticipantTuple> = setup
            .participants
            .into_iter()
            .filter(|p| {
                let fresh = seen.insert(p.session_participant_id.clone());
                if !fresh {
                    tracing::warn!(
                        "Dropping duplicate participant {} from roster",
                        p.session_participant_id
                    );
                }
                fresh
            })
            .collect();
        let turns = TurnState::new(participants)?;

        let playable: Vec<ExerciseItem> = setup
            .items
            .into_iter()
            .filter(ExerciseItem::is_playable)
            .collect();
        let usable = distribute(&playable, turns.participants().len());
        if usable.is_empty() {
            return Err(EngineError::ContentUnavailable);
        }

        let trackers: Vec<ResultTracker> = turns
            .participants()
            .iter()
            .cloned()
            .map(ResultTracker::new)
            .collect();
        let slot_by_participant = turns
            .participants()
            .iter()
            .enumerate()
            .map(|(i, p)| (p.session_participant_id.clone(), i))
            .collect();

        let mut session = Self {
            id: Uuid::new_v4().to_string(),
            session_id: setup.session_id,
            game: setup.game,
            turns,
            usable,
            trackers,
            slot_by_participant,
            spin: SpinState::new(),
            active_item: None,
            celebrate_until: None,
            saves: SaveCoordinator::new(),
            last_activity: clock.now(),
            clock,
            rng,
            timings,
        };
        session.activate_next_linear_item();

        tracing::info!(
            "Game session started: id={}, session={}, game={}, participants={}, items={}",
            session.id,
            session.session_id,
            session.game.as_str(),
            session.trackers.len(),
            session.usable.len()
        );

        Ok(session)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn game(&self) -> GameKind {
        self.game
    }

    pub fn usable_items(&self) -> &[ExerciseItem] {
        &self.usable
    }

    pub fn trackers(&self) -> &[ResultTracker] {
        &self.trackers
    }

    pub fn spin_state(&self) -> &SpinState {
        &self.spin
    }

    pub fn active_participant(&self) -> &ParticipantTuple {
        self.turns.active()
    }

    pub fn active_item_id(&self) -> Option<&str> {
        self.active_item.as_deref()
    }

    pub fn tracker_for(&self, session_participant_id: &str) -> EngineResult<&ResultTracker> {
        self.slot_by_participant
            .get(session_participant_id)
            .map(|&slot| &self.trackers[slot])
            .ok_or_else(|| EngineError::UnknownParticipant(session_participant_id.to_string()))
    }

    pub fn result_for(
        &self,
        session_participant_id: &str,
        item_id: &str,
    ) -> EngineResult<Option<&AttemptRecord>> {
        Ok(self.tracker_for(session_participant_id)?.result_for(item_id))
    }

    fn item(&self, item_id: &str) -> EngineResult<&ExerciseItem> {
        self.usable
            .iter()
            .find(|item| item.id == item_id)
            .ok_or_else(|| EngineError::UnknownItem(item_id.to_string()))
    }

    pub fn is_finished(&self) -> bool {
        self.celebrate_until.is_none() && self.turns.turn_index() >= self.usable.len()
    }

    pub fn phase(&self) -> Phase {
        if self.is_finished() {
            Phase::Finished
        } else if self.celebrate_until.is_some() {
            Phase::Celebrating
        } else if self.spin.is_spinning {
            Phase::Spinning
        } else if self.active_item.is_some() {
            Phase::Active
        } else {
            Phase::AwaitingSpin
        }
    }

    pub fn progress(&self) -> Progress {
        let total = self.usable.len();
        let completed =
            (self.turns.turn_index() + usize::from(self.celebrate_until.is_some())).min(total);
        Progress {
            completed,
            total,
            fraction: if total == 0 {
                0.0
            } else {
                completed as f64 / total as f64
            },
        }
    }

    /// Time since the last `poll`, which every view and interaction goes
    /// through.
    pub fn idle_for(&self) -> Duration {
        (self.clock.now() - self.last_activity)
            .to_std()
            .unwrap_or_default()
    }

    /// Fires any timer whose deadline has passed. Every public operation
    /// calls this first.
    pub fn poll(&mut self) {
        let now = self.clock.now();
        self.last_activity = now;

        if let Some(until) = self.celebrate_until {
            if now >= until {
                self.celebrate_until = None;
                self.advance_turn();
            }
        }

        if self.spin.is_settled(now) {
            if let Err(e) = self.resolve_spin() {
                tracing::warn!("Failed to resolve settled spin in session {}: {}", self.id, e);
            }
        }
    }

    fn start_item_for_active(&mut self, item_id: String) {
        let slot = self.turns.active_slot();
        let now = self.clock.now();
        self.trackers[slot].start(&item_id, now);
        tracing::debug!(
            "Item started: session={}, participant={}, item={}",
            self.id,
            self.turns.active().session_participant_id,
            item_id
        );
        self.active_item = Some(item_id);
    }

    fn activate_next_linear_item(&mut self) {
        if self.game.is_randomized() {
            return;
        }
        if let Some(item) = self.usable.get(self.turns.turn_index()) {
            let item_id = item.id.clone();
            self.start_item_for_active(item_id);
        }
    }

    fn advance_turn(&mut self) {
        self.turns.advance();
        self.spin.clear_selection();
        if self.is_finished() {
            tracing::info!("Game session finished: id={}", self.id);
            return;
        }
        self.activate_next_linear_item();
    }

    fn require_active_item(&mut self) -> EngineResult<String> {
        self.poll();
        if self.is_finished() {
            return Err(EngineError::SessionFinished);
        }
        self.active_item.clone().ok_or(EngineError::NoActiveItem)
    }

    fn record_incorrect(&mut self, item_id: String) -> AttemptFeedback {
        let slot = self.turns.active_slot();
        let incorrect_attempts = self.trackers[slot].mark_incorrect(&item_id);
        tracing::debug!(
            "Incorrect attempt: session={}, item={}, count={}",
            self.id,
            item_id,
            incorrect_attempts
        );
        AttemptFeedback {
            item_id,
            session_participant_id: self.turns.active().session_participant_id.clone(),
            outcome: AttemptOutcome::Incorrect,
            incorrect_attempts,
            elapsed_seconds: None,
            check: None,
        }
    }

    fn record_complete(&mut self, item_id: String) -> AttemptFeedback {
        let slot = self.turns.active_slot();
        let now = self.clock.now();
        let participant_id = self.turns.active().session_participant_id.clone();

        let (incorrect_attempts, elapsed_seconds) = match self.trackers[slot]
            .mark_complete(&item_id, now)
        {
            Some(record) => (record.incorrect_attempts, record.elapsed_seconds),
            None => {
                let record = self.trackers[slot].result_for(&item_id);
                (
                    record.map(|r| r.incorrect_attempts).unwrap_or(0),
                    record.map(|r| r.elapsed_seconds).unwrap_or(0),
                )
            }
        };

        tracing::info!(
            "Item completed: session={}, participant={}, item={}, elapsed={}s, incorrect={}",
            self.id,
            participant_id,
            item_id,
            elapsed_seconds,
            incorrect_attempts
        );

        self.spin.exclude(&item_id);
        self.active_item = None;

        if self.game == GameKind::Sequencing && !self.timings.celebration.is_zero() {
            self.celebrate_until = Some(now + to_chrono(self.timings.celebration));
        } else {
            self.advance_turn();
        }

        AttemptFeedback {
            item_id,
            session_participant_id: participant_id,
            outcome: AttemptOutcome::Correct,
            incorrect_attempts,
            elapsed_seconds: Some(elapsed_seconds),
            check: None,
        }
    }

    /// Judges a full drag-and-drop ordering. Partial orderings are reported
    /// back without touching the tracker; a wrong ordering keeps the slots
    /// with the caller so the student can rearrange.
    pub fn submit_ordering(&mut self, slots: &[Option<String>]) -> EngineResult<AttemptFeedback> {
        if self.game != GameKind::Sequencing {
            return Err(EngineError::wrong_interaction("ordering", self.game));
        }
        let item_id = self.require_active_item()?;
        let check = check_sequence(slots, self.item(&item_id)?.answer.ordering());

        let mut feedback = match check.is_correct {
            None => {
                let incorrect_attempts = self.trackers[self.turns.active_slot()]
                    .result_for(&item_id)
                    .map(|r| r.incorrect_attempts)
                    .unwrap_or(0);
                AttemptFeedback {
                    item_id,
                    session_participant_id: self.turns.active().session_participant_id.clone(),
                    outcome: AttemptOutcome::Incomplete,
                    incorrect_attempts,
                    elapsed_seconds: None,
                    check: None,
                }
            }
            Some(false) => self.record_incorrect(item_id),
            Some(true) => self.record_complete(item_id),
        };
        feedback.check = Some(check);
        Ok(feedback)
    }

    /// Direct comparison for image matching, memory match and flashcards.
    pub fn submit_answer(&mut self, candidate: &str) -> EngineResult<AttemptFeedback> {
        if !matches!(
            self.game,
            GameKind::ImageMatching | GameKind::MemoryMatch | GameKind::Flashcard
        ) {
            return Err(EngineError::wrong_interaction("answer", self.game));
        }
        let item_id = self.require_active_item()?;
        if self.item(&item_id)?.answer.accepts(candidate) {
            Ok(self.record_complete(item_id))
        } else {
            Ok(self.record_incorrect(item_id))
        }
    }

    /// Therapist judgement of a spoken response (spinner, flashcards).
    pub fn mark(&mut self, correct: bool) -> EngineResult<AttemptFeedback> {
        if !matches!(self.game, GameKind::Spinner | GameKind::Flashcard) {
            return Err(EngineError::wrong_interaction("mark", self.game));
        }
        let item_id = self.require_active_item()?;
        if correct {
            Ok(self.record_complete(item_id))
        } else {
            Ok(self.record_incorrect(item_id))
        }
    }

    pub fn begin_spin(&mut self) -> EngineResult<SpinOutcome> {
        if self.game != GameKind::Spinner {
            return Err(EngineError::wrong_interaction("spin", self.game));
        }
        self.poll();
        if let Some(item_id) = &self.active_item {
            return Err(EngineError::ItemInProgress(item_id.clone()));
        }

        let now = self.clock.now();
        let outcome =
            self.spin
                .begin_spin(&self.usable, self.rng.as_mut(), now, self.timings.spin_settle)?;

        match &outcome {
            SpinOutcome::Exhausted => {
                tracing::info!("Spinner exhausted in session {}", self.id);
            }
            SpinOutcome::Direct { item_id } => {
                let item_id = item_id.clone();
                self.start_item_for_active(item_id);
            }
            SpinOutcome::Spinning { .. } => {}
        }
        Ok(outcome)
    }

    /// Commits a settled spin and starts the selected item for the active
    /// participant.
    pub fn resolve_spin(&mut self) -> EngineResult<SpinResolution> {
        let now = self.clock.now();
        let resolution = self.spin.resolve_spin(&self.usable, self.rng.as_mut(), now)?;
        if let SpinResolution::Selected { item_id, .. } = &resolution {
            let item_id = item_id.clone();
            self.start_item_for_active(item_id);
        }
        Ok(resolution)
    }

    /// Spins and waits out the settle delay on the injected clock.
    pub async fn spin_and_settle(&mut self) -> EngineResult<SpinOutcome> {
        let outcome = self.begin_spin()?;
        if let SpinOutcome::Spinning { .. } = outcome {
            self.clock.sleep(self.timings.spin_settle).await;
            self.resolve_spin()?;
        }
        Ok(outcome)
    }

    /// Waits out a pending celebration, if any.
    pub async fn settle_celebration(&mut self) {
        if let Some(until) = self.celebrate_until {
            let remaining = (until - self.clock.now()).to_std().unwrap_or_default();
            self.clock.sleep(remaining).await;
        }
        self.poll();
    }

    pub fn prepare_save(&mut self, only: Option<&BTreeSet<String>>) -> Vec<ParticipantBatch> {
        let now = self.clock.now();
        self.saves
            .prepare(&self.session_id, &self.trackers, only, now)
    }

    pub fn apply_save(&mut self, outcomes: Vec<SaveOutcome>) -> SaveBatchStatus {
        self.saves.apply(&mut self.trackers, outcomes);
        self.saves.status(&self.trackers)
    }

    /// Full save pass while holding the session. The service layer uses
    /// `prepare_save`/`apply_save` instead so no lock spans the network.
    pub async fn save(
        &mut self,
        sink: &dyn ResultSink,
        mode: SaveMode,
        only: Option<&BTreeSet<String>>,
    ) -> SaveBatchStatus {
        let batches = self.prepare_save(only);
        let outcomes = submit_batches(sink, batches, mode).await;
        self.apply_save(outcomes)
    }

    /// Releases participants whose prepared batch was never applied.
    pub fn release_save(&mut self, session_participant_ids: &[String], error: &str) {
        self.saves.release(session_participant_ids, error);
    }

    pub fn save_status(&self) -> SaveBatchStatus {
        self.saves.status(&self.trackers)
    }

    pub fn failed_participant_ids(&self) -> BTreeSet<String> {
        self.saves.failed_participant_ids()
    }

    /// Completed results not yet persisted. Abandoning the session drops
    /// them.
    pub fn unsaved_count(&self) -> usize {
        self.trackers.iter().map(|t| t.pending_flush().len()).sum()
    }

    /// Plays the same items again with the same roster. Attempt records are
    /// kept and overwritten as items are restarted.
    pub fn replay(&mut self) {
        self.turns.rewind();
        self.spin.reset();
        self.active_item = None;
        self.celebrate_until = None;
        self.activate_next_linear_item();
        tracing::info!("Game session replayed: id={}", self.id);
    }

    /// Clears every record and save mark, then starts over.
    pub fn reset(&mut self) {
        for tracker in &mut self.trackers {
            tracker.reset();
        }
        self.saves.reset();
        self.replay();
    }

    pub fn view(&mut self) -> SessionView {
        self.poll();
        let active = self.turns.active().clone();
        let active_slot = self.turns.active_slot();

        let current_item = self.active_item.as_ref().and_then(|id| {
            self.usable.iter().find(|item| &item.id == id).map(|item| ItemView {
                id: item.id.clone(),
                prompt: item.prompt.clone(),
                options: item.options.clone(),
                option_urls: item.option_urls.clone(),
                slots: item.answer.ordering().len(),
                previous_result: self.trackers[active_slot].result_for(&item.id).cloned(),
            })
        });

        let spin = self.game.is_randomized().then(|| SpinView {
            rotation_degrees: self.spin.rotation_degrees,
            is_spinning: self.spin.is_spinning,
            pending_selection_index: self.spin.pending_selection_index,
            settles_at: self.spin.settles_at(),
            remaining_item_ids: self
                .spin
                .available(&self.usable)
                .into_iter()
                .map(|item| item.id.clone())
                .collect(),
        });

        let badges = self
            .usable
            .iter()
            .map(|item| ItemBadge {
                item_id: item.id.clone(),
                completed_by: self
                    .trackers
                    .iter()
                    .filter_map(|tracker| {
                        tracker
                            .result_for(&item.id)
                            .filter(|record| record.completed)
                            .map(|record| CompletionBadge {
                                session_participant_id: tracker
                                    .participant()
                                    .session_participant_id
                                    .clone(),
                                elapsed_seconds: record.elapsed_seconds,
                                incorrect_attempts: record.incorrect_attempts,
                            })
                    })
                    .collect(),
            })
            .collect();

        SessionView {
            id: self.id.clone(),
            session_id: self.session_id.clone(),
            game: self.game,
            phase: self.phase(),
            turn_index: self.turns.turn_index(),
            progress: self.progress(),
            active_participant: active,
            current_item,
            spin,
            badges,
            save: SaveView {
                label: self.saves.label(&self.trackers),
                error_banner: self.saves.error_banner(),
                status: self.saves.status(&self.trackers),
            },
        }
    }
}
