use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{AppState, SharedGameSession};
use crate::engine::save::submit_batches;
use crate::engine::{
    AttemptFeedback, AttemptOutcome, EngineError, GameSession, RandomSource, SaveMode,
    SeededRandom, SessionSetup, SessionView, SpinOutcome, SpinResolution, ThreadRandom,
};
use crate::metrics::{
    ATTEMPTS_TOTAL, GAME_SESSIONS_ACTIVE, GAME_SESSIONS_TOTAL, RESULT_SAVES_TOTAL, SPINS_TOTAL,
};
use crate::models::{AbandonResponse, CreateGameSessionRequest, SaveResponse};

#[derive(Debug, thiserror::Error)]
pub enum GameSessionError {
    #[error("Game session not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Content fetch failed: {0:#}")]
    ContentFetch(anyhow::Error),

    #[error("Save did not complete: {0}")]
    SaveInterrupted(String),
}

pub type ServiceResult<T> = std::result::Result<T, GameSessionError>;

pub struct GameSessionService<'a> {
    state: &'a AppState,
}

impl<'a> GameSessionService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    async fn session(&self, id: &str) -> ServiceResult<SharedGameSession> {
        self.state
            .sessions
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| GameSessionError::NotFound(id.to_string()))
    }

    pub async fn create(&self, req: CreateGameSessionRequest) -> ServiceResult<SessionView> {
        let mut query = req.query;
        query.game_type.get_or_insert(req.game);

        let items = self
            .state
            .content
            .fetch(&query)
            .await
            .map_err(GameSessionError::ContentFetch)?;

        let rng: Box<dyn RandomSource> = match req.rng_seed {
            Some(seed) => Box::new(SeededRandom::new(seed)),
            None => Box::new(ThreadRandom),
        };

        let setup = SessionSetup {
            session_id: req.session_id,
            game: req.game,
            participants: req.participants,
            items,
        };

        let mut session = match GameSession::start(
            setup,
            self.state.clock.clone(),
            rng,
            self.state.config.engine_timings(),
        ) {
            Ok(session) => session,
            Err(e) => {
                GAME_SESSIONS_TOTAL
                    .with_label_values(&[req.game.as_str(), "refused"])
                    .inc();
                return Err(e.into());
            }
        };

        let view = session.view();
        self.state
            .sessions
            .write()
            .await
            .insert(view.id.clone(), Arc::new(Mutex::new(session)));

        GAME_SESSIONS_TOTAL
            .with_label_values(&[req.game.as_str(), "created"])
            .inc();
        GAME_SESSIONS_ACTIVE.inc();

        Ok(view)
    }

    pub async fn view(&self, id: &str) -> ServiceResult<SessionView> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        Ok(session.view())
    }

    async fn attempt<F>(&self, id: &str, f: F) -> ServiceResult<(AttemptFeedback, SessionView)>
    where
        F: FnOnce(&mut GameSession) -> Result<AttemptFeedback, EngineError>,
    {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        let was_finished = session.is_finished();

        let feedback = f(&mut *session)?;
        let outcome = match feedback.outcome {
            AttemptOutcome::Incomplete => "incomplete",
            AttemptOutcome::Incorrect => "incorrect",
            AttemptOutcome::Correct => "correct",
        };
        ATTEMPTS_TOTAL
            .with_label_values(&[session.game().as_str(), outcome])
            .inc();

        let view = session.view();
        if !was_finished && session.is_finished() {
            GAME_SESSIONS_TOTAL
                .with_label_values(&[session.game().as_str(), "finished"])
                .inc();
        }

        Ok((feedback, view))
    }

    pub async fn submit_ordering(
        &self,
        id: &str,
        slots: &[Option<String>],
    ) -> ServiceResult<(AttemptFeedback, SessionView)> {
        self.attempt(id, |session| session.submit_ordering(slots))
            .await
    }

    pub async fn submit_answer(
        &self,
        id: &str,
        answer: &str,
    ) -> ServiceResult<(AttemptFeedback, SessionView)> {
        self.attempt(id, |session| session.submit_answer(answer))
            .await
    }

    pub async fn mark(
        &self,
        id: &str,
        correct: bool,
    ) -> ServiceResult<(AttemptFeedback, SessionView)> {
        self.attempt(id, |session| session.mark(correct)).await
    }

    pub async fn spin(&self, id: &str) -> ServiceResult<(SpinOutcome, SessionView)> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;

        let outcome = session.begin_spin()?;
        let label = match &outcome {
            SpinOutcome::Exhausted => "exhausted",
            SpinOutcome::Direct { .. } => "direct",
            SpinOutcome::Spinning { .. } => "spinning",
        };
        SPINS_TOTAL.with_label_values(&[label]).inc();

        Ok((outcome, session.view()))
    }

    /// Explicit resolution for callers that drive the settle delay
    /// themselves. `view` resolves a settled spin on its own as well.
    pub async fn resolve_spin(&self, id: &str) -> ServiceResult<(SpinResolution, SessionView)> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        let resolution = session.resolve_spin()?;
        Ok((resolution, session.view()))
    }

    /// Flushes completed, unsaved results. The session lock is released
    /// while the results API is called.
    ///
    /// Submission and apply run in their own task: a caller that goes away
    /// mid-save does not strand participants in flight.
    pub async fn save(
        &self,
        id: &str,
        mode: Option<SaveMode>,
        only: Option<BTreeSet<String>>,
    ) -> ServiceResult<SaveResponse> {
        let shared = self.session(id).await?;
        let mode = mode.unwrap_or(self.state.config.save_mode);

        let mut session = shared.lock().await;
        if let Some(ids) = &only {
            for participant_id in ids {
                session.tracker_for(participant_id)?;
            }
        }
        let batches = session.prepare_save(only.as_ref());
        drop(session);

        let submitted: Vec<String> = batches
            .iter()
            .map(|batch| batch.participant.session_participant_id.clone())
            .collect();

        tracing::info!(
            "Saving game session {}: {} participant batches ({:?})",
            id,
            submitted.len(),
            mode
        );

        let sink = self.state.results.clone();
        let task_session = shared.clone();
        let task = tokio::spawn(async move {
            let outcomes = submit_batches(sink.as_ref(), batches, mode).await;
            for outcome in &outcomes {
                let status = if outcome.error.is_some() {
                    "error"
                } else {
                    "success"
                };
                RESULT_SAVES_TOTAL.with_label_values(&[status]).inc();
            }

            let mut session = task_session.lock().await;
            let status = session.apply_save(outcomes);
            (status, session.view().save)
        });

        let (status, save) = match task.await {
            Ok(done) => done,
            Err(e) => {
                tracing::error!("Save task for game session {} failed: {}", id, e);
                let mut session = shared.lock().await;
                session.release_save(&submitted, "save interrupted");
                return Err(GameSessionError::SaveInterrupted(e.to_string()));
            }
        };

        Ok(SaveResponse {
            submitted_participants: submitted.len(),
            label: save.label,
            error_banner: save.error_banner,
            status,
        })
    }

    /// Re-submits for the given participants, or for every participant
    /// whose last save failed.
    pub async fn retry_save(
        &self,
        id: &str,
        participant_ids: Option<Vec<String>>,
        mode: Option<SaveMode>,
    ) -> ServiceResult<SaveResponse> {
        let only: BTreeSet<String> = match participant_ids {
            Some(ids) => ids.into_iter().collect(),
            None => {
                let shared = self.session(id).await?;
                let session = shared.lock().await;
                session.failed_participant_ids()
            }
        };
        tracing::info!("Retrying save for game session {}: {:?}", id, only);
        self.save(id, mode, Some(only)).await
    }

    pub async fn replay(&self, id: &str) -> ServiceResult<SessionView> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        session.replay();
        GAME_SESSIONS_TOTAL
            .with_label_values(&[session.game().as_str(), "replayed"])
            .inc();
        Ok(session.view())
    }

    pub async fn reset(&self, id: &str) -> ServiceResult<SessionView> {
        let session = self.session(id).await?;
        let mut session = session.lock().await;
        let dropped = session.unsaved_count();
        session.reset();
        if dropped > 0 {
            tracing::warn!(
                "Game session {} reset with {} unsaved results",
                id,
                dropped
            );
        }
        Ok(session.view())
    }

    /// Drops the session without flushing anything.
    pub async fn abandon(&self, id: &str) -> ServiceResult<AbandonResponse> {
        let shared = self
            .state
            .sessions
            .write()
            .await
            .remove(id)
            .ok_or_else(|| GameSessionError::NotFound(id.to_string()))?;

        let session = shared.lock().await;
        let unsaved_results = session.unsaved_count();
        if unsaved_results > 0 {
            tracing::warn!(
                "Game session {} abandoned with {} unsaved results",
                id,
                unsaved_results
            );
        } else {
            tracing::info!("Game session {} abandoned", id);
        }

        GAME_SESSIONS_TOTAL
            .with_label_values(&[session.game().as_str(), "abandoned"])
            .inc();
        GAME_SESSIONS_ACTIVE.dec();

        Ok(AbandonResponse {
            id: id.to_string(),
            unsaved_results,
        })
    }
}
