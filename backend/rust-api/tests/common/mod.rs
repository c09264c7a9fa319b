#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use therapy_games_api::{
    config::Config,
    create_router,
    engine::{
        AnswerRepresentation, ContentQuery, ContentSource, ExerciseItem, ExerciseType,
        ManualClock, ParticipantBatch, ResultSink, ResultSubmission,
    },
    services::AppState,
};
use tokio::sync::Notify;
use tower::ServiceExt;

/// Serves a fixed pool and records the last query.
#[derive(Default)]
pub struct StaticContent {
    pub items: Mutex<Vec<ExerciseItem>>,
    pub last_query: Mutex<Option<ContentQuery>>,
    pub fail: AtomicBool,
}

#[async_trait]
impl ContentSource for StaticContent {
    async fn fetch(&self, query: &ContentQuery) -> anyhow::Result<Vec<ExerciseItem>> {
        *self.last_query.lock().unwrap() = Some(query.clone());
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("content API unreachable");
        }
        Ok(self.items.lock().unwrap().clone())
    }
}

/// Accepts every batch except those of participants listed in `failing`.
/// While held, submissions wait until `release` is called.
#[derive(Default)]
pub struct RecordingSink {
    pub failing: Mutex<BTreeSet<String>>,
    pub accepted: Mutex<Vec<ResultSubmission>>,
    pub attempts: Mutex<Vec<String>>,
    held: AtomicBool,
    released: Notify,
}

impl RecordingSink {
    pub fn fail_for(&self, session_participant_id: &str) {
        self.failing
            .lock()
            .unwrap()
            .insert(session_participant_id.to_string());
    }

    pub fn heal(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn hold(&self) {
        self.held.store(true, Ordering::SeqCst);
    }

    pub fn release(&self) {
        self.held.store(false, Ordering::SeqCst);
        self.released.notify_waiters();
    }

    pub fn accepted_for(&self, session_participant_id: &str) -> Vec<ResultSubmission> {
        self.accepted
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.session_student_id == session_participant_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ResultSink for RecordingSink {
    async fn submit(&self, batch: &ParticipantBatch) -> anyhow::Result<()> {
        let id = batch.participant.session_participant_id.clone();
        self.attempts.lock().unwrap().push(id.clone());
        while self.held.load(Ordering::SeqCst) {
            let released = self.released.notified();
            if !self.held.load(Ordering::SeqCst) {
                break;
            }
            released.await;
        }
        if self.failing.lock().unwrap().contains(&id) {
            anyhow::bail!("results API rejected batch for {}", id);
        }
        self.accepted.lock().unwrap().extend(batch.submissions());
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub content: Arc<StaticContent>,
    pub sink: Arc<RecordingSink>,
}

pub fn create_test_app(items: Vec<ExerciseItem>) -> TestApp {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    let clock = Arc::new(ManualClock::default());
    let content = Arc::new(StaticContent::default());
    *content.items.lock().unwrap() = items;
    let sink = Arc::new(RecordingSink::default());

    let state = Arc::new(AppState::with_collaborators(
        Config::default(),
        content.clone(),
        sink.clone(),
        clock.clone(),
    ));

    TestApp {
        router: create_router(state.clone()),
        state,
        clock,
        content,
        sink,
    }
}

impl TestApp {
    pub async fn send(&self, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));
        (status, value)
    }

    /// Creates a game session and returns its view.
    pub async fn create_session(&self, game: &str, participants: &[&str]) -> Value {
        self.create_session_with_seed(game, participants, None).await
    }

    pub async fn create_session_with_seed(
        &self,
        game: &str,
        participants: &[&str],
        seed: Option<u64>,
    ) -> Value {
        let (status, body) = self
            .send(
                "POST",
                "/api/v1/game-sessions",
                Some(create_request(game, participants, seed)),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body
    }
}

pub fn create_request(game: &str, participants: &[&str], seed: Option<u64>) -> Value {
    let roster: Vec<Value> = participants
        .iter()
        .map(|id| json!({ "student_id": format!("student-{}", id), "session_participant_id": id }))
        .collect();
    json!({
        "session_id": "therapy-session-1",
        "game": game,
        "participants": roster,
        "query": {
            "theme_id": "farm-animals",
            "difficulty_level": 1,
            "category": "receptive",
            "question_type": "identify"
        },
        "rng_seed": seed
    })
}

pub fn sequencing_item(id: &str, ordering: &[&str]) -> ExerciseItem {
    ExerciseItem {
        id: id.to_string(),
        prompt: format!("Put the pictures for {} in order", id),
        answer: AnswerRepresentation::Ordered(ordering.iter().map(|s| s.to_string()).collect()),
        options: ordering.iter().rev().map(|s| s.to_string()).collect(),
        option_urls: vec![],
        exercise_type: ExerciseType::Game,
        metadata: Default::default(),
    }
}

pub fn word_item(id: &str, word: &str) -> ExerciseItem {
    ExerciseItem {
        id: id.to_string(),
        prompt: format!("What is this? ({})", id),
        answer: AnswerRepresentation::Single(word.to_string()),
        options: vec![word.to_string(), "other".to_string()],
        option_urls: vec![],
        exercise_type: ExerciseType::Game,
        metadata: Default::default(),
    }
}

pub fn pdf_item(id: &str) -> ExerciseItem {
    ExerciseItem {
        exercise_type: ExerciseType::Pdf,
        ..word_item(id, "worksheet")
    }
}
