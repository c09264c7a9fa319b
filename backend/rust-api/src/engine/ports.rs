//! Interfaces to the two external collaborators: content fetch and result
//! persistence. Their REST implementations live in `crate::clients`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::save::ParticipantBatch;
use super::types::{ExerciseItem, GameKind};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ContentQuery {
    #[validate(length(min = 1, max = 128))]
    pub theme_id: String,
    #[validate(range(min = 1, max = 3))]
    pub difficulty_level: u8,
    #[validate(length(min = 1, max = 64))]
    pub category: String,
    #[validate(length(min = 1, max = 64))]
    pub question_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_type: Option<GameKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(range(min = 1, max = 500))]
    pub limit: Option<u32>,
}

/// One persisted attempt, in the shape the results API expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultSubmission {
    pub content_id: String,
    pub session_student_id: String,
    pub session_id: String,
    pub time_taken_sec: u64,
    pub count_of_incorrect_attempts: u32,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn fetch(&self, query: &ContentQuery) -> anyhow::Result<Vec<ExerciseItem>>;
}

/// Persists one participant's batch. Implementations should treat
/// `(session_student_id, content_id)` as the idempotency key.
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn submit(&self, batch: &ParticipantBatch) -> anyhow::Result<()>;
}
