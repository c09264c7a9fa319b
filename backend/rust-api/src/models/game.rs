use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::engine::{
    AttemptFeedback, ContentQuery, GameKind, ParticipantTuple, SaveBatchStatus, SaveMode,
    SessionView, SpinOutcome, SpinResolution,
};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGameSessionRequest {
    /// Therapy session the results are filed under.
    #[validate(length(
        min = 1,
        max = 128,
        message = "session_id must be between 1 and 128 characters"
    ))]
    pub session_id: String,

    pub game: GameKind,

    #[validate(length(min = 1, message = "At least one participant is required"))]
    pub participants: Vec<ParticipantTuple>,

    #[validate(nested)]
    pub query: ContentQuery,

    /// Fixes the spinner's random draws.
    #[serde(default)]
    pub rng_seed: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderingRequest {
    pub slots: Vec<Option<String>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerRequest {
    #[validate(length(max = 512, message = "Answer is too long"))]
    pub answer: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarkRequest {
    pub correct: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRequest {
    #[serde(default)]
    pub mode: Option<SaveMode>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SaveRetryRequest {
    /// Defaults to every participant whose last save failed.
    #[serde(default)]
    pub participant_ids: Option<Vec<String>>,
    #[serde(default)]
    pub mode: Option<SaveMode>,
}

#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    pub feedback: AttemptFeedback,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct SpinResponse {
    pub outcome: SpinOutcome,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct ResolveSpinResponse {
    pub resolution: SpinResolution,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct SaveResponse {
    pub submitted_participants: usize,
    pub label: &'static str,
    pub error_banner: Option<&'static str>,
    pub status: SaveBatchStatus,
}

#[derive(Debug, Serialize)]
pub struct AbandonResponse {
    pub id: String,
    /// Completed results dropped without being saved.
    pub unsaved_results: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(participants: serde_json::Value, difficulty: u8) -> CreateGameSessionRequest {
        serde_json::from_value(json!({
            "session_id": "therapy-1",
            "game": "spinner",
            "participants": participants,
            "query": {
                "theme_id": "animals",
                "difficulty_level": difficulty,
                "category": "expressive",
                "question_type": "naming"
            }
        }))
        .unwrap()
    }

    #[test]
    fn valid_request_passes() {
        let req = request(
            json!([{ "student_id": "s1", "session_participant_id": "sp1" }]),
            2,
        );
        assert!(req.validate().is_ok());
        assert_eq!(req.game, GameKind::Spinner);
        assert!(req.rng_seed.is_none());
    }

    #[test]
    fn empty_roster_is_rejected() {
        assert!(request(json!([]), 2).validate().is_err());
    }

    #[test]
    fn difficulty_outside_range_is_rejected() {
        let req = request(
            json!([{ "student_id": "s1", "session_participant_id": "sp1" }]),
            4,
        );
        assert!(req.validate().is_err());
    }
}
