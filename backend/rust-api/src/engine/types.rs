use serde::{Deserialize, Serialize};

/// Kind of mini-game a session is driving. Decides how an item is answered
/// and how the next item is picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Sequencing,
    ImageMatching,
    Flashcard,
    Spinner,
    MemoryMatch,
}

impl GameKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            GameKind::Sequencing => "sequencing",
            GameKind::ImageMatching => "image_matching",
            GameKind::Flashcard => "flashcard",
            GameKind::Spinner => "spinner",
            GameKind::MemoryMatch => "memory_match",
        }
    }

    /// Spinner picks items at random; every other game walks the usable
    /// list in order, one item per turn.
    pub fn is_randomized(&self) -> bool {
        matches!(self, GameKind::Spinner)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExerciseType {
    Game,
    Pdf,
}

/// How the canonical answer of an item is expressed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerRepresentation {
    Single(String),
    Ordered(Vec<String>),
    Options(Vec<String>),
}

impl AnswerRepresentation {
    /// Ordered answer used by the sequencing game. A single answer is a
    /// one-slot ordering; an option set has no canonical order.
    pub fn ordering(&self) -> &[String] {
        match self {
            AnswerRepresentation::Ordered(values) => values,
            AnswerRepresentation::Single(value) => std::slice::from_ref(value),
            AnswerRepresentation::Options(_) => &[],
        }
    }

    pub fn accepts(&self, candidate: &str) -> bool {
        match self {
            AnswerRepresentation::Single(value) => {
                super::sequencing::check_direct(value, candidate)
            }
            AnswerRepresentation::Options(values) | AnswerRepresentation::Ordered(values) => values
                .iter()
                .any(|value| super::sequencing::check_direct(value, candidate)),
        }
    }
}

/// Reporting-only attributes. The engine carries them through untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub difficulty_level: Option<u8>,
    #[serde(default)]
    pub question_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseItem {
    pub id: String,
    pub prompt: String,
    pub answer: AnswerRepresentation,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub option_urls: Vec<String>,
    pub exercise_type: ExerciseType,
    #[serde(default)]
    pub metadata: ItemMetadata,
}

impl ExerciseItem {
    pub fn is_playable(&self) -> bool {
        self.exercise_type == ExerciseType::Game
    }
}

/// A student's identity scoped to one session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantTuple {
    pub student_id: String,
    pub session_participant_id: String,
}

impl ParticipantTuple {
    pub fn new(student_id: impl Into<String>, session_participant_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            session_participant_id: session_participant_id.into(),
        }
    }
}
