use serde::Deserialize;
use validator::Validate;

use crate::engine::{ParticipantTuple, SessionSelection};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateSelectionRequest {
    #[serde(default)]
    pub session_id: Option<String>,

    #[serde(default)]
    pub roster: Vec<ParticipantTuple>,

    #[validate(range(min = 1, max = 53, message = "curriculum_week must be between 1 and 53"))]
    #[serde(default)]
    pub curriculum_week: Option<u32>,

    #[validate(length(min = 1, max = 128))]
    #[serde(default)]
    pub theme_id: Option<String>,
}

impl From<UpdateSelectionRequest> for SessionSelection {
    fn from(req: UpdateSelectionRequest) -> Self {
        SessionSelection {
            session_id: req.session_id,
            roster: req.roster,
            curriculum_week: req.curriculum_week,
            theme_id: req.theme_id,
            updated_at: None,
        }
    }
}
