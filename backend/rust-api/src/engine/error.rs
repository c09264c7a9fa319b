use super::types::GameKind;

pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Refusals raised by the session engine.
///
/// Wrong answers and wrong orderings are not errors: they are recorded as
/// incorrect attempts on the active tracker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    #[error("A game session needs at least one participant")]
    NoParticipants,

    #[error("No usable content for this session")]
    ContentUnavailable,

    #[error("Participant not found in session: {0}")]
    UnknownParticipant(String),

    #[error("Item not found in session: {0}")]
    UnknownItem(String),

    #[error("No item is active for the current turn")]
    NoActiveItem,

    #[error("Game session is already finished")]
    SessionFinished,

    #[error("A spin is already in progress")]
    SpinInProgress,

    #[error("Item {0} must be completed before the next spin")]
    ItemInProgress(String),

    #[error("Spin has not settled yet ({remaining_ms}ms remaining)")]
    SpinNotSettled { remaining_ms: i64 },

    #[error("Interaction '{interaction}' is not supported by the {game} game")]
    WrongInteraction {
        interaction: &'static str,
        game: &'static str,
    },
}

impl EngineError {
    pub fn wrong_interaction(interaction: &'static str, game: GameKind) -> Self {
        EngineError::WrongInteraction {
            interaction,
            game: game.as_str(),
        }
    }

    /// Errors the caller can fix by waiting or by choosing a different
    /// action, as opposed to addressing something that does not exist.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            EngineError::SessionFinished
                | EngineError::SpinInProgress
                | EngineError::ItemInProgress(_)
                | EngineError::SpinNotSettled { .. }
                | EngineError::NoActiveItem
        )
    }
}
