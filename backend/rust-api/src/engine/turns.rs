use serde::{Deserialize, Serialize};

use super::error::{EngineError, EngineResult};
use super::types::ParticipantTuple;

/// Round-robin: `participants[turn_index % participants.len()]`.
/// Returns `None` for an empty roster.
pub fn active_participant(
    turn_index: usize,
    participants: &[ParticipantTuple],
) -> Option<&ParticipantTuple> {
    if participants.is_empty() {
        return None;
    }
    participants.get(turn_index % participants.len())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawTurnState")]
pub struct TurnState {
    turn_index: usize,
    participants: Vec<ParticipantTuple>,
}

/// Wire shape of `TurnState`; goes through `TurnState::new` so a decoded
/// roster is never empty.
#[derive(Deserialize)]
struct RawTurnState {
    turn_index: usize,
    participants: Vec<ParticipantTuple>,
}

impl TryFrom<RawTurnState> for TurnState {
    type Error = EngineError;

    fn try_from(raw: RawTurnState) -> EngineResult<Self> {
        let mut state = Self::new(raw.participants)?;
        state.turn_index = raw.turn_index;
        Ok(state)
    }
}

impl TurnState {
    pub fn new(participants: Vec<ParticipantTuple>) -> EngineResult<Self> {
        if participants.is_empty() {
            return Err(EngineError::NoParticipants);
        }
        Ok(Self {
            turn_index: 0,
            participants,
        })
    }

    pub fn turn_index(&self) -> usize {
        self.turn_index
    }

    pub fn participants(&self) -> &[ParticipantTuple] {
        &self.participants
    }

    /// Position of the active participant in the roster.
    pub fn active_slot(&self) -> usize {
        self.turn_index % self.participants.len()
    }

    pub fn active(&self) -> &ParticipantTuple {
        &self.participants[self.active_slot()]
    }

    /// Only called after a successful completion.
    pub fn advance(&mut self) -> usize {
        self.turn_index += 1;
        self.turn_index
    }

    pub fn rewind(&mut self) {
        self.turn_index = 0;
    }
}
