use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SequenceCheck {
    pub is_complete: bool,
    /// `None` until every slot is filled; partial orderings are never judged.
    pub is_correct: Option<bool>,
    pub filled_positions: Vec<usize>,
}

/// Compares a candidate ordering against the canonical answer. An empty
/// answer (malformed encoding) never validates.
pub fn check_sequence(slots: &[Option<String>], answer: &[String]) -> SequenceCheck {
    let filled_positions: Vec<usize> = slots
        .iter()
        .enumerate()
        .filter_map(|(i, slot)| slot.as_ref().map(|_| i))
        .collect();
    let is_complete = !slots.is_empty() && filled_positions.len() == slots.len();

    let is_correct = is_complete.then(|| {
        !answer.is_empty()
            && slots.len() == answer.len()
            && slots
                .iter()
                .zip(answer)
                .all(|(slot, expected)| slot.as_deref() == Some(expected.as_str()))
    });

    SequenceCheck {
        is_complete,
        is_correct,
        filled_positions,
    }
}

/// Direct comparison used by the matching and flashcard games.
pub fn check_direct(expected: &str, candidate: &str) -> bool {
    let expected = expected.trim();
    !expected.is_empty() && expected.eq_ignore_ascii_case(candidate.trim())
}

#[derive(Debug, thiserror::Error)]
#[error("Malformed answer encoding: {0}")]
pub struct MalformedAnswerEncoding(#[from] serde_json::Error);

/// Strict decoder for a JSON-encoded ordered list of filenames.
pub fn try_decode_ordered_answer(raw: &str) -> Result<Vec<String>, MalformedAnswerEncoding> {
    Ok(serde_json::from_str::<Vec<String>>(raw.trim())?)
}

/// Lenient decoder: a malformed encoding is logged and becomes an empty
/// answer, which leaves the student stuck on that item instead of crashing
/// the game.
pub fn decode_ordered_answer(item_id: &str, raw: &str) -> Vec<String> {
    match try_decode_ordered_answer(raw) {
        Ok(values) => values,
        Err(e) => {
            tracing::warn!(
                "Falling back to empty answer for item {}: {} (raw={:?})",
                item_id,
                e,
                raw
            );
            Vec::new()
        }
    }
}
