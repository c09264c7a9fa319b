use super::types::ExerciseItem;

/// Number of items to keep so every participant gets the same number of
/// turns: the largest multiple of `participant_count` not above `available`,
/// with a floor of one item per participant, capped at `available`.
pub fn usable_len(available: usize, participant_count: usize) -> usize {
    if available == 0 || participant_count == 0 {
        return 0;
    }
    let per_participant = (available / participant_count).max(1);
    (per_participant * participant_count).min(available)
}

/// Trims `items` to a fair, evenly divisible prefix. Order is preserved;
/// shuffling, if any, happens upstream at fetch time.
pub fn distribute(items: &[ExerciseItem], participant_count: usize) -> Vec<ExerciseItem> {
    let keep = usable_len(items.len(), participant_count);
    if keep < items.len() {
        tracing::debug!(
            "Trimming content pool from {} to {} items for {} participants",
            items.len(),
            keep,
            participant_count
        );
    }
    items[..keep].to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::{AnswerRepresentation, ExerciseType, ItemMetadata};
    use std::collections::HashSet;

    fn items(n: usize) -> Vec<ExerciseItem> {
        (0..n)
            .map(|i| ExerciseItem {
                id: format!("item-{}", i),
                prompt: format!("prompt {}", i),
                answer: AnswerRepresentation::Single(format!("answer {}", i)),
                options: vec![],
                option_urls: vec![],
                exercise_type: ExerciseType::Game,
                metadata: ItemMetadata::default(),
            })
            .collect()
    }

    #[test]
    fn five_items_two_students_keeps_four() {
        let usable = distribute(&items(5), 2);
        let ids: Vec<_> = usable.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["item-0", "item-1", "item-2", "item-3"]);
    }

    #[test]
    fn empty_pool_stays_empty() {
        assert!(distribute(&[], 3).is_empty());
    }

    #[test]
    fn fewer_items_than_participants_keeps_all() {
        assert_eq!(usable_len(2, 3), 2);
        assert_eq!(usable_len(1, 4), 1);
    }

    #[test]
    fn fair_distribution_holds_for_all_small_inputs() {
        for n in 0..40 {
            for p in 1..8 {
                let len = usable_len(n, p);
                assert!(len <= n, "n={} p={}", n, p);
                if n >= p {
                    assert_eq!(len % p, 0, "n={} p={}", n, p);
                    assert!(len >= p, "n={} p={}", n, p);
                    assert!(n - len < p, "n={} p={} left too much behind", n, p);
                }
                if n == 0 {
                    assert_eq!(len, 0);
                }
            }
        }
    }

    #[test]
    fn no_item_used_twice() {
        let usable = distribute(&items(9), 4);
        let ids: HashSet<_> = usable.iter().map(|i| i.id.clone()).collect();
        assert_eq!(usable.len(), 8);
        assert_eq!(ids.len(), 8);
    }
}
