//! Randomized, non-repeating item selection for the spinner wheel.
//!
//! The wheel is split into equal segments, one per selectable item, laid out
//! clockwise from the top pointer in the unrotated frame. A spin adds a random
//! number of full turns plus a random offset to the current rotation; the
//! item is whatever segment ends under the pointer, so the logical outcome
//! always matches the displayed stop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

use super::clock::{to_chrono, RandomSource};
use super::error::{EngineError, EngineResult};
use super::types::ExerciseItem;

pub const MIN_SPINS: f64 = 5.0;
pub const MAX_SPINS: f64 = 8.0;
/// The pointer sits at the top of the wheel, a quarter turn from angle 0.
const POINTER_OFFSET_DEGREES: f64 = 90.0;

/// Index of the segment under the top pointer after rotating a wheel of
/// `segment_count` equal segments clockwise by `total_rotation` degrees.
/// Always in `[0, segment_count)`; returns 0 for an empty wheel.
pub fn index_for_rotation(total_rotation: f64, segment_count: usize) -> usize {
    if segment_count == 0 {
        return 0;
    }
    let segment_angle = 360.0 / segment_count as f64;
    let r = total_rotation.rem_euclid(360.0);
    let segment_at_top = (360.0 - r - POINTER_OFFSET_DEGREES).rem_euclid(360.0);
    ((segment_at_top / segment_angle).floor() as usize) % segment_count
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpinOutcome {
    /// Nothing left to select.
    Exhausted,
    /// One item left: selected without animation.
    Direct { item_id: String },
    /// Wheel is turning; the selection is final only once it settles.
    Spinning {
        target_index: usize,
        item_id: String,
        total_rotation: f64,
        settles_at: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SpinResolution {
    Exhausted,
    Selected {
        item_id: String,
        index: usize,
        /// The spun-for item left the pool before the wheel settled and a
        /// replacement was drawn.
        reselected: bool,
    },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpinState {
    pub rotation_degrees: f64,
    pub is_spinning: bool,
    pub pending_selection_index: Option<usize>,
    pending_item_id: Option<String>,
    settles_at: Option<DateTime<Utc>>,
    excluded_item_ids: BTreeSet<String>,
}

impl SpinState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn excluded_item_ids(&self) -> &BTreeSet<String> {
        &self.excluded_item_ids
    }

    pub fn settles_at(&self) -> Option<DateTime<Utc>> {
        self.settles_at
    }

    /// Items still selectable, in their original order.
    pub fn available<'a>(&self, items: &'a [ExerciseItem]) -> Vec<&'a ExerciseItem> {
        items
            .iter()
            .filter(|item| !self.excluded_item_ids.contains(&item.id))
            .collect()
    }

    /// Removes an item from future selection. The excluded set never shrinks
    /// within a session.
    pub fn exclude(&mut self, item_id: &str) -> bool {
        self.excluded_item_ids.insert(item_id.to_string())
    }

    pub fn begin_spin(
        &mut self,
        items: &[ExerciseItem],
        rng: &mut dyn RandomSource,
        now: DateTime<Utc>,
        settle_delay: Duration,
    ) -> EngineResult<SpinOutcome> {
        if self.is_spinning {
            return Err(EngineError::SpinInProgress);
        }

        let available = self.available(items);
        match available.len() {
            0 => Ok(SpinOutcome::Exhausted),
            1 => {
                self.pending_selection_index = Some(0);
                Ok(SpinOutcome::Direct {
                    item_id: available[0].id.clone(),
                })
            }
            count => {
                let spins = rng.range_f64(MIN_SPINS, MAX_SPINS);
                let offset = rng.range_f64(0.0, 360.0);
                let total_rotation = self.rotation_degrees + spins * 360.0 + offset;
                let target_index = index_for_rotation(total_rotation, count);
                let item_id = available[target_index].id.clone();
                let settles_at = now + to_chrono(settle_delay);

                tracing::debug!(
                    "Spin started: rotation={:.1}, segments={}, target_index={}, item={}",
                    total_rotation,
                    count,
                    target_index,
                    item_id
                );

                self.rotation_degrees = total_rotation;
                self.is_spinning = true;
                self.pending_selection_index = Some(target_index);
                self.pending_item_id = Some(item_id.clone());
                self.settles_at = Some(settles_at);

                Ok(SpinOutcome::Spinning {
                    target_index,
                    item_id,
                    total_rotation,
                    settles_at,
                })
            }
        }
    }

    pub fn is_settled(&self, now: DateTime<Utc>) -> bool {
        self.is_spinning && self.settles_at.map(|at| now >= at).unwrap_or(true)
    }

    /// Commits the outcome of a settled spin, re-validating it against the
    /// current pool.
    pub fn resolve_spin(
        &mut self,
        items: &[ExerciseItem],
        rng: &mut dyn RandomSource,
        now: DateTime<Utc>,
    ) -> EngineResult<SpinResolution> {
        if !self.is_spinning {
            return Err(EngineError::NoActiveItem);
        }
        if let Some(at) = self.settles_at {
            if now < at {
                return Err(EngineError::SpinNotSettled {
                    remaining_ms: (at - now).num_milliseconds(),
                });
            }
        }

        self.is_spinning = false;
        self.settles_at = None;
        let pending = self.pending_item_id.take();

        let available = self.available(items);
        if available.is_empty() {
            self.pending_selection_index = None;
            return Ok(SpinResolution::Exhausted);
        }

        if let Some(item_id) = pending {
            if let Some(index) = available.iter().position(|item| item.id == item_id) {
                self.pending_selection_index = Some(index);
                return Ok(SpinResolution::Selected {
                    item_id,
                    index,
                    reselected: false,
                });
            }
            tracing::warn!(
                "Spin target {} left the pool before settling, reselecting",
                item_id
            );
        }

        let index = rng.index(available.len());
        self.pending_selection_index = Some(index);
        Ok(SpinResolution::Selected {
            item_id: available[index].id.clone(),
            index,
            reselected: true,
        })
    }

    /// Drops any pending selection. Used when the selected item is consumed.
    pub fn clear_selection(&mut self) {
        self.pending_selection_index = None;
        self.pending_item_id = None;
    }

    /// Forgets an in-flight spin without resolving it and restores the full
    /// pool. Only a full session reset or replay calls this.
    pub fn reset(&mut self) {
        *self = Self {
            rotation_degrees: self.rotation_degrees,
            ..Self::default()
        };
    }
}
