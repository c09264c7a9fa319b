use anyhow::Result;

use super::AppState;
use crate::engine::{SessionSelection, SessionStore};

/// Per-owner session selection, read and written through a `SessionStore`.
pub struct SelectionService<'a> {
    state: &'a AppState,
}

impl<'a> SelectionService<'a> {
    pub fn new(state: &'a AppState) -> Self {
        Self { state }
    }

    fn store(&self, owner_id: &str) -> SessionStore {
        SessionStore::new(
            self.state.selection.clone(),
            owner_id,
            self.state.clock.clone(),
        )
    }

    pub async fn get(&self, owner_id: &str) -> Result<Option<SessionSelection>> {
        let mut store = self.store(owner_id);
        Ok(store.hydrate().await?.cloned())
    }

    pub async fn update(
        &self,
        owner_id: &str,
        selection: SessionSelection,
    ) -> Result<SessionSelection> {
        let mut store = self.store(owner_id);
        let saved = store.update(selection).await?.clone();
        tracing::info!(
            "Session selection updated for {}: roster={}, week={:?}",
            owner_id,
            saved.roster.len(),
            saved.curriculum_week
        );
        Ok(saved)
    }

    pub async fn clear(&self, owner_id: &str) -> Result<()> {
        self.store(owner_id).clear().await
    }
}
