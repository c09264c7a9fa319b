//! Durable mirror of the high-level session selection (active roster,
//! curriculum week, theme) for one owner. Game state itself is never
//! persisted here.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::clock::Clock;
use super::types::ParticipantTuple;
use crate::metrics::track_cache_operation;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionSelection {
    pub session_id: Option<String>,
    pub roster: Vec<ParticipantTuple>,
    pub curriculum_week: Option<u32>,
    pub theme_id: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait SelectionBackend: Send + Sync {
    async fn load(&self, owner_id: &str) -> Result<Option<SessionSelection>>;
    async fn save(&self, owner_id: &str, selection: &SessionSelection) -> Result<()>;
    async fn clear(&self, owner_id: &str) -> Result<()>;
}

#[derive(Default)]
pub struct InMemorySelectionBackend {
    entries: RwLock<HashMap<String, SessionSelection>>,
}

impl InMemorySelectionBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SelectionBackend for InMemorySelectionBackend {
    async fn load(&self, owner_id: &str) -> Result<Option<SessionSelection>> {
        Ok(self.entries.read().await.get(owner_id).cloned())
    }

    async fn save(&self, owner_id: &str, selection: &SessionSelection) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(owner_id.to_string(), selection.clone());
        Ok(())
    }

    async fn clear(&self, owner_id: &str) -> Result<()> {
        self.entries.write().await.remove(owner_id);
        Ok(())
    }
}

pub struct RedisSelectionBackend {
    redis: ConnectionManager,
    ttl_seconds: u64,
}

impl RedisSelectionBackend {
    pub fn new(redis: ConnectionManager, ttl_seconds: u64) -> Self {
        Self { redis, ttl_seconds }
    }

    fn key(owner_id: &str) -> String {
        format!("session_selection:{}", owner_id)
    }
}

#[async_trait]
impl SelectionBackend for RedisSelectionBackend {
    async fn load(&self, owner_id: &str) -> Result<Option<SessionSelection>> {
        let mut conn = self.redis.clone();
        let key = Self::key(owner_id);

        let raw: Option<String> = track_cache_operation("get", async {
            redis::cmd("GET")
                .arg(&key)
                .query_async(&mut conn)
                .await
                .context("Failed to read session selection from Redis")
        })
        .await?;

        match raw {
            Some(json) => Ok(Some(
                serde_json::from_str(&json).context("Corrupt session selection in Redis")?,
            )),
            None => Ok(None),
        }
    }

    async fn save(&self, owner_id: &str, selection: &SessionSelection) -> Result<()> {
        let mut conn = self.redis.clone();
        let key = Self::key(owner_id);
        let json = serde_json::to_string(selection)?;

        track_cache_operation("setex", async {
            redis::cmd("SETEX")
                .arg(&key)
                .arg(self.ttl_seconds)
                .arg(json)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to save session selection to Redis")
        })
        .await
    }

    async fn clear(&self, owner_id: &str) -> Result<()> {
        let mut conn = self.redis.clone();
        let key = Self::key(owner_id);

        track_cache_operation("del", async {
            redis::cmd("DEL")
                .arg(&key)
                .query_async::<()>(&mut conn)
                .await
                .context("Failed to delete session selection from Redis")
        })
        .await
    }
}

/// Explicit store over a durable backend, scoped to one owner.
///
/// `hydrate` reads the backend once; later calls reuse the cached value.
/// `update` writes through. `clear` is the teardown.
pub struct SessionStore {
    backend: Arc<dyn SelectionBackend>,
    owner_id: String,
    cached: Option<SessionSelection>,
    hydrated: bool,
    clock: Arc<dyn Clock>,
}

impl SessionStore {
    pub fn new(
        backend: Arc<dyn SelectionBackend>,
        owner_id: impl Into<String>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            backend,
            owner_id: owner_id.into(),
            cached: None,
            hydrated: false,
            clock,
        }
    }

    pub fn owner_id(&self) -> &str {
        &self.owner_id
    }

    pub fn is_hydrated(&self) -> bool {
        self.hydrated
    }

    pub async fn hydrate(&mut self) -> Result<Option<&SessionSelection>> {
        if !self.hydrated {
            self.cached = self.backend.load(&self.owner_id).await?;
            self.hydrated = true;
            tracing::debug!(
                "Session selection hydrated for {} (present={})",
                self.owner_id,
                self.cached.is_some()
            );
        }
        Ok(self.cached.as_ref())
    }

    pub fn selection(&self) -> Option<&SessionSelection> {
        self.cached.as_ref()
    }

    pub async fn update(&mut self, mut selection: SessionSelection) -> Result<&SessionSelection> {
        selection.updated_at = Some(self.clock.now());
        self.backend.save(&self.owner_id, &selection).await?;
        self.hydrated = true;
        Ok(self.cached.insert(selection))
    }

    pub async fn clear(&mut self) -> Result<()> {
        self.backend.clear(&self.owner_id).await?;
        self.cached = None;
        self.hydrated = true;
        tracing::debug!("Session selection cleared for {}", self.owner_id);
        Ok(())
    }
}
