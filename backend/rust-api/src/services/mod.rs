use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::clients::{RestContentClient, RestResultClient};
use crate::config::Config;
use crate::engine::{
    Clock, ContentSource, GameSession, InMemorySelectionBackend, RedisSelectionBackend,
    ResultSink, SelectionBackend, SystemClock,
};

pub type SharedGameSession = Arc<Mutex<GameSession>>;

pub struct AppState {
    pub config: Config,
    pub sessions: RwLock<HashMap<String, SharedGameSession>>,
    pub content: Arc<dyn ContentSource>,
    pub results: Arc<dyn ResultSink>,
    pub selection: Arc<dyn SelectionBackend>,
    pub redis: Option<ConnectionManager>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let timeout = config.http_timeout();
        let content: Arc<dyn ContentSource> =
            Arc::new(RestContentClient::new(config.content_api_url.clone(), timeout));
        let results: Arc<dyn ResultSink> = Arc::new(RestResultClient::new(
            &config.results_api_url,
            &config.results_batch_path,
            timeout,
        ));

        let (redis, selection): (Option<ConnectionManager>, Arc<dyn SelectionBackend>) =
            match &config.redis_uri {
                Some(uri) => {
                    let redis = connect_redis(uri).await?;
                    let backend =
                        RedisSelectionBackend::new(redis.clone(), config.selection_ttl_seconds);
                    (Some(redis), Arc::new(backend))
                }
                None => {
                    tracing::warn!("redis.uri not set, session selection is kept in memory");
                    (None, Arc::new(InMemorySelectionBackend::new()))
                }
            };

        Ok(Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            content,
            results,
            selection,
            redis,
            clock: Arc::new(SystemClock),
        })
    }

    /// State wired to caller-supplied collaborators, without Redis.
    pub fn with_collaborators(
        config: Config,
        content: Arc<dyn ContentSource>,
        results: Arc<dyn ResultSink>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            config,
            sessions: RwLock::new(HashMap::new()),
            content,
            results,
            selection: Arc::new(InMemorySelectionBackend::new()),
            redis: None,
            clock,
        }
    }
}

async fn connect_redis(uri: &str) -> anyhow::Result<ConnectionManager> {
    let client = redis::Client::open(uri)?;

    tracing::info!("Attempting to connect to Redis...");

    let redis = tokio::time::timeout(
        std::time::Duration::from_secs(30),
        ConnectionManager::new(client),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

    let mut conn = redis.clone();
    tokio::time::timeout(
        std::time::Duration::from_secs(5),
        redis::cmd("PING").query_async::<String>(&mut conn),
    )
    .await
    .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

    tracing::info!("Redis connection established successfully");

    Ok(redis)
}

pub mod game_session_service;
pub mod selection_service;
pub mod session_sweeper;
