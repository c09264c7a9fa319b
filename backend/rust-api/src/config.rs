use serde::Deserialize;
use std::env;
use std::time::Duration;

use crate::engine::session::{DEFAULT_CELEBRATION_MS, DEFAULT_SPIN_SETTLE_MS};
use crate::engine::{EngineTimings, SaveMode};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub bind_addr: String,
    pub content_api_url: String,
    pub results_api_url: String,
    pub results_batch_path: String,
    pub http_timeout_ms: u64,
    /// Selection mirroring falls back to memory when unset.
    pub redis_uri: Option<String>,
    pub selection_ttl_seconds: u64,
    pub spin_settle_ms: u64,
    pub celebration_ms: u64,
    pub save_mode: SaveMode,
    /// Sessions untouched for this long are dropped, saved or not.
    pub session_idle_ttl_secs: u64,
    /// Finished, fully saved sessions are dropped after this much idle time.
    pub finished_session_grace_secs: u64,
    pub session_sweep_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8081".to_string(),
            content_api_url: "http://localhost:8000".to_string(),
            results_api_url: "http://localhost:8000".to_string(),
            results_batch_path: "/api/session-results/bulk".to_string(),
            http_timeout_ms: 5000,
            redis_uri: None,
            selection_ttl_seconds: 7 * 24 * 3600,
            spin_settle_ms: DEFAULT_SPIN_SETTLE_MS,
            celebration_ms: DEFAULT_CELEBRATION_MS,
            save_mode: SaveMode::Sequential,
            session_idle_ttl_secs: 30 * 60,
            finished_session_grace_secs: 5 * 60,
            session_sweep_interval_secs: 60,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self, config::ConfigError> {
        // Root .env first, then local .env
        let skip_root_env = env::var("SKIP_ROOT_ENV").is_ok();
        if skip_root_env {
            dotenvy::dotenv().ok();
        } else if dotenvy::from_path("../../.env").is_err() {
            dotenvy::dotenv().ok();
        }

        let env = env::var("APP_ENV").unwrap_or_else(|_| "dev".to_string());

        // config/{env}.toml, overridden by APP_* variables
        let settings = config::Config::builder()
            .add_source(config::File::with_name(&format!("config/{}", env)).required(false))
            .add_source(config::Environment::with_prefix("APP").separator("__"))
            .build()?;

        let defaults = Config::default();

        let bind_addr = settings
            .get_string("server.bind_addr")
            .or_else(|_| env::var("BIND_ADDR"))
            .unwrap_or(defaults.bind_addr);

        let content_api_url = settings
            .get_string("content_api.url")
            .or_else(|_| env::var("CONTENT_API_URL"))
            .unwrap_or(defaults.content_api_url);

        let results_api_url = settings
            .get_string("results_api.url")
            .or_else(|_| env::var("RESULTS_API_URL"))
            .unwrap_or_else(|_| content_api_url.clone());

        let results_batch_path = settings
            .get_string("results_api.batch_path")
            .unwrap_or(defaults.results_batch_path);

        let http_timeout_ms = settings
            .get_int("http.timeout_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.http_timeout_ms);

        let redis_uri = settings
            .get_string("redis.uri")
            .or_else(|_| env::var("REDIS_URI"))
            .ok()
            .filter(|uri| !uri.is_empty());

        let selection_ttl_seconds = settings
            .get_int("redis.selection_ttl_seconds")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.selection_ttl_seconds);

        let spin_settle_ms = settings
            .get_int("engine.spin_settle_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(defaults.spin_settle_ms);

        let celebration_ms = settings
            .get_int("engine.celebration_ms")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(defaults.celebration_ms);

        let save_mode = match settings.get_string("engine.save_mode") {
            Ok(raw) => match raw.to_ascii_lowercase().as_str() {
                "sequential" => SaveMode::Sequential,
                "concurrent" => SaveMode::Concurrent,
                other => {
                    return Err(config::ConfigError::Message(format!(
                        "engine.save_mode must be 'sequential' or 'concurrent', got '{}'",
                        other
                    )))
                }
            },
            Err(_) => defaults.save_mode,
        };

        let session_idle_ttl_secs = settings
            .get_int("engine.session_idle_ttl_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.session_idle_ttl_secs);

        let finished_session_grace_secs = settings
            .get_int("engine.finished_session_grace_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .unwrap_or(defaults.finished_session_grace_secs);

        let session_sweep_interval_secs = settings
            .get_int("engine.session_sweep_interval_secs")
            .ok()
            .and_then(|v| u64::try_from(v).ok())
            .filter(|v| *v > 0)
            .unwrap_or(defaults.session_sweep_interval_secs);

        Ok(Config {
            bind_addr,
            content_api_url,
            results_api_url,
            results_batch_path,
            http_timeout_ms,
            redis_uri,
            selection_ttl_seconds,
            spin_settle_ms,
            celebration_ms,
            save_mode,
            session_idle_ttl_secs,
            finished_session_grace_secs,
            session_sweep_interval_secs,
        })
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn session_idle_ttl(&self) -> Duration {
        Duration::from_secs(self.session_idle_ttl_secs)
    }

    pub fn finished_session_grace(&self) -> Duration {
        Duration::from_secs(self.finished_session_grace_secs)
    }

    pub fn engine_timings(&self) -> EngineTimings {
        EngineTimings {
            spin_settle: Duration::from_millis(self.spin_settle_ms),
            celebration: Duration::from_millis(self.celebration_ms),
        }
    }
}
