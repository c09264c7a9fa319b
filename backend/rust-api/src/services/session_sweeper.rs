use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{info, warn};

use super::AppState;
use crate::metrics::{GAME_SESSIONS_ACTIVE, GAME_SESSIONS_TOTAL};

/// Drops game sessions nobody is coming back to: finished and fully saved
/// ones after a short grace period, anything else once it has sat idle past
/// the TTL.
pub struct SessionSweeper {
    state: Arc<AppState>,
}

impl SessionSweeper {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    pub async fn run(self) {
        let interval = Duration::from_secs(self.state.config.session_sweep_interval_secs);
        info!(
            "Starting game session sweeper (interval {}s, idle ttl {}s)",
            interval.as_secs(),
            self.state.config.session_idle_ttl_secs
        );

        loop {
            sleep(interval).await;
            let evicted = self.run_once().await;
            if evicted > 0 {
                info!("Session sweep evicted {} game sessions", evicted);
            }
        }
    }

    /// One pass over the registry. Sessions that are locked or have a save
    /// in flight are left for the next pass.
    pub async fn run_once(&self) -> usize {
        let idle_ttl = self.state.config.session_idle_ttl();
        let grace = self.state.config.finished_session_grace();

        let mut sessions = self.state.sessions.write().await;
        let before = sessions.len();

        sessions.retain(|id, shared| {
            let Ok(session) = shared.try_lock() else {
                return true;
            };
            let status = session.save_status();
            if status.any_saving {
                return true;
            }

            let idle = session.idle_for();
            let reason = if session.is_finished() && status.all_saved && idle >= grace {
                "completed"
            } else if idle >= idle_ttl {
                "expired"
            } else {
                return true;
            };

            let unsaved = session.unsaved_count();
            if unsaved > 0 {
                warn!(
                    "Evicting game session {} ({}) after {}s idle with {} unsaved results",
                    id,
                    reason,
                    idle.as_secs(),
                    unsaved
                );
            } else {
                info!(
                    "Evicting game session {} ({}) after {}s idle",
                    id,
                    reason,
                    idle.as_secs()
                );
            }

            GAME_SESSIONS_TOTAL
                .with_label_values(&[session.game().as_str(), reason])
                .inc();
            GAME_SESSIONS_ACTIVE.dec();
            false
        });

        before - sessions.len()
    }
}
