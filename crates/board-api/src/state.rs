use std::sync::Arc;

use anyhow::anyhow;
use board_db::Database;
use board_guard::{RateLimitPolicy, RateLimiter};
use tracing::error;

use crate::error::ApiError;

pub type AppState = Arc<AppStateInner>;

/// Runtime settings the handlers need. Built by the server binary from
/// the environment.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub jwt_secret: String,
    /// Argon2 PHC string for the admin password.
    pub admin_password_hash: String,
    pub session_ttl: chrono::Duration,
    pub allow_post_delete: bool,
    /// When set, every API request must present it in the `apikey` header.
    pub public_api_key: Option<String>,
    pub rate_limit: RateLimitPolicy,
}

pub struct AppStateInner {
    pub db: Arc<Database>,
    pub limiter: RateLimiter<Arc<Database>>,
    pub config: ApiConfig,
}

impl AppStateInner {
    pub fn new(db: Arc<Database>, config: ApiConfig) -> AppState {
        let limiter = RateLimiter::new(db.clone(), config.rate_limit.clone());
        Arc::new(Self { db, limiter, config })
    }
}

/// Run blocking store work off the async runtime.
pub async fn blocking<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&AppStateInner) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("background task failed"))
        })?
        .map_err(ApiError::from)
}
