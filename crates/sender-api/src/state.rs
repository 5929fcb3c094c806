use std::sync::Arc;

use tracing::error;

use sender_db::Database;

use crate::error::ApiError;
use crate::token::TokenKeys;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub tokens: TokenKeys,
}

impl AppStateInner {
    pub fn new(db: Database, jwt_secret: &str) -> AppState {
        Arc::new(Self {
            db,
            tokens: TokenKeys::new(jwt_secret),
        })
    }
}

/// Run blocking DB work off the async runtime.
pub(crate) async fn with_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&Database) -> anyhow::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    tokio::task::spawn_blocking(move || f(&state.db))
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(e.into())
        })?
        .map_err(ApiError::Internal)
}

/// Run CPU-heavy work (password hashing) off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(e.into())
    })
}
