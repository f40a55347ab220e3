pub mod admin;
pub mod auth;
pub mod dispatcher;
pub mod error;
pub mod gateway;
pub mod items;
pub mod middleware;
pub mod notifications;
pub mod routes;
pub mod swaps;
pub mod users;
pub mod validation;

use tracing::error;

use rewear_db::Database;

use crate::auth::AppState;
use crate::error::ApiError;

/// Run blocking store work off the async runtime.
pub(crate) async fn run_db<F, T>(state: &AppState, f: F) -> Result<T, ApiError>
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
        .map_err(ApiError::from)
}
