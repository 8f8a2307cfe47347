pub mod auth;
pub mod error;
pub mod flash;
pub mod listings;
pub mod middleware;
pub mod pages;
pub mod router;
pub mod views;

pub use auth::{AppState, AppStateInner, Authenticator, HashCost};
pub use listings::ListingStore;
pub use router::router;

use anyhow::anyhow;
use tracing::error;

use crate::error::ApiError;

/// Run blocking work (password hashing) on the blocking pool.
pub(crate) async fn blocking<F, T, E>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| {
            error!("spawn_blocking join error: {}", e);
            ApiError::Internal(anyhow!("blocking task failed: {}", e))
        })?
        .map_err(Into::into)
}
