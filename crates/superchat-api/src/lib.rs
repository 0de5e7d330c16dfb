pub mod auth;
pub mod error;
pub mod middleware;
pub mod policy;
pub mod rooms;
pub mod session;

use anyhow::anyhow;
use axum::{
    Router,
    routing::{delete, get, patch, post, put},
};
use tracing::error;

pub use auth::{AppState, AppStateInner};
pub use error::ApiError;

/// Run blocking store work off the async runtime.
pub(crate) async fn blocking<F, T>(f: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ApiError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        error!("spawn_blocking join error: {}", e);
        ApiError::Internal(anyhow!("blocking task failed: {e}"))
    })?
}

pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/ping", get(auth::ping))
        .route("/api/user", post(auth::register))
        .route("/api/user/token", post(auth::token))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/api/user/password", put(auth::update_password))
        .route("/api/room", post(rooms::create_room))
        .route("/api/room/{room_id}", patch(rooms::rename_room))
        .route("/api/room/{room_id}", delete(rooms::delete_room))
        .route("/api/room/{room_id}/join", post(rooms::join_room))
        .route("/api/room/{room_id}/password", put(rooms::reset_room_password))
        .route("/api/room/{room_id}/moderators", post(rooms::add_moderator))
        .route(
            "/api/room/{room_id}/moderators/{user_id}",
            delete(rooms::remove_moderator),
        )
        .route(
            "/api/room/{room_id}/members/{user_id}/mute",
            put(rooms::set_muted),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            middleware::require_auth,
        ))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}
