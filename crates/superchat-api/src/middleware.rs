use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use superchat_types::models::User;
use tracing::warn;

use crate::AppState;
use crate::blocking;
use crate::error::{ApiError, AuthFailure};
use crate::session::SessionManager;

/// Header carrying the claimed user id. The raw token travels in `Authorization`.
pub const USER_ID_HEADER: &str = "userid";

/// The user resolved by `require_auth`, valid for the current request only.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Resolves a claimed user id plus raw token to an authenticated user.
#[derive(Clone)]
pub struct AuthGuard {
    sessions: SessionManager,
}

impl AuthGuard {
    pub fn new(sessions: SessionManager) -> Self {
        Self { sessions }
    }

    pub fn authenticate(&self, user_id: &str, token: &str) -> Result<User, ApiError> {
        let (user_id, token) = (user_id.trim(), token.trim());
        if user_id.is_empty() || token.is_empty() {
            return Err(AuthFailure::MissingCredentials.into());
        }

        self.sessions.validate_session(user_id, token).inspect_err(|e| {
            if let ApiError::Unauthorized(reason) = e {
                warn!(user_id, %reason, "Authentication rejected");
            }
        })
    }
}

/// Authenticate from the `userID` and `Authorization` headers.
pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (user_id, token) = credentials(req.headers());

    let guard = state.guard.clone();
    let user = blocking(move || guard.authenticate(&user_id, &token)).await?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}

/// Missing headers become empty strings and are rejected by the guard.
fn credentials(headers: &HeaderMap) -> (String, String) {
    let user_id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let token = auth.strip_prefix("Bearer ").unwrap_or(auth);

    (user_id.to_string(), token.to_string())
}
