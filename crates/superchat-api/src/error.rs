use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use superchat_db::DbError;
use tracing::error;

/// Why a caller could not be authenticated. Every variant looks the same from
/// outside; the distinction is for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    #[error("missing credentials")]
    MissingCredentials,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("no session for user")]
    NoSuchSession,
    #[error("invalid token")]
    InvalidToken,
    #[error("session expired")]
    SessionExpired,
    #[error("session user no longer exists")]
    NoSuchUser,
}

/// An authenticated caller lacking a room privilege.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Denial {
    #[error("not a moderator of this room")]
    NotAModerator,
    #[error("room owner required")]
    NotOwner,
    #[error("invalid role")]
    InvalidRole,
    #[error("user is already a moderator")]
    AlreadyModerator,
    #[error("no such user")]
    NoSuchUser,
    #[error("wrong room password")]
    WrongRoomPassword,
    #[error("target holds an equal or higher room role")]
    TargetOutranks,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("unauthorized: {0}")]
    Unauthorized(#[from] AuthFailure),

    #[error("forbidden: {0}")]
    Forbidden(Denial),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("storage failure: {0}")]
    Storage(#[from] DbError),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        ApiError::InvalidInput(msg.into())
    }
}

impl From<Denial> for ApiError {
    fn from(denial: Denial) -> Self {
        match denial {
            // A missing target is a lookup miss, not a privilege problem.
            Denial::NoSuchUser => ApiError::NotFound("user"),
            other => ApiError::Forbidden(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized".to_string()),
            ApiError::Forbidden(denial) => (StatusCode::FORBIDDEN, denial.to_string()),
            ApiError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
            ApiError::Storage(e) => {
                error!("Storage failure: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
            ApiError::Internal(e) => {
                error!("Internal error: {:#}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping() {
        let cases = [
            (ApiError::invalid("bad"), StatusCode::BAD_REQUEST),
            (AuthFailure::SessionExpired.into(), StatusCode::UNAUTHORIZED),
            (AuthFailure::InvalidToken.into(), StatusCode::UNAUTHORIZED),
            (Denial::NotOwner.into(), StatusCode::FORBIDDEN),
            (Denial::AlreadyModerator.into(), StatusCode::FORBIDDEN),
            (Denial::NoSuchUser.into(), StatusCode::NOT_FOUND),
            (ApiError::NotFound("room"), StatusCode::NOT_FOUND),
            (DbError::LockPoisoned.into(), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(err.into_response().status(), status);
        }
    }
}
