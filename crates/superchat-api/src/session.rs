//! Session lifecycle: one row per user, overwritten on every login.
//!
//! `NoSession -> Active -> (Active | Expired)`. There is no revoked state and
//! expired rows are left in place; the next login overwrites them.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use superchat_crypto::token;
use superchat_db::Store;
use superchat_db::models::SessionRow;
use superchat_types::models::User;
use tracing::debug;
use uuid::Uuid;

use crate::error::{ApiError, AuthFailure};

/// Fixed session lifetime. Reissuing replaces the expiry, it never extends it.
pub const SESSION_TTL_SECS: i64 = 60 * 60;

#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Raw token; the store only ever sees its digest.
    pub token: String,
    pub user_id: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn Store>,
}

impl SessionManager {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn issue_session(&self, user_id: &str) -> Result<IssuedSession, ApiError> {
        self.issue_session_at(user_id, Utc::now())
    }

    /// Mint a token for `user_id` and upsert its session row.
    /// Concurrent calls for the same user race; the last write wins.
    pub fn issue_session_at(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedSession, ApiError> {
        let issued = token::issue_token();
        let expires_at = now + Duration::seconds(SESSION_TTL_SECS);

        self.store.upsert_session(&SessionRow {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            token_digest: issued.digest,
            expires_at,
        })?;

        debug!(user_id, %expires_at, "Session issued");
        Ok(IssuedSession {
            token: issued.token,
            user_id: user_id.to_string(),
            expires_at,
        })
    }

    pub fn validate_session(&self, user_id: &str, presented: &str) -> Result<User, ApiError> {
        self.validate_session_at(user_id, presented, Utc::now())
    }

    /// Resolve `(user_id, token)` to its user. A session is live while
    /// `now <= expires_at`.
    pub fn validate_session_at(
        &self,
        user_id: &str,
        presented: &str,
        now: DateTime<Utc>,
    ) -> Result<User, ApiError> {
        let session = self
            .store
            .session_for_user(user_id)?
            .ok_or(AuthFailure::NoSuchSession)?;

        if !token::verify_token(presented, &session.token_digest) {
            return Err(AuthFailure::InvalidToken.into());
        }

        if now > session.expires_at {
            return Err(AuthFailure::SessionExpired.into());
        }

        let user = self
            .store
            .user_by_id(user_id)?
            .ok_or(AuthFailure::NoSuchUser)?;

        Ok(user.to_user())
    }
}
