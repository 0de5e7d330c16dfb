//! Database row types, mapped directly from SQLite rows.
//! Distinct from superchat-types models so password material stays in this layer.

use chrono::{DateTime, Utc};
use superchat_types::models::{Role, Room, RoomModerator, RoomUser, User};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub password_salt: String,
    pub password_hash: String,
}

impl UserRow {
    pub fn to_user(&self) -> User {
        User {
            id: self.id.clone(),
            email: self.email.clone(),
        }
    }
}

/// One row per user; `token_digest` is never the raw token.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub token_digest: String,
    pub expires_at: DateTime<Utc>,
}

/// Salt and hash as stored, both base64.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordColumns {
    pub salt: String,
    pub hash: String,
}

#[derive(Debug, Clone)]
pub struct RoomRow {
    pub id: String,
    pub name: String,
    /// `Some` exactly when the room is password protected.
    pub password: Option<PasswordColumns>,
}

impl RoomRow {
    pub fn to_room(&self) -> Room {
        Room {
            id: self.id.clone(),
            name: self.name.clone(),
            password_protected: self.password.is_some(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomModeratorRow {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub role: Role,
}

impl From<RoomModeratorRow> for RoomModerator {
    fn from(row: RoomModeratorRow) -> Self {
        RoomModerator {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            role: row.role,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoomUserRow {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub muted: bool,
}

impl From<RoomUserRow> for RoomUser {
    fn from(row: RoomUserRow) -> Self {
        RoomUser {
            id: row.id,
            room_id: row.room_id,
            user_id: row.user_id,
            muted: row.muted,
        }
    }
}
