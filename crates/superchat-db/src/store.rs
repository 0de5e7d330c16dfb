//! The persistence capability handed to every component at construction.
//!
//! Implementations must be safe to share across request handlers. Methods block;
//! async callers are expected to move them onto a blocking thread.

use crate::Result;
use crate::models::{
    PasswordColumns, RoomModeratorRow, RoomRow, RoomUserRow, SessionRow, UserRow,
};

pub trait Store: Send + Sync {
    // -- Users --

    /// Fails with `DbError::Conflict` if the email (case-insensitive) is taken.
    fn insert_user(&self, user: &UserRow) -> Result<()>;
    fn user_by_id(&self, id: &str) -> Result<Option<UserRow>>;
    fn user_by_email(&self, email: &str) -> Result<Option<UserRow>>;
    fn update_user_password(&self, id: &str, password: &PasswordColumns) -> Result<()>;

    // -- Sessions --

    fn session_for_user(&self, user_id: &str) -> Result<Option<SessionRow>>;
    /// Insert, or overwrite digest and expiry of the user's existing row in place.
    fn upsert_session(&self, session: &SessionRow) -> Result<()>;

    // -- Rooms --

    fn room_by_id(&self, id: &str) -> Result<Option<RoomRow>>;
    /// Room, owner record and creator membership in one transaction.
    fn create_room(
        &self,
        room: &RoomRow,
        owner: &RoomModeratorRow,
        member: &RoomUserRow,
    ) -> Result<()>;
    fn rename_room(&self, id: &str, name: &str) -> Result<()>;
    /// `None` clears the room's password protection.
    fn set_room_password(&self, id: &str, password: Option<&PasswordColumns>) -> Result<()>;
    /// Moderator and membership rows go with the room.
    fn delete_room(&self, id: &str) -> Result<()>;

    // -- Moderators --

    fn moderator(&self, room_id: &str, user_id: &str) -> Result<Option<RoomModeratorRow>>;
    fn moderators_for_room(&self, room_id: &str) -> Result<Vec<RoomModeratorRow>>;
    /// Fails with `DbError::Conflict` if `(room_id, user_id)` already has a record.
    fn insert_moderator(&self, moderator: &RoomModeratorRow) -> Result<()>;
    fn delete_moderator(&self, room_id: &str, user_id: &str) -> Result<bool>;

    // -- Membership --

    fn room_user(&self, room_id: &str, user_id: &str) -> Result<Option<RoomUserRow>>;
    fn members_of_room(&self, room_id: &str) -> Result<Vec<RoomUserRow>>;
    fn insert_room_user(&self, member: &RoomUserRow) -> Result<()>;
    fn set_muted(&self, room_id: &str, user_id: &str, muted: bool) -> Result<bool>;
}
