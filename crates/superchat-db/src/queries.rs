use rusqlite::{Connection, Row};
use superchat_types::models::Role;

use crate::models::{
    PasswordColumns, RoomModeratorRow, RoomRow, RoomUserRow, SessionRow, UserRow,
};
use crate::{Database, DbError, Result, RoomCreationStage, Store};

impl Store for Database {
    // -- Users --

    fn insert_user(&self, user: &UserRow) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, email, password_salt, password_hash) VALUES (?1, ?2, ?3, ?4)",
                (&user.id, &user.email, &user.password_salt, &user.password_hash),
            )?;
            Ok(())
        })
    }

    fn user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password_salt, password_hash FROM users WHERE id = ?1",
                [id],
                user_from_row,
            )
            .optional()
        })
    }

    fn user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, email, password_salt, password_hash FROM users WHERE email = ?1",
                [email],
                user_from_row,
            )
            .optional()
        })
    }

    fn update_user_password(&self, id: &str, password: &PasswordColumns) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE users SET password_salt = ?1, password_hash = ?2, updated_at = datetime('now')
                 WHERE id = ?3",
                (&password.salt, &password.hash, id),
            )?;
            Ok(())
        })
    }

    // -- Sessions --

    fn session_for_user(&self, user_id: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, token_digest, expires_at FROM sessions WHERE user_id = ?1",
                [user_id],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        token_digest: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()
        })
    }

    fn upsert_session(&self, session: &SessionRow) -> Result<()> {
        // The row id survives an overwrite; only digest and expiry change.
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, token_digest, expires_at) VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(user_id) DO UPDATE SET
                    token_digest = excluded.token_digest,
                    expires_at = excluded.expires_at,
                    updated_at = datetime('now')",
                rusqlite::params![
                    session.id,
                    session.user_id,
                    session.token_digest,
                    session.expires_at
                ],
            )?;
            Ok(())
        })
    }

    // -- Rooms --

    fn room_by_id(&self, id: &str) -> Result<Option<RoomRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, name, password_protected, password_salt, password_hash FROM rooms WHERE id = ?1",
                [id],
                room_from_row,
            )
            .optional()
        })
    }

    fn create_room(
        &self,
        room: &RoomRow,
        owner: &RoomModeratorRow,
        member: &RoomUserRow,
    ) -> Result<()> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            insert_room(&tx, room).map_err(|e| at_stage(RoomCreationStage::Room, e))?;
            insert_moderator(&tx, owner)
                .map_err(|e| at_stage(RoomCreationStage::OwnerRecord, e))?;
            insert_room_user(&tx, member)
                .map_err(|e| at_stage(RoomCreationStage::Membership, e))?;

            // Dropping an uncommitted transaction rolls it back.
            tx.commit()?;
            Ok(())
        })
    }

    fn rename_room(&self, id: &str, name: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("UPDATE rooms SET name = ?1 WHERE id = ?2", (name, id))?;
            Ok(())
        })
    }

    fn set_room_password(&self, id: &str, password: Option<&PasswordColumns>) -> Result<()> {
        let (salt, hash) = match password {
            Some(p) => (Some(p.salt.as_str()), Some(p.hash.as_str())),
            None => (None, None),
        };

        self.with_conn(|conn| {
            conn.execute(
                "UPDATE rooms SET password_protected = ?1, password_salt = ?2, password_hash = ?3
                 WHERE id = ?4",
                rusqlite::params![password.is_some(), salt, hash, id],
            )?;
            Ok(())
        })
    }

    fn delete_room(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM rooms WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    // -- Moderators --

    fn moderator(&self, room_id: &str, user_id: &str) -> Result<Option<RoomModeratorRow>> {
        let raw = self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, room_id, user_id, role FROM room_moderators
                 WHERE room_id = ?1 AND user_id = ?2",
                [room_id, user_id],
                raw_moderator_from_row,
            )
            .optional()
        })?;

        raw.map(RawModerator::into_row).transpose()
    }

    fn moderators_for_room(&self, room_id: &str) -> Result<Vec<RoomModeratorRow>> {
        let raw = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_id, user_id, role FROM room_moderators
                 WHERE room_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([room_id], raw_moderator_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })?;

        raw.into_iter().map(RawModerator::into_row).collect()
    }

    fn insert_moderator(&self, moderator: &RoomModeratorRow) -> Result<()> {
        self.with_conn(|conn| insert_moderator(conn, moderator))
    }

    fn delete_moderator(&self, room_id: &str, user_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute(
                "DELETE FROM room_moderators WHERE room_id = ?1 AND user_id = ?2",
                [room_id, user_id],
            )?;
            Ok(deleted > 0)
        })
    }

    // -- Membership --

    fn room_user(&self, room_id: &str, user_id: &str) -> Result<Option<RoomUserRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, room_id, user_id, muted FROM room_users
                 WHERE room_id = ?1 AND user_id = ?2",
                [room_id, user_id],
                room_user_from_row,
            )
            .optional()
        })
    }

    fn members_of_room(&self, room_id: &str) -> Result<Vec<RoomUserRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_id, user_id, muted FROM room_users
                 WHERE room_id = ?1 ORDER BY created_at",
            )?;
            let rows = stmt
                .query_map([room_id], room_user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    fn insert_room_user(&self, member: &RoomUserRow) -> Result<()> {
        self.with_conn(|conn| insert_room_user(conn, member))
    }

    fn set_muted(&self, room_id: &str, user_id: &str, muted: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE room_users SET muted = ?1 WHERE room_id = ?2 AND user_id = ?3",
                rusqlite::params![muted, room_id, user_id],
            )?;
            Ok(updated > 0)
        })
    }
}

fn insert_room(conn: &Connection, room: &RoomRow) -> Result<()> {
    let (salt, hash) = match &room.password {
        Some(p) => (Some(p.salt.as_str()), Some(p.hash.as_str())),
        None => (None, None),
    };
    conn.execute(
        "INSERT INTO rooms (id, name, password_protected, password_salt, password_hash)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![room.id, room.name, room.password.is_some(), salt, hash],
    )?;
    Ok(())
}

fn insert_moderator(conn: &Connection, moderator: &RoomModeratorRow) -> Result<()> {
    conn.execute(
        "INSERT INTO room_moderators (id, room_id, user_id, role) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![
            moderator.id,
            moderator.room_id,
            moderator.user_id,
            moderator.role.as_i64()
        ],
    )?;
    Ok(())
}

fn insert_room_user(conn: &Connection, member: &RoomUserRow) -> Result<()> {
    conn.execute(
        "INSERT INTO room_users (id, room_id, user_id, muted) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![member.id, member.room_id, member.user_id, member.muted],
    )?;
    Ok(())
}

fn at_stage(stage: RoomCreationStage, source: DbError) -> DbError {
    DbError::RoomCreation {
        stage,
        source: Box::new(source),
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: row.get(0)?,
        email: row.get(1)?,
        password_salt: row.get(2)?,
        password_hash: row.get(3)?,
    })
}

fn room_from_row(row: &Row<'_>) -> rusqlite::Result<RoomRow> {
    let protected: bool = row.get(2)?;
    let salt: Option<String> = row.get(3)?;
    let hash: Option<String> = row.get(4)?;

    let password = match (protected, salt, hash) {
        (true, Some(salt), Some(hash)) => Some(PasswordColumns { salt, hash }),
        _ => None,
    };

    Ok(RoomRow {
        id: row.get(0)?,
        name: row.get(1)?,
        password,
    })
}

fn room_user_from_row(row: &Row<'_>) -> rusqlite::Result<RoomUserRow> {
    Ok(RoomUserRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        user_id: row.get(2)?,
        muted: row.get(3)?,
    })
}

/// Moderator row before the role integer has been checked.
struct RawModerator {
    id: String,
    room_id: String,
    user_id: String,
    role: i64,
}

impl RawModerator {
    fn into_row(self) -> Result<RoomModeratorRow> {
        let role = Role::try_from(self.role).map_err(|e| DbError::CorruptRole(e.0))?;
        Ok(RoomModeratorRow {
            id: self.id,
            room_id: self.room_id,
            user_id: self.user_id,
            role,
        })
    }
}

fn raw_moderator_from_row(row: &Row<'_>) -> rusqlite::Result<RawModerator> {
    Ok(RawModerator {
        id: row.get(0)?,
        room_id: row.get(1)?,
        user_id: row.get(2)?,
        role: row.get(3)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
