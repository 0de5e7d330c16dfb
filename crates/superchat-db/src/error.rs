use std::fmt;

use rusqlite::ErrorCode;
use rusqlite::ffi;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A UNIQUE or PRIMARY KEY constraint rejected the write.
    #[error("unique constraint violated: {0}")]
    Conflict(String),

    /// Room creation is all-or-nothing; the transaction was rolled back.
    #[error("room creation failed at {stage}: {source}")]
    RoomCreation {
        stage: RoomCreationStage,
        #[source]
        source: Box<DbError>,
    },

    #[error("stored role value {0} is not a known role")]
    CorruptRole(i64),

    #[error("database lock poisoned")]
    LockPoisoned,

    #[error(transparent)]
    Sqlite(rusqlite::Error),
}

impl DbError {
    pub fn is_conflict(&self) -> bool {
        match self {
            DbError::Conflict(_) => true,
            DbError::RoomCreation { source, .. } => source.is_conflict(),
            _ => false,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(err, msg)
                if err.code == ErrorCode::ConstraintViolation
                    && (err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                        || err.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY) =>
            {
                DbError::Conflict(msg.clone().unwrap_or_else(|| err.to_string()))
            }
            _ => DbError::Sqlite(e),
        }
    }
}

/// Which of the three room-creation writes failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomCreationStage {
    Room,
    OwnerRecord,
    Membership,
}

impl fmt::Display for RoomCreationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RoomCreationStage::Room => "room",
            RoomCreationStage::OwnerRecord => "owner record",
            RoomCreationStage::Membership => "membership",
        };
        write!(f, "{}", s)
    }
}
