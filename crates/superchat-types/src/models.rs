use std::fmt;

use serde::{Deserialize, Serialize};

/// An authenticated account. Password material never leaves the store layer,
/// so it is absent here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Room {
    pub id: String,
    pub name: String,
    pub password_protected: bool,
}

/// Room-level privilege. Stored as an integer column: `Moderator = 0`, `Owner = 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Moderator,
    Owner,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown role value {0}")]
pub struct UnknownRole(pub i64);

impl Role {
    pub fn as_i64(self) -> i64 {
        match self {
            Role::Moderator => 0,
            Role::Owner => 1,
        }
    }

    /// Whether a holder of `self` may perform an operation demanding `required`.
    /// Owner is a superset of Moderator.
    pub fn satisfies(self, required: Role) -> bool {
        match (self, required) {
            (Role::Owner, Role::Owner) => true,
            (Role::Owner, Role::Moderator) => true,
            (Role::Moderator, Role::Moderator) => true,
            (Role::Moderator, Role::Owner) => false,
        }
    }
}

impl TryFrom<i64> for Role {
    type Error = UnknownRole;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Moderator),
            1 => Ok(Role::Owner),
            other => Err(UnknownRole(other)),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Role::Moderator => "moderator",
            Role::Owner => "owner",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomModerator {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub role: Role,
}

/// Room membership. Not an authorization source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomUser {
    pub id: String,
    pub room_id: String,
    pub user_id: String,
    pub muted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_integer_mapping() {
        assert_eq!(Role::try_from(0), Ok(Role::Moderator));
        assert_eq!(Role::try_from(1), Ok(Role::Owner));
        assert_eq!(Role::try_from(2), Err(UnknownRole(2)));
        assert_eq!(Role::try_from(-1), Err(UnknownRole(-1)));

        for role in [Role::Moderator, Role::Owner] {
            assert_eq!(Role::try_from(role.as_i64()), Ok(role));
        }
    }

    #[test]
    fn owner_is_superset_of_moderator() {
        assert!(Role::Owner.satisfies(Role::Owner));
        assert!(Role::Owner.satisfies(Role::Moderator));
        assert!(Role::Moderator.satisfies(Role::Moderator));
        assert!(!Role::Moderator.satisfies(Role::Owner));
    }
}
