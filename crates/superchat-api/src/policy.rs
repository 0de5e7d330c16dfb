//! Room-level access control.
//!
//! Every room-mutating handler goes through `RoomPolicy`; nothing else
//! interprets a moderator record's role.

use std::sync::Arc;

use superchat_db::Store;
use superchat_db::models::RoomModeratorRow;
use superchat_types::models::{Role, RoomModerator, User};
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, Denial};

/// Room mutations that need a moderator record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomAction {
    Rename,
    ResetPassword,
    Delete,
    AddModerator,
    RemoveModerator,
    MuteMember,
}

impl RoomAction {
    pub fn required_role(self) -> Role {
        match self {
            RoomAction::Rename
            | RoomAction::ResetPassword
            | RoomAction::Delete
            | RoomAction::RemoveModerator => Role::Owner,
            RoomAction::AddModerator | RoomAction::MuteMember => Role::Moderator,
        }
    }
}

#[derive(Clone)]
pub struct RoomPolicy {
    store: Arc<dyn Store>,
}

impl RoomPolicy {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn authorize(&self, room_id: &str, acting: &User, action: RoomAction) -> Result<Role, ApiError> {
        self.authorize_room_mutation(room_id, acting, action.required_role())
    }

    /// Allow `acting` if its record in `room_id` satisfies `required`.
    /// Returns the role the user actually holds.
    pub fn authorize_room_mutation(
        &self,
        room_id: &str,
        acting: &User,
        required: Role,
    ) -> Result<Role, ApiError> {
        if self.store.room_by_id(room_id)?.is_none() {
            return Err(ApiError::NotFound("room"));
        }

        let record = self
            .store
            .moderator(room_id, &acting.id)?
            .ok_or(Denial::NotAModerator)?;

        if !record.role.satisfies(required) {
            return Err(Denial::NotOwner.into());
        }
        Ok(record.role)
    }

    /// Grant `raw_role` in `room_id` to `target_user_id`.
    ///
    /// Any moderator may add a Moderator; only an Owner may grant Owner. The
    /// caller is authorized before the role value is looked at. The absence
    /// check races with concurrent grants, so a uniqueness violation from the
    /// store is reported the same way as an existing record.
    pub fn add_moderator(
        &self,
        room_id: &str,
        acting: &User,
        target_user_id: &str,
        raw_role: i64,
    ) -> Result<RoomModerator, ApiError> {
        let held = self.authorize(room_id, acting, RoomAction::AddModerator)?;

        let role = Role::try_from(raw_role).map_err(|_| Denial::InvalidRole)?;
        if !held.satisfies(role) {
            return Err(Denial::NotOwner.into());
        }

        if self.store.user_by_id(target_user_id)?.is_none() {
            return Err(Denial::NoSuchUser.into());
        }
        if self.store.moderator(room_id, target_user_id)?.is_some() {
            return Err(Denial::AlreadyModerator.into());
        }

        let row = RoomModeratorRow {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            user_id: target_user_id.to_string(),
            role,
        };

        match self.store.insert_moderator(&row) {
            Ok(()) => {
                info!(room_id, target = target_user_id, %role, by = %acting.id, "Moderator added");
                Ok(row.into())
            }
            Err(e) if e.is_conflict() => Err(Denial::AlreadyModerator.into()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use superchat_db::Database;
    use superchat_db::models::{RoomRow, RoomUserRow, UserRow};

    struct Fixture {
        db: Arc<Database>,
        policy: RoomPolicy,
        owner: User,
        moderator: User,
        outsider: User,
    }

    fn add_user(db: &Database, id: &str) -> User {
        let row = UserRow {
            id: id.into(),
            email: format!("{id}@example.com"),
            password_salt: "s".into(),
            password_hash: "h".into(),
        };
        db.insert_user(&row).unwrap();
        row.to_user()
    }

    fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let owner = add_user(&db, "owner");
        let moderator = add_user(&db, "moderator");
        let outsider = add_user(&db, "outsider");

        db.create_room(
            &RoomRow {
                id: "r1".into(),
                name: "lobby".into(),
                password: None,
            },
            &RoomModeratorRow {
                id: "m1".into(),
                room_id: "r1".into(),
                user_id: owner.id.clone(),
                role: Role::Owner,
            },
            &RoomUserRow {
                id: "ru1".into(),
                room_id: "r1".into(),
                user_id: owner.id.clone(),
                muted: false,
            },
        )
        .unwrap();
        db.insert_moderator(&RoomModeratorRow {
            id: "m2".into(),
            room_id: "r1".into(),
            user_id: moderator.id.clone(),
            role: Role::Moderator,
        })
        .unwrap();

        let policy = RoomPolicy::new(db.clone());
        Fixture {
            db,
            policy,
            owner,
            moderator,
            outsider,
        }
    }

    fn denial(result: Result<impl std::fmt::Debug, ApiError>) -> Denial {
        match result {
            Err(ApiError::Forbidden(d)) => d,
            other => panic!("expected forbidden, got {other:?}"),
        }
    }

    #[test]
    fn owner_only_actions() {
        let f = fixture();

        for action in [
            RoomAction::Rename,
            RoomAction::ResetPassword,
            RoomAction::Delete,
            RoomAction::RemoveModerator,
        ] {
            assert_eq!(f.policy.authorize("r1", &f.owner, action).unwrap(), Role::Owner);
            assert_eq!(
                denial(f.policy.authorize("r1", &f.moderator, action)),
                Denial::NotOwner
            );
            assert_eq!(
                denial(f.policy.authorize("r1", &f.outsider, action)),
                Denial::NotAModerator
            );
        }
    }

    #[test]
    fn moderator_actions() {
        let f = fixture();

        for action in [RoomAction::AddModerator, RoomAction::MuteMember] {
            assert!(f.policy.authorize("r1", &f.owner, action).is_ok());
            assert_eq!(
                f.policy.authorize("r1", &f.moderator, action).unwrap(),
                Role::Moderator
            );
            assert_eq!(
                denial(f.policy.authorize("r1", &f.outsider, action)),
                Denial::NotAModerator
            );
        }
    }

    #[test]
    fn unknown_room_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.policy.authorize("nope", &f.owner, RoomAction::Rename),
            Err(ApiError::NotFound("room"))
        ));
    }

    #[test]
    fn moderator_can_add_moderator() {
        let f = fixture();

        let added = f
            .policy
            .add_moderator("r1", &f.moderator, &f.outsider.id, Role::Moderator.as_i64())
            .unwrap();
        assert_eq!(added.role, Role::Moderator);
        assert_eq!(added.user_id, f.outsider.id);
        assert_eq!(f.db.moderators_for_room("r1").unwrap().len(), 3);
    }

    #[test]
    fn only_owner_grants_owner() {
        let f = fixture();

        assert_eq!(
            denial(f.policy.add_moderator("r1", &f.moderator, &f.outsider.id, 1)),
            Denial::NotOwner
        );
        let added = f
            .policy
            .add_moderator("r1", &f.owner, &f.outsider.id, 1)
            .unwrap();
        assert_eq!(added.role, Role::Owner);
    }

    #[test]
    fn duplicate_moderator_is_rejected() {
        let f = fixture();

        f.policy
            .add_moderator("r1", &f.owner, &f.outsider.id, 0)
            .unwrap();
        assert_eq!(
            denial(f.policy.add_moderator("r1", &f.owner, &f.outsider.id, 0)),
            Denial::AlreadyModerator
        );
        assert_eq!(
            denial(f.policy.add_moderator("r1", &f.owner, &f.moderator.id, 0)),
            Denial::AlreadyModerator
        );
    }

    #[test]
    fn invalid_role_values_are_rejected() {
        let f = fixture();

        for raw in [-1, 2, 42] {
            assert_eq!(
                denial(f.policy.add_moderator("r1", &f.owner, &f.outsider.id, raw)),
                Denial::InvalidRole
            );
        }
    }

    #[test]
    fn outsider_cannot_add_moderator() {
        let f = fixture();
        assert_eq!(
            denial(f.policy.add_moderator("r1", &f.outsider, &f.outsider.id, 0)),
            Denial::NotAModerator
        );
    }

    #[test]
    fn outsider_learns_nothing_about_role_values() {
        let f = fixture();

        for raw in [-1, 0, 1, 2, 7] {
            assert_eq!(
                denial(f.policy.add_moderator("r1", &f.outsider, &f.moderator.id, raw)),
                Denial::NotAModerator
            );
        }
    }

    #[test]
    fn unknown_target_is_not_found() {
        let f = fixture();
        assert!(matches!(
            f.policy.add_moderator("r1", &f.owner, "ghost", 0),
            Err(ApiError::NotFound("user"))
        ));
    }

    /// Hides existing moderator records from the absence check, as if a
    /// concurrent grant committed between the check and the insert.
    struct RacingStore(Arc<Database>);

    impl Store for RacingStore {
        fn insert_user(&self, user: &UserRow) -> superchat_db::Result<()> {
            self.0.insert_user(user)
        }
        fn user_by_id(&self, id: &str) -> superchat_db::Result<Option<UserRow>> {
            self.0.user_by_id(id)
        }
        fn user_by_email(&self, email: &str) -> superchat_db::Result<Option<UserRow>> {
            self.0.user_by_email(email)
        }
        fn update_user_password(
            &self,
            id: &str,
            password: &superchat_db::models::PasswordColumns,
        ) -> superchat_db::Result<()> {
            self.0.update_user_password(id, password)
        }
        fn session_for_user(
            &self,
            user_id: &str,
        ) -> superchat_db::Result<Option<superchat_db::models::SessionRow>> {
            self.0.session_for_user(user_id)
        }
        fn upsert_session(&self, session: &superchat_db::models::SessionRow) -> superchat_db::Result<()> {
            self.0.upsert_session(session)
        }
        fn room_by_id(&self, id: &str) -> superchat_db::Result<Option<RoomRow>> {
            self.0.room_by_id(id)
        }
        fn create_room(
            &self,
            room: &RoomRow,
            owner: &RoomModeratorRow,
            member: &RoomUserRow,
        ) -> superchat_db::Result<()> {
            self.0.create_room(room, owner, member)
        }
        fn rename_room(&self, id: &str, name: &str) -> superchat_db::Result<()> {
            self.0.rename_room(id, name)
        }
        fn set_room_password(
            &self,
            id: &str,
            password: Option<&superchat_db::models::PasswordColumns>,
        ) -> superchat_db::Result<()> {
            self.0.set_room_password(id, password)
        }
        fn delete_room(&self, id: &str) -> superchat_db::Result<()> {
            self.0.delete_room(id)
        }
        fn moderator(&self, room_id: &str, user_id: &str) -> superchat_db::Result<Option<RoomModeratorRow>> {
            // The acting user's record stays visible.
            match self.0.moderator(room_id, user_id)? {
                Some(m) if m.role == Role::Owner => Ok(Some(m)),
                _ => Ok(None),
            }
        }
        fn moderators_for_room(&self, room_id: &str) -> superchat_db::Result<Vec<RoomModeratorRow>> {
            self.0.moderators_for_room(room_id)
        }
        fn insert_moderator(&self, moderator: &RoomModeratorRow) -> superchat_db::Result<()> {
            self.0.insert_moderator(moderator)
        }
        fn delete_moderator(&self, room_id: &str, user_id: &str) -> superchat_db::Result<bool> {
            self.0.delete_moderator(room_id, user_id)
        }
        fn room_user(&self, room_id: &str, user_id: &str) -> superchat_db::Result<Option<RoomUserRow>> {
            self.0.room_user(room_id, user_id)
        }
        fn members_of_room(&self, room_id: &str) -> superchat_db::Result<Vec<RoomUserRow>> {
            self.0.members_of_room(room_id)
        }
        fn insert_room_user(&self, member: &RoomUserRow) -> superchat_db::Result<()> {
            self.0.insert_room_user(member)
        }
        fn set_muted(&self, room_id: &str, user_id: &str, muted: bool) -> superchat_db::Result<bool> {
            self.0.set_muted(room_id, user_id, muted)
        }
    }

    #[test]
    fn lost_race_is_reported_as_already_moderator() {
        let f = fixture();
        let racing = RoomPolicy::new(Arc::new(RacingStore(f.db.clone())));

        // `moderator` already holds a record; the store's unique index catches it.
        assert_eq!(
            denial(racing.add_moderator("r1", &f.owner, &f.moderator.id, 0)),
            Denial::AlreadyModerator
        );
        assert_eq!(f.db.moderators_for_room("r1").unwrap().len(), 2);
    }
}
