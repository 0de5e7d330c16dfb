use std::sync::Arc;

use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use superchat_crypto::password::{hash_password, verify_password};
use superchat_db::models::{PasswordColumns, RoomModeratorRow, RoomRow, RoomUserRow};
use superchat_db::{DbError, Store};
use superchat_types::api::{
    AddModeratorRequest, CreateRoomRequest, CreateRoomResponse, JoinRoomRequest,
    MuteMemberRequest, RenameRoomRequest, ResetRoomPasswordRequest,
};
use superchat_types::models::{Role, Room, RoomModerator, RoomUser, User};
use tracing::{info, warn};
use uuid::Uuid;

use crate::AppState;
use crate::blocking;
use crate::error::{ApiError, Denial};
use crate::middleware::CurrentUser;
use crate::policy::{RoomAction, RoomPolicy};

const MAX_ROOM_NAME_LEN: usize = 255;

/// Room operations. Authorization is delegated to `RoomPolicy` before any write.
#[derive(Clone)]
pub struct RoomService {
    store: Arc<dyn Store>,
    policy: RoomPolicy,
}

impl RoomService {
    pub fn new(store: Arc<dyn Store>, policy: RoomPolicy) -> Self {
        Self { store, policy }
    }

    /// Room, Owner record and membership are written as one unit.
    pub fn create_room(
        &self,
        creator: &User,
        name: &str,
        password: Option<&str>,
    ) -> Result<Room, ApiError> {
        let name = validate_room_name(name)?;

        let room = RoomRow {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            password: hash_room_password(password)?,
        };
        let owner = RoomModeratorRow {
            id: Uuid::new_v4().to_string(),
            room_id: room.id.clone(),
            user_id: creator.id.clone(),
            role: Role::Owner,
        };
        let member = RoomUserRow {
            id: Uuid::new_v4().to_string(),
            room_id: room.id.clone(),
            user_id: creator.id.clone(),
            muted: false,
        };

        if let Err(e) = self.store.create_room(&room, &owner, &member) {
            if let DbError::RoomCreation { stage, .. } = &e {
                warn!(room_id = %room.id, creator = %creator.id, %stage, "Room creation rolled back");
            }
            return Err(e.into());
        }

        info!(room_id = %room.id, creator = %creator.id, "Room created");
        Ok(room.to_room())
    }

    pub fn join_room(
        &self,
        user: &User,
        room_id: &str,
        password: Option<&str>,
    ) -> Result<RoomUser, ApiError> {
        let room = self
            .store
            .room_by_id(room_id)?
            .ok_or(ApiError::NotFound("room"))?;

        if let Some(secret) = &room.password {
            let supplied = password.unwrap_or_default();
            if !verify_password(supplied, &secret.salt, &secret.hash) {
                return Err(Denial::WrongRoomPassword.into());
            }
        }

        if self.store.room_user(room_id, &user.id)?.is_some() {
            return Err(ApiError::invalid("already a member of this room"));
        }

        let member = RoomUserRow {
            id: Uuid::new_v4().to_string(),
            room_id: room_id.to_string(),
            user_id: user.id.clone(),
            muted: false,
        };
        match self.store.insert_room_user(&member) {
            Ok(()) => Ok(member.into()),
            Err(e) if e.is_conflict() => Err(ApiError::invalid("already a member of this room")),
            Err(e) => Err(e.into()),
        }
    }

    pub fn rename_room(&self, acting: &User, room_id: &str, name: &str) -> Result<(), ApiError> {
        self.policy.authorize(room_id, acting, RoomAction::Rename)?;
        let name = validate_room_name(name)?;

        self.store.rename_room(room_id, name)?;
        info!(room_id, by = %acting.id, "Room renamed");
        Ok(())
    }

    /// An empty or absent password removes protection.
    pub fn reset_room_password(
        &self,
        acting: &User,
        room_id: &str,
        password: Option<&str>,
    ) -> Result<(), ApiError> {
        self.policy.authorize(room_id, acting, RoomAction::ResetPassword)?;

        let secret = hash_room_password(password)?;
        self.store.set_room_password(room_id, secret.as_ref())?;
        info!(room_id, by = %acting.id, protected = secret.is_some(), "Room password reset");
        Ok(())
    }

    pub fn delete_room(&self, acting: &User, room_id: &str) -> Result<(), ApiError> {
        self.policy.authorize(room_id, acting, RoomAction::Delete)?;

        self.store.delete_room(room_id)?;
        info!(room_id, by = %acting.id, "Room deleted");
        Ok(())
    }

    pub fn add_moderator(
        &self,
        acting: &User,
        room_id: &str,
        target_user_id: &str,
        raw_role: i64,
    ) -> Result<RoomModerator, ApiError> {
        self.policy
            .add_moderator(room_id, acting, target_user_id, raw_role)
    }

    pub fn remove_moderator(
        &self,
        acting: &User,
        room_id: &str,
        target_user_id: &str,
    ) -> Result<(), ApiError> {
        self.policy
            .authorize(room_id, acting, RoomAction::RemoveModerator)?;

        // A room must not be left without its owner this way.
        if target_user_id == acting.id {
            return Err(ApiError::invalid("an owner cannot remove their own record"));
        }

        if !self.store.delete_moderator(room_id, target_user_id)? {
            return Err(ApiError::NotFound("moderator"));
        }
        info!(room_id, target = target_user_id, by = %acting.id, "Moderator removed");
        Ok(())
    }

    pub fn set_muted(
        &self,
        acting: &User,
        room_id: &str,
        target_user_id: &str,
        muted: bool,
    ) -> Result<(), ApiError> {
        let held = self
            .policy
            .authorize(room_id, acting, RoomAction::MuteMember)?;

        // Only members ranked strictly below the caller can be muted.
        if let Some(target) = self.store.moderator(room_id, target_user_id)? {
            if target.role.satisfies(held) {
                return Err(Denial::TargetOutranks.into());
            }
        }

        if !self.store.set_muted(room_id, target_user_id, muted)? {
            return Err(ApiError::NotFound("member"));
        }
        info!(room_id, target = target_user_id, muted, by = %acting.id, "Member mute changed");
        Ok(())
    }
}

fn validate_room_name(name: &str) -> Result<&str, ApiError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ApiError::invalid("room name is required"));
    }
    if name.chars().count() > MAX_ROOM_NAME_LEN {
        return Err(ApiError::invalid("room name is too long"));
    }
    Ok(name)
}

fn hash_room_password(password: Option<&str>) -> Result<Option<PasswordColumns>, ApiError> {
    match password.filter(|p| !p.is_empty()) {
        Some(p) => {
            let stored = hash_password(p)?;
            Ok(Some(PasswordColumns {
                salt: stored.salt,
                hash: stored.hash,
            }))
        }
        None => Ok(None),
    }
}

// -- Handlers --

pub async fn create_room(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<CreateRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.rooms.clone();
    let room =
        blocking(move || rooms.create_room(&user, &req.name, req.password.as_deref())).await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateRoomResponse { room_id: room.id }),
    ))
}

pub async fn join_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<JoinRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.rooms.clone();
    blocking(move || rooms.join_room(&user, &room_id, req.password.as_deref())).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn rename_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<RenameRoomRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.rooms.clone();
    blocking(move || rooms.rename_room(&user, &room_id, &req.name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn reset_room_password(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ResetRoomPasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.rooms.clone();
    blocking(move || rooms.reset_room_password(&user, &room_id, req.password.as_deref()))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_room(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.rooms.clone();
    blocking(move || rooms.delete_room(&user, &room_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_moderator(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<AddModeratorRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.rooms.clone();
    let moderator =
        blocking(move || rooms.add_moderator(&user, &room_id, &req.user_id, req.role)).await?;
    Ok((StatusCode::CREATED, Json(moderator)))
}

pub async fn remove_moderator(
    State(state): State<AppState>,
    Path((room_id, target_id)): Path<(String, String)>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.rooms.clone();
    blocking(move || rooms.remove_moderator(&user, &room_id, &target_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn set_muted(
    State(state): State<AppState>,
    Path((room_id, target_id)): Path<(String, String)>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<MuteMemberRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let rooms = state.rooms.clone();
    blocking(move || rooms.set_muted(&user, &room_id, &target_id, req.muted)).await?;
    Ok(StatusCode::NO_CONTENT)
}
