use std::sync::Arc;

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use superchat_crypto::password;
use superchat_db::Store;
use superchat_db::models::{PasswordColumns, UserRow};
use superchat_types::api::{
    ChangePasswordRequest, RegisterRequest, RegisterResponse, TokenRequest, TokenResponse,
};
use superchat_types::models::User;
use tracing::{info, warn};
use uuid::Uuid;

use crate::blocking;
use crate::error::{ApiError, AuthFailure};
use crate::middleware::{AuthGuard, CurrentUser};
use crate::policy::RoomPolicy;
use crate::rooms::RoomService;
use crate::session::{IssuedSession, SessionManager};

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub store: Arc<dyn Store>,
    pub sessions: SessionManager,
    pub guard: AuthGuard,
    pub rooms: RoomService,
}

impl AppStateInner {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let sessions = SessionManager::new(store.clone());
        let guard = AuthGuard::new(sessions.clone());
        let rooms = RoomService::new(store.clone(), RoomPolicy::new(store.clone()));
        Self {
            store,
            sessions,
            guard,
            rooms,
        }
    }
}

const MAX_EMAIL_LEN: usize = 255;
const MIN_PASSWORD_LEN: usize = 8;
const MAX_PASSWORD_LEN: usize = 255;

/// Create an account. Emails are unique regardless of case.
pub fn register_user(store: &dyn Store, email: &str, plain: &str) -> Result<User, ApiError> {
    let email = validate_email(email)?;
    validate_password(plain)?;

    if store.user_by_email(email)?.is_some() {
        return Err(ApiError::invalid("couldn't create user"));
    }

    let stored = password::hash_password(plain)?;
    let row = UserRow {
        id: Uuid::new_v4().to_string(),
        email: email.to_string(),
        password_salt: stored.salt,
        password_hash: stored.hash,
    };

    match store.insert_user(&row) {
        Ok(()) => {
            info!(user_id = %row.id, "User registered");
            Ok(row.to_user())
        }
        Err(e) if e.is_conflict() => Err(ApiError::invalid("couldn't create user")),
        Err(e) => Err(e.into()),
    }
}

/// Check credentials and open a fresh session, replacing any previous one.
pub fn login(
    store: &dyn Store,
    sessions: &SessionManager,
    email: &str,
    plain: &str,
) -> Result<IssuedSession, ApiError> {
    let Some(user) = store.user_by_email(email.trim())? else {
        password::verify_against_dummy(plain);
        warn!("Token request for unknown email");
        return Err(AuthFailure::InvalidCredentials.into());
    };

    if !password::verify_password(plain, &user.password_salt, &user.password_hash) {
        warn!(user_id = %user.id, "Token request with wrong password");
        return Err(AuthFailure::InvalidCredentials.into());
    }

    let issued = sessions.issue_session(&user.id)?;
    info!(user_id = %user.id, "Session token issued");
    Ok(issued)
}

pub fn change_password(
    store: &dyn Store,
    user: &User,
    current: &str,
    new: &str,
) -> Result<(), ApiError> {
    validate_password(new)?;

    let row = store
        .user_by_id(&user.id)?
        .ok_or(AuthFailure::NoSuchUser)?;
    if !password::verify_password(current, &row.password_salt, &row.password_hash) {
        return Err(AuthFailure::InvalidCredentials.into());
    }

    let stored = password::hash_password(new)?;
    store.update_user_password(
        &user.id,
        &PasswordColumns {
            salt: stored.salt,
            hash: stored.hash,
        },
    )?;
    info!(user_id = %user.id, "Password changed");
    Ok(())
}

fn validate_email(email: &str) -> Result<&str, ApiError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ApiError::invalid("email is required"));
    }
    if email.len() > MAX_EMAIL_LEN {
        return Err(ApiError::invalid("email is too long"));
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ApiError::invalid("email is invalid")),
    }
}

fn validate_password(plain: &str) -> Result<(), ApiError> {
    let chars = plain.chars().count();
    if chars < MIN_PASSWORD_LEN {
        return Err(ApiError::invalid("password must be at least 8 characters"));
    }
    if chars > MAX_PASSWORD_LEN {
        return Err(ApiError::invalid("password is too long"));
    }
    Ok(())
}

// -- Handlers --

pub async fn ping() -> impl IntoResponse {
    Json(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    let user =
        blocking(move || register_user(store.as_ref(), &req.email, &req.password)).await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse { user_id: user.id }),
    ))
}

pub async fn token(
    State(state): State<AppState>,
    Json(req): Json<TokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let st = state.clone();
    let issued = blocking(move || {
        login(st.store.as_ref(), &st.sessions, &req.email, &req.password)
    })
    .await?;

    Ok(Json(TokenResponse {
        token: issued.token,
        user_id: issued.user_id,
        expires_at: issued.expires_at,
    }))
}

pub async fn update_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let store = state.store.clone();
    blocking(move || {
        change_password(store.as_ref(), &user, &req.current_password, &req.new_password)
    })
    .await?;
    Ok(StatusCode::NO_CONTENT)
}
