use axum::extract::State;
use axum::http::StatusCode;
use axum_extra::extract::CookieJar;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{AppState, GallerySettings};
use crate::auth::models::{is_admin_email, normalize_email, AuthenticatedUser, Role};
use crate::auth::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::auth::session::{removal_cookie, session_cookie};
use crate::db::models::{UserProfile, UserRecord};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

/// Registration request body.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

/// Login request body.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Returned by register and login.
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub user: AuthenticatedUser,
    pub profile: UserProfile,
}

/// Public sign-up. The admin email is reserved for the seeded account.
pub async fn process_register(
    users: &dyn UserRepository,
    admin_email: &str,
    req: RegisterRequest,
    now: DateTime<Utc>,
) -> Result<UserRecord, AppError> {
    if is_admin_email(&req.email, admin_email) {
        tracing::warn!("Sign-up attempt with the reserved admin email");
        return Err(AppError::Forbidden("This email address is reserved".into()));
    }
    create_account(users, req, now).await
}

/// Validate a registration and create the account.
pub(crate) async fn create_account(
    users: &dyn UserRepository,
    req: RegisterRequest,
    now: DateTime<Utc>,
) -> Result<UserRecord, AppError> {
    let email = normalize_email(&req.email);
    if !email.contains('@') {
        return Err(AppError::BadRequest("A valid email is required".into()));
    }
    if req.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    let display_name = req.display_name.trim();
    if display_name.is_empty() {
        return Err(AppError::BadRequest("Display name is required".into()));
    }

    if users.find_by_email(&email).await?.is_some() {
        return Err(AppError::Conflict(format!(
            "An account for '{}' already exists",
            email
        )));
    }

    let record = UserRecord {
        profile: UserProfile {
            uid: uuid::Uuid::new_v4().to_string(),
            email,
            display_name: display_name.to_string(),
            bio: Some(String::new()),
            avatar_url: None,
            links: vec![],
            created_at: now,
            updated_at: now,
        },
        password_hash: hash_password(&req.password)?,
        disabled: false,
    };

    users.insert(record.clone()).await?;
    tracing::info!(user_id = %record.profile.uid, "User registered");

    Ok(record)
}

/// Check credentials. Disabled accounts are refused even with the right password.
pub async fn process_login(
    users: &dyn UserRepository,
    email: &str,
    password: &str,
) -> Result<UserRecord, AppError> {
    let email = normalize_email(email);
    let invalid = || AppError::Auth("Invalid email or password".into());

    let record = users.find_by_email(&email).await?.ok_or_else(invalid)?;
    if !verify_password(&record.password_hash, password) {
        tracing::debug!(user_id = %record.profile.uid, "Password mismatch");
        return Err(invalid());
    }
    if record.disabled {
        tracing::warn!(user_id = %record.profile.uid, "Login attempt on a disabled account");
        return Err(AppError::Forbidden("This account has been disabled".into()));
    }

    Ok(record)
}

fn start_session(
    state: &AppState,
    jar: CookieJar,
    record: UserRecord,
) -> Result<(CookieJar, axum::Json<SessionResponse>), AppError> {
    let profile = record.profile;
    let token = state
        .sessions
        .issue(&profile.uid, &profile.email, Utc::now())?;
    let jar = jar.add(session_cookie(
        token,
        state.sessions.ttl(),
        state.settings.secure_cookies,
    ));

    let user = authenticated_user(&state.settings, &profile);
    Ok((jar, axum::Json(SessionResponse { user, profile })))
}

fn authenticated_user(settings: &GallerySettings, profile: &UserProfile) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: profile.uid.clone(),
        email: profile.email.clone(),
        role: Role::for_email(&profile.email, &settings.admin_email),
    }
}

/// `POST /api/auth/register`
///
/// Creates the account and signs it in.
pub async fn register_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    axum::Json(req): axum::Json<RegisterRequest>,
) -> Result<(StatusCode, CookieJar, axum::Json<SessionResponse>), AppError> {
    let record = process_register(
        state.user_repo.as_ref(),
        &state.settings.admin_email,
        req,
        Utc::now(),
    )
    .await?;
    let (jar, body) = start_session(&state, jar, record)?;
    Ok((StatusCode::CREATED, jar, body))
}

/// `POST /api/auth/login`
pub async fn login_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    axum::Json(req): axum::Json<LoginRequest>,
) -> Result<(CookieJar, axum::Json<SessionResponse>), AppError> {
    let record = process_login(state.user_repo.as_ref(), &req.email, &req.password).await?;
    tracing::info!(user_id = %record.profile.uid, "User logged in");
    start_session(&state, jar, record)
}

/// `POST /api/auth/logout`
///
/// Clears the session cookie.
pub async fn logout_handler(jar: CookieJar) -> CookieJar {
    jar.remove(removal_cookie())
}

/// `GET /api/auth/me`
pub async fn me_handler(user: AuthenticatedUser) -> axum::Json<AuthenticatedUser> {
    axum::Json(user)
}
