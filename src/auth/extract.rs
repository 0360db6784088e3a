use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::extract::CookieJar;

use crate::app::AppState;
use crate::auth::models::{AuthenticatedUser, Role};
use crate::auth::session::SESSION_COOKIE;
use crate::db::models::UserRecord;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

/// Resolves the caller from the session cookie. Rejects with `401`.
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let cookie = jar
            .get(SESSION_COOKIE)
            .ok_or_else(|| AppError::Auth("Not logged in".into()))?;

        let claims = state.sessions.verify(cookie.value())?;
        let role = Role::for_email(&claims.email, &state.settings.admin_email);

        Ok(AuthenticatedUser {
            user_id: claims.sub,
            email: claims.email,
            role,
        })
    }
}

/// An authenticated caller holding the admin role. Rejects with `403` otherwise.
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthenticatedUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let user = AuthenticatedUser::from_request_parts(parts, state).await?;
        if !user.is_admin() {
            tracing::warn!(user_id = %user.user_id, "Non-admin attempted an admin operation");
            return Err(AppError::Forbidden("Admin access required".into()));
        }
        Ok(RequireAdmin(user))
    }
}

/// Check that `caller` may modify the gallery of `uid`, and load that account.
///
/// Owners of a disabled account are refused; the admin is not.
pub async fn authorize_owner(
    users: &dyn UserRepository,
    caller: &AuthenticatedUser,
    uid: &str,
) -> Result<UserRecord, AppError> {
    if !caller.can_manage(uid) {
        return Err(AppError::Forbidden(
            "You can only modify your own gallery".into(),
        ));
    }

    let record = users
        .find_by_uid(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", uid)))?;

    if record.disabled && !caller.is_admin() {
        return Err(AppError::Forbidden("This account has been disabled".into()));
    }

    Ok(record)
}
