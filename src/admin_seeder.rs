use chrono::Utc;

use crate::auth::handlers::{create_account, RegisterRequest};
use crate::auth::models::normalize_email;
use crate::config::AdminConfig;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

/// Create the admin account on startup when `admin.password` is configured.
///
/// An existing account is left untouched, so a changed password in the
/// config does not overwrite one set later. Returns whether an account was
/// created.
pub async fn seed_admin_account(
    users: &dyn UserRepository,
    config: &AdminConfig,
) -> Result<bool, AppError> {
    let Some(password) = &config.password else {
        tracing::info!("No admin password configured, skipping admin seeding");
        return Ok(false);
    };

    let email = normalize_email(&config.email);
    if users.find_by_email(&email).await?.is_some() {
        tracing::info!("Admin account '{}' already exists, skipping.", email);
        return Ok(false);
    }

    let request = RegisterRequest {
        email,
        password: password.clone(),
        display_name: "Administrator".to_string(),
    };
    let record = create_account(users, request, Utc::now()).await?;
    tracing::info!(user_id = %record.profile.uid, "Admin account created");

    Ok(true)
}
