use axum::extract::{Multipart, Path, State};
use chrono::{DateTime, Utc};

use crate::api::upload::{read_upload_form, validate_image_file, UploadedFile};
use crate::app::{AppState, GallerySettings};
use crate::auth::extract::authorize_owner;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{ProfileUpdate, UserProfile};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::storage::paths::{avatar_key, download_url};

const MAX_LINKS: usize = 10;

/// Load a profile or fail with `NotFound`.
pub async fn process_get_profile(
    users: &dyn UserRepository,
    uid: &str,
) -> Result<UserProfile, AppError> {
    users
        .find_by_uid(uid)
        .await?
        .map(|record| record.profile)
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", uid)))
}

/// Merge the provided fields into the stored profile.
pub async fn process_update_profile(
    users: &dyn UserRepository,
    uid: &str,
    update: ProfileUpdate,
    now: DateTime<Utc>,
) -> Result<UserProfile, AppError> {
    if let Some(display_name) = &update.display_name {
        if display_name.trim().is_empty() {
            return Err(AppError::BadRequest("Display name cannot be empty".into()));
        }
    }
    if let Some(links) = &update.links {
        if links.len() > MAX_LINKS {
            return Err(AppError::BadRequest(format!(
                "At most {} links are allowed",
                MAX_LINKS
            )));
        }
        if let Some(bad) = links
            .iter()
            .find(|l| !(l.starts_with("https://") || l.starts_with("http://")))
        {
            return Err(AppError::BadRequest(format!("Invalid link '{}'", bad)));
        }
    }

    let mut profile = process_get_profile(users, uid).await?;
    update.apply_to(&mut profile, now);
    users.update_profile(&profile).await?;

    tracing::info!(user_id = %uid, "Profile updated");
    Ok(profile)
}

/// Store an avatar image and point the profile at it.
pub async fn process_upload_avatar(
    users: &dyn UserRepository,
    storage: &dyn StorageClient,
    settings: &GallerySettings,
    uid: &str,
    file: UploadedFile,
    now: DateTime<Utc>,
) -> Result<UserProfile, AppError> {
    validate_image_file(&file)?;

    let key = avatar_key(uid);
    storage
        .put_object(&key, file.content, &file.content_type)
        .await?;

    // Cache-busting query so clients pick up a replaced avatar
    let url = format!(
        "{}?v={}",
        download_url(&settings.public_base_url, &key),
        now.timestamp_millis()
    );

    let update = ProfileUpdate {
        avatar_url: Some(url),
        ..Default::default()
    };
    process_update_profile(users, uid, update, now).await
}

/// `GET /api/v1/users/{uid}/profile`
pub async fn get_profile_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(uid): Path<String>,
) -> Result<axum::Json<UserProfile>, AppError> {
    let profile = process_get_profile(state.user_repo.as_ref(), &uid).await?;
    Ok(axum::Json(profile))
}

/// `PUT /api/v1/users/{uid}/profile`
pub async fn update_profile_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(uid): Path<String>,
    axum::Json(update): axum::Json<ProfileUpdate>,
) -> Result<axum::Json<UserProfile>, AppError> {
    authorize_owner(state.user_repo.as_ref(), &caller, &uid).await?;
    let profile =
        process_update_profile(state.user_repo.as_ref(), &uid, update, Utc::now()).await?;
    Ok(axum::Json(profile))
}

/// `PUT /api/v1/users/{uid}/avatar`
///
/// Multipart with a single image `file`.
pub async fn upload_avatar_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(uid): Path<String>,
    multipart: Multipart,
) -> Result<axum::Json<UserProfile>, AppError> {
    authorize_owner(state.user_repo.as_ref(), &caller, &uid).await?;
    let file = read_upload_form(multipart).await?.into_single_file()?;

    let profile = process_upload_avatar(
        state.user_repo.as_ref(),
        state.storage_client.as_ref(),
        &state.settings,
        &uid,
        file,
        Utc::now(),
    )
    .await?;

    Ok(axum::Json(profile))
}
