use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};

use crate::api::upload::{read_upload_form, validate_media_file, UploadedFile};
use crate::app::{AppState, GallerySettings};
use crate::auth::extract::authorize_owner;
use crate::auth::models::AuthenticatedUser;
use crate::db::gallery_repository::GalleryRepository;
use crate::db::models::{MediaKind, StoryItem, StoryViews};
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::storage::paths::{download_url, gallery_key, upload_filename, GallerySection};

/// Store the blob, then record the story with its expiry.
pub async fn process_upload_story(
    repo: &dyn GalleryRepository,
    storage: &dyn StorageClient,
    settings: &GallerySettings,
    owner_uid: &str,
    file: UploadedFile,
    now: DateTime<Utc>,
) -> Result<StoryItem, AppError> {
    validate_media_file(&file)?;

    let filename = upload_filename(&file.file_name, now);
    let key = gallery_key(owner_uid, GallerySection::Stories, &filename);
    let kind = MediaKind::from_content_type(&file.content_type);

    storage
        .put_object(&key, file.content, &file.content_type)
        .await?;

    let story = StoryItem {
        id: uuid::Uuid::new_v4().to_string(),
        user_id: owner_uid.to_string(),
        filename,
        url: download_url(&settings.public_base_url, &key),
        kind,
        created_at: now,
        expires_at: now + settings.story_ttl,
        views: 0,
    };

    repo.insert_story(&story).await?;
    tracing::info!(user_id = %owner_uid, story_id = %story.id, "Story uploaded");

    Ok(story)
}

/// Live stories of a user, newest first. Lapsed ones are not returned.
pub async fn process_list_stories(
    repo: &dyn GalleryRepository,
    owner_uid: &str,
    now: DateTime<Utc>,
) -> Result<Vec<StoryItem>, AppError> {
    repo.list_stories(owner_uid, Some(now)).await
}

/// Delete the blob first, then the document.
pub async fn process_delete_story(
    repo: &dyn GalleryRepository,
    storage: &dyn StorageClient,
    owner_uid: &str,
    story_id: &str,
) -> Result<(), AppError> {
    let story = repo
        .find_story(owner_uid, story_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Story '{}' not found", story_id)))?;

    let key = gallery_key(owner_uid, GallerySection::Stories, &story.filename);
    storage.delete_object(&key).await?;
    repo.delete_story(owner_uid, story_id).await?;

    tracing::info!(user_id = %owner_uid, story_id = %story_id, "Story deleted");
    Ok(())
}

/// Count one view of a live story.
pub async fn process_record_view(
    repo: &dyn GalleryRepository,
    owner_uid: &str,
    story_id: &str,
    now: DateTime<Utc>,
) -> Result<StoryViews, AppError> {
    let not_found = || AppError::NotFound(format!("Story '{}' not found", story_id));

    let story = repo.find_story(owner_uid, story_id).await?.ok_or_else(not_found)?;
    if !story.is_active_at(now) {
        return Err(not_found());
    }

    let views = repo
        .increment_story_views(owner_uid, story_id)
        .await?
        .ok_or_else(not_found)?;

    Ok(StoryViews {
        id: story_id.to_string(),
        views,
    })
}

/// `GET /api/v1/users/{uid}/stories`
pub async fn list_stories_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(uid): Path<String>,
) -> Result<axum::Json<Vec<StoryItem>>, AppError> {
    let stories = process_list_stories(state.gallery_repo.as_ref(), &uid, Utc::now()).await?;
    Ok(axum::Json(stories))
}

/// `POST /api/v1/users/{uid}/stories`
///
/// Multipart with a single `file` part.
pub async fn upload_story_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(uid): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, axum::Json<StoryItem>), AppError> {
    authorize_owner(state.user_repo.as_ref(), &caller, &uid).await?;
    let file = read_upload_form(multipart).await?.into_single_file()?;

    let story = process_upload_story(
        state.gallery_repo.as_ref(),
        state.storage_client.as_ref(),
        &state.settings,
        &uid,
        file,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, axum::Json(story)))
}

/// `DELETE /api/v1/users/{uid}/stories/{id}`
pub async fn delete_story_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path((uid, story_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    authorize_owner(state.user_repo.as_ref(), &caller, &uid).await?;

    process_delete_story(
        state.gallery_repo.as_ref(),
        state.storage_client.as_ref(),
        &uid,
        &story_id,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/v1/users/{uid}/stories/{id}/views`
pub async fn record_view_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path((uid, story_id)): Path<(String, String)>,
) -> Result<axum::Json<StoryViews>, AppError> {
    let views =
        process_record_view(state.gallery_repo.as_ref(), &uid, &story_id, Utc::now()).await?;
    Ok(axum::Json(views))
}
