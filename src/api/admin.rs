use std::sync::Arc;

use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::app::AppState;
use crate::auth::extract::RequireAdmin;
use crate::auth::models::is_admin_email;
use crate::db::gallery_repository::GalleryRepository;
use crate::db::models::{AdminUser, DeleteUserSummary, PurgeSummary, UserRecord};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::storage::paths::{avatar_key, gallery_key, GallerySection};

/// Response of the disable/enable endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountStatus {
    pub uid: String,
    pub disabled: bool,
}

/// Every non-admin account with its media and story counts, newest first.
pub async fn process_list_users(
    users: &dyn UserRepository,
    gallery: &dyn GalleryRepository,
    admin_email: &str,
) -> Result<Vec<AdminUser>, AppError> {
    let records = users.list_all().await?;

    let rows = records
        .into_iter()
        .filter(|record| !is_admin_email(&record.profile.email, admin_email))
        .map(|record| async move {
            let uid = record.profile.uid.as_str();
            let (media_count, story_count) =
                futures::try_join!(gallery.count_media(uid), gallery.count_stories(uid))?;

            Ok::<_, AppError>(AdminUser {
                uid: record.profile.uid.clone(),
                email: record.profile.email.clone(),
                display_name: record.profile.display_name.clone(),
                media_count,
                story_count,
                created_at: record.profile.created_at,
                disabled: record.disabled,
            })
        });

    let mut rows = try_join_all(rows).await?;
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(rows)
}

async fn load_managed_account(
    users: &dyn UserRepository,
    admin_email: &str,
    uid: &str,
) -> Result<UserRecord, AppError> {
    let record = users
        .find_by_uid(uid)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", uid)))?;

    if is_admin_email(&record.profile.email, admin_email) {
        return Err(AppError::Forbidden(
            "The admin account cannot be modified here".into(),
        ));
    }
    Ok(record)
}

/// Flip the `disabled` flag of an account. Nothing else on the profile changes.
pub async fn process_set_disabled(
    users: &dyn UserRepository,
    admin_email: &str,
    uid: &str,
    disabled: bool,
) -> Result<AccountStatus, AppError> {
    load_managed_account(users, admin_email, uid).await?;
    users.set_disabled(uid, disabled).await?;

    tracing::info!(user_id = %uid, disabled, "Account status changed");
    Ok(AccountStatus {
        uid: uid.to_string(),
        disabled,
    })
}

/// Remove an account and everything it owns.
///
/// Blobs go first, then the media and story documents, then the profile.
/// A failure part-way leaves the profile in place so the call can be retried.
pub async fn process_delete_user_data(
    users: &dyn UserRepository,
    gallery: &dyn GalleryRepository,
    storage: &dyn StorageClient,
    admin_email: &str,
    uid: &str,
) -> Result<DeleteUserSummary, AppError> {
    let record = load_managed_account(users, admin_email, uid).await?;

    let media = gallery.list_media(uid).await?;
    let stories = gallery.list_stories(uid, None).await?;

    let mut keys: Vec<String> = media
        .iter()
        .map(|m| gallery_key(uid, GallerySection::Media, &m.filename))
        .chain(
            stories
                .iter()
                .map(|s| gallery_key(uid, GallerySection::Stories, &s.filename)),
        )
        .collect();
    if record.profile.avatar_url.is_some() {
        keys.push(avatar_key(uid));
    }

    for key in &keys {
        storage.delete_object(key).await?;
    }

    let media_deleted = gallery.delete_all_media(uid).await?;
    let stories_deleted = gallery.delete_all_stories(uid).await?;
    users.delete(uid).await?;

    let summary = DeleteUserSummary {
        uid: uid.to_string(),
        media_deleted,
        stories_deleted,
        blobs_deleted: keys.len() as u64,
    };
    tracing::info!(
        user_id = %uid,
        media = summary.media_deleted,
        stories = summary.stories_deleted,
        blobs = summary.blobs_deleted,
        "User data deleted"
    );
    Ok(summary)
}

/// Delete blob and document of every lapsed story.
///
/// A story whose blob or document cannot be removed is logged and skipped;
/// the next run picks it up again.
pub async fn process_purge_expired_stories(
    gallery: &dyn GalleryRepository,
    storage: &dyn StorageClient,
    now: DateTime<Utc>,
) -> Result<PurgeSummary, AppError> {
    let expired = gallery.list_expired_stories(now).await?;
    let mut stories_purged = 0;

    for story in expired {
        let key = gallery_key(&story.user_id, GallerySection::Stories, &story.filename);
        if let Err(e) = storage.delete_object(&key).await {
            tracing::warn!(story_id = %story.id, error = %e, "Failed to delete expired story blob");
            continue;
        }
        match gallery.delete_story(&story.user_id, &story.id).await {
            Ok(_) => stories_purged += 1,
            Err(e) => {
                tracing::warn!(story_id = %story.id, error = %e, "Failed to delete expired story")
            }
        }
    }

    if stories_purged > 0 {
        tracing::info!(count = stories_purged, "Purged expired stories");
    }
    Ok(PurgeSummary { stories_purged })
}

/// Run the purge every `every` until the runtime shuts down.
pub fn spawn_story_purger(
    gallery: Arc<dyn GalleryRepository>,
    storage: Arc<dyn StorageClient>,
    every: std::time::Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        tracing::info!("Story purger started with interval of {}s", every.as_secs());

        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) =
                process_purge_expired_stories(gallery.as_ref(), storage.as_ref(), Utc::now()).await
            {
                tracing::error!("Error purging expired stories: {}", e);
            }
        }
    })
}

/// `GET /api/v1/admin/users`
pub async fn list_users_handler(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<axum::Json<Vec<AdminUser>>, AppError> {
    let rows = process_list_users(
        state.user_repo.as_ref(),
        state.gallery_repo.as_ref(),
        &state.settings.admin_email,
    )
    .await?;
    Ok(axum::Json(rows))
}

/// `POST /api/v1/admin/users/{uid}/disable`
pub async fn disable_user_handler(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(uid): Path<String>,
) -> Result<axum::Json<AccountStatus>, AppError> {
    let status =
        process_set_disabled(state.user_repo.as_ref(), &state.settings.admin_email, &uid, true)
            .await?;
    Ok(axum::Json(status))
}

/// `POST /api/v1/admin/users/{uid}/enable`
pub async fn enable_user_handler(
    State(state): State<AppState>,
    _admin: RequireAdmin,
    Path(uid): Path<String>,
) -> Result<axum::Json<AccountStatus>, AppError> {
    let status =
        process_set_disabled(state.user_repo.as_ref(), &state.settings.admin_email, &uid, false)
            .await?;
    Ok(axum::Json(status))
}

/// `DELETE /api/v1/admin/users/{uid}`
pub async fn delete_user_handler(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(uid): Path<String>,
) -> Result<axum::Json<DeleteUserSummary>, AppError> {
    tracing::info!(admin = %admin.email, user_id = %uid, "Admin deleting user data");
    let summary = process_delete_user_data(
        state.user_repo.as_ref(),
        state.gallery_repo.as_ref(),
        state.storage_client.as_ref(),
        &state.settings.admin_email,
        &uid,
    )
    .await?;
    Ok(axum::Json(summary))
}

/// `POST /api/v1/admin/stories/purge`
pub async fn purge_stories_handler(
    State(state): State<AppState>,
    _admin: RequireAdmin,
) -> Result<axum::Json<PurgeSummary>, AppError> {
    let summary = process_purge_expired_stories(
        state.gallery_repo.as_ref(),
        state.storage_client.as_ref(),
        Utc::now(),
    )
    .await?;
    Ok(axum::Json(summary))
}
