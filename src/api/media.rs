use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};

use crate::api::upload::{read_upload_form, validate_media_file, UploadForm};
use crate::app::{AppState, GallerySettings};
use crate::auth::extract::authorize_owner;
use crate::auth::models::AuthenticatedUser;
use crate::db::gallery_repository::GalleryRepository;
use crate::db::models::{MediaItem, MediaKind};
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::storage::paths::{download_url, gallery_key, upload_filename, GallerySection};

/// Core upload logic, separated from the HTTP layer for testability.
///
/// Every file is validated before anything is written. Each blob is stored
/// before the document that references it.
pub async fn process_upload_media(
    repo: &dyn GalleryRepository,
    storage: &dyn StorageClient,
    settings: &GallerySettings,
    owner_uid: &str,
    form: UploadForm,
    now: DateTime<Utc>,
) -> Result<Vec<MediaItem>, AppError> {
    if form.files.is_empty() {
        return Err(AppError::BadRequest("No file field found in request".into()));
    }
    for file in &form.files {
        validate_media_file(file)?;
    }

    let mut items = Vec::with_capacity(form.files.len());

    for file in form.files {
        let filename = upload_filename(&file.file_name, now);
        let key = gallery_key(owner_uid, GallerySection::Media, &filename);
        let size = file.content.len() as u64;
        let kind = MediaKind::from_content_type(&file.content_type);

        storage
            .put_object(&key, file.content, &file.content_type)
            .await?;

        let item = MediaItem {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: owner_uid.to_string(),
            filename,
            url: download_url(&settings.public_base_url, &key),
            kind,
            size,
            uploaded_at: now,
            description: form.description.clone(),
            tags: form.tags.clone(),
        };

        repo.insert_media(&item).await?;
        tracing::info!(user_id = %owner_uid, media_id = %item.id, size, "Media uploaded");
        items.push(item);
    }

    Ok(items)
}

/// Delete the blob first, then the document.
///
/// A missing blob is not an error, so retrying after a partial failure converges.
pub async fn process_delete_media(
    repo: &dyn GalleryRepository,
    storage: &dyn StorageClient,
    owner_uid: &str,
    media_id: &str,
) -> Result<(), AppError> {
    let item = repo
        .find_media(owner_uid, media_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Media '{}' not found", media_id)))?;

    let key = gallery_key(owner_uid, GallerySection::Media, &item.filename);
    storage.delete_object(&key).await?;
    repo.delete_media(owner_uid, media_id).await?;

    tracing::info!(user_id = %owner_uid, media_id = %media_id, "Media deleted");
    Ok(())
}

/// `GET /api/v1/users/{uid}/media`
///
/// Newest first.
pub async fn list_media_handler(
    State(state): State<AppState>,
    _caller: AuthenticatedUser,
    Path(uid): Path<String>,
) -> Result<axum::Json<Vec<MediaItem>>, AppError> {
    let items = state.gallery_repo.list_media(&uid).await?;
    Ok(axum::Json(items))
}

/// `POST /api/v1/users/{uid}/media`
///
/// Multipart with one or more `file` parts.
pub async fn upload_media_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path(uid): Path<String>,
    multipart: Multipart,
) -> Result<(StatusCode, axum::Json<Vec<MediaItem>>), AppError> {
    authorize_owner(state.user_repo.as_ref(), &caller, &uid).await?;
    let form = read_upload_form(multipart).await?;

    let items = process_upload_media(
        state.gallery_repo.as_ref(),
        state.storage_client.as_ref(),
        &state.settings,
        &uid,
        form,
        Utc::now(),
    )
    .await?;

    Ok((StatusCode::CREATED, axum::Json(items)))
}

/// `DELETE /api/v1/users/{uid}/media/{id}`
pub async fn delete_media_handler(
    State(state): State<AppState>,
    caller: AuthenticatedUser,
    Path((uid, media_id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    authorize_owner(state.user_repo.as_ref(), &caller, &uid).await?;

    process_delete_media(
        state.gallery_repo.as_ref(),
        state.storage_client.as_ref(),
        &uid,
        &media_id,
    )
    .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::upload::file;
    use crate::test_support::{InMemoryGalleryRepo, InMemoryStorage, MockStorage};
    use chrono::Duration;

    fn form_with(files: Vec<crate::api::upload::UploadedFile>) -> UploadForm {
        UploadForm {
            files,
            description: None,
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn test_upload_n_files_yields_n_records() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();
        let settings = GallerySettings::default();

        let form = UploadForm {
            files: vec![
                file("beach.jpg", "image/jpeg", b"jpeg-bytes"),
                file("surf.mp4", "video/mp4", b"mp4-bytes"),
                file("dog.png", "image/png", b"png"),
            ],
            description: Some("Holidays".to_string()),
            tags: vec!["summer".to_string()],
        };

        let items = process_upload_media(&repo, &storage, &settings, "u1", form, Utc::now())
            .await
            .unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(repo.count_media("u1").await.unwrap(), 3);
        assert_eq!(storage.len(), 3);

        for item in &items {
            assert!(!item.url.is_empty());
            assert!(item.url.ends_with(&item.filename));
            assert_eq!(item.description.as_deref(), Some("Holidays"));
            assert_eq!(item.tags, vec!["summer"]);
            assert!(storage.contains(&gallery_key("u1", GallerySection::Media, &item.filename)));
        }

        assert_eq!(items[0].kind, MediaKind::Image);
        assert_eq!(items[1].kind, MediaKind::Video);
        assert_eq!(items[2].kind, MediaKind::Image);
        assert_eq!(items[0].size, 10);
    }

    #[tokio::test]
    async fn test_upload_keeps_content_type_on_blob() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();

        let items = process_upload_media(
            &repo,
            &storage,
            &GallerySettings::default(),
            "u1",
            form_with(vec![file("clip.webm", "video/webm", b"webm")]),
            Utc::now(),
        )
        .await
        .unwrap();

        let key = gallery_key("u1", GallerySection::Media, &items[0].filename);
        let stored = storage.get_object(&key).await.unwrap().unwrap();
        assert_eq!(stored.content_type.as_deref(), Some("video/webm"));
        assert_eq!(stored.content, b"webm");
    }

    #[tokio::test]
    async fn test_same_name_in_one_batch_gets_distinct_keys() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();

        let items = process_upload_media(
            &repo,
            &storage,
            &GallerySettings::default(),
            "u1",
            form_with(vec![
                file("IMG_0001.jpg", "image/jpeg", b"a"),
                file("IMG_0001.jpg", "image/jpeg", b"b"),
            ]),
            Utc::now(),
        )
        .await
        .unwrap();

        assert_ne!(items[0].filename, items[1].filename);
        assert_eq!(storage.len(), 2);
    }

    #[tokio::test]
    async fn test_same_name_in_separate_requests_keeps_both_blobs() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();
        let settings = GallerySettings::default();
        let now = Utc::now();

        let mut items = vec![];
        for content in [b"first", b"again"] {
            let uploaded = process_upload_media(
                &repo,
                &storage,
                &settings,
                "u1",
                form_with(vec![file("IMG_0001.jpg", "image/jpeg", content)]),
                now,
            )
            .await
            .unwrap();
            items.extend(uploaded);
        }

        assert_ne!(items[0].filename, items[1].filename);
        assert_eq!(storage.len(), 2);

        process_delete_media(&repo, &storage, "u1", &items[0].id)
            .await
            .unwrap();
        let kept = gallery_key("u1", GallerySection::Media, &items[1].filename);
        assert_eq!(storage.get_object(&kept).await.unwrap().unwrap().content, b"again");
    }

    #[tokio::test]
    async fn test_invalid_file_rejects_whole_batch() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();

        let result = process_upload_media(
            &repo,
            &storage,
            &GallerySettings::default(),
            "u1",
            form_with(vec![
                file("ok.png", "image/png", b"png"),
                file("notes.txt", "text/plain", b"hello"),
            ]),
            Utc::now(),
        )
        .await;

        match result {
            Err(AppError::BadRequest(msg)) => assert!(msg.contains("notes.txt")),
            other => panic!("Expected BadRequest error, got: {:?}", other),
        }
        assert_eq!(storage.len(), 0);
        assert_eq!(repo.count_media("u1").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upload_without_files() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();

        let result = process_upload_media(
            &repo,
            &storage,
            &GallerySettings::default(),
            "u1",
            form_with(vec![]),
            Utc::now(),
        )
        .await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();
        let settings = GallerySettings::default();
        let t0 = Utc::now();

        for (i, name) in ["first.png", "second.png", "third.png"].iter().enumerate() {
            process_upload_media(
                &repo,
                &storage,
                &settings,
                "u1",
                form_with(vec![file(name, "image/png", b"x")]),
                t0 + Duration::seconds(i as i64),
            )
            .await
            .unwrap();
        }

        let listed = repo.list_media("u1").await.unwrap();
        let names: Vec<&str> = listed.iter().map(|m| m.filename.as_str()).collect();
        assert!(names[0].ends_with("third.png"));
        assert!(names[2].ends_with("first.png"));
    }

    #[tokio::test]
    async fn test_delete_removes_blob_and_listing() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();

        let items = process_upload_media(
            &repo,
            &storage,
            &GallerySettings::default(),
            "u1",
            form_with(vec![
                file("keep.png", "image/png", b"k"),
                file("drop.png", "image/png", b"d"),
            ]),
            Utc::now(),
        )
        .await
        .unwrap();

        process_delete_media(&repo, &storage, "u1", &items[1].id)
            .await
            .unwrap();

        let listed = repo.list_media("u1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, items[0].id);
        assert!(!storage.contains(&gallery_key("u1", GallerySection::Media, &items[1].filename)));
        assert!(storage.contains(&gallery_key("u1", GallerySection::Media, &items[0].filename)));
    }

    #[tokio::test]
    async fn test_delete_unknown_media() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();

        match process_delete_media(&repo, &storage, "u1", "missing").await {
            Err(AppError::NotFound(_)) => {}
            other => panic!("Expected NotFound, got: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_of_other_users_media_is_not_found() {
        let repo = InMemoryGalleryRepo::new();
        let storage = InMemoryStorage::new();

        let items = process_upload_media(
            &repo,
            &storage,
            &GallerySettings::default(),
            "u1",
            form_with(vec![file("mine.png", "image/png", b"m")]),
            Utc::now(),
        )
        .await
        .unwrap();

        let result = process_delete_media(&repo, &storage, "u2", &items[0].id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
        assert_eq!(repo.count_media("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blob_delete_failure_keeps_document() {
        let repo = InMemoryGalleryRepo::new();
        let settings = GallerySettings::default();

        let mut storage = MockStorage::new();
        storage.expect_put_object().returning(|_, _, _| Ok(()));
        storage
            .expect_delete_object()
            .times(1)
            .returning(|key| Err(AppError::Storage(format!("Failed to delete object '{key}'"))));

        let items = process_upload_media(
            &repo,
            &storage,
            &settings,
            "u1",
            form_with(vec![file("a.png", "image/png", b"a")]),
            Utc::now(),
        )
        .await
        .unwrap();

        let result = process_delete_media(&repo, &storage, "u1", &items[0].id).await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        // Document is still there so the user can retry
        assert_eq!(repo.count_media("u1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_blob_put_failure_writes_no_document() {
        let repo = InMemoryGalleryRepo::new();

        let mut storage = MockStorage::new();
        storage
            .expect_put_object()
            .returning(|_, _, _| Err(AppError::Storage("bucket unavailable".into())));

        let result = process_upload_media(
            &repo,
            &storage,
            &GallerySettings::default(),
            "u1",
            form_with(vec![file("a.png", "image/png", b"a")]),
            Utc::now(),
        )
        .await;

        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(repo.count_media("u1").await.unwrap(), 0);
    }
}
