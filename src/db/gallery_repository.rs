use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{MediaItem, StoryItem};
use crate::error::AppError;

/// Repository trait for the per-user media and story collections.
///
/// This trait allows mocking the database layer in tests.
#[async_trait]
pub trait GalleryRepository: Send + Sync {
    /// Record a new media item.
    async fn insert_media(&self, item: &MediaItem) -> Result<(), AppError>;

    /// All media of a user, most recent upload first.
    async fn list_media(&self, user_id: &str) -> Result<Vec<MediaItem>, AppError>;

    /// Find one media item of a user.
    async fn find_media(&self, user_id: &str, id: &str) -> Result<Option<MediaItem>, AppError>;

    /// Delete one media item. Returns `false` if it did not exist.
    async fn delete_media(&self, user_id: &str, id: &str) -> Result<bool, AppError>;

    /// Number of media documents owned by a user.
    async fn count_media(&self, user_id: &str) -> Result<u64, AppError>;

    /// Delete every media document of a user, returning how many were removed.
    async fn delete_all_media(&self, user_id: &str) -> Result<u64, AppError>;

    /// Record a new story.
    async fn insert_story(&self, item: &StoryItem) -> Result<(), AppError>;

    /// Stories of a user, newest first.
    ///
    /// When `active_at` is given, stories that expired at or before that
    /// instant are left out.
    async fn list_stories(
        &self,
        user_id: &str,
        active_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoryItem>, AppError>;

    /// Find one story of a user, expired or not.
    async fn find_story(&self, user_id: &str, id: &str) -> Result<Option<StoryItem>, AppError>;

    /// Delete one story. Returns `false` if it did not exist.
    async fn delete_story(&self, user_id: &str, id: &str) -> Result<bool, AppError>;

    /// Number of story documents owned by a user, expired ones included.
    async fn count_stories(&self, user_id: &str) -> Result<u64, AppError>;

    /// Delete every story document of a user, returning how many were removed.
    async fn delete_all_stories(&self, user_id: &str) -> Result<u64, AppError>;

    /// Atomically bump the view counter. Returns the new count, or `None`
    /// if the story does not exist.
    async fn increment_story_views(&self, user_id: &str, id: &str)
        -> Result<Option<u64>, AppError>;

    /// Every story, across all users, whose expiry is at or before `now`.
    async fn list_expired_stories(&self, now: DateTime<Utc>) -> Result<Vec<StoryItem>, AppError>;
}

/// MongoDB implementation of the GalleryRepository.
///
/// Media and stories live in two top-level collections keyed by `user_id`.
pub struct MongoGalleryRepository {
    media: mongodb::Collection<mongo::MediaDocument>,
    stories: mongodb::Collection<mongo::StoryDocument>,
}

impl MongoGalleryRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            media: db.collection("media"),
            stories: db.collection("stories"),
        }
    }

    /// Create the listing and expiry indexes. Safe to call on every startup.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::IndexModel;

        self.media
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "uploaded_at": -1 })
                    .build(),
            )
            .await?;

        self.stories
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "user_id": 1, "created_at": -1 })
                    .build(),
            )
            .await?;

        self.stories
            .create_index(IndexModel::builder().keys(doc! { "expires_at": 1 }).build())
            .await?;

        Ok(())
    }
}

#[async_trait]
impl GalleryRepository for MongoGalleryRepository {
    async fn insert_media(&self, item: &MediaItem) -> Result<(), AppError> {
        self.media
            .insert_one(mongo::MediaDocument::from(item.clone()))
            .await?;
        Ok(())
    }

    async fn list_media(&self, user_id: &str) -> Result<Vec<MediaItem>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "uploaded_at": -1 })
            .build();

        let mut cursor = self
            .media
            .find(doc! { "user_id": user_id })
            .with_options(options)
            .await?;

        let mut items = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            items.push(MediaItem::from(item));
        }

        Ok(items)
    }

    async fn find_media(&self, user_id: &str, id: &str) -> Result<Option<MediaItem>, AppError> {
        use mongodb::bson::doc;

        let found = self
            .media
            .find_one(doc! { "_id": id, "user_id": user_id })
            .await?;
        Ok(found.map(MediaItem::from))
    }

    async fn delete_media(&self, user_id: &str, id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .media
            .delete_one(doc! { "_id": id, "user_id": user_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn count_media(&self, user_id: &str) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        Ok(self
            .media
            .count_documents(doc! { "user_id": user_id })
            .await?)
    }

    async fn delete_all_media(&self, user_id: &str) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        let result = self.media.delete_many(doc! { "user_id": user_id }).await?;
        Ok(result.deleted_count)
    }

    async fn insert_story(&self, item: &StoryItem) -> Result<(), AppError> {
        self.stories
            .insert_one(mongo::StoryDocument::from(item.clone()))
            .await?;
        Ok(())
    }

    async fn list_stories(
        &self,
        user_id: &str,
        active_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoryItem>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let mut filter = doc! { "user_id": user_id };
        if let Some(now) = active_at {
            filter.insert(
                "expires_at",
                doc! { "$gt": mongodb::bson::DateTime::from_chrono(now) },
            );
        }

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1 })
            .build();

        let mut cursor = self.stories.find(filter).with_options(options).await?;

        let mut items = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            items.push(StoryItem::from(item));
        }

        Ok(items)
    }

    async fn find_story(&self, user_id: &str, id: &str) -> Result<Option<StoryItem>, AppError> {
        use mongodb::bson::doc;

        let found = self
            .stories
            .find_one(doc! { "_id": id, "user_id": user_id })
            .await?;
        Ok(found.map(StoryItem::from))
    }

    async fn delete_story(&self, user_id: &str, id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .stories
            .delete_one(doc! { "_id": id, "user_id": user_id })
            .await?;
        Ok(result.deleted_count > 0)
    }

    async fn count_stories(&self, user_id: &str) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        Ok(self
            .stories
            .count_documents(doc! { "user_id": user_id })
            .await?)
    }

    async fn delete_all_stories(&self, user_id: &str) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        let result = self.stories.delete_many(doc! { "user_id": user_id }).await?;
        Ok(result.deleted_count)
    }

    async fn increment_story_views(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<u64>, AppError> {
        use mongodb::bson::doc;
        use mongodb::options::{FindOneAndUpdateOptions, ReturnDocument};

        let options = FindOneAndUpdateOptions::builder()
            .return_document(ReturnDocument::After)
            .build();

        let updated = self
            .stories
            .find_one_and_update(
                doc! { "_id": id, "user_id": user_id },
                doc! { "$inc": { "views": 1_i64 } },
            )
            .with_options(options)
            .await?;

        Ok(updated.map(|story| story.views.max(0) as u64))
    }

    async fn list_expired_stories(&self, now: DateTime<Utc>) -> Result<Vec<StoryItem>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let filter = doc! { "expires_at": { "$lte": mongodb::bson::DateTime::from_chrono(now) } };
        let mut cursor = self.stories.find(filter).await?;

        let mut items = Vec::new();
        while let Some(item) = cursor.try_next().await? {
            items.push(StoryItem::from(item));
        }

        Ok(items)
    }
}

/// Persisted shapes. Timestamps are stored as BSON dates so range filters
/// and sorting work server-side.
mod mongo {
    use chrono::{DateTime, Utc};
    use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
    use serde::{Deserialize, Serialize};

    use crate::db::models::{MediaItem, MediaKind, StoryItem};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct MediaDocument {
        #[serde(rename = "_id")]
        pub id: String,
        pub user_id: String,
        pub filename: String,
        pub url: String,
        pub kind: MediaKind,
        pub size: i64,
        #[serde(with = "chrono_datetime_as_bson_datetime")]
        pub uploaded_at: DateTime<Utc>,
        #[serde(default)]
        pub description: Option<String>,
        #[serde(default)]
        pub tags: Vec<String>,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct StoryDocument {
        #[serde(rename = "_id")]
        pub id: String,
        pub user_id: String,
        pub filename: String,
        pub url: String,
        pub kind: MediaKind,
        #[serde(with = "chrono_datetime_as_bson_datetime")]
        pub created_at: DateTime<Utc>,
        #[serde(with = "chrono_datetime_as_bson_datetime")]
        pub expires_at: DateTime<Utc>,
        #[serde(default)]
        pub views: i64,
    }

    impl From<MediaItem> for MediaDocument {
        fn from(m: MediaItem) -> Self {
            Self {
                id: m.id,
                user_id: m.user_id,
                filename: m.filename,
                url: m.url,
                kind: m.kind,
                size: i64::try_from(m.size).unwrap_or(i64::MAX),
                uploaded_at: m.uploaded_at,
                description: m.description,
                tags: m.tags,
            }
        }
    }

    impl From<MediaDocument> for MediaItem {
        fn from(d: MediaDocument) -> Self {
            Self {
                id: d.id,
                user_id: d.user_id,
                filename: d.filename,
                url: d.url,
                kind: d.kind,
                size: d.size.max(0) as u64,
                uploaded_at: d.uploaded_at,
                description: d.description,
                tags: d.tags,
            }
        }
    }

    impl From<StoryItem> for StoryDocument {
        fn from(s: StoryItem) -> Self {
            Self {
                id: s.id,
                user_id: s.user_id,
                filename: s.filename,
                url: s.url,
                kind: s.kind,
                created_at: s.created_at,
                expires_at: s.expires_at,
                views: i64::try_from(s.views).unwrap_or(i64::MAX),
            }
        }
    }

    impl From<StoryDocument> for StoryItem {
        fn from(d: StoryDocument) -> Self {
            Self {
                id: d.id,
                user_id: d.user_id,
                filename: d.filename,
                url: d.url,
                kind: d.kind,
                created_at: d.created_at,
                expires_at: d.expires_at,
                views: d.views.max(0) as u64,
            }
        }
    }
}
