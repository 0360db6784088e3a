use async_trait::async_trait;

use crate::db::models::{UserProfile, UserRecord};
use crate::error::AppError;

/// Repository trait for user accounts.
///
/// This trait allows mocking the database layer in tests.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new account. Fails with `Conflict` if the email is taken.
    async fn insert(&self, user: UserRecord) -> Result<(), AppError>;

    /// Find an account by its identity key.
    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserRecord>, AppError>;

    /// Find an account by its (lower-cased) email.
    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError>;

    /// List every account, newest first.
    async fn list_all(&self) -> Result<Vec<UserRecord>, AppError>;

    /// Overwrite the stored profile of `profile.uid`.
    async fn update_profile(&self, profile: &UserProfile) -> Result<(), AppError>;

    /// Set the `disabled` flag. Nothing else is touched.
    async fn set_disabled(&self, uid: &str, disabled: bool) -> Result<(), AppError>;

    /// Delete the account document. Returns `false` if it did not exist.
    async fn delete(&self, uid: &str) -> Result<bool, AppError>;
}

/// MongoDB implementation of the UserRepository.
pub struct MongoUserRepository {
    collection: mongodb::Collection<mongo::UserDocument>,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }

    /// Create the unique email index. Safe to call on every startup.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let index = IndexModel::builder()
            .keys(doc! { "profile.email": 1 })
            .options(IndexOptions::builder().unique(true).build())
            .build();

        self.collection.create_index(index).await?;
        Ok(())
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, user: UserRecord) -> Result<(), AppError> {
        let email = user.profile.email.clone();
        match self
            .collection
            .insert_one(mongo::UserDocument::from(user))
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if mongo::is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "An account for '{}' already exists",
                email
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserRecord>, AppError> {
        use mongodb::bson::doc;

        let found = self.collection.find_one(doc! { "_id": uid }).await?;
        Ok(found.map(UserRecord::from))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        use mongodb::bson::doc;

        let found = self
            .collection
            .find_one(doc! { "profile.email": email })
            .await?;
        Ok(found.map(UserRecord::from))
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "profile.created_at": -1 })
            .build();

        let mut cursor = self
            .collection
            .find(doc! {})
            .with_options(options)
            .await?;

        let mut users = Vec::new();
        while let Some(user) = cursor.try_next().await? {
            users.push(UserRecord::from(user));
        }

        Ok(users)
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        use mongodb::bson::doc;

        let stored = mongodb::bson::to_bson(&mongo::ProfileDocument::from(profile.clone()))
            .map_err(|e| AppError::Internal(format!("Failed to encode profile: {e}")))?;

        let result = self
            .collection
            .update_one(doc! { "_id": &profile.uid }, doc! { "$set": { "profile": stored } })
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("User '{}' not found", profile.uid)));
        }
        Ok(())
    }

    async fn set_disabled(&self, uid: &str, disabled: bool) -> Result<(), AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .update_one(doc! { "_id": uid }, doc! { "$set": { "disabled": disabled } })
            .await?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!("User '{}' not found", uid)));
        }
        Ok(())
    }

    async fn delete(&self, uid: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self.collection.delete_one(doc! { "_id": uid }).await?;
        Ok(result.deleted_count > 0)
    }
}

/// Persisted shapes. Timestamps are stored as BSON dates so they sort correctly.
mod mongo {
    use chrono::{DateTime, Utc};
    use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
    use serde::{Deserialize, Serialize};

    use crate::db::models::{UserProfile, UserRecord};

    #[derive(Debug, Serialize, Deserialize)]
    pub struct UserDocument {
        #[serde(rename = "_id")]
        pub uid: String,
        pub profile: ProfileDocument,
        pub password_hash: String,
        #[serde(default)]
        pub disabled: bool,
    }

    #[derive(Debug, Serialize, Deserialize)]
    pub struct ProfileDocument {
        pub email: String,
        pub display_name: String,
        #[serde(default)]
        pub bio: Option<String>,
        #[serde(default)]
        pub avatar_url: Option<String>,
        #[serde(default)]
        pub links: Vec<String>,
        #[serde(with = "chrono_datetime_as_bson_datetime")]
        pub created_at: DateTime<Utc>,
        #[serde(with = "chrono_datetime_as_bson_datetime")]
        pub updated_at: DateTime<Utc>,
    }

    impl From<UserProfile> for ProfileDocument {
        fn from(p: UserProfile) -> Self {
            Self {
                email: p.email,
                display_name: p.display_name,
                bio: p.bio,
                avatar_url: p.avatar_url,
                links: p.links,
                created_at: p.created_at,
                updated_at: p.updated_at,
            }
        }
    }

    impl From<UserRecord> for UserDocument {
        fn from(user: UserRecord) -> Self {
            Self {
                uid: user.profile.uid.clone(),
                profile: ProfileDocument::from(user.profile),
                password_hash: user.password_hash,
                disabled: user.disabled,
            }
        }
    }

    impl From<UserDocument> for UserRecord {
        fn from(d: UserDocument) -> Self {
            Self {
                profile: UserProfile {
                    uid: d.uid,
                    email: d.profile.email,
                    display_name: d.profile.display_name,
                    bio: d.profile.bio,
                    avatar_url: d.profile.avatar_url,
                    links: d.profile.links,
                    created_at: d.profile.created_at,
                    updated_at: d.profile.updated_at,
                },
                password_hash: d.password_hash,
                disabled: d.disabled,
            }
        }
    }

    /// MongoDB reports unique index violations with code 11000.
    pub fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
        use mongodb::error::{ErrorKind, WriteFailure};

        matches!(
            err.kind.as_ref(),
            ErrorKind::Write(WriteFailure::WriteError(write_err)) if write_err.code == 11000
        )
    }
}
