//! In-memory implementations of the repository and storage traits for unit
//! tests, plus a mockall storage for failure paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::gallery_repository::GalleryRepository;
use crate::db::models::{MediaItem, StoryItem, UserProfile, UserRecord};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::storage::client::{StorageClient, StoredObject};

pub fn sample_user(uid: &str, email: &str) -> UserRecord {
    let now = Utc::now();
    UserRecord {
        profile: UserProfile {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: format!("User {uid}"),
            bio: Some(String::new()),
            avatar_url: None,
            links: vec![],
            created_at: now,
            updated_at: now,
        },
        password_hash: String::new(),
        disabled: false,
    }
}

mockall::mock! {
    pub Storage {}

    #[async_trait]
    impl StorageClient for Storage {
        async fn put_object(&self, key: &str, content: Vec<u8>, content_type: &str) -> Result<(), AppError>;
        async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, AppError>;
        async fn delete_object(&self, key: &str) -> Result<(), AppError>;
    }
}

pub struct InMemoryStorage {
    pub objects: Mutex<HashMap<String, StoredObject>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.lock().unwrap().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }
}

#[async_trait]
impl StorageClient for InMemoryStorage {
    async fn put_object(
        &self,
        key: &str,
        content: Vec<u8>,
        content_type: &str,
    ) -> Result<(), AppError> {
        self.objects.lock().unwrap().insert(
            key.to_string(),
            StoredObject {
                content,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Option<StoredObject>, AppError> {
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn delete_object(&self, key: &str) -> Result<(), AppError> {
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

pub struct InMemoryUserRepo {
    pub users: Mutex<Vec<UserRecord>>,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl UserRepository for InMemoryUserRepo {
    async fn insert(&self, user: UserRecord) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        if users.iter().any(|u| u.profile.email == user.profile.email) {
            return Err(AppError::Conflict(format!(
                "An account for '{}' already exists",
                user.profile.email
            )));
        }
        users.push(user);
        Ok(())
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.profile.uid == uid)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRecord>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.profile.email == email)
            .cloned())
    }

    async fn list_all(&self) -> Result<Vec<UserRecord>, AppError> {
        let mut users = self.users.lock().unwrap().clone();
        users.sort_by(|a, b| b.profile.created_at.cmp(&a.profile.created_at));
        Ok(users)
    }

    async fn update_profile(&self, profile: &UserProfile) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.profile.uid == profile.uid)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", profile.uid)))?;
        user.profile = profile.clone();
        Ok(())
    }

    async fn set_disabled(&self, uid: &str, disabled: bool) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        let user = users
            .iter_mut()
            .find(|u| u.profile.uid == uid)
            .ok_or_else(|| AppError::NotFound(format!("User '{}' not found", uid)))?;
        user.disabled = disabled;
        Ok(())
    }

    async fn delete(&self, uid: &str) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        let before = users.len();
        users.retain(|u| u.profile.uid != uid);
        Ok(users.len() < before)
    }
}

pub struct InMemoryGalleryRepo {
    pub media: Mutex<Vec<MediaItem>>,
    pub stories: Mutex<Vec<StoryItem>>,
}

impl InMemoryGalleryRepo {
    pub fn new() -> Self {
        Self {
            media: Mutex::new(vec![]),
            stories: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl GalleryRepository for InMemoryGalleryRepo {
    async fn insert_media(&self, item: &MediaItem) -> Result<(), AppError> {
        self.media.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn list_media(&self, user_id: &str) -> Result<Vec<MediaItem>, AppError> {
        let mut items: Vec<MediaItem> = self
            .media
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.uploaded_at.cmp(&a.uploaded_at));
        Ok(items)
    }

    async fn find_media(&self, user_id: &str, id: &str) -> Result<Option<MediaItem>, AppError> {
        Ok(self
            .media
            .lock()
            .unwrap()
            .iter()
            .find(|m| m.user_id == user_id && m.id == id)
            .cloned())
    }

    async fn delete_media(&self, user_id: &str, id: &str) -> Result<bool, AppError> {
        let mut media = self.media.lock().unwrap();
        let before = media.len();
        media.retain(|m| !(m.user_id == user_id && m.id == id));
        Ok(media.len() < before)
    }

    async fn count_media(&self, user_id: &str) -> Result<u64, AppError> {
        Ok(self
            .media
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.user_id == user_id)
            .count() as u64)
    }

    async fn delete_all_media(&self, user_id: &str) -> Result<u64, AppError> {
        let mut media = self.media.lock().unwrap();
        let before = media.len();
        media.retain(|m| m.user_id != user_id);
        Ok((before - media.len()) as u64)
    }

    async fn insert_story(&self, item: &StoryItem) -> Result<(), AppError> {
        self.stories.lock().unwrap().push(item.clone());
        Ok(())
    }

    async fn list_stories(
        &self,
        user_id: &str,
        active_at: Option<DateTime<Utc>>,
    ) -> Result<Vec<StoryItem>, AppError> {
        let mut items: Vec<StoryItem> = self
            .stories
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id)
            .filter(|s| active_at.map_or(true, |now| s.is_active_at(now)))
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }

    async fn find_story(&self, user_id: &str, id: &str) -> Result<Option<StoryItem>, AppError> {
        Ok(self
            .stories
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.user_id == user_id && s.id == id)
            .cloned())
    }

    async fn delete_story(&self, user_id: &str, id: &str) -> Result<bool, AppError> {
        let mut stories = self.stories.lock().unwrap();
        let before = stories.len();
        stories.retain(|s| !(s.user_id == user_id && s.id == id));
        Ok(stories.len() < before)
    }

    async fn count_stories(&self, user_id: &str) -> Result<u64, AppError> {
        Ok(self
            .stories
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id)
            .count() as u64)
    }

    async fn delete_all_stories(&self, user_id: &str) -> Result<u64, AppError> {
        let mut stories = self.stories.lock().unwrap();
        let before = stories.len();
        stories.retain(|s| s.user_id != user_id);
        Ok((before - stories.len()) as u64)
    }

    async fn increment_story_views(
        &self,
        user_id: &str,
        id: &str,
    ) -> Result<Option<u64>, AppError> {
        let mut stories = self.stories.lock().unwrap();
        Ok(stories
            .iter_mut()
            .find(|s| s.user_id == user_id && s.id == id)
            .map(|s| {
                s.views += 1;
                s.views
            }))
    }

    async fn list_expired_stories(&self, now: DateTime<Utc>) -> Result<Vec<StoryItem>, AppError> {
        Ok(self
            .stories
            .lock()
            .unwrap()
            .iter()
            .filter(|s| !s.is_active_at(now))
            .cloned()
            .collect())
    }
}
