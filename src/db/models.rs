use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Whether an uploaded item is a still image or a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Classify an upload by its client-supplied content type.
    ///
    /// Anything under `video/` is a video; everything else is treated as an image.
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.to_ascii_lowercase().starts_with("video/") {
            MediaKind::Video
        } else {
            MediaKind::Image
        }
    }
}

/// A user's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Identity key.
    pub uid: String,
    /// Login email, stored lower-cased.
    pub email: String,
    pub display_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub links: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A user account as persisted: the profile plus the server-only fields.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub profile: UserProfile,
    /// Argon2 PHC string.
    pub password_hash: String,
    /// Set by the admin; disabled accounts cannot sign in or upload.
    pub disabled: bool,
}

/// A photo or video in a user's gallery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub user_id: String,
    /// Object name under the user's media prefix (`{millis}-{original}`).
    pub filename: String,
    /// Display URL derived from the object key.
    pub url: String,
    pub kind: MediaKind,
    /// Size in bytes.
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// An ephemeral story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryItem {
    pub id: String,
    pub user_id: String,
    pub filename: String,
    pub url: String,
    pub kind: MediaKind,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    #[serde(default)]
    pub views: u64,
}

impl StoryItem {
    /// A story is live until its expiry instant.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// A row of the admin user table. Derived, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdminUser {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    pub media_count: u64,
    pub story_count: u64,
    pub created_at: DateTime<Utc>,
    pub disabled: bool,
}

/// Partial profile update. Only the provided fields are changed.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    /// Set only by the avatar upload; ignored in client requests.
    #[serde(skip_deserializing)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub links: Option<Vec<String>>,
}

impl ProfileUpdate {
    /// Apply the update to a profile, stamping `updated_at`.
    pub fn apply_to(&self, profile: &mut UserProfile, now: DateTime<Utc>) {
        if let Some(display_name) = &self.display_name {
            profile.display_name = display_name.trim().to_string();
        }
        if let Some(bio) = &self.bio {
            profile.bio = Some(bio.clone());
        }
        if let Some(avatar_url) = &self.avatar_url {
            profile.avatar_url = Some(avatar_url.clone());
        }
        if let Some(links) = &self.links {
            profile.links = links.clone();
        }
        profile.updated_at = now;
    }
}

/// Result of a cascade delete of one user.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeleteUserSummary {
    pub uid: String,
    pub media_deleted: u64,
    pub stories_deleted: u64,
    pub blobs_deleted: u64,
}

/// Result of purging lapsed stories.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PurgeSummary {
    pub stories_purged: u64,
}

/// Response of a story view increment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoryViews {
    pub id: String,
    pub views: u64,
}
