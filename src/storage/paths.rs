use chrono::{DateTime, Utc};

/// Route prefix under which stored objects are served.
pub const FILES_ROUTE_PREFIX: &str = "/api/v1/files/";

/// Which per-user prefix an upload goes under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GallerySection {
    Media,
    Stories,
}

impl GallerySection {
    fn as_str(self) -> &'static str {
        match self {
            GallerySection::Media => "media",
            GallerySection::Stories => "stories",
        }
    }
}

/// Object key of a gallery upload: `galleries/{uid}/{media|stories}/{filename}`.
pub fn gallery_key(uid: &str, section: GallerySection, filename: &str) -> String {
    format!("galleries/{}/{}/{}", uid, section.as_str(), filename)
}

/// Object key of a user's avatar.
pub fn avatar_key(uid: &str) -> String {
    format!("avatars/{}", uid)
}

/// Stored filename for an upload: upload time in milliseconds, a random
/// 8-character token, then the sanitized original name.
///
/// The token keeps keys distinct when the same name is uploaded twice in one
/// millisecond.
pub fn upload_filename(original: &str, uploaded_at: DateTime<Utc>) -> String {
    let token = uuid::Uuid::new_v4().simple().to_string();
    format!(
        "{}-{}-{}",
        uploaded_at.timestamp_millis(),
        &token[..8],
        sanitize_file_name(original)
    )
}

/// Keep ASCII alphanumerics, `.`, `-` and `_`; replace anything else with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let sanitized: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.is_empty() || sanitized.chars().all(|c| c == '.') {
        "upload.bin".to_string()
    } else {
        sanitized
    }
}

/// Display URL of a stored object.
///
/// `public_base_url` may be empty, in which case the URL is host-relative.
pub fn download_url(public_base_url: &str, key: &str) -> String {
    format!(
        "{}{}{}",
        public_base_url.trim_end_matches('/'),
        FILES_ROUTE_PREFIX,
        key
    )
}

/// Reject keys that could escape the bucket layout when served.
pub fn is_servable_key(key: &str) -> bool {
    !key.is_empty()
        && !key.starts_with('/')
        && key.split('/').all(|segment| !segment.is_empty() && segment != "..")
        && (key.starts_with("galleries/") || key.starts_with("avatars/"))
}
