use axum::extract::multipart::MultipartError;
use axum::extract::Multipart;
use axum::http::StatusCode;

use crate::error::AppError;

/// One file part of a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub content: Vec<u8>,
}

/// A parsed gallery upload form.
///
/// Fields: any number of `file` parts, an optional `description` and an
/// optional comma-separated `tags` list.
#[derive(Debug, Clone, Default)]
pub struct UploadForm {
    pub files: Vec<UploadedFile>,
    pub description: Option<String>,
    pub tags: Vec<String>,
}

impl UploadForm {
    /// The single file of a one-file form (stories, avatars).
    pub fn into_single_file(self) -> Result<UploadedFile, AppError> {
        let mut files = self.files.into_iter();
        let file = files
            .next()
            .ok_or_else(|| AppError::BadRequest("No file field found in request".into()))?;
        if files.next().is_some() {
            return Err(AppError::BadRequest("Only one file may be uploaded here".into()));
        }
        Ok(file)
    }
}

/// Keep the body-limit rejection distinct from malformed input.
fn multipart_error(context: &str, e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(format!("{context}: {}", e.body_text()))
    } else {
        AppError::BadRequest(format!("{context}: {}", e.body_text()))
    }
}

/// Drain a multipart request into an [`UploadForm`]. Unknown fields are ignored.
pub async fn read_upload_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Multipart error", e))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("upload.bin").to_string();
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file", e))?;

                form.files.push(UploadedFile {
                    file_name,
                    content_type,
                    content: data.to_vec(),
                });
            }
            "description" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read description", e))?;
                let text = text.trim();
                if !text.is_empty() {
                    form.description = Some(text.to_string());
                }
            }
            "tags" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read tags", e))?;
                form.tags = parse_tags(&text);
            }
            _ => continue,
        }
    }

    Ok(form)
}

/// Split a comma-separated tag list, dropping blanks and duplicates.
pub fn parse_tags(raw: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for tag in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Image types that can carry script and are never accepted.
const SCRIPTABLE_IMAGE_TYPES: &[&str] = &["image/svg+xml"];

fn is_scriptable(content_type: &str) -> bool {
    let essence = content_type.split(';').next().unwrap_or("").trim();
    SCRIPTABLE_IMAGE_TYPES.contains(&essence)
}

/// Gallery uploads must be non-empty images or videos. SVG is refused.
pub fn validate_media_file(file: &UploadedFile) -> Result<(), AppError> {
    let content_type = file.content_type.to_ascii_lowercase();
    if is_scriptable(&content_type) {
        return Err(AppError::BadRequest(format!(
            "SVG images are not allowed, got '{}'",
            file.file_name
        )));
    }
    if !content_type.starts_with("image/") && !content_type.starts_with("video/") {
        return Err(AppError::BadRequest(format!(
            "Only images and videos are allowed, got '{}' for '{}'",
            file.content_type, file.file_name
        )));
    }
    if file.content.is_empty() {
        return Err(AppError::BadRequest(format!("File '{}' is empty", file.file_name)));
    }
    Ok(())
}

/// Avatars must be non-empty images. SVG is refused.
pub fn validate_image_file(file: &UploadedFile) -> Result<(), AppError> {
    let content_type = file.content_type.to_ascii_lowercase();
    if !content_type.starts_with("image/") || is_scriptable(&content_type) {
        return Err(AppError::BadRequest("Only image files are allowed".into()));
    }
    if file.content.is_empty() {
        return Err(AppError::BadRequest(format!("File '{}' is empty", file.file_name)));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn file(name: &str, content_type: &str, content: &[u8]) -> UploadedFile {
    UploadedFile {
        file_name: name.to_string(),
        content_type: content_type.to_string(),
        content: content.to_vec(),
    }
}
