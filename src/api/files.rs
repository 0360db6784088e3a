use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::app::AppState;
use crate::error::AppError;
use crate::storage::client::StorageClient;
use crate::storage::paths::is_servable_key;

/// Load a blob together with the content type to serve it with.
///
/// The type recorded on the object wins; otherwise it is guessed from the key.
pub async fn process_fetch_file(
    storage: &dyn StorageClient,
    key: &str,
) -> Result<(String, Vec<u8>), AppError> {
    if !is_servable_key(key) {
        return Err(AppError::NotFound("File not found".into()));
    }

    let object = storage
        .get_object(key)
        .await?
        .ok_or_else(|| AppError::NotFound("File not found".into()))?;

    let content_type = object
        .content_type
        .filter(|ct| !ct.is_empty())
        .unwrap_or_else(|| {
            mime_guess::from_path(key)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });

    Ok((content_type, object.content))
}

/// `GET /api/v1/files/{*key}`
///
/// Display URLs of media, stories and avatars point here. Public, like the
/// download URLs of the hosted store they replace.
pub async fn serve_file_handler(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    let (content_type, content) =
        process_fetch_file(state.storage_client.as_ref(), &key).await?;
    Ok(file_response(content_type, content))
}

/// Wrap a blob in a response that browsers will not execute.
///
/// Anything other than a raster image or a video is sent as an attachment.
pub fn file_response(content_type: String, content: Vec<u8>) -> Response {
    let inline = is_inline_type(&content_type);
    let mut response = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CACHE_CONTROL, "private, max-age=3600".to_string()),
            (header::X_CONTENT_TYPE_OPTIONS, "nosniff".to_string()),
            (
                header::CONTENT_SECURITY_POLICY,
                "default-src 'none'; sandbox".to_string(),
            ),
        ],
        content,
    )
        .into_response();

    if !inline {
        response.headers_mut().insert(
            header::CONTENT_DISPOSITION,
            header::HeaderValue::from_static("attachment"),
        );
    }
    response
}

fn is_inline_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    (essence.starts_with("image/") && essence != "image/svg+xml") || essence.starts_with("video/")
}
