use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use chrono::Duration;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::api;
use crate::auth::session::SessionKeys;
use crate::config::AppConfig;
use crate::db::gallery_repository::GalleryRepository;
use crate::db::user_repository::UserRepository;
use crate::storage::client::StorageClient;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub user_repo: Arc<dyn UserRepository>,
    pub gallery_repo: Arc<dyn GalleryRepository>,
    pub storage_client: Arc<dyn StorageClient>,
    pub sessions: SessionKeys,
    pub settings: GallerySettings,
}

/// The subset of configuration the request path needs.
#[derive(Debug, Clone)]
pub struct GallerySettings {
    /// The account with this email is the admin.
    pub admin_email: String,
    /// Prefix for display URLs of stored objects.
    pub public_base_url: String,
    /// Lifetime of a story.
    pub story_ttl: Duration,
    /// Whether session cookies carry the `Secure` attribute.
    pub secure_cookies: bool,
}

impl GallerySettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            admin_email: config.admin.email.clone(),
            public_base_url: config.server.public_base_url.clone(),
            story_ttl: Duration::hours(config.stories.ttl_hours),
            secure_cookies: config.auth.secure_cookies,
        }
    }
}

impl Default for GallerySettings {
    fn default() -> Self {
        Self {
            admin_email: "admin@site.com".to_string(),
            public_base_url: String::new(),
            story_ttl: Duration::hours(24),
            secure_cookies: false,
        }
    }
}

/// Build the HTTP router.
///
/// `max_upload_bytes` caps request bodies; `static_dir`, when set, is served
/// for every path no API route matches.
pub fn build_router(state: AppState, max_upload_bytes: usize, static_dir: Option<&str>) -> Router {
    let router = Router::new()
        .route("/health", get(api::health::health_handler))
        // Auth
        .route("/api/auth/register", post(crate::auth::handlers::register_handler))
        .route("/api/auth/login", post(crate::auth::handlers::login_handler))
        .route("/api/auth/logout", post(crate::auth::handlers::logout_handler))
        .route("/api/auth/me", get(crate::auth::handlers::me_handler))
        // Profiles
        .route(
            "/api/v1/users/{uid}/profile",
            get(api::profile::get_profile_handler).put(api::profile::update_profile_handler),
        )
        .route(
            "/api/v1/users/{uid}/avatar",
            put(api::profile::upload_avatar_handler),
        )
        // Gallery
        .route(
            "/api/v1/users/{uid}/media",
            get(api::media::list_media_handler).post(api::media::upload_media_handler),
        )
        .route(
            "/api/v1/users/{uid}/media/{id}",
            delete(api::media::delete_media_handler),
        )
        .route(
            "/api/v1/users/{uid}/stories",
            get(api::stories::list_stories_handler).post(api::stories::upload_story_handler),
        )
        .route(
            "/api/v1/users/{uid}/stories/{id}",
            delete(api::stories::delete_story_handler),
        )
        .route(
            "/api/v1/users/{uid}/stories/{id}/views",
            post(api::stories::record_view_handler),
        )
        .route("/api/v1/files/{*key}", get(api::files::serve_file_handler))
        // Admin
        .route("/api/v1/admin/users", get(api::admin::list_users_handler))
        .route(
            "/api/v1/admin/users/{uid}/disable",
            post(api::admin::disable_user_handler),
        )
        .route(
            "/api/v1/admin/users/{uid}/enable",
            post(api::admin::enable_user_handler),
        )
        .route(
            "/api/v1/admin/users/{uid}",
            delete(api::admin::delete_user_handler),
        )
        .route(
            "/api/v1/admin/stories/purge",
            post(api::admin::purge_stories_handler),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(DefaultBodyLimit::max(max_upload_bytes)),
        );

    let router = match static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.with_state(state)
}
