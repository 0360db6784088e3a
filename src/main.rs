use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use clap::Parser;

use picta::admin_seeder::seed_admin_account;
use picta::api::admin::spawn_story_purger;
use picta::app::{build_router, AppState, GallerySettings};
use picta::auth::session::SessionKeys;
use picta::config::AppConfig;
use picta::db::gallery_repository::{GalleryRepository, MongoGalleryRepository};
use picta::db::user_repository::{MongoUserRepository, UserRepository};
use picta::storage::client::{S3StorageClient, StorageClient};

#[derive(Parser, Debug)]
#[command(name = "picta", author, version, about = "Photo and video gallery server.")]
struct Cli {
    /// Path to the TOML configuration file. A missing file is ignored.
    #[arg(long, value_name = "FILE", default_value = "picta.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "picta=info,tower_http=info".into()),
        )
        .init();

    tracing::info!("Starting Picta server...");

    let config = AppConfig::load(Some(&cli.config)).context("Failed to load configuration")?;

    // Connect to MongoDB
    let mongo_client = mongodb::Client::with_uri_str(&config.mongodb.uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let mongo_db = mongo_client.database(&config.mongodb.database);

    let users = MongoUserRepository::new(&mongo_db);
    users
        .ensure_indexes()
        .await
        .context("Failed to create user indexes")?;
    let gallery = MongoGalleryRepository::new(&mongo_db);
    gallery
        .ensure_indexes()
        .await
        .context("Failed to create gallery indexes")?;

    let user_repo: Arc<dyn UserRepository> = Arc::new(users);
    let gallery_repo: Arc<dyn GalleryRepository> = Arc::new(gallery);

    tracing::info!("Connected to MongoDB database '{}'", config.mongodb.database);

    // Connect to S3
    let storage_client: Arc<dyn StorageClient> = Arc::new(
        S3StorageClient::from_config(&config.storage)
            .await
            .context("Failed to initialize S3 client")?,
    );

    tracing::info!("S3 storage client initialized for bucket '{}'", config.storage.bucket);

    let session_ttl = Duration::hours(config.auth.session_ttl_hours);
    let sessions = match &config.auth.session_secret {
        Some(secret) if !secret.is_empty() => SessionKeys::new(secret.as_bytes(), session_ttl),
        _ => {
            tracing::warn!(
                "auth.session_secret not set, using a random secret; sessions will not survive a restart"
            );
            SessionKeys::random(session_ttl)
        }
    };

    seed_admin_account(user_repo.as_ref(), &config.admin)
        .await
        .context("Failed to seed the admin account")?;

    if config.stories.purge_interval_secs > 0 {
        spawn_story_purger(
            gallery_repo.clone(),
            storage_client.clone(),
            std::time::Duration::from_secs(config.stories.purge_interval_secs),
        );
    }

    let app_state = AppState {
        user_repo,
        gallery_repo,
        storage_client,
        sessions,
        settings: GallerySettings::from_config(&config),
    };

    let app = build_router(
        app_state,
        config.uploads.max_bytes,
        config.server.static_dir.as_deref(),
    );

    // Start the server
    tracing::info!("Listening on http://{}", config.server.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;
    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
