use std::sync::Arc;

use axum::Router;
use chrono::Duration;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::minio::MinIO;
use testcontainers_modules::mongo::Mongo;

use picta::admin_seeder::seed_admin_account;
use picta::app::{build_router, AppState, GallerySettings};
use picta::auth::session::SessionKeys;
use picta::config::AdminConfig;
use picta::db::gallery_repository::{GalleryRepository, MongoGalleryRepository};
use picta::db::user_repository::{MongoUserRepository, UserRepository};
use picta::storage::client::{S3StorageClient, StorageClient};

pub const ADMIN_EMAIL: &str = "admin@site.com";
pub const ADMIN_PASSWORD: &str = "admin-pass";

/// Holds running containers and provides the Axum router for integration tests.
///
/// Containers are kept alive for as long as this struct lives. When dropped,
/// containers are stopped and cleaned up automatically.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    _minio: ContainerAsync<MinIO>,
    pub router: Router,
    pub users: Arc<dyn UserRepository>,
    pub gallery: Arc<dyn GalleryRepository>,
    pub storage: Arc<dyn StorageClient>,
}

impl TestEnv {
    /// Spin up MongoDB and MinIO and build the full router against them.
    pub async fn start() -> Self {
        // Start containers concurrently
        let (mongo_container, minio_container) =
            tokio::join!(Mongo::default().start(), MinIO::default().start());
        let mongo_container = mongo_container.expect("Failed to start MongoDB container");
        let minio_container = minio_container.expect("Failed to start MinIO container");

        // --- MongoDB ---
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let mongo_db = mongo_client.database("picta_test");

        let user_repo = MongoUserRepository::new(&mongo_db);
        user_repo
            .ensure_indexes()
            .await
            .expect("Failed to create user indexes");
        let gallery_repo = MongoGalleryRepository::new(&mongo_db);
        gallery_repo
            .ensure_indexes()
            .await
            .expect("Failed to create gallery indexes");
        let users: Arc<dyn UserRepository> = Arc::new(user_repo);
        let gallery: Arc<dyn GalleryRepository> = Arc::new(gallery_repo);

        // --- MinIO (S3) ---
        let minio_port = minio_container
            .get_host_port_ipv4(9000)
            .await
            .expect("Failed to get MinIO port");
        let minio_endpoint = format!("http://127.0.0.1:{}", minio_port);

        // Set env vars for AWS SDK to pick up MinIO credentials
        unsafe {
            std::env::set_var("AWS_ACCESS_KEY_ID", "minioadmin");
            std::env::set_var("AWS_SECRET_ACCESS_KEY", "minioadmin");
            std::env::set_var("AWS_REGION", "us-east-1");
        }

        let s3_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .endpoint_url(&minio_endpoint)
            .region(aws_config::Region::new("us-east-1"))
            .load()
            .await;

        let s3_client = aws_sdk_s3::Client::from_conf(
            aws_sdk_s3::config::Builder::from(&s3_config)
                .force_path_style(true)
                .build(),
        );

        // Create test bucket
        let bucket_name = "picta-test";
        let _ = s3_client.create_bucket().bucket(bucket_name).send().await;

        let storage: Arc<dyn StorageClient> =
            Arc::new(S3StorageClient::new(s3_client, bucket_name.to_string()));

        // --- Admin account ---
        seed_admin_account(
            users.as_ref(),
            &AdminConfig {
                email: ADMIN_EMAIL.to_string(),
                password: Some(ADMIN_PASSWORD.to_string()),
            },
        )
        .await
        .expect("Failed to seed admin account");

        // --- Build AppState ---
        let app_state = AppState {
            user_repo: users.clone(),
            gallery_repo: gallery.clone(),
            storage_client: storage.clone(),
            sessions: SessionKeys::new(b"integration-test-secret", Duration::hours(1)),
            settings: GallerySettings {
                admin_email: ADMIN_EMAIL.to_string(),
                ..Default::default()
            },
        };

        let router = build_router(app_state, 10 * 1024 * 1024, None);

        Self {
            _mongo: mongo_container,
            _minio: minio_container,
            router,
            users,
            gallery,
            storage,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    ///
    /// Each server keeps its own cookie jar, so one server per signed-in user.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .build(self.router.clone())
    }

    /// Helper: register an account on `server` and return its uid.
    ///
    /// The server is signed in as that account afterwards.
    pub async fn register(&self, server: &axum_test::TestServer, email: &str) -> String {
        let response = server
            .post("/api/auth/register")
            .json(&serde_json::json!({
                "email": email,
                "password": "secret-pw",
                "display_name": email.split('@').next().unwrap_or("user"),
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: serde_json::Value = response.json();
        body["user"]["user_id"]
            .as_str()
            .expect("Register response should contain user_id")
            .to_string()
    }

    /// Helper: a server signed in as the seeded admin.
    pub async fn admin_server(&self) -> axum_test::TestServer {
        let server = self.server_permissive();
        server
            .post("/api/auth/login")
            .json(&serde_json::json!({
                "email": ADMIN_EMAIL,
                "password": ADMIN_PASSWORD,
            }))
            .await
            .assert_status_ok();
        server
    }
}

/// A unique email per test run, so tests never collide on the unique index.
pub fn unique_email(prefix: &str) -> String {
    format!("{}-{}@example.com", prefix, uuid::Uuid::new_v4().simple())
}

/// A tiny PNG-like payload; only the declared content type matters to the server.
pub fn png_part(name: &str) -> axum_test::multipart::Part {
    axum_test::multipart::Part::bytes(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A])
        .file_name(name.to_string())
        .mime_type("image/png")
}

/// A tiny video payload.
pub fn mp4_part(name: &str) -> axum_test::multipart::Part {
    axum_test::multipart::Part::bytes(b"\x00\x00\x00\x18ftypmp42".to_vec())
        .file_name(name.to_string())
        .mime_type("video/mp4")
}
