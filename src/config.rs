use std::path::Path;

use serde::Deserialize;

use crate::error::AppError;

/// Upper bound for TTL settings, in hours (100 years).
pub const MAX_TTL_HOURS: i64 = 24 * 365 * 100;

/// Top-level service configuration.
///
/// Sources, later ones winning: built-in defaults, an optional TOML file,
/// then `PICTA__`-prefixed environment variables (`PICTA__MONGODB__URI`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub mongodb: MongoConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
    pub stories: StoriesConfig,
    pub uploads: UploadsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    /// Prefix for display URLs. Empty means host-relative URLs.
    pub public_base_url: String,
    /// Optional directory with a pre-built frontend, served as fallback.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:3000".to_string(),
            public_base_url: String::new(),
            static_dir: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MongoConfig {
    pub uri: String,
    pub database: String,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: "mongodb://localhost:27017".to_string(),
            database: "picta".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint for MinIO / LocalStack.
    pub endpoint: Option<String>,
    pub force_path_style: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: "picta-media".to_string(),
            region: "us-east-1".to_string(),
            endpoint: None,
            force_path_style: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC secret for session tokens. A random one is generated when unset,
    /// which invalidates sessions on every restart.
    pub session_secret: Option<String>,
    pub session_ttl_hours: i64,
    /// Mark the session cookie `Secure` (requires HTTPS).
    pub secure_cookies: bool,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_secret: None,
            session_ttl_hours: 24 * 7,
            secure_cookies: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// The account with this email has the admin role.
    pub email: String,
    /// When set, the admin account is created at startup if missing.
    pub password: Option<String>,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@site.com".to_string(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoriesConfig {
    pub ttl_hours: i64,
    /// Interval of the background purge of lapsed stories. 0 disables it.
    pub purge_interval_secs: u64,
}

impl Default for StoriesConfig {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            purge_interval_secs: 0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UploadsConfig {
    /// Maximum request body size for upload routes.
    pub max_bytes: usize,
}

impl Default for UploadsConfig {
    fn default() -> Self {
        Self {
            max_bytes: 100 * 1024 * 1024,
        }
    }
}

impl AppConfig {
    /// Load the configuration. A missing file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix("PICTA")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to load configuration: {e}")))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| AppError::Internal(format!("Invalid configuration: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if !self.admin.email.contains('@') {
            return Err(AppError::Internal(format!(
                "admin.email '{}' is not an email address",
                self.admin.email
            )));
        }
        check_ttl_hours("stories.ttl_hours", self.stories.ttl_hours)?;
        check_ttl_hours("auth.session_ttl_hours", self.auth.session_ttl_hours)?;
        Ok(())
    }
}

fn check_ttl_hours(name: &str, hours: i64) -> Result<(), AppError> {
    if hours <= 0 || hours > MAX_TTL_HOURS {
        return Err(AppError::Internal(format!(
            "{name} must be between 1 and {MAX_TTL_HOURS}, got {hours}"
        )));
    }
    Ok(())
}
