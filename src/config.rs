use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::env;
use config;

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub web: WebConfig,
    pub database_path: String,
    pub media_path: String,
    pub public_base_url: String,
    pub allowed_origins: String,
    pub log_level: String,
    pub session_secret_key: String,
    pub use_secure_cookies: bool,
    // Adapter credentials; empty string means "not configured".
    pub stripe_secret_key: String,
    pub youtube_api_key: String,
    pub youtube_channel_id: String,
}

impl Config {
    pub fn from_env(env_path: &Path) -> Result<Self, config::ConfigError> {
        dotenvy::from_path(env_path)
            .map_err(|e| config::ConfigError::Message(format!(
                "FATAL: Failed to load .env file from '{}'. Error: {}", env_path.display(), e
            )))?;

        let database_path = env::var("DATABASE_PATH")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'DATABASE_PATH' is not set in your .env file.".to_string()
            ))?;

        let media_path = env::var("MEDIA_PATH")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'MEDIA_PATH' is not set in your .env file.".to_string()
            ))?;

        let session_secret_key = env::var("SESSION_SECRET_KEY")
            .map_err(|_| config::ConfigError::Message(
                "FATAL: Environment variable 'SESSION_SECRET_KEY' is not set in your .env file.".to_string()
            ))?;

        // The key must be 128 hex characters (64 bytes) for the cookie session.
        if session_secret_key.len() != 128 || !session_secret_key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(config::ConfigError::Message(
                "FATAL: 'SESSION_SECRET_KEY' must be 128 hexadecimal characters long (64 bytes).".to_string()
            ));
        }

        if Path::new(&database_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'DATABASE_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                database_path
            )));
        }

        if Path::new(&media_path).is_relative() {
            return Err(config::ConfigError::Message(format!(
                "FATAL: The 'MEDIA_PATH' in your .env file is a relative path ('{}'). It MUST be an absolute path.",
                media_path
            )));
        }

        let allowed_origins = env::var("ALLOWED_ORIGINS").unwrap_or_else(|_| "".to_string());
        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let use_secure_cookies = env::var("USE_SECURE_COOKIES")
            .unwrap_or_else(|_| "false".to_string())
            .parse::<bool>()
            .unwrap_or(false);

        // Optional adapter credentials. The server starts without them; the
        // affected endpoints report a "not configured" condition instead.
        let stripe_secret_key = env::var("STRIPE_SECRET_KEY").unwrap_or_default();
        let youtube_api_key = env::var("YOUTUBE_API_KEY").unwrap_or_default();
        let youtube_channel_id = env::var("YOUTUBE_CHANNEL_ID").unwrap_or_default();

        // Public URLs for stored objects are derived from this base. Defaults
        // to the bind address so a bare dev setup still resolves.
        let public_base_url = env::var("PUBLIC_BASE_URL").unwrap_or_default();

        let builder = config::Config::builder()
            .add_source(config::File::new("config/default.toml", config::FileFormat::Toml))
            .set_override("database_path", database_path)?
            .set_override("media_path", media_path)?
            .set_override("public_base_url", public_base_url)?
            .set_override("session_secret_key", session_secret_key)?
            .set_override("allowed_origins", allowed_origins)?
            .set_override("log_level", log_level)?
            .set_override("use_secure_cookies", use_secure_cookies)?
            .set_override("stripe_secret_key", stripe_secret_key)?
            .set_override("youtube_api_key", youtube_api_key)?
            .set_override("youtube_channel_id", youtube_channel_id)?
            .build()?;

        builder.try_deserialize()
    }

    /// Returns the full path to the site database file inside its own folder.
    pub fn site_db_path(&self) -> PathBuf {
        PathBuf::from(&self.database_path)
            .join("site")
            .join("site.db")
    }

    pub fn stripe_secret_key(&self) -> Option<&str> {
        non_empty(&self.stripe_secret_key)
    }

    pub fn youtube_api_key(&self) -> Option<&str> {
        non_empty(&self.youtube_api_key)
    }

    pub fn youtube_channel_id(&self) -> Option<&str> {
        non_empty(&self.youtube_channel_id)
    }

    /// Base URL used to build public object URLs, falling back to the bind
    /// address when PUBLIC_BASE_URL is not set.
    pub fn resolved_public_base_url(&self) -> String {
        match non_empty(&self.public_base_url) {
            Some(base) => base.trim_end_matches('/').to_string(),
            None => format!("http://{}:{}", self.web.host, self.web.port),
        }
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}
