//! Application configuration.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Upload storage configuration.
    #[serde(default)]
    pub uploads: UploadConfig,
    /// Image screening configuration.
    #[serde(default)]
    pub screening: ScreeningConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait when opening a connection.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Seconds to wait for a free pooled connection.
    #[serde(default = "default_connect_timeout")]
    pub acquire_timeout_secs: u64,
    /// Seconds an unused connection stays in the pool.
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: u64,
    /// Seconds before a connection is recycled.
    #[serde(default = "default_max_lifetime")]
    pub max_lifetime_secs: u64,
    /// Level SQL statements are logged at.
    #[serde(default)]
    pub sql_log: SqlLogLevel,
    /// Statements slower than this many milliseconds are logged as warnings.
    #[serde(default)]
    pub slow_statement_ms: Option<u64>,
}

/// Level for statement logging. `off` silences it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlLogLevel {
    /// No statement logging.
    Off,
    /// `error` level.
    Error,
    /// `warn` level.
    Warn,
    /// `info` level.
    Info,
    /// `debug` level.
    #[default]
    Debug,
    /// `trace` level.
    Trace,
}

/// Where complaint images are written and how they are exposed.
#[derive(Debug, Clone, Deserialize)]
pub struct UploadConfig {
    /// Directory the image files are written to.
    #[serde(default = "default_upload_dir")]
    pub dir: PathBuf,
    /// URL path the directory is served under.
    #[serde(default = "default_public_path")]
    pub public_path: String,
    /// Maximum number of images accepted in one request.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
    /// Maximum size of a single image in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            dir: default_upload_dir(),
            public_path: default_public_path(),
            max_files: default_max_files(),
            max_file_size: default_max_file_size(),
        }
    }
}

impl UploadConfig {
    /// Largest request body a multipart upload may carry.
    #[must_use]
    pub const fn body_limit(&self) -> usize {
        self.max_files * self.max_file_size + FORM_OVERHEAD
    }
}

/// Headroom for the text fields of a multipart form.
const FORM_OVERHEAD: usize = 1024 * 1024;

/// What to do with an image when the screening service cannot be reached
/// or answers with something unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScreeningFailureMode {
    /// Accept the image unverified.
    #[default]
    FailOpen,
    /// Reject the submission.
    FailClosed,
}

/// Image screening configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ScreeningConfig {
    /// Whether uploads are sent to the screening service at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Synchronous task endpoint of the screening service.
    #[serde(default = "default_screening_url")]
    pub api_url: String,
    /// API token for the screening service.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Images scoring above this AI-generation likelihood are rejected.
    #[serde(default = "default_ai_threshold")]
    pub ai_generated_threshold: f64,
    /// Images scoring above this internet-similarity score are rejected.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    /// Policy when the screening call fails.
    #[serde(default)]
    pub on_error: ScreeningFailureMode,
    /// Also screen images attached when a complaint is edited.
    #[serde(default)]
    pub screen_updates: bool,
    /// Request timeout for the screening call, in seconds.
    #[serde(default = "default_screening_timeout")]
    pub timeout_secs: u64,
}

impl Default for ScreeningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_screening_url(),
            api_key: None,
            ai_generated_threshold: default_ai_threshold(),
            similarity_threshold: default_similarity_threshold(),
            on_error: ScreeningFailureMode::default(),
            screen_updates: false,
            timeout_secs: default_screening_timeout(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    5000
}

const fn default_max_connections() -> u32 {
    100
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_connect_timeout() -> u64 {
    10
}

const fn default_idle_timeout() -> u64 {
    600
}

const fn default_max_lifetime() -> u64 {
    1800
}

fn default_upload_dir() -> PathBuf {
    PathBuf::from("./public/uploads")
}

fn default_public_path() -> String {
    "/public/uploads".to_string()
}

const fn default_max_files() -> usize {
    5
}

const fn default_max_file_size() -> usize {
    10 * 1024 * 1024
}

fn default_screening_url() -> String {
    "https://api.thehive.ai/api/v2/task/sync".to_string()
}

const fn default_ai_threshold() -> f64 {
    0.75
}

const fn default_similarity_threshold() -> f64 {
    0.7
}

const fn default_screening_timeout() -> u64 {
    30
}

const fn default_true() -> bool {
    true
}

impl Config {
    /// Absolute URL prefix uploaded images are served under.
    #[must_use]
    pub fn uploads_url(&self) -> String {
        format!(
            "{}/{}",
            self.server.url.trim_end_matches('/'),
            self.uploads.public_path.trim_start_matches('/')
        )
    }

    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `CIVICCARE_ENV`)
    /// 3. Environment variables with `CIVICCARE_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("CIVICCARE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("CIVICCARE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("CIVICCARE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:5000"

            [database]
            url = "postgres://localhost/civiccare"
            "#,
        );

        assert_eq!(config.server.port, 5000);
        assert_eq!(config.database.max_connections, 100);
        assert_eq!(config.database.connect_timeout_secs, 10);
        assert_eq!(config.database.sql_log, SqlLogLevel::Debug);
        assert_eq!(config.database.slow_statement_ms, None);
        assert_eq!(config.uploads.max_files, 5);
        assert_eq!(config.uploads.public_path, "/public/uploads");
        assert_eq!(config.uploads_url(), "http://localhost:5000/public/uploads");
        assert!(config.screening.enabled);
        assert_eq!(config.screening.ai_generated_threshold, 0.75);
        assert_eq!(config.screening.similarity_threshold, 0.7);
        assert_eq!(config.screening.on_error, ScreeningFailureMode::FailOpen);
        assert!(!config.screening.screen_updates);
    }

    #[test]
    fn test_fail_closed_is_parsed() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:5000"

            [database]
            url = "postgres://localhost/civiccare"

            [screening]
            on_error = "fail_closed"
            api_key = "secret"
            "#,
        );

        assert_eq!(config.screening.on_error, ScreeningFailureMode::FailClosed);
        assert_eq!(config.screening.api_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_database_pool_settings_are_parsed() {
        let config = parse(
            r#"
            [server]
            url = "http://localhost:5000"

            [database]
            url = "postgres://localhost/civiccare"
            idle_timeout_secs = 60
            sql_log = "off"
            slow_statement_ms = 250
            "#,
        );

        assert_eq!(config.database.idle_timeout_secs, 60);
        assert_eq!(config.database.max_lifetime_secs, 1800);
        assert_eq!(config.database.sql_log, SqlLogLevel::Off);
        assert_eq!(config.database.slow_statement_ms, Some(250));
    }

    #[test]
    fn test_body_limit_covers_all_files() {
        let uploads = UploadConfig {
            max_files: 2,
            max_file_size: 100,
            ..UploadConfig::default()
        };
        assert_eq!(uploads.body_limit(), 200 + FORM_OVERHEAD);
    }
}
