use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use dotenv::dotenv;
use jsonwebtoken::{DecodingKey, EncodingKey};
use std::{env, fmt, path::PathBuf, str::FromStr, time::Duration};
use zeroize::Zeroizing;

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum AppEnvironment {
    Development,
    Production,
    Testing,
}

impl FromStr for AppEnvironment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" => Ok(AppEnvironment::Development),
            "production" => Ok(AppEnvironment::Production),
            "testing" => Ok(AppEnvironment::Testing),
            _ => Err(ConfigError::Message(format!("Invalid environment: {}", s))),
        }
    }
}

#[derive(Deserialize, Clone)]
#[serde(rename_all = "snake_case")]
pub struct AppConfig {
    #[serde(default = "default_env")]
    pub env: AppEnvironment,

    #[serde(default = "default_name")]
    pub name: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    #[serde(default)]
    pub database_url: String,

    /// Comma separated list of origins, `*` allows any.
    #[serde(default = "default_cors_origins")]
    pub cors_allowed_origins: String,

    #[serde(default)]
    pub jwt_secret: String,

    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration_minutes: i64,

    #[serde(default)]
    pub refresh_token_secret: String,

    #[serde(default = "default_refresh_expiration")]
    pub refresh_token_exp_days: i64,

    #[serde(default)]
    pub uploads: UploadSettings,
}

/// Where uploaded images live and how they are checked and compressed.
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct UploadSettings {
    pub root: PathBuf,
    pub tmp_dir: PathBuf,
    /// URL prefix the upload root is served under.
    pub public_prefix: String,
    pub max_file_size: u64,
    pub max_field_size: usize,
    pub max_parts: usize,
    pub jpeg_quality: u8,
    pub max_dimension: u32,
    pub compression_timeout_secs: u64,
    pub temp_max_age_secs: u64,
    pub sweep_interval_secs: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        UploadSettings {
            root: PathBuf::from("public/uploads"),
            tmp_dir: PathBuf::from("public/tmp/records/images"),
            public_prefix: "/uploads".to_string(),
            max_file_size: 1_000_000,
            max_field_size: 64 * 1024,
            max_parts: 64,
            jpeg_quality: 75,
            max_dimension: 1920,
            compression_timeout_secs: 30,
            temp_max_age_secs: 60 * 60,
            sweep_interval_secs: 15 * 60,
        }
    }
}

impl UploadSettings {
    pub fn compression_timeout(&self) -> Duration {
        Duration::from_secs(self.compression_timeout_secs)
    }

    pub fn temp_max_age(&self) -> Duration {
        Duration::from_secs(self.temp_max_age_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    /// Uploads live below `root`, temporary slots below `tmp_dir`.
    pub fn rooted_at(root: impl Into<PathBuf>, tmp_dir: impl Into<PathBuf>) -> Self {
        UploadSettings {
            root: root.into(),
            tmp_dir: tmp_dir.into(),
            ..UploadSettings::default()
        }
    }
}

fn default_env() -> AppEnvironment {
    AppEnvironment::Development
}
fn default_name() -> String {
    "Courseware-API".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_worker_count() -> usize {
    num_cpus::get()
}
fn default_cors_origins() -> String {
    "*".to_string()
}
fn default_jwt_expiration() -> i64 {
    15
}
fn default_refresh_expiration() -> i64 {
    7
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenv().ok();

        let raw_env = env::var("APP_ENV").unwrap_or_else(|_| "development".into());
        let env_name = AppEnvironment::from_str(&raw_env)
            .map_err(|_| ConfigError::Message(format!("Invalid APP_ENV value: {}", raw_env)))?;

        // APP_UPLOADS__MAX_FILE_SIZE -> uploads.max_file_size
        let builder = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env_name)).required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .ignore_empty(true)
            );

        let mut config: Self = builder.build()?.try_deserialize()?;

        config.env = env_name;

        config.database_url = fill_or_env(config.database_url, "DATABASE_URL")?;
        config.jwt_secret = fill_or_env(config.jwt_secret, "JWT_SECRET")?;
        config.refresh_token_secret = fill_or_env(config.refresh_token_secret, "REFRESH_TOKEN_SECRET")?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.database_url.trim().is_empty() {
            errors.push("DATABASE_URL cannot be empty");
        }
        if self.jwt_secret.len() < 32 {
            errors.push("JWT_SECRET must be at least 32 characters");
        }
        if self.refresh_token_secret.len() < 32 {
            errors.push("REFRESH_TOKEN_SECRET must be at least 32 characters");
        }
        if self.is_production() && self.cors_origins().iter().any(|o| o == "*") {
            errors.push("Wildcard CORS (*) is not allowed in production");
        }
        if !(1..=100).contains(&self.uploads.jpeg_quality) {
            errors.push("uploads.jpeg_quality must be between 1 and 100");
        }
        if self.uploads.max_file_size == 0 {
            errors.push("uploads.max_file_size must be greater than zero");
        }
        if self.uploads.max_dimension == 0 {
            errors.push("uploads.max_dimension must be greater than zero");
        }
        if self.uploads.compression_timeout_secs == 0 {
            errors.push("uploads.compression_timeout_secs must be greater than zero");
        }
        if self.uploads.sweep_interval_secs == 0 {
            errors.push("uploads.sweep_interval_secs must be greater than zero");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Message(errors.join(", ")))
        }
    }

    pub fn is_production(&self) -> bool {
        self.env == AppEnvironment::Production
    }

    pub fn cors_origins(&self) -> Vec<String> {
        self.cors_allowed_origins
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// Falls back to the bare variable name (`DATABASE_URL`) or its `APP_` form.
fn fill_or_env(current: String, key: &str) -> Result<String, ConfigError> {
    if !current.trim().is_empty() {
        return Ok(current);
    }
    env::var(format!("APP_{key}"))
        .or_else(|_| env::var(key))
        .map_err(|_| ConfigError::Message(format!("{key} must be set")))
}

impl fmt::Display for AppEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AppEnvironment::Development => "development",
            AppEnvironment::Production => "production",
            AppEnvironment::Testing => "testing",
        };
        write!(f, "{s}")
    }
}

trait Redact {
    fn redact(&self) -> &str;
}

impl Redact for str {
    fn redact(&self) -> &str {
        if self.is_empty() {
            "[MISSING]"
        } else if self.len() < 32 {
            "[TOO_SHORT]"
        } else {
            "[REDACTED]"
        }
    }
}

impl Redact for String {
    fn redact(&self) -> &str {
        self.as_str().redact()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("name", &self.name)
            .field("port", &self.port)
            .field("host", &self.host)
            .field("worker_count", &self.worker_count)
            .field("database_url", &self.database_url.redact())
            .field("cors_allowed_origins", &self.cors_allowed_origins)
            .field("jwt_secret", &self.jwt_secret.redact())
            .field("jwt_expiration_minutes", &self.jwt_expiration_minutes)
            .field("refresh_token_secret", &self.refresh_token_secret.redact())
            .field("refresh_token_exp_days", &self.refresh_token_exp_days)
            .field("uploads", &self.uploads)
            .finish()
    }
}

#[derive(Clone)]
pub struct JwtKeys {
    pub encoding: EncodingKey,
    pub decoding: DecodingKey,
    pub refresh_encoding: EncodingKey,
    pub refresh_decoding: DecodingKey,
}

impl From<&AppConfig> for JwtKeys {
    fn from(config: &AppConfig) -> Self {
        let jwt_secret = Zeroizing::new(config.jwt_secret.clone());
        let refresh_secret = Zeroizing::new(config.refresh_token_secret.clone());

        JwtKeys {
            encoding: EncodingKey::from_secret(jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(jwt_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
        }
    }
}

impl fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JwtKeys")
            .field("encoding", &"[REDACTED]")
            .field("decoding", &"[REDACTED]")
            .field("refresh_encoding", &"[REDACTED]")
            .field("refresh_decoding", &"[REDACTED]")
            .finish()
    }
}
