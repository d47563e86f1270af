use std::env;
use std::path::PathBuf;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the LlamaCloud credential.
pub const API_KEY_VAR: &str = "LLAMA_CLOUD_API_KEY";

const DEFAULT_BASE_URL: &str = "https://api.cloud.llamaindex.ai";
const DEFAULT_CACHE_DIR: &str = "output/llamacloud";
const DEFAULT_POLL_INTERVAL_MS: u64 = 100;
const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 20;
const DEFAULT_MAX_UPLOAD_MB: usize = 100;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the sync server and CLI.
#[derive(Debug, Clone)]
pub struct Config {
    /// API key used to authenticate against LlamaCloud, when present.
    pub llama_cloud_api_key: Option<String>,
    /// Base URL of the LlamaCloud REST API.
    pub llama_cloud_base_url: String,
    /// Root directory holding downloaded pipeline files.
    pub cache_dir: PathBuf,
    /// Delay between two ingestion status checks.
    pub poll_interval: Duration,
    /// Maximum number of ingestion status checks before giving up.
    pub poll_max_attempts: u32,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
    /// Largest request body accepted by the upload route, in bytes.
    pub max_upload_bytes: usize,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let poll_interval_ms = parse_optional::<u64>("LLAMASYNC_POLL_INTERVAL_MS")?
            .unwrap_or(DEFAULT_POLL_INTERVAL_MS);
        let poll_max_attempts = parse_optional::<u32>("LLAMASYNC_POLL_MAX_ATTEMPTS")?
            .unwrap_or(DEFAULT_POLL_MAX_ATTEMPTS);
        if poll_max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "LLAMASYNC_POLL_MAX_ATTEMPTS".to_string(),
            ));
        }

        Ok(Self {
            llama_cloud_api_key: load_env_optional(API_KEY_VAR),
            llama_cloud_base_url: load_env_optional("LLAMA_CLOUD_BASE_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            cache_dir: load_env_optional("LLAMASYNC_CACHE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CACHE_DIR)),
            poll_interval: Duration::from_millis(poll_interval_ms),
            poll_max_attempts,
            server_port: parse_optional("SERVER_PORT")?,
            max_upload_bytes: parse_optional::<usize>("LLAMASYNC_MAX_UPLOAD_MB")?
                .unwrap_or(DEFAULT_MAX_UPLOAD_MB)
                * 1024
                * 1024,
        })
    }

    /// Return the API key or fail with [`ConfigError::MissingVariable`].
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.llama_cloud_api_key
            .as_deref()
            .ok_or_else(|| ConfigError::MissingVariable(API_KEY_VAR.to_string()))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llama_cloud_api_key: None,
            llama_cloud_base_url: DEFAULT_BASE_URL.to_string(),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            server_port: None,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_MB * 1024 * 1024,
        }
    }
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_optional<T: std::str::FromStr>(key: &str) -> Result<Option<T>, ConfigError> {
    load_env_optional(key)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue(key.to_string()))
        })
        .transpose()
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, panicking if initialization has not occurred.
pub fn get_config() -> &'static Config {
    CONFIG.get().expect("Config not initialized")
}

/// Load configuration from the environment and install it in the global cache.
pub fn init_config() {
    dotenvy::dotenv().ok();
    let config = Config::from_env().expect("Failed to load config from environment");
    tracing::debug!(
        base_url = %config.llama_cloud_base_url,
        cache_dir = %config.cache_dir.display(),
        has_api_key = config.llama_cloud_api_key.is_some(),
        poll_interval_ms = config.poll_interval.as_millis() as u64,
        poll_max_attempts = config.poll_max_attempts,
        server_port = ?config.server_port,
        max_upload_bytes = config.max_upload_bytes,
        "Loaded configuration"
    );
    CONFIG.set(config).expect("Failed to set config");
}
