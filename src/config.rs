//! Runtime configuration with defaults, environment overrides and validation.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tokio::sync::Semaphore;
use tracing::warn;

pub const DEFAULT_ENGINE_URL: &str = "http://localhost:9200";
pub const DEFAULT_INDEX: &str = "photon";
pub const DEFAULT_TEMPLATE_DIR: &str = "templates";
/// Upper bound for a single engine round trip.
pub const SEARCH_TIMEOUT: Duration = Duration::from_secs(3);
pub const DEFAULT_LIMIT: usize = 15;
pub const MAX_LIMIT: usize = 50;
pub const DEFAULT_LANGUAGE: &str = "de";
pub const SUPPORTED_LANGUAGES: [&str; 2] = ["de", "en"];
/// WGS-84, the only spatial reference the index stores.
pub const WGS84_SRID: i32 = 4326;
const DEFAULT_MAX_CONCURRENT: usize = 16;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid engine URL: {0}")]
    EngineUrl(#[from] url::ParseError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Settings for the search core and its engine connection.
///
/// Environment variables (all optional):
/// - `PLACESEEK_ENGINE_URL`: base URL of the document search engine
/// - `PLACESEEK_INDEX`: index holding place documents
/// - `PLACESEEK_TEMPLATE_DIR`: directory containing `query.json` and `query_location_bias.json`
/// - `PLACESEEK_MAX_CONCURRENT`: maximum number of in-flight engine calls
#[derive(Debug, Clone)]
pub struct Config {
    pub engine_url: String,
    pub index: String,
    pub template_dir: PathBuf,
    pub timeout: Duration,
    pub default_limit: usize,
    pub max_limit: usize,
    pub supported_languages: Vec<String>,
    pub default_language: String,
    pub default_srid: i32,
    pub max_concurrent_searches: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine_url: DEFAULT_ENGINE_URL.to_string(),
            index: DEFAULT_INDEX.to_string(),
            template_dir: PathBuf::from(DEFAULT_TEMPLATE_DIR),
            timeout: SEARCH_TIMEOUT,
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
            supported_languages: SUPPORTED_LANGUAGES.iter().map(|l| l.to_string()).collect(),
            default_language: DEFAULT_LANGUAGE.to_string(),
            default_srid: WGS84_SRID,
            max_concurrent_searches: DEFAULT_MAX_CONCURRENT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(url) = env_value("PLACESEEK_ENGINE_URL") {
            config.engine_url = url;
        }
        if let Some(index) = env_value("PLACESEEK_INDEX") {
            config.index = index;
        }
        if let Some(dir) = env_value("PLACESEEK_TEMPLATE_DIR") {
            config.template_dir = PathBuf::from(dir);
        }
        if let Some(raw) = env_value("PLACESEEK_MAX_CONCURRENT") {
            match raw.parse() {
                Ok(n) => config.max_concurrent_searches = n,
                Err(e) => warn!(value = %raw, error = %e, "ignoring PLACESEEK_MAX_CONCURRENT"),
            }
        }
        config
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = url::Url::parse(&self.engine_url)?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid(format!(
                "engine URL must use http or https, got '{}'",
                url.scheme()
            )));
        }
        if self.index.is_empty() || self.index.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "index name must be a single non-empty path segment, got '{}'",
                self.index
            )));
        }
        if self.timeout.is_zero() {
            return Err(ConfigError::Invalid("timeout must be greater than 0".into()));
        }
        if self.max_limit == 0 {
            return Err(ConfigError::Invalid("max_limit must be greater than 0".into()));
        }
        if self.default_limit == 0 || self.default_limit > self.max_limit {
            return Err(ConfigError::Invalid(format!(
                "default_limit must be between 1 and {}",
                self.max_limit
            )));
        }
        if self.supported_languages.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one language must be supported".into(),
            ));
        }
        if !self.supported_languages.contains(&self.default_language) {
            return Err(ConfigError::Invalid(format!(
                "default language '{}' is not in the supported set",
                self.default_language
            )));
        }
        if self.max_concurrent_searches == 0
            || self.max_concurrent_searches > Semaphore::MAX_PERMITS
        {
            return Err(ConfigError::Invalid(format!(
                "max_concurrent_searches must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }
        Ok(())
    }
}

fn env_value(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
