use std::{env, fmt, time::Duration};

use url::Url;

use super::{
    lookback_duration, DEFAULT_LOOKBACK_HOURS, DEFAULT_NETCRAFT_BASE_URL, MAX_LOOKBACK_HOURS,
};

/// Application runtime environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Test,
}

impl Environment {
    fn from_str(value: &str) -> Result<Self, ConfigError> {
        match value {
            "development" | "dev" => Ok(Self::Development),
            "production" | "prod" => Ok(Self::Production),
            "test" => Ok(Self::Test),
            other => Err(ConfigError::InvalidEnvironment(other.to_string())),
        }
    }

    /// Returns the canonical name used for logging labels.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Test => "test",
        }
    }
}

/// Location of the document store and the containers the job reads and writes.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub uri: String,
    pub access_key: Option<String>,
    pub database_id: String,
    pub source_container: String,
    pub results_container: String,
}

impl StoreConfig {
    /// Human readable `dbs/<db>/colls/<container>` link for the source container.
    pub fn source_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database_id, self.source_container)
    }

    /// Human readable `dbs/<db>/colls/<container>` link for the results container.
    pub fn results_link(&self) -> String {
        format!("dbs/{}/colls/{}", self.database_id, self.results_container)
    }
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreConfig")
            .field("uri", &self.uri)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("database_id", &self.database_id)
            .field("source_container", &self.source_container)
            .field("results_container", &self.results_container)
            .finish()
    }
}

/// Runtime configuration resolved from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: Environment,
    pub store: StoreConfig,
    pub netcraft_base_url: Url,
    pub lookback: Duration,
}

impl AppConfig {
    /// Constructs the configuration by reading and validating environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let env_value = env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());
        let environment = Environment::from_str(&env_value)?;

        let store = StoreConfig {
            uri: required("ACCOUNT_URI")?,
            access_key: optional("ACCOUNT_KEY"),
            database_id: required("DATABASE_ID")?,
            source_container: required("CONTAINER_ID")?,
            results_container: required("RESULTS_CONTAINER_ID")?,
        };

        let base_value = optional("NETCRAFT_BASE_URL")
            .unwrap_or_else(|| DEFAULT_NETCRAFT_BASE_URL.to_string());
        let netcraft_base_url = parse_base_url(&base_value)?;

        let lookback = match optional("LOOKBACK_HOURS") {
            Some(value) => value
                .parse::<u64>()
                .ok()
                .and_then(lookback_duration)
                .ok_or(ConfigError::InvalidLookback(value))?,
            None => lookback_duration(DEFAULT_LOOKBACK_HOURS)
                .ok_or_else(|| ConfigError::InvalidLookback(DEFAULT_LOOKBACK_HOURS.to_string()))?,
        };

        Ok(Self {
            environment,
            store,
            netcraft_base_url,
            lookback,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

// `Url::join` drops the last path segment unless the base ends with a slash.
fn parse_base_url(value: &str) -> Result<Url, ConfigError> {
    let normalized = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&normalized).map_err(|err| ConfigError::InvalidBaseUrl(value.to_string(), err))
}

/// Errors that can occur during configuration loading.
#[derive(Debug)]
pub enum ConfigError {
    InvalidEnvironment(String),
    Missing(&'static str),
    InvalidBaseUrl(String, url::ParseError),
    InvalidLookback(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidEnvironment(value) => write!(
                f,
                "APP_ENV must be one of 'development', 'production', or 'test' (got {value})"
            ),
            Self::Missing(name) => write!(f, "required environment variable {name} is not set"),
            Self::InvalidBaseUrl(value, err) => {
                write!(f, "invalid NETCRAFT_BASE_URL value '{value}': {err}")
            }
            Self::InvalidLookback(value) => write!(
                f,
                "LOOKBACK_HOURS must be a whole number of hours between 1 and {MAX_LOOKBACK_HOURS} (got {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {}
