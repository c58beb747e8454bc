use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants::{
    DATABASE_URL_ENV, EXTRACTION_UPPER_BOUND, EXTRACTION_WORKERS, GEOCODE_BACKOFF_MS,
    GEOCODE_MAX_ATTEMPTS, GEOCODE_RATE_LIMIT_MS, HTTP_TIMEOUT_SECONDS, LOG_DIR,
    NASA_METEORITE_ENDPOINT, NOMINATIM_ENDPOINT, OUTPUT_DIR, PAGE_SIZE, USER_AGENT,
};
use crate::error::{EtlError, Result};
use crate::pipeline::processing::locate::GeocodingPolicy;
use crate::pipeline::ExtractionPlan;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub extraction: ExtractionConfig,
    pub geocoding: GeocodingConfig,
    pub output: OutputConfig,
    /// Storage target, only ever read from the environment
    #[serde(skip)]
    pub database_url: Option<String>,
    #[serde(skip)]
    pub database_auth_token: Option<String>,
    #[serde(skip)]
    pub metrics_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    pub endpoint: String,
    pub page_size: u64,
    pub workers: usize,
    pub upper_bound: u64,
    pub timeout_seconds: u64,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            endpoint: NASA_METEORITE_ENDPOINT.to_string(),
            page_size: PAGE_SIZE,
            workers: EXTRACTION_WORKERS,
            upper_bound: EXTRACTION_UPPER_BOUND,
            timeout_seconds: HTTP_TIMEOUT_SECONDS,
        }
    }
}

impl ExtractionConfig {
    pub fn plan(&self) -> ExtractionPlan {
        ExtractionPlan {
            upper_bound: self.upper_bound,
            workers: self.workers,
            page_size: self.page_size,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeocodingConfig {
    pub endpoint: String,
    pub user_agent: String,
    pub rate_limit_ms: u64,
    pub backoff_ms: u64,
    pub max_attempts: u32,
    pub timeout_seconds: u64,
}

impl Default for GeocodingConfig {
    fn default() -> Self {
        Self {
            endpoint: NOMINATIM_ENDPOINT.to_string(),
            user_agent: USER_AGENT.to_string(),
            rate_limit_ms: GEOCODE_RATE_LIMIT_MS,
            backoff_ms: GEOCODE_BACKOFF_MS,
            max_attempts: GEOCODE_MAX_ATTEMPTS,
            timeout_seconds: HTTP_TIMEOUT_SECONDS,
        }
    }
}

impl GeocodingConfig {
    pub fn policy(&self) -> GeocodingPolicy {
        GeocodingPolicy {
            rate_limit: Duration::from_millis(self.rate_limit_ms),
            backoff: Duration::from_millis(self.backoff_ms),
            max_attempts: self.max_attempts,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub log_dir: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: OUTPUT_DIR.to_string(),
            log_dir: LOG_DIR.to_string(),
        }
    }
}

impl Config {
    /// Loads `.env`, then the TOML file (a missing file means defaults), then
    /// environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        dotenv::dotenv().ok();

        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                EtlError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
            })?;
            Self::from_toml(&content)?
        } else {
            Config::default()
        };

        config.database_url = std::env::var(DATABASE_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty());
        config.database_auth_token = std::env::var("LIBSQL_AUTH_TOKEN").ok();
        config.metrics_port = match std::env::var("METEORITE_METRICS_PORT") {
            Ok(port) => Some(port.parse().map_err(|_| {
                EtlError::Config(format!("METEORITE_METRICS_PORT is not a port: {port}"))
            })?),
            Err(_) => None,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.extraction.workers == 0 {
            return Err(EtlError::Config("extraction.workers must be at least 1".into()));
        }
        if self.extraction.page_size == 0 {
            return Err(EtlError::Config("extraction.page_size must be at least 1".into()));
        }
        if self.geocoding.max_attempts == 0 {
            return Err(EtlError::Config("geocoding.max_attempts must be at least 1".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_the_nasa_setup() {
        let config = Config::default();
        let plan = config.extraction.plan();
        assert_eq!(plan.page_size, 999);
        assert_eq!(plan.workers, 5);
        assert_eq!(plan.upper_bound, 50_000);

        let policy = config.geocoding.policy();
        assert_eq!(policy.rate_limit, Duration::from_millis(300));
        assert_eq!(policy.backoff, Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = Config::from_toml(
            r#"
            [extraction]
            workers = 8

            [geocoding]
            max_attempts = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.extraction.workers, 8);
        assert_eq!(config.extraction.page_size, 999);
        assert_eq!(config.geocoding.max_attempts, 3);
        assert_eq!(config.geocoding.rate_limit_ms, 300);
        assert_eq!(config.output.dir, "output");
    }

    #[test]
    fn test_zero_workers_is_rejected() {
        let config = Config::from_toml("[extraction]\nworkers = 0\n").unwrap();
        assert!(matches!(config.validate(), Err(EtlError::Config(_))));
    }
}
