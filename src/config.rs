//! Environment-driven configuration.
//!
//! Every setting has a default so a bare `cargo run` scrapes the default
//! search. A `.env` file in the working directory is honoured.

use crate::error::ConfigError;
use crate::scrapers::types::{SearchConfig, SelectorRules};
use crate::store::DuplicatePolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub search: SearchConfig,
    pub db_path: PathBuf,
    pub output_dir: PathBuf,
    pub selectors: SelectorRules,
    pub timeout: Duration,
    pub max_retries: u32,
    pub duplicate_policy: DuplicatePolicy,
    pub analysis: bool,
}

impl AppConfig {
    /// Load `.env` if present, then read `SCOUT_*` variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = SearchConfig::default();
        let search = SearchConfig {
            city: lookup("SCOUT_CITY").unwrap_or(defaults.city),
            search_term: lookup("SCOUT_SEARCH_TERM").unwrap_or(defaults.search_term),
            url_template: lookup("SCOUT_URL_TEMPLATE").unwrap_or(defaults.url_template),
            pages: parsed(&lookup, "SCOUT_PAGES", defaults.pages)?,
        };
        if search.pages == 0 {
            return Err(ConfigError::Invalid {
                key: "SCOUT_PAGES",
                value: "0".to_string(),
            });
        }

        let selectors = match lookup("SCOUT_SELECTORS") {
            Some(path) => load_selectors(&path)?,
            None => SelectorRules::default(),
        };

        let timeout_secs: u64 = parsed(&lookup, "SCOUT_TIMEOUT_SECS", 30)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "SCOUT_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        Ok(Self {
            search,
            db_path: lookup("SCOUT_DB_PATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("data/listings.db")),
            output_dir: lookup("SCOUT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("output")),
            selectors,
            timeout: Duration::from_secs(timeout_secs),
            max_retries: parsed(&lookup, "SCOUT_MAX_RETRIES", 2)?,
            duplicate_policy: parsed(
                &lookup,
                "SCOUT_DUPLICATE_POLICY",
                DuplicatePolicy::Overwrite,
            )?,
            analysis: flag(&lookup, "SCOUT_ANALYSIS", true)?,
        })
    }
}

fn parsed<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value }),
        None => Ok(default),
    }
}

fn flag<F>(lookup: &F, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) => match value.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value }),
        },
        None => Ok(default),
    }
}

fn load_selectors(path: &str) -> Result<SelectorRules, ConfigError> {
    let selectors_err = |message: String| ConfigError::Selectors {
        path: path.to_string(),
        message,
    };
    let json = std::fs::read_to_string(path).map_err(|e| selectors_err(e.to_string()))?;
    serde_json::from_str(&json).map_err(|e| selectors_err(e.to_string()))
}
