use crate::error::ConfigError;
use std::str::FromStr;
use std::time::Duration;

/// Runtime settings, read from the environment (and `.env` when present).
#[derive(Debug, Clone)]
pub struct Config {
    pub lastfm_api_key: String,
    pub lastfm_username: Option<String>,
    pub youtube_api_key: Option<String>,
    pub cache_url: String,
    pub cache_ttl: Duration,
    pub default_limit: u32,
    pub max_limit: u32,
    pub upstream_timeout: Duration,
    pub rate_limit_backoff: Duration,
    pub enrichment_concurrency: usize,
    pub enrich_recommendations: bool,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let lastfm_api_key = var("LASTFM_API_KEY")
            .or_else(|| var("API_KEY"))
            .ok_or(ConfigError::Missing("LASTFM_API_KEY"))?;

        let max_limit: u32 = parse_or(&var, "MAX_RESULT_LIMIT", 50)?;
        let default_limit: u32 = parse_or(&var, "DEFAULT_RESULT_LIMIT", 10)?;
        if max_limit == 0 {
            return Err(invalid("MAX_RESULT_LIMIT", "0"));
        }
        if default_limit == 0 {
            return Err(invalid("DEFAULT_RESULT_LIMIT", "0"));
        }

        let enrichment_concurrency: usize = parse_or(&var, "ENRICHMENT_CONCURRENCY", 8)?;

        Ok(Self {
            lastfm_api_key,
            lastfm_username: var("LASTFM_USERNAME"),
            youtube_api_key: var("YOUTUBE_API_KEY"),
            cache_url: var("CACHE_URL")
                .or_else(|| var("REDIS_URL"))
                .unwrap_or_else(|| "memory://".to_string()),
            cache_ttl: Duration::from_secs(parse_or(&var, "CACHE_TTL_SECONDS", 30 * 60)?),
            default_limit: default_limit.min(max_limit),
            max_limit,
            upstream_timeout: Duration::from_secs(parse_or(&var, "UPSTREAM_TIMEOUT_SECONDS", 10)?),
            rate_limit_backoff: Duration::from_millis(parse_or(&var, "RATE_LIMIT_BACKOFF_MS", 1000)?),
            enrichment_concurrency: enrichment_concurrency.max(1),
            enrich_recommendations: parse_bool_or(&var, "ENRICH_RECOMMENDATIONS", true)?,
            bind_addr: var("BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string()),
        })
    }
}

fn invalid(name: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
    }
}

fn parse_or<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match var(name) {
        Some(raw) => raw.trim().parse().map_err(|_| invalid(name, &raw)),
        None => Ok(default),
    }
}

fn parse_bool_or(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match var(name) {
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(invalid(name, &raw)),
        },
        None => Ok(default),
    }
}
