use anyhow::{Context, Result};

use crate::ats::aggregator::DEFAULT_SCORE_DISAGREEMENT_THRESHOLD;

/// One week.
const DEFAULT_SECTION_CACHE_TTL_SECS: u64 = 7 * 24 * 60 * 60;

/// Application configuration loaded from environment variables.
/// Startup fails if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub redis_url: String,
    pub anthropic_api_key: String,
    pub port: u16,
    pub rust_log: String,
    /// Points of disagreement tolerated between the model's overall score and
    /// the weighted breakdown.
    pub score_disagreement_threshold: i64,
    pub section_cache_ttl_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            redis_url: require_env("REDIS_URL")?,
            anthropic_api_key: require_env("ANTHROPIC_API_KEY")?,
            port: optional_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            score_disagreement_threshold: optional_env(
                "ATS_SCORE_DISAGREEMENT_THRESHOLD",
                DEFAULT_SCORE_DISAGREEMENT_THRESHOLD,
            )
            .context("ATS_SCORE_DISAGREEMENT_THRESHOLD must be an integer")?,
            section_cache_ttl_secs: optional_env(
                "SECTION_CACHE_TTL_SECS",
                DEFAULT_SECTION_CACHE_TTL_SECS,
            )
            .context("SECTION_CACHE_TTL_SECS must be a whole number of seconds")?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn optional_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => Ok(raw.trim().parse::<T>()?),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_env_default_and_parse() {
        std::env::remove_var("ATS_TEST_UNSET_VAR");
        assert_eq!(optional_env("ATS_TEST_UNSET_VAR", 10i64).unwrap(), 10);

        std::env::set_var("ATS_TEST_SET_VAR", " 15 ");
        assert_eq!(optional_env("ATS_TEST_SET_VAR", 10i64).unwrap(), 15);

        std::env::set_var("ATS_TEST_BAD_VAR", "ten");
        assert!(optional_env("ATS_TEST_BAD_VAR", 10i64).is_err());
    }
}
