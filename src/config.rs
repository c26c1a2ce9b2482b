use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8081;
const DEFAULT_RATE_LIMIT_COUNT: u32 = 100;
const DEFAULT_RATE_LIMIT_SECONDS: u64 = 60;

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub admin_token: String,
    pub rate_limit_count: u32,
    pub rate_limit_window: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{key} is not a valid number: {source}")]
    Invalid {
        key: &'static str,
        #[source]
        source: std::num::ParseIntError,
    },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        Ok(Self {
            port: parse(&lookup, "STREAMHUB_PORT", DEFAULT_PORT)?,
            admin_token: lookup("STREAMHUB_ADMIN_TOKEN")
                .ok_or(ConfigError::Missing("STREAMHUB_ADMIN_TOKEN"))?,
            rate_limit_count: parse(
                &lookup,
                "STREAMHUB_RATE_LIMIT_COUNT",
                DEFAULT_RATE_LIMIT_COUNT,
            )?,
            rate_limit_window: Duration::from_secs(parse(
                &lookup,
                "STREAMHUB_RATE_LIMIT_SECONDS",
                DEFAULT_RATE_LIMIT_SECONDS,
            )?),
        })
    }
}

fn parse<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr<Err = std::num::ParseIntError>,
{
    match lookup(key) {
        Some(raw) => raw.parse().map_err(|source| ConfigError::Invalid { key, source }),
        None => Ok(default),
    }
}
