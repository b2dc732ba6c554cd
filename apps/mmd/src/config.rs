use std::time::Duration;

use anyhow::{Context, Result};

const DEFAULT_API_BASE_URL: &str = "http://localhost:8000/api";
/// The backend runs slow AI inference; three minutes matches the web client.
const DEFAULT_TIMEOUT_SECS: u64 = 180;
/// Session cookie lifetime issued by the backend (30 minutes).
const DEFAULT_SESSION_TTL_SECS: u64 = 1800;

/// Application configuration loaded from environment variables.
/// Every variable has a default, so a bare `mmd` invocation works against a local backend.
#[derive(Debug, Clone)]
pub struct Config {
    pub api_base_url: String,
    pub timeout: Duration,
    /// Fire a forced backend session clear when the CLI starts.
    pub clear_on_start: bool,
    pub stub_port: u16,
    pub session_ttl: Duration,
    pub rust_log: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            api_base_url: std::env::var("MMD_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            timeout: Duration::from_secs(parse_env("MMD_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?),
            clear_on_start: parse_env("MMD_CLEAR_ON_START", false)?,
            stub_port: parse_env("MMD_STUB_PORT", 8000)?,
            session_ttl: Duration::from_secs(parse_env(
                "MMD_SESSION_TTL_SECS",
                DEFAULT_SESSION_TTL_SECS,
            )?),
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            clear_on_start: false,
            stub_port: 8000,
            session_ttl: Duration::from_secs(DEFAULT_SESSION_TTL_SECS),
            rust_log: "info".to_string(),
        }
    }
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_env_falls_back_to_default() {
        let value: u64 = parse_env("MMD_TEST_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("MMD_TEST_BAD_PORT", "not-a-port");
        let result: Result<u16> = parse_env("MMD_TEST_BAD_PORT", 8000);
        assert!(result.is_err());
        std::env::remove_var("MMD_TEST_BAD_PORT");
    }

    #[test]
    fn test_default_timeout_is_three_minutes() {
        assert_eq!(Config::default().timeout, Duration::from_secs(180));
    }
}
