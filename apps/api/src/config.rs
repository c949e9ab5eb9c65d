use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{Context, Result};

pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 300 * 1024 * 1024;

/// Application configuration loaded from environment variables.
/// Every variable is optional; malformed numbers fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub rust_log: String,
    pub upload_dir: PathBuf,
    pub standards_path: PathBuf,
    pub max_upload_bytes: usize,
    /// Enables citations when set.
    pub anthropic_api_key: Option<String>,
    pub anthropic_api_url: Option<String>,
    /// Required in `x-admin-token` for standards updates when set.
    pub admin_token: Option<String>,
    pub reference_fetch_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            upload_dir: PathBuf::from(
                optional_env("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_string()),
            ),
            standards_path: PathBuf::from(
                optional_env("STANDARDS_PATH")
                    .unwrap_or_else(|| "config/standards.json".to_string()),
            ),
            max_upload_bytes: parse_env("MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?,
            anthropic_api_key: optional_env("ANTHROPIC_API_KEY"),
            anthropic_api_url: optional_env("ANTHROPIC_API_URL"),
            admin_token: optional_env("ADMIN_TOKEN"),
            reference_fetch_timeout_secs: parse_env("REFERENCE_FETCH_TIMEOUT_SECS", 30)?,
        })
    }
}

/// Unset and blank are treated alike.
fn optional_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .parse::<T>()
            .with_context(|| format!("{key} must be a valid number, got '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test uses its own variable name; the process environment is shared
    // between test threads.

    #[test]
    fn test_parse_env_default() {
        assert_eq!(parse_env::<u16>("RAILCHECK_TEST_UNSET_PORT", 8080).unwrap(), 8080);
    }

    #[test]
    fn test_parse_env_value() {
        std::env::set_var("RAILCHECK_TEST_LIMIT", " 1024 ");
        assert_eq!(parse_env::<usize>("RAILCHECK_TEST_LIMIT", 1).unwrap(), 1024);
    }

    #[test]
    fn test_parse_env_rejects_garbage() {
        std::env::set_var("RAILCHECK_TEST_BAD_PORT", "eighty");
        let err = parse_env::<u16>("RAILCHECK_TEST_BAD_PORT", 8080).unwrap_err();
        assert!(err.to_string().contains("RAILCHECK_TEST_BAD_PORT"));
    }

    #[test]
    fn test_blank_is_unset() {
        std::env::set_var("RAILCHECK_TEST_BLANK", "   ");
        assert_eq!(optional_env("RAILCHECK_TEST_BLANK"), None);
    }
}
