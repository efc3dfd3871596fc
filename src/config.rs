use std::{str::FromStr, time::Duration};
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";
pub const DEMO_KEY: &str = "DEMO_KEY";

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_FILE_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_MAX_BODY_BYTES: usize = 25 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct Config {
    /// `None` runs the server in demo mode with placeholder images.
    pub api_key: Option<String>,
    pub api_base: String,
    pub model: String,
    pub port: u16,
    pub upstream_timeout: Duration,
    pub max_file_bytes: usize,
    pub max_body_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
            port: DEFAULT_PORT,
            upstream_timeout: Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS),
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Config::default();
        let non_empty = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api_key = non_empty("GEMINI_API_KEY").filter(|key| key != DEMO_KEY);
        let api_base = non_empty("GEMINI_API_BASE")
            .map(|v| v.trim_end_matches('/').to_string())
            .unwrap_or(defaults.api_base);
        let model = non_empty("GEMINI_MODEL").unwrap_or(defaults.model);

        Self {
            api_key,
            api_base,
            model,
            port: parse_or("PORT", non_empty("PORT"), defaults.port),
            upstream_timeout: Duration::from_secs(parse_or(
                "UPSTREAM_TIMEOUT_SECS",
                non_empty("UPSTREAM_TIMEOUT_SECS"),
                DEFAULT_UPSTREAM_TIMEOUT_SECS,
            )),
            max_file_bytes: parse_or("MAX_FILE_BYTES", non_empty("MAX_FILE_BYTES"), defaults.max_file_bytes),
            max_body_bytes: parse_or("MAX_BODY_BYTES", non_empty("MAX_BODY_BYTES"), defaults.max_body_bytes),
        }
    }
}

fn parse_or<T: FromStr + Copy>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        None => default,
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid value for {}: {:?}", key, raw);
            default
        }),
    }
}
