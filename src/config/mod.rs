//! Runtime settings loaded from the environment (or a `.env` file via `dotenvy`).
//!
//! Only the binary calls [`Settings::from_env`]. Components receive the narrow
//! config structs built from it ([`XApiConfig`], [`OpenAiConfig`],
//! [`StoreConfig`]) and never read the environment themselves.

pub mod ai;

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{bail, Result};

pub use ai::OpenAiConfig;

pub const DEFAULT_X_API_BASE_URL: &str = "https://api.twitter.com/2";
pub const DEFAULT_USERNAME: &str = "financialjuice";
pub const DEFAULT_TWEET_LIMIT: usize = 50;
pub const DEFAULT_OUTPUT_DIR: &str = "./data";
pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8000";
pub const DEFAULT_UI_DIR: &str = "ui";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

pub const ENV_X_BEARER_TOKEN: &str = "X_BEARER_TOKEN";
pub const ENV_OPENAI_API_KEY: &str = "OPENAI_API_KEY";

/// Top-level settings. `Debug` is implemented by hand so secrets never reach logs.
#[derive(Clone)]
pub struct Settings {
    pub x_bearer_token: String,
    pub x_api_base_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
    pub openai_base_url: String,
    pub openai_temperature: Option<f32>,
    pub tweet_limit: usize,
    pub default_username: String,
    pub output_dir: PathBuf,
    pub http_timeout_secs: u64,
    pub listen_addr: SocketAddr,
    pub ui_dir: PathBuf,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("x_bearer_token_len", &self.x_bearer_token.len())
            .field("x_api_base_url", &self.x_api_base_url)
            .field("openai_api_key_len", &self.openai_api_key.len())
            .field("openai_model", &self.openai_model)
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_temperature", &self.openai_temperature)
            .field("tweet_limit", &self.tweet_limit)
            .field("default_username", &self.default_username)
            .field("output_dir", &self.output_dir)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("listen_addr", &self.listen_addr)
            .field("ui_dir", &self.ui_dir)
            .finish()
    }
}

impl Settings {
    /// Load `.env` (if present) and read settings from the process environment.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same parsing as [`Settings::from_env`] over an arbitrary key lookup.
    /// Missing or unparsable values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let default_addr: SocketAddr = DEFAULT_LISTEN_ADDR
            .parse()
            .unwrap_or_else(|_| SocketAddr::from(([127, 0, 0, 1], 8000)));

        Self {
            x_bearer_token: get(ENV_X_BEARER_TOKEN).unwrap_or_default(),
            x_api_base_url: get("X_API_BASE_URL")
                .unwrap_or_else(|| DEFAULT_X_API_BASE_URL.to_string()),
            openai_api_key: get(ENV_OPENAI_API_KEY).unwrap_or_default(),
            openai_model: get("OPENAI_MODEL")
                .unwrap_or_else(|| ai::DEFAULT_OPENAI_MODEL.to_string()),
            openai_base_url: get("OPENAI_BASE_URL")
                .unwrap_or_else(|| ai::DEFAULT_OPENAI_BASE_URL.to_string()),
            openai_temperature: parse_opt(get("OPENAI_TEMPERATURE"))
                .filter(|t: &f32| (0.0..=2.0).contains(t)),
            tweet_limit: parse_opt(get("TWEET_LIMIT"))
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_TWEET_LIMIT),
            default_username: get("TWEET_USERNAME")
                .unwrap_or_else(|| DEFAULT_USERNAME.to_string()),
            output_dir: get("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR)),
            http_timeout_secs: parse_opt(get("HTTP_TIMEOUT_SECS"))
                .filter(|n: &u64| *n > 0)
                .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS),
            listen_addr: parse_opt(get("LISTEN_ADDR")).unwrap_or(default_addr),
            ui_dir: get("UI_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_UI_DIR)),
        }
    }

    /// Fail early with a readable message when a pipeline run lacks credentials.
    pub fn require_credentials(&self) -> Result<()> {
        if self.x_bearer_token.is_empty() {
            bail!("Missing {ENV_X_BEARER_TOKEN} env var");
        }
        if self.openai_api_key.is_empty() {
            bail!("Missing {ENV_OPENAI_API_KEY} env var");
        }
        Ok(())
    }

    pub fn x_api(&self) -> XApiConfig {
        XApiConfig {
            bearer_token: self.x_bearer_token.clone(),
            base_url: self.x_api_base_url.trim_end_matches('/').to_string(),
            timeout_secs: self.http_timeout_secs,
        }
    }

    pub fn openai(&self) -> OpenAiConfig {
        let mut cfg = OpenAiConfig::new(self.openai_api_key.clone())
            .with_model(self.openai_model.clone())
            .with_base_url(self.openai_base_url.clone());
        cfg.temperature = self.openai_temperature;
        cfg.timeout_secs = self.http_timeout_secs;
        cfg
    }

    pub fn store(&self) -> StoreConfig {
        StoreConfig {
            output_dir: self.output_dir.clone(),
        }
    }
}

fn parse_opt<T: std::str::FromStr>(raw: Option<String>) -> Option<T> {
    raw.and_then(|v| v.parse().ok())
}

/// X API v2 access for the tweet fetcher.
#[derive(Clone)]
pub struct XApiConfig {
    pub bearer_token: String,
    /// Without trailing slash, e.g. `https://api.twitter.com/2`.
    pub base_url: String,
    pub timeout_secs: u64,
}

impl XApiConfig {
    pub fn new(bearer_token: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            bearer_token: bearer_token.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
        }
    }
}

/// Root directory of the on-disk event store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub output_dir: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let s = Settings::from_lookup(|_| None);
        assert_eq!(s.tweet_limit, DEFAULT_TWEET_LIMIT);
        assert_eq!(s.default_username, DEFAULT_USERNAME);
        assert_eq!(s.output_dir, PathBuf::from(DEFAULT_OUTPUT_DIR));
        assert_eq!(s.openai_model, "gpt-5-nano");
        assert_eq!(s.listen_addr.port(), 8000);
        assert!(s.openai_temperature.is_none());
        assert!(s.require_credentials().is_err());
    }

    #[test]
    fn values_are_parsed_and_bad_numbers_fall_back() {
        let s = Settings::from_lookup(lookup(&[
            ("X_BEARER_TOKEN", "xt"),
            ("OPENAI_API_KEY", "ok"),
            ("OPENAI_MODEL", "gpt-4o-mini"),
            ("OPENAI_TEMPERATURE", "0"),
            ("TWEET_LIMIT", "not-a-number"),
            ("OUTPUT_DIR", "/tmp/out"),
            ("HTTP_TIMEOUT_SECS", "0"),
            ("X_API_BASE_URL", "http://localhost:1234/2/"),
        ]));
        assert!(s.require_credentials().is_ok());
        assert_eq!(s.tweet_limit, DEFAULT_TWEET_LIMIT);
        assert_eq!(s.http_timeout_secs, DEFAULT_HTTP_TIMEOUT_SECS);
        assert_eq!(s.openai_temperature, Some(0.0));
        assert_eq!(s.openai().model, "gpt-4o-mini");
        assert_eq!(s.x_api().base_url, "http://localhost:1234/2");
        assert_eq!(s.store().output_dir, PathBuf::from("/tmp/out"));
    }

    #[test]
    fn debug_output_hides_secrets() {
        let s = Settings::from_lookup(lookup(&[("OPENAI_API_KEY", "sk-secret")]));
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("sk-secret"));
        assert!(dbg.contains("openai_api_key_len: 9"));
    }

    #[test]
    fn missing_bearer_token_is_reported_by_name() {
        let s = Settings::from_lookup(lookup(&[("OPENAI_API_KEY", "ok")]));
        let err = s.require_credentials().unwrap_err().to_string();
        assert!(err.contains("X_BEARER_TOKEN"), "{err}");
    }
}
