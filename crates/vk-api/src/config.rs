//! Client settings
//!
//! Deserializable so applications can embed it as a table of their own config
//! file (the `[api]` table of `vk-call.toml`).

use std::time::Duration;

use serde::Deserialize;

use crate::constants::{API_URL, API_VERSION, DEFAULT_REQUESTS_PER_SECOND};
use crate::error::{Error, Result};
use crate::language::Language;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Method dispatch URL, ending in `/`
    pub url: String,
    pub version: String,
    pub language: Option<Language>,
    /// `0` disables client-side rate limiting
    pub requests_per_second: u32,
    pub timeout_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: API_URL.to_string(),
            version: API_VERSION.to_string(),
            language: None,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            timeout_secs: 30,
        }
    }
}

impl ClientConfig {
    pub fn validate(&self) -> Result<()> {
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(Error::Config(format!(
                "api url must start with http:// or https://, got: {}",
                self.url
            )));
        }
        if !self.url.ends_with('/') {
            return Err(Error::Config(format!("api url must end with '/', got: {}", self.url)));
        }
        if self.version.trim().is_empty() {
            return Err(Error::Config("api version must not be empty".into()));
        }
        if self.timeout_secs == 0 {
            return Err(Error::Config("timeout_secs must be greater than 0".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ClientConfig::default();
        config.validate().unwrap();
        assert_eq!(config.requests_per_second, 3);
        assert_eq!(config.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn partial_table_fills_defaults() {
        let config: ClientConfig = from_json(r#"{"language":"en","requests_per_second":20}"#);
        assert_eq!(config.language, Some(Language::En));
        assert_eq!(config.requests_per_second, 20);
        assert_eq!(config.version, API_VERSION);
    }

    #[test]
    fn rejects_bad_url_and_zero_timeout() {
        let mut config = ClientConfig {
            url: "api.vk.com/method/".into(),
            ..ClientConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.url = "https://api.vk.com/method".into();
        assert!(config.validate().is_err());

        config.url = API_URL.into();
        config.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    fn from_json(json: &str) -> ClientConfig {
        serde_json::from_str(json).unwrap()
    }
}
