use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Result, ShimError};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 11435,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: String,
    /// Empty means no `Authorization` header is sent.
    pub api_key: String,
    pub timeout_secs: u64,
    /// Extra attempts after the first one.
    pub retry: u32,
    /// Reported as `model` in every envelope the shim builds itself.
    pub model_label: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.qhaigc.net/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 60,
            retry: 2,
            model_label: "gemini-2.5-pro".to_string(),
        }
    }
}

impl UpstreamConfig {
    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Defaults, then an optional TOML file, then environment overrides.
    pub fn load() -> Result<Self> {
        let mut settings = match Self::find_config_file() {
            Some(path) => Self::from_file(path)?,
            None => Settings::default(),
        };
        settings.apply_env_with(|k| std::env::var(k).ok());
        Ok(settings)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Ok(toml::from_str(&content)?)
    }

    pub fn apply_env_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        if let Some(v) = get("QHAI_BASE") {
            self.upstream.base_url = v;
        }
        if let Some(v) = get("QHAI_KEY") {
            self.upstream.api_key = v;
        }
        if let Some(v) = get("SHIM_TIMEOUT_SECONDS").and_then(|s| s.parse().ok()) {
            self.upstream.timeout_secs = v;
        }
        if let Some(v) = get("SHIM_RETRY").and_then(|s| s.parse().ok()) {
            self.upstream.retry = v;
        }
        if let Some(v) = get("SHIM_MODEL") {
            self.upstream.model_label = v;
        }
        if let Some(v) = get("SHIM_HOST") {
            self.server.host = v;
        }
        if let Some(v) = get("SHIM_PORT").and_then(|s| s.parse().ok()) {
            self.server.port = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.upstream.timeout_secs == 0 {
            return Err(ShimError::Config(
                "upstream.timeout_secs must be greater than 0".into(),
            ));
        }
        reqwest::Url::parse(&self.upstream.base_url).map_err(|e| {
            ShimError::Config(format!(
                "invalid upstream base url `{}`: {}",
                self.upstream.base_url, e
            ))
        })?;
        Ok(())
    }

    fn find_config_file() -> Option<&'static str> {
        let possible_names = ["shim.toml", "config.toml"];
        possible_names.into_iter().find(|name| Path::new(name).exists())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let s = Settings::default();
        assert_eq!(s.upstream.timeout_secs, 60);
        assert_eq!(s.upstream.retry, 2);
        assert_eq!(s.upstream.api_key, "");
        assert_eq!(s.server.port, 11435);
        assert_eq!(
            s.upstream.chat_completions_url(),
            "https://api.qhaigc.net/v1/chat/completions"
        );
    }

    #[test]
    fn env_overrides_win_and_blank_values_are_ignored() {
        let mut s = Settings::default();
        s.apply_env_with(env(&[
            ("QHAI_BASE", "http://127.0.0.1:9000/v1/"),
            ("QHAI_KEY", "  "),
            ("SHIM_TIMEOUT_SECONDS", "5"),
            ("SHIM_RETRY", "0"),
            ("SHIM_PORT", "not-a-port"),
        ]));
        assert_eq!(
            s.upstream.chat_completions_url(),
            "http://127.0.0.1:9000/v1/chat/completions"
        );
        assert_eq!(s.upstream.api_key, "");
        assert_eq!(s.upstream.timeout(), Duration::from_secs(5));
        assert_eq!(s.upstream.retry, 0);
        assert_eq!(s.server.port, 11435);
    }

    #[test]
    fn partial_toml_file_keeps_defaults_for_missing_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upstream]\napi_key = \"sk-test\"\nretry = 4").unwrap();
        let s = Settings::from_file(file.path()).unwrap();
        assert_eq!(s.upstream.api_key, "sk-test");
        assert_eq!(s.upstream.retry, 4);
        assert_eq!(s.upstream.timeout_secs, 60);
        assert_eq!(s.server.host, "0.0.0.0");
    }

    #[test]
    fn malformed_toml_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[upstream\nretry = ").unwrap();
        assert!(matches!(
            Settings::from_file(file.path()),
            Err(ShimError::Toml(_))
        ));
    }

    #[test]
    fn validate_rejects_zero_timeout_and_bad_url() {
        let mut s = Settings::default();
        s.upstream.timeout_secs = 0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.upstream.base_url = "not a url".into();
        assert!(s.validate().is_err());

        assert!(Settings::default().validate().is_ok());
    }
}
