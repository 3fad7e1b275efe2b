//! Endpoint configuration, read from the environment.

use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4.1-mini";
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o-mini";

/// Settings shared by the proposer and the critic.
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    /// `None` disables every call; adapters then fail fast.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    pub base_url: String,
    /// Model for shader generation, editing and repair.
    pub model: String,
    /// Model for critique and discovery.
    pub vision_model: String,
    pub vision_disabled: bool,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            vision_model: DEFAULT_VISION_MODEL.to_string(),
            vision_disabled: false,
            timeout_secs: 120,
        }
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("vision_model", &self.vision_model)
            .field("vision_disabled", &self.vision_disabled)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl LlmConfig {
    /// Read `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_MODEL`,
    /// `OPENAI_VISION_MODEL` and `VISION_DISABLED`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();
        Self {
            api_key: non_empty("OPENAI_API_KEY"),
            base_url: non_empty("OPENAI_BASE_URL")
                .map(|u| u.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            model: non_empty("OPENAI_MODEL").unwrap_or(defaults.model),
            vision_model: non_empty("OPENAI_VISION_MODEL").unwrap_or(defaults.vision_model),
            vision_disabled: matches!(
                lookup("VISION_DISABLED").as_deref(),
                Some("1" | "true" | "TRUE")
            ),
            timeout_secs: defaults.timeout_secs,
        }
    }

    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
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
    fn test_defaults_without_env() {
        let cfg = LlmConfig::from_lookup(lookup(&[]));
        assert!(!cfg.has_credentials());
        assert_eq!(cfg.model, "gpt-4.1-mini");
        assert_eq!(cfg.vision_model, "gpt-4o-mini");
        assert_eq!(cfg.completions_url(), "https://api.openai.com/v1/chat/completions");
        assert!(!cfg.vision_disabled);
    }

    #[test]
    fn test_env_overrides() {
        let cfg = LlmConfig::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_BASE_URL", "http://localhost:8080/v1/"),
            ("OPENAI_MODEL", "local-coder"),
            ("VISION_DISABLED", "TRUE"),
        ]));
        assert!(cfg.has_credentials());
        assert_eq!(cfg.completions_url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(cfg.model, "local-coder");
        assert!(cfg.vision_disabled);
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        let cfg = LlmConfig::from_lookup(lookup(&[("OPENAI_API_KEY", "  ")]));
        assert!(!cfg.has_credentials());
    }

    #[test]
    fn test_vision_disabled_values() {
        for (value, expected) in [("1", true), ("true", true), ("yes", false), ("0", false)] {
            let cfg = LlmConfig::from_lookup(lookup(&[("VISION_DISABLED", value)]));
            assert_eq!(cfg.vision_disabled, expected, "{value}");
        }
    }

    #[test]
    fn test_debug_redacts_key() {
        let cfg = LlmConfig::default().with_api_key("sk-secret");
        assert!(!format!("{cfg:?}").contains("sk-secret"));
    }

    #[test]
    fn test_serialize_omits_key() {
        let cfg = LlmConfig::default().with_api_key("sk-secret");
        let json = serde_json::to_string(&cfg).expect("serialize");
        assert!(!json.contains("sk-secret"));
        assert!(!json.contains("api_key"));

        let back: LlmConfig = serde_json::from_str(&json).expect("deserialize");
        assert!(!back.has_credentials());
        assert_eq!(back.model, cfg.model);
    }
}
