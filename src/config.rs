//! Planner configuration
//!
//! Everything the requester needs, the API key included, is carried in an
//! explicit value passed to the client.

use crate::attractions::AttractionSource;
use crate::PlannerError;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_TEMPERATURE: f32 = 0.7;

/// Chat-completion providers with known endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChatProvider {
    #[default]
    DeepSeek,
    Moonshot,
    /// OpenAI-compatible endpoint supplied via `base_url`
    Custom,
}

impl ChatProvider {
    pub fn default_base_url(self) -> &'static str {
        match self {
            ChatProvider::DeepSeek => "https://api.deepseek.com/v1/chat/completions",
            ChatProvider::Moonshot => "https://api.moonshot.cn/v1/chat/completions",
            ChatProvider::Custom => "http://localhost:8000/v1/chat/completions",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ChatProvider::DeepSeek => "deepseek-chat",
            ChatProvider::Moonshot => "moonshot-v1-8k",
            ChatProvider::Custom => "default",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            ChatProvider::DeepSeek => "deepseek",
            ChatProvider::Moonshot => "moonshot",
            ChatProvider::Custom => "custom",
        }
    }
}

impl FromStr for ChatProvider {
    type Err = PlannerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "deepseek" => Ok(ChatProvider::DeepSeek),
            "moonshot" | "kimi" => Ok(ChatProvider::Moonshot),
            "custom" | "openai-compatible" => Ok(ChatProvider::Custom),
            _ => Err(PlannerError::ConfigError(format!("Invalid provider: {}", s))),
        }
    }
}

/// Settings for one planner instance
#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub provider: ChatProvider,
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    /// No timeout unless one is set
    pub timeout: Option<Duration>,
    pub attractions: AttractionSource,
}

impl PlannerConfig {
    pub fn new(provider: ChatProvider) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: provider.default_base_url().to_string(),
            model: provider.default_model().to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            timeout: None,
            attractions: AttractionSource::Bundled,
        }
    }

    /// Read settings from `ITINERARY_*` environment variables
    pub fn from_env() -> Result<Self, PlannerError> {
        let provider = match env_value("ITINERARY_PROVIDER") {
            Some(value) => value.parse::<ChatProvider>()?,
            None => ChatProvider::default(),
        };

        let mut config = Self::new(provider);
        config.api_key = env_value("ITINERARY_API_KEY");

        if let Some(base_url) = env_value("ITINERARY_BASE_URL") {
            config.base_url = base_url;
        }
        if let Some(model) = env_value("ITINERARY_MODEL") {
            config.model = model;
        }
        if let Some(max_tokens) = parse_env::<u32>("ITINERARY_MAX_TOKENS")? {
            config.max_tokens = max_tokens;
        }
        if let Some(temperature) = parse_env::<f32>("ITINERARY_TEMPERATURE")? {
            config.temperature = temperature;
        }
        if let Some(secs) = parse_env::<u64>("ITINERARY_TIMEOUT_SECS")? {
            config.timeout = Some(Duration::from_secs(secs));
        }
        if let Some(path) = env_value("ITINERARY_ATTRACTIONS_PATH") {
            config.attractions = AttractionSource::File(PathBuf::from(path));
        }

        debug!(
            provider = config.provider.name(),
            base_url = %config.base_url,
            model = %config.model,
            has_api_key = config.api_key.is_some(),
            "Loaded planner configuration from environment"
        );
        Ok(config)
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_attractions(mut self, attractions: AttractionSource) -> Self {
        self.attractions = attractions;
        self
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self::new(ChatProvider::default())
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_env<T: FromStr>(name: &str) -> Result<Option<T>, PlannerError> {
    env_value(name)
        .map(|value| {
            value
                .parse::<T>()
                .map_err(|_| PlannerError::ConfigError(format!("Invalid value for {}: {}", name, value)))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "ITINERARY_PROVIDER",
        "ITINERARY_API_KEY",
        "ITINERARY_BASE_URL",
        "ITINERARY_MODEL",
        "ITINERARY_MAX_TOKENS",
        "ITINERARY_TEMPERATURE",
        "ITINERARY_TIMEOUT_SECS",
        "ITINERARY_ATTRACTIONS_PATH",
    ];

    fn clear_env() {
        for var in VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    fn test_provider_parsing() {
        assert!(matches!("deepseek".parse::<ChatProvider>(), Ok(ChatProvider::DeepSeek)));
        assert!(matches!("Kimi".parse::<ChatProvider>(), Ok(ChatProvider::Moonshot)));
        assert!(matches!("custom".parse::<ChatProvider>(), Ok(ChatProvider::Custom)));
        assert!("invalid".parse::<ChatProvider>().is_err());
    }

    #[test]
    fn test_provider_defaults() {
        let config = PlannerConfig::new(ChatProvider::Moonshot);
        assert_eq!(config.base_url, "https://api.moonshot.cn/v1/chat/completions");
        assert_eq!(config.model, "moonshot-v1-8k");
        assert_eq!(config.max_tokens, 2000);
        assert!(config.timeout.is_none());
        assert!(config.api_key.is_none());
        assert_eq!(config.attractions, AttractionSource::Bundled);
    }

    #[test]
    #[serial]
    fn test_from_env_defaults() {
        clear_env();
        let config = PlannerConfig::from_env().unwrap();
        assert_eq!(config.provider, ChatProvider::DeepSeek);
        assert_eq!(config.model, "deepseek-chat");
        assert!(config.api_key.is_none());
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        clear_env();
        std::env::set_var("ITINERARY_PROVIDER", "moonshot");
        std::env::set_var("ITINERARY_API_KEY", "sk-test");
        std::env::set_var("ITINERARY_MODEL", "moonshot-v1-32k");
        std::env::set_var("ITINERARY_TIMEOUT_SECS", "30");
        std::env::set_var("ITINERARY_ATTRACTIONS_PATH", "/tmp/attractions.json");

        let config = PlannerConfig::from_env().unwrap();
        assert_eq!(config.provider, ChatProvider::Moonshot);
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.model, "moonshot-v1-32k");
        assert_eq!(config.base_url, "https://api.moonshot.cn/v1/chat/completions");
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(
            config.attractions,
            AttractionSource::File(PathBuf::from("/tmp/attractions.json"))
        );
        clear_env();
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_bad_numbers() {
        clear_env();
        std::env::set_var("ITINERARY_MAX_TOKENS", "lots");
        let result = PlannerConfig::from_env();
        assert!(matches!(result, Err(PlannerError::ConfigError(_))));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_blank_api_key_is_ignored() {
        clear_env();
        std::env::set_var("ITINERARY_API_KEY", "   ");
        let config = PlannerConfig::from_env().unwrap();
        assert!(config.api_key.is_none());
        clear_env();
    }
}
