use std::str::FromStr;

use crate::error::SentimentError;
use crate::DEFAULT_LANG;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Gemini,
    Claude,
    OpenAi,
}

impl LlmProvider {
    pub fn api_key_var(&self) -> &'static str {
        match self {
            LlmProvider::Gemini => "GOOGLE_API_KEY",
            LlmProvider::Claude => "ANTHROPIC_API_KEY",
            LlmProvider::OpenAi => "OPENAI_API_KEY",
        }
    }
}

impl FromStr for LlmProvider {
    type Err = SentimentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "gemini" | "google" => Ok(LlmProvider::Gemini),
            "claude" | "anthropic" => Ok(LlmProvider::Claude),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(SentimentError::Config(format!(
                "unknown LLM_PROVIDER '{other}' (expected gemini, claude or openai)"
            ))),
        }
    }
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    // Database
    pub database_url: Option<String>,

    // AI / LLM
    pub llm_provider: LlmProvider,
    pub llm_model: Option<String>,
    pub llm_api_key: Option<String>,
    pub llm_timeout_secs: u64,
    pub llm_max_attempts: u32,

    // Pipeline
    pub default_lang: String,
}

impl AppConfig {
    /// Reads `.env` (if present) and the process environment.
    pub fn from_env() -> Result<Self, SentimentError> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;
        config.log_keys();
        Ok(config)
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, SentimentError> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let llm_provider = match var("LLM_PROVIDER") {
            Some(raw) => raw.parse()?,
            None => LlmProvider::Gemini,
        };
        let llm_api_key = var(llm_provider.api_key_var());

        Ok(Self {
            database_url: var("DATABASE_URL"),
            llm_provider,
            llm_model: var("LLM_MODEL"),
            llm_api_key,
            llm_timeout_secs: parse_or(var("LLM_TIMEOUT_SECS"), "LLM_TIMEOUT_SECS", 60)?,
            llm_max_attempts: parse_or(var("LLM_MAX_ATTEMPTS"), "LLM_MAX_ATTEMPTS", 3)?,
            default_lang: var("DEFAULT_LANG").unwrap_or_else(|| DEFAULT_LANG.to_string()),
        })
    }

    pub fn require_llm_api_key(&self) -> Result<&str, SentimentError> {
        self.llm_api_key.as_deref().ok_or_else(|| {
            SentimentError::Config(format!("{} must be set", self.llm_provider.api_key_var()))
        })
    }

    pub fn require_database_url(&self) -> Result<&str, SentimentError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| SentimentError::Config("DATABASE_URL must be set".into()))
    }

    fn log_keys(&self) {
        fn preview(val: &str) -> String {
            let n = val
                .char_indices()
                .nth(5)
                .map(|(i, _)| i)
                .unwrap_or(val.len());
            format!("{}...({} chars)", &val[..n], val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  LLM_PROVIDER: {:?}", self.llm_provider);
        tracing::info!(
            "  {}: {}",
            self.llm_provider.api_key_var(),
            self.llm_api_key
                .as_deref()
                .map(preview)
                .unwrap_or_else(|| "<not set>".to_string())
        );
        tracing::info!(
            "  DATABASE_URL: {}",
            if self.database_url.is_some() {
                "<set>"
            } else {
                "<not set>"
            }
        );
        tracing::info!("  DEFAULT_LANG: {}", self.default_lang);
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, SentimentError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| SentimentError::Config(format!("{key} is not a valid number: '{raw}'"))),
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
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_to_gemini_and_portuguese() {
        let config = AppConfig::from_lookup(lookup(&[("GOOGLE_API_KEY", "g-123")])).unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Gemini);
        assert_eq!(config.llm_api_key.as_deref(), Some("g-123"));
        assert_eq!(config.default_lang, "pt");
        assert_eq!(config.llm_timeout_secs, 60);
        assert_eq!(config.llm_max_attempts, 3);
        assert!(config.database_url.is_none());
    }

    #[test]
    fn provider_selects_its_key() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LLM_PROVIDER", "Claude"),
            ("ANTHROPIC_API_KEY", "sk-ant"),
            ("LLM_MAX_ATTEMPTS", "5"),
        ]))
        .unwrap();
        assert_eq!(config.llm_provider, LlmProvider::Claude);
        assert_eq!(config.llm_max_attempts, 5);
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let config = AppConfig::from_lookup(lookup(&[("LLM_PROVIDER", "openai")])).unwrap();
        let err = config.require_llm_api_key().unwrap_err();
        assert!(matches!(err, SentimentError::Config(msg) if msg.contains("OPENAI_API_KEY")));
    }

    #[test]
    fn rejects_unknown_provider_and_bad_numbers() {
        assert!(AppConfig::from_lookup(lookup(&[("LLM_PROVIDER", "llama")])).is_err());
        assert!(AppConfig::from_lookup(lookup(&[
            ("GOOGLE_API_KEY", "g"),
            ("LLM_TIMEOUT_SECS", "soon"),
        ]))
        .is_err());
    }

    #[test]
    fn database_url_is_required_only_on_demand() {
        let config = AppConfig::from_lookup(lookup(&[("GOOGLE_API_KEY", "g")])).unwrap();
        assert!(config.require_database_url().is_err());
    }
}
