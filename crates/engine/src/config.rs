//! Environment-driven configuration.
//!
//! Every knob has a default except the Gemini API key. Values are read
//! through a lookup function so tests never touch the process environment.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::infrastructure::gemini::{
    DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_FALLBACK_MODEL, DEFAULT_GEMINI_MODEL,
};
use crate::infrastructure::ollama::{DEFAULT_OLLAMA_BASE_URL, DEFAULT_OLLAMA_MODEL};
use crate::infrastructure::resilient_llm::RetryConfig;
use crate::use_cases::generation::ConvergenceConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {name}: {value:?} ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
    #[error("Missing required setting: {0}")]
    Missing(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Gemini,
    Ollama,
}

impl FromStr for LlmBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(Self::Gemini),
            "ollama" => Ok(Self::Ollama),
            other => Err(format!("unknown backend '{other}', expected gemini or ollama")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub fallback_model: String,
}

#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub base_url: String,
    pub model: String,
    pub fallback_model: String,
}

#[derive(Debug, Clone)]
pub enum BackendConfig {
    Gemini(GeminiConfig),
    Ollama(OllamaConfig),
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub server_host: String,
    pub server_port: u16,
    pub backend: BackendConfig,
    pub llm_timeout_secs: u64,
    pub retry: RetryConfig,
    pub convergence: ConvergenceConfig,
    pub fixtures_dir: PathBuf,
    /// Comma-separated origins or `*`; `None` disables CORS
    pub cors_allowed_origins: Option<String>,
}

/// Reads settings by name, with a fallback name and a default.
struct Settings<F> {
    lookup: F,
}

impl<F> Settings<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, name: &str) -> Option<String> {
        (self.lookup)(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn string(&self, name: &str, default: &str) -> String {
        self.get(name).unwrap_or_else(|| default.to_string())
    }

    fn parsed<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
                name,
                reason: e.to_string(),
                value,
            }),
        }
    }
}

impl EngineConfig {
    /// Read the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let settings = Settings { lookup };

        let server_port = match settings.get("SERVER_PORT") {
            Some(_) => settings.parsed("SERVER_PORT", 3000u16)?,
            None => settings.parsed("PORT", 3000u16)?,
        };

        let backend = match settings.parsed("LLM_BACKEND", LlmBackend::Gemini)? {
            LlmBackend::Gemini => {
                let api_key = settings
                    .get("GEMINI_API_KEY")
                    .or_else(|| settings.get("AISTUDIO_API_KEY"))
                    .ok_or(ConfigError::Missing("GEMINI_API_KEY"))?;
                BackendConfig::Gemini(GeminiConfig {
                    api_key,
                    base_url: settings.string("GEMINI_BASE_URL", DEFAULT_GEMINI_BASE_URL),
                    model: settings.string("GEMINI_MODEL", DEFAULT_GEMINI_MODEL),
                    fallback_model: settings
                        .string("GEMINI_FALLBACK_MODEL", DEFAULT_GEMINI_FALLBACK_MODEL),
                })
            }
            LlmBackend::Ollama => {
                let model = settings.string("OLLAMA_MODEL", DEFAULT_OLLAMA_MODEL);
                BackendConfig::Ollama(OllamaConfig {
                    base_url: settings.string("OLLAMA_BASE_URL", DEFAULT_OLLAMA_BASE_URL),
                    fallback_model: settings.string("OLLAMA_FALLBACK_MODEL", &model),
                    model,
                })
            }
        };

        let retry = RetryConfig {
            max_retries: settings.parsed("LLM_MAX_RETRIES", 4)?,
            base_delay_ms: settings.parsed("LLM_RETRY_BASE_DELAY_MS", 1000)?,
            ..RetryConfig::default()
        };

        let deadline_secs: u64 = settings.parsed("GENERATION_DEADLINE_SECS", 600)?;
        let convergence = ConvergenceConfig {
            max_iterations: settings.parsed("GENERATION_MAX_ITERATIONS", 6)?,
            max_stalled_iterations: settings.parsed("GENERATION_MAX_STALLED", 2)?,
            deadline: (deadline_secs > 0).then(|| Duration::from_secs(deadline_secs)),
            ..ConvergenceConfig::default()
        };
        if convergence.max_iterations == 0 {
            return Err(ConfigError::Invalid {
                name: "GENERATION_MAX_ITERATIONS",
                value: "0".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        let fixtures_dir = settings
            .get("FIXTURES_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_fixtures_dir);

        Ok(Self {
            server_host: settings.string("SERVER_HOST", "0.0.0.0"),
            server_port,
            backend,
            llm_timeout_secs: settings.parsed("LLM_TIMEOUT_SECS", 120)?,
            retry,
            convergence,
            fixtures_dir,
            cors_allowed_origins: settings.get("CORS_ALLOWED_ORIGINS"),
        })
    }
}

/// `data/` at the repository root.
fn default_fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..")
        .join("data")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config(vars: &[(&str, &str)]) -> Result<EngineConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        EngineConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_with_only_an_api_key() {
        let config = config(&[("GEMINI_API_KEY", "secret")]).unwrap();

        assert_eq!(config.server_host, "0.0.0.0");
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.llm_timeout_secs, 120);
        assert_eq!(config.retry.max_retries, 4);
        assert_eq!(config.convergence.max_iterations, 6);
        assert_eq!(config.convergence.max_stalled_iterations, 2);
        assert_eq!(config.convergence.deadline, Some(Duration::from_secs(600)));
        assert!(config.fixtures_dir.ends_with("data"));
        assert!(config.cors_allowed_origins.is_none());
        match config.backend {
            BackendConfig::Gemini(gemini) => {
                assert_eq!(gemini.model, DEFAULT_GEMINI_MODEL);
                assert_eq!(gemini.fallback_model, DEFAULT_GEMINI_FALLBACK_MODEL);
            }
            other => panic!("expected gemini, got {other:?}"),
        }
    }

    #[test]
    fn gemini_requires_a_key() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("GEMINI_API_KEY"));
    }

    #[test]
    fn legacy_key_name_is_accepted() {
        assert!(config(&[("AISTUDIO_API_KEY", "secret")]).is_ok());
    }

    #[test]
    fn ollama_fallback_defaults_to_primary_model() {
        let config = config(&[("LLM_BACKEND", "Ollama"), ("OLLAMA_MODEL", "mistral")]).unwrap();
        match config.backend {
            BackendConfig::Ollama(ollama) => {
                assert_eq!(ollama.model, "mistral");
                assert_eq!(ollama.fallback_model, "mistral");
                assert_eq!(ollama.base_url, DEFAULT_OLLAMA_BASE_URL);
            }
            other => panic!("expected ollama, got {other:?}"),
        }
    }

    #[test]
    fn invalid_numbers_are_reported_by_name() {
        let err = config(&[("GEMINI_API_KEY", "k"), ("LLM_MAX_RETRIES", "lots")]).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "LLM_MAX_RETRIES", .. }));

        let err = config(&[("GEMINI_API_KEY", "k"), ("LLM_BACKEND", "openai")]).unwrap_err();
        assert!(err.to_string().contains("LLM_BACKEND"));
    }

    #[test]
    fn zero_deadline_disables_it_and_port_falls_back() {
        let config = config(&[
            ("GEMINI_API_KEY", "k"),
            ("GENERATION_DEADLINE_SECS", "0"),
            ("PORT", "8080"),
        ])
        .unwrap();
        assert_eq!(config.convergence.deadline, None);
        assert_eq!(config.server_port, 8080);
    }
}
