//! Gateway configuration.
//!
//! Backend topology, credentials and throttling parameters are static for
//! the lifetime of a [`crate::llm::Gateway`]; they are read once from the
//! environment (or any other key/value lookup) and validated up front.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::credentials::{CredentialPool, KeyStrategy};
use super::types::Purpose;
use crate::error::ConfigError;
use crate::utils::env::{non_blank, parse_env_value, process_env, split_list};

/// Default Groq model.
pub const DEFAULT_GROQ_MODEL: &str = "llama-3.1-8b-instant";
/// Default Groq API base (OpenAI-compatible).
pub const DEFAULT_GROQ_API_BASE: &str = "https://api.groq.com/openai/v1";
/// Default Gemini model.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";
/// Default Gemini API base.
pub const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
/// Default local Ollama host.
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";
/// Default Ollama model.
pub const DEFAULT_OLLAMA_MODEL: &str = "llama3";

const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 120;
const DEFAULT_RATE_LIMIT_BACKOFF_MS: u64 = 1000;

/// The supported text-generation backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Groq,
    Gemini,
    Ollama,
}

impl BackendKind {
    /// All backends in static preference order.
    pub const ALL: [BackendKind; 3] = [BackendKind::Groq, BackendKind::Gemini, BackendKind::Ollama];

    /// Lowercase name used in configuration, logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Groq => "groq",
            BackendKind::Gemini => "gemini",
            BackendKind::Ollama => "ollama",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            BackendKind::Groq => "GROQ",
            BackendKind::Gemini => "GEMINI",
            BackendKind::Ollama => "OLLAMA",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "groq" => Ok(BackendKind::Groq),
            "gemini" => Ok(BackendKind::Gemini),
            "ollama" => Ok(BackendKind::Ollama),
            other => Err(format!(
                "unknown backend '{}' (expected groq, gemini or ollama)",
                other
            )),
        }
    }
}

/// Connection and throttling settings for one backend.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    pub kind: BackendKind,
    pub credentials: CredentialPool,
    pub model: String,
    pub base_url: String,
    pub min_interval: Duration,
    pub timeout: Duration,
}

impl BackendSettings {
    /// Settings with the backend's defaults and no credentials.
    pub fn defaults(kind: BackendKind) -> Self {
        let (model, base_url) = match kind {
            BackendKind::Groq => (DEFAULT_GROQ_MODEL, DEFAULT_GROQ_API_BASE),
            BackendKind::Gemini => (DEFAULT_GEMINI_MODEL, DEFAULT_GEMINI_API_BASE),
            BackendKind::Ollama => (DEFAULT_OLLAMA_MODEL, DEFAULT_OLLAMA_HOST),
        };
        Self {
            kind,
            credentials: CredentialPool::default(),
            model: model.to_string(),
            base_url: base_url.to_string(),
            min_interval: Duration::ZERO,
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }

    pub fn with_credentials(mut self, credentials: CredentialPool) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }
}

/// Static routing configuration for the gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Preferred backend for `generation` calls.
    pub generation_backend: BackendKind,
    /// Preferred backend for `validation` calls.
    pub validation_backend: BackendKind,
    /// Backend used for the single validation fallback attempt.
    pub fallback_backend: BackendKind,
    pub groq: BackendSettings,
    pub gemini: BackendSettings,
    pub ollama: BackendSettings,
    /// Delay before rotating to the next credential after a 429.
    pub rate_limit_backoff: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            generation_backend: BackendKind::Groq,
            validation_backend: BackendKind::Groq,
            fallback_backend: BackendKind::Groq,
            groq: BackendSettings::defaults(BackendKind::Groq),
            gemini: BackendSettings::defaults(BackendKind::Gemini),
            ollama: BackendSettings::defaults(BackendKind::Ollama),
            rate_limit_backoff: Duration::from_millis(DEFAULT_RATE_LIMIT_BACKOFF_MS),
        }
    }
}

impl GatewayConfig {
    /// Creates a configuration with defaults and no credentials.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LLM_PROVIDER`: Default backend (default: groq)
    /// - `LLM_GENERATION_PROVIDER` / `LLM_VALIDATION_PROVIDER`: Per-purpose override
    /// - `LLM_FALLBACK_PROVIDER`: Validation fallback backend (default: groq)
    /// - `GROQ_API_KEYS`, `GROQ_API_KEY`, `GROQ_API_KEY_2`: Groq keys, merged and deduplicated
    /// - `GEMINI_API_KEYS`, `GEMINI_API_KEY`, `GEMINI_API_KEY_2`: Gemini keys
    /// - `GROQ_KEY_STRATEGY` / `GEMINI_KEY_STRATEGY`: `single` or `failover_on_429`
    /// - `{GROQ,GEMINI,OLLAMA}_MIN_INTERVAL_SECONDS`: Pacing interval (default: 0)
    /// - `GROQ_MODEL`, `GROQ_API_BASE`, `GEMINI_MODEL`, `GEMINI_API_BASE`
    /// - `OLLAMA_HOST`, `OLLAMA_MODEL`, `OLLAMA_TIMEOUT_SECONDS`
    /// - `LLM_REQUEST_TIMEOUT_SECONDS`: Cloud call timeout (default: 120)
    /// - `LLM_RATE_LIMIT_BACKOFF_MS`: Delay before key rotation (default: 1000)
    ///
    /// Missing credentials are not an error here; the gateway reports them
    /// as unroutable purposes.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    /// Same as [`GatewayConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let provider = match non_blank(&lookup, "LLM_PROVIDER") {
            Some(val) => parse_backend(&val, "LLM_PROVIDER")?,
            None => BackendKind::Groq,
        };
        config.generation_backend = match non_blank(&lookup, "LLM_GENERATION_PROVIDER") {
            Some(val) => parse_backend(&val, "LLM_GENERATION_PROVIDER")?,
            None => provider,
        };
        config.validation_backend = match non_blank(&lookup, "LLM_VALIDATION_PROVIDER") {
            Some(val) => parse_backend(&val, "LLM_VALIDATION_PROVIDER")?,
            None => provider,
        };
        if let Some(val) = non_blank(&lookup, "LLM_FALLBACK_PROVIDER") {
            config.fallback_backend = parse_backend(&val, "LLM_FALLBACK_PROVIDER")?;
        }

        let cloud_timeout = match non_blank(&lookup, "LLM_REQUEST_TIMEOUT_SECONDS") {
            Some(val) => Duration::from_secs(parse_env_value(&val, "LLM_REQUEST_TIMEOUT_SECONDS")?),
            None => Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        for kind in [BackendKind::Groq, BackendKind::Gemini] {
            let prefix = kind.env_prefix();
            let strategy = match non_blank(&lookup, &format!("{}_KEY_STRATEGY", prefix)) {
                Some(val) => val.parse::<KeyStrategy>().map_err(|message| {
                    ConfigError::InvalidValue {
                        key: format!("{}_KEY_STRATEGY", prefix),
                        message,
                    }
                })?,
                None => KeyStrategy::Single,
            };
            let settings = config.backend_mut(kind);
            settings.credentials =
                CredentialPool::from_secrets(collect_keys(&lookup, prefix), strategy);
            settings.timeout = cloud_timeout;
            if let Some(model) = non_blank(&lookup, &format!("{}_MODEL", prefix)) {
                settings.model = model;
            }
            if let Some(base) = non_blank(&lookup, &format!("{}_API_BASE", prefix)) {
                settings.base_url = base.trim_end_matches('/').to_string();
            }
        }

        if let Some(host) = non_blank(&lookup, "OLLAMA_HOST") {
            config.ollama.base_url = host.trim_end_matches('/').to_string();
        }
        if let Some(model) = non_blank(&lookup, "OLLAMA_MODEL") {
            config.ollama.model = model;
        }
        if let Some(val) = non_blank(&lookup, "OLLAMA_TIMEOUT_SECONDS") {
            config.ollama.timeout =
                Duration::from_secs(parse_env_value(&val, "OLLAMA_TIMEOUT_SECONDS")?);
        }

        for kind in BackendKind::ALL {
            let key = format!("{}_MIN_INTERVAL_SECONDS", kind.env_prefix());
            config.backend_mut(kind).min_interval = parse_interval(lookup(&key).as_deref());
        }

        if let Some(val) = non_blank(&lookup, "LLM_RATE_LIMIT_BACKOFF_MS") {
            config.rate_limit_backoff =
                Duration::from_millis(parse_env_value(&val, "LLM_RATE_LIMIT_BACKOFF_MS")?);
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for kind in BackendKind::ALL {
            let settings = self.backend(kind);
            if settings.timeout.is_zero() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} timeout must be greater than 0",
                    kind
                )));
            }
            if settings.model.trim().is_empty() {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} model must not be empty",
                    kind
                )));
            }
            if !settings.base_url.starts_with("http://") && !settings.base_url.starts_with("https://")
            {
                return Err(ConfigError::ValidationFailed(format!(
                    "{} base url must be http(s), got '{}'",
                    kind, settings.base_url
                )));
            }
        }
        Ok(())
    }

    /// Settings for a backend.
    pub fn backend(&self, kind: BackendKind) -> &BackendSettings {
        match kind {
            BackendKind::Groq => &self.groq,
            BackendKind::Gemini => &self.gemini,
            BackendKind::Ollama => &self.ollama,
        }
    }

    fn backend_mut(&mut self, kind: BackendKind) -> &mut BackendSettings {
        match kind {
            BackendKind::Groq => &mut self.groq,
            BackendKind::Gemini => &mut self.gemini,
            BackendKind::Ollama => &mut self.ollama,
        }
    }

    /// Preferred backend for a purpose.
    pub fn preferred(&self, purpose: Purpose) -> BackendKind {
        match purpose {
            Purpose::Generation => self.generation_backend,
            Purpose::Validation => self.validation_backend,
        }
    }

    /// Returns true when Ollama was selected for any role.
    ///
    /// The local backend needs no key, so it only joins the routing table
    /// when explicitly chosen.
    pub fn ollama_selected(&self) -> bool {
        [
            self.generation_backend,
            self.validation_backend,
            self.fallback_backend,
        ]
        .contains(&BackendKind::Ollama)
    }

    pub fn with_generation_backend(mut self, kind: BackendKind) -> Self {
        self.generation_backend = kind;
        self
    }

    pub fn with_validation_backend(mut self, kind: BackendKind) -> Self {
        self.validation_backend = kind;
        self
    }

    pub fn with_fallback_backend(mut self, kind: BackendKind) -> Self {
        self.fallback_backend = kind;
        self
    }

    pub fn with_backend(mut self, settings: BackendSettings) -> Self {
        let kind = settings.kind;
        *self.backend_mut(kind) = settings;
        self
    }

    pub fn with_rate_limit_backoff(mut self, backoff: Duration) -> Self {
        self.rate_limit_backoff = backoff;
        self
    }
}

fn parse_backend(value: &str, key: &str) -> Result<BackendKind, ConfigError> {
    value.parse().map_err(|message| ConfigError::InvalidValue {
        key: key.to_string(),
        message,
    })
}

/// `{P}_API_KEYS` (comma list), then `{P}_API_KEY`, then `{P}_API_KEY_2`.
fn collect_keys<F>(lookup: &F, prefix: &str) -> Vec<String>
where
    F: Fn(&str) -> Option<String>,
{
    let mut keys = Vec::new();
    if let Some(list) = lookup(&format!("{}_API_KEYS", prefix)) {
        keys.extend(split_list(&list));
    }
    for suffix in ["API_KEY", "API_KEY_2"] {
        if let Some(key) = non_blank(lookup, &format!("{}_{}", prefix, suffix)) {
            keys.push(key);
        }
    }
    keys
}

/// Non-negative seconds; anything unparsable means no pacing.
fn parse_interval(value: Option<&str>) -> Duration {
    value
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs > 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::env::map_lookup;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_without_environment() {
        let config = GatewayConfig::from_lookup(|_| None).expect("defaults are valid");
        assert_eq!(config.generation_backend, BackendKind::Groq);
        assert_eq!(config.validation_backend, BackendKind::Groq);
        assert_eq!(config.fallback_backend, BackendKind::Groq);
        assert!(config.groq.credentials.is_empty());
        assert_eq!(config.groq.model, DEFAULT_GROQ_MODEL);
        assert_eq!(config.ollama.base_url, DEFAULT_OLLAMA_HOST);
        assert_eq!(config.rate_limit_backoff, Duration::from_millis(1000));
        assert!(!config.ollama_selected());
    }

    #[test]
    fn test_keys_are_merged_and_deduplicated() {
        let env = vars(&[
            ("GROQ_API_KEYS", "k1, k2"),
            ("GROQ_API_KEY", "k2"),
            ("GROQ_API_KEY_2", "k3"),
            ("GROQ_KEY_STRATEGY", "failover_on_429"),
        ]);
        let config = GatewayConfig::from_lookup(map_lookup(&env)).expect("valid");
        assert_eq!(config.groq.credentials.len(), 3);
        assert_eq!(
            config.groq.credentials.strategy(),
            KeyStrategy::FailoverOn429
        );
    }

    #[test]
    fn test_provider_selection() {
        let env = vars(&[
            ("LLM_PROVIDER", "ollama"),
            ("LLM_VALIDATION_PROVIDER", "gemini"),
            ("OLLAMA_HOST", "http://box:11434/"),
        ]);
        let config = GatewayConfig::from_lookup(map_lookup(&env)).expect("valid");
        assert_eq!(config.preferred(Purpose::Generation), BackendKind::Ollama);
        assert_eq!(config.preferred(Purpose::Validation), BackendKind::Gemini);
        assert_eq!(config.ollama.base_url, "http://box:11434");
        assert!(config.ollama_selected());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let env = vars(&[("LLM_PROVIDER", "openai")]);
        assert!(matches!(
            GatewayConfig::from_lookup(map_lookup(&env)),
            Err(ConfigError::InvalidValue { .. })
        ));

        let env = vars(&[("GEMINI_KEY_STRATEGY", "random")]);
        assert!(GatewayConfig::from_lookup(map_lookup(&env)).is_err());

        let env = vars(&[("OLLAMA_TIMEOUT_SECONDS", "0")]);
        assert!(matches!(
            GatewayConfig::from_lookup(map_lookup(&env)),
            Err(ConfigError::ValidationFailed(_))
        ));
    }

    #[test]
    fn test_min_interval_parsing() {
        assert_eq!(parse_interval(Some("1.5")), Duration::from_millis(1500));
        assert_eq!(parse_interval(Some("-2")), Duration::ZERO);
        assert_eq!(parse_interval(Some("soon")), Duration::ZERO);
        assert_eq!(parse_interval(None), Duration::ZERO);
    }

    #[test]
    fn test_backend_kind_parse() {
        assert_eq!("Gemini".parse::<BackendKind>(), Ok(BackendKind::Gemini));
        assert!("".parse::<BackendKind>().is_err());
        assert_eq!(BackendKind::Ollama.to_string(), "ollama");
    }
}
