//! Refinement pipeline configuration.
//!
//! Iteration budget, convergence thresholds, notification and session
//! storage settings, read from the environment and validated up front.

use crate::error::ConfigError;
use crate::utils::env::{non_blank, parse_env_bool, parse_env_value, process_env};

use super::state::ConvergenceCriterion;

/// Default iteration cap per run.
pub const DEFAULT_MAX_ITERATIONS: u32 = 3;
/// Default minimum confidence score for convergence.
pub const DEFAULT_CONFIDENCE_TARGET: u8 = 90;
/// Default exclusive upper bound on hallucination risk for convergence.
pub const DEFAULT_RISK_CEILING: u8 = 40;

/// Configuration for the refinement pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Maximum Research→Develop→Write→Assess passes per run.
    pub max_iterations: u32,
    /// Stop condition evaluated after every assessment.
    pub convergence: ConvergenceCriterion,
    /// Whether finished documents are delivered through the webhook.
    pub notify_enabled: bool,
    /// Webhook receiving `{to, subject, body}`.
    pub notify_webhook_url: Option<String>,
    /// SQLite session database. `None` keeps sessions in memory.
    pub session_db_path: Option<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            convergence: ConvergenceCriterion::default(),
            notify_enabled: false,
            notify_webhook_url: None,
            session_db_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PIPELINE_MAX_ITERATIONS`: Iteration cap (default: 3)
    /// - `PIPELINE_CONFIDENCE_TARGET`: Minimum confidence to converge (default: 90)
    /// - `PIPELINE_HALLUCINATION_RISK_CEILING`: Risk must stay below this (default: 40)
    /// - `NOTIFY_ENABLED`: Deliver finished documents (default: false)
    /// - `NOTIFY_WEBHOOK_URL`: Delivery endpoint, required when enabled
    /// - `SESSION_DB_PATH`: SQLite file for sessions (default: in-memory)
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(process_env)
    }

    /// Same as [`PipelineConfig::from_env`] over an arbitrary lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(val) = non_blank(&lookup, "PIPELINE_MAX_ITERATIONS") {
            config.max_iterations = parse_env_value(&val, "PIPELINE_MAX_ITERATIONS")?;
        }
        if let Some(val) = non_blank(&lookup, "PIPELINE_CONFIDENCE_TARGET") {
            config.convergence.confidence_target =
                parse_env_value(&val, "PIPELINE_CONFIDENCE_TARGET")?;
        }
        if let Some(val) = non_blank(&lookup, "PIPELINE_HALLUCINATION_RISK_CEILING") {
            config.convergence.risk_ceiling =
                parse_env_value(&val, "PIPELINE_HALLUCINATION_RISK_CEILING")?;
        }
        if let Some(val) = lookup("NOTIFY_ENABLED") {
            config.notify_enabled = parse_env_bool(&val, "NOTIFY_ENABLED")?;
        }
        config.notify_webhook_url = non_blank(&lookup, "NOTIFY_WEBHOOK_URL");
        config.session_db_path = non_blank(&lookup, "SESSION_DB_PATH");

        if config.notify_enabled && config.notify_webhook_url.is_none() {
            return Err(ConfigError::MissingEnvVar("NOTIFY_WEBHOOK_URL".to_string()));
        }

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_iterations must be greater than 0".to_string(),
            ));
        }
        if self.convergence.confidence_target > 100 {
            return Err(ConfigError::ValidationFailed(format!(
                "confidence_target must be at most 100, got {}",
                self.convergence.confidence_target
            )));
        }
        if self.convergence.risk_ceiling > 100 {
            return Err(ConfigError::ValidationFailed(format!(
                "risk_ceiling must be at most 100, got {}",
                self.convergence.risk_ceiling
            )));
        }
        Ok(())
    }

    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_convergence(mut self, convergence: ConvergenceCriterion) -> Self {
        self.convergence = convergence;
        self
    }

    pub fn with_session_db_path(mut self, path: impl Into<String>) -> Self {
        self.session_db_path = Some(path.into());
        self
    }

    pub fn with_notify_webhook(mut self, url: impl Into<String>) -> Self {
        self.notify_enabled = true;
        self.notify_webhook_url = Some(url.into());
        self
    }
}
