//! Model service configuration read from the process environment.

use std::fmt;

use tracing::{error, warn};

pub const API_KEY_VAR: &str = "API_KEY";
pub const MODEL_VAR: &str = "FINEPRINT_MODEL";
pub const BASE_URL_VAR: &str = "FINEPRINT_BASE_URL";
pub const ANALYSIS_BUDGET_VAR: &str = "FINEPRINT_ANALYSIS_THINKING_BUDGET";
pub const LETTER_BUDGET_VAR: &str = "FINEPRINT_LETTER_THINKING_BUDGET";

pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_ANALYSIS_THINKING_BUDGET: u32 = 4096;
pub const DEFAULT_LETTER_THINKING_BUDGET: u32 = 2048;

/// Connection and generation settings for the hosted model.
#[derive(Clone)]
pub struct ModelConfig {
    /// Missing keys are allowed; calls then fail with
    /// [`ModelError::MissingCredential`](crate::ModelError::MissingCredential).
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
    pub analysis_thinking_budget: u32,
    pub letter_thinking_budget: u32,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            analysis_thinking_budget: DEFAULT_ANALYSIS_THINKING_BUDGET,
            letter_thinking_budget: DEFAULT_LETTER_THINKING_BUDGET,
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("analysis_thinking_budget", &self.analysis_thinking_budget)
            .field("letter_thinking_budget", &self.letter_thinking_budget)
            .finish()
    }
}

impl ModelConfig {
    /// Read configuration from the process environment.
    ///
    /// A missing `API_KEY` is logged as an error but does not fail.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let api_key = lookup(API_KEY_VAR).filter(|k| !k.trim().is_empty());
        if api_key.is_none() {
            error!(var = API_KEY_VAR, "API key is not defined in the environment");
        }

        Self {
            api_key,
            model: lookup(MODEL_VAR).unwrap_or(defaults.model),
            base_url: lookup(BASE_URL_VAR).unwrap_or(defaults.base_url),
            analysis_thinking_budget: parse_budget(
                &lookup,
                ANALYSIS_BUDGET_VAR,
                defaults.analysis_thinking_budget,
            ),
            letter_thinking_budget: parse_budget(
                &lookup,
                LETTER_BUDGET_VAR,
                defaults.letter_thinking_budget,
            ),
        }
    }
}

fn parse_budget(lookup: &impl Fn(&str) -> Option<String>, var: &str, default: u32) -> u32 {
    match lookup(var) {
        None => default,
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(var, value = %raw, default, "ignoring invalid thinking budget");
            default
        }),
    }
}
