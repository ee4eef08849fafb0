//! Credential and configuration lookup from the environment.
//!
//! The pipeline itself never reads the environment; callers resolve values
//! here (or anywhere else) and pass them in.

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Environment variable '{0}' is not set")]
    MissingVar(String),

    #[error("Environment variable '{0}' is set but empty")]
    EmptyVar(String),

    #[error("Environment variable '{0}' is not valid unicode")]
    NotUnicode(String),
}

/// A secret API key. `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wraps a key, trimming surrounding whitespace and newlines.
    pub fn new(raw: impl AsRef<str>) -> Option<Self> {
        let trimmed = raw.as_ref().trim();
        (!trimmed.is_empty()).then(|| Self(trimmed.to_string()))
    }

    /// Reads a key from an environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingVar`] when unset and
    /// [`ConfigError::EmptyVar`] when the value is blank.
    pub fn from_env(var: &str) -> Result<Self, ConfigError> {
        let raw = required_env(var)?;
        Self::new(raw).ok_or_else(|| ConfigError::EmptyVar(var.to_string()))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

/// Reads a required environment variable, trimmed.
pub fn required_env(var: &str) -> Result<String, ConfigError> {
    match std::env::var(var) {
        Ok(value) if value.trim().is_empty() => Err(ConfigError::EmptyVar(var.to_string())),
        Ok(value) => Ok(value.trim().to_string()),
        Err(std::env::VarError::NotPresent) => Err(ConfigError::MissingVar(var.to_string())),
        Err(std::env::VarError::NotUnicode(_)) => Err(ConfigError::NotUnicode(var.to_string())),
    }
}

/// Reads an environment variable, falling back to `default` when unset or blank.
pub fn env_or(var: &str, default: &str) -> String {
    required_env(var).unwrap_or_else(|_| default.to_string())
}
