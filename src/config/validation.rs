//! Configuration validation.
//!
//! # Responsibilities
//! - Presence checks for required keys
//! - Parse numeric and address values
//! - Range checks (intervals > 0, backoff base <= max)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Runs before the typed settings are handed to any subsystem

use std::str::FromStr;

use thiserror::Error;

use crate::config::schema::Config;

/// A single semantic problem found in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing required key '{0}'")]
    Missing(String),

    #[error("invalid value '{value}' for '{key}': {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },

    #[error("'{key}' {reason}")]
    OutOfRange { key: String, reason: String },
}

/// Collects validation errors while settings are being read.
#[derive(Debug)]
pub struct Validator<'a> {
    config: &'a Config,
    errors: Vec<ValidationError>,
}

impl<'a> Validator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            errors: Vec::new(),
        }
    }

    /// Required string value. Records an error and returns an empty string when absent.
    pub fn required(&mut self, key: &str) -> String {
        match self.config.get(key) {
            Some(v) if !v.trim().is_empty() => v.to_string(),
            _ => {
                self.errors.push(ValidationError::Missing(key.to_string()));
                String::new()
            }
        }
    }

    /// Optional string value with a default.
    pub fn string_or(&mut self, key: &str, default: &str) -> String {
        self.config.get(key).unwrap_or(default).to_string()
    }

    /// Parsed value with a default. Records an error and returns the default on failure.
    pub fn parse_or<T>(&mut self, key: &str, default: T) -> T
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.config.get(key) {
            None => default,
            Some(raw) => match raw.trim().parse() {
                Ok(v) => v,
                Err(e) => {
                    self.errors.push(ValidationError::Invalid {
                        key: key.to_string(),
                        value: raw.to_string(),
                        reason: e.to_string(),
                    });
                    default
                }
            },
        }
    }

    /// Parsed value that must be strictly positive.
    pub fn positive_or(&mut self, key: &str, default: u64) -> u64 {
        let value = self.parse_or(key, default);
        if value == 0 {
            self.errors.push(ValidationError::OutOfRange {
                key: key.to_string(),
                reason: "must be greater than zero".to_string(),
            });
            return default;
        }
        value
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Finish validation, returning every collected error.
    pub fn finish(self) -> Result<(), Vec<ValidationError>> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}
