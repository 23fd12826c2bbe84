//! Configuration management for the annotation subsystem

use std::collections::HashMap;
use std::env;
use std::path::Path;

use thiserror::Error;

const MATCH_TOLERANCE_VAR: &str = "ANNOTATIONS_MATCH_TOLERANCE";
const NOTE_SIZE_VAR: &str = "ANNOTATIONS_NOTE_SIZE";
const LOG_VAR: &str = "ANNOTATIONS_LOG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Failed to read env file: {0}")]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Absolute per-edge tolerance when matching geometry or note positions
    pub match_tolerance: f64,
    /// Side length of the square anchor written for exported notes
    pub note_anchor_size: f64,
    /// `tracing` filter used by the binary
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            match_tolerance: 1.0,
            note_anchor_size: 24.0,
            log_filter: "amnesia_annotations=info".to_string(),
        }
    }
}

impl Config {
    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration from a dotenv file without touching the process environment
    pub fn from_env_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut vars = HashMap::new();
        for item in dotenvy::from_path_iter(path.as_ref())? {
            let (key, value) = item?;
            vars.insert(key, value);
        }
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();
        Ok(Config {
            match_tolerance: parse_positive(MATCH_TOLERANCE_VAR, lookup(MATCH_TOLERANCE_VAR))?
                .unwrap_or(defaults.match_tolerance),
            note_anchor_size: parse_positive(NOTE_SIZE_VAR, lookup(NOTE_SIZE_VAR))?
                .unwrap_or(defaults.note_anchor_size),
            log_filter: lookup(LOG_VAR)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.log_filter),
        })
    }
}

fn parse_positive(key: &'static str, value: Option<String>) -> Result<Option<f64>, ConfigError> {
    let Some(raw) = value else {
        return Ok(None);
    };
    match raw.trim().parse::<f64>() {
        Ok(v) if v.is_finite() && v > 0.0 => Ok(Some(v)),
        _ => Err(ConfigError::InvalidValue { key, value: raw }),
    }
}
