//! Engine configuration
//!
//! Defaults used by the stream driver when the caller leaves them out.
//! Stored as JSON; missing fields fall back to the defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PedalError, Result};

/// Chunk size used when a call does not give one
pub const DEFAULT_BUFFER_SIZE: usize = 8192;

/// Deepest container nesting a snapshot will follow
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Engine-wide defaults
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Frames per chunk when the caller passes no buffer size
    pub default_buffer_size: usize,
    /// Maximum container nesting depth
    pub max_depth: usize,
    /// Sample rate a Pedalboard uses when none is passed to `process`
    pub default_sample_rate: Option<f64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_buffer_size: DEFAULT_BUFFER_SIZE,
            max_depth: DEFAULT_MAX_DEPTH,
            default_sample_rate: None,
        }
    }
}

impl EngineConfig {
    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: EngineConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check that every field is usable
    pub fn validate(&self) -> Result<()> {
        if self.default_buffer_size == 0 {
            return Err(PedalError::InvalidBufferSize {
                buffer_size: self.default_buffer_size,
            });
        }
        if self.max_depth == 0 {
            return Err(PedalError::InvalidParameter {
                param: "max_depth".to_string(),
                value: self.max_depth.to_string(),
                expected: "at least 1".to_string(),
            });
        }
        if let Some(sample_rate) = self.default_sample_rate {
            validate_sample_rate(sample_rate)?;
        }
        Ok(())
    }
}

/// Reject non-finite or non-positive sample rates
pub(crate) fn validate_sample_rate(sample_rate: f64) -> Result<()> {
    if !sample_rate.is_finite() || sample_rate <= 0.0 {
        return Err(PedalError::InvalidSampleRate { sample_rate });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.default_buffer_size, 8192);
        assert_eq!(config.max_depth, 64);
        assert!(config.default_sample_rate.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = EngineConfig::from_json_str(r#"{"default_sample_rate": 48000.0}"#).unwrap();
        assert_eq!(config.default_sample_rate, Some(48000.0));
        assert_eq!(config.default_buffer_size, DEFAULT_BUFFER_SIZE);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"default_buffer_size": 0}"#),
            Err(PedalError::InvalidBufferSize { .. })
        ));
        assert!(matches!(
            EngineConfig::from_json_str(r#"{"default_sample_rate": -1.0}"#),
            Err(PedalError::InvalidSampleRate { .. })
        ));
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.json");
        let config = EngineConfig {
            default_buffer_size: 512,
            ..Default::default()
        };
        fs::write(&path, config.to_json().unwrap()).unwrap();
        assert_eq!(EngineConfig::from_file(&path).unwrap(), config);
    }
}
