//! Session configuration
//!
//! Fixed for the lifetime of a session: every buffer is sized from it once,
//! at construction. Can be built in code or loaded from JSON; missing keys
//! fall back to defaults.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::aligner::PaddingPolicy;
use crate::error::ConfigError;
use crate::state::ControlState;
use crate::transform::StretchBackend;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Hz
    pub sample_rate: f32,
    pub channels: usize,
    /// Control channel slots; a power of two, one slot always stays free
    pub channel_capacity: usize,
    /// Largest block the driver will ever hand to `process_block`, in frames
    pub max_block_frames: usize,
    pub backend: StretchBackend,
    pub padding: PaddingPolicy,
    /// Parameter values the session starts with
    pub initial: ControlState,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000.0,
            channels: 2,
            channel_capacity: 64,
            max_block_frames: 512,
            backend: StretchBackend::Passthrough,
            padding: PaddingPolicy::CarryForward,
            initial: ControlState::default(),
        }
    }
}

impl SessionConfig {
    pub fn with_sample_rate(mut self, sample_rate: f32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_max_block_frames(mut self, frames: usize) -> Self {
        self.max_block_frames = frames;
        self
    }

    pub fn with_backend(mut self, backend: StretchBackend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_padding(mut self, padding: PaddingPolicy) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_initial(mut self, initial: ControlState) -> Self {
        self.initial = initial;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_layout()?;
        if !self.backend.is_available() {
            return Err(ConfigError::BackendUnavailable(self.backend.name()));
        }
        Ok(())
    }

    /// Everything except the backend choice, for sessions built around a custom stage
    pub(crate) fn validate_layout(&self) -> Result<(), ConfigError> {
        if !self.sample_rate.is_finite() || self.sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(self.sample_rate));
        }
        if self.channels == 0 {
            return Err(ConfigError::NoChannels);
        }
        if self.channel_capacity < 2 || !self.channel_capacity.is_power_of_two() {
            return Err(ConfigError::InvalidCapacity(self.channel_capacity));
        }
        if self.max_block_frames == 0 {
            return Err(ConfigError::EmptyBlock);
        }
        Ok(())
    }

    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: SessionConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)?;
        let config = Self::from_json_str(&contents)?;
        tracing::info!(
            path = %path.display(),
            sample_rate = config.sample_rate,
            channels = config.channels,
            backend = config.backend.name(),
            "loaded session config"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        SessionConfig::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_values() {
        let base = SessionConfig::default();
        assert!(matches!(
            base.clone().with_sample_rate(0.0).validate(),
            Err(ConfigError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            base.clone().with_sample_rate(f32::NAN).validate(),
            Err(ConfigError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            base.clone().with_channels(0).validate(),
            Err(ConfigError::NoChannels)
        ));
        assert!(matches!(
            base.clone().with_channel_capacity(100).validate(),
            Err(ConfigError::InvalidCapacity(100))
        ));
        assert!(matches!(
            base.with_max_block_frames(0).validate(),
            Err(ConfigError::EmptyBlock)
        ));
    }

    #[test]
    fn parses_partial_json() {
        let config = SessionConfig::from_json_str(
            r#"{
                "sample_rate": 44100.0,
                "max_block_frames": 256,
                "padding": "pad_immediately",
                "initial": { "crossfader": 0.0, "manual_latency_samples": 128 }
            }"#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 44_100.0);
        assert_eq!(config.channels, 2);
        assert_eq!(config.max_block_frames, 256);
        assert_eq!(config.padding, PaddingPolicy::PadImmediately);
        assert_eq!(config.backend, StretchBackend::Passthrough);
        assert_eq!(config.initial.crossfader, 0.0);
        assert_eq!(config.initial.manual_latency_samples, 128);
        assert_eq!(config.initial.master_gain, 1.0);
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        assert!(matches!(
            SessionConfig::from_json_str("{ not json"),
            Err(ConfigError::Parse(_))
        ));
        assert!(matches!(
            SessionConfig::from_json_str(r#"{ "channel_capacity": 3 }"#),
            Err(ConfigError::InvalidCapacity(3))
        ));
    }

    #[test]
    fn loads_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let mut file = fs::File::create(&path).unwrap();
        write!(file, r#"{{ "channels": 1, "channel_capacity": 16 }}"#).unwrap();
        drop(file);

        let config = SessionConfig::from_path(&path).unwrap();
        assert_eq!(config.channels, 1);
        assert_eq!(config.channel_capacity, 16);

        assert!(matches!(
            SessionConfig::from_path(dir.path().join("missing.json")),
            Err(ConfigError::Read(_))
        ));
    }

    #[test]
    fn round_trips_through_json() {
        let config = SessionConfig::default().with_channels(1);
        let json = serde_json::to_string(&config).unwrap();
        assert_eq!(SessionConfig::from_json_str(&json).unwrap(), config);
    }
}
