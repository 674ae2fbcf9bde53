//! Configuration module for sensorstream-rs
//!
//! This module handles the configuration surface the collaborator uses to
//! tune the pipeline:
//! - Nominal sample rate and the pacing it implies
//! - Decimation factor and display-rate ceiling for observations
//! - Queue capacity, queue poll timeout and the fan-out policy
//! - The wire format of a frame (see [`FrameFormat`])
//!
//! # Files
//!
//! Configurations are stored as TOML. Every field has a default, so a file
//! only needs to list what it changes:
//!
//! ```toml
//! sample_rate_hz = 500
//! decimation_factor = 50
//!
//! [fan_out]
//! mode = "block"
//! timeout_ms = 2
//!
//! [frame]
//! channel_count = 8
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sensorstream_rs::config::PipelineConfig;
//!
//! let config = PipelineConfig::load("decoder.toml")?;
//! config.validate()?;
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{DecoderError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default nominal sample rate in Hz
pub const DEFAULT_SAMPLE_RATE_HZ: u32 = 1000;

/// Default number of samples between observations
pub const DEFAULT_DECIMATION_FACTOR: u64 = 100;

/// Default minimum time between observations of one channel
pub const DEFAULT_DISPLAY_INTERVAL_MS: u64 = 100;

/// Default capacity of each channel queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Default worker wait before re-checking the stop signal
pub const DEFAULT_QUEUE_POLL_TIMEOUT_MS: u64 = 100;

/// Default number of samples between progress log lines
pub const DEFAULT_PROGRESS_LOG_INTERVAL: u64 = 1000;

/// Default capacity of the notification channel
pub const DEFAULT_EVENT_CAPACITY: usize = 10_000;

/// Complete pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Nominal replay rate in samples per second (0 disables pacing)
    pub sample_rate_hz: u32,
    /// Emit one observation every this many samples per channel
    pub decimation_factor: u64,
    /// Minimum time between two observations of the same channel (0 disables)
    pub display_interval_ms: u64,
    /// Capacity of each channel queue
    pub queue_capacity: usize,
    /// How long a worker waits on its queue before re-checking for shutdown
    pub queue_poll_timeout_ms: u64,
    /// Log ingestion progress every this many samples (0 disables)
    pub progress_log_interval: u64,
    /// Capacity of the notification channel to the collaborator
    pub event_capacity: usize,
    /// Behaviour when a channel queue is full
    pub fan_out: FanOutPolicy,
    /// Frame wire format
    pub frame: FrameFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: DEFAULT_SAMPLE_RATE_HZ,
            decimation_factor: DEFAULT_DECIMATION_FACTOR,
            display_interval_ms: DEFAULT_DISPLAY_INTERVAL_MS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            queue_poll_timeout_ms: DEFAULT_QUEUE_POLL_TIMEOUT_MS,
            fan_out: FanOutPolicy::default(),
            progress_log_interval: DEFAULT_PROGRESS_LOG_INTERVAL,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            frame: FrameFormat::default(),
        }
    }
}

impl PipelineConfig {
    /// Load a configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            DecoderError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        Self::from_toml(&content)
            .map_err(|e| e.with_context(format!("Failed to parse config file {:?}", path)))
    }

    /// Load a configuration, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Parse a configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Render the configuration as TOML text
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Save the configuration to a TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                DecoderError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = self.to_toml()?;
        std::fs::write(path, content)
            .map_err(|e| DecoderError::Config(format!("Failed to write config file: {}", e)))
    }

    /// Check the configuration for values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.decimation_factor == 0 {
            return Err(DecoderError::Config(
                "decimation_factor must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(DecoderError::Config(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if self.queue_poll_timeout_ms == 0 {
            return Err(DecoderError::Config(
                "queue_poll_timeout_ms must be at least 1".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(DecoderError::Config(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        self.frame.validate().map_err(DecoderError::Config)?;

        if let Some(decimated) = self.decimated_interval() {
            let ceiling = self.display_interval();
            if self.display_interval_ms > 0 && decimated != ceiling {
                tracing::warn!(
                    "decimation_factor ({}) at {} Hz yields one observation every {:?}, \
                     but display_interval_ms is {:?}; the display ceiling will dominate",
                    self.decimation_factor,
                    self.sample_rate_hz,
                    decimated,
                    ceiling
                );
            }
        }

        // Worst case, one publish waits the full timeout on every channel
        if let (Some(timeout), Some(interval)) = (self.fan_out.timeout(), self.sample_interval()) {
            let worst = timeout.saturating_mul(self.frame.channel_count as u32);
            if worst > interval {
                tracing::warn!(
                    "fan-out may stall ingestion for up to {:?} per sample, \
                     longer than the {:?} sample interval",
                    worst,
                    interval
                );
            }
        }

        Ok(())
    }

    /// Nominal time between two samples, `None` when pacing is disabled
    pub fn sample_interval(&self) -> Option<Duration> {
        if self.sample_rate_hz == 0 {
            None
        } else {
            Some(Duration::from_nanos(
                1_000_000_000 / self.sample_rate_hz as u64,
            ))
        }
    }

    /// Time between two observations implied by the decimation factor
    pub fn decimated_interval(&self) -> Option<Duration> {
        self.sample_interval().map(|interval| {
            Duration::from_nanos(
                (interval.as_nanos() as u64).saturating_mul(self.decimation_factor),
            )
        })
    }

    /// Output-rate ceiling per channel
    pub fn display_interval(&self) -> Duration {
        Duration::from_millis(self.display_interval_ms)
    }

    /// Worker queue wait before re-checking the stop signal
    pub fn queue_poll_timeout(&self) -> Duration {
        Duration::from_millis(self.queue_poll_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.sample_rate_hz, 1000);
        assert_eq!(config.decimation_factor, 100);
        assert_eq!(config.display_interval_ms, 100);
        assert_eq!(config.queue_capacity, 10_000);
        assert_eq!(config.fan_out, FanOutPolicy::Drop);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_intervals() {
        let config = PipelineConfig::default();
        assert_eq!(config.sample_interval(), Some(Duration::from_millis(1)));
        assert_eq!(config.decimated_interval(), Some(Duration::from_millis(100)));
        assert_eq!(config.display_interval(), Duration::from_millis(100));

        let unpaced = PipelineConfig {
            sample_rate_hz: 0,
            ..Default::default()
        };
        assert_eq!(unpaced.sample_interval(), None);
        assert_eq!(unpaced.decimated_interval(), None);
    }

    #[test]
    fn test_validate_accepts_mismatched_display_ceiling() {
        // Decimation yields 100ms at 1 kHz; a 250ms ceiling only warns
        let config = PipelineConfig {
            display_interval_ms: 250,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let stalling = PipelineConfig {
            fan_out: FanOutPolicy::Block { timeout_ms: 5 },
            ..Default::default()
        };
        assert!(stalling.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let config = PipelineConfig {
            decimation_factor: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(DecoderError::Config(_))));

        let config = PipelineConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = PipelineConfig::default();
        config.frame.channel_count = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = PipelineConfig::from_toml(
            r#"
            sample_rate_hz = 500

            [fan_out]
            mode = "block"
            timeout_ms = 2

            [frame]
            channel_count = 8
            "#,
        )
        .unwrap();

        assert_eq!(config.sample_rate_hz, 500);
        assert_eq!(config.decimation_factor, DEFAULT_DECIMATION_FACTOR);
        assert_eq!(config.fan_out, FanOutPolicy::Block { timeout_ms: 2 });
        assert_eq!(config.frame.channel_count, 8);
        assert_eq!(config.frame.marker, '!');
    }

    #[test]
    fn test_invalid_toml() {
        let result = PipelineConfig::from_toml("sample_rate_hz = \"fast\"");
        assert!(matches!(result, Err(DecoderError::Serialization(_))));
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("decoder.toml");

        let config = PipelineConfig {
            sample_rate_hz: 250,
            decimation_factor: 25,
            fan_out: FanOutPolicy::Block { timeout_ms: 10 },
            ..Default::default()
        };
        config.save(&path).unwrap();

        let loaded = PipelineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing.toml");
        assert!(PipelineConfig::load(&path).is_err());
        assert_eq!(PipelineConfig::load_or_default(&path), PipelineConfig::default());
    }
}
