//! Error handling for sensorstream-rs
//!
//! This module defines the crate error type and a Result alias for use
//! throughout the decoder.
//!
//! Frame-level parse failures never reach this type: they are recovered
//! inside the parser (see [`crate::parser::FrameError`]). Queue overflow is
//! not an error either, it only shows up in the pipeline statistics.

use crate::types::PipelineState;
use thiserror::Error;

/// Main error type for sensorstream-rs operations
#[derive(Error, Debug)]
pub enum DecoderError {
    /// Errors related to configuration loading, saving or validation
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single channel failed to decode a sample (non-fatal)
    #[error("Channel {channel} decode error: {message}")]
    ChannelDecode { channel: usize, message: String },

    /// A lifecycle operation was requested in a state that does not allow it
    #[error("Cannot {operation} while pipeline is {state}")]
    InvalidState {
        operation: &'static str,
        state: PipelineState,
    },

    /// Errors related to channel communication
    #[error("Channel error: {0}")]
    Channel(String),

    /// IO errors (including byte source read faults)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<DecoderError>,
    },
}

impl DecoderError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        DecoderError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether this error ends the pipeline
    ///
    /// Only source read faults are fatal; everything else is isolated to a
    /// sample, a channel or a single API call.
    pub fn is_fatal(&self) -> bool {
        match self {
            DecoderError::Io(_) => true,
            DecoderError::WithContext { source, .. } => source.is_fatal(),
            _ => false,
        }
    }
}

impl From<toml::de::Error> for DecoderError {
    fn from(err: toml::de::Error) -> Self {
        DecoderError::Serialization(err.to_string())
    }
}

impl From<toml::ser::Error> for DecoderError {
    fn from(err: toml::ser::Error) -> Self {
        DecoderError::Serialization(err.to_string())
    }
}

/// Result type alias for sensorstream-rs operations
pub type Result<T> = std::result::Result<T, DecoderError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| DecoderError::Io(e).with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DecoderError::Io(e).with_context(f()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DecoderError::Config("decimation_factor must be at least 1".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: decimation_factor must be at least 1"
        );
    }

    #[test]
    fn test_error_with_context() {
        let err = DecoderError::Config("test".to_string());
        let with_ctx = err.with_context("Failed to load config");
        assert!(with_ctx.to_string().contains("Failed to load config"));
    }

    #[test]
    fn test_invalid_state_error() {
        let err = DecoderError::InvalidState {
            operation: "start",
            state: PipelineState::Stopped,
        };
        assert_eq!(err.to_string(), "Cannot start while pipeline is Stopped");
    }

    #[test]
    fn test_fatality() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "gone");
        assert!(DecoderError::Io(io).is_fatal());

        let io = std::io::Error::new(std::io::ErrorKind::Other, "gone");
        assert!(DecoderError::Io(io).with_context("reading line 3").is_fatal());

        let decode = DecoderError::ChannelDecode {
            channel: 2,
            message: "missing reading".to_string(),
        };
        assert!(!decode.is_fatal());
    }

    #[test]
    fn test_io_result_context() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "no such file",
        ));
        let err = result.context("Failed to open capture").unwrap_err();
        assert!(err.to_string().starts_with("Failed to open capture"));
    }
}
