//! Unified error handling for Coolguard
//!
//! A single error type shared by the control engine, the collaborators and the
//! daemon binary. Each variant belongs to an [`ErrorClass`], which is what the
//! control loop looks at when deciding whether a failed tick is fatal.

use std::io;
use std::path::PathBuf;

/// Result type alias using CoolguardError
pub type Result<T> = std::result::Result<T, CoolguardError>;

/// Unified error type for all Coolguard operations
#[derive(thiserror::Error, Debug)]
pub enum CoolguardError {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig {
        field: String,
        reason: String,
    },

    #[error("Curve validation failed: {0}")]
    InvalidCurve(String),

    #[error("Invalid curve point {input:?}: {reason}")]
    MalformedPoint {
        input: String,
        reason: String,
    },

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Probe Errors
    // ============================================================================
    #[error("No readings available: {0}")]
    NoReadings(String),

    #[error("Probe unavailable: {0}")]
    ProbeUnavailable(String),

    // ============================================================================
    // Persistence Errors
    // ============================================================================
    #[error("Failed to read record {path}: {source}")]
    RecordRead {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to write record {path}: {source}")]
    RecordWrite {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to remove record {path}: {source}")]
    RecordRemove {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Failed to lock record {path}: {source}")]
    RecordLock {
        path: PathBuf,
        source: io::Error,
    },

    #[error("Invalid record key {0:?}")]
    InvalidRecordKey(String),

    // ============================================================================
    // Actuation Errors
    // ============================================================================
    #[error("Actuation failed: {0}")]
    Actuation(String),

    #[error("Power control failed: {0}")]
    PowerControl(String),

    // ============================================================================
    // Notification Errors
    // ============================================================================
    #[error("Notification failed: {0}")]
    Notification(String),

    #[error("Credential unavailable: {0}")]
    Credential(String),

    // ============================================================================
    // External Command Errors
    // ============================================================================
    #[error("Command {program} failed: {reason}")]
    Command {
        program: String,
        reason: String,
    },

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Coarse classification used by the control loop's error policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Configuration,
    Probe,
    Persistence,
    Actuation,
    PowerControl,
    Notification,
    Other,
}

impl CoolguardError {
    /// Create a config error from a string
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid config error for a named field
    pub fn invalid_config(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Create a probe error from a string
    pub fn probe(msg: impl Into<String>) -> Self {
        Self::ProbeUnavailable(msg.into())
    }

    /// Create an actuation error from a string
    pub fn actuation(msg: impl Into<String>) -> Self {
        Self::Actuation(msg.into())
    }

    /// Create a command error
    pub fn command(program: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Command {
            program: program.into(),
            reason: reason.into(),
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Config(_)
            | Self::InvalidConfig { .. }
            | Self::InvalidCurve(_)
            | Self::MalformedPoint { .. }
            | Self::JsonParse(_) => ErrorClass::Configuration,
            Self::NoReadings(_) | Self::ProbeUnavailable(_) => ErrorClass::Probe,
            Self::RecordRead { .. }
            | Self::RecordWrite { .. }
            | Self::RecordRemove { .. }
            | Self::RecordLock { .. }
            | Self::InvalidRecordKey(_) => ErrorClass::Persistence,
            Self::Actuation(_) => ErrorClass::Actuation,
            Self::PowerControl(_) => ErrorClass::PowerControl,
            Self::Notification(_) | Self::Credential(_) => ErrorClass::Notification,
            Self::Command { .. } | Self::Timeout(_) | Self::Io(_) => ErrorClass::Other,
        }
    }

    /// Whether a continuous loop may log this error and carry on at the next tick.
    ///
    /// Configuration problems never go away by waiting, everything else might.
    pub fn is_transient(&self) -> bool {
        self.class() != ErrorClass::Configuration
    }
}
