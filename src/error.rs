//! Error types for pfind
//!
//! This module defines the error hierarchy for:
//! - Configuration and startup errors (always fatal, raised before seeding)
//! - Work token encoding errors
//! - Worker thread errors
//!
//! Per-entry failures (a stat that fails, a directory that cannot be opened,
//! an unlink that fails) are not errors at this level. They are recovered
//! inside the worker and only show up in counters and logs.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for pfind
#[derive(Error, Debug)]
pub enum FindError {
    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Work token errors
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// Worker/concurrency errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),
}

/// Configuration and startup errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Invalid worker count
    #[error("Invalid worker count {count}: must be between 1 and {max}")]
    InvalidWorkerCount { count: usize, max: usize },

    /// Verbosity above the supported maximum
    #[error("Invalid verbosity {level}: must be at most {max}")]
    InvalidVerbosity { level: u8, max: u8 },

    /// Path length limit too small to be useful
    #[error("Invalid maximum path length {len}: must be at least {min}")]
    InvalidPathLimit { len: usize, min: usize },

    /// Root path could not be canonicalized
    #[error("Cannot resolve directory '{path}': {reason}")]
    UnresolvableRoot { path: PathBuf, reason: String },

    /// Root exists but cannot be listed
    #[error("Cannot open directory '{path}': {reason}")]
    UnreadableRoot { path: PathBuf, reason: String },

    /// Freshness baseline could not be read
    #[error("Could not read timestamp file '{path}': {reason}")]
    TimestampUnreadable { path: PathBuf, reason: String },
}

/// Work token encoding/decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// Path exceeds the configured maximum
    #[error("Path of {len} bytes exceeds the {max} byte limit: '{path}'")]
    PathTooLong { path: String, len: usize, max: usize },

    /// Token is empty or carries an unknown tag
    #[error("Malformed work token: {0}")]
    Malformed(String),
}

/// Worker thread errors
#[derive(Error, Debug)]
pub enum WorkerError {
    /// Worker panicked
    #[error("Worker {id} panicked: {message}")]
    Panicked { id: usize, message: String },

    /// Worker thread could not be started
    #[error("Failed to initialize worker {id}: {reason}")]
    InitFailed { id: usize, reason: String },

    /// The reduction produced no result on the root rank
    #[error("No result was reduced on rank 0")]
    MissingResult,
}

/// Result type alias for FindError
pub type Result<T> = std::result::Result<T, FindError>;

/// Result type alias for CodecError
pub type CodecResult<T> = std::result::Result<T, CodecError>;
