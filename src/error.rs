//! Error types for trace-player.

use thiserror::Error;

/// Failure while producing a trace for a `(solution, input)` pair.
///
/// This is the only error a caller of the playback controller ever sees.
/// Bad command arguments are clamped and commands after disposal are
/// ignored, so neither surfaces here.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The solution rejected its input.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// The solution failed while simulating the algorithm.
    #[error("trace production failed: {0}")]
    Failed(#[from] anyhow::Error),

    /// The producer panicked or its worker was cancelled.
    #[error("trace production aborted: {0}")]
    Aborted(String),
}

/// Errors from loading or validating a playback configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse playback config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid playback config: {0}")]
    Invalid(String),
}
