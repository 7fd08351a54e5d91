// src/error.rs
//
// Error types shared across the decoder, staging queue and pipeline.
// Per-token decode failures live in frame::event (they are data, not errors
// that stop anything).

use thiserror::Error;

// ============================================================================
// Configuration Errors
// ============================================================================

/// Configuration rejected at construction time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("at least one start marker must be configured")]
    NoMarkers,
    #[error("start marker '{marker}' must expect at least one value")]
    ZeroValueCount { marker: String },
    #[error("start marker '{marker}' is configured more than once")]
    DuplicateMarker { marker: String },
    #[error("staging queue capacity must be greater than zero")]
    ZeroCapacity,
    #[error("tokenizer delimiter must not be empty")]
    EmptyDelimiter,
    #[error("invalid hex delimiter '{value}': {reason}")]
    InvalidDelimiter { value: String, reason: String },
    #[error("tokenizer max_length must be greater than zero")]
    ZeroMaxLength,
    #[error("unknown tokenizer mode: {0}")]
    UnknownTokenizerMode(String),
    #[error("series window must be greater than zero")]
    ZeroSeriesWindow,
    #[error("failed to read settings: {0}")]
    Read(String),
    #[error("failed to parse settings: {0}")]
    Parse(String),
    #[error("failed to serialize settings: {0}")]
    Encode(String),
}

// ============================================================================
// Staging Queue Errors
// ============================================================================

/// Returned by blocking queue operations once the queue has been shut down.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("staging queue is closed")]
pub struct QueueClosed;

/// Returned by `StagingQueue::try_push`. The rejected item is handed back.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum TryPushError<T> {
    #[error("staging queue is full")]
    Full(T),
    #[error("staging queue is closed")]
    Closed(T),
}

impl<T> TryPushError<T> {
    /// Recover the item that could not be queued.
    pub fn into_inner(self) -> T {
        match self {
            TryPushError::Full(item) | TryPushError::Closed(item) => item,
        }
    }
}

// ============================================================================
// Sink Errors
// ============================================================================

/// The consumer behind a frame sink has gone away.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("frame sink is closed")]
pub struct SinkClosed;

// ============================================================================
// Pipeline Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn decoder worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("decoder worker panicked")]
    WorkerPanicked,
}
