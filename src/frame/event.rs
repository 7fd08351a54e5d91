// src/frame/event.rs
//
// Outcome types produced by the frame decoder.
// Every step yields either a FrameEvent (accepted transition) or a FrameError
// (rejected token, decoder reset). Both serialize for a UI bridge and render
// as a one-line diagnostic via Display.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Index of the configured start marker that opened a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct FrameKind(pub usize);

impl FrameKind {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A fully validated frame: start marker, every expected value, end marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletedFrame {
    pub kind: FrameKind,
    /// Values in the order they arrived
    pub values: Vec<f64>,
    pub start_token: String,
    pub end_token: String,
}

/// Accepted transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameEvent {
    StartAccepted {
        kind: FrameKind,
        token: String,
    },
    ValueAccepted {
        kind: FrameKind,
        index: usize,
        value: f64,
    },
    FrameComplete(CompletedFrame),
    /// Token forwarded untouched because frame checking is switched off.
    /// Never produced by the decoder itself.
    Passthrough {
        token: String,
    },
}

impl fmt::Display for FrameEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameEvent::StartAccepted { kind, token } => {
                write!(f, "Received Start Frame: {} (kind {})", token, kind)
            }
            FrameEvent::ValueAccepted { kind, index, value } => {
                write!(
                    f,
                    "Received Data Frame: {} (kind {}, value {})",
                    value, kind, index
                )
            }
            FrameEvent::FrameComplete(frame) => {
                let data: Vec<String> = frame.values.iter().map(|v| v.to_string()).collect();
                write!(
                    f,
                    "Complete Packet - Start: {}, Data: [{}], End: {}",
                    frame.start_token,
                    data.join(", "),
                    frame.end_token
                )
            }
            FrameEvent::Passthrough { token } => write!(f, "Received Frame: {}", token),
        }
    }
}

/// Rejected token. The decoder is back in `WaitingForStart` after any of these.
#[derive(Error, Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FrameError {
    #[error("Invalid Start Frame: '{token}' (expected one of {expected})")]
    InvalidStart { token: String, expected: String },
    #[error("Invalid Data Frame: '{token}' (expected a number for value {index} of kind {kind})")]
    InvalidValue {
        token: String,
        kind: FrameKind,
        index: usize,
    },
    #[error("Invalid End Frame: '{token}' (expected '{expected}' to close kind {kind})")]
    InvalidEnd {
        token: String,
        kind: FrameKind,
        expected: String,
    },
}

impl FrameError {
    /// The offending token text.
    pub fn token(&self) -> &str {
        match self {
            FrameError::InvalidStart { token, .. }
            | FrameError::InvalidValue { token, .. }
            | FrameError::InvalidEnd { token, .. } => token,
        }
    }
}

/// Result of feeding one token to the decoder.
pub type DecodingOutcome = Result<FrameEvent, FrameError>;
