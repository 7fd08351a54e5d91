// src/frame/decoder.rs
//
// Marker-delimited frame decoder.
// Consumes one trimmed text token at a time:
//
//   <start marker> <value> ... <value> <end marker>
//
// The number of values depends on which start marker opened the frame.
// Any token that does not fit the current state drops the partial frame and
// returns the decoder to WaitingForStart. The decoder does no I/O and no
// logging; callers publish the returned outcome.

use serde::Serialize;

use super::event::{CompletedFrame, DecodingOutcome, FrameError, FrameEvent, FrameKind};
use super::layout::FrameLayout;

// =============================================================================
// Types
// =============================================================================

/// Observable decoder state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DecoderState {
    #[default]
    WaitingForStart,
    /// Expecting value number `index` (0-based) of a `kind` frame
    WaitingForValue { index: usize, kind: FrameKind },
    WaitingForEnd { kind: FrameKind },
}

/// Accumulator for the frame being assembled. Owned by the state that needs
/// it, so a state without a pending frame cannot exist.
#[derive(Debug)]
struct PendingFrame {
    kind: FrameKind,
    start_token: String,
    values: Vec<f64>,
    expected: usize,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    WaitingForStart,
    WaitingForValue(PendingFrame),
    WaitingForEnd(PendingFrame),
}

// =============================================================================
// Decoder
// =============================================================================

/// Single-owner frame decoder. Not shared between threads; the pipeline
/// worker owns it for its whole life.
#[derive(Debug)]
pub struct FrameDecoder {
    layout: FrameLayout,
    state: State,
}

impl FrameDecoder {
    pub fn new(layout: FrameLayout) -> Self {
        FrameDecoder {
            layout,
            state: State::WaitingForStart,
        }
    }

    pub fn layout(&self) -> &FrameLayout {
        &self.layout
    }

    pub fn state(&self) -> DecoderState {
        match &self.state {
            State::WaitingForStart => DecoderState::WaitingForStart,
            State::WaitingForValue(pending) => DecoderState::WaitingForValue {
                index: pending.values.len(),
                kind: pending.kind,
            },
            State::WaitingForEnd(pending) => DecoderState::WaitingForEnd { kind: pending.kind },
        }
    }

    /// Values accepted so far for the frame in progress.
    pub fn pending_values(&self) -> &[f64] {
        match &self.state {
            State::WaitingForStart => &[],
            State::WaitingForValue(pending) | State::WaitingForEnd(pending) => &pending.values,
        }
    }

    /// Drop any partial frame and wait for a start marker.
    pub fn reset(&mut self) {
        self.state = State::WaitingForStart;
    }

    /// Classify one token against the current state and transition.
    ///
    /// The state is taken out before matching, so every error path leaves the
    /// decoder in `WaitingForStart` with the partial frame dropped.
    pub fn step(&mut self, token: &str) -> DecodingOutcome {
        match std::mem::take(&mut self.state) {
            State::WaitingForStart => self.expect_start(token),
            State::WaitingForValue(pending) => self.expect_value(pending, token),
            State::WaitingForEnd(pending) => self.expect_end(pending, token),
        }
    }

    fn expect_start(&mut self, token: &str) -> DecodingOutcome {
        let matched = self
            .layout
            .match_start(token)
            .map(|(kind, marker)| (kind, marker.value_count));

        let Some((kind, expected)) = matched else {
            return Err(FrameError::InvalidStart {
                token: token.to_string(),
                expected: self.layout.expected_starts().to_string(),
            });
        };

        self.state = State::WaitingForValue(PendingFrame {
            kind,
            start_token: token.to_string(),
            values: Vec::with_capacity(expected),
            expected,
        });

        Ok(FrameEvent::StartAccepted {
            kind,
            token: token.to_string(),
        })
    }

    fn expect_value(&mut self, mut pending: PendingFrame, token: &str) -> DecodingOutcome {
        // A full accumulator always moves to WaitingForEnd
        debug_assert!(pending.values.len() < pending.expected);

        let index = pending.values.len();
        let kind = pending.kind;

        let Some(value) = parse_value(token) else {
            return Err(FrameError::InvalidValue {
                token: token.to_string(),
                kind,
                index,
            });
        };

        pending.values.push(value);
        self.state = if pending.values.len() == pending.expected {
            State::WaitingForEnd(pending)
        } else {
            State::WaitingForValue(pending)
        };

        Ok(FrameEvent::ValueAccepted { kind, index, value })
    }

    fn expect_end(&mut self, pending: PendingFrame, token: &str) -> DecodingOutcome {
        if token != self.layout.end_marker() {
            return Err(FrameError::InvalidEnd {
                token: token.to_string(),
                kind: pending.kind,
                expected: self.layout.end_marker().to_string(),
            });
        }

        Ok(FrameEvent::FrameComplete(CompletedFrame {
            kind: pending.kind,
            values: pending.values,
            start_token: pending.start_token,
            end_token: token.to_string(),
        }))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        FrameDecoder::new(FrameLayout::default())
    }
}

/// Strict numeric parse: the whole token must be a finite number.
/// "12abc", "3.14x", "" and " 1" are rejected, as are "inf" and "NaN".
pub fn parse_value(token: &str) -> Option<f64> {
    token.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Tests
// =============================================================================
