// src/frame/mod.rs
//
// Marker-delimited frame decoding.
//
// - layout: validated start/end marker configuration
// - decoder: the per-token state machine
// - event: outcomes handed to sinks

pub mod decoder;
pub mod event;
pub mod layout;

pub use decoder::{parse_value, DecoderState, FrameDecoder};
pub use event::{CompletedFrame, DecodingOutcome, FrameError, FrameEvent, FrameKind};
pub use layout::{default_markers, FrameLayout, MarkerSpec};
