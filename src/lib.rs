// src/lib.rs
//
// frametap: marker-delimited frame decoding for line-oriented serial streams.
//
// Bytes arrive through a FrameFeeder, are split into tokens, staged in a
// bounded queue and decoded on a dedicated worker into FrameEvents, which are
// handed to a FrameSink.

#[macro_use]
pub mod logging;

pub mod error;
pub mod frame;
pub mod pipeline;
pub mod series;
pub mod settings;
pub mod sink;
pub mod staging;
pub mod tokenizer;

pub use error::{ConfigError, PipelineError, QueueClosed, SinkClosed, TryPushError};
pub use frame::{
    CompletedFrame, DecoderState, DecodingOutcome, FrameDecoder, FrameError, FrameEvent,
    FrameKind, FrameLayout, MarkerSpec,
};
pub use pipeline::{spawn_pipeline, FrameFeeder, PipelineHandle, PipelineStats};
pub use series::{RollingSeries, SeriesRouter};
pub use settings::{DecoderSettings, TokenizerSettings};
pub use sink::{sink_fn, FanoutSink, FnSink, FrameSink, SeriesSink};
pub use staging::StagingQueue;
pub use tokenizer::{Tokenizer, TokenizerMode};
