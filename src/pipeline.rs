// src/pipeline.rs
//
// Byte stream -> tokens -> staging queue -> decoder worker -> sink.
//
// The transport side holds a FrameFeeder and calls `feed` with every chunk it
// reads. A dedicated worker thread owns the FrameDecoder, pops tokens in
// arrival order and publishes each outcome. The PipelineHandle controls the
// worker (frame checking on/off, statistics, shutdown).

use std::sync::{
    atomic::{AtomicBool, AtomicU64, Ordering},
    Arc,
};
use std::thread::JoinHandle;

use serde::Serialize;

use crate::error::{PipelineError, QueueClosed};
use crate::frame::{FrameDecoder, FrameEvent};
use crate::settings::DecoderSettings;
use crate::sink::FrameSink;
use crate::staging::StagingQueue;
use crate::tokenizer::Tokenizer;

const WORKER_THREAD_NAME: &str = "frame-decoder";

// ============================================================================
// Types
// ============================================================================

/// Item carried by the staging queue. Resets travel in-band so they apply
/// exactly between the tokens staged before and after them.
#[derive(Debug, Clone, PartialEq)]
enum Staged {
    Token(String),
    Reset,
}

/// Snapshot of pipeline counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PipelineStats {
    /// Raw bytes handed to the feeder
    pub bytes_received: u64,
    /// Tokens accepted by the staging queue
    pub tokens_staged: u64,
    /// FrameComplete outcomes published
    pub frames_completed: u64,
    /// InvalidStart / InvalidValue / InvalidEnd outcomes
    pub decode_errors: u64,
    /// Tokens forwarded while frame checking was off
    pub passthrough: u64,
}

#[derive(Default)]
struct Counters {
    bytes_received: AtomicU64,
    tokens_staged: AtomicU64,
    frames_completed: AtomicU64,
    decode_errors: AtomicU64,
    passthrough: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> PipelineStats {
        PipelineStats {
            bytes_received: self.bytes_received.load(Ordering::Relaxed),
            tokens_staged: self.tokens_staged.load(Ordering::Relaxed),
            frames_completed: self.frames_completed.load(Ordering::Relaxed),
            decode_errors: self.decode_errors.load(Ordering::Relaxed),
            passthrough: self.passthrough.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// Spawn
// ============================================================================

/// Validate `settings`, start the decoder worker and return the producer and
/// control halves. Nothing is spawned if the configuration is rejected.
pub fn spawn_pipeline<S: FrameSink>(
    settings: &DecoderSettings,
    sink: S,
) -> Result<(FrameFeeder, PipelineHandle), PipelineError> {
    settings.validate()?;
    let decoder = FrameDecoder::new(settings.layout()?);
    let tokenizer = Tokenizer::new(settings.tokenizer_mode()?)?;
    let queue = Arc::new(StagingQueue::new(settings.queue_capacity)?);

    let frame_check = Arc::new(AtomicBool::new(settings.frame_check));
    let counters = Arc::new(Counters::default());

    let worker = {
        let queue = Arc::clone(&queue);
        let frame_check = Arc::clone(&frame_check);
        let counters = Arc::clone(&counters);
        std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || run_decoder_loop(queue, decoder, sink, frame_check, counters))?
    };

    crate::tlog!(
        "[pipeline] Started ({} markers, end '{}', queue capacity {}, frame check {})",
        settings.markers.len(),
        settings.end_marker,
        settings.queue_capacity,
        if settings.frame_check { "on" } else { "off" }
    );

    let feeder = FrameFeeder {
        tokenizer,
        queue: Arc::clone(&queue),
        counters: Arc::clone(&counters),
    };
    let handle = PipelineHandle {
        queue,
        frame_check,
        counters,
        worker: Some(worker),
    };
    Ok((feeder, handle))
}

/// Closes the staging queue when the worker exits, including by panic, so a
/// producer blocked on a full queue gets `QueueClosed`.
struct CloseOnExit(Arc<StagingQueue<Staged>>);

impl Drop for CloseOnExit {
    fn drop(&mut self) {
        if std::thread::panicking() {
            crate::tlog!("[pipeline] Decoder worker panicked, closing staging queue");
        }
        self.0.shutdown();
    }
}

/// Worker body: pop until the queue is shut down and drained.
fn run_decoder_loop<S: FrameSink>(
    queue: Arc<StagingQueue<Staged>>,
    mut decoder: FrameDecoder,
    mut sink: S,
    frame_check: Arc<AtomicBool>,
    counters: Arc<Counters>,
) {
    let _close = CloseOnExit(Arc::clone(&queue));
    let mut checking = frame_check.load(Ordering::Relaxed);
    let mut sink_open = true;

    while let Ok(item) = queue.pop() {
        let token = match item {
            Staged::Token(token) => token,
            Staged::Reset => {
                decoder.reset();
                crate::tlog!("[pipeline] Decoder reset");
                continue;
            }
        };

        let check_now = frame_check.load(Ordering::Relaxed);
        if check_now != checking {
            // Whatever was half-assembled before passthrough is stale
            decoder.reset();
            checking = check_now;
        }

        let outcome = if checking {
            decoder.step(&token)
        } else {
            Ok(FrameEvent::Passthrough { token })
        };

        match &outcome {
            Ok(FrameEvent::FrameComplete(_)) => {
                counters.frames_completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(FrameEvent::Passthrough { .. }) => {
                counters.passthrough.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {}
            Err(e) => {
                counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                crate::tlog!("[decoder] {}", e);
            }
        }

        if sink_open && sink.publish(outcome).is_err() {
            sink_open = false;
            crate::tlog!("[pipeline] Frame sink closed, outcomes are no longer published");
        }
    }

    crate::tlog!("[pipeline] Decoder worker stopped");
}

// ============================================================================
// Producer Half
// ============================================================================

/// Arrival-side handle. Owned by whoever reads the transport; one per pipeline.
pub struct FrameFeeder {
    tokenizer: Tokenizer,
    queue: Arc<StagingQueue<Staged>>,
    counters: Arc<Counters>,
}

impl FrameFeeder {
    /// Tokenize `chunk` and stage every completed token, blocking while the
    /// queue is full. Returns the number of tokens staged.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<usize, QueueClosed> {
        self.counters
            .bytes_received
            .fetch_add(chunk.len() as u64, Ordering::Relaxed);

        let tokens = self.tokenizer.feed(chunk);
        let count = tokens.len();
        for token in tokens {
            self.stage(token)?;
        }
        Ok(count)
    }

    /// Stage the tokenizer's trailing partial token, if any (end of stream).
    pub fn flush(&mut self) -> Result<bool, QueueClosed> {
        match self.tokenizer.flush() {
            Some(token) => self.stage(token).map(|_| true),
            None => Ok(false),
        }
    }

    /// Drop any partial token and reset the decoder once the tokens already
    /// staged have been processed. Use after a transport error.
    pub fn reset(&mut self) -> Result<(), QueueClosed> {
        self.tokenizer.reset();
        self.queue.push(Staged::Reset)
    }

    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    fn stage(&self, token: String) -> Result<(), QueueClosed> {
        self.queue.push(Staged::Token(token))?;
        self.counters.tokens_staged.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

// ============================================================================
// Control Half
// ============================================================================

/// Control handle for the decoder worker. Dropping it shuts the pipeline
/// down and waits for the worker.
pub struct PipelineHandle {
    queue: Arc<StagingQueue<Staged>>,
    frame_check: Arc<AtomicBool>,
    counters: Arc<Counters>,
    worker: Option<JoinHandle<()>>,
}

impl PipelineHandle {
    /// Switch frame checking on or off. While off, tokens are published as
    /// `Passthrough`. Switching applies from the next token the worker pops;
    /// any partial frame is dropped.
    pub fn set_frame_check(&self, enabled: bool) {
        let previous = self.frame_check.swap(enabled, Ordering::Relaxed);
        if previous != enabled {
            crate::tlog!(
                "[pipeline] Frame check {}",
                if enabled { "enabled" } else { "disabled" }
            );
        }
    }

    pub fn frame_check(&self) -> bool {
        self.frame_check.load(Ordering::Relaxed)
    }

    pub fn stats(&self) -> PipelineStats {
        self.counters.snapshot()
    }

    /// Tokens waiting for the worker
    pub fn backlog(&self) -> usize {
        self.queue.len()
    }

    /// Close the staging queue. The worker finishes what is already staged
    /// and exits; further `feed` calls fail with `QueueClosed`.
    pub fn shutdown(&self) {
        self.queue.shutdown();
    }

    /// Shut down and wait for the worker to finish.
    pub fn join(mut self) -> Result<PipelineStats, PipelineError> {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| PipelineError::WorkerPanicked)?;
        }
        let stats = self.stats();
        crate::tlog!(
            "[pipeline] Stopped: {} bytes, {} tokens, {} frames, {} errors",
            stats.bytes_received,
            stats.tokens_staged,
            stats.frames_completed,
            stats.decode_errors
        );
        Ok(stats)
    }
}

impl Drop for PipelineHandle {
    fn drop(&mut self) {
        self.queue.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                crate::tlog!("[pipeline] Decoder worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConfigError;
    use crate::frame::{CompletedFrame, DecodingOutcome, FrameError, FrameKind};
    use std::sync::mpsc;
    use std::time::Duration;

    const BOUND: Duration = Duration::from_secs(5);

    fn start(
        settings: &DecoderSettings,
    ) -> (FrameFeeder, PipelineHandle, mpsc::Receiver<DecodingOutcome>) {
        let (tx, rx) = mpsc::channel();
        let (feeder, handle) = spawn_pipeline(settings, tx).unwrap();
        (feeder, handle, rx)
    }

    fn completed(rx: &mpsc::Receiver<DecodingOutcome>) -> Vec<CompletedFrame> {
        rx.try_iter()
            .filter_map(|o| match o {
                Ok(FrameEvent::FrameComplete(frame)) => Some(frame),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_scenario_through_pipeline() {
        let (mut feeder, handle, rx) = start(&DecoderSettings::default());
        let staged = feeder.feed(b"START2\r\n1.0\r\n2.5\r\n-3\r\nEND\r\n").unwrap();
        assert_eq!(staged, 5);

        let stats = handle.join().unwrap();
        let kind = FrameKind(1);
        let outcomes: Vec<DecodingOutcome> = rx.try_iter().collect();
        assert_eq!(
            outcomes,
            vec![
                Ok(FrameEvent::StartAccepted {
                    kind,
                    token: "START2".to_string()
                }),
                Ok(FrameEvent::ValueAccepted {
                    kind,
                    index: 0,
                    value: 1.0
                }),
                Ok(FrameEvent::ValueAccepted {
                    kind,
                    index: 1,
                    value: 2.5
                }),
                Ok(FrameEvent::ValueAccepted {
                    kind,
                    index: 2,
                    value: -3.0
                }),
                Ok(FrameEvent::FrameComplete(CompletedFrame {
                    kind,
                    values: vec![1.0, 2.5, -3.0],
                    start_token: "START2".to_string(),
                    end_token: "END".to_string(),
                })),
            ]
        );
        assert_eq!(
            stats,
            PipelineStats {
                bytes_received: 27,
                tokens_staged: 5,
                frames_completed: 1,
                decode_errors: 0,
                passthrough: 0,
            }
        );
    }

    #[test]
    fn test_byte_at_a_time_with_small_queue() {
        let settings = DecoderSettings {
            queue_capacity: 1,
            ..DecoderSettings::default()
        };
        let (mut feeder, handle, rx) = start(&settings);

        let mut stream = Vec::new();
        for i in 0..20 {
            stream.extend_from_slice(format!("START1\n{}\n{}.5\n-{}\nEND\n", i, i, i).as_bytes());
        }
        for byte in &stream {
            feeder.feed(std::slice::from_ref(byte)).unwrap();
        }

        let stats = handle.join().unwrap();
        let frames = completed(&rx);
        assert_eq!(frames.len(), 20);
        for (i, frame) in frames.iter().enumerate() {
            let i = i as f64;
            assert_eq!(frame.values, vec![i, i + 0.5, -i]);
        }
        assert_eq!(stats.frames_completed, 20);
        assert_eq!(stats.tokens_staged, 100);
        assert_eq!(stats.bytes_received, stream.len() as u64);
    }

    #[test]
    fn test_errors_are_published_and_counted() {
        let (mut feeder, handle, rx) = start(&DecoderSettings::default());
        feeder.feed(b"START1\n2.0\nabc\nEND\n").unwrap();
        let stats = handle.join().unwrap();

        let outcomes: Vec<DecodingOutcome> = rx.try_iter().collect();
        assert_eq!(outcomes.len(), 4);
        assert!(matches!(
            &outcomes[2],
            Err(FrameError::InvalidValue { token, index: 1, .. }) if token == "abc"
        ));
        assert!(matches!(
            &outcomes[3],
            Err(FrameError::InvalidStart { token, .. }) if token == "END"
        ));
        assert_eq!(stats.decode_errors, 2);
        assert_eq!(stats.frames_completed, 0);
    }

    #[test]
    fn test_passthrough_when_frame_check_off() {
        let settings = DecoderSettings {
            frame_check: false,
            ..DecoderSettings::default()
        };
        let (mut feeder, handle, rx) = start(&settings);
        assert!(!handle.frame_check());
        feeder.feed(b"hello\nSTART1\n").unwrap();
        let stats = handle.join().unwrap();

        let outcomes: Vec<DecodingOutcome> = rx.try_iter().collect();
        assert_eq!(
            outcomes,
            vec![
                Ok(FrameEvent::Passthrough {
                    token: "hello".to_string()
                }),
                Ok(FrameEvent::Passthrough {
                    token: "START1".to_string()
                }),
            ]
        );
        assert_eq!(stats.passthrough, 2);
    }

    #[test]
    fn test_toggling_frame_check_drops_partial_frame() {
        let (mut feeder, handle, rx) = start(&DecoderSettings::default());
        feeder.feed(b"START1\n1\n").unwrap();
        for _ in 0..2 {
            assert!(rx.recv_timeout(BOUND).unwrap().is_ok());
        }

        handle.set_frame_check(false);
        feeder.feed(b"raw\n").unwrap();
        assert_eq!(
            rx.recv_timeout(BOUND).unwrap(),
            Ok(FrameEvent::Passthrough {
                token: "raw".to_string()
            })
        );

        handle.set_frame_check(true);
        // The half-built START1 frame is gone, so a value is now a bad start
        feeder.feed(b"2\n").unwrap();
        assert!(matches!(
            rx.recv_timeout(BOUND).unwrap(),
            Err(FrameError::InvalidStart { .. })
        ));
        handle.join().unwrap();
    }

    #[test]
    fn test_reset_discards_partial_state() {
        let (mut feeder, handle, rx) = start(&DecoderSettings::default());
        feeder.feed(b"START1\n1\n2").unwrap();
        feeder.reset().unwrap();
        feeder.feed(b"START3\n4\n5\n6\nEND\n").unwrap();
        handle.join().unwrap();

        let outcomes: Vec<DecodingOutcome> = rx.try_iter().collect();
        // START1, 1 before the reset; the buffered "2" never became a token
        assert_eq!(outcomes.len(), 7);
        assert!(matches!(
            &outcomes[2],
            Ok(FrameEvent::StartAccepted { kind: FrameKind(2), .. })
        ));
        assert!(matches!(
            &outcomes[6],
            Ok(FrameEvent::FrameComplete(frame)) if frame.values == vec![4.0, 5.0, 6.0]
        ));
    }

    #[test]
    fn test_flush_stages_trailing_token() {
        let (mut feeder, handle, rx) = start(&DecoderSettings::default());
        feeder.feed(b"START1\n1\n2\n3\nEND").unwrap();
        assert!(feeder.flush().unwrap());
        assert!(!feeder.flush().unwrap());
        handle.join().unwrap();
        assert_eq!(completed(&rx).len(), 1);
    }

    #[test]
    fn test_chunk_mode_matches_read_per_line() {
        let mut settings = DecoderSettings::default();
        settings.tokenizer.mode = "chunk".to_string();
        let (mut feeder, handle, rx) = start(&settings);
        for chunk in [&b"START2\r\n"[..], b"7\r\n", b"8\r\n", b"9\r\n", b"END\r\n"] {
            feeder.feed(chunk).unwrap();
        }
        handle.join().unwrap();
        let frames = completed(&rx);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].values, vec![7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_invalid_settings_rejected_before_spawn() {
        let settings = DecoderSettings {
            queue_capacity: 0,
            ..DecoderSettings::default()
        };
        let (tx, _rx) = mpsc::channel();
        assert!(matches!(
            spawn_pipeline(&settings, tx),
            Err(PipelineError::Config(ConfigError::ZeroCapacity))
        ));
    }

    #[test]
    fn test_closed_sink_does_not_stall_producer() {
        let settings = DecoderSettings {
            queue_capacity: 2,
            ..DecoderSettings::default()
        };
        let (mut feeder, handle, rx) = start(&settings);
        drop(rx);
        for _ in 0..50 {
            feeder.feed(b"START1\n1\n2\n3\nEND\n").unwrap();
        }
        let stats = handle.join().unwrap();
        assert_eq!(stats.frames_completed, 50);
    }

    #[test]
    fn test_panicking_sink_closes_queue() {
        let settings = DecoderSettings {
            queue_capacity: 2,
            ..DecoderSettings::default()
        };
        let sink = crate::sink::sink_fn(|_| panic!("sink failure"));
        let (mut feeder, handle) = spawn_pipeline(&settings, sink).unwrap();

        let (done_tx, done_rx) = mpsc::channel();
        let producer = std::thread::spawn(move || {
            let mut result = Ok(0);
            for _ in 0..20 {
                result = feeder.feed(b"START1\n");
                if result.is_err() {
                    break;
                }
            }
            let _ = done_tx.send(result);
        });

        assert_eq!(done_rx.recv_timeout(BOUND).unwrap(), Err(QueueClosed));
        producer.join().unwrap();
        assert!(matches!(handle.join(), Err(PipelineError::WorkerPanicked)));
    }

    #[test]
    fn test_feed_after_shutdown_fails() {
        let (mut feeder, handle, _rx) = start(&DecoderSettings::default());
        handle.shutdown();
        assert!(feeder.is_closed());
        assert_eq!(feeder.feed(b"START1\n"), Err(QueueClosed));
        assert_eq!(feeder.reset(), Err(QueueClosed));
        handle.join().unwrap();
    }

    #[test]
    fn test_dropping_handle_stops_worker() {
        let (mut feeder, handle, rx) = start(&DecoderSettings::default());
        feeder.feed(b"START1\n").unwrap();
        drop(handle);
        // Worker drained the staged token and exited, dropping its sender
        assert!(rx.recv_timeout(BOUND).unwrap().is_ok());
        assert!(rx.recv_timeout(BOUND).is_err());
        assert!(feeder.feed(b"1\n").is_err());
    }
}
