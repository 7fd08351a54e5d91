// src/sink.rs
//
// Outbound side of the pipeline. The decoder worker hands every outcome to
// one FrameSink; sinks forward to channels, closures, or the rolling series.

use std::sync::{mpsc as std_mpsc, Arc, Mutex, PoisonError};

use tokio::sync::mpsc;

use crate::error::SinkClosed;
use crate::frame::{DecodingOutcome, FrameEvent};
use crate::series::SeriesRouter;

/// Receives decoder outcomes on the worker thread.
///
/// Returning `SinkClosed` tells the worker nobody is listening any more; it
/// keeps draining tokens but stops publishing.
pub trait FrameSink: Send + 'static {
    fn publish(&mut self, outcome: DecodingOutcome) -> Result<(), SinkClosed>;
}

impl FrameSink for Box<dyn FrameSink> {
    fn publish(&mut self, outcome: DecodingOutcome) -> Result<(), SinkClosed> {
        (**self).publish(outcome)
    }
}

impl FrameSink for std_mpsc::Sender<DecodingOutcome> {
    fn publish(&mut self, outcome: DecodingOutcome) -> Result<(), SinkClosed> {
        self.send(outcome).map_err(|_| SinkClosed)
    }
}

/// Blocks the worker while the channel is full, which in turn backs up the
/// staging queue.
impl FrameSink for std_mpsc::SyncSender<DecodingOutcome> {
    fn publish(&mut self, outcome: DecodingOutcome) -> Result<(), SinkClosed> {
        self.send(outcome).map_err(|_| SinkClosed)
    }
}

/// For async UI consumers
impl FrameSink for mpsc::UnboundedSender<DecodingOutcome> {
    fn publish(&mut self, outcome: DecodingOutcome) -> Result<(), SinkClosed> {
        self.send(outcome).map_err(|_| SinkClosed)
    }
}

/// Closure adapter. The closure never reports the sink as closed.
pub struct FnSink<F>(pub F);

impl<F> FrameSink for FnSink<F>
where
    F: FnMut(DecodingOutcome) + Send + 'static,
{
    fn publish(&mut self, outcome: DecodingOutcome) -> Result<(), SinkClosed> {
        (self.0)(outcome);
        Ok(())
    }
}

pub fn sink_fn<F>(f: F) -> FnSink<F>
where
    F: FnMut(DecodingOutcome) + Send + 'static,
{
    FnSink(f)
}

/// Feeds completed frames into a shared SeriesRouter; other outcomes are ignored.
#[derive(Clone)]
pub struct SeriesSink {
    router: Arc<Mutex<SeriesRouter>>,
}

impl SeriesSink {
    pub fn new(router: SeriesRouter) -> Self {
        SeriesSink {
            router: Arc::new(Mutex::new(router)),
        }
    }

    /// Handle for the display side to read the series.
    pub fn router(&self) -> Arc<Mutex<SeriesRouter>> {
        Arc::clone(&self.router)
    }
}

impl FrameSink for SeriesSink {
    fn publish(&mut self, outcome: DecodingOutcome) -> Result<(), SinkClosed> {
        if let Ok(FrameEvent::FrameComplete(frame)) = &outcome {
            let mut router = self.router.lock().unwrap_or_else(PoisonError::into_inner);
            if !router.record(frame) {
                crate::tlog!(
                    "[sink] Frame of kind {} with {} values does not fit the series layout",
                    frame.kind,
                    frame.values.len()
                );
            }
        }
        Ok(())
    }
}

/// Publishes each outcome to every inner sink. Closed sinks are dropped;
/// the fan-out itself is closed once all of them are.
pub struct FanoutSink {
    sinks: Vec<Box<dyn FrameSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        FanoutSink { sinks: Vec::new() }
    }

    pub fn with(mut self, sink: impl FrameSink) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl Default for FanoutSink {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameSink for FanoutSink {
    fn publish(&mut self, outcome: DecodingOutcome) -> Result<(), SinkClosed> {
        self.sinks
            .retain_mut(|sink| sink.publish(outcome.clone()).is_ok());
        if self.sinks.is_empty() {
            Err(SinkClosed)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{CompletedFrame, FrameError, FrameKind, FrameLayout};
    use crate::series::EMPTY_POINT;

    fn complete(values: &[f64]) -> DecodingOutcome {
        Ok(FrameEvent::FrameComplete(CompletedFrame {
            kind: FrameKind(0),
            values: values.to_vec(),
            start_token: "START1".to_string(),
            end_token: "END".to_string(),
        }))
    }

    fn invalid() -> DecodingOutcome {
        Err(FrameError::InvalidStart {
            token: "x".to_string(),
            expected: "'START1'".to_string(),
        })
    }

    #[test]
    fn test_channel_sink_reports_closed() {
        let (mut tx, rx) = std_mpsc::channel();
        assert!(tx.publish(invalid()).is_ok());
        assert_eq!(rx.recv().unwrap(), invalid());
        drop(rx);
        assert_eq!(tx.publish(invalid()), Err(SinkClosed));
    }

    #[test]
    fn test_fn_sink_collects() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut sink = {
            let seen = Arc::clone(&seen);
            sink_fn(move |outcome| seen.lock().unwrap().push(outcome))
        };
        sink.publish(invalid()).unwrap();
        sink.publish(complete(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_series_sink_records_completed_frames_only() {
        let sink = SeriesSink::new(SeriesRouter::new(&FrameLayout::default(), 10));
        let router = sink.router();
        let mut sink = sink;

        sink.publish(invalid()).unwrap();
        assert_eq!(
            router.lock().unwrap().series(FrameKind(0), 0).unwrap().latest(),
            Some(EMPTY_POINT)
        );

        sink.publish(complete(&[1.0, 2.0, 3.0])).unwrap();
        let router = router.lock().unwrap();
        assert_eq!(router.latest(FrameKind(0)), Some(&[1.0, 2.0, 3.0][..]));
        assert_eq!(router.series(FrameKind(0), 2).unwrap().latest(), Some(3.0));
    }

    #[test]
    fn test_fanout_drops_closed_sinks() {
        let (tx_a, rx_a) = std_mpsc::channel();
        let (tx_b, rx_b) = std_mpsc::channel();
        let mut fanout = FanoutSink::new().with(tx_a).with(tx_b);
        assert_eq!(fanout.len(), 2);

        fanout.publish(invalid()).unwrap();
        assert!(rx_a.try_recv().is_ok());
        assert!(rx_b.try_recv().is_ok());

        drop(rx_a);
        fanout.publish(invalid()).unwrap();
        assert_eq!(fanout.len(), 1);
        assert!(rx_b.try_recv().is_ok());

        drop(rx_b);
        assert_eq!(fanout.publish(invalid()), Err(SinkClosed));
        assert!(fanout.is_empty());
    }

    #[tokio::test]
    async fn test_unbounded_tokio_sink() {
        let (mut tx, mut rx) = mpsc::unbounded_channel();
        tx.publish(complete(&[4.0, 5.0, 6.0])).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received, complete(&[4.0, 5.0, 6.0]));
    }
}
