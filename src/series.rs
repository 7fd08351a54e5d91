// src/series.rs
//
// Rolling per-kind value series fed by completed frames.
// Each frame kind owns one series per value slot; the newest point sits at
// index 0 and the window is pre-filled with EMPTY_POINT so a plot always has
// a full x-range.

use std::collections::VecDeque;

use serde::Serialize;

use crate::frame::{CompletedFrame, FrameKind, FrameLayout};

/// Points kept per series
pub const DEFAULT_SERIES_WINDOW: usize = 60;

/// Placeholder for slots that have not received a value yet
pub const EMPTY_POINT: f64 = -1.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollingSeries {
    window: usize,
    points: VecDeque<f64>,
}

impl RollingSeries {
    pub fn new(window: usize) -> Self {
        let mut series = RollingSeries {
            window,
            points: VecDeque::with_capacity(window + 1),
        };
        series.clear();
        series
    }

    /// Insert at the front, dropping the oldest point.
    pub fn push(&mut self, value: f64) {
        self.points.push_front(value);
        self.points.truncate(self.window);
    }

    /// Refill the window with EMPTY_POINT.
    pub fn clear(&mut self) {
        self.points.clear();
        self.points.resize(self.window, EMPTY_POINT);
    }

    pub fn latest(&self) -> Option<f64> {
        self.points.front().copied()
    }

    /// Points, newest first
    pub fn points(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().copied()
    }

    pub fn window(&self) -> usize {
        self.window
    }
}

/// Routes completed frames into one rolling series per (kind, value slot).
#[derive(Debug, Clone, Serialize)]
pub struct SeriesRouter {
    kinds: Vec<Vec<RollingSeries>>,
    /// Most recent complete value tuple per kind
    last_frame: Vec<Option<Vec<f64>>>,
}

impl SeriesRouter {
    pub fn new(layout: &FrameLayout, window: usize) -> Self {
        let kinds = layout
            .markers()
            .iter()
            .map(|m| (0..m.value_count).map(|_| RollingSeries::new(window)).collect())
            .collect();
        SeriesRouter {
            kinds,
            last_frame: vec![None; layout.kind_count()],
        }
    }

    /// Record every value of `frame`. Returns false, recording nothing, if
    /// the frame does not fit this router's layout.
    pub fn record(&mut self, frame: &CompletedFrame) -> bool {
        let kind = frame.kind.index();
        let Some(slots) = self.kinds.get_mut(kind) else {
            return false;
        };
        if slots.len() != frame.values.len() {
            return false;
        }
        for (series, value) in slots.iter_mut().zip(&frame.values) {
            series.push(*value);
        }
        self.last_frame[kind] = Some(frame.values.clone());
        true
    }

    pub fn series(&self, kind: FrameKind, slot: usize) -> Option<&RollingSeries> {
        self.kinds.get(kind.index())?.get(slot)
    }

    /// Values of the last completed frame of `kind`.
    pub fn latest(&self, kind: FrameKind) -> Option<&[f64]> {
        self.last_frame.get(kind.index())?.as_deref()
    }

    pub fn clear(&mut self) {
        for series in self.kinds.iter_mut().flatten() {
            series.clear();
        }
        for last in &mut self.last_frame {
            *last = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::MarkerSpec;

    fn frame(kind: usize, values: &[f64]) -> CompletedFrame {
        CompletedFrame {
            kind: FrameKind(kind),
            values: values.to_vec(),
            start_token: format!("START{}", kind + 1),
            end_token: "END".to_string(),
        }
    }

    #[test]
    fn test_new_series_is_full_of_empty_points() {
        let series = RollingSeries::new(4);
        assert_eq!(series.points().collect::<Vec<_>>(), vec![EMPTY_POINT; 4]);
        assert_eq!(series.window(), 4);
    }

    #[test]
    fn test_push_shifts_newest_first() {
        let mut series = RollingSeries::new(3);
        series.push(1.0);
        series.push(2.0);
        assert_eq!(series.points().collect::<Vec<_>>(), vec![2.0, 1.0, EMPTY_POINT]);
        series.push(3.0);
        series.push(4.0);
        assert_eq!(series.points().collect::<Vec<_>>(), vec![4.0, 3.0, 2.0]);
        assert_eq!(series.latest(), Some(4.0));

        series.clear();
        assert_eq!(series.points().collect::<Vec<_>>(), vec![EMPTY_POINT; 3]);
    }

    #[test]
    fn test_router_routes_by_kind_and_slot() {
        let mut router = SeriesRouter::new(&FrameLayout::default(), DEFAULT_SERIES_WINDOW);
        assert!(router.record(&frame(1, &[1.0, 2.5, -3.0])));
        assert!(router.record(&frame(1, &[4.0, 5.0, 6.0])));

        let first_slot: Vec<f64> = router
            .series(FrameKind(1), 0)
            .unwrap()
            .points()
            .take(2)
            .collect();
        assert_eq!(first_slot, vec![4.0, 1.0]);
        assert_eq!(router.latest(FrameKind(1)), Some(&[4.0, 5.0, 6.0][..]));
        assert_eq!(router.latest(FrameKind(0)), None);
        assert_eq!(router.series(FrameKind(0), 0).unwrap().latest(), Some(EMPTY_POINT));
        assert!(router.series(FrameKind(1), 3).is_none());
        assert!(router.series(FrameKind(5), 0).is_none());

        router.clear();
        assert_eq!(router.latest(FrameKind(1)), None);
        assert_eq!(router.series(FrameKind(1), 0).unwrap().latest(), Some(EMPTY_POINT));
    }

    #[test]
    fn test_router_rejects_mismatched_frames() {
        let layout = FrameLayout::new(vec![MarkerSpec::new("T", 1)], "END").unwrap();
        let mut router = SeriesRouter::new(&layout, 5);
        assert!(!router.record(&frame(0, &[1.0, 2.0])));
        assert!(!router.record(&frame(3, &[1.0])));
        assert!(router.record(&frame(0, &[1.0])));
        assert_eq!(router.latest(FrameKind(0)), Some(&[1.0][..]));
    }
}
