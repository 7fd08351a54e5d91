// src/frame/layout.rs
//
// Validated frame layout: ordered start markers, values expected per marker,
// and the shared end marker.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::event::FrameKind;
use crate::error::ConfigError;

/// Default end marker
pub const DEFAULT_END_MARKER: &str = "END";
/// Values carried by each of the default markers
pub const DEFAULT_VALUE_COUNT: usize = 3;

/// One configured start marker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkerSpec {
    /// Exact token that opens a frame of this kind
    pub token: String,
    /// Human-readable name for the kind (e.g. the plot it feeds)
    #[serde(default)]
    pub label: Option<String>,
    /// Number of numeric values expected before the end marker
    #[serde(default = "default_value_count")]
    pub value_count: usize,
}

fn default_value_count() -> usize {
    DEFAULT_VALUE_COUNT
}

impl MarkerSpec {
    pub fn new(token: impl Into<String>, value_count: usize) -> Self {
        MarkerSpec {
            token: token.into(),
            label: None,
            value_count,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// START1..START3, three values each, labelled as charts.
pub fn default_markers() -> Vec<MarkerSpec> {
    (1..=3)
        .map(|n| {
            MarkerSpec::new(format!("START{}", n), DEFAULT_VALUE_COUNT)
                .with_label(format!("Chart {}", n))
        })
        .collect()
}

fn render_markers(markers: &[MarkerSpec]) -> String {
    markers
        .iter()
        .map(|m| format!("'{}'", m.token))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Frame layout checked once at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameLayout {
    markers: Vec<MarkerSpec>,
    end_marker: String,
    /// Marker list rendered once for InvalidStart diagnostics
    expected_starts: String,
}

impl FrameLayout {
    /// Rejects an empty marker list, markers expecting no values and
    /// duplicate marker tokens.
    pub fn new(markers: Vec<MarkerSpec>, end_marker: impl Into<String>) -> Result<Self, ConfigError> {
        if markers.is_empty() {
            return Err(ConfigError::NoMarkers);
        }

        let mut seen = HashSet::with_capacity(markers.len());
        for marker in &markers {
            if marker.value_count == 0 {
                return Err(ConfigError::ZeroValueCount {
                    marker: marker.token.clone(),
                });
            }
            if !seen.insert(marker.token.as_str()) {
                return Err(ConfigError::DuplicateMarker {
                    marker: marker.token.clone(),
                });
            }
        }

        let expected_starts = render_markers(&markers);

        Ok(FrameLayout {
            markers,
            end_marker: end_marker.into(),
            expected_starts,
        })
    }

    /// First marker equal to `token` (case-sensitive), in configured order.
    pub fn lookup(&self, token: &str) -> Option<FrameKind> {
        self.markers
            .iter()
            .position(|m| m.token == token)
            .map(FrameKind)
    }

    /// Like `lookup`, but also hands back the matched marker so callers
    /// never need a second, fallible lookup by kind.
    pub fn match_start(&self, token: &str) -> Option<(FrameKind, &MarkerSpec)> {
        self.markers
            .iter()
            .enumerate()
            .find(|(_, m)| m.token == token)
            .map(|(i, m)| (FrameKind(i), m))
    }

    pub fn marker(&self, kind: FrameKind) -> Option<&MarkerSpec> {
        self.markers.get(kind.index())
    }

    /// Values expected for `kind`, `None` if the kind is not from this layout.
    pub fn value_count(&self, kind: FrameKind) -> Option<usize> {
        self.markers.get(kind.index()).map(|m| m.value_count)
    }

    pub fn markers(&self) -> &[MarkerSpec] {
        &self.markers
    }

    pub fn kind_count(&self) -> usize {
        self.markers.len()
    }

    pub fn end_marker(&self) -> &str {
        &self.end_marker
    }

    pub(crate) fn expected_starts(&self) -> &str {
        &self.expected_starts
    }
}

impl Default for FrameLayout {
    fn default() -> Self {
        let markers = default_markers();
        let expected_starts = render_markers(&markers);
        FrameLayout {
            markers,
            end_marker: DEFAULT_END_MARKER.to_string(),
            expected_starts,
        }
    }
}
