// src/settings.rs
//
// Decoder configuration, loadable from TOML. Every field has a default:
// START1..START3 with three values each, END, a 100-token queue and
// LF-delimited lines.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::frame::layout::{default_markers, FrameLayout, MarkerSpec, DEFAULT_END_MARKER};
use crate::series::DEFAULT_SERIES_WINDOW;
use crate::staging::DEFAULT_QUEUE_CAPACITY;
use crate::tokenizer::{parse_hex_delimiter, TokenizerMode, DEFAULT_MAX_TOKEN_LENGTH};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenizerSettings {
    #[serde(default = "default_tokenizer_mode")]
    pub mode: String, // "delimiter" | "chunk"
    /// Delimiter bytes as hex string (e.g., "0D0A")
    #[serde(default = "default_delimiter")]
    pub delimiter: String,
    /// Max token length before forced split
    #[serde(default = "default_max_length")]
    pub max_length: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoderSettings {
    #[serde(default = "default_markers")]
    pub markers: Vec<MarkerSpec>,
    #[serde(default = "default_end_marker")]
    pub end_marker: String,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub tokenizer: TokenizerSettings,
    /// Run tokens through the frame decoder (false = plain passthrough)
    #[serde(default = "default_frame_check")]
    pub frame_check: bool,
    /// Points kept per rolling series
    #[serde(default = "default_series_window")]
    pub series_window: usize,
}

fn default_tokenizer_mode() -> String {
    "delimiter".to_string()
}
fn default_delimiter() -> String {
    "0A".to_string() // LF
}
fn default_max_length() -> usize {
    DEFAULT_MAX_TOKEN_LENGTH
}
fn default_end_marker() -> String {
    DEFAULT_END_MARKER.to_string()
}
fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}
fn default_frame_check() -> bool {
    true
}
fn default_series_window() -> usize {
    DEFAULT_SERIES_WINDOW
}

impl Default for TokenizerSettings {
    fn default() -> Self {
        Self {
            mode: default_tokenizer_mode(),
            delimiter: default_delimiter(),
            max_length: default_max_length(),
        }
    }
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            markers: default_markers(),
            end_marker: default_end_marker(),
            queue_capacity: default_queue_capacity(),
            tokenizer: TokenizerSettings::default(),
            frame_check: default_frame_check(),
            series_window: default_series_window(),
        }
    }
}

impl TokenizerSettings {
    /// Build the tokenizer mode from the mode name and options
    pub fn to_mode(&self) -> Result<TokenizerMode, ConfigError> {
        let mode = match self.mode.as_str() {
            "delimiter" => TokenizerMode::Delimiter {
                delimiter: parse_hex_delimiter(&self.delimiter)?,
                max_length: self.max_length,
            },
            "chunk" => TokenizerMode::Chunk,
            other => return Err(ConfigError::UnknownTokenizerMode(other.to_string())),
        };
        mode.validate()?;
        Ok(mode)
    }
}

impl DecoderSettings {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Encode(e.to_string()))
    }

    pub fn layout(&self) -> Result<FrameLayout, ConfigError> {
        FrameLayout::new(self.markers.clone(), self.end_marker.clone())
    }

    pub fn tokenizer_mode(&self) -> Result<TokenizerMode, ConfigError> {
        self.tokenizer.to_mode()
    }

    /// Check every field; the first problem found is returned.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.layout()?;
        self.tokenizer_mode()?;
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.series_window == 0 {
            return Err(ConfigError::ZeroSeriesWindow);
        }
        Ok(())
    }
}
