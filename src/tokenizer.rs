// src/tokenizer.rs
//
// Turns raw serial byte chunks into text tokens for the frame decoder.
// Bytes are split on a delimiter (default LF) or taken one chunk per token,
// decoded as UTF-8 with replacement characters, and trimmed.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Longest line accepted before a forced split
pub const DEFAULT_MAX_TOKEN_LENGTH: usize = 1024;

// =============================================================================
// Types
// =============================================================================

/// How the byte stream is cut into tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TokenizerMode {
    /// Cut whenever the buffered bytes end with `delimiter`
    Delimiter {
        /// Delimiter byte sequence (e.g., [0x0D, 0x0A] for CRLF)
        delimiter: Vec<u8>,
        /// Max token length in bytes before forced split
        max_length: usize,
    },
    /// Every received chunk is one token
    Chunk,
}

impl Default for TokenizerMode {
    fn default() -> Self {
        TokenizerMode::Delimiter {
            delimiter: vec![b'\n'],
            max_length: DEFAULT_MAX_TOKEN_LENGTH,
        }
    }
}

impl TokenizerMode {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            TokenizerMode::Delimiter { delimiter, .. } if delimiter.is_empty() => {
                Err(ConfigError::EmptyDelimiter)
            }
            TokenizerMode::Delimiter { max_length: 0, .. } => Err(ConfigError::ZeroMaxLength),
            _ => Ok(()),
        }
    }
}

/// Parse a hex delimiter string (e.g., "0D0A" -> [0x0D, 0x0A])
pub fn parse_hex_delimiter(value: &str) -> Result<Vec<u8>, ConfigError> {
    let bytes = hex::decode(value.trim()).map_err(|e| ConfigError::InvalidDelimiter {
        value: value.to_string(),
        reason: e.to_string(),
    })?;
    if bytes.is_empty() {
        return Err(ConfigError::EmptyDelimiter);
    }
    Ok(bytes)
}

/// Lossy UTF-8 decode plus whitespace / line-terminator trim.
pub fn to_token(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

// =============================================================================
// Internal Splitter Trait
// =============================================================================

trait Splitter {
    fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>>;
    fn flush(&mut self) -> Option<Vec<u8>>;
    fn reset(&mut self);
}

// =============================================================================
// Delimiter-Based Splitter
// =============================================================================

struct DelimiterSplitter {
    buffer: Vec<u8>,
    delimiter: Vec<u8>,
    max_length: usize,
}

impl DelimiterSplitter {
    fn new(delimiter: Vec<u8>, max_length: usize) -> Self {
        DelimiterSplitter {
            buffer: Vec::new(),
            delimiter,
            max_length,
        }
    }
}

impl Splitter for DelimiterSplitter {
    fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        let mut pieces = Vec::new();

        for &byte in data {
            self.buffer.push(byte);

            if self.buffer.ends_with(&self.delimiter) {
                let start = self.buffer.len() - self.delimiter.len();
                let piece: Vec<u8> = self.buffer.drain(..start).collect();
                self.buffer.clear(); // Drop delimiter
                if !piece.is_empty() {
                    pieces.push(piece);
                }
                continue;
            }

            if self.buffer.len() >= self.max_length {
                pieces.push(self.buffer.drain(..).collect());
            }
        }

        pieces
    }

    fn flush(&mut self) -> Option<Vec<u8>> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.buffer.drain(..).collect())
        }
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

// =============================================================================
// Chunk Splitter (one token per read)
// =============================================================================

struct ChunkSplitter;

impl Splitter for ChunkSplitter {
    fn feed(&mut self, data: &[u8]) -> Vec<Vec<u8>> {
        if data.is_empty() {
            Vec::new()
        } else {
            vec![data.to_vec()]
        }
    }

    fn flush(&mut self) -> Option<Vec<u8>> {
        None
    }

    fn reset(&mut self) {}
}

// =============================================================================
// Public Tokenizer
// =============================================================================

/// Stateful tokenizer for streaming serial data.
pub struct Tokenizer {
    splitter: Box<dyn Splitter + Send>,
}

impl Tokenizer {
    pub fn new(mode: TokenizerMode) -> Result<Self, ConfigError> {
        mode.validate()?;
        let splitter: Box<dyn Splitter + Send> = match mode {
            TokenizerMode::Delimiter {
                delimiter,
                max_length,
            } => Box::new(DelimiterSplitter::new(delimiter, max_length)),
            TokenizerMode::Chunk => Box::new(ChunkSplitter),
        };
        Ok(Tokenizer { splitter })
    }

    /// Feed raw bytes; returns every token completed by this chunk.
    pub fn feed(&mut self, data: &[u8]) -> Vec<String> {
        self.splitter
            .feed(data)
            .iter()
            .map(|piece| to_token(piece))
            .collect()
    }

    /// Emit the buffered partial token. Call when the stream ends.
    pub fn flush(&mut self) -> Option<String> {
        self.splitter.flush().map(|piece| to_token(&piece))
    }

    /// Discard the buffered partial token.
    pub fn reset(&mut self) {
        self.splitter.reset();
    }
}

impl Default for Tokenizer {
    fn default() -> Self {
        Tokenizer {
            splitter: Box::new(DelimiterSplitter::new(
                vec![b'\n'],
                DEFAULT_MAX_TOKEN_LENGTH,
            )),
        }
    }
}
