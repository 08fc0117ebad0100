//! Content sniffing for raw byte sequences.
//!
//! Decides whether a buffer should be shown in a log as decoded text or as an
//! annotated hex blob. The verdict is a heuristic: a buffer is "likely text"
//! when the share of non-printable bytes stays below a fixed ratio.
//!
//! ## Printable bytes
//!
//! - Visible ASCII, `0x20..=0x7E`
//! - Tab (`0x09`), line feed (`0x0A`) and carriage return (`0x0D`)
//!
//! Everything else, including all bytes with the high bit set, counts against
//! the buffer. Protobuf-framed payloads are dense with tags and length
//! prefixes in `0x00..=0x1F` and land well above the ratio, while short
//! identifiers such as `escc` or `deploy` score zero.
//!
//! ## Extensibility
//!
//! The [`TextDetector`] trait lets callers plug in a different verdict:
//!
//! ```
//! use logconv_core::classify::TextDetector;
//!
//! struct Utf8Only;
//!
//! impl TextDetector for Utf8Only {
//!     fn is_likely_text(&self, data: &[u8]) -> bool {
//!         std::str::from_utf8(data).is_ok()
//!     }
//! }
//!
//! assert!(Utf8Only.is_likely_text(b"hello"));
//! ```

use crate::error::{Error, Result};

/// Largest share of non-printable bytes a buffer may have and still be
/// treated as text. The comparison is strict.
pub const MAX_NON_PRINTABLE_RATIO: f64 = 0.1;

/// Trait for deciding whether a byte sequence reads as text
pub trait TextDetector: Send + Sync {
    /// Returns true if `data` should be rendered as a decoded string
    fn is_likely_text(&self, data: &[u8]) -> bool;
}

/// Returns true for bytes that appear in ordinary text
#[inline]
pub fn is_printable(byte: u8) -> bool {
    matches!(byte, 0x20..=0x7E | b'\t' | b'\n' | b'\r')
}

/// Counts the bytes in `data` that are not [printable](is_printable)
pub fn count_non_printable(data: &[u8]) -> usize {
    data.iter().filter(|&&b| !is_printable(b)).count()
}

/// Printable-ratio detector
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrintableRatio {
    max_non_printable_ratio: f64,
}

impl Default for PrintableRatio {
    fn default() -> Self {
        Self {
            max_non_printable_ratio: MAX_NON_PRINTABLE_RATIO,
        }
    }
}

impl PrintableRatio {
    /// Creates a detector using [`MAX_NON_PRINTABLE_RATIO`]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a detector with a custom threshold in `(0, 1]`
    pub fn with_ratio(ratio: f64) -> Result<Self> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(Error::InvalidThreshold { ratio });
        }
        Ok(Self {
            max_non_printable_ratio: ratio,
        })
    }

    /// Returns the configured threshold
    pub fn ratio(&self) -> f64 {
        self.max_non_printable_ratio
    }
}

impl TextDetector for PrintableRatio {
    fn is_likely_text(&self, data: &[u8]) -> bool {
        // No evidence against an empty buffer
        if data.is_empty() {
            return true;
        }

        let non_printable = count_non_printable(data);
        (non_printable as f64 / data.len() as f64) < self.max_non_printable_ratio
    }
}

/// Classifies `data` with the default [`PrintableRatio`] detector
pub fn is_likely_text(data: &[u8]) -> bool {
    PrintableRatio::default().is_likely_text(data)
}
