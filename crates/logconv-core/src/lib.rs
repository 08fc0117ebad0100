//! # logconv-core
//!
//! A library for turning decoded event payloads into log-ready JSON.
//!
//! Decoded protocol messages often carry raw byte fields and 64-bit integers
//! split into two 32-bit words. Neither reads well in a log line. This crate
//! rewrites both:
//!
//! - Byte sequences become decoded text when they look like text, and
//!   hex-annotated blobs otherwise
//! - Split integers (`{low, high, unsigned}`) become exact decimal strings
//!
//! ## Architecture
//!
//! - [`classify`]: Text-versus-binary heuristic for byte sequences
//! - [`value`]: Input value model and split integer recognition
//! - [`convert`]: Recursive conversion into `serde_json::Value`
//! - [`reflect`]: Adapter from `prost-reflect` dynamic messages
//! - [`error`]: Error types and handling
//!
//! ## Example
//!
//! ```
//! use logconv_core::{convert_buffers, Value};
//! use serde_json::json;
//!
//! let event = Value::from_json(json!({
//!     "chaincode": {"type": "Buffer", "data": [101, 115, 99, 99]},
//!     "height": {"low": 4, "high": 32, "unsigned": false},
//! }));
//!
//! let converted = convert_buffers(&event)?;
//! assert_eq!(
//!     converted,
//!     json!({"chaincode_string": "escc", "height": "137438953476"})
//! );
//! # Ok::<(), logconv_core::Error>(())
//! ```
//!
//! ## Extensibility
//!
//! - [`TextDetector`]: Customize the text-versus-binary verdict
//! - [`ConverterConfig`]: Key suffixes, binary placement and depth limit
//!

#![deny(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unreachable_pub)]

pub mod classify;
pub mod convert;
pub mod error;
pub mod reflect;
pub mod value;

// Re-export primary types for convenience
pub use classify::{is_likely_text, PrintableRatio, TextDetector, MAX_NON_PRINTABLE_RATIO};
pub use convert::{convert_buffers, BinaryKeyPolicy, Converter, ConverterConfig};
pub use error::{Error, Result};
pub use reflect::{decode_message, from_dynamic_message, load_descriptor_pool};
pub use value::{Shape, SplitInteger, Value};

/// Crate version for programmatic access
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
