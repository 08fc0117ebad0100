//! Error types for the logconv-core library.
//!
//! The transformer itself only fails when input nesting exceeds the configured
//! depth limit. The remaining variants belong to the input adapters.

use thiserror::Error;

/// Result type alias for logconv operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for all logconv operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// Input nesting is deeper than the converter allows
    #[error("value nesting depth {depth} exceeds the limit of {max}")]
    DepthLimitExceeded {
        /// Depth at which the walk stopped
        depth: usize,
        /// Configured maximum depth
        max: usize,
    },

    /// Text classifier threshold outside `(0, 1]`
    #[error("invalid non-printable ratio {ratio}: must be greater than 0 and at most 1")]
    InvalidThreshold {
        /// The rejected ratio
        ratio: f64,
    },

    /// Failed to decode a protobuf payload against its descriptor
    #[error("failed to decode protobuf message: {0}")]
    MessageDecode(#[from] prost::DecodeError),

    /// Failed to build a descriptor pool with prost-reflect
    #[error("failed to build descriptor pool: {0}")]
    DescriptorBuild(String),

    /// Message type missing from the descriptor pool
    #[error("message type '{name}' not found in descriptor pool")]
    MessageNotFound {
        /// Fully qualified message name that was requested
        name: String,
    },
}

impl Error {
    /// Creates a new depth limit error
    pub fn depth_limit(depth: usize, max: usize) -> Self {
        Self::DepthLimitExceeded { depth, max }
    }

    /// Creates a new descriptor build error
    pub fn descriptor_build(msg: impl Into<String>) -> Self {
        Self::DescriptorBuild(msg.into())
    }

    /// Creates a new message lookup error
    pub fn message_not_found(name: impl Into<String>) -> Self {
        Self::MessageNotFound { name: name.into() }
    }
}
