//! Common error types used by the rescene codecs.

/// Error type for the shared codecs and helpers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// An I/O operation failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A structure did not match its expected layout.
    #[error("Format error: {0}")]
    Format(String),

    /// A buffer ended before a field could be read.
    #[error("Unexpected end of data: need {needed} bytes, have {have}")]
    UnexpectedEof { needed: usize, have: usize },

    /// A VarInt started with a zero byte, so no length marker exists.
    #[error("VarInt has no length marker bit (first byte 0x{0:02x})")]
    NoMarkerBit(u8),
}

impl Error {
    /// Create a new Format error.
    pub fn format<S: Into<String>>(msg: S) -> Self {
        Self::Format(msg.into())
    }
}

/// Result type alias using the common Error type.
pub type Result<T> = std::result::Result<T, Error>;
