//! Error types for rescene-srr.

use std::io;
use thiserror::Error;

/// Result type for rescene-srr operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for rescene-srr operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Invalid SRR structure (bad magic, short header, truncated block).
    #[error("Invalid SRR: {0}")]
    Format(String),

    /// A source file named by a packed-file block could not be found.
    #[error("Source file not found: {0}")]
    SourceNotFound(String),

    /// A source file does not have the unpacked size recorded in the archive.
    #[error("Source file {name} has size {actual}, expected {expected}")]
    SourceSizeMismatch {
        name: String,
        expected: u64,
        actual: u64,
    },

    /// A source file ended before the packed span could be copied.
    #[error("Unexpected end of {name}: copied {copied} of {needed} bytes")]
    UnexpectedEof {
        name: String,
        needed: u64,
        copied: u64,
    },

    /// The archive member is compressed, so source bytes cannot rebuild it.
    #[error("{name} uses compression method 0x{method:02x}; only stored files can be rebuilt")]
    CompressedNotSupported { name: String, method: u8 },

    /// Error from a shared codec.
    #[error(transparent)]
    Common(#[from] rescene_common::Error),
}

impl Error {
    /// Create a format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }
}
