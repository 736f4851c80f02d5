//! Error types for rescene-srs.

use std::io;
use thiserror::Error;

/// Result type for rescene-srs operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for rescene-srs operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed SRS or source structure.
    #[error("Invalid sample structure: {0}")]
    Format(String),

    /// Neither an EBML nor a RIFF container.
    #[error("Unsupported sample container: {0}")]
    UnsupportedContainer(String),

    /// The SRS carries no file metadata record.
    #[error("No sample metadata found in SRS")]
    NoMetadata,

    /// Track data ran out while the missing-track policy is `Fail`.
    #[error("Track {track} has no data left for a {needed}-byte frame")]
    MissingTrackData { track: u32, needed: u64 },

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
