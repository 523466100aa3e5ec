//! Error types for the MPEG audio stream reader.

use thiserror::Error;

/// Errors produced while reading an MPEG audio bitstream.
#[derive(Error, Debug)]
pub enum MpaError {
    /// The stream does not contain at least two consecutive MPEG audio frames.
    #[error("not a valid MPEG audio stream")]
    InvalidStream,

    /// A random-access read targeted a region of a forward-only source that
    /// has already been discarded.
    #[error("backward seek to offset {offset} on a forward-only stream (window starts at {base})")]
    BackwardSeek {
        /// Requested absolute byte offset.
        offset: u64,
        /// First byte offset still resident in the window.
        base: u64,
    },

    /// A free-format frame was finalized on a source that cannot seek.
    /// Its bytes cannot be served once the read window moves past them.
    #[error("free-format frame at offset {offset} requires a seekable stream")]
    FreeFormatRequiresSeek {
        /// Absolute byte offset of the free-format frame's sync word.
        offset: u64,
    },

    /// `seek_to` was called on a forward-only source.
    #[error("cannot seek on a forward-only stream")]
    CannotSeek,

    /// The underlying source failed with a real I/O error (not EOF).
    #[error("source I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for MPEG audio stream operations.
pub type Result<T> = std::result::Result<T, MpaError>;
