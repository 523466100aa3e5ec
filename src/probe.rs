//! Candidate-frame capability contract.
//!
//! Every container construct the scanner can recognize (ID3 tags, RIFF
//! wrappers, MPEG frames) exposes the same minimal framing surface: a cheap
//! sync-word recognizer (an inherent `try_sync` constructor on each type),
//! a deeper validation pass that may pull more bytes through the window,
//! and the byte length to skip once accepted.

use crate::buffer::WindowBuffer;
use crate::error::Result;

/// Framing contract shared by all candidate frame types.
pub(crate) trait FrameProbe {
    /// Absolute byte offset of the candidate's first byte.
    fn offset(&self) -> u64;

    /// Byte length of the construct, once validated.
    fn len(&self) -> u64;

    /// Confirm the candidate is well-formed, reading further bytes through
    /// the window as needed. A `false` return sends the scanner back into
    /// its byte-slide resync loop.
    fn validate(&mut self, window: &WindowBuffer) -> Result<bool>;
}
