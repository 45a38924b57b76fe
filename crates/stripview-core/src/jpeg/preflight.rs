//! Header-only validation

use super::header::{parse_header, walk_header, MetadataSegments, Parsed};
use super::{FrameInfo, HeaderError};

/// Progress of a header being collected piecewise
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderProgress {
    /// The prefix ends before the start of scan
    NeedMore,
    /// Bytes `start..end` are an APPn or COM segment the caller may discard
    /// (`end` can lie beyond the prefix)
    Metadata { start: usize, end: usize },
    /// Start of scan reached
    Frame(FrameInfo),
}

/// Validate as much of a JPEG as `prefix` holds
///
/// Returns `Ok(None)` while the prefix ends before the start of scan, and
/// the frame once it is reached. Unsupported encodings fail as early as the
/// prefix allows.
pub fn preflight_prefix(prefix: &[u8]) -> Result<Option<FrameInfo>, HeaderError> {
    match parse_header(prefix, None)? {
        Parsed::Incomplete | Parsed::Metadata { .. } => Ok(None),
        Parsed::Complete(header) => Ok(Some(header.frame)),
    }
}

/// Like [`preflight_prefix`], but stops at the first metadata segment
///
/// Lets a caller keep only the segments the decoder needs while the rest
/// of the stream is still arriving.
pub fn preflight_step(prefix: &[u8]) -> Result<HeaderProgress, HeaderError> {
    Ok(match walk_header(prefix, None, MetadataSegments::Report)? {
        Parsed::Incomplete => HeaderProgress::NeedMore,
        Parsed::Metadata { start, end } => HeaderProgress::Metadata { start, end },
        Parsed::Complete(header) => HeaderProgress::Frame(header.frame),
    })
}

/// Validate the header of a complete JPEG
pub fn preflight(data: &[u8]) -> Result<FrameInfo, HeaderError> {
    preflight_prefix(data)?.ok_or(HeaderError::Truncated)
}
