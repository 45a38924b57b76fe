//! Error taxonomy for the image pipeline
//!
//! Every failure that can reach an HTTP client is an [`ImageError`]. Its
//! [`ErrorKind`] fixes the status code, so handlers never pick codes on
//! their own.

use alloc::string::String;

use thiserror::Error;

use crate::jpeg::HeaderError;
use crate::multipart::MultipartError;

/// Request payload rejected before any decode work
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("payload is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    #[error("empty payload")]
    Empty,

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("JPEG header does not end within the first {0} bytes")]
    HeaderTooLarge(usize),

    #[error("image is {width}x{height}, panel needs {expected_width}x{expected_height}")]
    FrameSize {
        width: u16,
        height: u16,
        expected_width: u16,
        expected_height: u16,
    },

    #[error("strip is {width}x{height}, expected width {expected_width} and at most {remaining_rows} rows")]
    StripShape {
        width: u16,
        height: u16,
        expected_width: u16,
        remaining_rows: u16,
    },

    #[error("image size {width}x{height} does not fit the {panel_width}x{panel_height} panel")]
    ImageDimensions {
        width: u16,
        height: u16,
        panel_width: u16,
        panel_height: u16,
    },

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("invalid {0} parameter")]
    BadParameter(&'static str),

    #[error("invalid strip index")]
    BadStripIndex,
}

/// Entropy-decode failure inside a scan
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error("invalid Huffman code")]
    InvalidCode,

    #[error("coefficient index past end of block")]
    CoefficientOverflow,

    #[error("compressed data ends before the last block")]
    Truncated,
}

/// Coarse error class, fixes the HTTP status code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Sequencing,
    NoSession,
    Memory,
    Decode,
    Conflict,
    Panel,
}

impl ErrorKind {
    /// HTTP status code reported for this class
    pub fn status_code(self) -> u16 {
        match self {
            ErrorKind::Validation | ErrorKind::Decode => 400,
            ErrorKind::Sequencing | ErrorKind::NoSession | ErrorKind::Conflict => 409,
            ErrorKind::Memory => 507,
            ErrorKind::Panel => 500,
        }
    }
}

/// Any failure of the image API
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ImageError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("strip {got} out of order, expected {expected}")]
    Sequencing { expected: u32, got: u32 },

    #[error("no strip upload in progress, start with strip 0")]
    NoSession,

    #[error("insufficient memory: need {needed} bytes, {free} free")]
    Memory { needed: usize, free: usize },

    #[error("image needs {needed} bytes but only {free} free, upload it as strips")]
    StreamingRequired { needed: usize, free: usize },

    #[error("decode failed: {0}")]
    Decode(#[from] DecodeError),

    #[error("another upload is in progress")]
    Conflict,

    #[error("upload session was closed")]
    StaleSession,

    #[error("panel write failed: {0}")]
    Panel(String),
}

impl ImageError {
    /// Error class of this failure
    pub fn kind(&self) -> ErrorKind {
        match self {
            ImageError::Validation(_) => ErrorKind::Validation,
            ImageError::Sequencing { .. } => ErrorKind::Sequencing,
            ImageError::NoSession => ErrorKind::NoSession,
            ImageError::Memory { .. } | ImageError::StreamingRequired { .. } => ErrorKind::Memory,
            ImageError::Decode(_) => ErrorKind::Decode,
            ImageError::Conflict | ImageError::StaleSession => ErrorKind::Conflict,
            ImageError::Panel(_) => ErrorKind::Panel,
        }
    }

    /// HTTP status code for this failure
    pub fn status_code(&self) -> u16 {
        self.kind().status_code()
    }
}

impl From<HeaderError> for ImageError {
    fn from(err: HeaderError) -> Self {
        ImageError::Validation(ValidationError::Header(err))
    }
}

impl From<MultipartError> for ImageError {
    fn from(err: MultipartError) -> Self {
        ImageError::Validation(ValidationError::Multipart(err))
    }
}
