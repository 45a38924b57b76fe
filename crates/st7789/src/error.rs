//! Error types for the driver
//!
//! - [`BuilderError`] - Errors during configuration construction
//! - [`Error`] - Runtime errors during display operations
//! - [`InterfaceError`](crate::interface::InterfaceError) - Low-level hardware communication errors
//!
//! ## Example
//!
//! ```
//! use st7789::{Builder, BuilderError, Dimensions};
//!
//! let result = Builder::new().build();
//! assert!(matches!(result, Err(BuilderError::MissingDimensions)));
//!
//! let result = Dimensions::new(400, 280); // Wider than the controller RAM
//! assert!(result.is_err());
//! ```

use crate::interface::DisplayInterface;

/// Maximum columns addressable in ST7789 frame memory
pub const MAX_COLUMNS: u16 = 240;

/// Maximum rows addressable in ST7789 frame memory
pub const MAX_ROWS: u16 = 320;

/// Errors that can occur when interacting with the display
///
/// Generic over the interface type to preserve the specific error type.
pub enum Error<I: DisplayInterface> {
    /// Interface error (SPI/GPIO)
    Interface(I::Error),
    /// A window falls outside the visible panel area
    OutOfBounds {
        /// Left column of the requested window
        x: u16,
        /// Top row of the requested window
        y: u16,
        /// Requested width
        width: u16,
        /// Requested height
        height: u16,
    },
}

impl<I: DisplayInterface> core::fmt::Debug for Error<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Interface(e) => f.debug_tuple("Interface").field(e).finish(),
            Error::OutOfBounds {
                x,
                y,
                width,
                height,
            } => f
                .debug_struct("OutOfBounds")
                .field("x", x)
                .field("y", y)
                .field("width", width)
                .field("height", height)
                .finish(),
        }
    }
}

impl<I: DisplayInterface> core::fmt::Display for Error<I> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::Interface(e) => write!(f, "Interface error: {e:?}"),
            Error::OutOfBounds {
                x,
                y,
                width,
                height,
            } => write!(f, "Window {width}x{height} at ({x},{y}) is outside the panel"),
        }
    }
}

impl<I: DisplayInterface> core::error::Error for Error<I> {}

/// Errors that can occur when building configuration
#[derive(Debug, PartialEq, Eq)]
pub enum BuilderError {
    /// [`Builder::dimensions()`](crate::config::Builder::dimensions) was never called
    MissingDimensions,
    /// See [`Dimensions::new()`](crate::config::Dimensions::new) for constraints
    InvalidDimensions {
        /// Requested width in pixels
        width: u16,
        /// Requested height in pixels
        height: u16,
    },
    /// Panel offset pushes the visible area past controller RAM
    OffsetOutOfRange {
        /// Column offset
        x: u16,
        /// Row offset
        y: u16,
    },
}

impl core::fmt::Display for BuilderError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            BuilderError::MissingDimensions => write!(f, "Dimensions must be specified"),
            BuilderError::InvalidDimensions { width, height } => write!(
                f,
                "Invalid dimensions {width}x{height} (max {MAX_COLUMNS}x{MAX_ROWS})"
            ),
            BuilderError::OffsetOutOfRange { x, y } => {
                write!(f, "Offset ({x},{y}) exceeds controller RAM")
            }
        }
    }
}

impl core::error::Error for BuilderError {}
