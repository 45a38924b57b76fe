//! Bounded-memory JPEG overlay pipeline.
//!
//! Accepts JPEG images over HTTP-shaped entry points, decodes them in
//! fixed-size MCU blocks straight to a [`PanelSink`](panel::PanelSink) and
//! keeps the overlay on screen until its timeout or an explicit dismiss.
//! Peak memory is the fixed decoder work area plus one compressed strip,
//! independent of the image dimensions.

#![cfg_attr(not(feature = "std"), no_std)]
#![cfg_attr(
    not(test),
    deny(
        clippy::expect_used,
        clippy::panic,
        clippy::todo,
        clippy::unimplemented,
        clippy::unreachable,
        clippy::unwrap_used
    )
)]
#![forbid(unsafe_code)]

extern crate alloc;

pub mod assembler;
pub mod clock;
pub mod color;
pub mod config;
pub mod container;
pub mod error;
pub mod jpeg;
pub mod memory;
pub mod multipart;
pub mod overlay;
pub mod panel;
pub mod request;
pub mod response;
pub mod service;
pub mod session;
pub mod strategy;
pub mod telemetry;
pub mod test_panel;

#[cfg(feature = "std")]
pub mod endpoint;
#[cfg(test)]
mod test_fixtures;

pub use assembler::{StripAssembler, StripReport};
#[cfg(feature = "std")]
pub use clock::MonotonicClock;
pub use clock::{Clock, ManualClock};
pub use color::PixelOrder;
pub use config::{ConfigError, DisplayTimeout, ImageApiConfig, ImageApiConfigBuilder};
pub use error::{DecodeError, ErrorKind, ImageError, ValidationError};
pub use memory::{FixedHeap, HeapGauge, TrackedBuffer, WorkingSet};
pub use overlay::{OverlayPhase, OverlayState, RenderTarget};
pub use panel::{PanelCanvas, PanelSink};
pub use service::{DismissOutcome, ImageService, StripTicket, TickEvent};
pub use session::{IngestMode, SessionHandle};
pub use strategy::StrategySelector;
pub use telemetry::{BackgroundScreen, Reading, TelemetrySnapshot};
pub use test_panel::TestPanel;

/// Visible panel width in pixels
pub const PANEL_WIDTH: u16 = 240;
/// Visible panel height in pixels
pub const PANEL_HEIGHT: u16 = 280;

/// Size of one network/body read, matching the HTTP server's receive chunk
pub const IO_CHUNK_BYTES: usize = 4096;
