//! Driver for the Sitronix ST7789 TFT LCD controller
//!
//! Targets the 1.69" 240x280 ST7789V2 module (portrait, 20 row RAM offset)
//! over 4-wire SPI, using embedded-hal v1.0 traits.
//!
//! ## Example
//!
//! ```rust,ignore
//! use st7789::{Builder, Dimensions, Display, Interface, Offset};
//!
//! let interface = Interface::new(spi_device, dc, rst);
//! let config = Builder::new()
//!     .dimensions(Dimensions::new(240, 280)?)
//!     .offset(Offset { x: 0, y: 20 })
//!     .build()?;
//! let mut display = Display::new(interface, config);
//! display.reset(&mut delay)?;
//! display.clear(0x0000)?;
//! display.set_window(0, 0, 239, 15)?;
//! display.write_pixels(&row_block)?;
//! ```

#![no_std]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod command;
pub mod config;
pub mod display;
pub mod error;
#[cfg(feature = "graphics")]
#[cfg_attr(docsrs, doc(cfg(feature = "graphics")))]
pub mod graphics;
pub mod interface;

pub use config::{Builder, ColorOrder, Config, Dimensions, Offset, Orientation};
pub use display::Display;
pub use error::{BuilderError, Error, MAX_COLUMNS, MAX_ROWS};
#[cfg(feature = "graphics")]
pub use graphics::raw_color;
pub use interface::{DisplayInterface, Interface, InterfaceError};
