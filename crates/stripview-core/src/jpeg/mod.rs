//! Baseline JPEG support
//!
//! Two entry points share one marker walker:
//!
//! - [`preflight`], [`preflight_prefix`] and [`preflight_step`] validate
//!   the encoding from the header alone, before any buffer is committed to
//!   the payload.
//! - [`StripCodec`] decodes a complete baseline JPEG and hands out one
//!   MCU of RGB888 pixels at a time through [`DecodeContext::next_block`].
//!
//! Supported: Huffman baseline (SOF0), 8-bit samples and quantization
//! tables, one scan, greyscale or
//! YCbCr with luma sampling 1x1, 2x1 or 2x2 and 1x1 chroma, restart
//! intervals. Everything else is rejected at the header.

mod decoder;
mod header;
mod huffman;
mod idct;
mod preflight;

use thiserror::Error;

pub use decoder::{DecodeContext, DecodeCursor, PixelBlock, StripCodec};
pub use preflight::{preflight, preflight_prefix, preflight_step, HeaderProgress};

// marker codes

pub(crate) const M_SOF0: u8 = 0xC0;
pub(crate) const M_SOF2: u8 = 0xC2;
pub(crate) const M_DHT: u8 = 0xC4;
pub(crate) const M_DAC: u8 = 0xCC;
pub(crate) const M_RST0: u8 = 0xD0;
pub(crate) const M_RST7: u8 = 0xD7;
pub(crate) const M_SOI: u8 = 0xD8;
pub(crate) const M_EOI: u8 = 0xD9;
pub(crate) const M_SOS: u8 = 0xDA;
pub(crate) const M_DQT: u8 = 0xDB;
pub(crate) const M_DRI: u8 = 0xDD;
pub(crate) const M_COM: u8 = 0xFE;
pub(crate) const M_TEM: u8 = 0x01;

/// Largest MCU edge in pixels (2x2 luma sampling)
pub const MAX_MCU_EDGE: usize = 16;
/// Pixels in the largest MCU
pub const MAX_MCU_PIXELS: usize = MAX_MCU_EDGE * MAX_MCU_EDGE;

/// Header rejected by the marker walker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum HeaderError {
    #[error("not a JPEG (missing SOI marker)")]
    NotJpeg,

    #[error("JPEG header is truncated")]
    Truncated,

    #[error("malformed JPEG header: {0}")]
    Malformed(&'static str),

    #[error("progressive JPEG is not supported")]
    Progressive,

    #[error("unsupported JPEG process (SOF 0x{0:02X}), only baseline is accepted")]
    UnsupportedProcess(u8),

    #[error("unsupported sample precision: {0} bits")]
    Precision(u8),

    #[error("16-bit quantization tables are not supported")]
    WideQuantTable,

    #[error("unsupported component count: {0}")]
    ComponentCount(u8),

    #[error("unsupported sampling {h}x{v} on component {component}")]
    Sampling { component: u8, h: u8, v: u8 },

    #[error("multi-scan JPEG is not supported")]
    MultiScan,

    #[error("missing {0} table")]
    MissingTable(&'static str),

    #[error("image has a zero dimension")]
    ZeroDimension,

    #[error("end of image before start of scan")]
    NoScan,
}

/// One frame component
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Component {
    pub id: u8,
    pub h: u8,
    pub v: u8,
    pub quant_table: u8,
}

/// Frame header of an accepted JPEG
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameInfo {
    pub width: u16,
    pub height: u16,
    pub component_count: u8,
    pub components: [Component; 3],
    pub max_h: u8,
    pub max_v: u8,
}

impl FrameInfo {
    pub fn is_greyscale(&self) -> bool {
        self.component_count == 1
    }

    pub fn mcu_width(&self) -> u16 {
        u16::from(self.max_h) * 8
    }

    pub fn mcu_height(&self) -> u16 {
        u16::from(self.max_v) * 8
    }

    pub fn mcus_x(&self) -> u32 {
        u32::from(self.width).div_ceil(u32::from(self.mcu_width()))
    }

    pub fn mcus_y(&self) -> u32 {
        u32::from(self.height).div_ceil(u32::from(self.mcu_height()))
    }

    /// Blocks per MCU for component `ci` as (horizontal, vertical)
    pub(crate) fn blocks(&self, ci: usize) -> (usize, usize) {
        if self.is_greyscale() {
            // a lone component is never interleaved: one block per MCU
            (1, 1)
        } else {
            let c = &self.components[ci];
            (usize::from(c.h), usize::from(c.v))
        }
    }
}

/// Component order and table selectors of the single scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct ScanInfo {
    pub count: u8,
    /// Frame component index per scan position
    pub order: [u8; 3],
    pub dc_table: [u8; 3],
    pub ac_table: [u8; 3],
}

// zig-zag scan order

#[rustfmt::skip]
pub(crate) const ZIGZAG: [usize; 64] = [
     0,  1,  8, 16,  9,  2,  3, 10,
    17, 24, 32, 25, 18, 11,  4,  5,
    12, 19, 26, 33, 40, 48, 41, 34,
    27, 20, 13,  6,  7, 14, 21, 28,
    35, 42, 49, 56, 57, 50, 43, 36,
    29, 22, 15, 23, 30, 37, 44, 51,
    58, 59, 52, 45, 38, 31, 39, 46,
    53, 60, 61, 54, 47, 55, 62, 63,
];

#[inline]
pub(crate) fn be_u16(d: &[u8], o: usize) -> u16 {
    u16::from_be_bytes([d[o], d[o + 1]])
}
