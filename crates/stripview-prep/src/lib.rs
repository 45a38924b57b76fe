//! Host-side strip preparation
//!
//! Scales a picture to the panel, cuts it into horizontal bands and encodes
//! each band as its own baseline JPEG. The encoder writes 1x1 sampling on
//! every component, so bands whose height is a multiple of 8 decode to the
//! same pixels as the whole image encoded in one piece.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, RgbImage};
use stripview_core::container::{build_container, ContainerError, StripContainer};
use stripview_core::{PANEL_HEIGHT, PANEL_WIDTH};
use thiserror::Error;

/// Rows per block of the encoder's MCU
pub const BLOCK_ROWS: u16 = 8;
pub const DEFAULT_STRIP_HEIGHT: u16 = 40;
pub const DEFAULT_QUALITY: u8 = 90;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Container(#[from] ContainerError),

    #[error("strip height {0} must be a non-zero multiple of 8")]
    StripHeight(u16),

    #[error("target size {width}x{height} is empty")]
    EmptyTarget { width: u16, height: u16 },
}

/// Geometry and quality of a packed image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackOptions {
    pub width: u16,
    pub height: u16,
    pub strip_height: u16,
    pub quality: u8,
}

impl Default for PackOptions {
    fn default() -> Self {
        Self {
            width: PANEL_WIDTH,
            height: PANEL_HEIGHT,
            strip_height: DEFAULT_STRIP_HEIGHT,
            quality: DEFAULT_QUALITY,
        }
    }
}

impl PackOptions {
    fn validate(&self) -> Result<(), PrepError> {
        if self.width == 0 || self.height == 0 {
            return Err(PrepError::EmptyTarget {
                width: self.width,
                height: self.height,
            });
        }
        if self.strip_height == 0 || self.strip_height % BLOCK_ROWS != 0 {
            return Err(PrepError::StripHeight(self.strip_height));
        }
        Ok(())
    }
}

/// Scale and centre-crop `img` to exactly `width` x `height`
pub fn fit_to_panel(img: &DynamicImage, width: u16, height: u16) -> RgbImage {
    img.resize_to_fill(u32::from(width), u32::from(height), FilterType::Lanczos3)
        .to_rgb8()
}

/// Encode as one baseline JPEG
pub fn encode_jpeg(img: &RgbImage, quality: u8) -> Result<Vec<u8>, PrepError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode(
        img.as_raw(),
        img.width(),
        img.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

/// Encode `img` as bands of `strip_height` rows, top to bottom
///
/// The last band holds whatever rows remain.
pub fn encode_strips(
    img: &RgbImage,
    strip_height: u16,
    quality: u8,
) -> Result<Vec<Vec<u8>>, PrepError> {
    if strip_height == 0 {
        return Err(PrepError::StripHeight(strip_height));
    }
    let step = u32::from(strip_height);
    let mut strips = Vec::new();
    let mut top = 0;
    while top < img.height() {
        let rows = step.min(img.height() - top);
        let band = imageops::crop_imm(img, 0, top, img.width(), rows).to_image();
        strips.push(encode_jpeg(&band, quality)?);
        top += rows;
    }
    Ok(strips)
}

/// Fit, cut and encode `img`, returning the container bytes
pub fn pack(img: &DynamicImage, options: &PackOptions) -> Result<Vec<u8>, PrepError> {
    options.validate()?;
    let fitted = fit_to_panel(img, options.width, options.height);
    let strips = encode_strips(&fitted, options.strip_height, options.quality)?;
    Ok(build_container(
        options.width,
        options.height,
        options.strip_height,
        &strips,
    )?)
}

/// File name used for strip `index` when unpacking
pub fn strip_file_name(index: usize) -> String {
    format!("strip_{index:03}.jpg")
}

/// One line per strip: index, byte size and first row
pub fn describe(container: &StripContainer<'_>) -> Vec<String> {
    let header = container.header();
    container
        .strips()
        .enumerate()
        .map(|(i, strip)| {
            format!(
                "{:>4}  {:>7} bytes  row {}",
                i,
                strip.len(),
                i * usize::from(header.strip_height)
            )
        })
        .collect()
}
