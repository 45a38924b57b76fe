//! Display configuration types and builder

pub use crate::error::{BuilderError, MAX_COLUMNS, MAX_ROWS};

use crate::command::{MADCTL_BGR, MADCTL_MV, MADCTL_MX, MADCTL_MY};

/// Visible panel dimensions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dimensions {
    /// Width in pixels (columns)
    pub width: u16,
    /// Height in pixels (rows)
    pub height: u16,
}

impl Dimensions {
    /// Create new dimensions with validation
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::InvalidDimensions` if either side is zero or
    /// exceeds the controller RAM ([`MAX_COLUMNS`] x [`MAX_ROWS`]).
    pub fn new(width: u16, height: u16) -> Result<Self, BuilderError> {
        if width == 0 || width > MAX_COLUMNS || height == 0 || height > MAX_ROWS {
            return Err(BuilderError::InvalidDimensions { width, height });
        }
        Ok(Self { width, height })
    }

    /// Number of pixels in the visible area
    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

/// Offset of the visible glass inside controller RAM
///
/// The 1.69" 240x280 module maps its first visible row to RAM row 20.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Offset {
    /// Column offset
    pub x: u16,
    /// Row offset
    pub y: u16,
}

/// Channel order of the 565 words sent to the controller
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorOrder {
    /// Red in the high bits of each 565 word
    Rgb,
    /// Blue in the high bits of each 565 word (factory default of this module)
    #[default]
    Bgr,
}

/// Scan orientation relative to native portrait
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Orientation {
    /// Native portrait
    #[default]
    Portrait,
    /// Portrait, rotated 180 degrees
    PortraitFlipped,
    /// Landscape (row/column exchange)
    Landscape,
    /// Landscape, rotated 180 degrees
    LandscapeFlipped,
}

impl Orientation {
    fn madctl_bits(self) -> u8 {
        match self {
            Orientation::Portrait => 0,
            Orientation::PortraitFlipped => MADCTL_MX | MADCTL_MY,
            Orientation::Landscape => MADCTL_MV | MADCTL_MX,
            Orientation::LandscapeFlipped => MADCTL_MV | MADCTL_MY,
        }
    }
}

/// Display configuration
///
/// Use [`Builder`] to create a Config.
#[derive(Clone, Debug)]
pub struct Config {
    /// Visible dimensions
    pub dimensions: Dimensions,
    /// Glass offset inside controller RAM
    pub offset: Offset,
    /// Sub-pixel order
    pub color_order: ColorOrder,
    /// Scan orientation
    pub orientation: Orientation,
    /// Enable display inversion (IPS glass needs it on)
    pub invert_colors: bool,
}

impl Config {
    /// MADCTL register value for this configuration
    ///
    /// The glass is wired BGR with MADCTL bit 3 clear. Pixel producers emit
    /// words in [`Config::color_order`]; the controller never swaps channels
    /// unless `swap_in_controller` asks it to turn an RGB stream into BGR.
    pub fn madctl(&self, swap_in_controller: bool) -> u8 {
        let mut value = self.orientation.madctl_bits();
        if swap_in_controller && self.color_order == ColorOrder::Rgb {
            value |= MADCTL_BGR;
        }
        value
    }
}

/// Builder for constructing display configuration
///
/// # Example
///
/// ```
/// use st7789::{Builder, Dimensions, Offset};
///
/// let config = Builder::new()
///     .dimensions(Dimensions::new(240, 280).unwrap())
///     .offset(Offset { x: 0, y: 20 })
///     .build()
///     .expect("valid configuration");
/// assert_eq!(config.offset.y, 20);
/// ```
pub struct Builder {
    dimensions: Option<Dimensions>,
    offset: Offset,
    color_order: ColorOrder,
    orientation: Orientation,
    invert_colors: bool,
}

impl Default for Builder {
    fn default() -> Self {
        Builder {
            dimensions: None,
            offset: Offset::default(),
            color_order: ColorOrder::Bgr,
            orientation: Orientation::Portrait,
            // IPS glass shows a negative image without INVON
            invert_colors: true,
        }
    }
}

impl Builder {
    /// Create a new Builder with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set visible dimensions (required)
    pub fn dimensions(mut self, dims: Dimensions) -> Self {
        self.dimensions = Some(dims);
        self
    }

    /// Set glass offset
    pub fn offset(mut self, offset: Offset) -> Self {
        self.offset = offset;
        self
    }

    /// Set sub-pixel order
    pub fn color_order(mut self, order: ColorOrder) -> Self {
        self.color_order = order;
        self
    }

    /// Set scan orientation
    pub fn orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Enable or disable display inversion
    pub fn invert_colors(mut self, invert: bool) -> Self {
        self.invert_colors = invert;
        self
    }

    /// Build the configuration
    ///
    /// # Errors
    ///
    /// Returns `BuilderError::MissingDimensions` if dimensions were not set and
    /// `BuilderError::OffsetOutOfRange` if offset + dimensions leave controller RAM.
    pub fn build(self) -> Result<Config, BuilderError> {
        let dimensions = self.dimensions.ok_or(BuilderError::MissingDimensions)?;
        let (max_x, max_y) = match self.orientation {
            Orientation::Portrait | Orientation::PortraitFlipped => (MAX_COLUMNS, MAX_ROWS),
            Orientation::Landscape | Orientation::LandscapeFlipped => (MAX_ROWS, MAX_COLUMNS),
        };
        if dimensions.width as u32 + self.offset.x as u32 > max_x as u32
            || dimensions.height as u32 + self.offset.y as u32 > max_y as u32
        {
            return Err(BuilderError::OffsetOutOfRange {
                x: self.offset.x,
                y: self.offset.y,
            });
        }
        Ok(Config {
            dimensions,
            offset: self.offset,
            color_order: self.color_order,
            orientation: self.orientation,
            invert_colors: self.invert_colors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_reject_oversized_panel() {
        assert!(Dimensions::new(240, 280).is_ok());
        assert_eq!(
            Dimensions::new(241, 280),
            Err(BuilderError::InvalidDimensions {
                width: 241,
                height: 280
            })
        );
        assert!(Dimensions::new(240, 0).is_err());
    }

    #[test]
    fn offset_must_stay_inside_ram() {
        let dims = Dimensions::new(240, 280).unwrap();
        assert!(Builder::new()
            .dimensions(dims)
            .offset(Offset { x: 0, y: 40 })
            .build()
            .is_ok());
        assert_eq!(
            Builder::new()
                .dimensions(dims)
                .offset(Offset { x: 0, y: 41 })
                .build()
                .err(),
            Some(BuilderError::OffsetOutOfRange { x: 0, y: 41 })
        );
    }

    #[test]
    fn madctl_reflects_orientation_and_order() {
        let config = Builder::new()
            .dimensions(Dimensions::new(240, 280).unwrap())
            .build()
            .unwrap();
        assert_eq!(config.madctl(false), 0x00);
        assert_eq!(config.madctl(true), 0x00);

        let flipped = Builder::new()
            .dimensions(Dimensions::new(240, 280).unwrap())
            .orientation(Orientation::PortraitFlipped)
            .color_order(ColorOrder::Rgb)
            .build()
            .unwrap();
        assert_eq!(flipped.madctl(false), MADCTL_MX | MADCTL_MY);
        assert_eq!(flipped.madctl(true), MADCTL_MX | MADCTL_MY | MADCTL_BGR);
    }
}
