//! Image API limits and display timeout policy

use core::fmt;

use thiserror::Error;

use crate::color::PixelOrder;
use crate::error::ValidationError;
use crate::{PANEL_HEIGHT, PANEL_WIDTH};

/// How long an overlay stays up before the background returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayTimeout {
    /// Stay until dismissed or replaced
    Never,
    /// Dismiss once this many seconds have elapsed since upload completion
    Seconds(u32),
}

impl DisplayTimeout {
    /// Timeout in milliseconds, `None` for [`DisplayTimeout::Never`]
    pub fn as_millis(self) -> Option<u64> {
        match self {
            DisplayTimeout::Never => None,
            DisplayTimeout::Seconds(s) => Some(u64::from(s) * 1000),
        }
    }

    /// Seconds value as reported to clients (0 means never)
    pub fn as_secs(self) -> u32 {
        match self {
            DisplayTimeout::Never => 0,
            DisplayTimeout::Seconds(s) => s,
        }
    }
}

impl fmt::Display for DisplayTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DisplayTimeout::Never => f.write_str("no timeout"),
            DisplayTimeout::Seconds(s) => write!(f, "{s}s timeout"),
        }
    }
}

/// Inconsistent limit set
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("panel dimensions must be non-zero")]
    EmptyPanel,
    #[error("strip size {strip} exceeds image size limit {image}")]
    StripLargerThanImage { strip: usize, image: usize },
    #[error("{0} must be non-zero")]
    Zero(&'static str),
    #[error("default timeout {default}s exceeds maximum {max}s")]
    DefaultAboveMax { default: u32, max: u32 },
}

/// Limits and defaults of the image API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageApiConfig {
    pub panel_width: u16,
    pub panel_height: u16,
    /// Largest accepted single-shot JPEG
    pub max_image_size: usize,
    /// Free heap that must remain beyond the upload buffer
    pub decode_headroom: usize,
    /// Largest accepted compressed strip
    pub max_strip_size: usize,
    /// Used when a request carries no timeout
    pub default_timeout_secs: u32,
    /// Requested timeouts are clamped to this
    pub max_timeout_secs: u32,
    /// Open sessions with no traffic for this long are aborted
    pub session_stall_ms: u64,
    /// Slack allowed on a multipart Content-Length for boundaries and part headers
    pub multipart_overhead: usize,
    /// Image rows a buffered single-shot decode paints per main-loop tick
    pub decode_rows_per_tick: u16,
    pub pixel_order: PixelOrder,
}

impl Default for ImageApiConfig {
    fn default() -> Self {
        Self {
            panel_width: PANEL_WIDTH,
            panel_height: PANEL_HEIGHT,
            max_image_size: 100 * 1024,
            decode_headroom: 50 * 1024,
            max_strip_size: 32 * 1024,
            default_timeout_secs: 10,
            max_timeout_secs: 86_400,
            session_stall_ms: 30_000,
            multipart_overhead: 1024,
            decode_rows_per_tick: 40,
            pixel_order: PixelOrder::Bgr565,
        }
    }
}

impl ImageApiConfig {
    pub fn builder() -> ImageApiConfigBuilder {
        ImageApiConfigBuilder {
            config: Self::default(),
        }
    }

    /// Largest Content-Length accepted on the single-shot endpoint
    pub fn single_shot_ceiling(&self) -> usize {
        self.max_image_size + self.multipart_overhead
    }

    /// Resolve the `timeout` query value of a request
    ///
    /// Missing or empty selects the default, `0` disables the timeout and
    /// anything else is clamped to `1..=max_timeout_secs`.
    pub fn resolve_timeout(&self, raw: Option<&str>) -> Result<DisplayTimeout, ValidationError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(self.default_timeout()),
            Some(raw) => raw,
        };
        let secs: u64 = raw
            .parse()
            .map_err(|_| ValidationError::BadParameter("timeout"))?;
        if secs == 0 {
            return Ok(DisplayTimeout::Never);
        }
        let clamped = secs.min(u64::from(self.max_timeout_secs));
        Ok(DisplayTimeout::Seconds(clamped as u32))
    }

    pub fn default_timeout(&self) -> DisplayTimeout {
        match self.default_timeout_secs {
            0 => DisplayTimeout::Never,
            s => DisplayTimeout::Seconds(s),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.panel_width == 0 || self.panel_height == 0 {
            return Err(ConfigError::EmptyPanel);
        }
        if self.max_image_size == 0 {
            return Err(ConfigError::Zero("max_image_size"));
        }
        if self.max_strip_size == 0 {
            return Err(ConfigError::Zero("max_strip_size"));
        }
        if self.max_timeout_secs == 0 {
            return Err(ConfigError::Zero("max_timeout_secs"));
        }
        if self.decode_rows_per_tick == 0 {
            return Err(ConfigError::Zero("decode_rows_per_tick"));
        }
        if self.max_strip_size > self.max_image_size {
            return Err(ConfigError::StripLargerThanImage {
                strip: self.max_strip_size,
                image: self.max_image_size,
            });
        }
        if self.default_timeout_secs > self.max_timeout_secs {
            return Err(ConfigError::DefaultAboveMax {
                default: self.default_timeout_secs,
                max: self.max_timeout_secs,
            });
        }
        Ok(())
    }
}

/// Builder for [`ImageApiConfig`], starting from the defaults
#[derive(Debug, Clone)]
pub struct ImageApiConfigBuilder {
    config: ImageApiConfig,
}

impl ImageApiConfigBuilder {
    pub fn panel(mut self, width: u16, height: u16) -> Self {
        self.config.panel_width = width;
        self.config.panel_height = height;
        self
    }

    pub fn max_image_size(mut self, bytes: usize) -> Self {
        self.config.max_image_size = bytes;
        self
    }

    pub fn decode_headroom(mut self, bytes: usize) -> Self {
        self.config.decode_headroom = bytes;
        self
    }

    pub fn max_strip_size(mut self, bytes: usize) -> Self {
        self.config.max_strip_size = bytes;
        self
    }

    pub fn default_timeout_secs(mut self, secs: u32) -> Self {
        self.config.default_timeout_secs = secs;
        self
    }

    pub fn max_timeout_secs(mut self, secs: u32) -> Self {
        self.config.max_timeout_secs = secs;
        self
    }

    pub fn session_stall_ms(mut self, ms: u64) -> Self {
        self.config.session_stall_ms = ms;
        self
    }

    pub fn decode_rows_per_tick(mut self, rows: u16) -> Self {
        self.config.decode_rows_per_tick = rows;
        self
    }

    pub fn pixel_order(mut self, order: PixelOrder) -> Self {
        self.config.pixel_order = order;
        self
    }

    pub fn build(self) -> Result<ImageApiConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_panel_and_limits() {
        let config = ImageApiConfig::default();
        assert_eq!((config.panel_width, config.panel_height), (240, 280));
        assert_eq!(config.max_image_size, 102_400);
        assert_eq!(config.decode_headroom, 51_200);
        assert_eq!(config.pixel_order, PixelOrder::Bgr565);
        assert!(ImageApiConfig::builder().build().is_ok());
    }

    #[test]
    fn timeout_resolution_clamps_and_defaults() {
        let config = ImageApiConfig::default();
        assert_eq!(config.resolve_timeout(None), Ok(DisplayTimeout::Seconds(10)));
        assert_eq!(config.resolve_timeout(Some("")), Ok(DisplayTimeout::Seconds(10)));
        assert_eq!(config.resolve_timeout(Some("0")), Ok(DisplayTimeout::Never));
        assert_eq!(config.resolve_timeout(Some("5")), Ok(DisplayTimeout::Seconds(5)));
        assert_eq!(
            config.resolve_timeout(Some("999999")),
            Ok(DisplayTimeout::Seconds(86_400))
        );
        assert_eq!(
            config.resolve_timeout(Some("soon")),
            Err(ValidationError::BadParameter("timeout"))
        );
        assert!(config.resolve_timeout(Some("-3")).is_err());
    }

    #[test]
    fn builder_rejects_strip_limit_above_image_limit() {
        let result = ImageApiConfig::builder()
            .max_image_size(1000)
            .max_strip_size(2000)
            .build();
        assert_eq!(
            result,
            Err(ConfigError::StripLargerThanImage {
                strip: 2000,
                image: 1000
            })
        );
    }

    #[test]
    fn zero_decode_budget_is_rejected() {
        assert_eq!(
            ImageApiConfig::builder().decode_rows_per_tick(0).build(),
            Err(ConfigError::Zero("decode_rows_per_tick"))
        );
    }

    #[test]
    fn timeout_display_strings() {
        assert_eq!(DisplayTimeout::Never.to_string(), "no timeout");
        assert_eq!(DisplayTimeout::Seconds(5).to_string(), "5s timeout");
        assert_eq!(DisplayTimeout::Seconds(5).as_millis(), Some(5000));
    }
}
