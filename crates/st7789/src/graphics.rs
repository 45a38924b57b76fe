//! Graphics support via embedded-graphics
//!
//! [`Display`](crate::display::Display) implements
//! [`DrawTarget`](embedded_graphics_core::draw_target::DrawTarget) with
//! [`Rgb565`] color directly: there is no host frame buffer, every draw call
//! goes straight to controller RAM. Scattered pixels cost one window per
//! pixel, so prefer filled primitives and text for anything large.
//!
//! ## Example
//!
//! ```rust,ignore
//! use embedded_graphics::{
//!     mono_font::{ascii::FONT_10X20, MonoTextStyle},
//!     pixelcolor::Rgb565,
//!     prelude::*,
//!     text::Text,
//! };
//!
//! display.clear(Rgb565::BLACK)?;
//! Text::new("Hello", Point::new(10, 30), MonoTextStyle::new(&FONT_10X20, Rgb565::WHITE))
//!     .draw(&mut display)?;
//! ```

use embedded_graphics_core::{
    draw_target::DrawTarget,
    geometry::{Dimensions as _, OriginDimensions, Point, Size},
    pixelcolor::{IntoStorage, Rgb565, RgbColor},
    prelude::Pixel,
    primitives::Rectangle,
};

use crate::config::ColorOrder;
use crate::display::Display;
use crate::error::Error;
use crate::interface::DisplayInterface;

/// Encode an [`Rgb565`] color in the word order the controller expects
pub fn raw_color(color: Rgb565, order: ColorOrder) -> u16 {
    match order {
        ColorOrder::Rgb => color.into_storage(),
        ColorOrder::Bgr => {
            ((color.b() as u16) << 11) | ((color.g() as u16) << 5) | color.r() as u16
        }
    }
}

impl<I> DrawTarget for Display<I>
where
    I: DisplayInterface,
{
    type Color = Rgb565;
    type Error = Error<I>;

    fn draw_iter<Iter>(&mut self, pixels: Iter) -> Result<(), Self::Error>
    where
        Iter: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let sz = self.size();
        let order = self.config().color_order;

        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 || x as u32 >= sz.width || y as u32 >= sz.height {
                continue;
            }
            let (x, y) = (x as u16, y as u16);
            self.set_window(x, y, x, y)?;
            self.write_pixels(&[raw_color(color, order)])?;
        }

        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let clipped = area.intersection(&self.bounding_box());
        if clipped.size.width == 0 || clipped.size.height == 0 {
            return Ok(());
        }
        let raw = raw_color(color, self.config().color_order);
        self.fill_rect(
            clipped.top_left.x as u16,
            clipped.top_left.y as u16,
            clipped.size.width as u16,
            clipped.size.height as u16,
            raw,
        )
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        let raw = raw_color(color, self.config().color_order);
        Display::clear(self, raw)
    }
}

impl<I> OriginDimensions for Display<I>
where
    I: DisplayInterface,
{
    fn size(&self) -> Size {
        let dims = self.dimensions();
        Size::new(dims.width as u32, dims.height as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bgr_swaps_red_and_blue_fields() {
        assert_eq!(raw_color(Rgb565::RED, ColorOrder::Rgb), 0xF800);
        assert_eq!(raw_color(Rgb565::RED, ColorOrder::Bgr), 0x001F);
        assert_eq!(raw_color(Rgb565::GREEN, ColorOrder::Bgr), 0x07E0);
        assert_eq!(raw_color(Rgb565::BLUE, ColorOrder::Bgr), 0xF800);
    }
}
