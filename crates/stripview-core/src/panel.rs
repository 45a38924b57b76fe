//! Panel sink abstraction and its embedded-graphics adapter

use core::fmt::Debug;

use embedded_graphics::{
    pixelcolor::{Rgb565, RgbColor},
    prelude::*,
    primitives::Rectangle,
};
use st7789::DisplayInterface;

use crate::color::PixelOrder;

/// Pixels per window write when filling
const FILL_CHUNK: usize = 64;

/// Rectangular-window pixel sink in panel-native 565 words
///
/// A window is set once, then pixels stream into it left to right, top to
/// bottom, exactly as the controller's RAM write pointer advances.
pub trait PanelSink {
    type Error: Debug;

    /// Visible (width, height)
    fn dimensions(&self) -> (u16, u16);

    /// Select the inclusive window `(x0, y0)..=(x1, y1)` for the next writes
    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), Self::Error>;

    /// Stream pixels into the current window
    fn write_pixels(&mut self, pixels: &[u16]) -> Result<(), Self::Error>;

    /// Fill a rectangle with one color
    fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: u16,
    ) -> Result<(), Self::Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.set_window(x, y, x + width - 1, y + height - 1)?;
        let run = [color; FILL_CHUNK];
        let mut remaining = usize::from(width) * usize::from(height);
        while remaining > 0 {
            let n = remaining.min(FILL_CHUNK);
            self.write_pixels(&run[..n])?;
            remaining -= n;
        }
        Ok(())
    }

    /// Fill the whole panel
    fn fill(&mut self, color: u16) -> Result<(), Self::Error> {
        let (w, h) = self.dimensions();
        self.fill_rect(0, 0, w, h, color)
    }
}

impl<I: DisplayInterface> PanelSink for st7789::Display<I> {
    type Error = st7789::Error<I>;

    fn dimensions(&self) -> (u16, u16) {
        let dims = st7789::Display::dimensions(self);
        (dims.width, dims.height)
    }

    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), Self::Error> {
        st7789::Display::set_window(self, x0, y0, x1, y1)
    }

    fn write_pixels(&mut self, pixels: &[u16]) -> Result<(), Self::Error> {
        st7789::Display::write_pixels(self, pixels)
    }

    fn fill_rect(
        &mut self,
        x: u16,
        y: u16,
        width: u16,
        height: u16,
        color: u16,
    ) -> Result<(), Self::Error> {
        st7789::Display::fill_rect(self, x, y, width, height, color)
    }
}

/// Encode an embedded-graphics color as a panel word
pub fn raw565(color: Rgb565, order: PixelOrder) -> u16 {
    let (r, g, b) = (u16::from(color.r()), u16::from(color.g()), u16::from(color.b()));
    match order {
        PixelOrder::Rgb565 => (r << 11) | (g << 5) | b,
        PixelOrder::Bgr565 => (b << 11) | (g << 5) | r,
    }
}

/// `DrawTarget` view of a [`PanelSink`]
///
/// Used by screens drawn with embedded-graphics. There is no frame buffer;
/// scattered pixels cost one window each, fills are streamed.
pub struct PanelCanvas<'a, P: PanelSink> {
    panel: &'a mut P,
    order: PixelOrder,
}

impl<'a, P: PanelSink> PanelCanvas<'a, P> {
    pub fn new(panel: &'a mut P, order: PixelOrder) -> Self {
        Self { panel, order }
    }
}

impl<P: PanelSink> DrawTarget for PanelCanvas<'_, P> {
    type Color = Rgb565;
    type Error = P::Error;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let (w, h) = self.panel.dimensions();
        for Pixel(Point { x, y }, color) in pixels {
            if x < 0 || y < 0 || x >= i32::from(w) || y >= i32::from(h) {
                continue;
            }
            let (x, y) = (x as u16, y as u16);
            self.panel.set_window(x, y, x, y)?;
            self.panel.write_pixels(&[raw565(color, self.order)])?;
        }
        Ok(())
    }

    fn fill_solid(&mut self, area: &Rectangle, color: Self::Color) -> Result<(), Self::Error> {
        let clipped = area.intersection(&self.bounding_box());
        if clipped.size.width == 0 || clipped.size.height == 0 {
            return Ok(());
        }
        self.panel.fill_rect(
            clipped.top_left.x as u16,
            clipped.top_left.y as u16,
            clipped.size.width as u16,
            clipped.size.height as u16,
            raw565(color, self.order),
        )
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.panel.fill(raw565(color, self.order))
    }
}

impl<P: PanelSink> OriginDimensions for PanelCanvas<'_, P> {
    fn size(&self) -> Size {
        let (w, h) = self.panel.dimensions();
        Size::new(u32::from(w), u32::from(h))
    }
}
