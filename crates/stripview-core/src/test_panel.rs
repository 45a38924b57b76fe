//! In-memory panel for host tests.
//!
//! Behaves like controller RAM: a window is selected, pixels stream into it
//! and wrap row by row. Writing past the end of the window is reported as an
//! error instead of silently wrapping, so off-by-one blits show up in tests.

use alloc::vec;
use alloc::vec::Vec;

use crate::panel::PanelSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPanelError {
    WindowOutOfBounds,
    WindowOverflow,
    /// Failure requested through [`TestPanel::fail_writes`]
    Injected,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    x0: u16,
    y0: u16,
    x1: u16,
    y1: u16,
    cursor: usize,
}

/// Framebuffer of raw panel words
pub struct TestPanel {
    pixels: Vec<u16>,
    width: u16,
    height: u16,
    window: Option<Window>,
    windows_set: usize,
    pixels_written: usize,
    fail_writes: bool,
}

impl TestPanel {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            pixels: vec![0; usize::from(width) * usize::from(height)],
            width,
            height,
            window: None,
            windows_set: 0,
            pixels_written: 0,
            fail_writes: false,
        }
    }

    /// Panel matching the 240x280 module
    pub fn default_size() -> Self {
        Self::new(crate::PANEL_WIDTH, crate::PANEL_HEIGHT)
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<u16> {
        if x >= self.width || y >= self.height {
            return None;
        }
        Some(self.pixels[usize::from(y) * usize::from(self.width) + usize::from(x)])
    }

    /// Raw words, row-major
    pub fn frame(&self) -> &[u16] {
        &self.pixels
    }

    pub fn is_filled_with(&self, color: u16) -> bool {
        self.pixels.iter().all(|&p| p == color)
    }

    /// Windows selected since creation
    pub fn windows_set(&self) -> usize {
        self.windows_set
    }

    /// Pixels written since creation
    pub fn pixels_written(&self) -> usize {
        self.pixels_written
    }

    /// Make every following write fail
    pub fn fail_writes(&mut self, fail: bool) {
        self.fail_writes = fail;
    }
}

impl PanelSink for TestPanel {
    type Error = TestPanelError;

    fn dimensions(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    fn set_window(&mut self, x0: u16, y0: u16, x1: u16, y1: u16) -> Result<(), Self::Error> {
        if x0 > x1 || y0 > y1 || x1 >= self.width || y1 >= self.height {
            return Err(TestPanelError::WindowOutOfBounds);
        }
        self.window = Some(Window {
            x0,
            y0,
            x1,
            y1,
            cursor: 0,
        });
        self.windows_set += 1;
        Ok(())
    }

    fn write_pixels(&mut self, pixels: &[u16]) -> Result<(), Self::Error> {
        if self.fail_writes {
            return Err(TestPanelError::Injected);
        }
        let window = self.window.as_mut().ok_or(TestPanelError::WindowOutOfBounds)?;
        let w = usize::from(window.x1 - window.x0) + 1;
        let h = usize::from(window.y1 - window.y0) + 1;
        if window.cursor + pixels.len() > w * h {
            return Err(TestPanelError::WindowOverflow);
        }
        for &p in pixels {
            let x = usize::from(window.x0) + window.cursor % w;
            let y = usize::from(window.y0) + window.cursor / w;
            self.pixels[y * usize::from(self.width) + x] = p;
            window.cursor += 1;
        }
        self.pixels_written += pixels.len();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_writes_wrap_inside_window() {
        let mut panel = TestPanel::new(4, 4);
        panel.set_window(1, 1, 2, 2).unwrap();
        panel.write_pixels(&[1, 2, 3, 4]).unwrap();
        assert_eq!(panel.pixel(1, 1), Some(1));
        assert_eq!(panel.pixel(2, 1), Some(2));
        assert_eq!(panel.pixel(1, 2), Some(3));
        assert_eq!(panel.pixel(2, 2), Some(4));
        assert_eq!(panel.pixel(0, 0), Some(0));
    }

    #[test]
    fn writing_past_window_is_an_error() {
        let mut panel = TestPanel::new(4, 4);
        panel.set_window(0, 0, 0, 0).unwrap();
        assert_eq!(
            panel.write_pixels(&[1, 2]),
            Err(TestPanelError::WindowOverflow)
        );
    }

    #[test]
    fn window_outside_panel_is_rejected() {
        let mut panel = TestPanel::new(4, 4);
        assert_eq!(
            panel.set_window(0, 0, 4, 0),
            Err(TestPanelError::WindowOutOfBounds)
        );
    }

    #[test]
    fn default_fill_covers_panel() {
        let mut panel = TestPanel::default_size();
        panel.fill(0xABCD).unwrap();
        assert!(panel.is_filled_with(0xABCD));
        assert_eq!(panel.dimensions(), (240, 280));
    }

    #[test]
    fn injected_failures_surface() {
        let mut panel = TestPanel::new(2, 2);
        panel.fail_writes(true);
        assert_eq!(panel.fill(0), Err(TestPanelError::Injected));
    }
}
