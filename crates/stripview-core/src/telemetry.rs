//! Background telemetry screen
//!
//! Drawn with embedded-graphics whenever the overlay does not own the panel.
//! Only rows whose reading changed are repainted; a full repaint follows
//! every overlay release.

use alloc::format;
use alloc::vec::Vec;

use embedded_graphics::{
    mono_font::{ascii, MonoTextStyle, MonoTextStyleBuilder},
    pixelcolor::Rgb565,
    prelude::*,
    primitives::{PrimitiveStyle, Rectangle},
    text::Text,
};

const TITLE_HEIGHT: u32 = 30;
const ROW_TOP: i32 = 44;
const ROW_HEIGHT: u32 = 26;
const MARGIN: i32 = 10;

pub const TITLE_BACKGROUND: Rgb565 = Rgb565::new(2, 18, 12);
pub const SCREEN_BACKGROUND: Rgb565 = Rgb565::BLACK;

/// One sampled value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reading {
    pub label: &'static str,
    pub value: i32,
    pub unit: &'static str,
}

/// Readings published by the sampler thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TelemetrySnapshot {
    pub sequence: u32,
    pub readings: Vec<Reading>,
}

pub struct BackgroundScreen {
    title: &'static str,
    latest: TelemetrySnapshot,
    drawn: Vec<Option<Reading>>,
    full_repaint: bool,
}

impl BackgroundScreen {
    pub fn new(title: &'static str) -> Self {
        Self {
            title,
            latest: TelemetrySnapshot::default(),
            drawn: Vec::new(),
            full_repaint: true,
        }
    }

    pub fn update(&mut self, snapshot: TelemetrySnapshot) {
        self.latest = snapshot;
    }

    pub fn latest(&self) -> &TelemetrySnapshot {
        &self.latest
    }

    /// Forget what is on the panel; the next render repaints everything
    pub fn invalidate(&mut self) {
        self.full_repaint = true;
        self.drawn.clear();
    }

    pub fn needs_redraw(&self) -> bool {
        self.full_repaint
            || self.latest.readings.len() != self.drawn.len()
            || self
                .latest
                .readings
                .iter()
                .zip(&self.drawn)
                .any(|(r, d)| d.as_ref() != Some(r))
    }

    /// Paint what changed; returns whether anything was drawn
    pub fn render<D>(&mut self, target: &mut D) -> Result<bool, D::Error>
    where
        D: DrawTarget<Color = Rgb565> + OriginDimensions,
    {
        if !self.needs_redraw() {
            return Ok(false);
        }
        let width = target.size().width;

        if self.full_repaint {
            target.clear(SCREEN_BACKGROUND)?;
            Rectangle::new(Point::zero(), Size::new(width, TITLE_HEIGHT))
                .into_styled(PrimitiveStyle::with_fill(TITLE_BACKGROUND))
                .draw(target)?;
            Text::new(
                self.title,
                Point::new(MARGIN, 20),
                MonoTextStyle::new(&ascii::FONT_9X15_BOLD, Rgb565::WHITE),
            )
            .draw(target)?;
            self.full_repaint = false;
        }

        let style = MonoTextStyleBuilder::new()
            .font(&ascii::FONT_9X15)
            .text_color(Rgb565::WHITE)
            .background_color(SCREEN_BACKGROUND)
            .build();

        let rows = self.latest.readings.len().max(self.drawn.len());
        self.drawn.resize(rows, None);
        for row in 0..rows {
            let reading = self.latest.readings.get(row).copied();
            if self.drawn[row] == reading {
                continue;
            }
            let top = ROW_TOP + row as i32 * ROW_HEIGHT as i32;
            Rectangle::new(Point::new(0, top), Size::new(width, ROW_HEIGHT))
                .into_styled(PrimitiveStyle::with_fill(SCREEN_BACKGROUND))
                .draw(target)?;
            if let Some(r) = reading {
                let line = format!("{}: {} {}", r.label, r.value, r.unit);
                Text::new(&line, Point::new(MARGIN, top + 17), style).draw(target)?;
            }
            self.drawn[row] = reading;
        }
        self.drawn.truncate(self.latest.readings.len());
        Ok(true)
    }
}
