//! Strip ordering and strip-to-panel blitting

use alloc::boxed::Box;
use alloc::format;

use log::debug;

use crate::color::PixelOrder;
use crate::error::{ImageError, ValidationError};
use crate::jpeg::{preflight, DecodeCursor, FrameInfo, PixelBlock, StripCodec, MAX_MCU_PIXELS};
use crate::memory::{Reservation, TrackedBuffer, WorkingSet};
use crate::panel::PanelSink;

/// Outcome of one applied strip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripReport {
    pub index: u32,
    pub row_start: u16,
    pub rows: u16,
    /// The strip completed the image
    pub complete: bool,
}

/// One strip in flight: its position and its compressed bytes
#[derive(Debug)]
pub struct StripDescriptor {
    pub index: u32,
    pub row_start: u16,
    pub row_height: u16,
    pub compressed: TrackedBuffer,
}

/// A strip whose decode has started but not reached its last MCU
struct PendingStrip {
    strip: StripDescriptor,
    cursor: DecodeCursor,
}

/// Applies strips in order, top to bottom, straight to the panel
///
/// Holds the codec work area and one MCU of panel words; neither depends on
/// the image size. A strip is either applied whole ([`accept`](Self::accept))
/// or started with [`begin`](Self::begin) and painted a few rows at a time
/// with [`advance`](Self::advance).
pub struct StripAssembler {
    codec: StripCodec,
    pending: Option<PendingStrip>,
    pixels: Box<[u16; MAX_MCU_PIXELS]>,
    _pixels_reservation: Reservation,
    order: PixelOrder,
    width: u16,
    height: u16,
    expected_strips: Option<u32>,
    next_index: u32,
    row_offset: u16,
}

impl StripAssembler {
    pub fn new(
        meter: &WorkingSet,
        order: PixelOrder,
        width: u16,
        height: u16,
        expected_strips: Option<u32>,
    ) -> Self {
        Self {
            codec: StripCodec::new(meter),
            pending: None,
            pixels: Box::new([0; MAX_MCU_PIXELS]),
            _pixels_reservation: meter.reserve(core::mem::size_of::<[u16; MAX_MCU_PIXELS]>()),
            order,
            width,
            height,
            expected_strips,
            next_index: 0,
            row_offset: 0,
        }
    }

    /// Fixed bytes held by one assembler
    pub const fn work_area_bytes() -> usize {
        StripCodec::work_area_bytes() + core::mem::size_of::<[u16; MAX_MCU_PIXELS]>()
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn next_index(&self) -> u32 {
        self.next_index
    }

    /// Rows already on the panel
    pub fn row_offset(&self) -> u16 {
        self.row_offset
    }

    pub fn expected_strips(&self) -> Option<u32> {
        self.expected_strips
    }

    /// Rows on the panel, counting a pending strip's finished MCU rows
    pub fn rows_painted(&self) -> u16 {
        self.row_offset
            + self
                .pending
                .as_ref()
                .map_or(0, |pending| pending.cursor.rows_done())
    }

    /// A strip has been begun and not yet finished
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.row_offset >= self.height || self.expected_strips == Some(self.next_index)
    }

    /// Reject anything but the next index
    pub fn check_index(&self, index: u32) -> Result<(), ImageError> {
        if index != self.next_index || self.is_complete() {
            return Err(ImageError::Sequencing {
                expected: self.next_index,
                got: index,
            });
        }
        Ok(())
    }

    /// Fragment shape check: full width, no more rows than remain
    pub fn check_fragment(&self, frame: &FrameInfo) -> Result<(), ImageError> {
        let remaining = self.height - self.row_offset;
        if frame.width != self.width || frame.height > remaining {
            return Err(ValidationError::StripShape {
                width: frame.width,
                height: frame.height,
                expected_width: self.width,
                remaining_rows: remaining,
            }
            .into());
        }
        Ok(())
    }

    /// Validate, decode and blit the next strip, then drop its bytes
    pub fn accept<P: PanelSink>(
        &mut self,
        index: u32,
        compressed: TrackedBuffer,
        panel: &mut P,
    ) -> Result<StripReport, ImageError> {
        self.begin(index, compressed)?;
        loop {
            if let Some(report) = self.advance(panel, u16::MAX)? {
                return Ok(report);
            }
        }
    }

    /// Validate the next strip and position its decode at the first MCU
    ///
    /// Nothing reaches the panel until [`advance`](Self::advance).
    pub fn begin(&mut self, index: u32, compressed: TrackedBuffer) -> Result<(), ImageError> {
        if self.pending.is_some() {
            return Err(ImageError::Conflict);
        }
        self.check_index(index)?;
        let frame = preflight(compressed.as_slice())?;
        self.check_fragment(&frame)?;

        let cursor = self.codec.prepare(compressed.as_slice())?.suspend();
        self.pending = Some(PendingStrip {
            strip: StripDescriptor {
                index,
                row_start: self.row_offset,
                row_height: frame.height,
                compressed,
            },
            cursor,
        });
        Ok(())
    }

    /// Paint at least `max_rows` more rows (whole MCU rows) of the pending
    /// strip
    ///
    /// Returns the report once the strip is finished and its bytes dropped,
    /// `None` while rows remain. A failed strip is dropped.
    pub fn advance<P: PanelSink>(
        &mut self,
        panel: &mut P,
        max_rows: u16,
    ) -> Result<Option<StripReport>, ImageError> {
        let Some(pending) = self.pending.as_ref() else {
            return Err(ImageError::NoSession);
        };
        let row_start = pending.strip.row_start;
        let mut ctx = self
            .codec
            .resume(pending.strip.compressed.as_slice(), pending.cursor);
        let frame = *ctx.frame();
        let mcu_rows = u32::from(max_rows.div_ceil(frame.mcu_height()));
        let mut budget = frame.mcus_x() * mcu_rows;

        let outcome = loop {
            if budget == 0 {
                break Ok(ctx.is_finished());
            }
            match ctx.next_block() {
                Ok(Some(block)) => {
                    let drawn =
                        blit_block(&block, row_start, self.order, &mut self.pixels[..], panel);
                    if let Err(err) = drawn {
                        break Err(err);
                    }
                    budget -= 1;
                }
                Ok(None) => break Ok(true),
                Err(err) => break Err(ImageError::from(err)),
            }
        };
        let cursor = ctx.suspend();

        match outcome {
            Ok(false) => {
                if let Some(pending) = self.pending.as_mut() {
                    pending.cursor = cursor;
                }
                Ok(None)
            }
            Ok(true) => Ok(self.pending.take().map(|p| self.finish(p.strip))),
            Err(err) => {
                self.pending = None;
                Err(err)
            }
        }
    }

    fn finish(&mut self, strip: StripDescriptor) -> StripReport {
        let StripDescriptor {
            index,
            row_start,
            row_height,
            compressed,
        } = strip;
        drop(compressed);

        self.row_offset += row_height;
        self.next_index += 1;
        debug!(
            "[IMG] strip {} applied: rows {}..{} of {}",
            index,
            row_start,
            self.row_offset,
            self.height
        );
        StripReport {
            index,
            row_start,
            rows: row_height,
            complete: self.is_complete(),
        }
    }
}

/// Pack one decoded MCU and write it at its place on the panel
fn blit_block<P: PanelSink>(
    block: &PixelBlock<'_>,
    row_start: u16,
    order: PixelOrder,
    pixels: &mut [u16],
    panel: &mut P,
) -> Result<(), ImageError> {
    let count = usize::from(block.width) * usize::from(block.height);
    let words = &mut pixels[..count];
    order.pack_run(block.rgb, words);

    let x0 = block.left;
    let y0 = row_start + block.top;
    panel
        .set_window(x0, y0, x0 + block.width - 1, y0 + block.height - 1)
        .and_then(|()| panel.write_pixels(words))
        .map_err(|e| ImageError::Panel(format!("{e:?}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_panel::TestPanel;
    use crate::test_fixtures::grey_jpeg as grey_strip;

    fn tracked(meter: &WorkingSet, bytes: &[u8]) -> TrackedBuffer {
        let mut buffer = TrackedBuffer::with_capacity(meter, bytes.len()).unwrap();
        buffer.extend_from_slice(bytes).unwrap();
        buffer
    }

    #[test]
    fn strips_stack_downwards_and_complete() {
        let meter = WorkingSet::new();
        let mut panel = TestPanel::new(16, 16);
        let mut assembler = StripAssembler::new(&meter, PixelOrder::Rgb565, 16, 16, None);

        let first = assembler
            .accept(0, tracked(&meter, &grey_strip(16, 8)), &mut panel)
            .unwrap();
        assert_eq!((first.row_start, first.rows, first.complete), (0, 8, false));
        let second = assembler
            .accept(1, tracked(&meter, &grey_strip(16, 8)), &mut panel)
            .unwrap();
        assert_eq!((second.row_start, second.complete), (8, true));

        let grey = PixelOrder::Rgb565.pack(128, 128, 128);
        assert!(panel.is_filled_with(grey));
    }

    #[test]
    fn out_of_order_index_is_sequencing_error() {
        let meter = WorkingSet::new();
        let mut panel = TestPanel::new(16, 16);
        let mut assembler = StripAssembler::new(&meter, PixelOrder::Rgb565, 16, 16, None);
        assert_eq!(
            assembler
                .accept(1, tracked(&meter, &grey_strip(16, 8)), &mut panel)
                .err(),
            Some(ImageError::Sequencing {
                expected: 0,
                got: 1
            })
        );
        assert_eq!(panel.pixels_written(), 0);
    }

    #[test]
    fn wrong_width_or_excess_rows_is_rejected() {
        let meter = WorkingSet::new();
        let mut panel = TestPanel::new(16, 16);
        let mut assembler = StripAssembler::new(&meter, PixelOrder::Rgb565, 16, 16, None);
        assert!(matches!(
            assembler.accept(0, tracked(&meter, &grey_strip(8, 8)), &mut panel),
            Err(ImageError::Validation(ValidationError::StripShape { .. }))
        ));
        assert!(matches!(
            assembler.accept(0, tracked(&meter, &grey_strip(16, 24)), &mut panel),
            Err(ImageError::Validation(ValidationError::StripShape { .. }))
        ));
    }

    #[test]
    fn strip_bytes_are_released_after_apply() {
        let meter = WorkingSet::new();
        let mut panel = TestPanel::new(16, 8);
        let mut assembler = StripAssembler::new(&meter, PixelOrder::Rgb565, 16, 8, Some(1));
        let fixed = meter.current();
        assembler
            .accept(0, tracked(&meter, &grey_strip(16, 8)), &mut panel)
            .unwrap();
        assert_eq!(meter.current(), fixed);
        assert!(assembler.is_complete());
        assert!(assembler.check_index(1).is_err());
    }

    #[test]
    fn advance_paints_one_mcu_row_at_a_time() {
        let meter = WorkingSet::new();
        let mut panel = TestPanel::new(16, 24);
        let mut assembler = StripAssembler::new(&meter, PixelOrder::Rgb565, 16, 24, Some(1));
        assembler
            .begin(0, tracked(&meter, &grey_strip(16, 24)))
            .unwrap();
        assert_eq!(panel.pixels_written(), 0);

        assert_eq!(assembler.advance(&mut panel, 8).unwrap(), None);
        assert_eq!(panel.pixels_written(), 16 * 8);
        assert_eq!((assembler.row_offset(), assembler.rows_painted()), (0, 8));
        // a partial MCU row rounds up to a whole one
        assert_eq!(assembler.advance(&mut panel, 3).unwrap(), None);
        assert_eq!(panel.pixels_written(), 16 * 16);

        let report = assembler.advance(&mut panel, 8).unwrap().unwrap();
        assert_eq!((report.rows, report.complete), (24, true));
        assert!(!assembler.has_pending());
        assert_eq!(meter.current(), StripAssembler::work_area_bytes());
    }

    #[test]
    fn failed_decode_drops_pending_strip() {
        let meter = WorkingSet::new();
        let mut panel = TestPanel::new(16, 16);
        let mut assembler = StripAssembler::new(&meter, PixelOrder::Rgb565, 16, 16, Some(1));
        let mut strip = grey_strip(16, 16);
        // cut the scan short: 4 blocks need a byte, leave none
        let eoi = strip.len() - 2;
        strip.remove(eoi - 1);
        assembler.begin(0, tracked(&meter, &strip)).unwrap();
        assert!(assembler.begin(0, tracked(&meter, &strip)).is_err());

        assert!(matches!(
            assembler.advance(&mut panel, 16),
            Err(ImageError::Decode(_))
        ));
        assert!(!assembler.has_pending());
        assert_eq!(
            assembler.advance(&mut panel, 16).err(),
            Some(ImageError::NoSession)
        );
    }

    #[test]
    fn panel_failure_is_reported() {
        let meter = WorkingSet::new();
        let mut panel = TestPanel::new(16, 8);
        panel.fail_writes(true);
        let mut assembler = StripAssembler::new(&meter, PixelOrder::Rgb565, 16, 8, None);
        assert!(matches!(
            assembler.accept(0, tracked(&meter, &grey_strip(16, 8)), &mut panel),
            Err(ImageError::Panel(_))
        ));
    }
}
