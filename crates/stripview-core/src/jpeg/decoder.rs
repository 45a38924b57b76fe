//! MCU-at-a-time baseline decoder

use alloc::boxed::Box;

use super::header::{parse_header, Parsed};
use super::huffman::{decode_block, BitReader, HuffTable, ReaderState};
use super::idct::idct;
use super::{FrameInfo, HeaderError, ScanInfo, MAX_MCU_PIXELS};
use crate::error::DecodeError;
use crate::memory::{Reservation, WorkingSet};

/// Quantization and Huffman tables of the current JPEG
pub(crate) struct Tables {
    quant: [[u16; 64]; 4],
    quant_ok: [bool; 4],
    dc: [HuffTable; 2],
    ac: [HuffTable; 2],
    dc_ok: [bool; 2],
    ac_ok: [bool; 2],
}

impl Tables {
    const fn new() -> Self {
        Self {
            quant: [[0; 64]; 4],
            quant_ok: [false; 4],
            dc: [HuffTable::empty(), HuffTable::empty()],
            ac: [HuffTable::empty(), HuffTable::empty()],
            dc_ok: [false; 2],
            ac_ok: [false; 2],
        }
    }

    fn clear(&mut self) {
        self.quant_ok = [false; 4];
        self.dc_ok = [false; 2];
        self.ac_ok = [false; 2];
    }

    pub(crate) fn set_quant(&mut self, id: usize, values: &[u16; 64]) {
        self.quant[id] = *values;
        self.quant_ok[id] = true;
    }

    pub(crate) fn set_huffman(
        &mut self,
        class: u8,
        id: usize,
        counts: &[u8; 16],
        symbols: &[u8],
    ) -> Result<(), HeaderError> {
        if class == 0 {
            self.dc[id].build(counts, symbols)?;
            self.dc_ok[id] = true;
        } else {
            self.ac[id].build(counts, symbols)?;
            self.ac_ok[id] = true;
        }
        Ok(())
    }

    fn check(&self, frame: &FrameInfo, scan: &ScanInfo) -> Result<(), HeaderError> {
        for i in 0..usize::from(scan.count) {
            let comp = &frame.components[usize::from(scan.order[i])];
            if !self.quant_ok[usize::from(comp.quant_table)] {
                return Err(HeaderError::MissingTable("quantization"));
            }
            if !self.dc_ok[usize::from(scan.dc_table[i])] {
                return Err(HeaderError::MissingTable("DC Huffman"));
            }
            if !self.ac_ok[usize::from(scan.ac_table[i])] {
                return Err(HeaderError::MissingTable("AC Huffman"));
            }
        }
        Ok(())
    }
}

/// Fixed decoder state: tables plus one MCU of scratch
struct WorkArea {
    tables: Tables,
    coef: [i32; 64],
    samples: [u8; 64],
    /// One MCU per component, each at its own sampling resolution
    planes: [[u8; MAX_MCU_PIXELS]; 3],
    rgb: [u8; MAX_MCU_PIXELS * 3],
}

impl WorkArea {
    const fn new() -> Self {
        Self {
            tables: Tables::new(),
            coef: [0; 64],
            samples: [0; 64],
            planes: [[0; MAX_MCU_PIXELS]; 3],
            rgb: [0; MAX_MCU_PIXELS * 3],
        }
    }
}

/// Reusable baseline JPEG decoder with a constant-size work area
///
/// The work area is allocated once and charged to the working-set meter
/// for the codec's lifetime; decoding itself allocates nothing.
pub struct StripCodec {
    work: Box<WorkArea>,
    _reservation: Reservation,
}

impl StripCodec {
    pub fn new(meter: &WorkingSet) -> Self {
        Self {
            work: Box::new(WorkArea::new()),
            _reservation: meter.reserve(Self::work_area_bytes()),
        }
    }

    /// Bytes held by one codec
    pub const fn work_area_bytes() -> usize {
        core::mem::size_of::<WorkArea>()
    }

    /// Parse the header of a complete JPEG and position at its first MCU
    pub fn prepare<'a>(&'a mut self, data: &'a [u8]) -> Result<DecodeContext<'a>, DecodeError> {
        let work = &mut *self.work;
        work.tables.clear();
        let header = match parse_header(data, Some(&mut work.tables))? {
            Parsed::Complete(header) => header,
            Parsed::Incomplete | Parsed::Metadata { .. } => {
                return Err(HeaderError::Truncated.into())
            }
        };
        work.tables.check(&header.frame, &header.scan)?;

        let cursor = DecodeCursor {
            reader: ReaderState::at(header.scan_start),
            frame: header.frame,
            scan: header.scan,
            restart_interval: u32::from(header.restart_interval),
            total_mcus: header.frame.mcus_x() * header.frame.mcus_y(),
            next_mcu: 0,
            dc_pred: [0; 3],
        };
        Ok(self.resume(data, cursor))
    }

    /// Pick up a decode suspended with [`DecodeContext::suspend`]
    ///
    /// `data` must be the JPEG the cursor was prepared from, with no other
    /// JPEG prepared on this codec in between.
    pub fn resume<'a>(&'a mut self, data: &'a [u8], cursor: DecodeCursor) -> DecodeContext<'a> {
        DecodeContext {
            work: &mut *self.work,
            reader: BitReader::resume(data, cursor.reader),
            cursor,
        }
    }
}

/// Where a suspended decode stands
#[derive(Debug, Clone, Copy)]
pub struct DecodeCursor {
    reader: ReaderState,
    frame: FrameInfo,
    scan: ScanInfo,
    restart_interval: u32,
    total_mcus: u32,
    next_mcu: u32,
    dc_pred: [i32; 3],
}

impl DecodeCursor {
    pub fn frame(&self) -> &FrameInfo {
        &self.frame
    }

    pub fn is_finished(&self) -> bool {
        self.next_mcu >= self.total_mcus
    }

    /// Image rows covered by the MCU rows decoded so far
    pub fn rows_done(&self) -> u16 {
        let mcu_rows = self.next_mcu / self.frame.mcus_x();
        (mcu_rows as u16)
            .saturating_mul(self.frame.mcu_height())
            .min(self.frame.height)
    }
}

/// Decoded pixels of one MCU, clipped to the image
#[derive(Debug, Clone, Copy)]
pub struct PixelBlock<'a> {
    pub left: u16,
    pub top: u16,
    pub width: u16,
    pub height: u16,
    /// `width * height` interleaved RGB888 pixels, row-major
    pub rgb: &'a [u8],
}

/// Pull reader over the MCUs of one prepared JPEG
pub struct DecodeContext<'a> {
    work: &'a mut WorkArea,
    reader: BitReader<'a>,
    cursor: DecodeCursor,
}

impl DecodeContext<'_> {
    pub fn frame(&self) -> &FrameInfo {
        &self.cursor.frame
    }

    pub fn width(&self) -> u16 {
        self.cursor.frame.width
    }

    pub fn height(&self) -> u16 {
        self.cursor.frame.height
    }

    /// Every MCU has been handed out
    pub fn is_finished(&self) -> bool {
        self.cursor.is_finished()
    }

    /// Stop here; [`StripCodec::resume`] continues with the next MCU
    pub fn suspend(self) -> DecodeCursor {
        DecodeCursor {
            reader: self.reader.state(),
            ..self.cursor
        }
    }

    /// Decode the next MCU; `Ok(None)` once the frame is exhausted
    pub fn next_block(&mut self) -> Result<Option<PixelBlock<'_>>, DecodeError> {
        let c = &mut self.cursor;
        if c.is_finished() {
            return Ok(None);
        }
        if c.restart_interval > 0 && c.next_mcu > 0 && c.next_mcu % c.restart_interval == 0 {
            self.reader.consume_restart();
            c.dc_pred = [0; 3];
        }

        self.decode_mcu()?;
        if self.reader.overran() {
            return Err(DecodeError::Truncated);
        }

        let frame = self.cursor.frame;
        let (mcu_w, mcu_h) = (frame.mcu_width(), frame.mcu_height());
        let mcus_x = frame.mcus_x();
        let next = self.cursor.next_mcu;
        let left = (next % mcus_x) as u16 * mcu_w;
        let top = (next / mcus_x) as u16 * mcu_h;
        let width = mcu_w.min(frame.width - left);
        let height = mcu_h.min(frame.height - top);
        self.cursor.next_mcu += 1;

        self.color_convert(usize::from(width), usize::from(height));
        let len = usize::from(width) * usize::from(height) * 3;
        Ok(Some(PixelBlock {
            left,
            top,
            width,
            height,
            rgb: &self.work.rgb[..len],
        }))
    }

    fn decode_mcu(&mut self) -> Result<(), DecodeError> {
        let WorkArea {
            tables,
            coef,
            samples,
            planes,
            ..
        } = &mut *self.work;

        let DecodeCursor {
            frame,
            scan,
            dc_pred,
            ..
        } = &mut self.cursor;

        for i in 0..usize::from(scan.count) {
            let ci = usize::from(scan.order[i]);
            let quant = &tables.quant[usize::from(frame.components[ci].quant_table)];
            let dc = &tables.dc[usize::from(scan.dc_table[i])];
            let ac = &tables.ac[usize::from(scan.ac_table[i])];
            let (bh_count, bv_count) = frame.blocks(ci);
            let stride = bh_count * 8;

            for bv in 0..bv_count {
                for bh in 0..bh_count {
                    decode_block(&mut self.reader, dc, ac, &mut dc_pred[ci], quant, coef)?;
                    idct(coef, samples);
                    for row in 0..8 {
                        let dst = (bv * 8 + row) * stride + bh * 8;
                        planes[ci][dst..dst + 8].copy_from_slice(&samples[row * 8..row * 8 + 8]);
                    }
                }
            }
        }
        Ok(())
    }

    fn color_convert(&mut self, width: usize, height: usize) {
        let WorkArea { planes, rgb, .. } = &mut *self.work;
        let frame = &self.cursor.frame;

        if frame.is_greyscale() {
            for y in 0..height {
                for x in 0..width {
                    let v = planes[0][y * 8 + x];
                    let o = (y * width + x) * 3;
                    rgb[o..o + 3].fill(v);
                }
            }
            return;
        }

        let max_h = usize::from(frame.max_h);
        let max_v = usize::from(frame.max_v);
        let luma_stride = max_h * 8;
        for y in 0..height {
            for x in 0..width {
                let luma = planes[0][y * luma_stride + x];
                // chroma is 1x1: one sample covers max_h x max_v luma pixels
                let c = (y / max_v) * 8 + x / max_h;
                let (r, g, b) = ycbcr_to_rgb(luma, planes[1][c], planes[2][c]);
                let o = (y * width + x) * 3;
                rgb[o] = r;
                rgb[o + 1] = g;
                rgb[o + 2] = b;
            }
        }
    }
}

/// JFIF YCbCr to RGB in 16-bit fixed point
#[inline]
pub(crate) fn ycbcr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = i32::from(y);
    let cb = i32::from(cb) - 128;
    let cr = i32::from(cr) - 128;
    let r = y + ((91_881 * cr + 32_768) >> 16);
    let g = y + ((-22_554 * cb - 46_802 * cr + 32_768) >> 16);
    let b = y + ((116_130 * cb + 32_768) >> 16);
    (
        r.clamp(0, 255) as u8,
        g.clamp(0, 255) as u8,
        b.clamp(0, 255) as u8,
    )
}
