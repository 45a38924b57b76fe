//! Huffman tables, entropy bit reader and coefficient decode

use super::{HeaderError, M_RST0, M_RST7, ZIGZAG};
use crate::error::DecodeError;

/// Canonical Huffman table with an 8-bit fast path
#[derive(Clone)]
pub(crate) struct HuffTable {
    /// (symbol, code length) for every 8-bit prefix; length 0 means "longer code"
    lut: [(u8, u8); 256],
    mincode: [i32; 17],
    maxcode: [i32; 17],
    valptr: [u16; 17],
    values: [u8; 256],
}

impl HuffTable {
    pub(crate) const fn empty() -> Self {
        Self {
            lut: [(0, 0); 256],
            mincode: [0; 17],
            maxcode: [-1; 17],
            valptr: [0; 17],
            values: [0; 256],
        }
    }

    /// Rebuild from a DHT code-length histogram and symbol list
    pub(crate) fn build(&mut self, counts: &[u8; 16], symbols: &[u8]) -> Result<(), HeaderError> {
        let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
        if total > symbols.len() || total > 256 {
            return Err(HeaderError::Malformed("DHT length"));
        }
        self.values[..total].copy_from_slice(&symbols[..total]);
        self.lut.fill((0, 0));
        self.maxcode.fill(-1);

        let mut code: u32 = 0;
        let mut si: usize = 0;
        for bits in 1..=16usize {
            let n = usize::from(counts[bits - 1]);
            if n > 0 {
                if code + n as u32 > 1 << bits {
                    return Err(HeaderError::Malformed("Huffman code space overflow"));
                }
                self.valptr[bits] = si as u16;
                self.mincode[bits] = code as i32;
                for _ in 0..n {
                    if bits <= 8 {
                        let prefix = (code << (8 - bits)) as usize;
                        let fill = 1usize << (8 - bits);
                        for entry in &mut self.lut[prefix..prefix + fill] {
                            *entry = (symbols[si], bits as u8);
                        }
                    }
                    si += 1;
                    code += 1;
                }
                self.maxcode[bits] = code as i32 - 1;
            }
            code <<= 1;
        }
        Ok(())
    }
}

/// Bit reader over the entropy-coded segment of a slice
///
/// Handles byte stuffing and stops at the first marker. Reads past the end
/// of the data or past a marker yield zero bits; [`BitReader::overran`]
/// reports whether any of those were consumed.
pub(crate) struct BitReader<'a> {
    data: &'a [u8],
    pos: usize,
    buf: u32,
    avail: u8,
    /// Marker code seen in the stream, 0 when none
    marker: u8,
    /// Zero bytes inserted at end of data or after a marker
    padding: u32,
}

/// Position of a [`BitReader`], detached from its data
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ReaderState {
    pos: usize,
    buf: u32,
    avail: u8,
    marker: u8,
    padding: u32,
}

impl ReaderState {
    pub(crate) const fn at(start: usize) -> Self {
        Self {
            pos: start,
            buf: 0,
            avail: 0,
            marker: 0,
            padding: 0,
        }
    }
}

impl<'a> BitReader<'a> {
    pub(crate) fn new(data: &'a [u8], start: usize) -> Self {
        Self::resume(data, ReaderState::at(start))
    }

    /// Continue from a saved position in the same data
    pub(crate) fn resume(data: &'a [u8], state: ReaderState) -> Self {
        let ReaderState {
            pos,
            buf,
            avail,
            marker,
            padding,
        } = state;
        Self {
            data,
            pos,
            buf,
            avail,
            marker,
            padding,
        }
    }

    pub(crate) fn state(&self) -> ReaderState {
        ReaderState {
            pos: self.pos,
            buf: self.buf,
            avail: self.avail,
            marker: self.marker,
            padding: self.padding,
        }
    }

    fn read_raw(&mut self) -> Option<u8> {
        let b = self.data.get(self.pos).copied();
        if b.is_some() {
            self.pos += 1;
        }
        b
    }

    fn next_byte(&mut self) -> u8 {
        if self.marker != 0 {
            self.padding += 1;
            return 0;
        }
        let Some(b) = self.read_raw() else {
            self.padding += 1;
            return 0;
        };
        if b != 0xFF {
            return b;
        }
        loop {
            match self.read_raw() {
                Some(0x00) => return 0xFF,
                Some(0xFF) => continue,
                Some(m) => {
                    self.marker = m;
                    self.padding += 1;
                    return 0;
                }
                None => {
                    self.padding += 1;
                    return 0;
                }
            }
        }
    }

    #[inline]
    fn ensure(&mut self, n: u8) {
        while self.avail < n {
            let b = self.next_byte();
            self.buf |= u32::from(b) << (24 - self.avail);
            self.avail += 8;
        }
    }

    #[inline]
    fn peek(&mut self, n: u8) -> u32 {
        self.ensure(n);
        self.buf >> (32 - u32::from(n))
    }

    #[inline]
    fn drop_bits(&mut self, n: u8) {
        self.buf <<= u32::from(n);
        self.avail -= n;
    }

    #[inline]
    fn read_bits(&mut self, n: u8) -> u32 {
        if n == 0 {
            return 0;
        }
        let val = self.peek(n);
        self.drop_bits(n);
        val
    }

    /// True once a padding bit has been consumed by the decoder
    pub(crate) fn overran(&self) -> bool {
        self.padding * 8 > u32::from(self.avail)
    }

    /// Discard buffered bits and step over the next restart marker
    pub(crate) fn consume_restart(&mut self) {
        self.buf = 0;
        self.avail = 0;
        self.padding = 0;

        if self.marker != 0 {
            if (M_RST0..=M_RST7).contains(&self.marker) {
                self.marker = 0;
            }
            return;
        }

        while let Some(b) = self.read_raw() {
            if b != 0xFF {
                continue;
            }
            loop {
                match self.read_raw() {
                    Some(0xFF) => continue,
                    Some(0x00) => break,
                    Some(m) if (M_RST0..=M_RST7).contains(&m) => return,
                    Some(m) => {
                        // premature marker: later reads pad and trip `overran`
                        self.marker = m;
                        return;
                    }
                    None => return,
                }
            }
        }
    }
}

fn decode_symbol(r: &mut BitReader<'_>, t: &HuffTable) -> Result<u8, DecodeError> {
    let peek8 = r.peek(8) as usize;
    let (sym, len) = t.lut[peek8];
    if len > 0 {
        r.drop_bits(len);
        return Ok(sym);
    }
    let peek16 = r.peek(16) as i32;
    for bits in 9..=16u8 {
        let code = peek16 >> (16 - bits);
        let max = t.maxcode[usize::from(bits)];
        if max >= 0 && code <= max {
            r.drop_bits(bits);
            let idx = i32::from(t.valptr[usize::from(bits)]) + code - t.mincode[usize::from(bits)];
            return t
                .values
                .get(idx as usize)
                .copied()
                .ok_or(DecodeError::InvalidCode);
        }
    }
    Err(DecodeError::InvalidCode)
}

/// Dequantized coefficients are held to the 16-bit range of an 8-bit
/// baseline codec so the IDCT sums stay inside `i32`
const COEF_LIMIT: i32 = i16::MAX as i32;

#[inline]
fn dequantize(value: i32, q: u16) -> i32 {
    value
        .wrapping_mul(i32::from(q))
        .clamp(-COEF_LIMIT, COEF_LIMIT)
}

#[inline]
fn extend(bits: u32, size: u8) -> i32 {
    let half = 1u32 << (u32::from(size) - 1);
    if bits < half {
        bits as i32 - ((1i32 << size) - 1)
    } else {
        bits as i32
    }
}

/// Decode one 8x8 block into dequantized natural-order coefficients
pub(crate) fn decode_block(
    r: &mut BitReader<'_>,
    dc_table: &HuffTable,
    ac_table: &HuffTable,
    dc_pred: &mut i32,
    quant: &[u16; 64],
    block: &mut [i32; 64],
) -> Result<(), DecodeError> {
    block.fill(0);

    let dc_size = decode_symbol(r, dc_table)?;
    if dc_size > 11 {
        return Err(DecodeError::InvalidCode);
    }
    if dc_size > 0 {
        let bits = r.read_bits(dc_size);
        *dc_pred = dc_pred.wrapping_add(extend(bits, dc_size));
    }
    block[0] = dequantize(*dc_pred, quant[0]);

    let mut k = 1usize;
    while k < 64 {
        let sym = decode_symbol(r, ac_table)?;
        let run = usize::from(sym >> 4);
        let size = sym & 0x0F;
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            // end of block
            break;
        }
        k += run;
        if k > 63 {
            return Err(DecodeError::CoefficientOverflow);
        }
        let val = extend(r.read_bits(size), size);
        block[ZIGZAG[k]] = dequantize(val, quant[k]);
        k += 1;
    }
    Ok(())
}
