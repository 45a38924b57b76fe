//! Hand-assembled JPEG fixtures for unit tests

use alloc::vec::Vec;

/// Baseline greyscale JPEG of flat mid grey
///
/// Every block codes a zero DC difference and an immediate end-of-block, so
/// the scan is two bits per block.
pub(crate) fn grey_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut v = alloc::vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x43, 0x00];
    v.extend_from_slice(&[1u8; 64]);
    v.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 8]);
    v.extend_from_slice(&height.to_be_bytes());
    v.extend_from_slice(&width.to_be_bytes());
    v.extend_from_slice(&[1, 1, 0x11, 0]);
    let mut counts = [0u8; 16];
    counts[0] = 1;
    v.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x26, 0x00]);
    v.extend_from_slice(&counts);
    v.push(0x00);
    v.push(0x10);
    v.extend_from_slice(&counts);
    v.push(0x00);
    v.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);
    let blocks = usize::from(width.div_ceil(8)) * usize::from(height.div_ceil(8));
    v.extend(core::iter::repeat(0u8).take((blocks * 2).div_ceil(8)));
    v.extend_from_slice(&[0xFF, 0xD9]);
    v
}

/// Entropy bits packed MSB first with `0xFF` stuffing
#[derive(Default)]
pub(crate) struct ScanWriter {
    bytes: Vec<u8>,
    acc: u32,
    bits: u8,
}

impl ScanWriter {
    pub(crate) fn put(&mut self, value: u32, len: u8) {
        for i in (0..len).rev() {
            self.acc = (self.acc << 1) | ((value >> i) & 1);
            self.bits += 1;
            if self.bits == 8 {
                let b = self.acc as u8;
                self.bytes.push(b);
                if b == 0xFF {
                    self.bytes.push(0x00);
                }
                self.acc = 0;
                self.bits = 0;
            }
        }
    }

    /// Pad the last byte with ones
    pub(crate) fn finish(mut self) -> Vec<u8> {
        while self.bits != 0 {
            self.put(1, 1);
        }
        self.bytes
    }
}

/// Greyscale JPEG whose every AC coefficient is the largest 15-bit value,
/// quantized by 255
///
/// Legal syntax, nonsense content: the dequantized values are far beyond
/// anything an encoder emits for 8-bit samples.
pub(crate) fn saturated_jpeg(width: u16, height: u16) -> Vec<u8> {
    let mut v = alloc::vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x43, 0x00];
    v.extend_from_slice(&[255u8; 64]);
    v.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 8]);
    v.extend_from_slice(&height.to_be_bytes());
    v.extend_from_slice(&width.to_be_bytes());
    v.extend_from_slice(&[1, 1, 0x11, 0]);
    // DC: "0" -> size 0; AC: "0" -> run 0 size 15, "1" -> EOB
    let mut dc_counts = [0u8; 16];
    dc_counts[0] = 1;
    let mut ac_counts = [0u8; 16];
    ac_counts[0] = 2;
    v.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x27, 0x00]);
    v.extend_from_slice(&dc_counts);
    v.push(0x00);
    v.push(0x10);
    v.extend_from_slice(&ac_counts);
    v.extend_from_slice(&[0x0F, 0x00]);
    v.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);

    let blocks = u32::from(width.div_ceil(8)) * u32::from(height.div_ceil(8));
    let mut scan = ScanWriter::default();
    for _ in 0..blocks {
        scan.put(0, 1);
        for _ in 1..64 {
            scan.put(0, 1);
            scan.put(0x7FFF, 15);
        }
    }
    v.extend_from_slice(&scan.finish());
    v.extend_from_slice(&[0xFF, 0xD9]);
    v
}
