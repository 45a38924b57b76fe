//! RGB888 to panel-native 565 packing

/// Channel layout of the 16-bit words sent to the panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PixelOrder {
    /// Red in bits 15..11
    Rgb565,
    /// Blue in bits 15..11 (this module's glass)
    #[default]
    Bgr565,
}

impl PixelOrder {
    /// Pack one RGB888 triple
    #[inline]
    pub fn pack(self, r: u8, g: u8, b: u8) -> u16 {
        let (hi, lo) = match self {
            PixelOrder::Rgb565 => (r, b),
            PixelOrder::Bgr565 => (b, r),
        };
        (u16::from(hi & 0xF8) << 8) | (u16::from(g & 0xFC) << 3) | u16::from(lo >> 3)
    }

    /// Pack a run of interleaved RGB888 pixels into `dst`
    ///
    /// Converts `min(src.len() / 3, dst.len())` pixels and returns that count.
    pub fn pack_run(self, src: &[u8], dst: &mut [u16]) -> usize {
        let mut n = 0;
        for (px, out) in src.chunks_exact(3).zip(dst.iter_mut()) {
            *out = self.pack(px[0], px[1], px[2]);
            n += 1;
        }
        n
    }
}

impl From<st7789::ColorOrder> for PixelOrder {
    fn from(order: st7789::ColorOrder) -> Self {
        match order {
            st7789::ColorOrder::Rgb => PixelOrder::Rgb565,
            st7789::ColorOrder::Bgr => PixelOrder::Bgr565,
        }
    }
}
