//! JPEG payloads for scenarios, encoded with the prep tool's encoder

use image::{Rgb, RgbImage};
use stripview_prep::{encode_jpeg, encode_strips};

pub const STRIP_HEIGHT: u16 = 40;
pub const QUALITY: u8 = 90;

/// Smooth colour ramp across the whole frame
pub fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(2).saturating_sub(1)) as u8,
            (y * 255 / height.max(2).saturating_sub(1)) as u8,
            ((x + y) % 256) as u8,
        ])
    })
}

/// Mid grey with deterministic per-pixel noise of up to `amplitude`
pub fn noise(width: u32, height: u32, amplitude: u8, seed: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        let mut px = [0u8; 3];
        for (c, out) in px.iter_mut().enumerate() {
            let h = hash(x, y, seed.wrapping_add(c as u32));
            let offset = (h % (u32::from(amplitude) + 1)) as i32 - i32::from(amplitude / 2);
            *out = (128 + offset).clamp(0, 255) as u8;
        }
        Rgb(px)
    })
}

fn hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = x.wrapping_mul(374_761_393) ^ y.wrapping_mul(668_265_263) ^ seed;
    h = (h ^ (h >> 13)).wrapping_mul(1_274_126_177);
    h ^ (h >> 16)
}

pub fn jpeg(img: &RgbImage) -> Vec<u8> {
    encode_jpeg(img, QUALITY).expect("fixture encode")
}

pub fn strips(img: &RgbImage, strip_height: u16) -> Vec<Vec<u8>> {
    encode_strips(img, strip_height, QUALITY).expect("fixture strip encode")
}

/// Offset of the SOF0 marker, walking segments from SOI
pub fn sof_offset(jpeg: &[u8]) -> Option<usize> {
    let mut i = 2;
    while i + 4 <= jpeg.len() {
        if jpeg[i] != 0xFF {
            return None;
        }
        let marker = jpeg[i + 1];
        if marker == 0xC0 {
            return Some(i);
        }
        let len = usize::from(u16::from_be_bytes([jpeg[i + 2], jpeg[i + 3]]));
        i += 2 + len;
    }
    None
}

/// Relabel a baseline frame as progressive
pub fn as_progressive(jpeg: &[u8]) -> Vec<u8> {
    let mut out = jpeg.to_vec();
    let at = sof_offset(&out).expect("baseline SOF0");
    out[at + 1] = 0xC2;
    out
}

/// Give component `component` (0-based) the sampling byte `hv`
pub fn with_sampling(jpeg: &[u8], component: usize, hv: u8) -> Vec<u8> {
    let mut out = jpeg.to_vec();
    let at = sof_offset(&out).expect("baseline SOF0");
    // marker(2) len(2) precision(1) height(2) width(2) count(1), then id/hv/tq
    out[at + 10 + component * 3 + 1] = hv;
    out
}

/// `multipart/form-data` body carrying one file field
pub fn multipart_body(boundary: &str, field: &str, payload: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"image.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    body
}

/// Insert an APPn segment of `body_len` filler bytes right after SOI
pub fn with_app_segment(jpeg: &[u8], n: u8, body_len: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(jpeg.len() + usize::from(body_len) + 4);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE0 | (n & 0x0F)]);
    out.extend_from_slice(&(body_len + 2).to_be_bytes());
    out.extend((0..body_len).map(|i| (i % 251) as u8));
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Greyscale baseline strip whose every AC coefficient is the largest
/// 15-bit magnitude, under a quantization table of all-maximum steps
///
/// With `wide_quant` the table is written with 16-bit entries (65535),
/// otherwise with 8-bit ones (255).
pub fn saturated_strip(width: u16, rows: u16, wide_quant: bool) -> Vec<u8> {
    let mut v = vec![0xFF, 0xD8, 0xFF, 0xDB];
    if wide_quant {
        v.extend_from_slice(&[0x00, 0x83, 0x10]);
        v.extend_from_slice(&[0xFF; 128]);
    } else {
        v.extend_from_slice(&[0x00, 0x43, 0x00]);
        v.extend_from_slice(&[0xFF; 64]);
    }
    v.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x0B, 8]);
    v.extend_from_slice(&rows.to_be_bytes());
    v.extend_from_slice(&width.to_be_bytes());
    v.extend_from_slice(&[1, 1, 0x11, 0]);

    // DC class: one 1-bit code for "no difference"; AC class: "0" is
    // run 0 / size 15, "1" is end of block
    let mut counts = [0u8; 16];
    counts[0] = 1;
    v.extend_from_slice(&[0xFF, 0xC4, 0x00, 0x27, 0x00]);
    v.extend_from_slice(&counts);
    v.push(0x00);
    counts[0] = 2;
    v.push(0x10);
    v.extend_from_slice(&counts);
    v.extend_from_slice(&[0x0F, 0x00]);
    v.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);

    let mut bits = BitSink::default();
    let blocks = u32::from(width.div_ceil(8)) * u32::from(rows.div_ceil(8));
    for _ in 0..blocks {
        bits.put(0, 1);
        for _ in 1..64 {
            bits.put(0x7FFF, 16);
        }
    }
    v.extend_from_slice(&bits.finish());
    v.extend_from_slice(&[0xFF, 0xD9]);
    v
}

/// MSB-first bit packer with `0xFF 0x00` stuffing
#[derive(Default)]
struct BitSink {
    out: Vec<u8>,
    acc: u8,
    used: u8,
}

impl BitSink {
    fn put(&mut self, value: u32, len: u8) {
        for shift in (0..len).rev() {
            self.acc = (self.acc << 1) | ((value >> shift) & 1) as u8;
            self.used += 1;
            if self.used == 8 {
                self.out.push(self.acc);
                if self.acc == 0xFF {
                    self.out.push(0x00);
                }
                self.acc = 0;
                self.used = 0;
            }
        }
    }

    fn finish(mut self) -> Vec<u8> {
        while self.used != 0 {
            self.put(1, 1);
        }
        self.out
    }
}
