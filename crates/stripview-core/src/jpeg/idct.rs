//! Integer inverse DCT (IJG "islow", 13-bit constants)

const CONST_BITS: i32 = 13;
const PASS1_BITS: i32 = 2;

const F0298: i32 = 2446;
const F0390: i32 = 3196;
const F0541: i32 = 4433;
const F0765: i32 = 6270;
const F0899: i32 = 7373;
const F1175: i32 = 9633;
const F1501: i32 = 12299;
const F1847: i32 = 15137;
const F1961: i32 = 16069;
const F2053: i32 = 16819;
const F2562: i32 = 20995;
const F3072: i32 = 25172;

/// Even/odd butterfly of one 8-point row or column
///
/// Returns outputs 0..8 before descaling. In-range coefficients never wrap;
/// corrupt ones produce garbage samples rather than a panic.
#[inline]
fn butterfly(d: [i32; 8]) -> [i32; 8] {
    let [d0, d1, d2, d3, d4, d5, d6, d7] = d;

    let z1 = d2.wrapping_add(d6).wrapping_mul(F0541);
    let tmp2 = z1.wrapping_add(d6.wrapping_mul(-F1847));
    let tmp3 = z1.wrapping_add(d2.wrapping_mul(F0765));
    let tmp0 = d0.wrapping_add(d4).wrapping_shl(CONST_BITS as u32);
    let tmp1 = d0.wrapping_sub(d4).wrapping_shl(CONST_BITS as u32);
    let (t10, t13) = (tmp0.wrapping_add(tmp3), tmp0.wrapping_sub(tmp3));
    let (t11, t12) = (tmp1.wrapping_add(tmp2), tmp1.wrapping_sub(tmp2));

    let (z1, z2) = (d7.wrapping_add(d1), d5.wrapping_add(d3));
    let (z3, z4) = (d7.wrapping_add(d3), d5.wrapping_add(d1));
    let z5 = z3.wrapping_add(z4).wrapping_mul(F1175);
    let s1 = z1.wrapping_mul(-F0899);
    let s2 = z2.wrapping_mul(-F2562);
    let s3 = z3.wrapping_mul(-F1961).wrapping_add(z5);
    let s4 = z4.wrapping_mul(-F0390).wrapping_add(z5);
    let o0 = d7.wrapping_mul(F0298).wrapping_add(s1).wrapping_add(s3);
    let o1 = d5.wrapping_mul(F2053).wrapping_add(s2).wrapping_add(s4);
    let o2 = d3.wrapping_mul(F3072).wrapping_add(s2).wrapping_add(s3);
    let o3 = d1.wrapping_mul(F1501).wrapping_add(s1).wrapping_add(s4);

    [
        t10.wrapping_add(o3),
        t11.wrapping_add(o2),
        t12.wrapping_add(o1),
        t13.wrapping_add(o0),
        t13.wrapping_sub(o0),
        t12.wrapping_sub(o1),
        t11.wrapping_sub(o2),
        t10.wrapping_sub(o3),
    ]
}

/// Dequantized coefficients (natural order) to level-shifted 8-bit samples
pub(crate) fn idct(block: &[i32; 64], out: &mut [u8; 64]) {
    let mut ws = [0i32; 64];

    for row in 0..8 {
        let b = row * 8;
        let mut d = [0i32; 8];
        d.copy_from_slice(&block[b..b + 8]);
        if d[1..].iter().all(|&v| v == 0) {
            ws[b..b + 8].fill(d[0].wrapping_shl(PASS1_BITS as u32));
            continue;
        }
        for (w, v) in ws[b..b + 8].iter_mut().zip(butterfly(d)) {
            *w = descale(v, CONST_BITS - PASS1_BITS);
        }
    }

    for col in 0..8 {
        let d: [i32; 8] = core::array::from_fn(|i| ws[col + i * 8]);
        if d[1..].iter().all(|&v| v == 0) {
            let v = clamp(descale(d[0], PASS1_BITS + 3).saturating_add(128));
            for i in 0..8 {
                out[col + i * 8] = v;
            }
            continue;
        }
        for (i, v) in butterfly(d).into_iter().enumerate() {
            out[col + i * 8] = clamp(descale(v, CONST_BITS + PASS1_BITS + 3).saturating_add(128));
        }
    }
}

#[inline]
fn descale(x: i32, n: i32) -> i32 {
    x.wrapping_add(1 << (n - 1)) >> n
}

#[inline]
fn clamp(x: i32) -> u8 {
    x.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_block_is_mid_grey() {
        let mut out = [0u8; 64];
        idct(&[0; 64], &mut out);
        assert!(out.iter().all(|&v| v == 128));
    }

    #[test]
    fn dc_only_block_is_flat() {
        let mut block = [0i32; 64];
        // DC of 80 lifts every sample by 80 / 8
        block[0] = 80;
        let mut out = [0u8; 64];
        idct(&block, &mut out);
        assert!(out.iter().all(|&v| v == 138), "{out:?}");
    }

    #[test]
    fn output_is_clamped() {
        let mut block = [0i32; 64];
        block[0] = 4000;
        let mut out = [0u8; 64];
        idct(&block, &mut out);
        assert!(out.iter().all(|&v| v == 255));
    }

    #[test]
    fn extreme_coefficients_wrap_instead_of_overflowing() {
        for fill in [i16::MAX as i32, i16::MIN as i32 + 1] {
            let mut block = [fill; 64];
            block[9] = -fill;
            let mut out = [0u8; 64];
            idct(&block, &mut out);
        }
        let mut block = [i32::MAX; 64];
        block[1] = i32::MIN;
        let mut out = [7u8; 64];
        idct(&block, &mut out);
    }

    #[test]
    fn horizontal_frequency_varies_across_columns_only() {
        let mut block = [0i32; 64];
        block[1] = 200;
        let mut out = [0u8; 64];
        idct(&block, &mut out);
        for row in 1..8 {
            assert_eq!(out[row * 8..row * 8 + 8], out[..8]);
        }
        assert!(out[0] > out[7]);
    }
}
