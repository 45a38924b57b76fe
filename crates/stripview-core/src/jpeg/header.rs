//! Marker walker shared by preflight and the decoder

use super::decoder::Tables;
use super::{
    be_u16, Component, FrameInfo, HeaderError, ScanInfo, M_COM, M_DAC, M_DHT, M_DQT, M_DRI, M_EOI,
    M_RST0, M_RST7, M_SOF0, M_SOF2, M_SOI, M_SOS, M_TEM,
};

/// Everything known once the start-of-scan segment has been read
#[derive(Debug, Clone, Copy)]
pub(crate) struct Header {
    pub frame: FrameInfo,
    pub scan: ScanInfo,
    pub restart_interval: u16,
    /// Offset of the first entropy-coded byte
    pub scan_start: usize,
}

pub(crate) enum Parsed {
    /// `data` ends before the start of scan
    Incomplete,
    Complete(Header),
    /// An APPn or COM segment spans `start..end` of the stream; `end` may
    /// lie past the data seen so far
    Metadata { start: usize, end: usize },
}

/// What to do with APPn and COM segments
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetadataSegments {
    /// Step over them by length
    Skip,
    /// Stop and report the first one
    Report,
}

/// Walk marker segments from just past SOI up to and including SOS
///
/// With `tables` set, quantization and Huffman tables are loaded as they
/// are met; without, they are skipped by length. Unsupported encodings are
/// reported as soon as their segment is seen, even if the rest of the
/// header has not arrived yet.
pub(crate) fn parse_header(
    data: &[u8],
    tables: Option<&mut Tables>,
) -> Result<Parsed, HeaderError> {
    walk_header(data, tables, MetadataSegments::Skip)
}

/// [`parse_header`] with a choice of how metadata segments are handled
pub(crate) fn walk_header(
    data: &[u8],
    mut tables: Option<&mut Tables>,
    metadata: MetadataSegments,
) -> Result<Parsed, HeaderError> {
    if data.len() < 2 {
        if data.first().is_some_and(|&b| b != 0xFF) {
            return Err(HeaderError::NotJpeg);
        }
        return Ok(Parsed::Incomplete);
    }
    if data[0] != 0xFF || data[1] != M_SOI {
        return Err(HeaderError::NotJpeg);
    }

    let len = data.len();
    let mut pos = 2usize;
    let mut frame: Option<FrameInfo> = None;
    let mut restart_interval = 0u16;

    loop {
        if pos >= len {
            return Ok(Parsed::Incomplete);
        }
        if data[pos] != 0xFF {
            return Err(HeaderError::Malformed("expected marker"));
        }
        let start = pos;
        while pos < len && data[pos] == 0xFF {
            pos += 1;
        }
        if pos >= len {
            return Ok(Parsed::Incomplete);
        }
        let marker = data[pos];
        pos += 1;

        match marker {
            M_TEM | M_RST0..=M_RST7 => continue,
            M_SOI => return Err(HeaderError::Malformed("nested SOI")),
            M_EOI => return Err(HeaderError::NoScan),
            0x00 => return Err(HeaderError::Malformed("stuffed byte outside scan")),
            _ => {}
        }

        if pos + 2 > len {
            return Ok(Parsed::Incomplete);
        }
        let seg = usize::from(be_u16(data, pos));
        if seg < 2 {
            return Err(HeaderError::Malformed("segment length"));
        }
        if metadata == MetadataSegments::Report && is_metadata(marker) {
            return Ok(Parsed::Metadata {
                start,
                end: pos + seg,
            });
        }
        if pos + seg > len {
            // segments we reject are decided from their first bytes
            if marker != M_SOF0 && is_start_of_frame(marker) {
                return Err(reject_process(marker));
            }
            return Ok(Parsed::Incomplete);
        }
        let body = &data[pos + 2..pos + seg];

        match marker {
            M_SOF0 => {
                if frame.is_some() {
                    return Err(HeaderError::Malformed("multiple frames"));
                }
                frame = Some(parse_frame(body)?);
            }
            m if is_start_of_frame(m) => return Err(reject_process(m)),
            M_DQT => parse_quant(body, tables.as_deref_mut())?,
            M_DHT => {
                if let Some(tables) = tables.as_deref_mut() {
                    parse_huffman(body, tables)?;
                }
            }
            M_DRI => {
                if body.len() < 2 {
                    return Err(HeaderError::Malformed("DRI length"));
                }
                restart_interval = be_u16(body, 0);
            }
            M_SOS => {
                let frame = frame.ok_or(HeaderError::Malformed("scan before frame"))?;
                let scan = parse_scan(body, &frame)?;
                return Ok(Parsed::Complete(Header {
                    frame,
                    scan,
                    restart_interval,
                    scan_start: pos + seg,
                }));
            }
            // APPn, COM, DNL and friends
            _ => {}
        }
        pos += seg;
    }
}

fn is_metadata(marker: u8) -> bool {
    matches!(marker, 0xE0..=0xEF | M_COM)
}

fn is_start_of_frame(marker: u8) -> bool {
    matches!(marker, 0xC0..=0xCF) && marker != M_DHT && marker != 0xC8 && marker != M_DAC
}

fn reject_process(marker: u8) -> HeaderError {
    match marker {
        M_SOF2 => HeaderError::Progressive,
        m => HeaderError::UnsupportedProcess(m),
    }
}

fn parse_frame(body: &[u8]) -> Result<FrameInfo, HeaderError> {
    if body.len() < 6 {
        return Err(HeaderError::Malformed("SOF length"));
    }
    let precision = body[0];
    if precision != 8 {
        return Err(HeaderError::Precision(precision));
    }
    let height = be_u16(body, 1);
    let width = be_u16(body, 3);
    let count = body[5];
    if count != 1 && count != 3 {
        return Err(HeaderError::ComponentCount(count));
    }
    if body.len() < 6 + usize::from(count) * 3 {
        return Err(HeaderError::Malformed("SOF length"));
    }
    if width == 0 || height == 0 {
        return Err(HeaderError::ZeroDimension);
    }

    let mut components = [Component::default(); 3];
    for (i, comp) in components.iter_mut().take(usize::from(count)).enumerate() {
        let off = 6 + i * 3;
        let sampling = body[off + 1];
        *comp = Component {
            id: body[off],
            h: sampling >> 4,
            v: sampling & 0x0F,
            quant_table: body[off + 2],
        };
        if comp.quant_table > 3 {
            return Err(HeaderError::Malformed("quantization table id"));
        }
        if comp.h == 0 || comp.v == 0 {
            return Err(HeaderError::Malformed("zero sampling factor"));
        }
    }

    let (max_h, max_v) = if count == 1 {
        (1, 1)
    } else {
        let luma = components[0];
        if !matches!((luma.h, luma.v), (1, 1) | (2, 1) | (2, 2)) {
            return Err(HeaderError::Sampling {
                component: 0,
                h: luma.h,
                v: luma.v,
            });
        }
        for (i, chroma) in components.iter().enumerate().skip(1) {
            if (chroma.h, chroma.v) != (1, 1) {
                return Err(HeaderError::Sampling {
                    component: i as u8,
                    h: chroma.h,
                    v: chroma.v,
                });
            }
        }
        (luma.h, luma.v)
    };

    Ok(FrameInfo {
        width,
        height,
        component_count: count,
        components,
        max_h,
        max_v,
    })
}

fn parse_scan(body: &[u8], frame: &FrameInfo) -> Result<ScanInfo, HeaderError> {
    let count = *body.first().ok_or(HeaderError::Malformed("SOS length"))?;
    if count != frame.component_count {
        return Err(HeaderError::MultiScan);
    }
    let n = usize::from(count);
    if body.len() < 1 + n * 2 + 3 {
        return Err(HeaderError::Malformed("SOS length"));
    }

    let mut scan = ScanInfo {
        count,
        ..ScanInfo::default()
    };
    for i in 0..n {
        let id = body[1 + i * 2];
        let selectors = body[2 + i * 2];
        let ci = frame.components[..usize::from(frame.component_count)]
            .iter()
            .position(|c| c.id == id)
            .ok_or(HeaderError::Malformed("scan references unknown component"))?;
        let (dc, ac) = (selectors >> 4, selectors & 0x0F);
        if dc > 1 || ac > 1 {
            return Err(HeaderError::Malformed("Huffman table id"));
        }
        scan.order[i] = ci as u8;
        scan.dc_table[i] = dc;
        scan.ac_table[i] = ac;
    }

    let spectral = &body[1 + n * 2..];
    if spectral[0] != 0 || spectral[1] != 63 || spectral[2] != 0 {
        return Err(HeaderError::Malformed("baseline scan must cover every coefficient"));
    }
    Ok(scan)
}

fn parse_quant(mut body: &[u8], mut tables: Option<&mut Tables>) -> Result<(), HeaderError> {
    while let Some((&info, rest)) = body.split_first() {
        let id = usize::from(info & 0x0F);
        if id > 3 {
            return Err(HeaderError::Malformed("quantization table id"));
        }
        match info >> 4 {
            0 => {}
            1 => return Err(HeaderError::WideQuantTable),
            _ => return Err(HeaderError::Malformed("quantization precision")),
        }
        let Some(entries) = rest.get(..64) else {
            return Err(HeaderError::Malformed("DQT length"));
        };
        if let Some(tables) = tables.as_deref_mut() {
            let values: [u16; 64] = core::array::from_fn(|i| u16::from(entries[i]));
            tables.set_quant(id, &values);
        }
        body = &rest[64..];
    }
    Ok(())
}

fn parse_huffman(mut body: &[u8], tables: &mut Tables) -> Result<(), HeaderError> {
    while !body.is_empty() {
        if body.len() < 17 {
            return Err(HeaderError::Malformed("DHT length"));
        }
        let class = body[0] >> 4;
        let id = usize::from(body[0] & 0x0F);
        if class > 1 || id > 1 {
            return Err(HeaderError::Malformed("Huffman table id"));
        }
        let mut counts = [0u8; 16];
        counts.copy_from_slice(&body[1..17]);
        let total: usize = counts.iter().map(|&c| usize::from(c)).sum();
        if total > 256 || body.len() < 17 + total {
            return Err(HeaderError::Malformed("DHT length"));
        }
        tables.set_huffman(class, id, &counts, &body[17..17 + total])?;
        body = &body[17 + total..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    // SOI, SOF0 16x8 YCbCr 2x1, SOS, no tables
    fn minimal_header(luma_sampling: u8) -> alloc::vec::Vec<u8> {
        let mut v = alloc::vec![0xFF, 0xD8];
        v.extend_from_slice(&[0xFF, 0xE0, 0x00, 0x04, 0xAA, 0xBB]);
        v.extend_from_slice(&[
            0xFF, 0xC0, 0x00, 0x11, 8, 0x00, 0x08, 0x00, 0x10, 3, 1, luma_sampling, 0, 2, 0x11,
            1, 3, 0x11, 1,
        ]);
        v.extend_from_slice(&[
            0xFF, 0xDA, 0x00, 0x0C, 3, 1, 0x00, 2, 0x11, 3, 0x11, 0, 63, 0,
        ]);
        v
    }

    #[test]
    fn walks_to_start_of_scan() {
        let data = minimal_header(0x21);
        let Parsed::Complete(header) = parse_header(&data, None).unwrap() else {
            panic!("header should be complete");
        };
        assert_eq!(header.frame.width, 16);
        assert_eq!(header.frame.height, 8);
        assert_eq!((header.frame.max_h, header.frame.max_v), (2, 1));
        assert_eq!(header.scan.count, 3);
        assert_eq!(header.scan.dc_table, [0, 1, 1]);
        assert_eq!(header.scan_start, data.len());
    }

    #[test]
    fn every_prefix_is_incomplete_not_an_error() {
        let data = minimal_header(0x22);
        for end in 0..data.len() {
            assert!(
                matches!(parse_header(&data[..end], None), Ok(Parsed::Incomplete)),
                "prefix of {end} bytes"
            );
        }
    }

    #[test]
    fn rejects_unsupported_luma_sampling() {
        let data = minimal_header(0x12);
        assert_eq!(
            parse_header(&data, None).err(),
            Some(HeaderError::Sampling {
                component: 0,
                h: 1,
                v: 2
            })
        );
    }

    #[test]
    fn progressive_is_reported_before_segment_completes() {
        let data = [0xFF, 0xD8, 0xFF, 0xC2, 0x00, 0x11, 8];
        assert_eq!(
            parse_header(&data, None).err(),
            Some(HeaderError::Progressive)
        );
    }

    #[test]
    fn arithmetic_and_lossless_are_unsupported() {
        for marker in [0xC1, 0xC3, 0xC9, 0xCB] {
            let data = [0xFF, 0xD8, 0xFF, marker, 0x00, 0x11];
            assert_eq!(
                parse_header(&data, None).err(),
                Some(HeaderError::UnsupportedProcess(marker))
            );
        }
    }

    #[test]
    fn missing_soi_is_not_jpeg() {
        assert_eq!(
            parse_header(b"\x89PNG", None).err(),
            Some(HeaderError::NotJpeg)
        );
        assert_eq!(parse_header(b"G", None).err(), Some(HeaderError::NotJpeg));
    }

    #[test]
    fn wide_quant_table_is_rejected_without_loading_tables() {
        let mut data = alloc::vec![0xFF, 0xD8, 0xFF, 0xDB, 0x00, 0x83, 0x10];
        data.extend_from_slice(&[0xFF; 128]);
        assert_eq!(
            parse_header(&data, None).err(),
            Some(HeaderError::WideQuantTable)
        );
    }

    #[test]
    fn metadata_is_reported_before_its_body_arrives() {
        let data = [0xFF, 0xD8, 0xFF, 0xE2, 0x0B, 0xB8, 0x49, 0x43];
        assert!(matches!(
            walk_header(&data, None, MetadataSegments::Report),
            Ok(Parsed::Metadata { start: 2, end: 3004 })
        ));
        assert!(matches!(parse_header(&data, None), Ok(Parsed::Incomplete)));
    }

    #[test]
    fn partial_scan_is_multi_scan() {
        let mut data = minimal_header(0x11);
        let sos = data.len() - 14;
        // one component in the scan instead of three
        data.truncate(sos);
        data.extend_from_slice(&[0xFF, 0xDA, 0x00, 0x08, 1, 1, 0x00, 0, 63, 0]);
        assert_eq!(parse_header(&data, None).err(), Some(HeaderError::MultiScan));
    }
}
