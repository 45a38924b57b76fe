//! `SVSTRIP1` strip container used by the host tooling
//!
//! ```text
//! magic "SVSTRIP1"
//! u16 width, u16 height, u16 strip_count, u16 strip_height   (big-endian)
//! u32 offset[strip_count]     relative to the start of strip data
//! strip data
//! ```

use alloc::vec::Vec;

use thiserror::Error;

pub const MAGIC: &[u8; 8] = b"SVSTRIP1";
/// Magic plus the four geometry fields
pub const FIXED_HEADER_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ContainerError {
    #[error("not a strip container")]
    BadMagic,

    #[error("container ends early")]
    Truncated,

    #[error("container holds no strips")]
    Empty,

    #[error("strip {0} offset is out of range")]
    BadOffset(usize),

    #[error("too many strips for the container format")]
    TooManyStrips,

    #[error("strip data exceeds 4 GiB")]
    TooLarge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContainerHeader {
    pub width: u16,
    pub height: u16,
    pub strip_count: u16,
    pub strip_height: u16,
}

/// Borrowed view of a parsed container
#[derive(Debug, Clone)]
pub struct StripContainer<'a> {
    header: ContainerHeader,
    offsets: Vec<u32>,
    data: &'a [u8],
}

fn be16(bytes: &[u8], at: usize) -> u16 {
    u16::from_be_bytes([bytes[at], bytes[at + 1]])
}

impl<'a> StripContainer<'a> {
    pub fn parse(bytes: &'a [u8]) -> Result<Self, ContainerError> {
        if bytes.len() < MAGIC.len() || &bytes[..MAGIC.len()] != MAGIC {
            return Err(ContainerError::BadMagic);
        }
        if bytes.len() < FIXED_HEADER_LEN {
            return Err(ContainerError::Truncated);
        }
        let header = ContainerHeader {
            width: be16(bytes, 8),
            height: be16(bytes, 10),
            strip_count: be16(bytes, 12),
            strip_height: be16(bytes, 14),
        };
        if header.strip_count == 0 {
            return Err(ContainerError::Empty);
        }

        let count = usize::from(header.strip_count);
        let table_end = FIXED_HEADER_LEN + count * 4;
        if bytes.len() < table_end {
            return Err(ContainerError::Truncated);
        }
        let offsets: Vec<u32> = bytes[FIXED_HEADER_LEN..table_end]
            .chunks_exact(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        let data = &bytes[table_end..];

        let mut previous = 0u32;
        for (i, &offset) in offsets.iter().enumerate() {
            if offset < previous || offset as usize > data.len() || (i == 0 && offset != 0) {
                return Err(ContainerError::BadOffset(i));
            }
            previous = offset;
        }

        Ok(Self {
            header,
            offsets,
            data,
        })
    }

    pub fn header(&self) -> ContainerHeader {
        self.header
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Bytes of strip `index`
    pub fn strip(&self, index: usize) -> Option<&'a [u8]> {
        let start = *self.offsets.get(index)? as usize;
        let end = self
            .offsets
            .get(index + 1)
            .map_or(self.data.len(), |&o| o as usize);
        self.data.get(start..end)
    }

    pub fn strips(&self) -> impl Iterator<Item = &'a [u8]> + '_ {
        (0..self.len()).filter_map(move |i| self.strip(i))
    }
}

/// Serialize strips into a container
pub fn build_container<S: AsRef<[u8]>>(
    width: u16,
    height: u16,
    strip_height: u16,
    strips: &[S],
) -> Result<Vec<u8>, ContainerError> {
    if strips.is_empty() {
        return Err(ContainerError::Empty);
    }
    let count = u16::try_from(strips.len()).map_err(|_| ContainerError::TooManyStrips)?;
    let total: usize = strips.iter().map(|s| s.as_ref().len()).sum();
    if u32::try_from(total).is_err() {
        return Err(ContainerError::TooLarge);
    }

    let mut out = Vec::with_capacity(FIXED_HEADER_LEN + strips.len() * 4 + total);
    out.extend_from_slice(MAGIC);
    for field in [width, height, count, strip_height] {
        out.extend_from_slice(&field.to_be_bytes());
    }
    let mut offset = 0u32;
    for strip in strips {
        out.extend_from_slice(&offset.to_be_bytes());
        offset += strip.as_ref().len() as u32;
    }
    for strip in strips {
        out.extend_from_slice(strip.as_ref());
    }
    Ok(out)
}
