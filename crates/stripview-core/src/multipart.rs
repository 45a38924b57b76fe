//! Streaming `multipart/form-data` field extraction
//!
//! The body arrives in network-sized chunks. The extractor forwards the
//! bytes of one named field as they arrive and holds back only a
//! delimiter-sized tail, so a 100 KiB upload never needs a second copy.

use alloc::vec::Vec;

use thiserror::Error;

/// Longest part header block accepted
pub const MAX_PART_HEADER_BYTES: usize = 1024;
/// Longest boundary allowed by RFC 2046
pub const MAX_BOUNDARY_LEN: usize = 70;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MultipartError {
    #[error("multipart boundary missing from Content-Type")]
    MissingBoundary,

    #[error("multipart field not found")]
    MissingField,

    #[error("multipart part headers too large")]
    HeadersTooLarge,

    #[error("malformed multipart body")]
    Malformed,

    #[error("multipart body ends inside the field")]
    Truncated,
}

/// Boundary parameter of a `multipart/form-data` Content-Type
pub fn boundary_from_content_type(content_type: &str) -> Result<&str, MultipartError> {
    let mut params = content_type.split(';');
    let mime = params.next().unwrap_or("").trim();
    if !mime.eq_ignore_ascii_case("multipart/form-data") {
        return Err(MultipartError::MissingBoundary);
    }
    for param in params {
        let Some((key, value)) = param.trim().split_once('=') else {
            continue;
        };
        if !key.trim().eq_ignore_ascii_case("boundary") {
            continue;
        }
        let value = value.trim();
        let value = value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
            .unwrap_or(value);
        if value.is_empty() || value.len() > MAX_BOUNDARY_LEN {
            return Err(MultipartError::MissingBoundary);
        }
        return Ok(value);
    }
    Err(MultipartError::MissingBoundary)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Preamble,
    AfterDelimiter,
    Headers,
    Body { emit: bool },
    Epilogue,
}

/// Incremental extractor for one named field
pub struct MultipartExtractor {
    delimiter: Vec<u8>,
    field: &'static str,
    state: State,
    pending: Vec<u8>,
    found: bool,
}

impl MultipartExtractor {
    pub fn new(boundary: &str, field: &'static str) -> Self {
        let mut delimiter = Vec::with_capacity(boundary.len() + 4);
        delimiter.extend_from_slice(b"\r\n--");
        delimiter.extend_from_slice(boundary.as_bytes());
        Self {
            delimiter,
            field,
            state: State::Preamble,
            // lets the opening delimiter match without a preceding CRLF
            pending: alloc::vec![b'\r', b'\n'],
            found: false,
        }
    }

    /// The field has been seen in full
    pub fn field_complete(&self) -> bool {
        self.found
    }

    /// Feed the next body chunk; field bytes are passed to `sink`
    pub fn feed<E, F>(&mut self, chunk: &[u8], mut sink: F) -> Result<(), E>
    where
        E: From<MultipartError>,
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        if self.state == State::Epilogue {
            return Ok(());
        }
        self.pending.extend_from_slice(chunk);
        while self.step(&mut sink)? {}
        Ok(())
    }

    /// Check the body ended cleanly after the field
    pub fn finish(&self) -> Result<(), MultipartError> {
        if self.found {
            return Ok(());
        }
        match self.state {
            State::Body { emit: true } => Err(MultipartError::Truncated),
            _ => Err(MultipartError::MissingField),
        }
    }

    /// Advance once; `Ok(true)` when more progress may be possible
    fn step<E, F>(&mut self, sink: &mut F) -> Result<bool, E>
    where
        E: From<MultipartError>,
        F: FnMut(&[u8]) -> Result<(), E>,
    {
        let keep = self.delimiter.len() - 1;
        match self.state {
            State::Preamble => match find(&self.pending, &self.delimiter) {
                Some(pos) => {
                    self.pending.drain(..pos + self.delimiter.len());
                    self.state = State::AfterDelimiter;
                    Ok(true)
                }
                None => {
                    let discard = self.pending.len().saturating_sub(keep);
                    self.pending.drain(..discard);
                    Ok(false)
                }
            },
            State::AfterDelimiter => {
                if self.pending.len() < 2 {
                    return Ok(false);
                }
                match &self.pending[..2] {
                    b"--" => {
                        self.state = State::Epilogue;
                        self.pending.clear();
                        Ok(false)
                    }
                    b"\r\n" => {
                        self.pending.drain(..2);
                        self.state = State::Headers;
                        Ok(true)
                    }
                    _ => Err(MultipartError::Malformed.into()),
                }
            }
            State::Headers => {
                if self.pending.starts_with(b"\r\n") {
                    self.pending.drain(..2);
                    self.state = State::Body { emit: false };
                    return Ok(true);
                }
                let Some(end) = find(&self.pending, b"\r\n\r\n") else {
                    if self.pending.len() > MAX_PART_HEADER_BYTES {
                        return Err(MultipartError::HeadersTooLarge.into());
                    }
                    return Ok(false);
                };
                if end > MAX_PART_HEADER_BYTES {
                    return Err(MultipartError::HeadersTooLarge.into());
                }
                let named = part_name(&self.pending[..end])? == Some(self.field);
                self.pending.drain(..end + 4);
                self.state = State::Body {
                    emit: named && !self.found,
                };
                Ok(true)
            }
            State::Body { emit } => match find(&self.pending, &self.delimiter) {
                Some(pos) => {
                    if emit {
                        sink(&self.pending[..pos])?;
                        self.found = true;
                    }
                    self.pending.drain(..pos + self.delimiter.len());
                    self.state = State::AfterDelimiter;
                    Ok(true)
                }
                None => {
                    let safe = self.pending.len().saturating_sub(keep);
                    if emit && safe > 0 {
                        sink(&self.pending[..safe])?;
                    }
                    self.pending.drain(..safe);
                    Ok(false)
                }
            },
            State::Epilogue => {
                self.pending.clear();
                Ok(false)
            }
        }
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// `name` parameter of the part's Content-Disposition header
fn part_name(headers: &[u8]) -> Result<Option<&str>, MultipartError> {
    let text = core::str::from_utf8(headers).map_err(|_| MultipartError::Malformed)?;
    for line in text.split("\r\n") {
        let Some((key, value)) = line.split_once(':') else {
            return Err(MultipartError::Malformed);
        };
        if !key.trim().eq_ignore_ascii_case("content-disposition") {
            continue;
        }
        for param in value.split(';').skip(1) {
            let Some((k, v)) = param.trim().split_once('=') else {
                continue;
            };
            if k.trim().eq_ignore_ascii_case("name") {
                let v = v.trim();
                return Ok(Some(
                    v.strip_prefix('"')
                        .and_then(|v| v.strip_suffix('"'))
                        .unwrap_or(v),
                ));
            }
        }
    }
    Ok(None)
}
