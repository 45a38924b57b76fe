//! The single upload session

use crate::assembler::StripAssembler;
use crate::color::PixelOrder;
use crate::error::{ImageError, ValidationError};
use crate::jpeg::{preflight_step, HeaderProgress};
use crate::memory::{TrackedBuffer, WorkingSet};

/// Bytes of JPEG header held before the payload buffer is allocated
///
/// APPn and COM segments are dropped as they stream past, so only the
/// frame, table and scan headers count against this.
pub const HEADER_WINDOW_BYTES: usize = 2048;

/// How the payload is held while it arrives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestMode {
    /// Whole JPEG buffered, decoded once complete
    SingleBuffer,
    /// One strip per request, decoded and released immediately
    StripStreaming,
}

/// Names one session; stale handles are refused after the session ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionHandle(u32);

impl SessionHandle {
    pub(crate) fn new(generation: u32) -> Self {
        Self(generation)
    }

    pub fn generation(self) -> u32 {
        self.0
    }
}

/// Fixed inline buffer for the start of a single-shot payload
struct HeaderWindow {
    bytes: [u8; HEADER_WINDOW_BYTES],
    len: usize,
    /// Metadata bytes still to be discarded from the stream
    skip: usize,
}

impl HeaderWindow {
    const fn new() -> Self {
        Self {
            bytes: [0; HEADER_WINDOW_BYTES],
            len: 0,
            skip: 0,
        }
    }

    /// Copy as much of `data` as fits; returns the count taken
    fn push(&mut self, data: &[u8]) -> usize {
        let n = data.len().min(HEADER_WINDOW_BYTES - self.len);
        self.bytes[self.len..self.len + n].copy_from_slice(&data[..n]);
        self.len += n;
        n
    }

    /// Discard the pending skip from the front of `data`
    fn skip_from<'a>(&mut self, data: &'a [u8]) -> &'a [u8] {
        let n = self.skip.min(data.len());
        self.skip -= n;
        &data[n..]
    }

    /// Cut stream bytes `start..end` out of the window, deferring whatever
    /// has not arrived yet
    fn drop_segment(&mut self, start: usize, end: usize) {
        if end <= self.len {
            self.bytes.copy_within(end..self.len, start);
            self.len -= end - start;
        } else {
            self.skip = end - self.len;
            self.len = start;
        }
    }

    fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    fn is_full(&self) -> bool {
        self.len == HEADER_WINDOW_BYTES
    }
}

/// State of the upload in progress
pub struct UploadSession {
    handle: SessionHandle,
    mode: IngestMode,
    declared_total_size: usize,
    received_bytes: usize,
    assembler: StripAssembler,
    window: HeaderWindow,
    working_buffer: Option<TrackedBuffer>,
    strip_in_flight: bool,
    opened_at: u64,
    last_activity: u64,
}

impl UploadSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn open(
        handle: SessionHandle,
        mode: IngestMode,
        declared_total_size: usize,
        width: u16,
        height: u16,
        expected_strips: Option<u32>,
        meter: &WorkingSet,
        order: PixelOrder,
        now_ms: u64,
    ) -> Self {
        Self {
            handle,
            mode,
            declared_total_size,
            received_bytes: 0,
            assembler: StripAssembler::new(meter, order, width, height, expected_strips),
            window: HeaderWindow::new(),
            working_buffer: None,
            strip_in_flight: false,
            opened_at: now_ms,
            last_activity: now_ms,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn mode(&self) -> IngestMode {
        self.mode
    }

    pub fn declared_total_size(&self) -> usize {
        self.declared_total_size
    }

    pub fn received_bytes(&self) -> usize {
        self.received_bytes
    }

    pub fn image_width(&self) -> u16 {
        self.assembler.width()
    }

    pub fn image_height(&self) -> u16 {
        self.assembler.height()
    }

    pub fn next_expected_strip_index(&self) -> u32 {
        self.assembler.next_index()
    }

    pub fn current_row_offset(&self) -> u16 {
        self.assembler.row_offset()
    }

    /// Rows on the panel, including a buffered image part way through decode
    pub fn rows_painted(&self) -> u16 {
        self.assembler.rows_painted()
    }

    pub fn opened_at(&self) -> u64 {
        self.opened_at
    }

    pub fn last_activity(&self) -> u64 {
        self.last_activity
    }

    pub(crate) fn touch(&mut self, now_ms: u64) {
        self.last_activity = now_ms;
    }

    pub(crate) fn assembler_mut(&mut self) -> &mut StripAssembler {
        &mut self.assembler
    }

    pub(crate) fn strip_in_flight(&self) -> bool {
        self.strip_in_flight
    }

    pub(crate) fn set_strip_in_flight(&mut self, in_flight: bool) {
        self.strip_in_flight = in_flight;
    }

    pub(crate) fn count_received(&mut self, bytes: usize) {
        self.received_bytes += bytes;
    }

    /// Payload buffer has been committed
    pub fn has_working_buffer(&self) -> bool {
        self.working_buffer.is_some()
    }

    /// Append single-shot payload bytes
    ///
    /// Bytes go to the header window until the header validates; only then is
    /// the payload buffer allocated, sized to the declared length. Metadata
    /// segments ahead of the scan never reach the buffer.
    pub(crate) fn append_image_bytes(
        &mut self,
        chunk: &[u8],
        meter: &WorkingSet,
        max_image_size: usize,
    ) -> Result<(), ImageError> {
        self.received_bytes += chunk.len();
        if self.received_bytes > max_image_size {
            return Err(ValidationError::TooLarge {
                size: self.received_bytes,
                limit: max_image_size,
            }
            .into());
        }

        if let Some(buffer) = self.working_buffer.as_mut() {
            return buffer.extend_from_slice(chunk);
        }

        let mut rest = chunk;
        let frame = loop {
            rest = self.window.skip_from(rest);
            if self.window.skip > 0 {
                return Ok(());
            }
            let taken = self.window.push(rest);
            rest = &rest[taken..];
            match preflight_step(self.window.as_slice())? {
                HeaderProgress::Frame(frame) => break frame,
                HeaderProgress::Metadata { start, end } => self.window.drop_segment(start, end),
                HeaderProgress::NeedMore if self.window.is_full() => {
                    return Err(ValidationError::HeaderTooLarge(HEADER_WINDOW_BYTES).into());
                }
                HeaderProgress::NeedMore => return Ok(()),
            }
        };

        let (width, height) = (self.image_width(), self.image_height());
        if frame.width != width || frame.height != height {
            return Err(ValidationError::FrameSize {
                width: frame.width,
                height: frame.height,
                expected_width: width,
                expected_height: height,
            }
            .into());
        }

        let capacity = self.declared_total_size.min(max_image_size);
        let mut buffer = TrackedBuffer::with_capacity(meter, capacity)?;
        buffer.extend_from_slice(self.window.as_slice())?;
        buffer.extend_from_slice(rest)?;
        self.working_buffer = Some(buffer);
        Ok(())
    }

    /// Validate that a complete single-shot payload arrived
    pub(crate) fn finish_image(&self) -> Result<(), ImageError> {
        if self.working_buffer.is_some() {
            return Ok(());
        }
        if self.received_bytes == 0 {
            return Err(ValidationError::Empty.into());
        }
        // the header window never reached the start of scan
        Err(ValidationError::Header(crate::jpeg::HeaderError::Truncated).into())
    }

    pub(crate) fn take_working_buffer(&mut self) -> Option<TrackedBuffer> {
        self.working_buffer.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jpeg::HeaderError;

    fn single(meter: &WorkingSet, declared: usize) -> UploadSession {
        UploadSession::open(
            SessionHandle::new(1),
            IngestMode::SingleBuffer,
            declared,
            16,
            8,
            Some(1),
            meter,
            PixelOrder::Bgr565,
            0,
        )
    }

    #[test]
    fn bad_magic_fails_before_buffer_allocation() {
        let meter = WorkingSet::new();
        let mut session = single(&meter, 1000);
        let before = meter.peak();
        assert_eq!(
            session.append_image_bytes(b"\x89PNG\r\n", &meter, 1000),
            Err(ImageError::Validation(ValidationError::Header(
                HeaderError::NotJpeg
            )))
        );
        assert!(!session.has_working_buffer());
        assert_eq!(meter.peak(), before);
    }

    #[test]
    fn oversized_stream_is_rejected() {
        let meter = WorkingSet::new();
        let mut session = single(&meter, 10);
        session.append_image_bytes(&[0xFF, 0xD8], &meter, 4).unwrap();
        assert!(matches!(
            session.append_image_bytes(&[0xFF, 0xE0, 0, 2], &meter, 4),
            Err(ImageError::Validation(ValidationError::TooLarge { size: 6, limit: 4 }))
        ));
    }

    #[test]
    fn header_that_never_ends_overflows_header_window() {
        let meter = WorkingSet::new();
        let mut session = single(&meter, 100_000);
        session.append_image_bytes(&[0xFF, 0xD8, 0xFF, 0xDB, 0xFF, 0xFF], &meter, 100_000).unwrap();
        let filler = alloc::vec![0u8; HEADER_WINDOW_BYTES];
        assert_eq!(
            session.append_image_bytes(&filler, &meter, 100_000),
            Err(ImageError::Validation(ValidationError::HeaderTooLarge(
                HEADER_WINDOW_BYTES
            )))
        );
    }

    #[test]
    fn metadata_larger_than_header_window_is_discarded() {
        let meter = WorkingSet::new();
        let image = crate::test_fixtures::grey_jpeg(16, 8);
        let mut stream = alloc::vec![0xFF, 0xD8, 0xFF, 0xE2, 0x0B, 0xB8];
        stream.extend(core::iter::repeat(0x5A).take(2998));
        stream.extend_from_slice(&[0xFF, 0xFE, 0x00, 0x04, b'o', b'k']);
        stream.extend_from_slice(&image[2..]);

        let mut session = single(&meter, stream.len());
        for chunk in stream.chunks(700) {
            session.append_image_bytes(chunk, &meter, 100_000).unwrap();
        }
        session.finish_image().unwrap();
        let buffer = session.take_working_buffer().unwrap();
        assert_eq!(buffer.as_slice(), &image[..]);
    }

    #[test]
    fn finishing_without_header_is_truncated() {
        let meter = WorkingSet::new();
        let mut session = single(&meter, 100);
        assert_eq!(
            session.finish_image(),
            Err(ImageError::Validation(ValidationError::Empty))
        );
        session.append_image_bytes(&[0xFF, 0xD8], &meter, 100).unwrap();
        assert_eq!(
            session.finish_image(),
            Err(ImageError::Validation(ValidationError::Header(
                HeaderError::Truncated
            )))
        );
    }
}
