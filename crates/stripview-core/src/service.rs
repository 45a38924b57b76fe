//! Single owner of the panel, the upload session and the overlay state
//!
//! HTTP handlers call in with short, bounded operations and hold only a
//! [`SessionHandle`] between calls. The main loop calls [`ImageService::tick`]
//! to paint deferred decodes a slice at a time, expire the overlay and reap
//! stalled sessions.

use alloc::format;

use log::{debug, info, warn};

use crate::assembler::StripReport;
use crate::clock::Clock;
use crate::config::{DisplayTimeout, ImageApiConfig};
use crate::error::{ImageError, ValidationError};
use crate::memory::{HeapGauge, TrackedBuffer, WorkingSet};
use crate::overlay::{OverlayPhase, OverlayState, RenderTarget};
use crate::panel::PanelSink;
use crate::request::StripQuery;
use crate::response::StatusReport;
use crate::session::{IngestMode, SessionHandle, UploadSession};
use crate::strategy::StrategySelector;

/// Result of `DELETE /api/display/image`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DismissOutcome {
    /// Nothing was showing
    NothingShown,
    /// An upload in progress was cancelled
    Aborted,
    /// The displayed image was removed
    Dismissed,
}

/// Something the main loop should know about
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickEvent {
    /// Another slice of a buffered image reached the panel
    Decoding { rows_done: u16 },
    /// A buffered image finished decoding and is on screen
    Displayed,
    /// A buffered image failed to decode
    Failed(ImageError),
    /// The display timeout elapsed
    Expired,
    /// An upload went quiet for too long and was dropped
    Stalled,
}

/// Permission to upload one strip, holding its body buffer
///
/// The body is read into the ticket without the service lock, then handed
/// back through [`ImageService::commit_strip`].
#[derive(Debug)]
pub struct StripTicket {
    handle: SessionHandle,
    index: u32,
    expected: usize,
    buffer: TrackedBuffer,
}

impl StripTicket {
    pub fn handle(&self) -> SessionHandle {
        self.handle
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    /// Bytes still expected
    pub fn remaining(&self) -> usize {
        self.expected - self.buffer.len()
    }

    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> Result<(), ImageError> {
        self.buffer.extend_from_slice(bytes)
    }
}

/// Rows of the image currently on screen
#[derive(Debug, Clone, Copy)]
struct Shown {
    rows: u16,
    height: u16,
}

pub struct ImageService<P, H, C> {
    config: ImageApiConfig,
    selector: StrategySelector,
    panel: P,
    heap: H,
    clock: C,
    meter: WorkingSet,
    overlay: OverlayState,
    session: Option<UploadSession>,
    shown: Option<Shown>,
    generation: u32,
    background_invalidated: bool,
}

impl<P: PanelSink, H: HeapGauge, C: Clock> ImageService<P, H, C> {
    pub fn new(config: ImageApiConfig, panel: P, heap: H, clock: C) -> Self {
        Self {
            selector: StrategySelector::new(&config),
            config,
            panel,
            heap,
            clock,
            meter: WorkingSet::new(),
            overlay: OverlayState::new(),
            session: None,
            shown: None,
            generation: 0,
            background_invalidated: true,
        }
    }

    pub fn config(&self) -> &ImageApiConfig {
        &self.config
    }

    pub fn phase(&self) -> OverlayPhase {
        self.overlay.phase()
    }

    pub fn render_target(&self) -> RenderTarget {
        self.overlay.render_target()
    }

    pub fn overlay(&self) -> &OverlayState {
        &self.overlay
    }

    /// Meter of every byte the pipeline holds
    pub fn working_set(&self) -> &WorkingSet {
        &self.meter
    }

    pub fn panel(&self) -> &P {
        &self.panel
    }

    pub fn free_heap(&self) -> usize {
        self.heap.free_heap()
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Run `draw` against the panel if the background owns it
    pub fn with_background_panel<R>(&mut self, draw: impl FnOnce(&mut P) -> R) -> Option<R> {
        match self.overlay.render_target() {
            RenderTarget::Background => Some(draw(&mut self.panel)),
            RenderTarget::Overlay => None,
        }
    }

    /// Whether the background must repaint fully; clears the flag
    pub fn take_background_invalidated(&mut self) -> bool {
        core::mem::take(&mut self.background_invalidated)
    }

    pub fn status(&self) -> StatusReport {
        let now = self.clock.now_ms();
        let (rows_written, image_height) = match (&self.session, self.shown) {
            (Some(session), _) => (session.rows_painted(), session.image_height()),
            (None, Some(shown)) => (shown.rows, shown.height),
            (None, None) => (0, 0),
        };
        StatusReport {
            phase: self.overlay.phase().as_str(),
            remaining_ms: self.overlay.remaining_ms(now),
            rows_written,
            image_height,
            free_heap: self.heap.free_heap(),
        }
    }

    // ---- single-shot ------------------------------------------------------

    /// Open a single-shot session for a body of `declared_len` bytes
    pub fn open_image_upload(
        &mut self,
        declared_len: usize,
        timeout: DisplayTimeout,
    ) -> Result<SessionHandle, ImageError> {
        self.ensure_no_upload()?;
        let ceiling = self.config.single_shot_ceiling();
        if declared_len > ceiling {
            return Err(ValidationError::TooLarge {
                size: declared_len,
                limit: ceiling,
            }
            .into());
        }
        if declared_len == 0 {
            return Err(ValidationError::Empty.into());
        }

        let free = self.heap.free_heap();
        match self.selector.select(declared_len, free)? {
            IngestMode::SingleBuffer => {}
            IngestMode::StripStreaming => {
                return Err(ImageError::StreamingRequired {
                    needed: declared_len + self.config.decode_headroom,
                    free,
                });
            }
        }

        let (width, height) = (self.config.panel_width, self.config.panel_height);
        let handle = self.open_session(
            IngestMode::SingleBuffer,
            declared_len,
            width,
            height,
            None,
            timeout,
        )?;
        info!(
            "[IMG] single-shot upload opened: {} bytes declared, {}",
            declared_len, timeout
        );
        Ok(handle)
    }

    /// Append payload bytes of the single-shot session
    pub fn write_image_chunk(
        &mut self,
        handle: SessionHandle,
        chunk: &[u8],
    ) -> Result<(), ImageError> {
        let now = self.clock.now_ms();
        let max = self.config.max_image_size;
        let session = session_for(&mut self.session, handle, IngestMode::SingleBuffer)?;
        session.touch(now);
        match session.append_image_bytes(chunk, &self.meter, max) {
            Ok(()) => Ok(()),
            Err(err) => Err(self.fail_session(err)),
        }
    }

    /// Payload complete; the decode runs over the following [`tick`](Self::tick)s
    pub fn finish_image_upload(
        &mut self,
        handle: SessionHandle,
    ) -> Result<DisplayTimeout, ImageError> {
        let session = session_for(&mut self.session, handle, IngestMode::SingleBuffer)?;
        if let Err(err) = session.finish_image() {
            return Err(self.fail_session(err));
        }
        let received = session.received_bytes();
        let now = self.clock.now_ms();
        self.overlay
            .mark_received(now)
            .map_err(|_| ImageError::StaleSession)?;
        debug!("[IMG] single-shot payload complete: {} bytes", received);
        Ok(self.overlay.timeout())
    }

    /// Cancel the session behind `handle`, if it is still the current one
    pub fn abort_upload(&mut self, handle: SessionHandle) {
        if self.session.as_ref().map(UploadSession::handle) == Some(handle) {
            let _ = self.fail_session(ImageError::StaleSession);
        }
    }

    // ---- strips -----------------------------------------------------------

    /// Validate a strip request and allocate its body buffer
    ///
    /// Strip 0 opens the session. Any failure on a later strip aborts the
    /// session it belongs to.
    pub fn reserve_strip(
        &mut self,
        index: u32,
        query: &StripQuery,
        body_len: usize,
    ) -> Result<StripTicket, ImageError> {
        if index == 0 {
            self.open_strip_session(query, body_len)?;
        } else {
            match &self.session {
                None => return Err(ImageError::NoSession),
                Some(s) if s.mode() != IngestMode::StripStreaming || s.strip_in_flight() => {
                    return Err(ImageError::Conflict)
                }
                Some(_) => {}
            }
            if let Err(err) = self.check_strip_request(index, body_len) {
                return Err(self.fail_session(err));
            }
        }

        let now = self.clock.now_ms();
        let buffer = match TrackedBuffer::with_capacity(&self.meter, body_len) {
            Ok(buffer) => buffer,
            Err(err) => return Err(self.fail_session(err)),
        };
        let Some(session) = self.session.as_mut() else {
            return Err(ImageError::NoSession);
        };
        session.set_strip_in_flight(true);
        session.touch(now);
        Ok(StripTicket {
            handle: session.handle(),
            index,
            expected: body_len,
            buffer,
        })
    }

    /// Decode a strip straight to the panel
    pub fn commit_strip(&mut self, ticket: StripTicket) -> Result<StripReport, ImageError> {
        let StripTicket {
            handle,
            index,
            buffer,
            ..
        } = ticket;
        let now = self.clock.now_ms();
        let session = session_for(&mut self.session, handle, IngestMode::StripStreaming)?;
        session.set_strip_in_flight(false);
        session.count_received(buffer.len());
        session.touch(now);

        let result = session.assembler_mut().accept(index, buffer, &mut self.panel);
        let report = match result {
            Ok(report) => report,
            Err(err) => return Err(self.fail_session(err)),
        };
        if report.complete {
            self.complete_image(now);
        }
        Ok(report)
    }

    // ---- lifetime ---------------------------------------------------------

    /// `DELETE`: idempotent
    pub fn dismiss(&mut self) -> DismissOutcome {
        match self.overlay.phase() {
            OverlayPhase::Idle | OverlayPhase::Dismissing => DismissOutcome::NothingShown,
            OverlayPhase::Receiving | OverlayPhase::Decoding => {
                let _ = self.fail_session(ImageError::StaleSession);
                info!("[IMG] upload cancelled by dismiss");
                DismissOutcome::Aborted
            }
            OverlayPhase::Displaying => {
                self.release_overlay();
                info!("[IMG] image dismissed");
                DismissOutcome::Dismissed
            }
        }
    }

    /// Main-loop work: deferred decode, expiry, stall guard
    pub fn tick(&mut self) -> Option<TickEvent> {
        let now = self.clock.now_ms();
        match self.overlay.phase() {
            OverlayPhase::Decoding => Some(self.decode_pending()),
            OverlayPhase::Displaying if self.overlay.is_expired(now) => {
                self.release_overlay();
                info!("[IMG] display timeout elapsed");
                Some(TickEvent::Expired)
            }
            OverlayPhase::Receiving => {
                let stalled = self.session.as_ref().is_some_and(|s| {
                    !s.strip_in_flight()
                        && now.saturating_sub(s.last_activity()) >= self.config.session_stall_ms
                });
                if stalled {
                    warn!(
                        "[IMG] upload idle for {} ms, aborting",
                        self.config.session_stall_ms
                    );
                    let _ = self.fail_session(ImageError::StaleSession);
                    return Some(TickEvent::Stalled);
                }
                None
            }
            _ => None,
        }
    }

    /// Paint the next `decode_rows_per_tick` rows of the buffered image
    ///
    /// Keeps each tick, and so each hold of the service lock, to a bounded
    /// slice of the decode.
    fn decode_pending(&mut self) -> TickEvent {
        let rows = self.config.decode_rows_per_tick;
        let Some(session) = self.session.as_mut() else {
            let _ = self.overlay.abort();
            return TickEvent::Failed(ImageError::NoSession);
        };
        if !session.assembler_mut().has_pending() {
            let Some(buffer) = session.take_working_buffer() else {
                return TickEvent::Failed(self.fail_session(ImageError::NoSession));
            };
            let index = session.next_expected_strip_index();
            if let Err(err) = session.assembler_mut().begin(index, buffer) {
                return TickEvent::Failed(self.fail_session(err));
            }
        }
        let painted = session.assembler_mut().advance(&mut self.panel, rows);
        let rows_done = session.rows_painted();
        match painted {
            Ok(None) => TickEvent::Decoding { rows_done },
            Ok(Some(report)) if report.complete => {
                let started = self.overlay.started_at().unwrap_or(0);
                self.complete_image(started);
                TickEvent::Displayed
            }
            Ok(Some(report)) => {
                let err = ValidationError::FrameSize {
                    width: self.config.panel_width,
                    height: report.rows,
                    expected_width: self.config.panel_width,
                    expected_height: self.config.panel_height,
                };
                TickEvent::Failed(self.fail_session(err.into()))
            }
            Err(err) => TickEvent::Failed(self.fail_session(err)),
        }
    }

    // ---- internals --------------------------------------------------------

    fn ensure_no_upload(&mut self) -> Result<(), ImageError> {
        if self.session.is_some() || self.overlay.phase().is_busy() {
            return Err(ImageError::Conflict);
        }
        Ok(())
    }

    fn open_strip_session(&mut self, query: &StripQuery, body_len: usize) -> Result<(), ImageError> {
        self.ensure_no_upload()?;
        if body_len == 0 {
            return Err(ValidationError::Empty.into());
        }
        if body_len > self.config.max_strip_size {
            return Err(ValidationError::TooLarge {
                size: body_len,
                limit: self.config.max_strip_size,
            }
            .into());
        }
        let timeout = self.config.resolve_timeout(query.timeout.as_deref())?;
        let (panel_w, panel_h) = (self.config.panel_width, self.config.panel_height);
        let width = query.width.unwrap_or(panel_w);
        let height = query.height.unwrap_or(panel_h);
        if width == 0 || height == 0 || width > panel_w || height > panel_h {
            return Err(ValidationError::ImageDimensions {
                width,
                height,
                panel_width: panel_w,
                panel_height: panel_h,
            }
            .into());
        }
        if query.total == Some(0) {
            return Err(ValidationError::BadParameter("total").into());
        }
        self.selector.check_strip(body_len, self.heap.free_heap())?;

        self.open_session(
            IngestMode::StripStreaming,
            body_len,
            width,
            height,
            query.total,
            timeout,
        )?;
        info!("[IMG] strip upload opened: {}x{}, {}", width, height, timeout);
        Ok(())
    }

    fn check_strip_request(&self, index: u32, body_len: usize) -> Result<(), ImageError> {
        let Some(session) = self.session.as_ref() else {
            return Err(ImageError::NoSession);
        };
        let expected = session.next_expected_strip_index();
        if index != expected {
            return Err(ImageError::Sequencing {
                expected,
                got: index,
            });
        }
        if body_len == 0 {
            return Err(ValidationError::Empty.into());
        }
        if body_len > self.config.max_strip_size {
            return Err(ValidationError::TooLarge {
                size: body_len,
                limit: self.config.max_strip_size,
            }
            .into());
        }
        self.selector.check_strip(body_len, self.heap.free_heap())
    }

    /// Take the panel for a new session, replacing a displayed image
    fn open_session(
        &mut self,
        mode: IngestMode,
        declared: usize,
        width: u16,
        height: u16,
        expected_strips: Option<u32>,
        timeout: DisplayTimeout,
    ) -> Result<SessionHandle, ImageError> {
        if self.overlay.phase() == OverlayPhase::Displaying {
            info!("[IMG] replacing displayed image");
            self.release_overlay();
        }
        self.overlay
            .begin(timeout)
            .map_err(|_| ImageError::Conflict)?;
        if let Err(e) = self.panel.fill(0) {
            let _ = self.overlay.abort();
            self.background_invalidated = true;
            return Err(ImageError::Panel(format!("{e:?}")));
        }

        self.generation = self.generation.wrapping_add(1);
        let handle = SessionHandle::new(self.generation);
        self.session = Some(UploadSession::open(
            handle,
            mode,
            declared,
            width,
            height,
            expected_strips,
            &self.meter,
            self.config.pixel_order,
            self.clock.now_ms(),
        ));
        self.shown = None;
        Ok(handle)
    }

    /// Last rows are on the panel: start the display clock
    fn complete_image(&mut self, received_at: u64) {
        if self.overlay.phase() == OverlayPhase::Receiving {
            let _ = self.overlay.mark_received(received_at);
        }
        let _ = self.overlay.mark_displayed();
        if let Some(session) = self.session.take() {
            self.shown = Some(Shown {
                rows: session.current_row_offset(),
                height: session.image_height(),
            });
        }
        info!(
            "[MEM] image displayed: working set peak={} free_heap={}",
            self.meter.peak(),
            self.heap.free_heap()
        );
    }

    /// Displaying -> Dismissing -> Idle, panel back to the background
    fn release_overlay(&mut self) {
        let _ = self.overlay.begin_dismiss();
        self.session = None;
        self.shown = None;
        let _ = self.overlay.finish_dismiss();
        self.background_invalidated = true;
        info!(
            "[MEM] overlay released: working set={} free_heap={}",
            self.meter.current(),
            self.heap.free_heap()
        );
    }

    /// Drop the session and restore the background; returns `err`
    fn fail_session(&mut self, err: ImageError) -> ImageError {
        if self.session.take().is_some() {
            warn!("[IMG] upload aborted: {}", err);
        }
        let _ = self.overlay.abort();
        self.background_invalidated = true;
        err
    }
}

/// The open session, if `handle` still names it
fn session_for(
    session: &mut Option<UploadSession>,
    handle: SessionHandle,
    mode: IngestMode,
) -> Result<&mut UploadSession, ImageError> {
    match session.as_mut() {
        Some(s) if s.handle() == handle && s.mode() == mode => Ok(s),
        _ => Err(ImageError::StaleSession),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::color::PixelOrder;
    use crate::memory::FixedHeap;
    use crate::test_fixtures::grey_jpeg;
    use crate::test_panel::TestPanel;

    type Service = ImageService<TestPanel, FixedHeap, ManualClock>;

    fn service(clock: &ManualClock) -> Service {
        let config = ImageApiConfig::builder()
            .panel(16, 16)
            .pixel_order(PixelOrder::Rgb565)
            .build()
            .unwrap();
        ImageService::new(
            config,
            TestPanel::new(16, 16),
            FixedHeap::new(200_000),
            clock.clone(),
        )
    }

    fn upload(svc: &mut Service, bytes: &[u8], timeout: DisplayTimeout) -> Result<(), ImageError> {
        let handle = svc.open_image_upload(bytes.len(), timeout)?;
        for chunk in bytes.chunks(7) {
            svc.write_image_chunk(handle, chunk)?;
        }
        svc.finish_image_upload(handle).map(|_| ())
    }

    fn send_strip(
        svc: &mut Service,
        index: u32,
        query: &StripQuery,
        bytes: &[u8],
    ) -> Result<StripReport, ImageError> {
        let mut ticket = svc.reserve_strip(index, query, bytes.len())?;
        ticket.extend_from_slice(bytes)?;
        svc.commit_strip(ticket)
    }

    #[test]
    fn single_shot_decodes_on_tick() {
        let clock = ManualClock::new(100);
        let mut svc = service(&clock);
        upload(&mut svc, &grey_jpeg(16, 16), DisplayTimeout::Seconds(5)).unwrap();
        assert_eq!(svc.phase(), OverlayPhase::Decoding);
        assert_eq!(svc.tick(), Some(TickEvent::Displayed));
        assert_eq!(svc.phase(), OverlayPhase::Displaying);
        assert!(svc.panel().is_filled_with(PixelOrder::Rgb565.pack(128, 128, 128)));
        assert!(!svc.has_session());
        assert_eq!(svc.working_set().current(), 0);
    }

    #[test]
    fn buffered_decode_is_sliced_across_ticks() {
        let clock = ManualClock::new(0);
        let config = ImageApiConfig::builder()
            .panel(16, 16)
            .decode_rows_per_tick(8)
            .build()
            .unwrap();
        let mut svc = ImageService::new(
            config,
            TestPanel::new(16, 16),
            FixedHeap::new(200_000),
            clock.clone(),
        );

        upload(&mut svc, &grey_jpeg(16, 16), DisplayTimeout::Never).unwrap();
        assert_eq!(svc.tick(), Some(TickEvent::Decoding { rows_done: 8 }));
        assert_eq!(svc.phase(), OverlayPhase::Decoding);
        assert_eq!(svc.status().rows_written, 8);
        assert_eq!(svc.panel().pixels_written(), 16 * 8);
        assert_eq!(svc.tick(), Some(TickEvent::Displayed));

        // a dismiss between slices drops the rest of the decode
        upload(&mut svc, &grey_jpeg(16, 16), DisplayTimeout::Never).unwrap();
        svc.tick();
        assert_eq!(svc.dismiss(), DismissOutcome::Aborted);
        assert_eq!(svc.tick(), None);
        assert_eq!(svc.working_set().current(), 0);
    }

    #[test]
    fn wrong_frame_size_aborts_without_buffer() {
        let clock = ManualClock::new(0);
        let mut svc = service(&clock);
        let err = upload(&mut svc, &grey_jpeg(8, 8), DisplayTimeout::Never).unwrap_err();
        assert!(matches!(
            err,
            ImageError::Validation(ValidationError::FrameSize { .. })
        ));
        assert_eq!(svc.phase(), OverlayPhase::Idle);
        assert!(svc.take_background_invalidated());
        assert_eq!(svc.working_set().current(), 0);
    }

    #[test]
    fn expiry_is_measured_from_upload_completion() {
        let clock = ManualClock::new(1_000);
        let mut svc = service(&clock);
        upload(&mut svc, &grey_jpeg(16, 16), DisplayTimeout::Seconds(5)).unwrap();
        clock.advance(300);
        svc.tick();
        clock.set(5_999);
        assert_eq!(svc.tick(), None);
        assert_eq!(svc.status().remaining_ms, Some(1));
        clock.set(6_000);
        assert_eq!(svc.tick(), Some(TickEvent::Expired));
        assert_eq!(svc.render_target(), RenderTarget::Background);
    }

    #[test]
    fn strips_sequence_and_conflicts() {
        let clock = ManualClock::new(0);
        let mut svc = service(&clock);
        let query = StripQuery {
            timeout: Some("0".into()),
            ..StripQuery::default()
        };
        send_strip(&mut svc, 0, &query, &grey_jpeg(16, 8)).unwrap();
        assert_eq!(svc.phase(), OverlayPhase::Receiving);
        assert_eq!(
            svc.open_image_upload(100, DisplayTimeout::Never),
            Err(ImageError::Conflict)
        );
        assert_eq!(
            send_strip(&mut svc, 0, &query, &grey_jpeg(16, 8)).err(),
            Some(ImageError::Conflict)
        );
        let report = send_strip(&mut svc, 1, &query, &grey_jpeg(16, 8)).unwrap();
        assert!(report.complete);
        assert_eq!(svc.phase(), OverlayPhase::Displaying);
        clock.advance(1_000_000);
        assert_eq!(svc.tick(), None);
        assert_eq!(svc.status().remaining_ms, None);
    }

    #[test]
    fn skipped_index_aborts_session() {
        let clock = ManualClock::new(0);
        let mut svc = service(&clock);
        let query = StripQuery::default();
        send_strip(&mut svc, 0, &query, &grey_jpeg(16, 8)).unwrap();
        assert_eq!(
            svc.reserve_strip(2, &query, 10).err(),
            Some(ImageError::Sequencing {
                expected: 1,
                got: 2
            })
        );
        assert_eq!(svc.phase(), OverlayPhase::Idle);
        assert_eq!(svc.reserve_strip(1, &query, 10).err(), Some(ImageError::NoSession));
    }

    #[test]
    fn stale_ticket_is_refused_after_dismiss() {
        let clock = ManualClock::new(0);
        let mut svc = service(&clock);
        let query = StripQuery::default();
        let mut ticket = svc.reserve_strip(0, &query, 300).unwrap();
        assert_eq!(svc.dismiss(), DismissOutcome::Aborted);
        ticket.extend_from_slice(&[0; 10]).unwrap();
        assert_eq!(svc.commit_strip(ticket).err(), Some(ImageError::StaleSession));
        assert_eq!(svc.dismiss(), DismissOutcome::NothingShown);
    }

    #[test]
    fn idle_strip_session_is_reaped() {
        let clock = ManualClock::new(0);
        let mut svc = service(&clock);
        send_strip(&mut svc, 0, &StripQuery::default(), &grey_jpeg(16, 8)).unwrap();
        clock.advance(29_999);
        assert_eq!(svc.tick(), None);
        clock.advance(1);
        assert_eq!(svc.tick(), Some(TickEvent::Stalled));
        assert!(!svc.has_session());
    }

    #[test]
    fn background_panel_only_when_idle() {
        let clock = ManualClock::new(0);
        let mut svc = service(&clock);
        assert_eq!(svc.with_background_panel(|_| 1), Some(1));
        upload(&mut svc, &grey_jpeg(16, 16), DisplayTimeout::Never).unwrap();
        assert_eq!(svc.with_background_panel(|_| 1), None);
        svc.tick();
        assert_eq!(svc.dismiss(), DismissOutcome::Dismissed);
        assert!(svc.take_background_invalidated());
        assert!(!svc.take_background_invalidated());
        assert_eq!(svc.with_background_panel(|_| 1), Some(1));
    }

    #[test]
    fn tight_heap_demands_strips() {
        let clock = ManualClock::new(0);
        let mut svc = service(&clock);
        svc.heap.set(60_000 + 40_000);
        assert!(matches!(
            svc.open_image_upload(60_000, DisplayTimeout::Never),
            Err(ImageError::StreamingRequired { .. })
        ));
        assert_eq!(svc.phase(), OverlayPhase::Idle);
    }
}
