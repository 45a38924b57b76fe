//! Host-side scenario harness for the image API.
//!
//! Drives the same endpoint handlers the firmware routes to, with an
//! in-memory panel, a hand-driven clock and a settable heap figure.

pub mod fixtures;

use std::convert::Infallible;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use image::{Rgb, RgbImage};
use serde_json::Value;
use stripview_core::endpoint::{self, Reply};
use stripview_core::request::{IMAGE_FIELD, IMAGE_ROUTE, STRIP_ROUTE_PREFIX};
use stripview_core::{
    BackgroundScreen, Clock, FixedHeap, ImageApiConfig, ImageService, ManualClock, OverlayPhase,
    PanelCanvas, PanelSink, PixelOrder, TelemetrySnapshot, TestPanel, TickEvent, WorkingSet,
};

/// Body bytes handed over per read, one TCP segment
pub const READ_CHUNK: usize = 1460;
/// Free heap reported unless a scenario says otherwise
pub const DEFAULT_FREE_HEAP: usize = 180 * 1024;
pub const BOUNDARY: &str = "stripview-scenario";

pub type HarnessService = ImageService<TestPanel, FixedHeap, ManualClock>;

/// Couples the image service with its clock, heap gauge and background screen.
pub struct ScenarioHarness {
    service: Mutex<HarnessService>,
    clock: ManualClock,
    heap: FixedHeap,
    meter: WorkingSet,
    order: PixelOrder,
    screen: BackgroundScreen,
}

impl Default for ScenarioHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl ScenarioHarness {
    /// 240x280 panel with the stock limits.
    pub fn new() -> Self {
        Self::with_config(ImageApiConfig::default(), DEFAULT_FREE_HEAP)
    }

    pub fn with_config(config: ImageApiConfig, free_heap: usize) -> Self {
        let clock = ManualClock::new(0);
        let heap = FixedHeap::new(free_heap);
        let order = config.pixel_order;
        let panel = TestPanel::new(config.panel_width, config.panel_height);
        let service = ImageService::new(config, panel, heap.clone(), clock.clone());
        let meter = service.working_set().clone();
        Self {
            service: Mutex::new(service),
            clock,
            heap,
            meter,
            order,
            screen: BackgroundScreen::new("StripView"),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HarnessService> {
        self.service.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `POST /api/display/image` with `jpeg` as the `image` field.
    pub fn post_image(&self, timeout: Option<&str>, jpeg: &[u8]) -> Reply {
        let uri = match timeout {
            Some(t) => format!("{IMAGE_ROUTE}?timeout={t}"),
            None => IMAGE_ROUTE.to_string(),
        };
        let body = fixtures::multipart_body(BOUNDARY, IMAGE_FIELD, jpeg);
        let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
        self.post_image_raw(&uri, &content_type, &body)
    }

    /// `POST /api/display/image` with a caller-built body.
    pub fn post_image_raw(&self, uri: &str, content_type: &str, body: &[u8]) -> Reply {
        endpoint::post_image(
            &self.service,
            uri,
            Some(content_type),
            Some(body.len()),
            reader(body),
        )
    }

    /// `POST /api/display/strip/{index}?{query}`
    pub fn post_strip(&self, index: u32, query: &str, body: &[u8]) -> Reply {
        let uri = if query.is_empty() {
            format!("{STRIP_ROUTE_PREFIX}{index}")
        } else {
            format!("{STRIP_ROUTE_PREFIX}{index}?{query}")
        };
        endpoint::post_strip(&self.service, &uri, Some(body.len()), reader(body))
    }

    /// Send every strip in order, announcing the count and timeout on strip 0.
    pub fn upload_strips(&self, strips: &[Vec<u8>], timeout: Option<&str>) -> Vec<Reply> {
        strips
            .iter()
            .enumerate()
            .map(|(i, strip)| {
                let query = match (i, timeout) {
                    (0, Some(t)) => format!("total={}&timeout={t}", strips.len()),
                    (0, None) => format!("total={}", strips.len()),
                    _ => String::new(),
                };
                self.post_strip(i as u32, &query, strip)
            })
            .collect()
    }

    /// `DELETE /api/display/image`
    pub fn delete(&self) -> Reply {
        endpoint::delete_image(&self.service)
    }

    /// `GET /api/display/status`, parsed.
    pub fn status(&self) -> Value {
        let reply = endpoint::get_status(&self.service);
        serde_json::from_slice(&reply.body).unwrap_or(Value::Null)
    }

    /// One pass of the firmware main loop's image work.
    pub fn tick(&self) -> Option<TickEvent> {
        self.lock().tick()
    }

    /// Tick until a buffered decode stops reporting progress; returns the
    /// event that ended it.
    pub fn run_decode(&self) -> Option<TickEvent> {
        loop {
            match self.tick() {
                Some(TickEvent::Decoding { .. }) => continue,
                other => return other,
            }
        }
    }

    pub fn advance_ms(&self, ms: u64) {
        self.clock.advance(ms);
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn set_free_heap(&self, bytes: usize) {
        self.heap.set(bytes);
    }

    pub fn phase(&self) -> OverlayPhase {
        self.lock().phase()
    }

    pub fn has_session(&self) -> bool {
        self.lock().has_session()
    }

    /// Meter of every byte the pipeline holds.
    pub fn working_set(&self) -> &WorkingSet {
        &self.meter
    }

    /// Copy of the panel's raw 565 words, row-major.
    pub fn frame(&self) -> Vec<u16> {
        self.lock().panel().frame().to_vec()
    }

    pub fn pixel(&self, x: u16, y: u16) -> Option<u16> {
        self.lock().panel().pixel(x, y)
    }

    /// Feed a telemetry snapshot to the background screen.
    pub fn publish_telemetry(&mut self, snapshot: TelemetrySnapshot) {
        self.screen.update(snapshot);
    }

    /// Draw the background the way the firmware main loop does.
    ///
    /// Returns whether anything was painted; `false` while an overlay owns
    /// the panel.
    pub fn render_background(&mut self) -> bool {
        let mut svc = self
            .service
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if svc.take_background_invalidated() {
            self.screen.invalidate();
        }
        let order = self.order;
        let screen = &mut self.screen;
        matches!(
            svc.with_background_panel(|panel| screen.render(&mut PanelCanvas::new(panel, order))),
            Some(Ok(true))
        )
    }

    /// Panel contents as RGB888.
    pub fn frame_rgb(&self) -> RgbImage {
        let svc = self.lock();
        let panel = svc.panel();
        let (width, height) = panel.dimensions();
        let order = self.order;
        RgbImage::from_fn(u32::from(width), u32::from(height), |x, y| {
            let word = panel.pixel(x as u16, y as u16).unwrap_or(0);
            Rgb(unpack565(word, order))
        })
    }

    /// Save the panel to a PNG.
    pub fn save_screenshot_png(&self, path: impl AsRef<Path>) -> Result<(), String> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        self.frame_rgb().save(path).map_err(|e| e.to_string())
    }
}

/// Expand a panel word back to RGB888, replicating high bits into low.
pub fn unpack565(word: u16, order: PixelOrder) -> [u8; 3] {
    let hi = ((word >> 11) & 0x1F) as u8;
    let g = ((word >> 5) & 0x3F) as u8;
    let lo = (word & 0x1F) as u8;
    let (hi, g, lo) = ((hi << 3) | (hi >> 2), (g << 2) | (g >> 4), (lo << 3) | (lo >> 2));
    match order {
        PixelOrder::Rgb565 => [hi, g, lo],
        PixelOrder::Bgr565 => [lo, g, hi],
    }
}

fn reader(mut data: &[u8]) -> impl FnMut(&mut [u8]) -> Result<usize, Infallible> + '_ {
    move |buf| {
        let n = buf.len().min(data.len()).min(READ_CHUNK);
        buf[..n].copy_from_slice(&data[..n]);
        data = &data[n..];
        Ok(n)
    }
}
