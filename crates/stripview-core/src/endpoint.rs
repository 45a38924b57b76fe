//! Transport-independent handlers for the image API routes
//!
//! The firmware adapts ESP-IDF requests onto these; the scenario harness
//! drives them with in-memory bodies. Each handler locks the service only
//! for bounded steps and never while waiting on the network.

use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, warn};

use crate::clock::Clock;
use crate::error::{ImageError, ValidationError};
use crate::memory::HeapGauge;
use crate::multipart::{boundary_from_content_type, MultipartExtractor};
use crate::panel::PanelSink;
use crate::request::{query_param, strip_index, StripQuery, IMAGE_FIELD};
use crate::response::ApiResponse;
use crate::service::ImageService;
use crate::IO_CHUNK_BYTES;

/// Status code and JSON body to send back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Reply {
    fn ok(body: &ApiResponse) -> Self {
        Self {
            status: 200,
            body: body.to_json(),
        }
    }

    fn error(err: &ImageError) -> Self {
        Self {
            status: err.status_code(),
            body: ApiResponse::failure(err).to_json(),
        }
    }

    pub fn body_str(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap_or("")
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn bad_body<E: Debug>(err: E) -> ImageError {
    warn!("[WEB] request body read failed: {:?}", err);
    ValidationError::BadParameter("body").into()
}

/// `POST /api/display/image`
///
/// `read` pulls body bytes like `std::io::Read::read`.
pub fn post_image<P, H, C, R, E>(
    service: &Mutex<ImageService<P, H, C>>,
    uri: &str,
    content_type: Option<&str>,
    content_len: Option<usize>,
    mut read: R,
) -> Reply
where
    P: PanelSink,
    H: HeapGauge,
    C: Clock,
    R: FnMut(&mut [u8]) -> Result<usize, E>,
    E: Debug,
{
    let prepared = (|| {
        let len = content_len.ok_or(ValidationError::BadParameter("Content-Length"))?;
        let boundary = boundary_from_content_type(content_type.unwrap_or(""))?;
        let timeout = lock(service)
            .config()
            .resolve_timeout(query_param(uri, "timeout").as_deref())?;
        Ok::<_, ImageError>((len, boundary, timeout))
    })();
    let (len, boundary, timeout) = match prepared {
        Ok(v) => v,
        Err(err) => return Reply::error(&err),
    };

    let handle = match lock(service).open_image_upload(len, timeout) {
        Ok(handle) => handle,
        Err(err) => return Reply::error(&err),
    };

    let mut extractor = MultipartExtractor::new(boundary, IMAGE_FIELD);
    let mut chunk = [0u8; IO_CHUNK_BYTES];
    let mut remaining = len;
    let streamed = (|| {
        while remaining > 0 {
            let want = remaining.min(chunk.len());
            let n = read(&mut chunk[..want]).map_err(bad_body)?;
            if n == 0 {
                return Err(ValidationError::BadParameter("body").into());
            }
            remaining -= n;
            let mut svc = lock(service);
            extractor.feed(&chunk[..n], |bytes| svc.write_image_chunk(handle, bytes))?;
        }
        extractor.finish()?;
        lock(service).finish_image_upload(handle)
    })();

    match streamed {
        Ok(timeout) => {
            debug!("[WEB] image accepted ({} bytes)", len);
            Reply::ok(&ApiResponse::queued(timeout))
        }
        Err(err) => {
            lock(service).abort_upload(handle);
            Reply::error(&err)
        }
    }
}

/// `POST /api/display/strip/{index}`
pub fn post_strip<P, H, C, R, E>(
    service: &Mutex<ImageService<P, H, C>>,
    uri: &str,
    content_len: Option<usize>,
    mut read: R,
) -> Reply
where
    P: PanelSink,
    H: HeapGauge,
    C: Clock,
    R: FnMut(&mut [u8]) -> Result<usize, E>,
    E: Debug,
{
    let parsed = (|| {
        let index = strip_index(uri)?;
        let query = StripQuery::parse(uri)?;
        let len = content_len.ok_or(ValidationError::BadParameter("Content-Length"))?;
        Ok::<_, ImageError>((index, query, len))
    })();
    let (index, query, len) = match parsed {
        Ok(v) => v,
        Err(err) => return Reply::error(&err),
    };

    let mut ticket = match lock(service).reserve_strip(index, &query, len) {
        Ok(ticket) => ticket,
        Err(err) => return Reply::error(&err),
    };

    let mut chunk = [0u8; IO_CHUNK_BYTES];
    let received = (|| {
        while ticket.remaining() > 0 {
            let want = ticket.remaining().min(chunk.len());
            let n = read(&mut chunk[..want]).map_err(bad_body)?;
            if n == 0 {
                return Err(ValidationError::BadParameter("body").into());
            }
            ticket.extend_from_slice(&chunk[..n])?;
        }
        Ok::<_, ImageError>(())
    })();
    if let Err(err) = received {
        lock(service).abort_upload(ticket.handle());
        return Reply::error(&err);
    }

    match lock(service).commit_strip(ticket) {
        Ok(_) => Reply::ok(&ApiResponse::strip_ok()),
        Err(err) => Reply::error(&err),
    }
}

/// `DELETE /api/display/image`
pub fn delete_image<P, H, C>(service: &Mutex<ImageService<P, H, C>>) -> Reply
where
    P: PanelSink,
    H: HeapGauge,
    C: Clock,
{
    let outcome = lock(service).dismiss();
    debug!("[WEB] dismiss: {:?}", outcome);
    Reply::ok(&ApiResponse::dismissed())
}

/// `GET /api/display/status`
pub fn get_status<P, H, C>(service: &Mutex<ImageService<P, H, C>>) -> Reply
where
    P: PanelSink,
    H: HeapGauge,
    C: Clock,
{
    Reply {
        status: 200,
        body: lock(service).status().to_json(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::config::ImageApiConfig;
    use crate::memory::FixedHeap;
    use crate::test_fixtures::grey_jpeg;
    use crate::test_panel::TestPanel;
    use crate::OverlayPhase;

    type Service = ImageService<TestPanel, FixedHeap, ManualClock>;

    fn service() -> Mutex<Service> {
        let config = ImageApiConfig::builder().panel(16, 16).build().unwrap();
        Mutex::new(ImageService::new(
            config,
            TestPanel::new(16, 16),
            FixedHeap::new(300_000),
            ManualClock::new(0),
        ))
    }

    fn multipart(payload: &[u8]) -> Vec<u8> {
        let mut body = b"--zz\r\nContent-Disposition: form-data; name=\"image\"\r\n\r\n".to_vec();
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\r\n--zz--\r\n");
        body
    }

    fn reader(mut data: &[u8]) -> impl FnMut(&mut [u8]) -> Result<usize, ()> + '_ {
        move |buf| {
            let n = buf.len().min(data.len());
            buf[..n].copy_from_slice(&data[..n]);
            data = &data[n..];
            Ok(n)
        }
    }

    #[test]
    fn image_upload_round_trip() {
        let svc = service();
        let body = multipart(&grey_jpeg(16, 16));
        let reply = post_image(
            &svc,
            "/api/display/image?timeout=0",
            Some("multipart/form-data; boundary=zz"),
            Some(body.len()),
            reader(&body),
        );
        assert_eq!(reply.status, 200);
        assert_eq!(
            reply.body_str(),
            r#"{"success":true,"message":"Image queued for display (no timeout)"}"#
        );
        lock(&svc).tick();
        assert_eq!(lock(&svc).phase(), OverlayPhase::Displaying);
    }

    #[test]
    fn missing_field_is_400_and_releases_session() {
        let svc = service();
        let body = b"--zz\r\nContent-Disposition: form-data; name=\"file\"\r\n\r\nabc\r\n--zz--\r\n";
        let reply = post_image(
            &svc,
            "/api/display/image",
            Some("multipart/form-data; boundary=zz"),
            Some(body.len()),
            reader(body),
        );
        assert_eq!(reply.status, 400);
        assert_eq!(lock(&svc).phase(), OverlayPhase::Idle);
        assert!(!lock(&svc).has_session());
    }

    #[test]
    fn short_body_is_rejected() {
        let svc = service();
        let body = multipart(&grey_jpeg(16, 16));
        let reply = post_image(
            &svc,
            "/api/display/image",
            Some("multipart/form-data; boundary=zz"),
            Some(body.len() + 50),
            reader(&body),
        );
        assert_eq!(reply.status, 400);
        assert!(!lock(&svc).has_session());
    }

    #[test]
    fn strips_and_dismiss() {
        let svc = service();
        let strip = grey_jpeg(16, 8);
        let r0 = post_strip(&svc, "/api/display/strip/0?total=2", Some(strip.len()), reader(&strip));
        assert_eq!((r0.status, r0.body_str()), (200, r#"{"success":true}"#));
        let r1 = post_strip(&svc, "/api/display/strip/1", Some(strip.len()), reader(&strip));
        assert_eq!(r1.status, 200);
        assert_eq!(lock(&svc).phase(), OverlayPhase::Displaying);

        for _ in 0..2 {
            let reply = delete_image(&svc);
            assert_eq!(
                (reply.status, reply.body_str()),
                (200, r#"{"success":true,"message":"Image dismissed"}"#)
            );
        }
        let status = get_status(&svc);
        assert!(status.body_str().starts_with(r#"{"phase":"idle""#));
    }

    #[test]
    fn strip_without_session_is_409() {
        let svc = service();
        let reply = post_strip(&svc, "/api/display/strip/3", Some(4), reader(b"abcd"));
        assert_eq!(reply.status, 409);
        let reply = post_strip(&svc, "/api/display/strip/x", Some(4), reader(b"abcd"));
        assert_eq!(reply.status, 400);
    }
}
