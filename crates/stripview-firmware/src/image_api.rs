//! HTTP routes of the image API
//!
//! Thin adapters between ESP-IDF requests and the transport-independent
//! handlers in `stripview_core::endpoint`.

use std::sync::{Arc, Mutex};

use esp_idf_svc::http::server::{Configuration, EspHttpConnection, EspHttpServer, Request};
use esp_idf_svc::http::{Headers, Method};
use esp_idf_svc::io::{EspIOError, Read, Write};
use stripview_core::endpoint::{self, Reply};
use stripview_core::request::{HEALTH_ROUTE, IMAGE_ROUTE, STATUS_ROUTE, STRIP_ROUTE_PREFIX};
use stripview_core::{Clock, HeapGauge, ImageService, PanelSink};

/// Decode and multipart scratch live on this task's stack
const SERVER_STACK_SIZE: usize = 16 * 1024;

pub struct ImageApiServer {
    _server: EspHttpServer<'static>,
}

impl ImageApiServer {
    pub fn start<P, H, C>(service: Arc<Mutex<ImageService<P, H, C>>>) -> Result<Self, EspIOError>
    where
        P: PanelSink + Send + 'static,
        H: HeapGauge + Send + 'static,
        C: Clock + Send + 'static,
    {
        let mut server = EspHttpServer::new(&Configuration {
            stack_size: SERVER_STACK_SIZE,
            max_uri_handlers: 8,
            uri_match_wildcard: true,
            ..Default::default()
        })?;

        server.fn_handler::<(), _>(HEALTH_ROUTE, Method::Get, |req| {
            let mut resp = req.into_ok_response().map_err(|_| ())?;
            let _ = resp.write_all(b"OK");
            Ok(())
        })?;

        let svc = service.clone();
        server.fn_handler::<(), _>(STATUS_ROUTE, Method::Get, move |req| {
            send(req, &endpoint::get_status(&svc))
        })?;

        let svc = service.clone();
        server.fn_handler::<(), _>(IMAGE_ROUTE, Method::Post, move |mut req| {
            let uri = req.uri().to_string();
            let content_type = req.header("Content-Type").map(ToString::to_string);
            let content_len = req.content_len().map(|n| n as usize);
            let reply = endpoint::post_image(
                &svc,
                &uri,
                content_type.as_deref(),
                content_len,
                |buf: &mut [u8]| req.read(buf),
            );
            log_reply("POST", &uri, &reply);
            send(req, &reply)
        })?;

        let svc = service.clone();
        server.fn_handler::<(), _>(IMAGE_ROUTE, Method::Delete, move |req| {
            send(req, &endpoint::delete_image(&svc))
        })?;

        let strip_route = format!("{}*", STRIP_ROUTE_PREFIX);
        let svc = service;
        server.fn_handler::<(), _>(&strip_route, Method::Post, move |mut req| {
            let uri = req.uri().to_string();
            let content_len = req.content_len().map(|n| n as usize);
            let reply = endpoint::post_strip(&svc, &uri, content_len, |buf: &mut [u8]| {
                req.read(buf)
            });
            log_reply("POST", &uri, &reply);
            send(req, &reply)
        })?;

        log::info!("[WEB] image API started on port 80");
        Ok(Self { _server: server })
    }
}

fn log_reply(method: &str, uri: &str, reply: &Reply) {
    if reply.status == 200 {
        log::debug!("[WEB] {} {} -> 200", method, uri);
    } else {
        log::warn!("[WEB] {} {} -> {} {}", method, uri, reply.status, reply.body_str());
    }
}

fn send(req: Request<&mut EspHttpConnection>, reply: &Reply) -> Result<(), ()> {
    let mut resp = req
        .into_response(reply.status, None, &[("Content-Type", "application/json")])
        .map_err(|_| ())?;
    let _ = resp.write_all(&reply.body);
    Ok(())
}
