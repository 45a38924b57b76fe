//! JSON bodies of the image API

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde::Serialize;

use crate::config::DisplayTimeout;
use crate::error::ImageError;

/// `{"success":..,"message":..}` body shared by every mutating route
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ApiResponse {
    pub fn queued(timeout: DisplayTimeout) -> Self {
        Self {
            success: true,
            message: Some(alloc::format!("Image queued for display ({timeout})")),
        }
    }

    pub fn dismissed() -> Self {
        Self {
            success: true,
            message: Some("Image dismissed".to_string()),
        }
    }

    pub fn strip_ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failure(err: &ImageError) -> Self {
        Self {
            success: false,
            message: Some(err.to_string()),
        }
    }

    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| b"{\"success\":false}".to_vec())
    }
}

/// Body of `GET /api/display/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub phase: &'static str,
    /// Milliseconds until auto-dismiss, `null` without a deadline
    pub remaining_ms: Option<u64>,
    pub rows_written: u16,
    pub image_height: u16,
    pub free_heap: usize,
}

impl StatusReport {
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|_| b"{}".to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;

    fn json(resp: &ApiResponse) -> String {
        String::from_utf8(resp.to_json()).unwrap()
    }

    #[test]
    fn queued_message_names_the_timeout() {
        assert_eq!(
            json(&ApiResponse::queued(DisplayTimeout::Seconds(5))),
            r#"{"success":true,"message":"Image queued for display (5s timeout)"}"#
        );
        assert_eq!(
            json(&ApiResponse::queued(DisplayTimeout::Never)),
            r#"{"success":true,"message":"Image queued for display (no timeout)"}"#
        );
    }

    #[test]
    fn strip_ok_has_no_message() {
        assert_eq!(json(&ApiResponse::strip_ok()), r#"{"success":true}"#);
    }

    #[test]
    fn failures_carry_the_error_text() {
        let err = ImageError::from(ValidationError::Empty);
        assert_eq!(
            json(&ApiResponse::failure(&err)),
            r#"{"success":false,"message":"empty payload"}"#
        );
    }

    #[test]
    fn status_serializes_null_remaining() {
        let report = StatusReport {
            phase: "idle",
            remaining_ms: None,
            rows_written: 0,
            image_height: 280,
            free_heap: 1000,
        };
        assert_eq!(
            String::from_utf8(report.to_json()).unwrap(),
            r#"{"phase":"idle","remaining_ms":null,"rows_written":0,"image_height":280,"free_heap":1000}"#
        );
    }
}
