//! Request URI helpers shared by the HTTP routes and the harness

use alloc::string::String;

use crate::error::ValidationError;

pub const IMAGE_ROUTE: &str = "/api/display/image";
pub const STRIP_ROUTE_PREFIX: &str = "/api/display/strip/";
pub const STATUS_ROUTE: &str = "/api/display/status";
pub const HEALTH_ROUTE: &str = "/api/health";

/// Name of the multipart field carrying the JPEG
pub const IMAGE_FIELD: &str = "image";

/// Value of `key` in the query string of `uri`, percent-decoded
pub fn query_param(uri: &str, key: &str) -> Option<String> {
    let (_, query) = uri.split_once('?')?;
    for pair in query.split('&') {
        let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
        if percent_decode(k) == key {
            return Some(percent_decode(v));
        }
    }
    None
}

pub fn percent_decode(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let bytes = value.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let h1 = (bytes[i + 1] as char).to_digit(16);
            let h2 = (bytes[i + 2] as char).to_digit(16);
            if let (Some(a), Some(b)) = (h1, h2) {
                out.push((a * 16 + b) as u8 as char);
                i += 3;
                continue;
            }
        }
        if bytes[i] == b'+' {
            out.push(' ');
        } else {
            out.push(bytes[i] as char);
        }
        i += 1;
    }
    out
}

/// Path without its query string
pub fn path_of(uri: &str) -> &str {
    uri.split_once('?').map_or(uri, |(path, _)| path)
}

/// `{index}` of `/api/display/strip/{index}`
pub fn strip_index(uri: &str) -> Result<u32, ValidationError> {
    path_of(uri)
        .strip_prefix(STRIP_ROUTE_PREFIX)
        .map(|rest| rest.trim_end_matches('/'))
        .filter(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|rest| rest.parse().ok())
        .ok_or(ValidationError::BadStripIndex)
}

fn numeric<T: core::str::FromStr>(
    uri: &str,
    key: &'static str,
) -> Result<Option<T>, ValidationError> {
    match query_param(uri, key) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ValidationError::BadParameter(key)),
    }
}

/// Query parameters of a strip request; only strip 0 uses them
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StripQuery {
    pub timeout: Option<String>,
    pub width: Option<u16>,
    pub height: Option<u16>,
    /// Number of strips the client will send
    pub total: Option<u32>,
}

impl StripQuery {
    pub fn parse(uri: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            timeout: query_param(uri, "timeout"),
            width: numeric(uri, "width")?,
            height: numeric(uri, "height")?,
            total: numeric(uri, "total")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_values_are_decoded() {
        let uri = "/api/display/image?x=1&timeout=%33%30&flag";
        assert_eq!(query_param(uri, "timeout").as_deref(), Some("30"));
        assert_eq!(query_param(uri, "flag").as_deref(), Some(""));
        assert_eq!(query_param(uri, "missing"), None);
        assert_eq!(query_param("/api/display/image", "timeout"), None);
    }

    #[test]
    fn trailing_percent_is_kept_literally() {
        assert_eq!(percent_decode("5%"), "5%");
        assert_eq!(percent_decode("a%4"), "a%4");
        assert_eq!(percent_decode("a+b%21"), "a b!");
    }

    #[test]
    fn strip_index_parses_path_only() {
        assert_eq!(strip_index("/api/display/strip/0"), Ok(0));
        assert_eq!(strip_index("/api/display/strip/12?timeout=5"), Ok(12));
        assert_eq!(strip_index("/api/display/strip/"), Err(ValidationError::BadStripIndex));
        assert_eq!(strip_index("/api/display/strip/-1"), Err(ValidationError::BadStripIndex));
        assert_eq!(strip_index("/api/display/strip/x1"), Err(ValidationError::BadStripIndex));
        assert_eq!(
            strip_index("/api/display/strip/99999999999"),
            Err(ValidationError::BadStripIndex)
        );
    }

    #[test]
    fn strip_query_reads_geometry() {
        let q = StripQuery::parse("/api/display/strip/0?timeout=0&width=240&height=120&total=3")
            .unwrap();
        assert_eq!(q.timeout.as_deref(), Some("0"));
        assert_eq!((q.width, q.height, q.total), (Some(240), Some(120), Some(3)));
        assert_eq!(
            StripQuery::parse("/api/display/strip/0?height=tall"),
            Err(ValidationError::BadParameter("height"))
        );
    }
}
