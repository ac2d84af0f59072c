//! Range-aware content responder.
//!
//! Given a seekable [`ContentSource`], a modification time and a request, the
//! [`ContentResponder`] answers with one of:
//!
//! - `200 OK` with the whole content when no usable `Range` is present
//! - `206 Partial Content` for one range (`Content-Range`) or several (`multipart/byteranges`)
//! - `304 Not Modified` / `412 Precondition Failed` from the conditional headers
//! - `416 Range Not Satisfiable` when the ranges are malformed or start past the end
//!
//! The content size is found by seeking to the end, and every range is served by
//! seeking to its start and reading forward, so content is never materialized.

mod body;
mod conditional;
mod range;

use std::io::SeekFrom;
use std::path::Path;

use axum::body::Body;
use axum::http::header::{
    ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, ETAG, LAST_MODIFIED, RANGE, X_CONTENT_TYPE_OPTIONS,
};
use axum::http::{HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use chrono::{DateTime, SubsecRound, Utc};
pub use conditional::{http_date, parse_http_date};
pub use range::{HttpRange, RangeError, parse_ranges};
use tracing::{debug, warn};

use self::body::Multipart;
use self::conditional::{Precondition, Validators, check_preconditions};
use crate::content::ContentSource;

/// The modification time reported for the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ModifiedTime {
    /// The current time, taken when each request is answered.
    #[default]
    Now,
    Fixed(DateTime<Utc>),
    /// No `Last-Modified`; date-based conditionals are ignored.
    Unset,
}

impl ModifiedTime {
    /// The time to use for one response, truncated to whole seconds.
    /// The Unix epoch counts as unset.
    pub fn resolve(&self) -> Option<DateTime<Utc>> {
        let t = match self {
            ModifiedTime::Now => Utc::now(),
            ModifiedTime::Fixed(t) => *t,
            ModifiedTime::Unset => return None,
        };
        let t = t.trunc_subsecs(0);
        (t.timestamp() != 0).then_some(t)
    }
}

/// Content type for a file name, by extension.
fn content_type_for(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "txt" => "text/plain; charset=utf-8",
        "htm" | "html" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" => "text/javascript; charset=utf-8",
        "json" => "application/json",
        "xml" => "text/xml; charset=utf-8",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "pdf" => "application/pdf",
        "zip" => "application/zip",
        _ => "application/octet-stream",
    }
}

/// A plain-text error response.
fn serve_error(status: StatusCode, msg: &str) -> Response {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8"));
    headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));
    (status, headers, format!("{msg}\n")).into_response()
}

fn not_modified(mut headers: HeaderMap) -> Response {
    headers.remove(CONTENT_TYPE);
    headers.remove(CONTENT_LENGTH);
    if headers.contains_key(ETAG) {
        headers.remove(LAST_MODIFIED);
    }
    (StatusCode::NOT_MODIFIED, headers).into_response()
}

/// Serves a named piece of seekable content with range and conditional semantics.
#[derive(Debug, Clone)]
pub struct ContentResponder {
    name: String,
    modified: ModifiedTime,
    etag: Option<String>,
}

impl ContentResponder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            modified: ModifiedTime::Now,
            etag: None,
        }
    }

    pub fn with_modified(mut self, modified: ModifiedTime) -> Self {
        self.modified = modified;
        self
    }

    /// Sets the entity tag. It must be a quoted tag such as `"v1"` or `W/"v1"`.
    pub fn with_etag(mut self, etag: Option<String>) -> Self {
        self.etag = etag;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Builds the response to one request.
    ///
    /// `content` is seeked and read as the response is produced; the body is streamed
    /// after this returns, so anything else sharing its cursor must stay idle until the
    /// body is consumed.
    pub fn respond<C: ContentSource>(&self, method: &Method, request: &HeaderMap, content: C) -> Response {
        let modified = self.modified.resolve();
        let mut headers = HeaderMap::new();

        if let Some(t) = modified {
            if let Ok(v) = HeaderValue::from_str(&http_date(t)) {
                headers.insert(LAST_MODIFIED, v);
            }
        }
        let etag = self.etag.as_deref().filter(|e| !e.is_empty());
        if let Some(v) = etag.and_then(|e| HeaderValue::from_str(e).ok()) {
            headers.insert(ETAG, v);
        }

        let validators = Validators { modified, etag };
        let honor_range = match check_preconditions(method, request, &validators) {
            Precondition::Proceed { honor_range } => honor_range,
            Precondition::NotModified => {
                debug!(name = %self.name, "not modified");
                return not_modified(headers);
            },
            Precondition::Failed => {
                debug!(name = %self.name, "precondition failed");
                return (StatusCode::PRECONDITION_FAILED, headers).into_response();
            },
        };

        let range_header = request
            .get(RANGE)
            .filter(|_| honor_range)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned());

        let content_type = content_type_for(&self.name);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));

        let size = match content
            .seek(SeekFrom::End(0))
            .and_then(|size| content.seek(SeekFrom::Start(0)).map(|_| size))
        {
            Ok(size) => size,
            Err(e) => {
                warn!(name = %self.name, "failed to size content: {e}");
                return serve_error(StatusCode::INTERNAL_SERVER_ERROR, "seeker can't seek");
            },
        };

        let mut ranges = match range_header.as_deref().map(|h| parse_ranges(h, size)) {
            None => Vec::new(),
            Some(Ok(ranges)) => ranges,
            // An empty resource has nothing to overlap; serve it whole.
            Some(Err(RangeError::NoOverlap)) if size == 0 => Vec::new(),
            Some(Err(e)) => {
                debug!(name = %self.name, range = ?range_header, size, "{e}");
                let mut response = serve_error(StatusCode::RANGE_NOT_SATISFIABLE, &e.to_string());
                if e == RangeError::NoOverlap {
                    if let Ok(v) = HeaderValue::from_str(&format!("bytes */{size}")) {
                        response.headers_mut().insert(CONTENT_RANGE, v);
                    }
                }
                return response;
            },
        };

        // Ranges asking for more than the whole content are answered with the whole content.
        if range::sum_ranges_size(&ranges) > size {
            ranges.clear();
        }

        let send_body = method != Method::HEAD;
        let (status, send_size, stream) = match ranges.as_slice() {
            [] => {
                let stream = send_body.then(|| Body::from_stream(body::section(content, None, size)));
                (StatusCode::OK, size, stream)
            },
            [range] => {
                if let Err(e) = content.seek(SeekFrom::Start(range.start)) {
                    return serve_error(StatusCode::RANGE_NOT_SATISFIABLE, &e.to_string());
                }
                if let Ok(v) = HeaderValue::from_str(&range.content_range(size)) {
                    headers.insert(CONTENT_RANGE, v);
                }
                let stream = send_body.then(|| Body::from_stream(body::section(content, None, range.length)));
                (StatusCode::PARTIAL_CONTENT, range.length, stream)
            },
            ranges => {
                let multipart = Multipart::new(ranges, content_type, size);
                if let Ok(v) = HeaderValue::from_str(&multipart.content_type()) {
                    headers.insert(CONTENT_TYPE, v);
                }
                let send_size = multipart.len();
                let stream = send_body.then(|| Body::from_stream(multipart.into_stream(content)));
                (StatusCode::PARTIAL_CONTENT, send_size, stream)
            },
        };

        headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(send_size));

        debug!(
            name = %self.name,
            %method,
            status = status.as_u16(),
            send_size,
            ranges = ranges.len(),
            "serving content"
        );
        (status, headers, stream.unwrap_or_else(Body::empty)).into_response()
    }
}
