//! Response writers
//!
//! Handlers in the chain never return a response. They write status,
//! headers and body through the [`ResponseWriter`] held by the
//! [`Context`](crate::Context), and the engine turns the writer into an
//! `http::Response` once the chain has unwound.

use crate::middleware::Body;
use bytes::{Bytes, BytesMut};
use http::{HeaderMap, HeaderName, Response, StatusCode};
use http_body_util::Full;
use std::any::Any;
use std::fmt;

/// Sink for the response of one request
///
/// `headers`, `headers_mut`, `status`, `set_status` and `write` are the
/// plain HTTP surface. `size` and `written` describe what has been committed
/// to the response this writer ultimately feeds.
pub trait ResponseWriter: Send + fmt::Debug + 'static {
    /// Response headers written so far
    fn headers(&self) -> &HeaderMap;

    /// Mutable access to the response headers
    fn headers_mut(&mut self) -> &mut HeaderMap;

    /// Current status code
    fn status(&self) -> StatusCode;

    /// Set the status code
    fn set_status(&mut self, status: StatusCode);

    /// Append bytes to the body, returning the number of bytes accepted
    fn write(&mut self, buf: &[u8]) -> usize;

    /// Number of body bytes written
    fn size(&self) -> usize;

    /// Whether a status or body has been written explicitly
    fn written(&self) -> bool;

    /// Finish the writer into a response
    fn into_response(self: Box<Self>) -> Response<Body>;

    /// Convert into `Any` so wrappers can recover their concrete type
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;

    /// Append a string to the body
    fn write_str(&mut self, s: &str) -> usize {
        self.write(s.as_bytes())
    }
}

/// In-memory [`ResponseWriter`]
///
/// The engine gives one to every request. It is also what a bridge records
/// downstream output into.
#[derive(Debug, Clone)]
pub struct ResponseRecorder {
    status: StatusCode,
    headers: HeaderMap,
    body: BytesMut,
    written: bool,
}

impl ResponseRecorder {
    /// Create an empty `200 OK` recorder
    pub fn new() -> Self {
        Self::with_head(StatusCode::OK, HeaderMap::new())
    }

    /// Create a recorder that starts from an existing status and header set
    ///
    /// The seeded head does not count as written.
    pub fn with_head(status: StatusCode, headers: HeaderMap) -> Self {
        Self {
            status,
            headers,
            body: BytesMut::new(),
            written: false,
        }
    }

    /// Body bytes recorded so far
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consume the recorder into its parts
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Bytes) {
        (self.status, self.headers, self.body.freeze())
    }
}

impl Default for ResponseRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseWriter for ResponseRecorder {
    fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn set_status(&mut self, status: StatusCode) {
        self.status = status;
        self.written = true;
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.body.extend_from_slice(buf);
        self.written = true;
        buf.len()
    }

    fn size(&self) -> usize {
        self.body.len()
    }

    fn written(&self) -> bool {
        self.written
    }

    fn into_response(self: Box<Self>) -> Response<Body> {
        let (status, headers, body) = self.into_parts();
        let mut response = Response::new(Full::new(body));
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        response
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Write a finished response onto `writer`
///
/// Each header name present in `headers` replaces the writer's values for
/// that name; other headers already on the writer are kept. The status is
/// only set when it differs from the writer's, and an empty body writes
/// nothing, so applying an untouched response leaves `written` as it was.
pub fn apply_response(
    writer: &mut dyn ResponseWriter,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
) {
    let mut current: Option<HeaderName> = None;
    for (name, value) in headers {
        match name {
            Some(name) => {
                writer.headers_mut().insert(name.clone(), value);
                current = Some(name);
            }
            None => {
                if let Some(name) = &current {
                    writer.headers_mut().append(name.clone(), value);
                }
            }
        }
    }

    write_status_and_body(writer, status, body);
}

/// Write a finished response onto `writer`, replacing all of its headers
///
/// Used when `headers` was built from the writer's own header set, so that a
/// header removed along the way stays removed. Status and body are handled
/// as in [`apply_response`].
pub fn replace_response(
    writer: &mut dyn ResponseWriter,
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
) {
    *writer.headers_mut() = headers;
    write_status_and_body(writer, status, body);
}

fn write_status_and_body(writer: &mut dyn ResponseWriter, status: StatusCode, body: Bytes) {
    if writer.status() != status {
        writer.set_status(status);
    }

    if !body.is_empty() {
        writer.write(&body);
    }
}
