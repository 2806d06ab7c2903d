//! Per-request context
//!
//! A [`Context`] is created by the engine for every request and handed by
//! mutable reference to each handler of the chain. It owns the live request,
//! the response writer and the cursor into the chain.

use crate::middleware::{Body, Chain};
use crate::writer::{ResponseRecorder, ResponseWriter};
use crate::Result;
use http::{HeaderName, HeaderValue, Request, Response, StatusCode};
use std::fmt;
use std::sync::Arc;

/// Cursor value marking an aborted chain
const ABORTED: usize = usize::MAX / 2;

/// Context shared by every handler of one request
pub struct Context {
    request: Request<Body>,
    writer: Box<dyn ResponseWriter>,
    chain: Chain,
    cursor: usize,
}

impl Context {
    /// Create a context writing into a fresh [`ResponseRecorder`]
    pub fn new(request: Request<Body>, chain: Chain) -> Self {
        Self::with_writer(request, Box::new(ResponseRecorder::new()), chain)
    }

    /// Create a context writing into `writer`
    pub fn with_writer(
        request: Request<Body>,
        writer: Box<dyn ResponseWriter>,
        chain: Chain,
    ) -> Self {
        Self {
            request,
            writer,
            chain,
            cursor: 0,
        }
    }

    /// Run the handlers after the current one
    ///
    /// Handlers that return without calling `next` do not stop the chain:
    /// this loop picks up where they left off. Only [`Context::abort`] or an
    /// error stops it. Calling `next` again once the chain has been run, or
    /// after an abort, is a no-op.
    pub async fn next(&mut self) -> Result<()> {
        while self.cursor < self.chain.len() {
            let handler = Arc::clone(&self.chain[self.cursor]);
            self.cursor += 1;
            handler.call(self).await?;
        }
        Ok(())
    }

    /// Prevent any handler that has not started yet from running
    ///
    /// Handlers already on the stack finish normally, and output already
    /// written stays in the response.
    pub fn abort(&mut self) {
        self.cursor = ABORTED;
    }

    /// Whether [`Context::abort`] was called
    pub fn is_aborted(&self) -> bool {
        self.cursor >= ABORTED
    }

    /// Number of handlers that have not started yet
    pub fn remaining(&self) -> usize {
        self.chain.len().saturating_sub(self.cursor)
    }

    /// The live request
    pub fn request(&self) -> &Request<Body> {
        &self.request
    }

    /// Mutable access to the live request
    pub fn request_mut(&mut self) -> &mut Request<Body> {
        &mut self.request
    }

    /// Swap the live request, returning the previous one
    pub fn replace_request(&mut self, request: Request<Body>) -> Request<Body> {
        std::mem::replace(&mut self.request, request)
    }

    /// Typed value from the live request's extensions
    pub fn extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.request.extensions().get::<T>()
    }

    /// The response writer
    pub fn writer(&self) -> &dyn ResponseWriter {
        self.writer.as_ref()
    }

    /// Mutable access to the response writer
    pub fn writer_mut(&mut self) -> &mut dyn ResponseWriter {
        self.writer.as_mut()
    }

    /// Swap the response writer, returning the previous one
    pub fn replace_writer(&mut self, writer: Box<dyn ResponseWriter>) -> Box<dyn ResponseWriter> {
        std::mem::replace(&mut self.writer, writer)
    }

    /// Set a response header
    pub fn header(&mut self, name: &str, value: &str) -> Result<()> {
        let name = HeaderName::from_bytes(name.as_bytes()).map_err(http::Error::from)?;
        let value = HeaderValue::from_str(value).map_err(http::Error::from)?;
        self.writer.headers_mut().insert(name, value);
        Ok(())
    }

    /// Current response status
    pub fn status(&self) -> StatusCode {
        self.writer.status()
    }

    /// Set the response status
    pub fn set_status(&mut self, status: StatusCode) {
        self.writer.set_status(status);
    }

    /// Append bytes to the response body
    pub fn write(&mut self, buf: &[u8]) -> usize {
        self.writer.write(buf)
    }

    /// Finish the context into the response written so far
    pub fn into_response(self) -> Response<Body> {
        self.writer.into_response()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("method", self.request.method())
            .field("uri", self.request.uri())
            .field("remaining", &self.remaining())
            .field("aborted", &self.is_aborted())
            .field("writer", &self.writer)
            .finish()
    }
}
