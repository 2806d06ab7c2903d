//! Request and writer substitution
//!
//! While the handler chain is continued on behalf of a tower service, the
//! context runs with the request the service passed on and with a writer
//! that records into a [`ResponseRecorder`]. [`Substitution`] puts both back
//! when it is finished or dropped, including when a downstream handler
//! panics or the bridged call is cancelled.

use crate::error::{BridgeError, Result};
use http::{HeaderMap, Request, Response, StatusCode};
use std::any::Any;
use std::ops::{Deref, DerefMut};
use tether_core::{replace_response, Body, Context, ResponseRecorder, ResponseWriter};
use tracing::warn;

/// Writer installed for the duration of a continuation
///
/// Status, headers and body go to the recorder. `size` and `written` cover
/// both the native writer and what was recorded, so they describe the
/// response as it will be sent.
#[derive(Debug)]
pub struct SwappedWriter {
    native: Box<dyn ResponseWriter>,
    inner: ResponseRecorder,
}

impl SwappedWriter {
    /// Wrap `native`, recording into a recorder seeded with its status and
    /// headers
    pub fn new(native: Box<dyn ResponseWriter>) -> Self {
        let inner = ResponseRecorder::with_head(native.status(), native.headers().clone());
        Self { native, inner }
    }

    /// Output recorded so far
    pub fn recorded(&self) -> &ResponseRecorder {
        &self.inner
    }

    /// Split into the native writer and the recorder
    pub fn into_parts(self) -> (Box<dyn ResponseWriter>, ResponseRecorder) {
        (self.native, self.inner)
    }
}

impl ResponseWriter for SwappedWriter {
    fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    fn status(&self) -> StatusCode {
        self.inner.status()
    }

    fn set_status(&mut self, status: StatusCode) {
        self.inner.set_status(status);
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.inner.write(buf)
    }

    fn size(&self) -> usize {
        self.native.size() + self.inner.size()
    }

    fn written(&self) -> bool {
        self.native.written() || self.inner.written()
    }

    fn into_response(self: Box<Self>) -> Response<Body> {
        let Self { mut native, inner } = *self;
        let (status, headers, body) = inner.into_parts();
        replace_response(native.as_mut(), status, headers, body);
        native.into_response()
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Guard over a context running with a substituted request and writer
pub(crate) struct Substitution<'a> {
    ctx: &'a mut Context,
    saved: Option<Request<Body>>,
}

impl<'a> Substitution<'a> {
    /// Install `request` and a [`SwappedWriter`] on `ctx`
    pub(crate) fn new(ctx: &'a mut Context, request: Request<Body>) -> Self {
        let saved = ctx.replace_request(request);
        let native = ctx.replace_writer(Box::new(ResponseRecorder::new()));
        ctx.replace_writer(Box::new(SwappedWriter::new(native)));

        Self {
            ctx,
            saved: Some(saved),
        }
    }

    /// Restore the context and return what was recorded
    pub(crate) fn finish(mut self) -> Result<ResponseRecorder> {
        self.restore()
    }

    fn restore(&mut self) -> Result<ResponseRecorder> {
        let Some(saved) = self.saved.take() else {
            return Ok(ResponseRecorder::new());
        };

        let current = self.ctx.replace_writer(Box::new(ResponseRecorder::new()));
        let recorded = match current.into_any().downcast::<SwappedWriter>() {
            Ok(swapped) => {
                let (native, inner) = swapped.into_parts();
                self.ctx.replace_writer(native);
                Ok(inner)
            }
            Err(_) => Err(BridgeError::WriterReplaced),
        };

        self.ctx.replace_request(saved);
        recorded
    }
}

impl Deref for Substitution<'_> {
    type Target = Context;

    fn deref(&self) -> &Context {
        &*self.ctx
    }
}

impl DerefMut for Substitution<'_> {
    fn deref_mut(&mut self) -> &mut Context {
        &mut *self.ctx
    }
}

impl Drop for Substitution<'_> {
    fn drop(&mut self) {
        if self.saved.is_some() {
            if let Err(e) = self.restore() {
                warn!(error = %e, "Failed to restore context after interrupted continuation");
            }
        }
    }
}
