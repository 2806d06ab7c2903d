//! Bridged middleware
//!
//! [`Bridged`] runs a tower service as a handler of the chain. Each
//! invocation opens a relay, hands a duplicate of the live request to the
//! service and serves continuation requests coming back through
//! [`NextService`](crate::NextService) until the service's future resolves.
//! The service's response is then written onto the context's writer.

use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::relay::{self, BridgeKey, Relay};
use crate::swap::Substitution;
use async_trait::async_trait;
use bytes::Bytes;
use http::{Request, Response};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use std::fmt;
use std::sync::Arc;
use tether_core::{apply_response, replace_response, Body, Context, Middleware, ResponseWriter};
use tower::{BoxError, Service, ServiceExt};
use tracing::{debug, debug_span, trace, Instrument};

/// Converts tower services built around a [`NextService`](crate::NextService)
/// into chain handlers
#[derive(Debug, Clone)]
pub struct Adapter {
    key: BridgeKey,
    config: Arc<BridgeConfig>,
}

impl Adapter {
    pub(crate) fn new(key: BridgeKey, config: BridgeConfig) -> Self {
        Self {
            key,
            config: Arc::new(config),
        }
    }

    /// Key of the bridge this adapter belongs to
    pub fn key(&self) -> BridgeKey {
        self.key
    }

    /// Configuration applied to adapted services
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Turn `service` into a chain handler
    ///
    /// `service` must reach the rest of the chain only through the
    /// `NextService` created together with this adapter.
    pub fn adapt<S>(&self, service: S) -> Bridged<S> {
        Bridged {
            service,
            key: self.key,
            config: Arc::clone(&self.config),
        }
    }
}

/// A tower service running as a chain handler
#[derive(Clone)]
pub struct Bridged<S> {
    service: S,
    key: BridgeKey,
    config: Arc<BridgeConfig>,
}

impl<S> Bridged<S> {
    /// Key of the bridge this handler belongs to
    pub fn key(&self) -> BridgeKey {
        self.key
    }

    /// The wrapped service
    pub fn get_ref(&self) -> &S {
        &self.service
    }
}

impl<S> fmt::Debug for Bridged<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bridged")
            .field("name", &self.config.name)
            .field("key", &self.key)
            .field("service", &std::any::type_name::<S>())
            .finish()
    }
}

#[async_trait]
impl<S, ResBody> Middleware for Bridged<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    ResBody: http_body::Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    async fn call(&self, ctx: &mut Context) -> tether_core::Result<()> {
        let span = debug_span!("bridge", name = %self.config.name, key = %self.key);
        self.relay(ctx).instrument(span).await
    }
}

impl<S, ResBody> Bridged<S>
where
    S: Service<Request<Body>, Response = Response<ResBody>> + Clone + Send + Sync + 'static,
    S::Future: Send,
    S::Error: Into<BoxError> + Send,
    ResBody: http_body::Body<Data = Bytes> + Send + 'static,
    ResBody::Error: Into<BoxError>,
{
    async fn relay(&self, ctx: &mut Context) -> tether_core::Result<()> {
        let (relay, mut continuations) = Relay::open(self.key);

        let mut request = duplicate_request(ctx.request());
        relay::attach(&mut request, Arc::clone(&relay));
        trace!(key = %self.key, "Relay registered");

        let call = self.service.clone().oneshot(request);
        tokio::pin!(call);

        let mut downstream: Option<tether_core::Error> = None;
        let outcome = loop {
            tokio::select! {
                biased;

                Some(continuation) = continuations.recv() => {
                    let reply = continue_chain(ctx, continuation.request, &mut downstream).await;
                    let _ = continuation.reply.send(reply);
                }
                outcome = &mut call => break outcome,
            }
        };
        drop(continuations);

        if let Some(e) = downstream {
            debug!(error = %e, "Handler chain failed behind bridged service");
            return Err(e);
        }

        let response = outcome.map_err(|e| BridgeError::Service(e.into()))?;
        let (parts, body) = response.into_parts();
        let body = collect_body(body, self.config.max_response_body).await?;

        // A continued response was seeded with the writer's own headers
        if relay.continued() {
            replace_response(ctx.writer_mut(), parts.status, parts.headers, body);
        } else {
            apply_response(ctx.writer_mut(), parts.status, parts.headers, body);
            debug!("Bridged service did not continue the chain");
            ctx.abort();
        }

        Ok(())
    }
}

/// Run the rest of the chain with `request`, recording what it writes
///
/// The first handler error is kept in `downstream` so the bridged handler
/// can return it unchanged.
async fn continue_chain(
    ctx: &mut Context,
    request: Request<Body>,
    downstream: &mut Option<tether_core::Error>,
) -> Result<Response<Body>> {
    debug!(remaining = ctx.remaining(), "Running continuation");
    let mut substitution = Substitution::new(ctx, request);
    let outcome = substitution.next().await;
    let recorded = substitution.finish()?;

    match outcome {
        Ok(()) => Ok(Box::new(recorded).into_response()),
        Err(e) => {
            let message = e.to_string();
            if downstream.is_none() {
                *downstream = Some(e);
            }
            Err(BridgeError::Downstream(message))
        }
    }
}

/// Copy of the live request for the wrapped service
///
/// The body is shared and the extensions are cloned, so values the service
/// inserts are only visible downstream of the bridge.
fn duplicate_request(request: &Request<Body>) -> Request<Body> {
    let mut duplicate = Request::new(request.body().clone());
    *duplicate.method_mut() = request.method().clone();
    *duplicate.uri_mut() = request.uri().clone();
    *duplicate.version_mut() = request.version();
    *duplicate.headers_mut() = request.headers().clone();
    *duplicate.extensions_mut() = request.extensions().clone();
    duplicate
}

async fn collect_body<B>(body: B, limit: Option<usize>) -> Result<Bytes>
where
    B: http_body::Body<Data = Bytes> + Send,
    B::Error: Into<BoxError>,
{
    match limit {
        Some(limit) => Limited::new(body, limit)
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| {
                if e.is::<LengthLimitError>() {
                    BridgeError::BodyTooLarge(limit)
                } else {
                    BridgeError::Body(e)
                }
            }),
        None => body
            .collect()
            .await
            .map(|collected| collected.to_bytes())
            .map_err(|e| BridgeError::Body(e.into())),
    }
}
