//! Continuation service
//!
//! [`NextService`] is the innermost service handed to a tower layer. Calling
//! it runs the remainder of the handler chain with the request it was given
//! and resolves to whatever that remainder wrote.

use crate::error::BridgeError;
use crate::relay::{self, BridgeKey};
use futures::future::BoxFuture;
use http::{Request, Response};
use http_body_util::{BodyExt, Full};
use std::task::{Context as TaskContext, Poll};
use tether_core::Body;
use tower::{BoxError, Service};
use tracing::trace;

/// Innermost service of a bridge
///
/// Only valid inside the adapter created alongside it by [`crate::new`].
/// Calling it on a request that did not come through that adapter panics.
#[derive(Debug, Clone)]
pub struct NextService {
    key: BridgeKey,
}

impl NextService {
    pub(crate) fn new(key: BridgeKey) -> Self {
        Self { key }
    }

    /// Key of the bridge this service belongs to
    pub fn key(&self) -> BridgeKey {
        self.key
    }
}

impl<B> Service<Request<B>> for NextService
where
    B: http_body::Body<Data = bytes::Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    type Response = Response<Body>;
    type Error = BridgeError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<B>) -> Self::Future {
        let relay = match relay::lookup(&request, self.key) {
            Ok(relay) => relay,
            Err(_) => panic!(
                "NextService for {} called outside a bridged middleware",
                self.key
            ),
        };

        Box::pin(async move {
            let (parts, body) = request.into_parts();
            let bytes = body
                .collect()
                .await
                .map_err(|e| BridgeError::Body(e.into()))?
                .to_bytes();

            trace!(key = %relay.key(), "Continuing handler chain");
            relay
                .resume(Request::from_parts(parts, Full::new(bytes)))
                .await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tower::ServiceExt;

    #[tokio::test]
    #[should_panic(expected = "outside a bridged middleware")]
    async fn test_call_without_relay_panics() {
        let service = NextService::new(BridgeKey::next());
        let request = Request::builder().uri("/").body(Body::default()).unwrap();
        let _ = service.oneshot(request).await;
    }

    #[tokio::test]
    async fn test_closed_relay_is_an_error() {
        let key = BridgeKey::next();
        let (relay, receiver) = relay::Relay::open(key);
        drop(receiver);

        let mut request = Request::builder().uri("/").body(Body::default()).unwrap();
        relay::attach(&mut request, relay);

        let err = NextService::new(key).oneshot(request).await.unwrap_err();
        assert!(matches!(err, BridgeError::RelayClosed(k) if k == key));
    }
}
