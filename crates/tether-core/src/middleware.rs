//! Middleware trait and utilities

use crate::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::BoxFuture;
use http_body_util::Full;
use std::fmt;
use std::sync::Arc;

/// Body type alias
pub type Body = Full<Bytes>;

/// Ordered handlers run for one request
pub type Chain = Arc<[Arc<dyn Middleware>]>;

/// A handler in the chain
///
/// Middleware and terminal handlers share this trait. A handler runs the
/// rest of the chain with [`Context::next`]; if it returns without doing so,
/// the engine still moves on to the following handler unless
/// [`Context::abort`] was called.
#[async_trait]
pub trait Middleware: Send + Sync + fmt::Debug {
    /// Process a request
    ///
    /// # Arguments
    ///
    /// * `ctx` - The per-request context holding the live request, the
    ///   response writer and the chain cursor
    async fn call(&self, ctx: &mut Context) -> Result<()>;
}

/// Middleware built from a closure, see [`from_fn`]
pub struct FnMiddleware<F> {
    f: F,
}

impl<F> fmt::Debug for FnMiddleware<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnMiddleware")
            .field("f", &std::any::type_name::<F>())
            .finish()
    }
}

#[async_trait]
impl<F> Middleware for FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    async fn call(&self, ctx: &mut Context) -> Result<()> {
        (self.f)(ctx).await
    }
}

/// Create a middleware from a closure returning a boxed future
///
/// ```
/// use tether_core::{from_fn, Context};
///
/// let handler = from_fn(|ctx: &mut Context| {
///     Box::pin(async move {
///         ctx.header("x-served-by", "tether")?;
///         ctx.next().await
///     })
/// });
/// # let _ = handler;
/// ```
pub fn from_fn<F>(f: F) -> FnMiddleware<F>
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, Result<()>> + Send + Sync,
{
    FnMiddleware { f }
}

/// Helper macro for turning an `async fn(&mut Context) -> Result<()>` into a
/// named middleware type
#[macro_export]
macro_rules! middleware_fn {
    ($name:ident, $func:expr) => {
        #[derive(Debug)]
        struct $name;

        #[$crate::async_trait]
        impl $crate::Middleware for $name {
            async fn call(&self, ctx: &mut $crate::Context) -> $crate::Result<()> {
                $func(ctx).await
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use http::Request;
    use http_body_util::BodyExt;

    #[derive(Debug)]
    struct Tag {
        name: &'static str,
    }

    #[async_trait]
    impl Middleware for Tag {
        async fn call(&self, ctx: &mut Context) -> Result<()> {
            ctx.write(self.name.as_bytes());
            ctx.next().await
        }
    }

    async fn deny(ctx: &mut Context) -> Result<()> {
        ctx.abort();
        Ok(())
    }

    middleware_fn!(Deny, deny);

    fn request() -> Request<Body> {
        Request::builder()
            .uri("/test")
            .body(Body::from("test"))
            .unwrap()
    }

    #[tokio::test]
    async fn test_middleware_chain() {
        let chain: Chain = Arc::new([
            Arc::new(Tag { name: "first" }) as Arc<dyn Middleware>,
            Arc::new(Tag { name: "second" }) as Arc<dyn Middleware>,
        ]);

        let mut ctx = Context::new(request(), chain);
        ctx.next().await.unwrap();

        let response = ctx.into_response();
        assert_eq!(response.status(), http::StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(body, "firstsecond");
    }

    #[tokio::test]
    async fn test_macro_middleware_aborts() {
        let chain: Chain = Arc::new([
            Arc::new(Deny) as Arc<dyn Middleware>,
            Arc::new(Tag { name: "unreachable" }) as Arc<dyn Middleware>,
        ]);

        let mut ctx = Context::new(request(), chain);
        ctx.next().await.unwrap();

        assert!(ctx.is_aborted());
        assert_eq!(ctx.writer().size(), 0);
    }

    #[tokio::test]
    async fn test_fn_middleware_error_stops_chain() {
        let failing = from_fn(|_ctx: &mut Context| {
            Box::pin(async move { Err::<(), _>(Error::middleware("rejected")) })
        });
        let chain: Chain = Arc::new([
            Arc::new(failing) as Arc<dyn Middleware>,
            Arc::new(Tag { name: "unreachable" }) as Arc<dyn Middleware>,
        ]);

        let mut ctx = Context::new(request(), chain);
        let err = ctx.next().await.unwrap_err();

        assert!(matches!(err, Error::Middleware(_)));
        assert_eq!(ctx.writer().size(), 0);
    }
}
