//! Request engine
//!
//! The engine resolves a handler chain for every request, runs it on a fresh
//! [`Context`] and returns whatever the chain wrote. Routes are matched on the
//! exact path and method; global middleware registered with
//! [`EngineBuilder::with_middleware`] runs in front of every route that is
//! registered after it, and in front of the 404/405 fallbacks.

use crate::middleware::{Body, Chain, Middleware};
use crate::{Context, Error, Result};
use async_trait::async_trait;
use futures::future::BoxFuture;
use http::{Method, Request, Response, StatusCode};
use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;
use std::task::{Context as TaskContext, Poll};
use tower::Service;
use tracing::{debug, warn};

/// Engine builder
#[derive(Debug, Default)]
pub struct EngineBuilder {
    middlewares: Vec<Arc<dyn Middleware>>,
    routes: Vec<RouteEntry>,
}

#[derive(Debug)]
struct RouteEntry {
    method: Method,
    path: String,
    chain: Vec<Arc<dyn Middleware>>,
}

impl EngineBuilder {
    /// Create a new engine builder
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add global middleware
    ///
    /// Applies to routes registered after this call and to the fallbacks.
    #[must_use]
    pub fn with_middleware<M: Middleware + 'static>(self, middleware: M) -> Self {
        self.with_shared_middleware(Arc::new(middleware))
    }

    /// Add global middleware that is already shared
    #[must_use]
    pub fn with_shared_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Register a terminal handler for a method and exact path
    #[must_use]
    pub fn route<H: Middleware + 'static>(mut self, method: Method, path: &str, handler: H) -> Self {
        let mut chain = self.middlewares.clone();
        chain.push(Arc::new(handler));
        self.routes.push(RouteEntry {
            method,
            path: path.to_string(),
            chain,
        });
        self
    }

    /// Register a `GET` handler
    #[must_use]
    pub fn get<H: Middleware + 'static>(self, path: &str, handler: H) -> Self {
        self.route(Method::GET, path, handler)
    }

    /// Register a `POST` handler
    #[must_use]
    pub fn post<H: Middleware + 'static>(self, path: &str, handler: H) -> Self {
        self.route(Method::POST, path, handler)
    }

    /// Get the number of global middlewares
    #[must_use]
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    /// Check if no global middleware was added
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Build the engine
    pub fn build(self) -> Result<Engine> {
        let mut routes: HashMap<String, HashMap<Method, Chain>> = HashMap::new();

        for entry in self.routes {
            if !entry.path.starts_with('/') {
                return Err(Error::Config(format!(
                    "path must start with '/': {}",
                    entry.path
                )));
            }

            let by_method = routes.entry(entry.path.clone()).or_default();
            if by_method.contains_key(&entry.method) {
                return Err(Error::Config(format!(
                    "duplicate route {} {}",
                    entry.method, entry.path
                )));
            }

            debug!(method = %entry.method, path = %entry.path, handlers = entry.chain.len(), "Route registered");
            by_method.insert(entry.method, entry.chain.into());
        }

        let not_found = fallback(&self.middlewares, StatusCode::NOT_FOUND);
        let not_allowed = fallback(&self.middlewares, StatusCode::METHOD_NOT_ALLOWED);

        Ok(Engine {
            inner: Arc::new(Inner {
                routes,
                not_found,
                not_allowed,
            }),
        })
    }
}

fn fallback(middlewares: &[Arc<dyn Middleware>], status: StatusCode) -> Chain {
    let mut chain = middlewares.to_vec();
    chain.push(Arc::new(Fallback(status)));
    chain.into()
}

/// Terminal handler used when no route matches
#[derive(Debug)]
struct Fallback(StatusCode);

#[async_trait]
impl Middleware for Fallback {
    async fn call(&self, ctx: &mut Context) -> Result<()> {
        ctx.set_status(self.0);
        let reason = self.0.canonical_reason().unwrap_or_default();
        ctx.write(reason.to_ascii_lowercase().as_bytes());
        Ok(())
    }
}

struct Inner {
    routes: HashMap<String, HashMap<Method, Chain>>,
    not_found: Chain,
    not_allowed: Chain,
}

/// Handler chain engine
///
/// Cloning is cheap; clones share the route table.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("routes", &self.route_count())
            .finish()
    }
}

impl Engine {
    /// Create a new engine builder
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Total number of method/path routes
    pub fn route_count(&self) -> usize {
        self.inner.routes.values().map(HashMap::len).sum()
    }

    fn resolve(&self, method: &Method, path: &str) -> Chain {
        match self.inner.routes.get(path) {
            Some(by_method) => match by_method.get(method) {
                Some(chain) => Arc::clone(chain),
                None => Arc::clone(&self.inner.not_allowed),
            },
            None => Arc::clone(&self.inner.not_found),
        }
    }

    /// Run the chain for `request` and return the response it wrote
    ///
    /// A handler error is logged; if nothing was written yet the response
    /// status becomes the error's status code.
    pub async fn handle(&self, request: Request<Body>) -> Response<Body> {
        let chain = self.resolve(request.method(), request.uri().path());
        let method = request.method().clone();
        let path = request.uri().path().to_string();

        let mut ctx = Context::new(request, chain);
        if let Err(e) = ctx.next().await {
            warn!(method = %method, path = %path, error = %e, "Handler chain failed");
            if !ctx.writer().written() {
                ctx.set_status(e.to_status_code());
            }
        }

        ctx.into_response()
    }
}

impl Service<Request<Body>> for Engine {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = BoxFuture<'static, std::result::Result<Response<Body>, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut TaskContext<'_>) -> Poll<std::result::Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request<Body>) -> Self::Future {
        let engine = self.clone();
        Box::pin(async move { Ok(engine.handle(request).await) })
    }
}
