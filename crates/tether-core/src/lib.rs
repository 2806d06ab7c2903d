//! # Tether Core
//!
//! Context-passing handler chain used as the host side of Tether bridges.
//!
//! This crate provides:
//! - The [`Middleware`] trait shared by middleware and terminal handlers
//! - The per-request [`Context`] with `next` / `abort` chain control
//! - Response writers
//! - The [`Engine`] that resolves and runs chains
//! - Error types

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod context;
pub mod engine;
pub mod error;
pub mod middleware;
pub mod writer;

pub use context::Context;
pub use engine::{Engine, EngineBuilder};
pub use error::{Error, Result};
pub use middleware::{from_fn, Body, Chain, FnMiddleware, Middleware};
pub use writer::{apply_response, replace_response, ResponseRecorder, ResponseWriter};

#[doc(hidden)]
pub use async_trait::async_trait;

// Re-export commonly used HTTP types
pub use bytes::Bytes;
pub use http::{Method, Request, Response, StatusCode};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::context::Context;
    pub use crate::engine::{Engine, EngineBuilder};
    pub use crate::error::{Error, Result};
    pub use crate::middleware::{from_fn, Body, Middleware};
    pub use crate::writer::{ResponseRecorder, ResponseWriter};
}
