//! # Tether Bridge
//!
//! Run tower middleware inside a Tether handler chain.
//!
//! A tower [`Layer`] expects to wrap an inner service and call it to reach the
//! rest of the request pipeline. A Tether chain instead hands each handler a
//! [`Context`](tether_core::Context) and lets it call `next`. A bridge joins
//! the two: [`new`] returns a [`NextService`] to build the tower middleware
//! around, and an [`Adapter`] that turns the resulting service into a chain
//! handler.
//!
//! ```
//! use tether_bridge::{wrap, BridgeConfig};
//! use tether_core::Engine;
//! use tower_http::set_header::SetResponseHeaderLayer;
//! use http::{header::SERVER, HeaderValue};
//!
//! let engine = Engine::builder()
//!     .with_middleware(wrap(SetResponseHeaderLayer::overriding(
//!         SERVER,
//!         HeaderValue::from_static("tether"),
//!     )))
//!     .build()
//!     .unwrap();
//! # let _ = (engine, BridgeConfig::default());
//! ```
//!
//! When the tower middleware calls the [`NextService`], the handlers after
//! the bridge run with the request it passed on, and their output comes back
//! to it as the response. When it never does, the handlers after the bridge
//! are skipped and only its own response is written.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    missing_debug_implementations,
    rust_2018_idioms,
    unreachable_pub
)]

pub mod adapter;
pub mod config;
pub mod error;
pub mod next;
pub mod relay;
pub mod swap;

pub use adapter::{Adapter, Bridged};
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use next::NextService;
pub use relay::{BridgeKey, Relay, Relays};
pub use swap::SwappedWriter;

use tower::Layer;

/// Create a bridge with the default configuration
///
/// The returned [`NextService`] and [`Adapter`] share a key that no other
/// bridge uses, so bridges can be nested and combined freely.
pub fn new() -> (NextService, Adapter) {
    with_config(BridgeConfig::default())
}

/// Create a bridge with `config`
pub fn with_config(config: BridgeConfig) -> (NextService, Adapter) {
    let key = BridgeKey::next();
    (NextService::new(key), Adapter::new(key, config))
}

/// Bridge a tower layer in one step
pub fn wrap<L>(layer: L) -> Bridged<L::Service>
where
    L: Layer<NextService>,
{
    wrap_with_config(layer, BridgeConfig::default())
}

/// Bridge a tower layer with `config`
pub fn wrap_with_config<L>(layer: L, config: BridgeConfig) -> Bridged<L::Service>
where
    L: Layer<NextService>,
{
    let (next, adapter) = with_config(config);
    adapter.adapt(layer.layer(next))
}

/// Re-export commonly used types
pub mod prelude {
    pub use crate::{new, with_config, wrap, wrap_with_config};
    pub use crate::{Adapter, BridgeConfig, BridgeError, Bridged, NextService};
}
