//! Relay records
//!
//! A [`Relay`] is created for every invocation of a bridged middleware and
//! travels to the wrapped tower service inside the request extensions. The
//! continuation service looks it up by its bridge key, flags that the chain
//! was continued, and hands the request back to the invocation that owns the
//! handler-chain context.

use crate::error::{BridgeError, Result};
use http::{Request, Response};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tether_core::Body;
use tokio::sync::{mpsc, oneshot};

static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Identity of one bridge
///
/// Allocated once per [`crate::new`] call and shared by the continuation
/// service and the adapter of that pair only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeKey(u64);

impl BridgeKey {
    pub(crate) fn next() -> Self {
        Self(NEXT_KEY.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for BridgeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bridge-{}", self.0)
    }
}

/// Request to resume the handler chain
pub(crate) struct Continuation {
    pub(crate) request: Request<Body>,
    pub(crate) reply: oneshot::Sender<Result<Response<Body>>>,
}

/// Per-invocation relay state
pub struct Relay {
    key: BridgeKey,
    continued: AtomicBool,
    sender: mpsc::UnboundedSender<Continuation>,
}

impl Relay {
    /// Open a relay and the receiving end the owning invocation serves
    pub(crate) fn open(key: BridgeKey) -> (Arc<Self>, mpsc::UnboundedReceiver<Continuation>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let relay = Arc::new(Self {
            key,
            continued: AtomicBool::new(false),
            sender,
        });
        (relay, receiver)
    }

    /// Key of the bridge that opened this relay
    pub fn key(&self) -> BridgeKey {
        self.key
    }

    /// Whether the wrapped service continued the chain
    pub fn continued(&self) -> bool {
        self.continued.load(Ordering::Acquire)
    }

    /// Ask the owning invocation to run the rest of the chain with `request`
    pub(crate) async fn resume(&self, request: Request<Body>) -> Result<Response<Body>> {
        self.continued.store(true, Ordering::Release);

        let (reply, response) = oneshot::channel();
        self.sender
            .send(Continuation { request, reply })
            .map_err(|_| BridgeError::RelayClosed(self.key))?;

        response
            .await
            .map_err(|_| BridgeError::RelayClosed(self.key))?
    }
}

impl fmt::Debug for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Relay")
            .field("key", &self.key)
            .field("continued", &self.continued())
            .finish()
    }
}

/// Relay records attached to a request, one per bridge
///
/// Stored in the request extensions. Attaching the record of one bridge
/// never hides the record of another.
#[derive(Debug, Clone)]
pub struct Relays {
    entries: Arc<[Arc<Relay>]>,
}

impl Relays {
    /// Look up the relay of `key`
    pub fn get(&self, key: BridgeKey) -> Result<Arc<Relay>> {
        self.entries
            .iter()
            .find(|relay| relay.key == key)
            .cloned()
            .ok_or(BridgeError::RelayMissing(key))
    }

    /// Number of bridges with a record
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no record is attached
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy of this table with `relay` added, replacing any record of the
    /// same bridge
    fn with(&self, relay: Arc<Relay>) -> Self {
        let mut entries: Vec<Arc<Relay>> = self
            .entries
            .iter()
            .filter(|existing| existing.key != relay.key)
            .cloned()
            .collect();
        entries.push(relay);
        Self {
            entries: entries.into(),
        }
    }
}

/// Attach `relay` to `request`
pub(crate) fn attach<B>(request: &mut Request<B>, relay: Arc<Relay>) {
    let relays = match request.extensions().get::<Relays>() {
        Some(relays) => relays.with(relay),
        None => Relays {
            entries: Arc::from(vec![relay]),
        },
    };
    request.extensions_mut().insert(relays);
}

/// Find the relay of `key` on `request`
pub fn lookup<B>(request: &Request<B>, key: BridgeKey) -> Result<Arc<Relay>> {
    request
        .extensions()
        .get::<Relays>()
        .ok_or(BridgeError::RelayMissing(key))?
        .get(key)
}
