//! Event sinks: one connection to one source interface of an object.

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use log::{debug, warn};
use uguid::Guid;

use crate::{
    events::SinkProxy,
    native::{ComObject, ComPtr, ConnectionPoint, DispId, HResult},
    types::Value,
    Error, Result,
};

/// A subscribed event handler.
///
/// Receives the event arguments in declaration order. The value returned by the last handler
/// of an event becomes the event's result. Arguments passed by reference are read only: a
/// handler sees their current values but cannot write into the source's slots.
pub type EventHandler = Arc<dyn Fn(&[Value]) -> Result<Value> + Send + Sync>;

/// Identifies one subscribed handler for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerToken(u64);

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

impl HandlerToken {
    pub(crate) fn next() -> Self {
        HandlerToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw token value.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

/// An advised connection, released outside the sink lock.
struct Connection {
    point: Arc<dyn ConnectionPoint>,
    cookie: u32,
    source_iid: Guid,
}

impl Connection {
    fn unadvise(self) {
        if let Err(hresult) = self.point.unadvise(self.cookie) {
            if hresult == HResult::CONNECT_E_NOCONNECTION {
                warn!("Sink for {} was already disconnected", self.source_iid);
            } else {
                debug!("Unadvise of {} failed: {}", self.source_iid, hresult);
            }
            debug_assert_ne!(
                hresult,
                HResult::CONNECT_E_NOCONNECTION,
                "connection {} unadvised twice",
                self.cookie
            );
        }
    }
}

struct SinkState {
    /// [`Guid::ZERO`] while the sink is free
    source_iid: Guid,
    /// Set between reserving the sink and the end of its advise call
    connecting: bool,
    connection: Option<Connection>,
    /// Handlers per event id, in subscription order
    methods: HashMap<DispId, BTreeMap<HandlerToken, EventHandler>>,
}

impl SinkState {
    fn insert(&mut self, dispid: DispId, token: HandlerToken, handler: &EventHandler) {
        self.methods
            .entry(dispid)
            .or_default()
            .insert(token, handler.clone());
    }

    fn release(&mut self) -> Option<Connection> {
        self.source_iid = Guid::ZERO;
        self.connecting = false;
        self.methods.clear();
        self.connection.take()
    }
}

/// The handlers subscribed to one source interface of one object.
///
/// A sink is reserved for a source interface together with its first handler and connected
/// right after. Once the last handler is removed it disconnects and becomes free for a later
/// subscription to any source interface of the same object.
///
/// The sink lock covers its own bookkeeping only. Connection point calls and handlers run
/// without it, so a source may raise events from inside `Advise` or `Unadvise` and handlers
/// may subscribe or unsubscribe while running.
pub struct EventSink {
    state: Mutex<SinkState>,
}

impl EventSink {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(EventSink {
            state: Mutex::new(SinkState {
                source_iid: Guid::ZERO,
                connecting: false,
                connection: None,
                methods: HashMap::new(),
            }),
        })
    }

    /// The source interface this sink is reserved for; [`Guid::ZERO`] when free.
    #[must_use]
    pub fn source_iid(&self) -> Guid {
        lock!(self.state).source_iid
    }

    /// Returns `true` while connected to a source interface.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        lock!(self.state).connection.is_some()
    }

    /// Number of subscribed handlers across all events.
    #[must_use]
    pub fn handler_count(&self) -> usize {
        lock!(self.state).methods.values().map(BTreeMap::len).sum()
    }

    /// Adds a handler if this sink is reserved for `iid`.
    pub(crate) fn join(
        &self,
        iid: Guid,
        dispid: DispId,
        token: HandlerToken,
        handler: &EventHandler,
    ) -> bool {
        let mut state = lock!(self.state);
        if state.source_iid != iid || iid == Guid::ZERO {
            return false;
        }
        state.insert(dispid, token, handler);
        true
    }

    /// Claims a free sink for `iid` with its first handler.
    ///
    /// The sink must be [connected](EventSink::connect) afterwards.
    pub(crate) fn reserve(
        &self,
        iid: Guid,
        dispid: DispId,
        token: HandlerToken,
        handler: &EventHandler,
    ) -> bool {
        let mut state = lock!(self.state);
        if state.source_iid != Guid::ZERO || state.connecting {
            return false;
        }
        state.source_iid = iid;
        state.connecting = true;
        state.insert(dispid, token, handler);
        true
    }

    /// Advises the connection point of `object` for the reserved source interface.
    ///
    /// On failure the reservation is dropped together with every handler added to it.
    ///
    /// # Errors
    ///
    /// * [`Error::EventsNotSupported`] - The object exposes no connection points
    /// * [`Error::SourceInterfaceNotSupported`] - The object has no connection point for the
    ///   interface
    /// * [`Error::Com`] - The connection point refused the sink
    pub(crate) fn connect(self: &Arc<Self>, object: &ComPtr) -> Result<()> {
        let iid = lock!(self.state).source_iid;
        match self.advise(object, iid) {
            Ok(connection) => {
                debug!(
                    "Advised sink for {} on {} (cookie {})",
                    iid,
                    object.id(),
                    connection.cookie
                );
                let mut state = lock!(self.state);
                state.connecting = false;
                state.connection = Some(connection);
                Ok(())
            }
            Err(error) => {
                let stale = lock!(self.state).release();
                if let Some(connection) = stale {
                    connection.unadvise();
                }
                Err(error)
            }
        }
    }

    fn advise(self: &Arc<Self>, object: &ComPtr, iid: Guid) -> Result<Connection> {
        let container = object
            .connection_point_container()
            .ok_or(Error::EventsNotSupported)?;
        let point = container
            .find_connection_point(&iid)
            .map_err(|_| Error::SourceInterfaceNotSupported(iid))?;

        let proxy = ComObject::new(SinkProxy::new(Arc::downgrade(self), iid));
        let cookie = point.advise(proxy).map_err(|hresult| Error::Com {
            hresult,
            member: "IConnectionPoint::Advise".to_string(),
        })?;
        Ok(Connection {
            point,
            cookie,
            source_iid: iid,
        })
    }

    /// Removes a handler; disconnects the sink when it was the last one.
    pub(crate) fn remove_handler(&self, dispid: DispId, token: HandlerToken) -> bool {
        let released = {
            let mut state = lock!(self.state);
            let Some(handlers) = state.methods.get_mut(&dispid) else {
                return false;
            };
            if handlers.remove(&token).is_none() {
                return false;
            }
            if handlers.is_empty() {
                state.methods.remove(&dispid);
            }

            if state.methods.is_empty() && !state.connecting {
                state.release()
            } else {
                None
            }
        };

        if let Some(connection) = released {
            connection.unadvise();
        }
        true
    }

    /// The handlers of event `dispid` on source interface `iid`, in subscription order.
    pub(crate) fn handlers(&self, iid: Guid, dispid: DispId) -> Vec<EventHandler> {
        with_lock!(self.state, |state: &mut SinkState| {
            if state.source_iid != iid {
                return Vec::new();
            }
            state
                .methods
                .get(&dispid)
                .map(|handlers| handlers.values().cloned().collect())
                .unwrap_or_default()
        })
    }
}

impl Drop for EventSink {
    fn drop(&mut self) {
        if let Ok(state) = self.state.get_mut() {
            if let Some(connection) = state.release() {
                connection.unadvise();
            }
        }
    }
}

impl fmt::Debug for EventSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = lock!(self.state);
        f.debug_struct("EventSink")
            .field("source_iid", &state.source_iid)
            .field("connecting", &state.connecting)
            .field("connected", &state.connection.is_some())
            .field("events", &state.methods.len())
            .finish()
    }
}
