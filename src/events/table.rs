//! The per-object lists of event sinks.

use std::{
    fmt,
    sync::{Arc, Mutex},
};

use uguid::Guid;

use crate::{
    binding::ObjectTable,
    events::{EventHandler, EventSink, HandlerToken},
    native::{ComPtr, DispId},
    Result,
};

/// Event subscriptions of all objects, one [`EventSink`] per object and source interface.
///
/// An object's sink list is locked only to pick or reserve a sink for a subscription, so a
/// source interface gets at most one connection per object. Connecting, disconnecting and
/// handlers run without the list lock.
#[derive(Default)]
pub struct EventSinkTable {
    objects: ObjectTable<Mutex<Vec<Arc<EventSink>>>>,
}

impl EventSinkTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        EventSinkTable::default()
    }

    /// Subscribes `handler` to event `dispid` of source interface `source_iid` on `object`.
    ///
    /// Joins the object's sink for that interface, or reserves a disconnected sink, before
    /// creating a new one. A reserved sink is connected before this returns. If connecting
    /// fails, handlers that joined the sink meanwhile are dropped with it.
    ///
    /// # Errors
    ///
    /// * [`crate::Error::EventsNotSupported`] - The object exposes no connection points
    /// * [`crate::Error::SourceInterfaceNotSupported`] - The object does not offer `source_iid`
    pub fn add_handler(
        &self,
        object: &ComPtr,
        source_iid: Guid,
        dispid: DispId,
        handler: EventHandler,
    ) -> Result<HandlerToken> {
        let token = HandlerToken::next();
        let list = self
            .objects
            .get_or_insert_with(object, || Mutex::new(Vec::new()));

        let reserved = {
            let mut sinks = lock!(list);
            if sinks
                .iter()
                .any(|sink| sink.join(source_iid, dispid, token, &handler))
            {
                return Ok(token);
            }

            match sinks
                .iter()
                .find(|sink| sink.reserve(source_iid, dispid, token, &handler))
            {
                Some(sink) => sink.clone(),
                None => {
                    let sink = EventSink::new();
                    sink.reserve(source_iid, dispid, token, &handler);
                    sinks.push(sink.clone());
                    sink
                }
            }
        };

        reserved.connect(object)?;
        Ok(token)
    }

    /// Removes a handler added with [`EventSinkTable::add_handler`].
    ///
    /// Returns `false` if no such handler is subscribed.
    pub fn remove_handler(
        &self,
        object: &ComPtr,
        source_iid: Guid,
        dispid: DispId,
        token: HandlerToken,
    ) -> bool {
        let Some(list) = self.objects.get(object) else {
            return false;
        };
        let sink = lock!(list)
            .iter()
            .find(|sink| sink.source_iid() == source_iid)
            .cloned();
        sink.is_some_and(|sink| sink.remove_handler(dispid, token))
    }

    /// The sinks of `object`, connected or not.
    #[must_use]
    pub fn sinks(&self, object: &ComPtr) -> Vec<Arc<EventSink>> {
        self.objects
            .get(object)
            .map(|list| lock!(list).clone())
            .unwrap_or_default()
    }
}

impl fmt::Debug for EventSinkTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventSinkTable")
            .field("objects", &self.objects.len())
            .finish()
    }
}
