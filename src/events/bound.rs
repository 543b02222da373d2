//! Events of a specific object, as handed out by get-member.

use std::{fmt, sync::Arc};

use uguid::Guid;

use crate::{
    binding::EventDesc,
    events::{EventSinkTable, HandlerToken},
    native::{ComPtr, DispId},
    types::Value,
    Result,
};

/// One event of one native object.
///
/// Reading an event member yields a `BoundEvent`; handlers are attached and detached
/// through it. Assigning the event back to its member (the `obj.Click += handler` pattern of
/// scripting hosts) is accepted and has no further effect.
#[derive(Clone)]
pub struct BoundEvent {
    object: ComPtr,
    source_iid: Guid,
    dispid: DispId,
    name: String,
    sinks: Arc<EventSinkTable>,
}

impl BoundEvent {
    /// Binds `event` to `object`, subscribing through `sinks`.
    #[must_use]
    pub fn new(object: ComPtr, event: &EventDesc, sinks: Arc<EventSinkTable>) -> Self {
        BoundEvent {
            object,
            source_iid: event.source_iid,
            dispid: event.dispid,
            name: event.name.clone(),
            sinks,
        }
    }

    /// The event name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The object raising the event.
    #[must_use]
    pub fn object(&self) -> &ComPtr {
        &self.object
    }

    /// The member id of the event on its source interface.
    #[must_use]
    pub fn dispid(&self) -> DispId {
        self.dispid
    }

    /// The source interface declaring the event.
    #[must_use]
    pub fn source_iid(&self) -> Guid {
        self.source_iid
    }

    /// Attaches `handler`, connecting to the source interface if needed.
    ///
    /// # Errors
    ///
    /// * [`crate::Error::EventsNotSupported`] - The object exposes no connection points
    /// * [`crate::Error::SourceInterfaceNotSupported`] - The object does not offer the interface
    pub fn add_handler<F>(&self, handler: F) -> Result<HandlerToken>
    where
        F: Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    {
        self.sinks
            .add_handler(&self.object, self.source_iid, self.dispid, Arc::new(handler))
    }

    /// Detaches a handler; returns `false` if it was not attached to this event.
    pub fn remove_handler(&self, token: HandlerToken) -> bool {
        self.sinks
            .remove_handler(&self.object, self.source_iid, self.dispid, token)
    }
}

impl PartialEq for BoundEvent {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
            && self.dispid == other.dispid
            && self.source_iid == other.source_iid
    }
}

impl fmt::Debug for BoundEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BoundEvent({} on {})", self.name, self.object.id())
    }
}
