//! The event sink bridge.
//!
//! Native objects raise events through connection points: the subscriber hands the object a
//! sink implementing the event (source) interface, and the object calls `Invoke` on it for
//! every event. This module provides
//!
//! - [`EventSink`] - the handlers of one source interface of one object, connected while it
//!   has handlers
//! - [`SinkProxy`] - the dispatch object actually handed to the connection point
//! - [`EventSinkTable`] - all sinks, per object
//! - [`BoundEvent`] - one event of one object, the unit handlers are attached to
//!
//! Handlers are identified by [`HandlerToken`]s rather than by comparing closures.

mod bound;
mod proxy;
mod sink;
mod table;

pub use bound::BoundEvent;
pub use proxy::SinkProxy;
pub use sink::{EventHandler, EventSink, HandlerToken};
pub use table::EventSinkTable;
