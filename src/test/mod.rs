//! Test doubles for native automation objects
//!
//! This module contains in-process implementations of the native interfaces, used by the
//! unit tests throughout the crate:
//!
//! - [`MockObject`] - a dispatch object with scripted members that records every call
//! - [`MockTypeInfo`] - type metadata describing functions, variables and source interfaces
//! - [`MockConnectionPoint`] - a connection point that can raise events into advised sinks

mod object;
mod typeinfo;

pub use connection::MockConnectionPoint;
pub use object::{MockObject, MockObjectBuilder, Recorded};
pub use typeinfo::{MockTypeInfo, MockTypeInfoBuilder};
