//! Member discovery and binding resolution.
//!
//! [`ComBinder`] is the entry point: it turns dynamic operations (get or set a member, call
//! a member or the object itself, read or write an index) into invocations of the right
//! member id with the right invoke flags.
//!
//! # Key Components
//!
//! - [`MemberDiscovery`] - builds a [`TypeDesc`] per native type, from type metadata when the
//!   object offers it and from name lookups otherwise
//! - [`TypeCache`] / [`ObjectTable`] - the injectable caches holding what was discovered
//! - [`resolver`] - the ordered chain of [`Resolver`]s deciding what an operation binds to
//! - [`DispCallable`] - members returned without being invoked
//!
//! # Thread Safety
//!
//! All components are `Send + Sync`. Type descriptors are shared between threads and grow
//! as members are resolved; concurrent discovery of the same type settles on the descriptor
//! inserted first.

mod binder;
mod cache;
mod callable;
mod config;
mod desc;
mod discovery;
pub mod resolver;

pub use binder::ComBinder;
pub use cache::{ObjectTable, TypeCache};
pub use callable::DispCallable;
pub use config::BinderConfig;
pub use desc::{
    EventDesc, InvokeKind, MethodDesc, TypeDesc, DEFAULT_GET_NAME, DEFAULT_PUT_NAME,
    ENUMERATOR_NAME,
};
pub use discovery::MemberDiscovery;
pub use resolver::{Binding, DynamicFallback, Operation, ResolveScope, Resolver};
