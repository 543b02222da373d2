//! The invocation pipeline.
//!
//! [`invoke`] performs one late-bound call against a resolved member: it pins the ids of
//! named arguments, marshals the caller's arguments into a reversed argument block, calls
//! `Invoke`, maps the returned status onto [`crate::Error`] and writes by-reference results
//! back into the caller's arguments.
//!
//! Binding code above this module decides *which* member and *which* flags to use; this
//! module only executes the call.

mod invoke;
mod status;

pub use invoke::{invoke, Invocation};
