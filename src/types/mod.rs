//! The dynamic value model.
//!
//! Callers hand [`Value`]s to the binder and receive [`Value`]s back. Each call argument is an
//! [`Argument`] carrying the value, an optional name, a by-reference flag and an optional
//! declared [`ManagedType`]. The wire type of an argument is selected from its declared type
//! (or the runtime type of its value) by [`crate::marshal::TypeSelector`].
//!
//! User-defined types take part through [`CustomType`] descriptions and the
//! [`ManagedObject`] trait.

pub mod convert;

mod managed;
mod value;

pub use managed::{
    CustomType, CustomTypeBuilder, EnumType, ManagedObject, ManagedType, PrimitiveKind,
};
pub use value::{Argument, Value};
