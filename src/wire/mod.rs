//! The wire value codec.
//!
//! This module holds every structure that crosses the native boundary with a fixed binary
//! layout, together with the native memory helpers they rely on:
//!
//! - [`Variant`] - the tagged-union wire value (`VARIANT`)
//! - [`VarType`] - wire type tags (`VARTYPE`)
//! - [`Decimal`] - 96-bit scaled decimal numbers (`DECIMAL`)
//! - [`DateTime`] - timestamps and their OLE Automation date encoding (`DATE`)
//! - [`DispParams`] / [`ExcepInfo`] - the invocation argument block and exception info
//! - [`bstr`] - length-prefixed native strings (`BSTR`)
//! - [`safearray`] - one-dimensional safe arrays of wire values (`SAFEARRAY`)
//!
//! Everything above the wire layer works with [`crate::types::Value`]; conversion between the
//! two goes through [`Variant::set_value`] and [`Variant::to_value`].

pub mod bstr;
pub mod io;
pub mod safearray;

mod datetime;
mod decimal;
mod params;
mod variant;
mod vartype;

pub use datetime::DateTime;
pub use decimal::Decimal;
pub(crate) use params::ArgBuffer;
pub use params::{DeferredFillIn, DispParams, ExcepInfo};
pub use variant::Variant;
pub use vartype::VarType;
