// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![warn(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'wire/variant.rs' reads the payload union and overlays the decimal layout on the header
// - 'wire/bstr.rs' and 'wire/safearray.rs' allocate and free native memory blocks
// - 'wire/params.rs' exposes the packed argument arrays as slices
// - 'native/object.rs' converts object handles to and from raw interface pointers

//! # dispbind
//!
//! A late-binding bridge between a dynamic value model and OLE Automation objects that are
//! only reachable through `IDispatch`: numeric member ids, a fixed-layout tagged-union wire
//! value (`VARIANT`) and a packed argument structure (`DISPPARAMS`).
//!
//! Callers invoke methods, read and write properties, use indexers and subscribe to events
//! by name, without knowing at compile time which kind of member a name denotes.
//!
//! ## Features
//!
//! - **🔌 Binary-compatible wire codec** - `VARIANT`, `DECIMAL`, `BSTR`, `SAFEARRAY`,
//!   `DISPPARAMS` and `EXCEPINFO` with their native layouts
//! - **🎯 Automatic wire type selection** - including user-declared implicit conversions and
//!   ambiguity detection
//! - **↩️ By-reference arguments** - with copy-back after the call
//! - **📇 Member discovery** - from type metadata where available, by name otherwise, cached
//!   per native type
//! - **🔔 Events** - connection-point subscriptions with removable handlers
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dispbind::prelude::*;
//!
//! # fn automation_object() -> ComPtr { unimplemented!() }
//! let binder = ComBinder::new();
//! let workbook: ComPtr = automation_object();
//!
//! // Properties and methods are resolved by name
//! let name = binder.get_member(&workbook, "Name")?;
//! binder.set_member(&workbook, "Saved", Value::Bool(true))?;
//! binder.invoke_member(&workbook, "SaveAs", &mut [Argument::new("report.xlsx")])?;
//!
//! // By-reference arguments are written back into the slice
//! let mut args = [Argument::by_ref(Value::I32(0))];
//! binder.invoke_member(&workbook, "CountSheets", &mut args)?;
//! println!("{name:?} has {:?} sheets", args[0].value);
//! # Ok::<(), dispbind::Error>(())
//! ```
//!
//! ## Architecture
//!
//! The crate is layered leaves first:
//!
//! - [`wire`] - The wire value codec and native memory helpers
//! - [`native`] - The native interfaces consumed (`IUnknown`, `IDispatch`, `ITypeInfo`,
//!   connection points) and status codes
//! - [`types`] - The dynamic value model passed in and returned
//! - [`marshal`] - Wire type selection and argument marshaling strategies
//! - [`dispatch`] - The invocation pipeline
//! - [`binding`] - Member discovery, caches and binding resolution
//! - [`events`] - The event sink bridge
//!
//! Native objects are represented by [`native::ComObject`] handles wrapping an implementation
//! of the [`native::Unknown`] trait family, so any automation server (an OS binding, an
//! in-process implementation or a test double) can be driven through the same binder.

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// ```rust
/// use dispbind::prelude::*;
///
/// let binder = ComBinder::with_config(BinderConfig::scripting());
/// # let _ = binder;
/// ```
pub mod prelude;

pub mod binding;
pub mod dispatch;
pub mod events;
pub mod marshal;
pub mod native;
pub mod types;
pub mod wire;

/// `dispbind` Result type
///
/// A type alias for `std::result::Result<T, Error>` where the error type is always
/// [`crate::Error`]. Used consistently throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// `dispbind` Error type
///
/// The main error type for all operations in this crate. See [`Error`] for the categories.
pub use error::{ComException, Error};

pub use binding::{BinderConfig, ComBinder};
