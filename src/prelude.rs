//! # dispbind Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the dispbind library. Import this module to get quick access to the binder, the
//! value model and the native object handles.
//!
//! ```rust,no_run
//! use dispbind::prelude::*;
//!
//! let binder = ComBinder::with_config(BinderConfig::scripting());
//! # let _ = binder;
//! ```

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all dispbind operations
pub use crate::Error;

/// The result type used throughout dispbind
pub use crate::Result;

/// Exception details reported by a native object
pub use crate::ComException;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// Performs dynamic operations on native objects
pub use crate::binding::{BinderConfig, ComBinder};

/// Shared caches and resolution extension points
pub use crate::binding::{DynamicFallback, Operation, Resolver, TypeCache};

/// Members and events handed out by the binder
pub use crate::binding::DispCallable;
pub use crate::events::{BoundEvent, EventSinkTable, HandlerToken};

// ================================================================================================
// Value Model
// ================================================================================================

/// Values passed to and returned from native objects
pub use crate::types::{Argument, Value};

/// Runtime types of values
pub use crate::types::{CustomType, EnumType, ManagedObject, ManagedType, PrimitiveKind};

/// Wire scalars with their own representation
pub use crate::wire::{DateTime, Decimal};

// ================================================================================================
// Native Side
// ================================================================================================

/// Object handles and the interfaces they implement
pub use crate::native::{
    ComObject, ComPtr, ConnectionPoint, ConnectionPointContainer, DispId, Dispatch, HResult,
    ProvideClassInfo, TypeInfo, Unknown,
};
