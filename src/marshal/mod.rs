//! Wire type selection and argument marshaling.
//!
//! [`TypeSelector`] maps each [`crate::types::Argument`] to an [`ArgPlanEntry`]: a wire tag and
//! the [`ArgMarshaler`] that writes the argument's value in that form. The invocation
//! pipeline builds one plan per call, writes every argument into the argument block and,
//! after the call, reads by-reference temporaries back into the caller's arguments.

mod plan;
mod selector;
mod strategy;

pub(crate) use plan::ArgumentPlan;
pub use selector::{ArgPlanEntry, TypeSelector, CONVERSION_FAMILIES};
pub use strategy::ArgMarshaler;
