//! Binder configuration.

use crate::native::Lcid;

/// Configuration of a [`crate::ComBinder`].
///
/// The defaults suit general late-bound clients: members are invoked as soon as they are
/// named, objects without type metadata are driven by name alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct BinderConfig {
    /// Locale passed to name resolution and invocation (default: 0, the neutral locale)
    pub lcid: Lcid,

    /// Return a callable for get-member on a method or parameterised property instead of
    /// invoking it without arguments
    pub return_callables: bool,

    /// Fail discovery when an object advertises type metadata but cannot produce it,
    /// instead of falling back to name lookups
    pub require_type_info: bool,

    /// Discover data members described as variables in type metadata
    pub scan_variables: bool,

    /// Maximum nesting of binding operations, reached through an external fallback that binds
    /// again (default: 32)
    pub max_binding_depth: usize,
}

impl Default for BinderConfig {
    fn default() -> Self {
        Self {
            lcid: 0,
            return_callables: false,
            require_type_info: false,
            scan_variables: true,
            max_binding_depth: 32,
        }
    }
}

impl BinderConfig {
    /// Creates a configuration that rejects objects with broken type metadata
    #[must_use]
    pub fn strict() -> Self {
        Self {
            require_type_info: true,
            max_binding_depth: 8,
            ..Self::default()
        }
    }

    /// Creates a configuration for script hosts, where `obj.Method` yields a callable and
    /// `obj.Method(args)` is a separate call
    #[must_use]
    pub fn scripting() -> Self {
        Self {
            return_callables: true,
            ..Self::default()
        }
    }

    /// Sets the locale
    #[must_use]
    pub fn with_lcid(mut self, lcid: Lcid) -> Self {
        self.lcid = lcid;
        self
    }
}
