use std::fmt;

use thiserror::Error;

use crate::{native::HResult, wire::VarType};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// An application-level exception raised by a native automation member.
///
/// Built from the exception-info structure the object fills in when `Invoke` returns
/// `DISP_E_EXCEPTION`. The native strings are converted and freed while building it,
/// so this is a plain owned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComException {
    /// The status code reported by the object (`scode`, or `wCode` when `scode` is zero)
    pub code: HResult,
    /// Human-readable description of the failure
    pub description: Option<String>,
    /// The component that raised the exception
    pub source: Option<String>,
    /// Help file path, suffixed with `#context` when a help context was given
    pub help_link: Option<String>,
}

impl fmt::Display for ComException {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.description {
            Some(description) => write!(f, "{description}")?,
            None => write!(f, "Exception from HRESULT: {}", self.code)?,
        }
        if let Some(source) = &self.source {
            write!(f, " (source: {source})")?;
        }
        Ok(())
    }
}

fn join_candidates(candidates: &[String]) -> String {
    let mut joined = String::new();
    for (i, candidate) in candidates.iter().enumerate() {
        if i + 1 == candidates.len() && i != 0 {
            joined.push_str(" and ");
        } else if i != 0 {
            joined.push_str(", ");
        }
        joined.push_str(candidate);
    }
    joined
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Marshaling Errors
/// - [`Error::UnsupportedVarType`] - A wire value tag without a codec was requested
/// - [`Error::AmbiguousConversion`] - A value converts to more than one wire type family
/// - [`Error::NoConversion`] - A value cannot be coerced to the type a slot needs
/// - [`Error::NullableWithoutValue`] - An empty optional value was passed where a value is required
/// - [`Error::InvalidDate`] - A date falls outside the OLE Automation date range
///
/// ## Binding Errors
/// - [`Error::MemberNotFound`] - No member with this name exists on the object
/// - [`Error::CouldNotGetDispId`] - Name resolution failed with an unexpected status
/// - [`Error::NotDispatch`] - The object does not expose a dispatch interface
/// - [`Error::EventsNotSupported`] / [`Error::SourceInterfaceNotSupported`] - Event subscription failed
///
/// ## Invocation Errors
/// - [`Error::BadParamCount`], [`Error::NoNamedArgs`], [`Error::Overflow`], [`Error::TypeMismatch`],
///   [`Error::ParamNotOptional`] - Argument problems reported by the object
/// - [`Error::Exception`] - The member raised an application exception
/// - [`Error::Com`] - Any other failing status
///
/// # Examples
///
/// ```rust
/// use dispbind::{Error, native::HResult};
///
/// let error = Error::Com { hresult: HResult::E_FAIL, member: "Open".to_string() };
/// assert_eq!(error.hresult(), Some(HResult::E_FAIL));
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// Native data handed to us is damaged or inconsistent.
    ///
    /// Raised for things like safe arrays with an unexpected shape or type metadata that
    /// contradicts itself.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The wire value tag is not supported by this codec.
    #[error("Variant type {0} is not supported")]
    UnsupportedVarType(VarType),

    /// More than one wire type family is reachable through declared implicit conversions.
    #[error("There are valid conversions from {type_name} to {}.", join_candidates(.candidates))]
    AmbiguousConversion {
        /// Name of the argument type
        type_name: String,
        /// Names of every reachable candidate, narrowest first within each family
        candidates: Vec<String>,
    },

    /// The value cannot be converted to the type required by the slot.
    #[error("Cannot convert {from} to {to}")]
    NoConversion {
        /// Name of the source type
        from: String,
        /// Name of the requested type
        to: String,
    },

    /// A numeric value does not fit into the requested type.
    #[error("Value {value} is out of range for {to}")]
    ConversionOverflow {
        /// Textual form of the offending value
        value: String,
        /// Name of the requested type
        to: String,
    },

    /// An optional value without content was passed where a value is required.
    #[error("Nullable object of type {0} must have a value")]
    NullableWithoutValue(String),

    /// A date is outside of the range representable as an OLE Automation date.
    #[error("Not a legal OleAut date - {0}")]
    InvalidDate(String),

    /// The object has no dispatch interface.
    #[error("The object does not support late-bound invocation")]
    NotDispatch,

    /// No member with this name exists on the object.
    ///
    /// Used both by binding, when every resolver declined, and by invocation when the
    /// object answered `DISP_E_MEMBERNOTFOUND`.
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// Name resolution failed with something other than "unknown name".
    #[error("Could not get dispatch ID for {name} (error: {hresult})")]
    CouldNotGetDispId {
        /// The name that was looked up
        name: String,
        /// The failing status
        hresult: HResult,
    },

    /// Name resolution returned a member id differing from the bound one.
    #[error("IDispatch::GetIDsOfNames behaved unexpectedly for {0}")]
    GetIdsOfNamesInvalid(String),

    /// The object does not expose events.
    #[error("COM object does not support events")]
    EventsNotSupported,

    /// The object does not expose the requested source interface.
    #[error("COM object does not support the specified source interface {0}")]
    SourceInterfaceNotSupported(uguid::Guid),

    /// The member was called with the wrong number of arguments.
    #[error("Wrong number of arguments passed to {0}")]
    BadParamCount(String),

    /// The member does not accept named arguments.
    #[error("{0} does not support named arguments")]
    NoNamedArgs(String),

    /// A value could not be coerced to the parameter type because it is too large.
    #[error("Argument value passed to {0} is out of range")]
    Overflow(String),

    /// An argument's type does not match the parameter type.
    #[error("Type mismatch for argument {index} of {member}")]
    TypeMismatch {
        /// The member that was invoked
        member: String,
        /// Position of the offending argument in the caller's argument list
        index: usize,
    },

    /// A required parameter was omitted.
    #[error("A required parameter was not supplied to {0}")]
    ParamNotOptional(String),

    /// The member raised an application exception.
    #[error("{0}")]
    Exception(ComException),

    /// Any other failing status returned by a native call.
    #[error("{member} failed - {hresult}: {}", .hresult.message())]
    Com {
        /// The failing status
        hresult: HResult,
        /// The member or native entry point involved
        member: String,
    },

    /// The value is not something that can be called.
    #[error("{0} is not callable")]
    NotCallable(String),

    /// Recursion limit reached.
    ///
    /// Binding may re-enter itself through the external fallback. A maximum depth is
    /// enforced; the associated value shows the limit that was reached.
    #[error("Reach the maximum recursion level allowed - {0}")]
    RecursionLimit(usize),
}

impl Error {
    /// The native status associated with this error, if any.
    #[must_use]
    pub fn hresult(&self) -> Option<HResult> {
        match self {
            Error::Com { hresult, .. } | Error::CouldNotGetDispId { hresult, .. } => Some(*hresult),
            Error::Exception(exception) => Some(exception.code),
            Error::BadParamCount(_) => Some(HResult::DISP_E_BADPARAMCOUNT),
            Error::MemberNotFound(_) => Some(HResult::DISP_E_MEMBERNOTFOUND),
            Error::NoNamedArgs(_) => Some(HResult::DISP_E_NONAMEDARGS),
            Error::Overflow(_) => Some(HResult::DISP_E_OVERFLOW),
            Error::TypeMismatch { .. } => Some(HResult::DISP_E_TYPEMISMATCH),
            Error::ParamNotOptional(_) => Some(HResult::DISP_E_PARAMNOTOPTIONAL),
            Error::UnsupportedVarType(_) => Some(HResult::DISP_E_BADVARTYPE),
            Error::NotDispatch | Error::EventsNotSupported => Some(HResult::E_NOINTERFACE),
            _ => None,
        }
    }

    /// The help link of an application exception (`help_file#context`), if present.
    #[must_use]
    pub fn help_link(&self) -> Option<&str> {
        match self {
            Error::Exception(exception) => exception.help_link.as_deref(),
            _ => None,
        }
    }
}
