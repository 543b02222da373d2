//! Native status codes.
//!
//! Every native entry point reports success or failure through a 32-bit `HRESULT`. The
//! high bit signals failure; the remaining bits carry facility and code. This module defines
//! the [`HResult`] newtype together with the codes the binder inspects.

use std::fmt;

/// A 32-bit native status code.
///
/// Negative values are failures, zero and positive values are successes.
///
/// # Examples
///
/// ```rust
/// use dispbind::native::HResult;
///
/// assert!(HResult::S_OK.is_success());
/// assert!(HResult::DISP_E_EXCEPTION.is_failure());
/// assert_eq!(HResult::DISP_E_EXCEPTION.to_string(), "0x80020009");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HResult(pub i32);

macro_rules! hresults {
    ($($(#[$doc:meta])* $name:ident = $value:expr, $message:expr;)*) => {
        impl HResult {
            $(
                $(#[$doc])*
                pub const $name: HResult = HResult($value as i32);
            )*

            /// A short description of well-known codes, or a generic one for anything else.
            #[must_use]
            pub fn message(self) -> &'static str {
                $(
                    if self == HResult::$name {
                        return $message;
                    }
                )*
                if self.is_success() {
                    "Success"
                } else {
                    "Unknown error"
                }
            }
        }
    };
}

hresults! {
    /// Success
    S_OK = 0x0000_0000_u32, "The operation completed successfully";
    /// Success, with a negative answer
    S_FALSE = 0x0000_0001_u32, "The operation completed with a negative answer";
    /// Not implemented
    E_NOTIMPL = 0x8000_4001_u32, "Not implemented";
    /// The requested interface is not supported
    E_NOINTERFACE = 0x8000_4002_u32, "No such interface supported";
    /// Invalid pointer
    E_POINTER = 0x8000_4003_u32, "Invalid pointer";
    /// Unspecified failure
    E_FAIL = 0x8000_4005_u32, "Unspecified error";
    /// Catastrophic failure
    E_UNEXPECTED = 0x8000_FFFF_u32, "Catastrophic failure";
    /// Out of memory
    E_OUTOFMEMORY = 0x8007_000E_u32, "Not enough memory resources are available";
    /// One or more arguments are invalid
    E_INVALIDARG = 0x8007_0057_u32, "One or more arguments are invalid";
    /// Unknown interface
    DISP_E_UNKNOWNINTERFACE = 0x8002_0001_u32, "Unknown interface";
    /// Member not found
    DISP_E_MEMBERNOTFOUND = 0x8002_0003_u32, "Member not found";
    /// Parameter not found
    DISP_E_PARAMNOTFOUND = 0x8002_0004_u32, "Parameter not found";
    /// Type mismatch
    DISP_E_TYPEMISMATCH = 0x8002_0005_u32, "Type mismatch";
    /// Unknown name
    DISP_E_UNKNOWNNAME = 0x8002_0006_u32, "Unknown name";
    /// No named arguments
    DISP_E_NONAMEDARGS = 0x8002_0007_u32, "No named arguments";
    /// Bad variable type
    DISP_E_BADVARTYPE = 0x8002_0008_u32, "Bad variable type";
    /// Exception occurred
    DISP_E_EXCEPTION = 0x8002_0009_u32, "Exception occurred";
    /// Out of present range
    DISP_E_OVERFLOW = 0x8002_000A_u32, "Out of present range";
    /// Invalid index
    DISP_E_BADINDEX = 0x8002_000B_u32, "Invalid index";
    /// Unknown language
    DISP_E_UNKNOWNLCID = 0x8002_000C_u32, "Unknown language";
    /// Memory is locked
    DISP_E_ARRAYISLOCKED = 0x8002_000D_u32, "Memory is locked";
    /// Invalid number of parameters
    DISP_E_BADPARAMCOUNT = 0x8002_000E_u32, "Invalid number of parameters";
    /// Parameter not optional
    DISP_E_PARAMNOTOPTIONAL = 0x8002_000F_u32, "Parameter not optional";
    /// Library not registered
    TYPE_E_LIBNOTREGISTERED = 0x8002_801D_u32, "Library not registered";
    /// Element not found
    TYPE_E_ELEMENTNOTFOUND = 0x8002_802B_u32, "Element not found";
    /// The connection does not exist
    CONNECT_E_NOCONNECTION = 0x8004_0200_u32, "The connection does not exist";
    /// The connection point refuses further connections
    CONNECT_E_ADVISELIMIT = 0x8004_0201_u32, "The connection limit was reached";
    /// The sink does not support the source interface
    CONNECT_E_CANNOTCONNECT = 0x8004_0202_u32, "Cannot connect to the sink";
}

impl HResult {
    /// Returns `true` for success codes (high bit clear).
    #[must_use]
    pub const fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// Returns `true` for failure codes (high bit set).
    #[must_use]
    pub const fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Converts into a `Result`, treating any success code as `Ok`.
    ///
    /// # Errors
    /// Returns the status itself when it is a failure.
    pub const fn ok(self) -> Result<(), HResult> {
        if self.is_success() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HResult({self})")
    }
}
