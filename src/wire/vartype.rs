//! Wire value type tags (`VARTYPE`).
//!
//! A tag is a 16-bit value: the low 12 bits name the base type, the high bits are modifiers.
//! [`VarType::ARRAY`] marks a safe array of the base type, [`VarType::BYREF`] marks a pointer to
//! storage of the base type.

use std::fmt;

/// A wire value type tag.
///
/// # Examples
///
/// ```rust
/// use dispbind::wire::VarType;
///
/// let tag = VarType::I4.with_byref();
/// assert!(tag.is_byref());
/// assert_eq!(tag.base(), VarType::I4);
/// assert_eq!(tag.to_string(), "VT_BYREF|VT_I4");
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarType(u16);

impl VarType {
    /// No value
    pub const EMPTY: VarType = VarType(0);
    /// Database null
    pub const NULL: VarType = VarType(1);
    /// 16-bit signed integer
    pub const I2: VarType = VarType(2);
    /// 32-bit signed integer
    pub const I4: VarType = VarType(3);
    /// 32-bit float
    pub const R4: VarType = VarType(4);
    /// 64-bit float
    pub const R8: VarType = VarType(5);
    /// Currency, a 64-bit integer scaled by 10 000
    pub const CY: VarType = VarType(6);
    /// OLE Automation date, days since 1899-12-30 as a 64-bit float
    pub const DATE: VarType = VarType(7);
    /// Length-prefixed native string
    pub const BSTR: VarType = VarType(8);
    /// Dispatch interface pointer
    pub const DISPATCH: VarType = VarType(9);
    /// 32-bit status code
    pub const ERROR: VarType = VarType(10);
    /// Boolean, -1 for true and 0 for false
    pub const BOOL: VarType = VarType(11);
    /// A nested wire value (by reference only)
    pub const VARIANT: VarType = VarType(12);
    /// Unknown interface pointer
    pub const UNKNOWN: VarType = VarType(13);
    /// 96-bit scaled decimal
    pub const DECIMAL: VarType = VarType(14);
    /// 8-bit signed integer
    pub const I1: VarType = VarType(16);
    /// 8-bit unsigned integer
    pub const UI1: VarType = VarType(17);
    /// 16-bit unsigned integer
    pub const UI2: VarType = VarType(18);
    /// 32-bit unsigned integer
    pub const UI4: VarType = VarType(19);
    /// 64-bit signed integer
    pub const I8: VarType = VarType(20);
    /// 64-bit unsigned integer
    pub const UI8: VarType = VarType(21);
    /// Machine signed integer
    pub const INT: VarType = VarType(22);
    /// Machine unsigned integer
    pub const UINT: VarType = VarType(23);
    /// User-defined record
    pub const RECORD: VarType = VarType(36);
    /// Safe array modifier
    pub const ARRAY: VarType = VarType(0x2000);
    /// By-reference modifier
    pub const BYREF: VarType = VarType(0x4000);

    const TYPEMASK: u16 = 0x0FFF;

    /// Creates a tag from its raw value.
    #[must_use]
    pub const fn from_raw(raw: u16) -> Self {
        VarType(raw)
    }

    /// The raw 16-bit value.
    #[must_use]
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// The base type without modifiers.
    #[must_use]
    pub const fn base(self) -> Self {
        VarType(self.0 & Self::TYPEMASK)
    }

    /// Returns `true` if the by-reference modifier is set.
    #[must_use]
    pub const fn is_byref(self) -> bool {
        self.0 & Self::BYREF.0 != 0
    }

    /// Returns `true` if the safe array modifier is set.
    #[must_use]
    pub const fn is_array(self) -> bool {
        self.0 & Self::ARRAY.0 != 0
    }

    /// The tag with the by-reference modifier added.
    #[must_use]
    pub const fn with_byref(self) -> Self {
        VarType(self.0 | Self::BYREF.0)
    }

    /// The tag with the safe array modifier added.
    #[must_use]
    pub const fn with_array(self) -> Self {
        VarType(self.0 | Self::ARRAY.0)
    }

    /// The tag without the by-reference modifier.
    #[must_use]
    pub const fn without_byref(self) -> Self {
        VarType(self.0 & !Self::BYREF.0)
    }

    /// Returns `true` if clearing a wire value with this tag has to release something.
    ///
    /// By-reference values never own their pointee.
    #[must_use]
    pub const fn owns_resource(self) -> bool {
        if self.is_byref() {
            return false;
        }
        if self.is_array() {
            return true;
        }
        matches!(
            self.base(),
            VarType::BSTR | VarType::DISPATCH | VarType::UNKNOWN | VarType::RECORD
        )
    }

    /// Size in bytes of the storage a by-reference pointer of this base type points to.
    #[must_use]
    pub fn storage_size(self) -> Option<usize> {
        if self.is_array() {
            return Some(std::mem::size_of::<*mut u8>());
        }
        let size = match self.base() {
            VarType::I1 | VarType::UI1 => 1,
            VarType::I2 | VarType::UI2 | VarType::BOOL => 2,
            VarType::I4
            | VarType::UI4
            | VarType::R4
            | VarType::INT
            | VarType::UINT
            | VarType::ERROR => 4,
            VarType::I8 | VarType::UI8 | VarType::R8 | VarType::CY | VarType::DATE => 8,
            VarType::BSTR | VarType::DISPATCH | VarType::UNKNOWN => std::mem::size_of::<*mut u8>(),
            VarType::DECIMAL => 16,
            VarType::VARIANT => std::mem::size_of::<crate::wire::Variant>(),
            _ => return None,
        };
        Some(size)
    }

    fn base_name(self) -> Option<&'static str> {
        Some(match self.base() {
            VarType::EMPTY => "VT_EMPTY",
            VarType::NULL => "VT_NULL",
            VarType::I2 => "VT_I2",
            VarType::I4 => "VT_I4",
            VarType::R4 => "VT_R4",
            VarType::R8 => "VT_R8",
            VarType::CY => "VT_CY",
            VarType::DATE => "VT_DATE",
            VarType::BSTR => "VT_BSTR",
            VarType::DISPATCH => "VT_DISPATCH",
            VarType::ERROR => "VT_ERROR",
            VarType::BOOL => "VT_BOOL",
            VarType::VARIANT => "VT_VARIANT",
            VarType::UNKNOWN => "VT_UNKNOWN",
            VarType::DECIMAL => "VT_DECIMAL",
            VarType::I1 => "VT_I1",
            VarType::UI1 => "VT_UI1",
            VarType::UI2 => "VT_UI2",
            VarType::UI4 => "VT_UI4",
            VarType::I8 => "VT_I8",
            VarType::UI8 => "VT_UI8",
            VarType::INT => "VT_INT",
            VarType::UINT => "VT_UINT",
            VarType::RECORD => "VT_RECORD",
            _ => return None,
        })
    }
}

impl fmt::Display for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_byref() {
            write!(f, "VT_BYREF|")?;
        }
        if self.is_array() {
            write!(f, "VT_ARRAY|")?;
        }
        match self.base_name() {
            Some(name) => write!(f, "{name}"),
            None => write!(f, "0x{:04X}", self.base().0),
        }
    }
}

impl fmt::Debug for VarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VarType({self})")
    }
}
