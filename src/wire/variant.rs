//! The tagged-union wire value (`VARIANT`).
//!
//! A [`Variant`] is binary compatible with the native layout: a 16-bit type tag, three
//! reserved 16-bit words and an 8 or 16 byte payload union. It is 16 bytes on 32-bit targets
//! and 24 bytes on 64-bit targets.
//!
//! # Lifecycle
//!
//! A wire value is created empty, written exactly once by one of the `set_*` methods and read
//! with the `as_*` method matching its tag. [`Variant::clear`] releases whatever the tag owns
//! (native strings, interface references, safe arrays) and resets the tag to
//! [`VarType::EMPTY`]; dropping a wire value clears it. By-reference values never own their
//! pointee.
//!
//! Writing a value that is not empty, or reading with a mismatched tag, is a programming error
//! caught by debug assertions.
//!
//! # Decimal Overlay
//!
//! The 16-byte `DECIMAL` does not live in the payload union: it overlays the whole header,
//! with its reserved word sharing storage with the type tag. [`Variant::set_decimal`] and
//! [`Variant::as_decimal`] go through the single overlay routine of this module.
//!
//! # Examples
//!
//! ```rust
//! use dispbind::wire::{VarType, Variant};
//!
//! let mut value = Variant::new();
//! value.set_bstr(Some("hello"));
//! assert_eq!(value.vt(), VarType::BSTR);
//! assert_eq!(value.as_bstr().as_deref(), Some("hello"));
//!
//! value.clear();
//! assert!(value.is_empty());
//! ```

use std::{ffi::c_void, fmt, ptr};

use crate::{
    native::{ComObject, ComPtr, HResult},
    types::Value,
    wire::{bstr, safearray, safearray::SafeArray, DateTime, Decimal, VarType},
    Error, Result,
};

/// Deepest chain of by-reference wire values followed when decoding.
const MAX_NESTING: usize = 16;

#[repr(C)]
#[derive(Clone, Copy)]
struct RecordData {
    record: *mut c_void,
    record_info: *mut c_void,
}

#[repr(C)]
#[derive(Clone, Copy)]
union VariantData {
    i1: i8,
    ui1: u8,
    i2: i16,
    ui2: u16,
    i4: i32,
    ui4: u32,
    i8: i64,
    ui8: u64,
    int: i32,
    uint: u32,
    r4: f32,
    r8: f64,
    cy: i64,
    date: f64,
    boolean: i16,
    scode: i32,
    bstr: *mut u16,
    unknown: *mut c_void,
    dispatch: *mut c_void,
    array: *mut SafeArray,
    byref: *mut c_void,
    record: RecordData,
}

impl VariantData {
    const ZERO: VariantData = VariantData {
        record: RecordData {
            record: ptr::null_mut(),
            record_info: ptr::null_mut(),
        },
    };
}

/// A wire value.
#[repr(C)]
pub struct Variant {
    vt: u16,
    reserved1: u16,
    reserved2: u16,
    reserved3: u16,
    data: VariantData,
}

#[cfg(target_pointer_width = "64")]
const _: () = assert!(std::mem::size_of::<Variant>() == 24);
#[cfg(target_pointer_width = "32")]
const _: () = assert!(std::mem::size_of::<Variant>() == 16);

macro_rules! scalar_accessors {
    ($($vt:ident, $field:ident: $ty:ty, $set:ident, $get:ident;)*) => {
        $(
            #[doc = concat!("Stores a `VT_", stringify!($vt), "` value.")]
            pub fn $set(&mut self, value: $ty) {
                self.assert_empty();
                self.vt = VarType::$vt.raw();
                self.data.$field = value;
            }

            #[doc = concat!("Reads a `VT_", stringify!($vt), "` value.")]
            #[must_use]
            pub fn $get(&self) -> $ty {
                self.assert_vt(VarType::$vt);
                // SAFETY: every payload field is plain data and the union is fully initialized
                unsafe { self.data.$field }
            }
        )*
    };
}

impl Variant {
    /// Creates an empty wire value.
    #[must_use]
    pub const fn new() -> Self {
        Variant {
            vt: 0,
            reserved1: 0,
            reserved2: 0,
            reserved3: 0,
            data: VariantData::ZERO,
        }
    }

    /// Creates a wire value holding the natural encoding of `value`.
    ///
    /// # Errors
    /// See [`Variant::set_value`].
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut variant = Variant::new();
        variant.set_value(value)?;
        Ok(variant)
    }

    /// The type tag.
    #[must_use]
    pub fn vt(&self) -> VarType {
        VarType::from_raw(self.vt)
    }

    /// Returns `true` if the tag is [`VarType::EMPTY`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vt == VarType::EMPTY.raw()
    }

    fn assert_empty(&self) {
        debug_assert!(
            self.is_empty(),
            "wire value must be empty before it is written, found {}",
            self.vt()
        );
    }

    fn assert_vt(&self, expected: VarType) {
        debug_assert_eq!(self.vt(), expected, "wire value read with mismatched tag");
    }

    /// Releases what the tag owns and resets to empty. Clearing an empty value does nothing.
    pub fn clear(&mut self) {
        let vt = self.vt();
        if vt.owns_resource() {
            // SAFETY: the tag identifies the live payload, which this value owns
            unsafe {
                if vt.is_array() {
                    safearray::destroy(self.data.array);
                } else {
                    match vt.base() {
                        VarType::BSTR => bstr::free_string(self.data.bstr),
                        VarType::DISPATCH | VarType::UNKNOWN => {
                            let raw = self.data.unknown;
                            if !raw.is_null() {
                                drop(ComObject::from_raw(raw));
                            }
                        }
                        _ => {}
                    }
                }
            }
        }
        self.vt = VarType::EMPTY.raw();
        self.reserved1 = 0;
        self.reserved2 = 0;
        self.reserved3 = 0;
        self.data = VariantData::ZERO;
    }

    scalar_accessors! {
        I1, i1: i8, set_i1, as_i1;
        UI1, ui1: u8, set_ui1, as_ui1;
        I2, i2: i16, set_i2, as_i2;
        UI2, ui2: u16, set_ui2, as_ui2;
        I4, i4: i32, set_i4, as_i4;
        UI4, ui4: u32, set_ui4, as_ui4;
        I8, i8: i64, set_i8, as_i8;
        UI8, ui8: u64, set_ui8, as_ui8;
        INT, int: i32, set_int, as_int;
        UINT, uint: u32, set_uint, as_uint;
        R4, r4: f32, set_r4, as_r4;
        R8, r8: f64, set_r8, as_r8;
        CY, cy: i64, set_cy, as_cy;
        DATE, date: f64, set_date, as_date;
        ERROR, scode: i32, set_error, as_error;
    }

    /// Stores a `VT_BOOL` value (-1 for true, 0 for false).
    pub fn set_bool(&mut self, value: bool) {
        self.assert_empty();
        self.vt = VarType::BOOL.raw();
        self.data.boolean = if value { -1 } else { 0 };
    }

    /// Reads a `VT_BOOL` value; any nonzero payload is true.
    #[must_use]
    pub fn as_bool(&self) -> bool {
        self.assert_vt(VarType::BOOL);
        // SAFETY: plain data
        unsafe { self.data.boolean != 0 }
    }

    /// Stores `VT_NULL`.
    pub fn set_null(&mut self) {
        self.assert_empty();
        self.vt = VarType::NULL.raw();
    }

    /// Stores a `VT_BSTR`, allocating a native string; `None` stores a null string.
    pub fn set_bstr(&mut self, value: Option<&str>) {
        let raw = value.map_or(ptr::null_mut(), bstr::alloc_string);
        self.set_bstr_raw(raw);
    }

    /// Stores a `VT_BSTR`, taking ownership of an already allocated native string.
    pub fn set_bstr_raw(&mut self, raw: *mut u16) {
        self.assert_empty();
        self.vt = VarType::BSTR.raw();
        self.data.bstr = raw;
    }

    /// Reads a `VT_BSTR`; `None` for a null string.
    #[must_use]
    pub fn as_bstr(&self) -> Option<String> {
        self.assert_vt(VarType::BSTR);
        // SAFETY: the payload is a native string owned by this value
        unsafe { bstr::to_string(self.data.bstr) }
    }

    /// Stores a `VT_DISPATCH`, transferring the reference into the value.
    pub fn set_dispatch(&mut self, value: Option<ComPtr>) {
        self.assert_empty();
        self.vt = VarType::DISPATCH.raw();
        self.data.dispatch = value.map_or(ptr::null_mut(), ComObject::into_raw);
    }

    /// Reads a `VT_DISPATCH` as a new reference.
    #[must_use]
    pub fn as_dispatch(&self) -> Option<ComPtr> {
        self.assert_vt(VarType::DISPATCH);
        // SAFETY: the payload holds a live reference owned by this value
        unsafe { Self::clone_interface(self.data.dispatch) }
    }

    /// Stores a `VT_UNKNOWN`, transferring the reference into the value.
    pub fn set_unknown(&mut self, value: Option<ComPtr>) {
        self.assert_empty();
        self.vt = VarType::UNKNOWN.raw();
        self.data.unknown = value.map_or(ptr::null_mut(), ComObject::into_raw);
    }

    /// Reads a `VT_UNKNOWN` as a new reference.
    #[must_use]
    pub fn as_unknown(&self) -> Option<ComPtr> {
        self.assert_vt(VarType::UNKNOWN);
        // SAFETY: the payload holds a live reference owned by this value
        unsafe { Self::clone_interface(self.data.unknown) }
    }

    unsafe fn clone_interface(raw: *mut c_void) -> Option<ComPtr> {
        if raw.is_null() {
            None
        } else {
            Some(ComObject::clone_raw(raw))
        }
    }

    /// Stores a `VT_ARRAY | VT_VARIANT`, taking ownership of the array.
    pub fn set_array(&mut self, array: *mut SafeArray) {
        self.assert_empty();
        self.vt = VarType::VARIANT.with_array().raw();
        self.data.array = array;
    }

    /// Reads the array descriptor of a `VT_ARRAY` value.
    #[must_use]
    pub fn as_array(&self) -> *mut SafeArray {
        debug_assert!(self.vt().is_array(), "wire value read with mismatched tag");
        // SAFETY: plain data
        unsafe { self.data.array }
    }

    /// Stores a by-reference value pointing at storage of `vt`'s base type.
    pub fn set_byref(&mut self, vt: VarType, target: *mut c_void) {
        self.assert_empty();
        debug_assert!(vt.is_byref(), "by-reference tag expected, found {vt}");
        self.vt = vt.raw();
        self.data.byref = target;
    }

    /// Reads the pointer of a by-reference value.
    #[must_use]
    pub fn as_byref(&self) -> *mut c_void {
        debug_assert!(self.vt().is_byref(), "wire value read with mismatched tag");
        // SAFETY: plain data
        unsafe { self.data.byref }
    }

    /// Raw view of the first 16 bytes, where a `DECIMAL` payload lives.
    fn decimal_overlay(&self) -> [u8; 16] {
        // SAFETY: `Variant` is `repr(C)`, at least 16 bytes long and fully initialized
        unsafe { ptr::from_ref(self).cast::<[u8; 16]>().read() }
    }

    fn decimal_overlay_mut(&mut self) -> &mut [u8; 16] {
        // SAFETY: as above; any bit pattern is a valid byte array
        unsafe { &mut *ptr::from_mut(self).cast::<[u8; 16]>() }
    }

    /// Stores a `VT_DECIMAL`. The tag is written last, over the decimal's reserved word.
    pub fn set_decimal(&mut self, value: &Decimal) {
        self.assert_empty();
        *self.decimal_overlay_mut() = value.to_wire_bytes();
        self.vt = VarType::DECIMAL.raw();
    }

    /// Reads a `VT_DECIMAL`.
    ///
    /// # Errors
    /// Returns an error if the stored scale is out of range.
    pub fn as_decimal(&self) -> Result<Decimal> {
        self.assert_vt(VarType::DECIMAL);
        self.read_decimal_overlay()
    }

    /// Decodes the decimal overlay regardless of the current tag, which is treated as the
    /// reserved word.
    pub(crate) fn read_decimal_overlay(&self) -> Result<Decimal> {
        let mut bytes = self.decimal_overlay();
        bytes[0] = 0;
        bytes[1] = 0;
        Decimal::from_wire_bytes(&bytes)
    }

    /// Decodes the decimal overlay of a by-reference temporary and resets it to empty without
    /// releasing anything, since the header no longer holds a meaningful tag.
    pub(crate) fn take_decimal_overlay(&mut self) -> Result<Decimal> {
        let value = self.read_decimal_overlay();
        self.vt = VarType::EMPTY.raw();
        self.reserved1 = 0;
        self.reserved2 = 0;
        self.reserved3 = 0;
        self.data = VariantData::ZERO;
        value
    }

    /// Pointer to the storage a by-reference slot of base type `base` would point at, when
    /// this value is used as the backing temporary.
    pub(crate) fn storage_ptr(&mut self, base: VarType) -> *mut c_void {
        if base == VarType::VARIANT || base == VarType::DECIMAL {
            ptr::from_mut(self).cast()
        } else {
            ptr::addr_of_mut!(self.data).cast()
        }
    }

    /// Stores the natural encoding of a dynamic value.
    ///
    /// This is the passthrough used for "any value" slots, array elements and results of
    /// event handlers.
    ///
    /// # Errors
    /// Returns [`Error::NoConversion`] for values without a wire form, or a conversion error
    /// for values out of the wire type's range.
    pub fn set_value(&mut self, value: &Value) -> Result<()> {
        match value {
            Value::Empty => {}
            Value::DbNull => self.set_null(),
            Value::Missing => self.set_error(HResult::DISP_E_PARAMNOTFOUND.0),
            Value::Bool(v) => self.set_bool(*v),
            Value::Char(c) => {
                let unit = u16::try_from(u32::from(*c)).map_err(|_| Error::ConversionOverflow {
                    value: c.to_string(),
                    to: "UInt16".to_string(),
                })?;
                self.set_ui2(unit);
            }
            Value::I8(v) => self.set_i1(*v),
            Value::U8(v) => self.set_ui1(*v),
            Value::I16(v) => self.set_i2(*v),
            Value::U16(v) => self.set_ui2(*v),
            Value::I32(v) => self.set_i4(*v),
            Value::U32(v) => self.set_ui4(*v),
            Value::I64(v) => self.set_i8(*v),
            Value::U64(v) => self.set_ui8(*v),
            Value::ISize(v) => {
                let v = i32::try_from(*v).map_err(|_| Error::ConversionOverflow {
                    value: v.to_string(),
                    to: "VT_INT".to_string(),
                })?;
                self.set_int(v);
            }
            Value::USize(v) => {
                let v = u32::try_from(*v).map_err(|_| Error::ConversionOverflow {
                    value: v.to_string(),
                    to: "VT_UINT".to_string(),
                })?;
                self.set_uint(v);
            }
            Value::F32(v) => self.set_r4(*v),
            Value::F64(v) => self.set_r8(*v),
            Value::Decimal(v) => self.set_decimal(v),
            Value::DateTime(v) => self.set_date(v.to_oa_date()?),
            Value::String(v) => self.set_bstr(Some(v)),
            Value::Currency(v) => self.set_cy(v.to_currency()?),
            Value::ErrorCode(v) => self.set_error(*v),
            Value::Unknown(v) => self.set_unknown(v.clone()),
            Value::Dispatch(v) => self.set_dispatch(v.clone()),
            Value::Variant(inner) => self.set_value(inner)?,
            Value::BStr(v) => self.set_bstr(v.as_deref()),
            Value::Enum(_, underlying) => self.set_value(underlying)?,
            Value::Object(object) => {
                if object.dispatch().is_some() {
                    self.set_dispatch(Some(object.clone()));
                } else {
                    self.set_unknown(Some(object.clone()));
                }
            }
            Value::Array(items) => {
                let mut elements = Vec::with_capacity(items.len());
                for item in items {
                    elements.push(Variant::from_value(item)?);
                }
                self.set_array(safearray::from_variants(elements));
            }
            Value::Custom(object) => {
                if let Some(native) = object.as_native() {
                    self.set_value(&Value::Object(native))?;
                } else if let Some(primitive) = object.to_primitive() {
                    self.set_value(&primitive)?;
                } else {
                    return Err(Error::NoConversion {
                        from: object.managed_type().name(),
                        to: "VARIANT".to_string(),
                    });
                }
            }
            Value::Event(_) | Value::Callable(_) => {
                return Err(Error::NoConversion {
                    from: value.managed_type().name(),
                    to: "VARIANT".to_string(),
                })
            }
        }
        Ok(())
    }

    /// Decodes into a dynamic value, following by-reference pointers.
    ///
    /// `VT_ERROR` carrying `DISP_E_PARAMNOTFOUND` decodes as [`Value::Missing`]; interface
    /// pointers decode as new references.
    ///
    /// # Errors
    /// Returns [`Error::UnsupportedVarType`] for tags without a decoder.
    pub fn to_value(&self) -> Result<Value> {
        self.to_value_at(0)
    }

    fn to_value_at(&self, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING {
            return Err(Error::RecursionLimit(MAX_NESTING));
        }

        let vt = self.vt();
        if vt.is_byref() {
            return self.byref_to_value(depth);
        }
        if vt.is_array() {
            if vt.base() != VarType::VARIANT {
                return Err(Error::UnsupportedVarType(vt));
            }
            let array = self.as_array();
            if array.is_null() {
                return Ok(Value::Empty);
            }
            // SAFETY: the array is owned by this value and outlives the loop
            let elements = unsafe { safearray::variants(array)? };
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(element.to_value_at(depth + 1)?);
            }
            return Ok(Value::Array(items));
        }

        Ok(match vt {
            VarType::EMPTY => Value::Empty,
            VarType::NULL => Value::DbNull,
            VarType::I1 => Value::I8(self.as_i1()),
            VarType::UI1 => Value::U8(self.as_ui1()),
            VarType::I2 => Value::I16(self.as_i2()),
            VarType::UI2 => Value::U16(self.as_ui2()),
            VarType::I4 => Value::I32(self.as_i4()),
            VarType::UI4 => Value::U32(self.as_ui4()),
            VarType::I8 => Value::I64(self.as_i8()),
            VarType::UI8 => Value::U64(self.as_ui8()),
            VarType::INT => Value::I32(self.as_int()),
            VarType::UINT => Value::U32(self.as_uint()),
            VarType::R4 => Value::F32(self.as_r4()),
            VarType::R8 => Value::F64(self.as_r8()),
            VarType::BOOL => Value::Bool(self.as_bool()),
            VarType::CY => Value::Decimal(Decimal::from_currency(self.as_cy())),
            VarType::DATE => Value::DateTime(DateTime::from_oa_date(self.as_date())?),
            VarType::DECIMAL => Value::Decimal(self.as_decimal()?),
            VarType::BSTR => self.as_bstr().map_or(Value::Empty, Value::String),
            VarType::ERROR => error_value(self.as_error()),
            VarType::DISPATCH => self.as_dispatch().map_or(Value::Empty, Value::Object),
            VarType::UNKNOWN => self.as_unknown().map_or(Value::Empty, Value::Object),
            _ => return Err(Error::UnsupportedVarType(vt)),
        })
    }

    fn byref_to_value(&self, depth: usize) -> Result<Value> {
        let vt = self.vt();
        let target = self.as_byref();
        if target.is_null() {
            return Ok(Value::Empty);
        }
        if vt.is_array() {
            return Err(Error::UnsupportedVarType(vt));
        }

        // SAFETY: a by-reference value points at live storage of its base type
        unsafe {
            Ok(match vt.base() {
                VarType::VARIANT => (*target.cast::<Variant>()).to_value_at(depth + 1)?,
                VarType::I1 => Value::I8(*target.cast::<i8>()),
                VarType::UI1 => Value::U8(*target.cast::<u8>()),
                VarType::I2 => Value::I16(*target.cast::<i16>()),
                VarType::UI2 => Value::U16(*target.cast::<u16>()),
                VarType::I4 | VarType::INT => Value::I32(*target.cast::<i32>()),
                VarType::UI4 | VarType::UINT => Value::U32(*target.cast::<u32>()),
                VarType::I8 => Value::I64(*target.cast::<i64>()),
                VarType::UI8 => Value::U64(*target.cast::<u64>()),
                VarType::R4 => Value::F32(*target.cast::<f32>()),
                VarType::R8 => Value::F64(*target.cast::<f64>()),
                VarType::BOOL => Value::Bool(*target.cast::<i16>() != 0),
                VarType::CY => Value::Decimal(Decimal::from_currency(*target.cast::<i64>())),
                VarType::DATE => Value::DateTime(DateTime::from_oa_date(*target.cast::<f64>())?),
                VarType::ERROR => error_value(*target.cast::<i32>()),
                VarType::DECIMAL => {
                    let mut bytes = *target.cast::<[u8; 16]>();
                    bytes[0] = 0;
                    bytes[1] = 0;
                    Value::Decimal(Decimal::from_wire_bytes(&bytes)?)
                }
                VarType::BSTR => {
                    bstr::to_string(*target.cast::<*mut u16>()).map_or(Value::Empty, Value::String)
                }
                VarType::DISPATCH | VarType::UNKNOWN => {
                    Self::clone_interface(*target.cast::<*mut c_void>())
                        .map_or(Value::Empty, Value::Object)
                }
                _ => return Err(Error::UnsupportedVarType(vt)),
            })
        }
    }
}

fn error_value(scode: i32) -> Value {
    if scode == HResult::DISP_E_PARAMNOTFOUND.0 {
        Value::Missing
    } else {
        Value::ErrorCode(scode)
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::new()
    }
}

impl Drop for Variant {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let vt = self.vt();
        if vt.is_byref() || vt.is_array() || vt.owns_resource() {
            return write!(f, "Variant({vt})");
        }
        match self.to_value() {
            Ok(value) => write!(f, "Variant({vt}: {value:?})"),
            Err(_) => write!(f, "Variant({vt})"),
        }
    }
}
