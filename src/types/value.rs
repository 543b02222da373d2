//! Dynamic values and call arguments.

use std::{fmt, sync::Arc};

use crate::{
    binding::DispCallable,
    events::BoundEvent,
    native::ComPtr,
    types::{EnumType, ManagedObject, ManagedType, PrimitiveKind},
    wire::{DateTime, Decimal},
};

/// A dynamic value passed to or returned from a native object.
///
/// Primitive variants carry their natural Rust representation. The explicit wrapper variants
/// ([`Value::Currency`], [`Value::ErrorCode`], [`Value::Unknown`], [`Value::Dispatch`],
/// [`Value::Variant`], [`Value::BStr`]) force a particular wire encoding. Native objects are
/// [`Value::Object`] handles compared by identity.
#[derive(Clone)]
pub enum Value {
    /// No value (`null`)
    Empty,
    /// The database-null marker
    DbNull,
    /// An omitted optional argument
    Missing,
    /// A boolean
    Bool(bool),
    /// A character
    Char(char),
    /// A signed byte
    I8(i8),
    /// A byte
    U8(u8),
    /// A 16-bit signed integer
    I16(i16),
    /// A 16-bit unsigned integer
    U16(u16),
    /// A 32-bit signed integer
    I32(i32),
    /// A 32-bit unsigned integer
    U32(u32),
    /// A 64-bit signed integer
    I64(i64),
    /// A 64-bit unsigned integer
    U64(u64),
    /// A pointer-sized signed integer
    ISize(isize),
    /// A pointer-sized unsigned integer
    USize(usize),
    /// A single-precision float
    F32(f32),
    /// A double-precision float
    F64(f64),
    /// A scaled decimal
    Decimal(Decimal),
    /// A timestamp
    DateTime(DateTime),
    /// A string
    String(String),
    /// Fixed-point money, encoded as currency
    Currency(Decimal),
    /// A status code, encoded as an error value
    ErrorCode(i32),
    /// An object passed as a plain unknown-interface pointer
    Unknown(Option<ComPtr>),
    /// An object passed as a dispatch-interface pointer
    Dispatch(Option<ComPtr>),
    /// A value passed as a generic wire value
    Variant(Box<Value>),
    /// A string passed as a native string; `None` is a null string
    BStr(Option<String>),
    /// An enumeration member and its underlying value
    Enum(Arc<EnumType>, Box<Value>),
    /// An array
    Array(Vec<Value>),
    /// A native object
    Object(ComPtr),
    /// A user-defined value
    Custom(Arc<dyn ManagedObject>),
    /// An event of a native object
    Event(BoundEvent),
    /// A callable member of a native object
    Callable(DispCallable),
}

impl Value {
    /// The runtime type of the value.
    #[must_use]
    pub fn managed_type(&self) -> ManagedType {
        match self {
            Value::Empty => ManagedType::Object,
            Value::DbNull => ManagedType::DbNull,
            Value::Missing => ManagedType::Missing,
            Value::Bool(_) => PrimitiveKind::Bool.into(),
            Value::Char(_) => PrimitiveKind::Char.into(),
            Value::I8(_) => PrimitiveKind::I8.into(),
            Value::U8(_) => PrimitiveKind::U8.into(),
            Value::I16(_) => PrimitiveKind::I16.into(),
            Value::U16(_) => PrimitiveKind::U16.into(),
            Value::I32(_) => PrimitiveKind::I32.into(),
            Value::U32(_) => PrimitiveKind::U32.into(),
            Value::I64(_) => PrimitiveKind::I64.into(),
            Value::U64(_) => PrimitiveKind::U64.into(),
            Value::ISize(_) => PrimitiveKind::ISize.into(),
            Value::USize(_) => PrimitiveKind::USize.into(),
            Value::F32(_) => PrimitiveKind::F32.into(),
            Value::F64(_) => PrimitiveKind::F64.into(),
            Value::Decimal(_) => PrimitiveKind::Decimal.into(),
            Value::DateTime(_) => PrimitiveKind::DateTime.into(),
            Value::String(_) => PrimitiveKind::String.into(),
            Value::Currency(_) => ManagedType::Currency,
            Value::ErrorCode(_) => ManagedType::ErrorCode,
            Value::Unknown(_) => ManagedType::UnknownWrapper,
            Value::Dispatch(_) => ManagedType::DispatchWrapper,
            Value::Variant(_) => ManagedType::VariantWrapper,
            Value::BStr(_) => ManagedType::BStrWrapper,
            Value::Enum(ty, _) => ManagedType::Enum(ty.clone()),
            Value::Array(_) => ManagedType::Array(Box::new(ManagedType::Object)),
            Value::Object(_) => ManagedType::ComObject,
            Value::Custom(object) => object.managed_type(),
            Value::Event(_) => ManagedType::Event,
            Value::Callable(_) => ManagedType::Callable,
        }
    }

    /// Returns `true` for [`Value::Empty`].
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Value::Empty)
    }

    /// Returns `true` if the value holds no object: `Empty`, or a wrapper around a null
    /// pointer or null string.
    #[must_use]
    pub fn holds_null(&self) -> bool {
        match self {
            Value::Empty
            | Value::Unknown(None)
            | Value::Dispatch(None)
            | Value::BStr(None) => true,
            Value::Variant(inner) => inner.holds_null(),
            _ => false,
        }
    }

    /// The native object held, if any.
    #[must_use]
    pub fn as_object(&self) -> Option<&ComPtr> {
        match self {
            Value::Object(object)
            | Value::Unknown(Some(object))
            | Value::Dispatch(Some(object)) => Some(object),
            _ => None,
        }
    }

    /// The string held, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(text) | Value::BStr(Some(text)) => Some(text),
            _ => None,
        }
    }
}

impl Default for Value {
    fn default() -> Self {
        Value::Empty
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Empty, Value::Empty)
            | (Value::DbNull, Value::DbNull)
            | (Value::Missing, Value::Missing) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::I8(a), Value::I8(b)) => a == b,
            (Value::U8(a), Value::U8(b)) => a == b,
            (Value::I16(a), Value::I16(b)) => a == b,
            (Value::U16(a), Value::U16(b)) => a == b,
            (Value::I32(a), Value::I32(b)) => a == b,
            (Value::U32(a), Value::U32(b)) => a == b,
            (Value::I64(a), Value::I64(b)) => a == b,
            (Value::U64(a), Value::U64(b)) => a == b,
            (Value::ISize(a), Value::ISize(b)) => a == b,
            (Value::USize(a), Value::USize(b)) => a == b,
            (Value::F32(a), Value::F32(b)) => a == b,
            (Value::F64(a), Value::F64(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) | (Value::Currency(a), Value::Currency(b)) => {
                a == b
            }
            (Value::DateTime(a), Value::DateTime(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::ErrorCode(a), Value::ErrorCode(b)) => a == b,
            (Value::Unknown(a), Value::Unknown(b)) | (Value::Dispatch(a), Value::Dispatch(b)) => {
                match (a, b) {
                    (Some(a), Some(b)) => Arc::ptr_eq(a, b),
                    (None, None) => true,
                    _ => false,
                }
            }
            (Value::Variant(a), Value::Variant(b)) => a == b,
            (Value::BStr(a), Value::BStr(b)) => a == b,
            (Value::Enum(ta, a), Value::Enum(tb, b)) => ta == tb && a == b,
            (Value::Array(a), Value::Array(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Custom(a), Value::Custom(b)) => Arc::ptr_eq(a, b),
            (Value::Event(a), Value::Event(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Empty => f.write_str("Empty"),
            Value::DbNull => f.write_str("DbNull"),
            Value::Missing => f.write_str("Missing"),
            Value::Bool(v) => write!(f, "Bool({v})"),
            Value::Char(v) => write!(f, "Char({v:?})"),
            Value::I8(v) => write!(f, "I8({v})"),
            Value::U8(v) => write!(f, "U8({v})"),
            Value::I16(v) => write!(f, "I16({v})"),
            Value::U16(v) => write!(f, "U16({v})"),
            Value::I32(v) => write!(f, "I32({v})"),
            Value::U32(v) => write!(f, "U32({v})"),
            Value::I64(v) => write!(f, "I64({v})"),
            Value::U64(v) => write!(f, "U64({v})"),
            Value::ISize(v) => write!(f, "ISize({v})"),
            Value::USize(v) => write!(f, "USize({v})"),
            Value::F32(v) => write!(f, "F32({v})"),
            Value::F64(v) => write!(f, "F64({v})"),
            Value::Decimal(v) => write!(f, "Decimal({v})"),
            Value::DateTime(v) => write!(f, "DateTime({v})"),
            Value::String(v) => write!(f, "String({v:?})"),
            Value::Currency(v) => write!(f, "Currency({v})"),
            Value::ErrorCode(v) => write!(f, "ErrorCode({v:#010x})"),
            Value::Unknown(v) => write!(f, "Unknown({:?})", v.as_ref().map(|o| o.id())),
            Value::Dispatch(v) => write!(f, "Dispatch({:?})", v.as_ref().map(|o| o.id())),
            Value::Variant(v) => write!(f, "Variant({v:?})"),
            Value::BStr(v) => write!(f, "BStr({v:?})"),
            Value::Enum(ty, v) => write!(f, "{}({v:?})", ty.name),
            Value::Array(v) => f.debug_list().entries(v).finish(),
            Value::Object(v) => write!(f, "Object({})", v.id()),
            Value::Custom(v) => write!(f, "Custom({v:?})"),
            Value::Event(v) => write!(f, "{v:?}"),
            Value::Callable(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! impl_from_value {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_value!(
    bool => Bool,
    char => Char,
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    isize => ISize,
    usize => USize,
    f32 => F32,
    f64 => F64,
    Decimal => Decimal,
    DateTime => DateTime,
    String => String,
    ComPtr => Object,
    Vec<Value> => Array,
);

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Value::Empty, Into::into)
    }
}

/// One argument of a call.
///
/// By-reference arguments are written back after the call: when the call returns, `value`
/// holds what the native member stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Argument {
    /// The argument value
    pub value: Value,
    /// Name of a named (keyword) argument
    pub name: Option<String>,
    /// Pass by reference and copy back after the call
    pub by_ref: bool,
    /// The declared type; the runtime type of `value` when absent
    pub static_type: Option<ManagedType>,
}

impl Argument {
    /// A positional by-value argument.
    pub fn new(value: impl Into<Value>) -> Self {
        Argument {
            value: value.into(),
            name: None,
            by_ref: false,
            static_type: None,
        }
    }

    /// A named argument.
    pub fn named(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Argument {
            name: Some(name.into()),
            ..Argument::new(value)
        }
    }

    /// A positional by-reference argument.
    pub fn by_ref(value: impl Into<Value>) -> Self {
        Argument {
            by_ref: true,
            ..Argument::new(value)
        }
    }

    /// Declares the static type of the argument.
    #[must_use]
    pub fn with_type(mut self, ty: ManagedType) -> Self {
        self.static_type = Some(ty);
        self
    }

    /// The type used for wire type selection.
    #[must_use]
    pub fn declared_type(&self) -> ManagedType {
        self.static_type
            .clone()
            .unwrap_or_else(|| self.value.managed_type())
    }
}

impl From<Value> for Argument {
    fn from(value: Value) -> Self {
        Argument::new(value)
    }
}
