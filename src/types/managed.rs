//! Static types of the dynamic value model.
//!
//! A [`ManagedType`] describes what the caller declared for an argument (or what a value
//! carries at runtime). The type selector of [`crate::marshal`] maps it to a wire tag. User
//! defined types are described by [`CustomType`]: their name, the primitive types they
//! implicitly convert to, and whether they can convert themselves at call time.

use std::{fmt, sync::Arc};

use strum::{Display, EnumIter};

use crate::native::ComPtr;
use crate::types::Value;

/// Built-in primitive kinds with a fixed wire tag.
///
/// The display form is the conventional type name used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIter, Display)]
pub enum PrimitiveKind {
    /// `bool`
    #[strum(serialize = "Boolean")]
    Bool,
    /// A UTF-16 code unit sized character
    #[strum(serialize = "Char")]
    Char,
    /// `i8`
    #[strum(serialize = "SByte")]
    I8,
    /// `u8`
    #[strum(serialize = "Byte")]
    U8,
    /// `i16`
    #[strum(serialize = "Int16")]
    I16,
    /// `u16`
    #[strum(serialize = "UInt16")]
    U16,
    /// `i32`
    #[strum(serialize = "Int32")]
    I32,
    /// `u32`
    #[strum(serialize = "UInt32")]
    U32,
    /// `i64`
    #[strum(serialize = "Int64")]
    I64,
    /// `u64`
    #[strum(serialize = "UInt64")]
    U64,
    /// `isize`
    #[strum(serialize = "IntPtr")]
    ISize,
    /// `usize`
    #[strum(serialize = "UIntPtr")]
    USize,
    /// `f32`
    #[strum(serialize = "Single")]
    F32,
    /// `f64`
    #[strum(serialize = "Double")]
    F64,
    /// [`crate::wire::Decimal`]
    #[strum(serialize = "Decimal")]
    Decimal,
    /// [`crate::wire::DateTime`]
    #[strum(serialize = "DateTime")]
    DateTime,
    /// `String`
    #[strum(serialize = "String")]
    String,
}

impl PrimitiveKind {
    /// Returns `true` for value types; only strings are references.
    #[must_use]
    pub fn is_value_type(self) -> bool {
        self != PrimitiveKind::String
    }
}

/// An enumeration type and the integer type it is stored as.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnumType {
    /// Name of the enumeration
    pub name: String,
    /// The underlying integer kind
    pub underlying: PrimitiveKind,
}

impl EnumType {
    /// Creates an enumeration description.
    pub fn new(name: impl Into<String>, underlying: PrimitiveKind) -> Arc<Self> {
        Arc::new(EnumType {
            name: name.into(),
            underlying,
        })
    }
}

/// A user-defined type.
///
/// # Examples
///
/// ```rust
/// use dispbind::types::{CustomType, ManagedType, PrimitiveKind};
///
/// let meters = CustomType::builder("Meters")
///     .implicit(ManagedType::Primitive(PrimitiveKind::F64))
///     .value_type()
///     .build();
/// assert_eq!(meters.implicit_conversions.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CustomType {
    /// Name of the type
    pub name: String,
    /// Types this type implicitly converts to
    pub implicit_conversions: Vec<ManagedType>,
    /// Instances can convert themselves to a primitive at call time
    pub convertible: bool,
    /// Instances are values rather than references
    pub is_value_type: bool,
}

impl CustomType {
    /// Starts describing a type named `name`.
    pub fn builder(name: impl Into<String>) -> CustomTypeBuilder {
        CustomTypeBuilder {
            ty: CustomType {
                name: name.into(),
                implicit_conversions: Vec::new(),
                convertible: false,
                is_value_type: false,
            },
        }
    }
}

/// Builder of [`CustomType`].
#[derive(Debug)]
pub struct CustomTypeBuilder {
    ty: CustomType,
}

impl CustomTypeBuilder {
    /// Declares an implicit conversion to `target`.
    #[must_use]
    pub fn implicit(mut self, target: ManagedType) -> Self {
        self.ty.implicit_conversions.push(target);
        self
    }

    /// Declares that instances can convert themselves to a primitive at call time.
    #[must_use]
    pub fn convertible(mut self) -> Self {
        self.ty.convertible = true;
        self
    }

    /// Declares the type as a value type.
    #[must_use]
    pub fn value_type(mut self) -> Self {
        self.ty.is_value_type = true;
        self
    }

    /// Finishes the description.
    #[must_use]
    pub fn build(self) -> Arc<CustomType> {
        Arc::new(self.ty)
    }
}

/// The static type of an argument or value.
#[derive(Debug, Clone, PartialEq)]
pub enum ManagedType {
    /// A built-in primitive
    Primitive(PrimitiveKind),
    /// "Any value"; the runtime type decides
    Object,
    /// The database-null marker
    DbNull,
    /// The omitted-optional-argument marker
    Missing,
    /// Fixed-point money
    Currency,
    /// A 32-bit status code
    ErrorCode,
    /// An explicit unknown-interface wrapper
    UnknownWrapper,
    /// An explicit dispatch-interface wrapper
    DispatchWrapper,
    /// An explicit generic wire value wrapper
    VariantWrapper,
    /// An explicit native string wrapper
    BStrWrapper,
    /// A native object handle
    ComObject,
    /// An enumeration
    Enum(Arc<EnumType>),
    /// An optional value of the inner type
    Nullable(Box<ManagedType>),
    /// An array with elements of the inner type
    Array(Box<ManagedType>),
    /// An unresolved generic type parameter
    Generic(String),
    /// A user-defined type
    Custom(Arc<CustomType>),
    /// A bound event
    Event,
    /// A callable member
    Callable,
}

impl ManagedType {
    /// The type name used in diagnostics.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            ManagedType::Primitive(kind) => kind.to_string(),
            ManagedType::Object => "Object".to_string(),
            ManagedType::DbNull => "DBNull".to_string(),
            ManagedType::Missing => "Missing".to_string(),
            ManagedType::Currency => "CurrencyWrapper".to_string(),
            ManagedType::ErrorCode => "ErrorWrapper".to_string(),
            ManagedType::UnknownWrapper => "UnknownWrapper".to_string(),
            ManagedType::DispatchWrapper => "DispatchWrapper".to_string(),
            ManagedType::VariantWrapper => "VariantWrapper".to_string(),
            ManagedType::BStrWrapper => "BStrWrapper".to_string(),
            ManagedType::ComObject => "ComObject".to_string(),
            ManagedType::Enum(ty) => ty.name.clone(),
            ManagedType::Nullable(inner) => format!("Nullable<{}>", inner.name()),
            ManagedType::Array(inner) => format!("{}[]", inner.name()),
            ManagedType::Generic(name) => name.clone(),
            ManagedType::Custom(ty) => ty.name.clone(),
            ManagedType::Event => "BoundDispEvent".to_string(),
            ManagedType::Callable => "DispCallable".to_string(),
        }
    }

    /// Returns `true` for value types.
    #[must_use]
    pub fn is_value_type(&self) -> bool {
        match self {
            ManagedType::Primitive(kind) => kind.is_value_type(),
            ManagedType::Enum(_) | ManagedType::Nullable(_) => true,
            ManagedType::Custom(ty) => ty.is_value_type,
            _ => false,
        }
    }
}

impl From<PrimitiveKind> for ManagedType {
    fn from(kind: PrimitiveKind) -> Self {
        ManagedType::Primitive(kind)
    }
}

impl fmt::Display for ManagedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// A user-defined runtime value.
///
/// Implemented by values of [`CustomType`]s. The marshaling layer asks the object to convert
/// itself when the static type declared an implicit conversion, or at call time when the type
/// is only convertible.
pub trait ManagedObject: Send + Sync + fmt::Debug {
    /// The runtime type of the object.
    fn managed_type(&self) -> ManagedType;

    /// Applies a declared implicit conversion to `target`.
    fn convert_implicit(&self, _target: &ManagedType) -> Option<Value> {
        None
    }

    /// Converts to a primitive value at call time.
    fn to_primitive(&self) -> Option<Value> {
        None
    }

    /// The native object wrapped by this value, if any.
    fn as_native(&self) -> Option<ComPtr> {
        None
    }
}
