//! Wire type selection.
//!
//! [`TypeSelector::select`] decides the wire tag and the marshaling strategy of one argument
//! from its declared type:
//!
//! 1. built-in primitives and the explicit wrapper types have a fixed tag
//! 2. enumerations resolve as their underlying integer type
//! 3. optional values resolve as their inner type; an empty one is an error
//! 4. arrays get the array tag, their element tag is chosen when the value is written
//! 5. unresolved generic parameters are passed as unknown-interface pointers
//! 6. everything else is tentatively a record, and the conversion families are searched for
//!    a primitive tag reachable through a declared implicit conversion
//!
//! By-reference arguments use the pointee's tag with [`VarType::BYREF`]; a reference to an
//! "any value" slot is a reference to a generic wire value.

use crate::{
    marshal::ArgMarshaler,
    types::{Argument, CustomType, ManagedType, PrimitiveKind, Value},
    wire::{VarType, Variant},
    Error, Result,
};

/// Groups of related wire tags, each ordered narrowest first.
///
/// A user-defined type reaching members of two different families is ambiguous.
pub const CONVERSION_FAMILIES: &[&[VarType]] = &[
    &[VarType::I1, VarType::I2, VarType::I4, VarType::I8],
    &[VarType::UI1, VarType::UI2, VarType::UI4, VarType::UI8],
    &[VarType::INT],
    &[VarType::UINT],
    &[VarType::BOOL],
    &[VarType::DATE],
    &[VarType::R4, VarType::R8],
    &[VarType::DECIMAL],
    &[VarType::BSTR],
    &[VarType::CY],
    &[VarType::ERROR],
];

/// The plan for one argument of an invocation.
#[derive(Debug)]
pub struct ArgPlanEntry {
    /// The selected wire tag; passthrough strategies decide the final tag when writing
    pub vt: VarType,
    /// How the value is written
    pub marshaler: ArgMarshaler,
    /// The temporary backing a by-reference slot, filled when the argument is written
    pub temp: Option<Box<Variant>>,
}

impl ArgPlanEntry {
    fn new(vt: VarType, marshaler: ArgMarshaler) -> Self {
        ArgPlanEntry {
            vt,
            marshaler,
            temp: None,
        }
    }
}

/// Selects wire tags and strategies for arguments.
#[derive(Debug, Default, Clone, Copy)]
pub struct TypeSelector;

impl TypeSelector {
    /// Creates a selector.
    #[must_use]
    pub fn new() -> Self {
        TypeSelector
    }

    /// Selects the wire tag and strategy of an argument.
    ///
    /// # Errors
    /// Returns [`Error::AmbiguousConversion`] if a user-defined type converts to more than one
    /// family, and [`Error::NullableWithoutValue`] for an empty optional value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use dispbind::marshal::TypeSelector;
    /// use dispbind::types::Argument;
    /// use dispbind::wire::VarType;
    ///
    /// let entry = TypeSelector::new().select(&Argument::by_ref(true))?;
    /// assert_eq!(entry.vt, VarType::BOOL.with_byref());
    /// # Ok::<(), dispbind::Error>(())
    /// ```
    pub fn select(&self, arg: &Argument) -> Result<ArgPlanEntry> {
        let declared = arg.declared_type();

        if let ManagedType::Nullable(inner) = &declared {
            if arg.value.is_empty() && !arg.by_ref {
                return Err(Error::NullableWithoutValue(inner.name()));
            }
        }

        if arg.by_ref {
            return Ok(self.select_by_ref(&declared));
        }

        if arg.static_type.is_none() {
            match arg.value {
                Value::Empty => return Ok(ArgPlanEntry::new(VarType::EMPTY, ArgMarshaler::Null)),
                Value::DbNull => {
                    return Ok(ArgPlanEntry::new(VarType::NULL, ArgMarshaler::DbNull))
                }
                _ => {}
            }
        }

        let (vt, marshaler) = self.by_value(&declared)?;
        Ok(ArgPlanEntry::new(vt, marshaler))
    }

    fn select_by_ref(&self, declared: &ManagedType) -> ArgPlanEntry {
        let (vt, marshaler) = match declared {
            ManagedType::Object | ManagedType::DbNull => (VarType::VARIANT, ArgMarshaler::Variant),
            other => match Self::fixed(other) {
                (VarType::RECORD | VarType::ARRAY, _) => (VarType::VARIANT, ArgMarshaler::Variant),
                fixed => fixed,
            },
        };
        ArgPlanEntry::new(vt.with_byref(), marshaler)
    }

    fn by_value(&self, declared: &ManagedType) -> Result<(VarType, ArgMarshaler)> {
        let (vt, marshaler) = Self::fixed(declared);
        if vt != VarType::RECORD {
            return Ok((vt, marshaler));
        }

        let ManagedType::Custom(custom) = declared else {
            return Ok((vt, marshaler));
        };
        if let Some((vt, target)) = Self::conversion_family(custom)? {
            let (_, inner) = Self::fixed(&target);
            return Ok((
                vt,
                ArgMarshaler::Convert {
                    target,
                    inner: Box::new(inner),
                },
            ));
        }
        if custom.convertible {
            return Ok((VarType::RECORD, ArgMarshaler::Convertible));
        }
        Ok((vt, marshaler))
    }

    /// The fixed tag of a type, or [`VarType::RECORD`] if it has none.
    fn fixed(ty: &ManagedType) -> (VarType, ArgMarshaler) {
        match ty {
            ManagedType::Primitive(kind) => Self::primitive(*kind),
            ManagedType::ErrorCode => (VarType::ERROR, ArgMarshaler::Error),
            ManagedType::Currency => (VarType::CY, ArgMarshaler::Currency),
            ManagedType::UnknownWrapper => (VarType::UNKNOWN, ArgMarshaler::Unknown),
            ManagedType::DispatchWrapper => (VarType::DISPATCH, ArgMarshaler::Dispatch),
            ManagedType::VariantWrapper => (VarType::VARIANT, ArgMarshaler::Variant),
            ManagedType::BStrWrapper => (VarType::BSTR, ArgMarshaler::String),
            ManagedType::DbNull => (VarType::NULL, ArgMarshaler::DbNull),
            ManagedType::Missing => (VarType::ERROR, ArgMarshaler::Missing),
            ManagedType::Enum(ty) => Self::primitive(ty.underlying),
            ManagedType::Nullable(inner) => Self::fixed(inner),
            ManagedType::Array(_) => (VarType::ARRAY, ArgMarshaler::Variant),
            ManagedType::Generic(_) => (VarType::UNKNOWN, ArgMarshaler::Unknown),
            ManagedType::Object
            | ManagedType::ComObject
            | ManagedType::Custom(_)
            | ManagedType::Event
            | ManagedType::Callable => (VarType::RECORD, ArgMarshaler::Variant),
        }
    }

    fn primitive(kind: PrimitiveKind) -> (VarType, ArgMarshaler) {
        let simple = |vt: VarType| (vt, ArgMarshaler::Simple(vt));
        match kind {
            PrimitiveKind::Bool => (VarType::BOOL, ArgMarshaler::Bool),
            PrimitiveKind::Char => (
                VarType::UI2,
                ArgMarshaler::Convert {
                    target: PrimitiveKind::U16.into(),
                    inner: Box::new(ArgMarshaler::Simple(VarType::UI2)),
                },
            ),
            PrimitiveKind::I8 => simple(VarType::I1),
            PrimitiveKind::U8 => simple(VarType::UI1),
            PrimitiveKind::I16 => simple(VarType::I2),
            PrimitiveKind::U16 => simple(VarType::UI2),
            PrimitiveKind::I32 => simple(VarType::I4),
            PrimitiveKind::U32 => simple(VarType::UI4),
            PrimitiveKind::I64 => simple(VarType::I8),
            PrimitiveKind::U64 => simple(VarType::UI8),
            PrimitiveKind::ISize => simple(VarType::INT),
            PrimitiveKind::USize => simple(VarType::UINT),
            PrimitiveKind::F32 => simple(VarType::R4),
            PrimitiveKind::F64 => simple(VarType::R8),
            PrimitiveKind::Decimal => simple(VarType::DECIMAL),
            PrimitiveKind::DateTime => (VarType::DATE, ArgMarshaler::DateTime),
            PrimitiveKind::String => (VarType::BSTR, ArgMarshaler::String),
        }
    }

    /// Tag a declared conversion target lands on, if it belongs to a family.
    fn family_tag(target: &ManagedType) -> Option<VarType> {
        match target {
            ManagedType::Primitive(_)
            | ManagedType::Enum(_)
            | ManagedType::Currency
            | ManagedType::ErrorCode => Some(Self::fixed(target).0),
            _ => None,
        }
    }

    /// Searches the conversion families for the narrowest tag reachable from `custom`.
    fn conversion_family(custom: &CustomType) -> Result<Option<(VarType, ManagedType)>> {
        let mut matches: Vec<(VarType, ManagedType)> = Vec::new();
        for family in CONVERSION_FAMILIES {
            let hit = family.iter().find_map(|vt| {
                custom
                    .implicit_conversions
                    .iter()
                    .find(|target| Self::family_tag(target) == Some(*vt))
                    .map(|target| (*vt, target.clone()))
            });
            if let Some(hit) = hit {
                matches.push(hit);
            }
        }

        match matches.len() {
            0 => Ok(None),
            1 => Ok(matches.pop()),
            _ => Err(Error::AmbiguousConversion {
                type_name: custom.name.clone(),
                candidates: matches.iter().map(|(_, target)| target.name()).collect(),
            }),
        }
    }
}
