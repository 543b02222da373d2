//! Value coercions used by the marshaling strategies.
//!
//! This is the small subset of a general conversion utility the binder needs: numeric
//! conversions with range checks, boolean and character conversions, string parsing and
//! formatting, and the declared implicit conversions of user-defined types. Floating point
//! and decimal values convert to integers by rounding half to even.

use crate::{
    native::ComPtr,
    types::{ManagedType, PrimitiveKind, Value},
    wire::{DateTime, Decimal},
    Error, Result,
};

fn no_conversion(value: &Value, to: impl ToString) -> Error {
    Error::NoConversion {
        from: value.managed_type().name(),
        to: to.to_string(),
    }
}

fn overflow(value: impl ToString, to: PrimitiveKind) -> Error {
    Error::ConversionOverflow {
        value: value.to_string(),
        to: to.to_string(),
    }
}

/// Strips enumeration and generic wire value wrappers.
#[must_use]
pub fn unwrap(value: &Value) -> &Value {
    match value {
        Value::Enum(_, inner) | Value::Variant(inner) => unwrap(inner),
        other => other,
    }
}

fn to_integer(value: &Value, kind: PrimitiveKind) -> Result<i128> {
    let float = |f: f64| -> Result<i128> {
        if !f.is_finite() {
            return Err(overflow(f, kind));
        }
        let rounded = f.round_ties_even();
        if rounded.abs() >= 1.0e38 {
            return Err(overflow(f, kind));
        }
        Ok(rounded as i128)
    };

    match unwrap(value) {
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::Char(c) => Ok(i128::from(u32::from(*c))),
        Value::I8(v) => Ok(i128::from(*v)),
        Value::U8(v) => Ok(i128::from(*v)),
        Value::I16(v) => Ok(i128::from(*v)),
        Value::U16(v) => Ok(i128::from(*v)),
        Value::I32(v) | Value::ErrorCode(v) => Ok(i128::from(*v)),
        Value::U32(v) => Ok(i128::from(*v)),
        Value::I64(v) => Ok(i128::from(*v)),
        Value::U64(v) => Ok(i128::from(*v)),
        Value::ISize(v) => Ok(*v as i128),
        Value::USize(v) => Ok(*v as i128),
        Value::F32(v) => float(f64::from(*v)),
        Value::F64(v) => float(*v),
        Value::Decimal(v) | Value::Currency(v) => float(v.to_f64()),
        Value::String(text) | Value::BStr(Some(text)) => text
            .trim()
            .parse::<i128>()
            .map_err(|_| no_conversion(value, kind)),
        other => Err(no_conversion(other, kind)),
    }
}

fn to_float(value: &Value, kind: PrimitiveKind) -> Result<f64> {
    match unwrap(value) {
        Value::F32(v) => Ok(f64::from(*v)),
        Value::F64(v) => Ok(*v),
        Value::Decimal(v) | Value::Currency(v) => Ok(v.to_f64()),
        Value::String(text) | Value::BStr(Some(text)) => text
            .trim()
            .parse::<f64>()
            .map_err(|_| no_conversion(value, kind)),
        Value::Char(_) => Err(no_conversion(value, kind)),
        other => Ok(to_integer(other, kind)? as f64),
    }
}

fn to_decimal(value: &Value) -> Result<Decimal> {
    match unwrap(value) {
        Value::Decimal(v) | Value::Currency(v) => Ok(*v),
        Value::F32(v) => Decimal::from_f64(f64::from(*v)),
        Value::F64(v) => Decimal::from_f64(*v),
        other => Decimal::new(to_integer(other, PrimitiveKind::Decimal)?, 0),
    }
}

macro_rules! integer_kind {
    ($value:expr, $kind:expr, $ty:ty, $variant:ident) => {{
        let wide = to_integer($value, $kind)?;
        let narrow = <$ty>::try_from(wide).map_err(|_| overflow(wide, $kind))?;
        Value::$variant(narrow)
    }};
}

/// Converts a value to the Rust representation of a primitive kind.
///
/// # Errors
/// Returns [`Error::NoConversion`] if no conversion exists and
/// [`Error::ConversionOverflow`] if the value is out of range.
///
/// # Examples
///
/// ```rust
/// use dispbind::types::{convert, PrimitiveKind, Value};
///
/// let value = convert::to_kind(&Value::F64(2.5), PrimitiveKind::I32)?;
/// assert_eq!(value, Value::I32(2));
/// # Ok::<(), dispbind::Error>(())
/// ```
pub fn to_kind(value: &Value, kind: PrimitiveKind) -> Result<Value> {
    Ok(match kind {
        PrimitiveKind::Bool => match unwrap(value) {
            Value::Bool(b) => Value::Bool(*b),
            Value::F32(v) => Value::Bool(*v != 0.0),
            Value::F64(v) => Value::Bool(*v != 0.0),
            Value::Decimal(v) | Value::Currency(v) => Value::Bool(v.mantissa() != 0),
            Value::String(text) | Value::BStr(Some(text)) => {
                let text = text.trim();
                if text.eq_ignore_ascii_case("true") {
                    Value::Bool(true)
                } else if text.eq_ignore_ascii_case("false") {
                    Value::Bool(false)
                } else {
                    return Err(no_conversion(value, kind));
                }
            }
            Value::Char(_) => return Err(no_conversion(value, kind)),
            other => Value::Bool(to_integer(other, kind)? != 0),
        },
        PrimitiveKind::Char => match unwrap(value) {
            Value::Char(c) => Value::Char(*c),
            Value::String(text) | Value::BStr(Some(text)) if text.chars().count() == 1 => {
                Value::Char(text.chars().next().unwrap_or_default())
            }
            Value::Bool(_) | Value::F32(_) | Value::F64(_) | Value::Decimal(_) => {
                return Err(no_conversion(value, kind))
            }
            other => {
                let code = to_integer(other, kind)?;
                let c = u16::try_from(code)
                    .ok()
                    .and_then(|unit| char::from_u32(u32::from(unit)))
                    .ok_or_else(|| overflow(code, kind))?;
                Value::Char(c)
            }
        },
        PrimitiveKind::I8 => integer_kind!(value, kind, i8, I8),
        PrimitiveKind::U8 => integer_kind!(value, kind, u8, U8),
        PrimitiveKind::I16 => integer_kind!(value, kind, i16, I16),
        PrimitiveKind::U16 => integer_kind!(value, kind, u16, U16),
        PrimitiveKind::I32 => integer_kind!(value, kind, i32, I32),
        PrimitiveKind::U32 => integer_kind!(value, kind, u32, U32),
        PrimitiveKind::I64 => integer_kind!(value, kind, i64, I64),
        PrimitiveKind::U64 => integer_kind!(value, kind, u64, U64),
        PrimitiveKind::ISize => integer_kind!(value, kind, isize, ISize),
        PrimitiveKind::USize => integer_kind!(value, kind, usize, USize),
        PrimitiveKind::F32 => Value::F32(to_float(value, kind)? as f32),
        PrimitiveKind::F64 => Value::F64(to_float(value, kind)?),
        PrimitiveKind::Decimal => Value::Decimal(to_decimal(value)?),
        PrimitiveKind::DateTime => match unwrap(value) {
            Value::DateTime(v) => Value::DateTime(*v),
            Value::F64(v) => Value::DateTime(DateTime::from_oa_date(*v)?),
            other => return Err(no_conversion(other, kind)),
        },
        PrimitiveKind::String => match unwrap(value) {
            Value::String(text) | Value::BStr(Some(text)) => Value::String(text.clone()),
            Value::Char(c) => Value::String(c.to_string()),
            Value::Bool(b) => Value::String(if *b { "True" } else { "False" }.to_string()),
            Value::F32(v) => Value::String(v.to_string()),
            Value::F64(v) => Value::String(v.to_string()),
            Value::Decimal(v) => Value::String(v.to_string()),
            Value::DateTime(v) => Value::String(v.to_string()),
            other => Value::String(to_integer(other, kind)?.to_string()),
        },
    })
}

/// Converts a value to a declared target type.
///
/// User-defined values apply their declared implicit conversion; everything else goes
/// through [`to_kind`] or the wrapper conversions.
///
/// # Errors
/// Returns [`Error::NoConversion`] if no conversion to `target` exists.
pub fn coerce(value: &Value, target: &ManagedType) -> Result<Value> {
    if let Value::Custom(object) = value {
        let converted = object
            .convert_implicit(target)
            .ok_or_else(|| no_conversion(value, target))?;
        if let Value::Custom(_) = converted {
            return Err(no_conversion(value, target));
        }
        return coerce(&converted, target);
    }

    match target {
        ManagedType::Primitive(kind) => to_kind(value, *kind),
        ManagedType::Enum(ty) => Ok(Value::Enum(
            ty.clone(),
            Box::new(to_kind(unwrap(value), ty.underlying)?),
        )),
        ManagedType::Nullable(inner) => {
            if value.is_empty() {
                Err(Error::NullableWithoutValue(inner.name()))
            } else {
                coerce(value, inner)
            }
        }
        ManagedType::Currency => Ok(Value::Currency(to_decimal(value)?)),
        ManagedType::ErrorCode => match to_kind(value, PrimitiveKind::I32)? {
            Value::I32(code) => Ok(Value::ErrorCode(code)),
            _ => Err(no_conversion(value, target)),
        },
        _ => Ok(value.clone()),
    }
}

/// Reshapes a value written back through a by-reference slot to the caller's original
/// representation.
///
/// # Errors
/// Returns a conversion error if the written value does not fit the original type.
pub fn restore_like(written: Value, original: &Value) -> Result<Value> {
    match original {
        Value::Enum(ty, inner) => Ok(Value::Enum(
            ty.clone(),
            Box::new(restore_like(written, inner)?),
        )),
        Value::Currency(_) => Ok(Value::Currency(to_decimal(&written)?)),
        Value::ErrorCode(_) => match written {
            Value::Missing => Ok(Value::ErrorCode(crate::native::HResult::DISP_E_PARAMNOTFOUND.0)),
            other => coerce(&other, &ManagedType::ErrorCode),
        },
        Value::BStr(_) => Ok(Value::BStr(match written {
            Value::String(text) => Some(text),
            _ => None,
        })),
        Value::String(_) if written.is_empty() => Ok(Value::Empty),
        Value::Unknown(_) => Ok(rewrap(written, Value::Unknown)),
        Value::Dispatch(_) => Ok(rewrap(written, Value::Dispatch)),
        _ => match original.managed_type() {
            ManagedType::Primitive(kind) => to_kind(&written, kind),
            _ => Ok(written),
        },
    }
}

/// Puts a written-back interface into the caller's wrapper kind.
fn rewrap(written: Value, wrapper: fn(Option<ComPtr>) -> Value) -> Value {
    match written {
        Value::Object(object) => wrapper(Some(object)),
        Value::Unknown(object) | Value::Dispatch(object) => wrapper(object),
        Value::Empty | Value::DbNull => wrapper(None),
        other => other,
    }
}
