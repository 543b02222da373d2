//! Argument marshaling strategies.
//!
//! An [`ArgMarshaler`] writes one dynamic value into a wire value of the selected tag. Most
//! tags use [`ArgMarshaler::Simple`], an identity cast to the Rust type matching the tag;
//! the other variants handle tags whose wire form differs from the value model.
//!
//! By-reference arguments either point straight into the caller's value, when it already has
//! the wire representation, or into a temporary that is read back after the call.

use std::{ffi::c_void, ptr};

use crate::{
    native::{ComPtr, HResult},
    types::{convert, ManagedType, PrimitiveKind, Value},
    wire::{VarType, Variant},
    Error, Result,
};

/// How a value is written into a wire value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgMarshaler {
    /// Identity cast to the Rust type of the tag
    Simple(VarType),
    /// Coerce to `target` first, then write with `inner`
    Convert {
        /// The type the value is coerced to
        target: ManagedType,
        /// The strategy writing the coerced value
        inner: Box<ArgMarshaler>,
    },
    /// Boolean as the 16-bit -1/0 wire form
    Bool,
    /// Text as a native string; null stays null
    String,
    /// Fixed-point money as a scaled 64-bit integer
    Currency,
    /// Timestamp as an OLE Automation date
    DateTime,
    /// Status code wrapper
    Error,
    /// Dispatch-interface pointer
    Dispatch,
    /// Unknown-interface pointer
    Unknown,
    /// The natural wire form of the runtime value (arrays, records, generic values)
    Variant,
    /// Ask a user-defined value to convert itself at call time
    Convertible,
    /// Nothing; the wire value stays empty
    Null,
    /// The database-null wire value
    DbNull,
    /// The "parameter not found" error value of an omitted optional argument
    Missing,
}

fn no_conversion(value: &Value, to: &str) -> Error {
    Error::NoConversion {
        from: value.managed_type().name(),
        to: to.to_string(),
    }
}

fn kind_of(vt: VarType) -> Option<PrimitiveKind> {
    Some(match vt {
        VarType::I1 => PrimitiveKind::I8,
        VarType::UI1 => PrimitiveKind::U8,
        VarType::I2 => PrimitiveKind::I16,
        VarType::UI2 => PrimitiveKind::U16,
        VarType::I4 => PrimitiveKind::I32,
        VarType::UI4 => PrimitiveKind::U32,
        VarType::I8 => PrimitiveKind::I64,
        VarType::UI8 => PrimitiveKind::U64,
        VarType::INT => PrimitiveKind::ISize,
        VarType::UINT => PrimitiveKind::USize,
        VarType::R4 => PrimitiveKind::F32,
        VarType::R8 => PrimitiveKind::F64,
        VarType::DECIMAL => PrimitiveKind::Decimal,
        _ => return None,
    })
}

fn write_scalar(vt: VarType, value: &Value, slot: &mut Variant) -> Result<()> {
    let kind = kind_of(vt).ok_or(Error::UnsupportedVarType(vt))?;
    let overflow = |v: &dyn ToString| Error::ConversionOverflow {
        value: v.to_string(),
        to: vt.to_string(),
    };

    match convert::to_kind(value, kind)? {
        Value::I8(v) => slot.set_i1(v),
        Value::U8(v) => slot.set_ui1(v),
        Value::I16(v) => slot.set_i2(v),
        Value::U16(v) => slot.set_ui2(v),
        Value::I32(v) => slot.set_i4(v),
        Value::U32(v) => slot.set_ui4(v),
        Value::I64(v) => slot.set_i8(v),
        Value::U64(v) => slot.set_ui8(v),
        Value::ISize(v) => slot.set_int(i32::try_from(v).map_err(|_| overflow(&v))?),
        Value::USize(v) => slot.set_uint(u32::try_from(v).map_err(|_| overflow(&v))?),
        Value::F32(v) => slot.set_r4(v),
        Value::F64(v) => slot.set_r8(v),
        Value::Decimal(v) => slot.set_decimal(&v),
        other => return Err(no_conversion(&other, &vt.to_string())),
    }
    Ok(())
}

fn interface(value: &Value, to: &str) -> Result<Option<ComPtr>> {
    match convert::unwrap(value) {
        Value::Empty => Ok(None),
        Value::Unknown(object) | Value::Dispatch(object) => Ok(object.clone()),
        Value::Object(object) => Ok(Some(object.clone())),
        Value::Custom(custom) => custom
            .as_native()
            .map(Some)
            .ok_or_else(|| no_conversion(value, to)),
        other => Err(no_conversion(other, to)),
    }
}

/// Pointer into the caller's value when its payload already has the wire layout of `vt`.
fn direct_storage(vt: VarType, value: &mut Value) -> Option<*mut c_void> {
    Some(match (vt, value) {
        (VarType::I1, Value::I8(v)) => ptr::from_mut(v).cast(),
        (VarType::UI1, Value::U8(v)) => ptr::from_mut(v).cast(),
        (VarType::I2, Value::I16(v)) => ptr::from_mut(v).cast(),
        (VarType::UI2, Value::U16(v)) => ptr::from_mut(v).cast(),
        (VarType::I4 | VarType::INT, Value::I32(v)) => ptr::from_mut(v).cast(),
        (VarType::UI4 | VarType::UINT, Value::U32(v)) => ptr::from_mut(v).cast(),
        (VarType::I8, Value::I64(v)) => ptr::from_mut(v).cast(),
        (VarType::UI8, Value::U64(v)) => ptr::from_mut(v).cast(),
        (VarType::R4, Value::F32(v)) => ptr::from_mut(v).cast(),
        (VarType::R8, Value::F64(v)) => ptr::from_mut(v).cast(),
        _ => return None,
    })
}

impl ArgMarshaler {
    /// Writes `value` into the empty wire value `slot`.
    ///
    /// # Errors
    /// Returns a conversion error if the value cannot take the wire form of this strategy.
    pub fn marshal(&self, value: &Value, slot: &mut Variant) -> Result<()> {
        match self {
            ArgMarshaler::Simple(vt) => write_scalar(*vt, value, slot)?,
            ArgMarshaler::Convert { target, inner } => {
                let converted = convert::coerce(value, target)?;
                inner.marshal(&converted, slot)?;
            }
            ArgMarshaler::Bool => match convert::to_kind(value, PrimitiveKind::Bool)? {
                Value::Bool(b) => slot.set_bool(b),
                other => return Err(no_conversion(&other, "VT_BOOL")),
            },
            ArgMarshaler::String => match convert::unwrap(value) {
                Value::Empty => slot.set_bstr(None),
                Value::BStr(text) => slot.set_bstr(text.as_deref()),
                other => match convert::to_kind(other, PrimitiveKind::String)? {
                    Value::String(text) => slot.set_bstr(Some(&text)),
                    other => return Err(no_conversion(&other, "VT_BSTR")),
                },
            },
            ArgMarshaler::Currency => match convert::coerce(value, &ManagedType::Currency)? {
                Value::Currency(amount) => slot.set_cy(amount.to_currency()?),
                other => return Err(no_conversion(&other, "VT_CY")),
            },
            ArgMarshaler::DateTime => match convert::to_kind(value, PrimitiveKind::DateTime)? {
                Value::DateTime(date) => slot.set_date(date.to_oa_date()?),
                other => return Err(no_conversion(&other, "VT_DATE")),
            },
            ArgMarshaler::Error => match convert::coerce(value, &ManagedType::ErrorCode)? {
                Value::ErrorCode(code) => slot.set_error(code),
                other => return Err(no_conversion(&other, "VT_ERROR")),
            },
            ArgMarshaler::Dispatch => {
                let object = interface(value, "IDispatch")?;
                if let Some(object) = &object {
                    if object.dispatch().is_none() {
                        return Err(no_conversion(value, "IDispatch"));
                    }
                }
                slot.set_dispatch(object);
            }
            ArgMarshaler::Unknown => slot.set_unknown(interface(value, "IUnknown")?),
            ArgMarshaler::Variant => slot.set_value(value)?,
            ArgMarshaler::Convertible => match value {
                Value::Custom(custom) => {
                    let primitive = custom
                        .to_primitive()
                        .ok_or_else(|| no_conversion(value, "IConvertible"))?;
                    slot.set_value(&primitive)?;
                }
                other => slot.set_value(other)?,
            },
            ArgMarshaler::Null => {}
            ArgMarshaler::DbNull => slot.set_null(),
            ArgMarshaler::Missing => slot.set_error(HResult::DISP_E_PARAMNOTFOUND.0),
        }
        Ok(())
    }

    /// Writes a by-reference slot of tag `vt` for the caller's `value`.
    ///
    /// Returns the temporary backing the slot, or `None` when the slot points straight into
    /// `value`. The caller's value must stay in place until the call returns.
    pub(crate) fn marshal_ref(
        &self,
        vt: VarType,
        value: &mut Value,
        slot: &mut Variant,
    ) -> Result<Option<Box<Variant>>> {
        let base = vt.without_byref();
        if let ArgMarshaler::Simple(simple) = self {
            if let Some(storage) = direct_storage(*simple, value) {
                slot.set_byref(vt, storage);
                return Ok(None);
            }
        }

        let mut temp = Box::new(Variant::new());
        self.marshal(value, &mut temp)?;
        slot.set_byref(vt, temp.storage_ptr(base));
        Ok(Some(temp))
    }

    /// Reads a by-reference temporary back into the caller's representation of `original`.
    pub(crate) fn unmarshal_ref(
        &self,
        base: VarType,
        temp: &mut Variant,
        original: &Value,
    ) -> Result<Value> {
        if base == VarType::DECIMAL {
            let written = Value::Decimal(temp.take_decimal_overlay()?);
            return convert::restore_like(written, original);
        }

        match self {
            ArgMarshaler::Variant | ArgMarshaler::Convertible => temp.to_value(),
            ArgMarshaler::Error if temp.vt() == VarType::ERROR => {
                Ok(Value::ErrorCode(temp.as_error()))
            }
            ArgMarshaler::Convert { .. } if matches!(original, Value::Custom(_)) => {
                temp.to_value()
            }
            _ => convert::restore_like(temp.to_value()?, original),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        test::MockObject,
        wire::{DateTime, Decimal},
    };

    fn write(marshaler: &ArgMarshaler, value: &Value) -> Variant {
        let mut slot = Variant::new();
        marshaler.marshal(value, &mut slot).unwrap();
        slot
    }

    #[test]
    fn scalar_strategies() {
        let cases = vec![
            (ArgMarshaler::Simple(VarType::I4), Value::I16(-3), VarType::I4, Value::I32(-3)),
            (ArgMarshaler::Simple(VarType::INT), Value::ISize(9), VarType::INT, Value::I32(9)),
            (ArgMarshaler::Simple(VarType::R4), Value::F32(0.5), VarType::R4, Value::F32(0.5)),
            (ArgMarshaler::Bool, Value::Bool(true), VarType::BOOL, Value::Bool(true)),
            (
                ArgMarshaler::Currency,
                Value::Currency(Decimal::new(12345, 2).unwrap()),
                VarType::CY,
                Value::Decimal(Decimal::new(12345, 2).unwrap()),
            ),
            (ArgMarshaler::Error, Value::ErrorCode(-5), VarType::ERROR, Value::ErrorCode(-5)),
            (ArgMarshaler::DbNull, Value::DbNull, VarType::NULL, Value::DbNull),
            (ArgMarshaler::Missing, Value::Missing, VarType::ERROR, Value::Missing),
            (ArgMarshaler::Null, Value::Empty, VarType::EMPTY, Value::Empty),
        ];

        for (marshaler, value, vt, decoded) in cases {
            let slot = write(&marshaler, &value);
            assert_eq!(slot.vt(), vt, "{marshaler:?}");
            assert_eq!(slot.to_value().unwrap(), decoded, "{marshaler:?}");
        }
    }

    #[test]
    fn string_strategy_keeps_null() {
        let slot = write(&ArgMarshaler::String, &Value::BStr(None));
        assert_eq!(slot.vt(), VarType::BSTR);
        assert_eq!(slot.as_bstr(), None);

        let slot = write(&ArgMarshaler::String, &Value::from("abc"));
        assert_eq!(slot.as_bstr().as_deref(), Some("abc"));
    }

    #[test]
    fn date_strategy() {
        let date = DateTime::from_ymd_hms(2000, 1, 1, 12, 0, 0).unwrap();
        let slot = write(&ArgMarshaler::DateTime, &Value::DateTime(date));
        assert_eq!(slot.as_date(), 36526.5);
    }

    #[test]
    fn interface_strategies() {
        let object = MockObject::builder("Target").build();
        let slot = write(&ArgMarshaler::Dispatch, &Value::Object(object.clone()));
        assert_eq!(slot.vt(), VarType::DISPATCH);
        assert!(std::sync::Arc::ptr_eq(&slot.as_dispatch().unwrap(), &object));

        let slot = write(&ArgMarshaler::Unknown, &Value::Empty);
        assert!(slot.as_unknown().is_none());

        let mut slot = Variant::new();
        assert!(ArgMarshaler::Dispatch
            .marshal(&Value::I32(1), &mut slot)
            .is_err());
    }

    #[test]
    fn direct_reference_is_not_copied() {
        let mut value = Value::I32(5);
        let mut slot = Variant::new();
        let temp = ArgMarshaler::Simple(VarType::I4)
            .marshal_ref(VarType::I4.with_byref(), &mut value, &mut slot)
            .unwrap();
        assert!(temp.is_none());

        unsafe { *slot.as_byref().cast::<i32>() = 77 };
        drop(slot);
        assert_eq!(value, Value::I32(77));
    }

    #[test]
    fn bool_reference_reads_back_nonzero_as_true() {
        for (written, expected) in [(0i16, false), (-1, true), (1, true), (0x100, true)] {
            let mut value = Value::Bool(!expected);
            let mut slot = Variant::new();
            let mut temp = ArgMarshaler::Bool
                .marshal_ref(VarType::BOOL.with_byref(), &mut value, &mut slot)
                .unwrap()
                .unwrap();

            unsafe { *slot.as_byref().cast::<i16>() = written };
            let back = ArgMarshaler::Bool
                .unmarshal_ref(VarType::BOOL, &mut temp, &value)
                .unwrap();
            assert_eq!(back, Value::Bool(expected), "{written}");
        }
    }

    #[test]
    fn decimal_reference_round_trip() {
        let original = Value::Decimal(Decimal::new(15, 1).unwrap());
        let mut value = original.clone();
        let mut slot = Variant::new();
        let mut temp = ArgMarshaler::Simple(VarType::DECIMAL)
            .marshal_ref(VarType::DECIMAL.with_byref(), &mut value, &mut slot)
            .unwrap()
            .unwrap();

        let replacement = Decimal::new(-42, 3).unwrap().to_wire_bytes();
        unsafe { *slot.as_byref().cast::<[u8; 16]>() = replacement };
        let back = ArgMarshaler::Simple(VarType::DECIMAL)
            .unmarshal_ref(VarType::DECIMAL, &mut temp, &original)
            .unwrap();
        assert_eq!(back, Value::Decimal(Decimal::new(-42, 3).unwrap()));
        assert!(temp.is_empty());
    }

    #[test]
    fn variant_reference_takes_new_type() {
        let mut value = Value::Empty;
        let mut slot = Variant::new();
        let mut temp = ArgMarshaler::Variant
            .marshal_ref(VarType::VARIANT.with_byref(), &mut value, &mut slot)
            .unwrap()
            .unwrap();

        let target = unsafe { &mut *slot.as_byref().cast::<Variant>() };
        target.clear();
        target.set_bstr(Some("filled"));

        let back = ArgMarshaler::Variant
            .unmarshal_ref(VarType::VARIANT, &mut temp, &value)
            .unwrap();
        assert_eq!(back, Value::from("filled"));
    }
}
