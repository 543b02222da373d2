//! The invocation pipeline.
//!
//! One call to [`invoke`] resolves named argument ids, selects and marshals every argument
//! into a reversed argument block, calls `Invoke`, translates the status and finally copies
//! by-reference temporaries back into the caller's arguments. Everything acquired for the
//! call is released in reverse order of acquisition, whether the call succeeded or not.

use std::sync::Arc;

use log::debug;

use crate::{
    dispatch::status,
    marshal::{ArgumentPlan, TypeSelector},
    native::{ComPtr, DispId, Dispatch, InvokeFlags, Lcid, DISPID_PROPERTYPUT},
    types::{Argument, Value},
    wire::{ArgBuffer, DispParams, ExcepInfo, Variant},
    Error, Result,
};

/// A resolved call target: member id, access flags and locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Invocation<'a> {
    /// Name of the member, used for named argument lookup and error reporting
    pub member: &'a str,
    /// Member id passed to `Invoke`
    pub dispid: DispId,
    /// Access flags passed to `Invoke`
    pub flags: InvokeFlags,
    /// Locale passed to name resolution and `Invoke`
    pub lcid: Lcid,
}

impl<'a> Invocation<'a> {
    /// Creates a call target using the neutral locale.
    #[must_use]
    pub fn new(member: &'a str, dispid: DispId, flags: InvokeFlags) -> Self {
        Invocation {
            member,
            dispid,
            flags,
            lcid: 0,
        }
    }

    /// Sets the locale of the call.
    #[must_use]
    pub fn with_lcid(mut self, lcid: Lcid) -> Self {
        self.lcid = lcid;
        self
    }

    /// Whether this call writes a property; the last argument is then the assigned value.
    #[must_use]
    pub fn assigns(&self) -> bool {
        self.flags
            .intersects(InvokeFlags::PROPERTYPUT | InvokeFlags::PROPERTYPUTREF)
    }
}

/// Invokes a member of `object`.
///
/// `args` are in caller order; named arguments may appear anywhere. For property writes the
/// last argument is the assigned value. By-reference arguments receive the value the object
/// left in their slot, even if the call failed.
///
/// # Errors
///
/// * [`Error::NotDispatch`] - The object has no dispatch interface
/// * [`Error::CouldNotGetDispId`] / [`Error::GetIdsOfNamesInvalid`] - Named argument lookup failed
/// * Marshaling errors from argument selection and conversion
/// * The translated status of `Invoke`
///
/// # Examples
///
/// ```rust,no_run
/// use dispbind::{dispatch::{invoke, Invocation}, native::{ComPtr, InvokeFlags}, types::Argument};
///
/// # fn object() -> ComPtr { unimplemented!() }
/// let call = Invocation::new("Add", 7, InvokeFlags::METHOD | InvokeFlags::PROPERTYGET);
/// let sum = invoke(&object(), &call, &mut [Argument::new(1), Argument::new(2)])?;
/// # Ok::<(), dispbind::Error>(())
/// ```
pub fn invoke(object: &ComPtr, call: &Invocation<'_>, args: &mut [Argument]) -> Result<Value> {
    let object = Arc::clone(object);
    let dispatch = object.dispatch().ok_or(Error::NotDispatch)?;
    let assigns = call.assigns();
    if assigns && args.is_empty() {
        return Err(Error::BadParamCount(call.member.to_string()));
    }

    let mut named_ids = pin_named_ids(
        dispatch,
        call,
        &ArgumentPlan::named_names(args, assigns),
        assigns,
    )?;

    let mut plan = ArgumentPlan::new(&TypeSelector::new(), args, assigns)?;
    debug_assert_eq!(plan.named_count() + usize::from(assigns), named_ids.len());

    let mut buffer = ArgBuffer::new(plan.len());
    plan.populate(args, buffer.as_mut_slice())?;

    let mut result = Variant::new();
    let mut excep_info = ExcepInfo::new();
    let mut arg_err = 0u32;

    debug!(
        "Invoking {} (dispid {}, {:?}) on {} with {} argument(s)",
        call.member,
        call.dispid,
        call.flags,
        object.id(),
        plan.len()
    );

    let hresult = {
        let mut params = DispParams::new(buffer.as_mut_slice(), &mut named_ids);
        dispatch.invoke(
            call.dispid,
            call.lcid,
            call.flags,
            &mut params,
            &mut result,
            &mut excep_info,
            &mut arg_err,
        )
    };

    let outcome = status::check(hresult, call.member, &mut excep_info, arg_err, |slot| {
        plan.caller_index(slot)
    });
    if let Err(error) = &outcome {
        debug!("{} returned {}: {}", call.member, hresult, error);
    }

    drop(buffer);
    drop(named_ids);
    drop(object);

    let written = plan.write_back(args);
    outcome?;
    written?;

    result.to_value()
}

/// Resolves the ids of the named arguments, in the order the argument block expects them.
///
/// The assigned value of a property write always leads with [`DISPID_PROPERTYPUT`]. The
/// remaining ids follow in reverse logical order, matching the reversed block.
fn pin_named_ids(
    dispatch: &dyn Dispatch,
    call: &Invocation<'_>,
    names: &[&str],
    assigns: bool,
) -> Result<Vec<DispId>> {
    let mut pinned = Vec::with_capacity(names.len() + 1);
    if assigns {
        pinned.push(DISPID_PROPERTYPUT);
    }
    if names.is_empty() {
        return Ok(pinned);
    }

    let mut lookup = Vec::with_capacity(names.len() + 1);
    lookup.push(call.member);
    lookup.extend_from_slice(names);

    let ids = dispatch
        .ids_of_names(&lookup, call.lcid)
        .map_err(|hresult| Error::CouldNotGetDispId {
            name: call.member.to_string(),
            hresult,
        })?;
    if ids.len() != lookup.len() || ids[0] != call.dispid {
        return Err(Error::GetIdsOfNamesInvalid(call.member.to_string()));
    }

    pinned.extend(ids[1..].iter().rev());
    Ok(pinned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        native::{HResult, DISPID_VALUE},
        test::{MockObject, Recorded},
    };

    fn call_flags() -> InvokeFlags {
        InvokeFlags::METHOD | InvokeFlags::PROPERTYGET
    }

    #[test]
    fn arguments_arrive_reversed() {
        let object = MockObject::builder("Calc")
            .method("Add", 7, |args| {
                Ok(Value::I32(args.iter().map(|v| match v {
                    Value::I32(n) => *n,
                    _ => 0,
                }).sum()))
            })
            .build();

        let call = Invocation::new("Add", 7, call_flags());
        let mut args = [Argument::new(1i32), Argument::new(2i32), Argument::new(4i32)];
        let value = invoke(&object, &call, &mut args).unwrap();
        assert_eq!(value, Value::I32(7));

        let recorded = MockObject::calls(&object);
        assert_eq!(
            recorded.last(),
            Some(&Recorded {
                dispid: 7,
                flags: call_flags(),
                args: vec![Value::I32(1), Value::I32(2), Value::I32(4)],
                named: vec![],
            })
        );
    }

    #[test]
    fn named_arguments_follow_positional() {
        let object = MockObject::builder("Doc")
            .method("Save", 3, |_| Ok(Value::Empty))
            .parameters("Save", &["Path", "Format"])
            .build();

        let call = Invocation::new("Save", 3, call_flags());
        let mut args = [Argument::named("Format", 2i32), Argument::new("out.txt")];
        invoke(&object, &call, &mut args).unwrap();

        let recorded = MockObject::calls(&object);
        let last = recorded.last().unwrap();
        // Logical order: positional, then named
        assert_eq!(last.args, vec![Value::from("out.txt"), Value::I32(2)]);
        assert_eq!(last.named, vec![101]);
    }

    #[test]
    fn property_put_pins_value_id() {
        let object = MockObject::builder("Doc").property("Title", 5, Value::Empty).build();

        let call = Invocation::new("Title", 5, InvokeFlags::PROPERTYPUT);
        invoke(&object, &call, &mut [Argument::new("Draft")]).unwrap();

        let recorded = MockObject::calls(&object);
        let last = recorded.last().unwrap();
        assert_eq!(last.flags, InvokeFlags::PROPERTYPUT);
        assert_eq!(last.named, vec![DISPID_PROPERTYPUT]);
        assert_eq!(last.args, vec![Value::from("Draft")]);
    }

    #[test]
    fn named_lookup_must_echo_member() {
        let object = MockObject::builder("Doc")
            .method("Save", 3, |_| Ok(Value::Empty))
            .parameters("Save", &["Path"])
            .build();

        // Bound under a different id than the object reports for the name
        let call = Invocation::new("Save", DISPID_VALUE, call_flags());
        let error = invoke(&object, &call, &mut [Argument::named("Path", "a")]).unwrap_err();
        assert!(matches!(error, Error::GetIdsOfNamesInvalid(ref m) if m == "Save"));

        let call = Invocation::new("Save", 3, call_flags());
        let error = invoke(&object, &call, &mut [Argument::named("Nope", "a")]).unwrap_err();
        assert!(matches!(
            error,
            Error::CouldNotGetDispId { hresult: HResult::DISP_E_UNKNOWNNAME, .. }
        ));
    }

    #[test]
    fn by_ref_written_back_after_failure() {
        let object = MockObject::builder("Calc")
            .by_ref_method("Fail", 9, |args| {
                unsafe { *args[0].as_byref().cast::<i32>() = 41 };
                HResult::E_FAIL
            })
            .build();

        let call = Invocation::new("Fail", 9, call_flags());
        let mut args = [Argument::by_ref(0i32)];
        let error = invoke(&object, &call, &mut args).unwrap_err();

        assert!(matches!(error, Error::Com { hresult: HResult::E_FAIL, .. }));
        assert_eq!(args[0].value, Value::I32(41));
    }

    #[test]
    fn by_ref_string_roundtrips_through_temporary() {
        let object = MockObject::builder("Text")
            .by_ref_method("Upper", 2, |args| {
                let text = unsafe { &mut *args[0].as_byref().cast::<*mut u16>() };
                let current = unsafe { crate::wire::bstr::to_string(*text) }.unwrap_or_default();
                unsafe { crate::wire::bstr::free_string(*text) };
                *text = crate::wire::bstr::alloc_string(&current.to_uppercase());
                HResult::S_OK
            })
            .build();

        let call = Invocation::new("Upper", 2, call_flags());
        let mut args = [Argument::by_ref("shout")];
        invoke(&object, &call, &mut args).unwrap();
        assert_eq!(args[0].value, Value::from("SHOUT"));
    }

    #[test]
    fn by_ref_wrappers_keep_their_kind() {
        let object = MockObject::builder("Holder")
            .by_ref_method("Touch", 3, |_| HResult::S_OK)
            .build();
        let target = MockObject::builder("Target").build();

        let call = Invocation::new("Touch", 3, call_flags());
        let mut args = [
            Argument::by_ref(Value::Dispatch(Some(target.clone()))),
            Argument::by_ref(Value::Unknown(None)),
        ];
        invoke(&object, &call, &mut args).unwrap();
        assert_eq!(args[0].value, Value::Dispatch(Some(target)));
        assert_eq!(args[1].value, Value::Unknown(None));
    }

    #[test]
    fn type_mismatch_maps_to_caller_index() {
        let object = MockObject::builder("Calc")
            .by_ref_method("Typed", 4, |_| HResult::DISP_E_TYPEMISMATCH)
            .arg_err(0)
            .build();

        let call = Invocation::new("Typed", 4, call_flags());
        let mut args = [Argument::new(1i32), Argument::new(2i32), Argument::new(3i32)];
        let error = invoke(&object, &call, &mut args).unwrap_err();
        // Slot 0 holds the last logical argument
        assert!(matches!(error, Error::TypeMismatch { index: 2, .. }));
    }

    #[test]
    fn not_dispatch() {
        let object = MockObject::plain();
        let call = Invocation::new("Any", 1, call_flags());
        assert!(matches!(
            invoke(&object, &call, &mut []).unwrap_err(),
            Error::NotDispatch
        ));
    }

    #[test]
    fn put_without_value() {
        let object = MockObject::builder("Doc").property("Title", 5, Value::Empty).build();
        let call = Invocation::new("Title", 5, InvokeFlags::PROPERTYPUT);
        assert!(matches!(
            invoke(&object, &call, &mut []).unwrap_err(),
            Error::BadParamCount(_)
        ));
    }
}
