//! Members returned without being invoked.

use std::{fmt, sync::Arc};

use crate::{
    binding::{resolver::select_put, InvokeKind, MethodDesc, TypeDesc},
    dispatch::{invoke, Invocation},
    native::{ComPtr, DispId, InvokeFlags, Lcid},
    types::{Argument, Value},
    Result,
};

/// A method or parameterised property of a native object, bound but not yet invoked.
///
/// Returned by get-member when the binder is configured to return callables. Calling it
/// invokes the method; indexing it reads or writes the parameterised property.
#[derive(Clone)]
pub struct DispCallable {
    object: ComPtr,
    desc: Arc<MethodDesc>,
    type_desc: Arc<TypeDesc>,
    lcid: Lcid,
}

impl DispCallable {
    pub(crate) fn new(
        object: ComPtr,
        desc: Arc<MethodDesc>,
        type_desc: Arc<TypeDesc>,
        lcid: Lcid,
    ) -> Self {
        DispCallable {
            object,
            desc,
            type_desc,
            lcid,
        }
    }

    /// The member name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.desc.name
    }

    /// The bound member.
    #[must_use]
    pub fn desc(&self) -> &Arc<MethodDesc> {
        &self.desc
    }

    /// The object the member belongs to.
    #[must_use]
    pub fn object(&self) -> &ComPtr {
        &self.object
    }

    /// Calls the member.
    ///
    /// # Errors
    ///
    /// Any invocation error, see [`crate::dispatch::invoke`].
    pub fn call(&self, args: &mut [Argument]) -> Result<Value> {
        self.invoke_as(self.desc.dispid, self.desc.call_flags(), args)
    }

    /// Reads the parameterised property with `args` as its parameters.
    ///
    /// # Errors
    ///
    /// Any invocation error, see [`crate::dispatch::invoke`].
    pub fn get_index(&self, args: &mut [Argument]) -> Result<Value> {
        self.invoke_as(
            self.desc.dispid,
            InvokeFlags::METHOD | InvokeFlags::PROPERTYGET,
            args,
        )
    }

    /// Writes the parameterised property with `args` as its parameters.
    ///
    /// Uses the property's by-value or by-reference write as the assigned value requires;
    /// without a known write member the property is written by value under its own id.
    ///
    /// # Errors
    ///
    /// Any invocation error, see [`crate::dispatch::invoke`].
    pub fn set_index(&self, args: &mut [Argument], value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        let (dispid, kind) = match select_put(
            self.type_desc.put(&self.desc.name),
            self.type_desc.put_ref(&self.desc.name),
            &value,
        ) {
            Some(put) => (put.dispid, put.kind),
            None => (self.desc.dispid, InvokeKind::PropertyPut),
        };

        let mut all: Vec<Argument> = args.iter_mut().map(std::mem::take).collect();
        all.push(Argument::new(value));
        let outcome = self.invoke_as(dispid, kind.flags(), &mut all);

        for (slot, arg) in args.iter_mut().zip(all) {
            *slot = arg;
        }
        outcome.map(|_| ())
    }

    fn invoke_as(&self, dispid: DispId, flags: InvokeFlags, args: &mut [Argument]) -> Result<Value> {
        let call = Invocation::new(&self.desc.name, dispid, flags).with_lcid(self.lcid);
        invoke(&self.object, &call, args)
    }
}

impl PartialEq for DispCallable {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.object, &other.object)
            && self.desc.dispid == other.desc.dispid
            && self.desc.kind == other.desc.kind
    }
}

impl fmt::Debug for DispCallable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DispCallable({} on {})", self.desc, self.object.id())
    }
}
