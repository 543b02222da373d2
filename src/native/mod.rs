//! Native automation interfaces, object handles and status codes.
//!
//! Everything the binder needs from the native side goes through this module:
//!
//! - [`HResult`] - 32-bit status codes and the well-known automation codes
//! - [`Unknown`], [`Dispatch`], [`TypeInfo`], [`ConnectionPointContainer`], [`ConnectionPoint`],
//!   [`ProvideClassInfo`] - the interfaces consumed
//! - [`ComObject`] / [`ComPtr`] - reference-counted handles with a stable identity
//!
//! A platform binding implements the traits over real interface pointers; in-process servers
//! and test doubles implement them directly.

mod hresult;
mod interfaces;
mod object;

pub use hresult::HResult;
pub use interfaces::{
    ConnectionPoint, ConnectionPointContainer, DispId, Dispatch, Documentation, FuncDesc,
    FuncFlags, ImplTypeFlags, InvokeFlags, Lcid, ProvideClassInfo, TypeAttr, TypeInfo, TypeKind,
    Unknown, VarDesc, VarFlags, DISPID_NEWENUM, DISPID_PROPERTYPUT, DISPID_UNKNOWN, DISPID_VALUE,
    IID_ICONNECTIONPOINTCONTAINER, IID_IDISPATCH, IID_IPROVIDECLASSINFO, IID_IUNKNOWN,
    MEMBERID_NIL,
};
pub use object::{ComObject, ComPtr, ObjectId};
