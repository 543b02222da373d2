//! The native automation interfaces consumed by the binder.
//!
//! Each trait mirrors one native interface: [`Unknown`] for interface discovery, [`Dispatch`]
//! for late-bound invocation, [`TypeInfo`] for type metadata, [`ConnectionPointContainer`] and
//! [`ConnectionPoint`] for event subscription, and [`ProvideClassInfo`] for the coclass
//! description that lists an object's source interfaces.
//!
//! Methods return either a plain [`HResult`] (where the native contract passes results through
//! out-parameters, as `Invoke` does) or `Result<T, HResult>` where a single value comes back.
//!
//! # Member Ids
//!
//! Members are addressed by numeric ids ([`DispId`]). A handful of ids carry fixed meaning:
//! [`DISPID_VALUE`] is the default member, [`DISPID_PROPERTYPUT`] names the assigned value of a
//! property write and [`DISPID_NEWENUM`] returns an enumerator.

use std::sync::Arc;

use bitflags::bitflags;
use uguid::{guid, Guid};

use crate::{
    native::{ComPtr, HResult},
    wire::{DispParams, ExcepInfo, VarType, Variant},
};

/// A numeric member id.
pub type DispId = i32;

/// A locale id passed to name resolution and invocation.
pub type Lcid = u32;

/// The default member of an object.
pub const DISPID_VALUE: DispId = 0;
/// Returned for names that could not be resolved.
pub const DISPID_UNKNOWN: DispId = -1;
/// The id of the assigned value in a property write.
pub const DISPID_PROPERTYPUT: DispId = -3;
/// The member returning an enumerator over a collection.
pub const DISPID_NEWENUM: DispId = -4;
/// Refers to the type itself when asking type metadata for documentation.
pub const MEMBERID_NIL: DispId = -1;

/// Interface id of `IUnknown`.
pub const IID_IUNKNOWN: Guid = guid!("00000000-0000-0000-c000-000000000046");
/// Interface id of `IDispatch`.
pub const IID_IDISPATCH: Guid = guid!("00020400-0000-0000-c000-000000000046");
/// Interface id of `IConnectionPointContainer`.
pub const IID_ICONNECTIONPOINTCONTAINER: Guid = guid!("b196b284-bab4-101a-b69c-00aa00341d07");
/// Interface id of `IProvideClassInfo`.
pub const IID_IPROVIDECLASSINFO: Guid = guid!("b196b283-bab4-101a-b69c-00aa00341d07");

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// The kind of access requested from `Invoke`, and the invoke kind of a member
    pub struct InvokeFlags: u16 {
        /// Call a method
        const METHOD = 0x1;
        /// Read a property
        const PROPERTYGET = 0x2;
        /// Assign a property by value
        const PROPERTYPUT = 0x4;
        /// Assign a property by reference
        const PROPERTYPUTREF = 0x8;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Attributes of a function described by type metadata
    pub struct FuncFlags: u16 {
        /// Not accessible from macro languages
        const RESTRICTED = 0x1;
        /// Returns an object that is a source of events
        const SOURCE = 0x2;
        /// Supports data binding
        const BINDABLE = 0x4;
        /// Sends change requests
        const REQUESTEDIT = 0x8;
        /// Displayed to the user as bindable
        const DISPLAYBIND = 0x10;
        /// The default bindable property
        const DEFAULTBIND = 0x20;
        /// Should not be displayed to the user
        const HIDDEN = 0x40;
        /// Supports `GetLastError`
        const USESGETLASTERROR = 0x80;
        /// The default member of a collection
        const DEFAULTCOLLELEM = 0x100;
        /// The default member for display
        const UIDEFAULT = 0x200;
        /// Not displayed in object browsers
        const NONBROWSABLE = 0x400;
        /// Can be replaced by an extender
        const REPLACEABLE = 0x800;
        /// Mapped individually as bindable
        const IMMEDIATEBIND = 0x1000;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Attributes of a variable described by type metadata
    pub struct VarFlags: u16 {
        /// Assignment is not allowed
        const READONLY = 0x1;
        /// Returns an object that is a source of events
        const SOURCE = 0x2;
        /// Supports data binding
        const BINDABLE = 0x4;
        /// Sends change requests
        const REQUESTEDIT = 0x8;
        /// Displayed to the user as bindable
        const DISPLAYBIND = 0x10;
        /// The default bindable property
        const DEFAULTBIND = 0x20;
        /// Should not be displayed to the user
        const HIDDEN = 0x40;
        /// Not accessible from macro languages
        const RESTRICTED = 0x80;
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Attributes of an interface implemented by a coclass
    pub struct ImplTypeFlags: u32 {
        /// The default interface
        const DEFAULT = 0x1;
        /// An outgoing (event) interface
        const SOURCE = 0x2;
        /// Not accessible from macro languages
        const RESTRICTED = 0x4;
        /// Exposed through a vtable only
        const DEFAULTVTABLE = 0x8;
    }
}

/// The kind of type described by type metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// An enumeration
    Enum,
    /// A structure
    Record,
    /// A module of static functions
    Module,
    /// A vtable interface
    Interface,
    /// A dispatch interface
    Dispatch,
    /// A creatable class
    CoClass,
    /// An alias of another type
    Alias,
    /// A union
    Union,
}

/// Type-level attributes (`TYPEATTR`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeAttr {
    /// Identity of the type
    pub guid: Guid,
    /// What kind of type this is
    pub kind: TypeKind,
    /// Number of functions
    pub func_count: u16,
    /// Number of variables
    pub var_count: u16,
    /// Number of implemented interfaces
    pub impl_type_count: u16,
}

/// A function described by type metadata (`FUNCDESC`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncDesc {
    /// Member id of the function
    pub member_id: DispId,
    /// Invoke kind; exactly one flag is set
    pub invoke_kind: InvokeFlags,
    /// Number of parameters
    pub param_count: u16,
    /// Number of optional parameters
    pub optional_param_count: u16,
    /// Function attributes
    pub flags: FuncFlags,
    /// Wire type of the return value
    pub return_type: VarType,
}

/// A variable described by type metadata (`VARDESC`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDesc {
    /// Member id of the variable
    pub member_id: DispId,
    /// Variable attributes
    pub flags: VarFlags,
    /// Wire type of the variable
    pub var_type: VarType,
}

/// Documentation of a type or member.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Documentation {
    /// The name
    pub name: String,
    /// A short description
    pub doc_string: Option<String>,
    /// Help context within the help file
    pub help_context: u32,
    /// Path of the help file
    pub help_file: Option<String>,
}

/// Type metadata of a dispatch interface or coclass (`ITypeInfo`).
pub trait TypeInfo: Send + Sync {
    /// Returns the type level attributes.
    fn type_attr(&self) -> Result<TypeAttr, HResult>;

    /// Returns the function at `index`.
    fn func_desc(&self, index: u32) -> Result<FuncDesc, HResult>;

    /// Returns the variable at `index`.
    fn var_desc(&self, _index: u32) -> Result<VarDesc, HResult> {
        Err(HResult::TYPE_E_ELEMENTNOTFOUND)
    }

    /// Returns the name of a member followed by its parameter names.
    fn names(&self, member_id: DispId) -> Result<Vec<String>, HResult>;

    /// Returns documentation of a member, or of the type itself for [`MEMBERID_NIL`].
    fn documentation(&self, member_id: DispId) -> Result<Documentation, HResult>;

    /// Returns the flags of the implemented interface at `index` (coclasses only).
    fn impl_type_flags(&self, _index: u32) -> Result<ImplTypeFlags, HResult> {
        Err(HResult::TYPE_E_ELEMENTNOTFOUND)
    }

    /// Returns the type metadata of the implemented interface at `index` (coclasses only).
    fn impl_type_info(&self, _index: u32) -> Result<Arc<dyn TypeInfo>, HResult> {
        Err(HResult::TYPE_E_ELEMENTNOTFOUND)
    }
}

/// Late-bound invocation (`IDispatch`).
pub trait Dispatch: Send + Sync {
    /// Number of type metadata descriptions offered, zero or one.
    fn type_info_count(&self) -> u32 {
        0
    }

    /// Returns the type metadata of this object.
    fn type_info(&self, _index: u32, _lcid: Lcid) -> Result<Arc<dyn TypeInfo>, HResult> {
        Err(HResult::E_NOTIMPL)
    }

    /// Maps a member name, optionally followed by parameter names, to member ids.
    ///
    /// The returned vector has one entry per name. On `DISP_E_UNKNOWNNAME` the object failed
    /// to resolve at least one of them.
    fn ids_of_names(&self, names: &[&str], lcid: Lcid) -> Result<Vec<DispId>, HResult>;

    /// Invokes a member.
    ///
    /// `params` holds the arguments in reverse order. On `DISP_E_EXCEPTION` the object fills
    /// `excep_info`; on `DISP_E_TYPEMISMATCH` and `DISP_E_PARAMNOTFOUND` it stores the index
    /// of the offending argument within `params` in `arg_err`.
    fn invoke(
        &self,
        member: DispId,
        lcid: Lcid,
        flags: InvokeFlags,
        params: &mut DispParams,
        result: &mut Variant,
        excep_info: &mut ExcepInfo,
        arg_err: &mut u32,
    ) -> HResult;
}

/// A single outgoing interface of an object (`IConnectionPoint`).
pub trait ConnectionPoint: Send + Sync {
    /// Connects a sink and returns the cookie identifying the connection.
    fn advise(&self, sink: ComPtr) -> Result<u32, HResult>;

    /// Disconnects a previously advised sink.
    fn unadvise(&self, cookie: u32) -> Result<(), HResult>;
}

/// Gives access to the outgoing interfaces of an object (`IConnectionPointContainer`).
pub trait ConnectionPointContainer: Send + Sync {
    /// Returns the connection point for an outgoing interface id.
    fn find_connection_point(&self, iid: &Guid) -> Result<Arc<dyn ConnectionPoint>, HResult>;
}

/// Gives access to the coclass type metadata of an object (`IProvideClassInfo`).
pub trait ProvideClassInfo: Send + Sync {
    /// Returns the type metadata of the coclass.
    fn class_info(&self) -> Result<Arc<dyn TypeInfo>, HResult>;
}

/// Interface discovery (`IUnknown`).
///
/// Implementations expose the capabilities they support through the `as_*` accessors. The
/// default [`Unknown::supports_interface`] answers from those accessors, so most objects only
/// override the accessors.
pub trait Unknown: Send + Sync {
    /// The dispatch interface of this object.
    fn as_dispatch(&self) -> Option<&dyn Dispatch> {
        None
    }

    /// The connection point container of this object.
    fn as_connection_point_container(&self) -> Option<&dyn ConnectionPointContainer> {
        None
    }

    /// The class info provider of this object.
    fn as_provide_class_info(&self) -> Option<&dyn ProvideClassInfo> {
        None
    }

    /// Answers an interface query (`QueryInterface`).
    fn supports_interface(&self, iid: &Guid) -> bool {
        if *iid == IID_IUNKNOWN {
            true
        } else if *iid == IID_IDISPATCH {
            self.as_dispatch().is_some()
        } else if *iid == IID_ICONNECTIONPOINTCONTAINER {
            self.as_connection_point_container().is_some()
        } else if *iid == IID_IPROVIDECLASSINFO {
            self.as_provide_class_info().is_some()
        } else {
            false
        }
    }
}

impl InvokeFlags {
    /// Flags used to call a member of this invoke kind.
    ///
    /// Writes use their own flag; reads and calls are issued as method-or-get, matching the
    /// way automation clients call members whose kind is not statically known.
    #[must_use]
    pub fn for_call(kind: InvokeFlags) -> InvokeFlags {
        if kind.contains(InvokeFlags::PROPERTYPUTREF) {
            InvokeFlags::PROPERTYPUTREF
        } else if kind.contains(InvokeFlags::PROPERTYPUT) {
            InvokeFlags::PROPERTYPUT
        } else {
            InvokeFlags::METHOD | InvokeFlags::PROPERTYGET
        }
    }
}
