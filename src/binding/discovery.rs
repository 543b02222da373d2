//! Member discovery.
//!
//! Objects that offer type metadata are scanned once per type: every function and variable
//! is classified into the member maps of a [`TypeDesc`], which is then shared through the
//! [`TypeCache`] by all instances of the type. Objects without metadata get a per-object
//! descriptor that is filled by name lookups as members are requested.
//!
//! Events are discovered lazily, on the first event lookup, from the source interfaces of the
//! object's coclass.

use std::sync::Arc;

use log::debug;

use crate::{
    binding::{BinderConfig, EventDesc, InvokeKind, MethodDesc, ObjectTable, TypeCache, TypeDesc},
    native::{
        ComPtr, DispId, FuncFlags, HResult, ImplTypeFlags, InvokeFlags, TypeAttr, TypeInfo,
        VarFlags, DISPID_VALUE, MEMBERID_NIL,
    },
    Error, Result,
};

/// Name given to objects whose type cannot be described.
const UNNAMED_TYPE: &str = "IDispatch";

fn native_error(hresult: HResult, entry: &str) -> Error {
    Error::Com {
        hresult,
        member: entry.to_string(),
    }
}

/// Finds the members of native objects.
#[derive(Debug)]
pub struct MemberDiscovery {
    types: Arc<TypeCache>,
    late_bound: ObjectTable<TypeDesc>,
    config: BinderConfig,
}

impl MemberDiscovery {
    /// Creates a discovery service filling `types`.
    pub fn new(types: Arc<TypeCache>, config: BinderConfig) -> Self {
        MemberDiscovery {
            types,
            late_bound: ObjectTable::new(),
            config,
        }
    }

    /// The shared type cache.
    #[must_use]
    pub fn types(&self) -> &Arc<TypeCache> {
        &self.types
    }

    /// The descriptor of `object`'s type.
    ///
    /// # Errors
    ///
    /// * [`Error::NotDispatch`] - The object has no dispatch interface
    /// * [`Error::Com`] - Type metadata could not be read
    pub fn type_desc(&self, object: &ComPtr) -> Result<Arc<TypeDesc>> {
        if object.dispatch().is_none() {
            return Err(Error::NotDispatch);
        }

        let Some(info) = self.type_info(object)? else {
            return Ok(self
                .late_bound
                .get_or_insert_with(object, || TypeDesc::new(UNNAMED_TYPE, None)));
        };

        let attr = info
            .type_attr()
            .map_err(|hresult| native_error(hresult, "ITypeInfo::GetTypeAttr"))?;
        if let Some(cached) = self.types.get(&attr.guid) {
            return Ok(cached);
        }

        let desc = self.scan(info.as_ref(), &attr)?;
        debug!("Discovered {:?} for object {}", desc, object.id());
        Ok(self.types.get_or_insert(desc))
    }

    /// The type metadata of `object`, if it offers any.
    ///
    /// An object reporting no metadata, or refusing the request as unsupported, is late-bound
    /// only. Any other failure is tolerated unless the configuration requires metadata.
    fn type_info(&self, object: &ComPtr) -> Result<Option<Arc<dyn TypeInfo>>> {
        let Some(dispatch) = object.dispatch() else {
            return Err(Error::NotDispatch);
        };
        if dispatch.type_info_count() == 0 {
            return Ok(None);
        }

        match dispatch.type_info(0, self.config.lcid) {
            Ok(info) => Ok(Some(info)),
            Err(HResult::E_NOINTERFACE) => Ok(None),
            Err(hresult) if self.config.require_type_info => {
                Err(native_error(hresult, "IDispatch::GetTypeInfo"))
            }
            Err(hresult) => {
                debug!("Type metadata of {} unavailable: {}", object.id(), hresult);
                Ok(None)
            }
        }
    }

    fn scan(&self, info: &dyn TypeInfo, attr: &TypeAttr) -> Result<TypeDesc> {
        let name = info
            .documentation(MEMBERID_NIL)
            .map(|doc| doc.name)
            .unwrap_or_else(|_| UNNAMED_TYPE.to_string());
        let desc = TypeDesc::new(name, Some(attr.guid));

        for index in 0..u32::from(attr.func_count) {
            let func = info
                .func_desc(index)
                .map_err(|hresult| native_error(hresult, "ITypeInfo::GetFuncDesc"))?;
            if func.flags.contains(FuncFlags::RESTRICTED) {
                continue;
            }

            let name = member_name(info, func.member_id)?;
            let method = MethodDesc::from_func(name, &func);
            match method.kind {
                InvokeKind::PropertyPut => {
                    let method = desc.add_put(method);
                    if method.dispid == DISPID_VALUE {
                        desc.init_set_item(method);
                    }
                }
                InvokeKind::PropertyPutRef => {
                    let method = desc.add_put_ref(method);
                    if method.dispid == DISPID_VALUE {
                        desc.init_set_item(method);
                    }
                }
                InvokeKind::Function | InvokeKind::PropertyGet => {
                    let method = desc.add_func(method);
                    if method.dispid == DISPID_VALUE {
                        desc.init_get_item(method);
                    }
                }
            }
        }

        if self.config.scan_variables {
            for index in 0..u32::from(attr.var_count) {
                let var = info
                    .var_desc(index)
                    .map_err(|hresult| native_error(hresult, "ITypeInfo::GetVarDesc"))?;
                let name = member_name(info, var.member_id)?;

                let get = MethodDesc {
                    return_type: Some(var.var_type),
                    ..MethodDesc::late_bound(name.clone(), var.member_id, InvokeKind::PropertyGet)
                };
                desc.add_func(get);
                if !var.flags.contains(VarFlags::READONLY) {
                    desc.add_put(MethodDesc {
                        param_count: 1,
                        ..MethodDesc::late_bound(name, var.member_id, InvokeKind::PropertyPut)
                    });
                }
            }
        }

        Ok(desc)
    }

    /// Looks up a member id by name.
    ///
    /// Returns `None` when the object does not know the name.
    ///
    /// # Errors
    ///
    /// * [`Error::CouldNotGetDispId`] - The lookup failed for another reason
    /// * [`Error::GetIdsOfNamesInvalid`] - The object answered with no id
    pub fn lookup_id(&self, object: &ComPtr, name: &str) -> Result<Option<DispId>> {
        let dispatch = object.dispatch().ok_or(Error::NotDispatch)?;
        match dispatch.ids_of_names(&[name], self.config.lcid) {
            Ok(ids) => ids
                .first()
                .copied()
                .map(Some)
                .ok_or_else(|| Error::GetIdsOfNamesInvalid(name.to_string())),
            Err(HResult::DISP_E_UNKNOWNNAME) => Ok(None),
            Err(hresult) => Err(Error::CouldNotGetDispId {
                name: name.to_string(),
                hresult,
            }),
        }
    }

    /// Resolves a readable member or method by name and records it in `desc`.
    pub fn late_bound_func(
        &self,
        object: &ComPtr,
        desc: &TypeDesc,
        name: &str,
    ) -> Result<Option<Arc<MethodDesc>>> {
        let Some(dispid) = self.lookup_id(object, name)? else {
            return Ok(None);
        };
        Ok(Some(desc.add_func(MethodDesc::late_bound(
            name,
            dispid,
            InvokeKind::Function,
        ))))
    }

    /// Resolves a property by name and records both of its write forms in `desc`.
    ///
    /// Without metadata the binder cannot tell which write form the property supports, so
    /// both are registered under the same id and the assigned value decides.
    pub fn late_bound_puts(
        &self,
        object: &ComPtr,
        desc: &TypeDesc,
        name: &str,
    ) -> Result<Option<(Arc<MethodDesc>, Arc<MethodDesc>)>> {
        let Some(dispid) = self.lookup_id(object, name)? else {
            return Ok(None);
        };
        let put = desc.add_put(MethodDesc::late_bound(name, dispid, InvokeKind::PropertyPut));
        let put_ref = desc.add_put_ref(MethodDesc::late_bound(
            name,
            dispid,
            InvokeKind::PropertyPutRef,
        ));
        Ok(Some((put, put_ref)))
    }

    /// The event called `name`, discovering the events of `object` on first use.
    ///
    /// # Errors
    ///
    /// * [`Error::Com`] - The coclass metadata could not be read
    pub fn event(
        &self,
        object: &ComPtr,
        desc: &TypeDesc,
        name: &str,
    ) -> Result<Option<Arc<EventDesc>>> {
        if !desc.events_discovered() {
            desc.init_events(self.scan_events(object)?);
        }
        Ok(desc.event(name))
    }

    fn scan_events(&self, object: &ComPtr) -> Result<Vec<EventDesc>> {
        let Some(provider) = object.provide_class_info() else {
            return Ok(Vec::new());
        };
        let class_info = match provider.class_info() {
            Ok(info) => info,
            Err(hresult) => {
                debug!("Class info of {} unavailable: {}", object.id(), hresult);
                return Ok(Vec::new());
            }
        };

        let attr = class_info
            .type_attr()
            .map_err(|hresult| native_error(hresult, "ITypeInfo::GetTypeAttr"))?;

        let mut events = Vec::new();
        for index in 0..u32::from(attr.impl_type_count) {
            let flags = class_info
                .impl_type_flags(index)
                .map_err(|hresult| native_error(hresult, "ITypeInfo::GetImplTypeFlags"))?;
            if !flags.contains(ImplTypeFlags::SOURCE) {
                continue;
            }

            let source = class_info
                .impl_type_info(index)
                .map_err(|hresult| native_error(hresult, "ITypeInfo::GetRefTypeInfo"))?;
            let source_attr = source
                .type_attr()
                .map_err(|hresult| native_error(hresult, "ITypeInfo::GetTypeAttr"))?;

            for func_index in 0..u32::from(source_attr.func_count) {
                let func = source
                    .func_desc(func_index)
                    .map_err(|hresult| native_error(hresult, "ITypeInfo::GetFuncDesc"))?;
                if func
                    .flags
                    .intersects(FuncFlags::HIDDEN | FuncFlags::RESTRICTED)
                    || !func.invoke_kind.contains(InvokeFlags::METHOD)
                {
                    continue;
                }

                events.push(EventDesc {
                    name: member_name(source.as_ref(), func.member_id)?,
                    dispid: func.member_id,
                    source_iid: source_attr.guid,
                });
            }
        }

        Ok(events)
    }
}

fn member_name(info: &dyn TypeInfo, member: DispId) -> Result<String> {
    let names = info
        .names(member)
        .map_err(|hresult| native_error(hresult, "ITypeInfo::GetNames"))?;
    names
        .into_iter()
        .next()
        .ok_or_else(|| malformed_error!("Member {} has no name", member))
}
