//! Type metadata doubles

use std::sync::Arc;

use uguid::Guid;

use crate::{
    native::{
        DispId, Documentation, FuncDesc, FuncFlags, HResult, ImplTypeFlags, InvokeFlags, TypeAttr,
        TypeInfo, TypeKind, VarDesc, VarFlags, MEMBERID_NIL,
    },
    wire::VarType,
};

/// Type metadata listing functions, variables and implemented interfaces
#[derive(Debug)]
pub struct MockTypeInfo {
    name: String,
    guid: Guid,
    funcs: Vec<(String, FuncDesc)>,
    vars: Vec<(String, VarDesc)>,
    impls: Vec<(ImplTypeFlags, Arc<MockTypeInfo>)>,
}

impl MockTypeInfo {
    pub fn builder(name: &str, guid: Guid) -> MockTypeInfoBuilder {
        MockTypeInfoBuilder {
            info: MockTypeInfo {
                name: name.to_string(),
                guid,
                funcs: Vec::new(),
                vars: Vec::new(),
                impls: Vec::new(),
            },
        }
    }

    fn name_of(&self, member_id: DispId) -> Option<&str> {
        if member_id == MEMBERID_NIL {
            return Some(&self.name);
        }
        self.funcs
            .iter()
            .find(|(_, func)| func.member_id == member_id)
            .map(|(name, _)| name.as_str())
            .or_else(|| {
                self.vars
                    .iter()
                    .find(|(_, var)| var.member_id == member_id)
                    .map(|(name, _)| name.as_str())
            })
    }
}

impl TypeInfo for MockTypeInfo {
    fn type_attr(&self) -> Result<TypeAttr, HResult> {
        Ok(TypeAttr {
            guid: self.guid,
            kind: if self.impls.is_empty() {
                TypeKind::Dispatch
            } else {
                TypeKind::CoClass
            },
            func_count: self.funcs.len() as u16,
            var_count: self.vars.len() as u16,
            impl_type_count: self.impls.len() as u16,
        })
    }

    fn func_desc(&self, index: u32) -> Result<FuncDesc, HResult> {
        self.funcs
            .get(index as usize)
            .map(|(_, func)| func.clone())
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }

    fn var_desc(&self, index: u32) -> Result<VarDesc, HResult> {
        self.vars
            .get(index as usize)
            .map(|(_, var)| var.clone())
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }

    fn names(&self, member_id: DispId) -> Result<Vec<String>, HResult> {
        self.name_of(member_id)
            .map(|name| vec![name.to_string()])
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }

    fn documentation(&self, member_id: DispId) -> Result<Documentation, HResult> {
        self.name_of(member_id)
            .map(|name| Documentation {
                name: name.to_string(),
                ..Documentation::default()
            })
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }

    fn impl_type_flags(&self, index: u32) -> Result<ImplTypeFlags, HResult> {
        self.impls
            .get(index as usize)
            .map(|(flags, _)| *flags)
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }

    fn impl_type_info(&self, index: u32) -> Result<Arc<dyn TypeInfo>, HResult> {
        self.impls
            .get(index as usize)
            .map(|(_, info)| info.clone() as Arc<dyn TypeInfo>)
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }
}

/// Builder for [`MockTypeInfo`]
pub struct MockTypeInfoBuilder {
    info: MockTypeInfo,
}

impl MockTypeInfoBuilder {
    fn func(
        mut self,
        name: &str,
        member_id: DispId,
        invoke_kind: InvokeFlags,
        param_count: u16,
        flags: FuncFlags,
    ) -> Self {
        let return_type = if invoke_kind == InvokeFlags::PROPERTYGET
            || invoke_kind == InvokeFlags::METHOD
        {
            VarType::VARIANT
        } else {
            VarType::EMPTY
        };
        self.info.funcs.push((
            name.to_string(),
            FuncDesc {
                member_id,
                invoke_kind,
                param_count,
                optional_param_count: 0,
                flags,
                return_type,
            },
        ));
        self
    }

    pub fn property_get(self, name: &str, member_id: DispId, params: u16) -> Self {
        self.func(name, member_id, InvokeFlags::PROPERTYGET, params, FuncFlags::empty())
    }

    pub fn property_put(self, name: &str, member_id: DispId) -> Self {
        self.func(name, member_id, InvokeFlags::PROPERTYPUT, 1, FuncFlags::empty())
    }

    pub fn property_put_ref(self, name: &str, member_id: DispId) -> Self {
        self.func(name, member_id, InvokeFlags::PROPERTYPUTREF, 1, FuncFlags::empty())
    }

    pub fn function(self, name: &str, member_id: DispId, params: u16) -> Self {
        self.func(name, member_id, InvokeFlags::METHOD, params, FuncFlags::empty())
    }

    pub fn restricted(self, name: &str, member_id: DispId) -> Self {
        self.func(name, member_id, InvokeFlags::METHOD, 0, FuncFlags::RESTRICTED)
    }

    pub fn hidden(self, name: &str, member_id: DispId) -> Self {
        self.func(name, member_id, InvokeFlags::METHOD, 0, FuncFlags::HIDDEN)
    }

    pub fn variable(mut self, name: &str, member_id: DispId, readonly: bool) -> Self {
        let flags = if readonly {
            VarFlags::READONLY
        } else {
            VarFlags::empty()
        };
        self.info.vars.push((
            name.to_string(),
            VarDesc {
                member_id,
                flags,
                var_type: VarType::VARIANT,
            },
        ));
        self
    }

    /// Declares `events` as a source interface of this class
    pub fn source(mut self, events: Arc<MockTypeInfo>) -> Self {
        self.info.impls.push((ImplTypeFlags::SOURCE, events));
        self
    }

    pub fn build(self) -> Arc<MockTypeInfo> {
        Arc::new(self.info)
    }
}
