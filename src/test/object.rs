//! Scripted dispatch objects

use std::{
    collections::HashMap,
    sync::{Arc, Mutex, OnceLock},
};

use uguid::Guid;

use crate::{
    native::{
        ComObject, ComPtr, ConnectionPoint, ConnectionPointContainer, DispId, Dispatch, HResult,
        InvokeFlags, Lcid, ObjectId, ProvideClassInfo, TypeInfo, Unknown,
    },
    test::{MockConnectionPoint, MockTypeInfo},
    types::Value,
    wire::{DispParams, ExcepInfo, Variant},
};

/// First id handed out to named parameters; parameter `n` of a member gets `PARAM_BASE + n`
const PARAM_BASE: DispId = 100;

type MethodFn = Box<dyn Fn(&[Value]) -> Result<Value, HResult> + Send + Sync>;
type ByRefFn = Box<dyn Fn(&mut [Variant]) -> HResult + Send + Sync>;

/// One call received by a [`MockObject`]
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded {
    /// The member id invoked
    pub dispid: DispId,
    /// The invoke flags
    pub flags: InvokeFlags,
    /// Arguments in logical order: the argument block read back to front
    pub args: Vec<Value>,
    /// Named argument ids in block order
    pub named: Vec<DispId>,
}

enum Behavior {
    Method(MethodFn),
    ByRef(ByRefFn),
    Property(Mutex<Value>),
    Indexed(Mutex<Vec<(Vec<Value>, Value)>>),
}

struct Member {
    name: String,
    dispid: DispId,
    params: Vec<String>,
    behavior: Behavior,
}

fn call_logs() -> &'static Mutex<HashMap<ObjectId, Arc<Mutex<Vec<Recorded>>>>> {
    static LOGS: OnceLock<Mutex<HashMap<ObjectId, Arc<Mutex<Vec<Recorded>>>>>> = OnceLock::new();
    LOGS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// A dispatch object whose members are closures or stored values
pub struct MockObject {
    name: String,
    members: Vec<Member>,
    type_info: Option<Result<Arc<MockTypeInfo>, HResult>>,
    ids_of_names_error: Option<HResult>,
    class_info: Option<Arc<MockTypeInfo>>,
    points: Vec<(Guid, Arc<MockConnectionPoint>)>,
    arg_err: Option<u32>,
    log: Arc<Mutex<Vec<Recorded>>>,
}

/// An object without a dispatch interface
struct Plain;

impl Unknown for Plain {}

impl MockObject {
    pub fn builder(name: &str) -> MockObjectBuilder {
        MockObjectBuilder {
            object: MockObject {
                name: name.to_string(),
                members: Vec::new(),
                type_info: None,
                ids_of_names_error: None,
                class_info: None,
                points: Vec::new(),
                arg_err: None,
                log: Arc::new(Mutex::new(Vec::new())),
            },
        }
    }

    /// An object only answering the unknown interface
    pub fn plain() -> ComPtr {
        ComObject::new(Plain)
    }

    /// The calls `object` received so far, oldest first
    pub fn calls(object: &ComPtr) -> Vec<Recorded> {
        lock!(call_logs())
            .get(&object.id())
            .map(|log| lock!(log).clone())
            .unwrap_or_default()
    }

    fn member_by_name(&self, name: &str) -> Option<&Member> {
        self.members
            .iter()
            .find(|member| member.name.eq_ignore_ascii_case(name))
    }

    fn member_by_id(&self, dispid: DispId) -> Option<&Member> {
        self.members.iter().find(|member| member.dispid == dispid)
    }
}

fn set_result(result: &mut Variant, value: &Value) -> HResult {
    result.clear();
    match result.set_value(value) {
        Ok(()) => HResult::S_OK,
        Err(_) => HResult::DISP_E_TYPEMISMATCH,
    }
}

impl Unknown for MockObject {
    fn as_dispatch(&self) -> Option<&dyn Dispatch> {
        Some(self)
    }

    fn as_connection_point_container(&self) -> Option<&dyn ConnectionPointContainer> {
        if self.points.is_empty() {
            None
        } else {
            Some(self)
        }
    }

    fn as_provide_class_info(&self) -> Option<&dyn ProvideClassInfo> {
        if self.class_info.is_some() {
            Some(self)
        } else {
            None
        }
    }
}

impl Dispatch for MockObject {
    fn type_info_count(&self) -> u32 {
        u32::from(self.type_info.is_some())
    }

    fn type_info(&self, _index: u32, _lcid: Lcid) -> Result<Arc<dyn TypeInfo>, HResult> {
        match &self.type_info {
            Some(Ok(info)) => Ok(info.clone()),
            Some(Err(hresult)) => Err(*hresult),
            None => Err(HResult::DISP_E_BADINDEX),
        }
    }

    fn ids_of_names(&self, names: &[&str], _lcid: Lcid) -> Result<Vec<DispId>, HResult> {
        if let Some(hresult) = self.ids_of_names_error {
            return Err(hresult);
        }
        let Some((first, params)) = names.split_first() else {
            return Err(HResult::E_INVALIDARG);
        };
        let member = self
            .member_by_name(first)
            .ok_or(HResult::DISP_E_UNKNOWNNAME)?;

        let mut ids = vec![member.dispid];
        for param in params {
            let position = member
                .params
                .iter()
                .position(|name| name.eq_ignore_ascii_case(param))
                .ok_or(HResult::DISP_E_UNKNOWNNAME)?;
            ids.push(PARAM_BASE + position as DispId);
        }
        Ok(ids)
    }

    fn invoke(
        &self,
        member: DispId,
        _lcid: Lcid,
        flags: InvokeFlags,
        params: &mut DispParams,
        result: &mut Variant,
        _excep_info: &mut ExcepInfo,
        arg_err: &mut u32,
    ) -> HResult {
        let logical: Vec<Value> = params
            .args()
            .iter()
            .rev()
            .map(|slot| slot.to_value().unwrap_or(Value::Empty))
            .collect();
        lock!(self.log).push(Recorded {
            dispid: member,
            flags,
            args: logical.clone(),
            named: params.named_ids().to_vec(),
        });

        let Some(target) = self.member_by_id(member) else {
            return HResult::DISP_E_MEMBERNOTFOUND;
        };
        let puts = flags.intersects(InvokeFlags::PROPERTYPUT | InvokeFlags::PROPERTYPUTREF);

        let status = match &target.behavior {
            Behavior::Method(_) if puts => HResult::DISP_E_MEMBERNOTFOUND,
            Behavior::Method(body) => match body(&logical) {
                Ok(value) => set_result(result, &value),
                Err(hresult) => hresult,
            },
            Behavior::ByRef(body) => body(params.args_mut()),
            Behavior::Property(cell) if puts => match logical.last() {
                Some(value) => {
                    *lock!(cell) = value.clone();
                    HResult::S_OK
                }
                None => HResult::DISP_E_BADPARAMCOUNT,
            },
            Behavior::Property(cell) => {
                let value = lock!(cell).clone();
                set_result(result, &value)
            }
            Behavior::Indexed(cells) if puts => match logical.split_last() {
                Some((value, index)) => {
                    let mut cells = lock!(cells);
                    match cells.iter_mut().find(|(key, _)| key.as_slice() == index) {
                        Some((_, slot)) => *slot = value.clone(),
                        None => cells.push((index.to_vec(), value.clone())),
                    }
                    HResult::S_OK
                }
                None => HResult::DISP_E_BADPARAMCOUNT,
            },
            Behavior::Indexed(cells) => {
                let value = lock!(cells)
                    .iter()
                    .find(|(key, _)| *key == logical)
                    .map(|(_, value)| value.clone())
                    .unwrap_or_default();
                set_result(result, &value)
            }
        };

        if status.is_failure() {
            if let Some(index) = self.arg_err {
                *arg_err = index;
            }
        }
        status
    }
}

impl ConnectionPointContainer for MockObject {
    fn find_connection_point(&self, iid: &Guid) -> Result<Arc<dyn ConnectionPoint>, HResult> {
        self.points
            .iter()
            .find(|(point_iid, _)| point_iid == iid)
            .map(|(_, point)| point.clone() as Arc<dyn ConnectionPoint>)
            .ok_or(HResult::CONNECT_E_NOCONNECTION)
    }
}

impl ProvideClassInfo for MockObject {
    fn class_info(&self) -> Result<Arc<dyn TypeInfo>, HResult> {
        self.class_info
            .clone()
            .map(|info| info as Arc<dyn TypeInfo>)
            .ok_or(HResult::E_NOTIMPL)
    }
}

/// Builder for [`MockObject`]
pub struct MockObjectBuilder {
    object: MockObject,
}

impl MockObjectBuilder {
    fn member(mut self, name: &str, dispid: DispId, behavior: Behavior) -> Self {
        self.object.members.push(Member {
            name: name.to_string(),
            dispid,
            params: Vec::new(),
            behavior,
        });
        self
    }

    /// A method computing its result from the arguments in logical order
    pub fn method<F>(self, name: &str, dispid: DispId, body: F) -> Self
    where
        F: Fn(&[Value]) -> Result<Value, HResult> + Send + Sync + 'static,
    {
        self.member(name, dispid, Behavior::Method(Box::new(body)))
    }

    /// A method working on the raw argument block, in block order
    pub fn by_ref_method<F>(self, name: &str, dispid: DispId, body: F) -> Self
    where
        F: Fn(&mut [Variant]) -> HResult + Send + Sync + 'static,
    {
        self.member(name, dispid, Behavior::ByRef(Box::new(body)))
    }

    /// A readable and writable property holding `initial`
    pub fn property(self, name: &str, dispid: DispId, initial: impl Into<Value>) -> Self {
        self.member(name, dispid, Behavior::Property(Mutex::new(initial.into())))
    }

    /// A parameterised property storing one value per index
    pub fn indexed(self, name: &str, dispid: DispId) -> Self {
        self.member(name, dispid, Behavior::Indexed(Mutex::new(Vec::new())))
    }

    /// Names the parameters of an already added member
    pub fn parameters(mut self, name: &str, params: &[&str]) -> Self {
        if let Some(member) = self
            .object
            .members
            .iter_mut()
            .find(|member| member.name.eq_ignore_ascii_case(name))
        {
            member.params = params.iter().map(ToString::to_string).collect();
        }
        self
    }

    /// Reports `index` as the offending argument slot of failing calls
    pub fn arg_err(mut self, index: u32) -> Self {
        self.object.arg_err = Some(index);
        self
    }

    pub fn type_info(mut self, info: Arc<MockTypeInfo>) -> Self {
        self.object.type_info = Some(Ok(info));
        self
    }

    /// Claims type metadata but fails to deliver it
    pub fn type_info_error(mut self, hresult: HResult) -> Self {
        self.object.type_info = Some(Err(hresult));
        self
    }

    pub fn ids_of_names_error(mut self, hresult: HResult) -> Self {
        self.object.ids_of_names_error = Some(hresult);
        self
    }

    pub fn class_info(mut self, info: Arc<MockTypeInfo>) -> Self {
        self.object.class_info = Some(info);
        self
    }

    pub fn connection_point(mut self, iid: Guid, point: Arc<MockConnectionPoint>) -> Self {
        self.object.points.push((iid, point));
        self
    }

    pub fn build(self) -> ComPtr {
        let log = self.object.log.clone();
        let object = ComObject::new(self.object);
        lock!(call_logs()).insert(object.id(), log);
        object
    }
}

impl std::fmt::Debug for MockObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockObject")
            .field("name", &self.name)
            .field("members", &self.members.len())
            .finish()
    }
}
