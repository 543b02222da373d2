//! A small automation server used by the integration tests.
//!
//! `Sheet` is written against the public native traits only, the way a platform binding or
//! an in-process server would be. It offers:
//!
//! | Member      | Id | Kind                                |
//! |-------------|----|-------------------------------------|
//! | `Item`      | 0  | indexed get / put (default member)  |
//! | `Value`     | 3  | get / put / put-ref                 |
//! | `Count`     | 7  | get                                 |
//! | `Calculate` | 8  | method, raises `Calculated`         |
//! | `Fail`      | 9  | method, raises an exception         |
//! | `Name`      | 10 | get / put                           |
//!
//! and the source interface `SheetEvents` with `Calculated(count)` (id 1).

#![allow(dead_code)]

use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use dispbind::{
    native::{
        ComObject, ComPtr, ConnectionPoint, ConnectionPointContainer, DispId, Dispatch,
        Documentation, FuncDesc, FuncFlags, HResult, ImplTypeFlags, InvokeFlags, Lcid,
        ProvideClassInfo, TypeAttr, TypeInfo, TypeKind, Unknown, MEMBERID_NIL,
    },
    types::Value,
    wire::{DispParams, ExcepInfo, VarType, Variant},
};
use uguid::{guid, Guid};

pub const SHEET_TYPE: Guid = guid!("5e1f0a2b-3c4d-4e5f-9a0b-1c2d3e4f5a61");
pub const SHEET_CLASS: Guid = guid!("5e1f0a2b-3c4d-4e5f-9a0b-1c2d3e4f5a62");
pub const SHEET_EVENTS: Guid = guid!("5e1f0a2b-3c4d-4e5f-9a0b-1c2d3e4f5a63");

pub const ITEM: DispId = 0;
pub const VALUE: DispId = 3;
pub const COUNT: DispId = 7;
pub const CALCULATE: DispId = 8;
pub const FAIL: DispId = 9;
pub const NAME: DispId = 10;
pub const CALCULATED: DispId = 1;

const MEMBERS: &[(&str, DispId)] = &[
    ("Item", ITEM),
    ("Value", VALUE),
    ("Count", COUNT),
    ("Calculate", CALCULATE),
    ("Fail", FAIL),
    ("Name", NAME),
];

/// Everything the sheet received and stores.
#[derive(Default)]
pub struct SheetState {
    pub calls: Vec<(DispId, InvokeFlags, usize)>,
    pub value: Value,
    pub name: String,
    pub cells: HashMap<i32, Value>,
}

/// A spreadsheet-like automation object.
pub struct Sheet {
    state: Arc<Mutex<SheetState>>,
    events: Arc<EventPoint>,
    structured: bool,
}

/// Handles a test keeps next to the object.
pub struct Fixture {
    pub object: ComPtr,
    pub state: Arc<Mutex<SheetState>>,
    pub events: Arc<EventPoint>,
}

impl Fixture {
    /// The last call the sheet received: id, flags and argument count.
    pub fn last_call(&self) -> Option<(DispId, InvokeFlags, usize)> {
        self.state.lock().unwrap().calls.last().copied()
    }
}

/// A sheet offering type metadata and class info.
pub fn structured_sheet() -> Fixture {
    sheet(true)
}

/// A sheet reachable by name lookups only.
pub fn late_bound_sheet() -> Fixture {
    sheet(false)
}

fn sheet(structured: bool) -> Fixture {
    let state = Arc::new(Mutex::new(SheetState::default()));
    let events = Arc::new(EventPoint::default());
    let object = ComObject::new(Sheet {
        state: state.clone(),
        events: events.clone(),
        structured,
    });
    Fixture {
        object,
        state,
        events,
    }
}

/// Any other object, to be assigned as a reference.
pub fn other_object() -> ComPtr {
    late_bound_sheet().object
}

impl Unknown for Sheet {
    fn as_dispatch(&self) -> Option<&dyn Dispatch> {
        Some(self)
    }

    fn as_connection_point_container(&self) -> Option<&dyn ConnectionPointContainer> {
        Some(self)
    }

    fn as_provide_class_info(&self) -> Option<&dyn ProvideClassInfo> {
        if self.structured {
            Some(self)
        } else {
            None
        }
    }
}

fn write(result: &mut Variant, value: &Value) -> HResult {
    match result.set_value(value) {
        Ok(()) => HResult::S_OK,
        Err(_) => HResult::DISP_E_TYPEMISMATCH,
    }
}

impl Dispatch for Sheet {
    fn type_info_count(&self) -> u32 {
        u32::from(self.structured)
    }

    fn type_info(&self, _index: u32, _lcid: Lcid) -> Result<Arc<dyn TypeInfo>, HResult> {
        if self.structured {
            Ok(Arc::new(sheet_type()))
        } else {
            Err(HResult::DISP_E_BADINDEX)
        }
    }

    fn ids_of_names(&self, names: &[&str], _lcid: Lcid) -> Result<Vec<DispId>, HResult> {
        names
            .iter()
            .map(|name| {
                MEMBERS
                    .iter()
                    .find(|(member, _)| member.eq_ignore_ascii_case(name))
                    .map(|(_, id)| *id)
                    .ok_or(HResult::DISP_E_UNKNOWNNAME)
            })
            .collect()
    }

    fn invoke(
        &self,
        member: DispId,
        _lcid: Lcid,
        flags: InvokeFlags,
        params: &mut DispParams,
        result: &mut Variant,
        excep_info: &mut ExcepInfo,
        _arg_err: &mut u32,
    ) -> HResult {
        let args: Vec<Value> = params
            .args()
            .iter()
            .rev()
            .map(|slot| slot.to_value().unwrap_or(Value::Empty))
            .collect();
        let puts = flags.intersects(InvokeFlags::PROPERTYPUT | InvokeFlags::PROPERTYPUTREF);

        let mut state = self.state.lock().unwrap();
        state.calls.push((member, flags, args.len()));

        match member {
            ITEM => {
                let Some(Value::I32(index)) = args.first() else {
                    return HResult::DISP_E_BADPARAMCOUNT;
                };
                if puts {
                    let value = args.last().cloned().unwrap_or_default();
                    state.cells.insert(*index, value);
                    HResult::S_OK
                } else {
                    let value = state.cells.get(index).cloned().unwrap_or_default();
                    write(result, &value)
                }
            }
            VALUE if puts => {
                state.value = args.last().cloned().unwrap_or_default();
                HResult::S_OK
            }
            VALUE => {
                let value = state.value.clone();
                write(result, &value)
            }
            COUNT if !puts => write(result, &Value::I32(state.cells.len() as i32)),
            NAME if puts => match args.last() {
                Some(Value::String(name)) => {
                    state.name = name.clone();
                    HResult::S_OK
                }
                _ => HResult::DISP_E_TYPEMISMATCH,
            },
            NAME => {
                let name = Value::String(state.name.clone());
                write(result, &name)
            }
            CALCULATE if !puts => {
                let count = state.cells.len() as i32;
                drop(state);
                self.events.raise(CALCULATED, &[Value::I32(count)]);
                HResult::S_OK
            }
            FAIL if !puts => {
                excep_info.fill(
                    HResult::E_FAIL,
                    Some("Sheet"),
                    Some("Division by zero"),
                    Some("sheet.chm"),
                    12,
                );
                HResult::DISP_E_EXCEPTION
            }
            _ => HResult::DISP_E_MEMBERNOTFOUND,
        }
    }
}

impl ConnectionPointContainer for Sheet {
    fn find_connection_point(&self, iid: &Guid) -> Result<Arc<dyn ConnectionPoint>, HResult> {
        if *iid == SHEET_EVENTS {
            Ok(self.events.clone())
        } else {
            Err(HResult::CONNECT_E_NOCONNECTION)
        }
    }
}

impl ProvideClassInfo for Sheet {
    fn class_info(&self) -> Result<Arc<dyn TypeInfo>, HResult> {
        Ok(Arc::new(sheet_class()))
    }
}

/// The connection point of `SheetEvents`.
#[derive(Default)]
pub struct EventPoint {
    sinks: Mutex<BTreeMap<u32, ComPtr>>,
    next: Mutex<u32>,
}

impl EventPoint {
    pub fn connected(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    fn raise(&self, dispid: DispId, args: &[Value]) {
        let sinks: Vec<ComPtr> = self.sinks.lock().unwrap().values().cloned().collect();
        for sink in sinks {
            let Some(dispatch) = sink.dispatch() else {
                continue;
            };
            let mut slots: Vec<Variant> = args
                .iter()
                .rev()
                .map(|value| Variant::from_value(value).unwrap())
                .collect();
            let mut params = DispParams::new(&mut slots, &mut []);
            let mut result = Variant::new();
            let mut info = ExcepInfo::new();
            let mut arg_err = 0;
            dispatch.invoke(
                dispid,
                0,
                InvokeFlags::METHOD,
                &mut params,
                &mut result,
                &mut info,
                &mut arg_err,
            );
        }
    }
}

impl ConnectionPoint for EventPoint {
    fn advise(&self, sink: ComPtr) -> Result<u32, HResult> {
        if !sink.supports_interface(&SHEET_EVENTS) {
            return Err(HResult::CONNECT_E_CANNOTCONNECT);
        }
        let mut next = self.next.lock().unwrap();
        *next += 1;
        self.sinks.lock().unwrap().insert(*next, sink);
        Ok(*next)
    }

    fn unadvise(&self, cookie: u32) -> Result<(), HResult> {
        self.sinks
            .lock()
            .unwrap()
            .remove(&cookie)
            .map(|_| ())
            .ok_or(HResult::CONNECT_E_NOCONNECTION)
    }
}

/// Type metadata built from a fixed member table.
pub struct StaticTypeInfo {
    name: &'static str,
    guid: Guid,
    funcs: Vec<(&'static str, FuncDesc)>,
    sources: Vec<Arc<StaticTypeInfo>>,
}

fn func(name: &'static str, member_id: DispId, kind: InvokeFlags, params: u16) -> (&'static str, FuncDesc) {
    (
        name,
        FuncDesc {
            member_id,
            invoke_kind: kind,
            param_count: params,
            optional_param_count: 0,
            flags: FuncFlags::empty(),
            return_type: VarType::VARIANT,
        },
    )
}

pub fn sheet_type() -> StaticTypeInfo {
    StaticTypeInfo {
        name: "ISheet",
        guid: SHEET_TYPE,
        funcs: vec![
            func("Item", ITEM, InvokeFlags::PROPERTYGET, 1),
            func("Item", ITEM, InvokeFlags::PROPERTYPUT, 2),
            func("Value", VALUE, InvokeFlags::PROPERTYGET, 0),
            func("Value", VALUE, InvokeFlags::PROPERTYPUT, 1),
            func("Value", VALUE, InvokeFlags::PROPERTYPUTREF, 1),
            func("Count", COUNT, InvokeFlags::PROPERTYGET, 0),
            func("Calculate", CALCULATE, InvokeFlags::METHOD, 0),
            func("Fail", FAIL, InvokeFlags::METHOD, 0),
            func("Name", NAME, InvokeFlags::PROPERTYGET, 0),
            func("Name", NAME, InvokeFlags::PROPERTYPUT, 1),
        ],
        sources: Vec::new(),
    }
}

fn sheet_class() -> StaticTypeInfo {
    StaticTypeInfo {
        name: "Sheet",
        guid: SHEET_CLASS,
        funcs: Vec::new(),
        sources: vec![Arc::new(StaticTypeInfo {
            name: "SheetEvents",
            guid: SHEET_EVENTS,
            funcs: vec![func("Calculated", CALCULATED, InvokeFlags::METHOD, 1)],
            sources: Vec::new(),
        })],
    }
}

impl StaticTypeInfo {
    fn name_of(&self, member_id: DispId) -> Result<&'static str, HResult> {
        if member_id == MEMBERID_NIL {
            return Ok(self.name);
        }
        self.funcs
            .iter()
            .find(|(_, func)| func.member_id == member_id)
            .map(|(name, _)| *name)
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }
}

impl TypeInfo for StaticTypeInfo {
    fn type_attr(&self) -> Result<TypeAttr, HResult> {
        Ok(TypeAttr {
            guid: self.guid,
            kind: if self.sources.is_empty() {
                TypeKind::Dispatch
            } else {
                TypeKind::CoClass
            },
            func_count: self.funcs.len() as u16,
            var_count: 0,
            impl_type_count: self.sources.len() as u16,
        })
    }

    fn func_desc(&self, index: u32) -> Result<FuncDesc, HResult> {
        self.funcs
            .get(index as usize)
            .map(|(_, func)| func.clone())
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }

    fn names(&self, member_id: DispId) -> Result<Vec<String>, HResult> {
        self.name_of(member_id).map(|name| vec![name.to_string()])
    }

    fn documentation(&self, member_id: DispId) -> Result<Documentation, HResult> {
        self.name_of(member_id).map(|name| Documentation {
            name: name.to_string(),
            ..Documentation::default()
        })
    }

    fn impl_type_flags(&self, index: u32) -> Result<ImplTypeFlags, HResult> {
        if (index as usize) < self.sources.len() {
            Ok(ImplTypeFlags::SOURCE)
        } else {
            Err(HResult::TYPE_E_ELEMENTNOTFOUND)
        }
    }

    fn impl_type_info(&self, index: u32) -> Result<Arc<dyn TypeInfo>, HResult> {
        self.sources
            .get(index as usize)
            .map(|info| info.clone() as Arc<dyn TypeInfo>)
            .ok_or(HResult::TYPE_E_ELEMENTNOTFOUND)
    }
}
