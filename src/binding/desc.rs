//! Member and type descriptors.
//!
//! A [`TypeDesc`] is the binder's view of one native type: the members found by scanning its
//! type metadata plus any member resolved by name later on. Member maps are keyed
//! case-insensitively and only grow; an entry, once inserted, is never replaced, so a
//! descriptor handed out earlier stays the one every later lookup returns.

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    sync::{Arc, OnceLock},
};

use dashmap::DashMap;
use strum::Display;
use uguid::Guid;

use crate::{
    native::{DispId, FuncDesc, InvokeFlags, DISPID_NEWENUM, DISPID_VALUE},
    wire::VarType,
};

/// Name of the synthesized default read member.
pub const DEFAULT_GET_NAME: &str = "[PROPERTYGET, DISPID(0)]";
/// Name of the synthesized default write member.
pub const DEFAULT_PUT_NAME: &str = "[PROPERTYPUT, DISPID(0)]";
/// Name under which the enumerator member is registered.
pub const ENUMERATOR_NAME: &str = "GETENUMERATOR";

/// How a member is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum InvokeKind {
    /// A method
    Function,
    /// A property read
    PropertyGet,
    /// A property write by value
    PropertyPut,
    /// A property write by reference
    PropertyPutRef,
}

impl InvokeKind {
    /// The invoke kind described by type metadata flags.
    #[must_use]
    pub fn from_flags(flags: InvokeFlags) -> InvokeKind {
        if flags.contains(InvokeFlags::PROPERTYPUTREF) {
            InvokeKind::PropertyPutRef
        } else if flags.contains(InvokeFlags::PROPERTYPUT) {
            InvokeKind::PropertyPut
        } else if flags.contains(InvokeFlags::PROPERTYGET) {
            InvokeKind::PropertyGet
        } else {
            InvokeKind::Function
        }
    }

    /// The flag describing this kind.
    #[must_use]
    pub fn flags(self) -> InvokeFlags {
        match self {
            InvokeKind::Function => InvokeFlags::METHOD,
            InvokeKind::PropertyGet => InvokeFlags::PROPERTYGET,
            InvokeKind::PropertyPut => InvokeFlags::PROPERTYPUT,
            InvokeKind::PropertyPutRef => InvokeFlags::PROPERTYPUTREF,
        }
    }

    /// Returns `true` for the two write kinds.
    #[must_use]
    pub fn is_put(self) -> bool {
        matches!(self, InvokeKind::PropertyPut | InvokeKind::PropertyPutRef)
    }
}

/// One member of a native type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDesc {
    /// The member name as reported by the object
    pub name: String,
    /// The member id
    pub dispid: DispId,
    /// How the member is invoked
    pub kind: InvokeKind,
    /// Number of declared parameters, zero for members resolved by name
    pub param_count: u16,
    /// Number of optional parameters
    pub optional_param_count: u16,
    /// Declared return type, when known
    pub return_type: Option<VarType>,
}

impl MethodDesc {
    /// A member resolved by name, without type metadata.
    pub fn late_bound(name: impl Into<String>, dispid: DispId, kind: InvokeKind) -> Self {
        MethodDesc {
            name: name.into(),
            dispid,
            kind,
            param_count: 0,
            optional_param_count: 0,
            return_type: None,
        }
    }

    /// A member described by a function entry of type metadata.
    pub fn from_func(name: impl Into<String>, func: &FuncDesc) -> Self {
        MethodDesc {
            name: name.into(),
            dispid: func.member_id,
            kind: InvokeKind::from_flags(func.invoke_kind),
            param_count: func.param_count,
            optional_param_count: func.optional_param_count,
            return_type: Some(func.return_type),
        }
    }

    /// Returns `true` for a parameterless property read, which get-member invokes directly.
    #[must_use]
    pub fn is_data_member(&self) -> bool {
        self.kind == InvokeKind::PropertyGet
            && self.param_count == 0
            && self.dispid != DISPID_NEWENUM
    }

    /// The flags this member is invoked with.
    #[must_use]
    pub fn call_flags(&self) -> InvokeFlags {
        InvokeFlags::for_call(self.kind.flags())
    }
}

impl fmt::Display for MethodDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{} dispid {}]", self.name, self.kind, self.dispid)
    }
}

/// One event of an outgoing (source) interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDesc {
    /// The event name
    pub name: String,
    /// Member id of the event on the source interface
    pub dispid: DispId,
    /// Interface id of the source interface
    pub source_iid: Guid,
}

fn key(name: &str) -> String {
    name.to_uppercase()
}

/// The members of one native type.
pub struct TypeDesc {
    name: String,
    guid: Option<Guid>,
    funcs: DashMap<String, Arc<MethodDesc>>,
    puts: DashMap<String, Arc<MethodDesc>>,
    put_refs: DashMap<String, Arc<MethodDesc>>,
    events: OnceLock<HashMap<String, Arc<EventDesc>>>,
    get_item: OnceLock<Arc<MethodDesc>>,
    set_item: OnceLock<Arc<MethodDesc>>,
}

impl TypeDesc {
    /// An empty descriptor. `guid` is `None` for objects without type metadata.
    pub fn new(name: impl Into<String>, guid: Option<Guid>) -> Self {
        TypeDesc {
            name: name.into(),
            guid,
            funcs: DashMap::new(),
            puts: DashMap::new(),
            put_refs: DashMap::new(),
            events: OnceLock::new(),
            get_item: OnceLock::new(),
            set_item: OnceLock::new(),
        }
    }

    /// The type name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The type identity, when the type was described by metadata.
    #[must_use]
    pub fn guid(&self) -> Option<Guid> {
        self.guid
    }

    /// Returns `true` if members were discovered from type metadata.
    #[must_use]
    pub fn is_structured(&self) -> bool {
        self.guid.is_some()
    }

    /// The function or readable property called `name`.
    #[must_use]
    pub fn func(&self, name: &str) -> Option<Arc<MethodDesc>> {
        self.funcs.get(&key(name)).map(|entry| entry.value().clone())
    }

    /// The by-value write of property `name`.
    #[must_use]
    pub fn put(&self, name: &str) -> Option<Arc<MethodDesc>> {
        self.puts.get(&key(name)).map(|entry| entry.value().clone())
    }

    /// The by-reference write of property `name`.
    #[must_use]
    pub fn put_ref(&self, name: &str) -> Option<Arc<MethodDesc>> {
        self.put_refs.get(&key(name)).map(|entry| entry.value().clone())
    }

    /// Registers a function or readable property; an existing entry wins.
    pub fn add_func(&self, desc: MethodDesc) -> Arc<MethodDesc> {
        let name = if desc.dispid == DISPID_NEWENUM {
            ENUMERATOR_NAME.to_string()
        } else {
            key(&desc.name)
        };
        self.funcs.entry(name).or_insert_with(|| Arc::new(desc)).clone()
    }

    /// Registers a property write by value; an existing entry wins.
    pub fn add_put(&self, desc: MethodDesc) -> Arc<MethodDesc> {
        self.puts
            .entry(key(&desc.name))
            .or_insert_with(|| Arc::new(desc))
            .clone()
    }

    /// Registers a property write by reference; an existing entry wins.
    pub fn add_put_ref(&self, desc: MethodDesc) -> Arc<MethodDesc> {
        self.put_refs
            .entry(key(&desc.name))
            .or_insert_with(|| Arc::new(desc))
            .clone()
    }

    /// The default read member used for calls and index reads.
    ///
    /// Falls back to a synthesized property read of [`DISPID_VALUE`].
    pub fn get_item(&self) -> Arc<MethodDesc> {
        self.get_item
            .get_or_init(|| {
                Arc::new(MethodDesc::late_bound(
                    DEFAULT_GET_NAME,
                    DISPID_VALUE,
                    InvokeKind::PropertyGet,
                ))
            })
            .clone()
    }

    /// The default write member used for index writes.
    ///
    /// Falls back to a synthesized property write of [`DISPID_VALUE`].
    pub fn set_item(&self) -> Arc<MethodDesc> {
        self.set_item
            .get_or_init(|| {
                Arc::new(MethodDesc::late_bound(
                    DEFAULT_PUT_NAME,
                    DISPID_VALUE,
                    InvokeKind::PropertyPut,
                ))
            })
            .clone()
    }

    /// Records the default read member found in type metadata; the first one wins.
    pub(crate) fn init_get_item(&self, desc: Arc<MethodDesc>) {
        let _ = self.get_item.set(desc);
    }

    /// Records the default write member found in type metadata; the first one wins.
    pub(crate) fn init_set_item(&self, desc: Arc<MethodDesc>) {
        let _ = self.set_item.set(desc);
    }

    /// The event called `name`, once events were discovered.
    #[must_use]
    pub fn event(&self, name: &str) -> Option<Arc<EventDesc>> {
        self.events.get()?.get(&key(name)).cloned()
    }

    /// Returns `true` once events were discovered.
    #[must_use]
    pub fn events_discovered(&self) -> bool {
        self.events.get().is_some()
    }

    /// Stores the discovered events; only the first call has an effect.
    pub(crate) fn init_events(&self, events: Vec<EventDesc>) {
        let _ = self.events.get_or_init(|| {
            let mut map = HashMap::with_capacity(events.len());
            for event in events {
                map.entry(key(&event.name)).or_insert_with(|| Arc::new(event));
            }
            map
        });
    }

    /// Names of every known member and event, sorted and without duplicates.
    #[must_use]
    pub fn member_names(&self) -> Vec<String> {
        let mut names = BTreeSet::new();
        for map in [&self.funcs, &self.puts, &self.put_refs] {
            for entry in map.iter() {
                if entry.key() == ENUMERATOR_NAME {
                    names.insert(ENUMERATOR_NAME.to_string());
                } else {
                    names.insert(entry.value().name.clone());
                }
            }
        }
        if let Some(events) = self.events.get() {
            names.extend(events.values().map(|event| event.name.clone()));
        }
        names.into_iter().collect()
    }
}

impl fmt::Debug for TypeDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeDesc")
            .field("name", &self.name)
            .field("guid", &self.guid)
            .field("funcs", &self.funcs.len())
            .field("puts", &self.puts.len())
            .field("put_refs", &self.put_refs.len())
            .finish_non_exhaustive()
    }
}
