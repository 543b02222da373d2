//! Reference-counted handles to native objects.
//!
//! A [`ComObject`] owns an implementation of the [`Unknown`] trait family and carries a
//! process-unique [`ObjectId`]. Handles are shared as [`ComPtr`] (`Arc<ComObject>`): cloning a
//! handle is `AddRef`, dropping it is `Release`. Inside a wire value the handle travels as a
//! raw interface pointer obtained from [`ComObject::into_raw`] and is turned back into an owned
//! handle with [`ComObject::from_raw`].

use std::{
    ffi::c_void,
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use uguid::Guid;

use crate::native::{ConnectionPointContainer, Dispatch, ProvideClassInfo, Unknown};

/// A shared handle to a native object.
pub type ComPtr = Arc<ComObject>;

/// Process-unique identity of a native object.
///
/// Used as the key of per-object side tables; ids are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(u64);

static NEXT_OBJECT_ID: AtomicU64 = AtomicU64::new(1);

impl ObjectId {
    fn next() -> Self {
        ObjectId(NEXT_OBJECT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric identity.
    #[must_use]
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A native object.
pub struct ComObject {
    id: ObjectId,
    inner: Box<dyn Unknown>,
}

impl ComObject {
    /// Wraps an implementation into a new shared handle with a fresh identity.
    pub fn new<T: Unknown + 'static>(inner: T) -> ComPtr {
        Arc::new(ComObject {
            id: ObjectId::next(),
            inner: Box::new(inner),
        })
    }

    /// The identity of this object.
    #[must_use]
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// The wrapped implementation.
    #[must_use]
    pub fn unknown(&self) -> &dyn Unknown {
        self.inner.as_ref()
    }

    /// The dispatch interface, if the object has one.
    #[must_use]
    pub fn dispatch(&self) -> Option<&dyn Dispatch> {
        self.inner.as_dispatch()
    }

    /// The connection point container, if the object has one.
    #[must_use]
    pub fn connection_point_container(&self) -> Option<&dyn ConnectionPointContainer> {
        self.inner.as_connection_point_container()
    }

    /// The class info provider, if the object has one.
    #[must_use]
    pub fn provide_class_info(&self) -> Option<&dyn ProvideClassInfo> {
        self.inner.as_provide_class_info()
    }

    /// Answers an interface query.
    #[must_use]
    pub fn supports_interface(&self, iid: &Guid) -> bool {
        self.inner.supports_interface(iid)
    }

    /// Transfers one reference into a raw interface pointer.
    pub(crate) fn into_raw(ptr: ComPtr) -> *mut c_void {
        Arc::into_raw(ptr).cast_mut().cast()
    }

    /// Takes ownership of one reference held by a raw interface pointer.
    ///
    /// # Safety
    /// `raw` must come from [`ComObject::into_raw`] and its reference must not have been
    /// released already.
    pub(crate) unsafe fn from_raw(raw: *mut c_void) -> ComPtr {
        Arc::from_raw(raw.cast_const().cast::<ComObject>())
    }

    /// Adds a reference to a raw interface pointer without taking over the existing one.
    ///
    /// # Safety
    /// `raw` must come from [`ComObject::into_raw`] and still hold a live reference.
    pub(crate) unsafe fn clone_raw(raw: *mut c_void) -> ComPtr {
        let ptr = raw.cast_const().cast::<ComObject>();
        Arc::increment_strong_count(ptr);
        Arc::from_raw(ptr)
    }
}

impl fmt::Debug for ComObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComObject")
            .field("id", &self.id)
            .field("dispatch", &self.dispatch().is_some())
            .finish()
    }
}
