//! Process-wide caches of discovered types and per-object side tables.
//!
//! Both caches are plain services: a binder owns them through `Arc`s, and several binders
//! can share one instance. Locks are held only for the lookup-or-insert itself.

use std::{
    fmt,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Weak,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};
use uguid::Guid;

use crate::{
    binding::TypeDesc,
    native::{ComObject, ComPtr, ObjectId},
};

/// Type descriptors keyed by the identity of the native type.
///
/// Every instance of a type shares the same [`TypeDesc`]. Entries are never evicted.
#[derive(Default)]
pub struct TypeCache {
    types: DashMap<Guid, Arc<TypeDesc>>,
}

impl TypeCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        TypeCache::default()
    }

    /// The descriptor of the type `guid`, if cached.
    #[must_use]
    pub fn get(&self, guid: &Guid) -> Option<Arc<TypeDesc>> {
        self.types.get(guid).map(|entry| entry.value().clone())
    }

    /// Caches `desc` unless a descriptor for the same type is already present, and returns
    /// the cached one.
    ///
    /// Two threads scanning the same type concurrently both end up with the descriptor that
    /// was inserted first.
    ///
    /// # Panics
    ///
    /// Debug builds assert that `desc` carries a type identity.
    pub fn get_or_insert(&self, desc: TypeDesc) -> Arc<TypeDesc> {
        debug_assert!(desc.guid().is_some(), "late-bound descriptors are per object");
        let guid = desc.guid().unwrap_or(Guid::ZERO);
        match self.types.entry(guid) {
            Entry::Occupied(entry) => entry.get().clone(),
            Entry::Vacant(entry) => entry.insert(Arc::new(desc)).clone(),
        }
    }

    /// Number of cached types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns `true` if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl fmt::Debug for TypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache")
            .field("types", &self.types.len())
            .finish()
    }
}

/// A side table attaching a value to individual native objects.
///
/// Entries are keyed by [`ObjectId`] and hold a weak reference to their object. Entries of
/// objects that are gone are dropped by an insertion that finds the table at its purge mark;
/// the mark then moves to twice the surviving size, so purging stays amortized constant per
/// insertion.
pub struct ObjectTable<T> {
    entries: DashMap<ObjectId, (Weak<ComObject>, Arc<T>)>,
    purge_at: AtomicUsize,
}

/// Smallest size at which insertions purge dead entries
const PURGE_MARK: usize = 64;

impl<T> ObjectTable<T> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        ObjectTable {
            entries: DashMap::new(),
            purge_at: AtomicUsize::new(PURGE_MARK),
        }
    }

    /// The value attached to `object`, if any.
    #[must_use]
    pub fn get(&self, object: &ComPtr) -> Option<Arc<T>> {
        self.entries
            .get(&object.id())
            .map(|entry| entry.value().1.clone())
    }

    /// The value attached to `object`, attaching the result of `init` if there is none.
    pub fn get_or_insert_with(&self, object: &ComPtr, init: impl FnOnce() -> T) -> Arc<T> {
        if let Some(existing) = self.get(object) {
            return existing;
        }

        if self.entries.len() >= self.purge_at.load(Ordering::Relaxed) {
            self.purge();
            self.purge_at
                .store((self.entries.len() * 2).max(PURGE_MARK), Ordering::Relaxed);
        }
        self.entries
            .entry(object.id())
            .or_insert_with(|| (Arc::downgrade(object), Arc::new(init())))
            .value()
            .1
            .clone()
    }

    /// Detaches the value of `object`.
    pub fn remove(&self, object: &ComPtr) -> Option<Arc<T>> {
        self.entries.remove(&object.id()).map(|(_, (_, value))| value)
    }

    /// Drops the entries of objects that no longer exist.
    pub fn purge(&self) {
        self.entries.retain(|_, (object, _)| object.strong_count() > 0);
    }

    /// Number of attached values, including those of objects not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no value is attached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for ObjectTable<T> {
    fn default() -> Self {
        ObjectTable::new()
    }
}

impl<T> fmt::Debug for ObjectTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectTable")
            .field("entries", &self.entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::MockObject;
    use uguid::guid;

    #[test]
    fn first_insert_wins() {
        let cache = TypeCache::new();
        let id = guid!("00024500-0000-0000-c000-000000000046");

        let first = cache.get_or_insert(TypeDesc::new("Application", Some(id)));
        let second = cache.get_or_insert(TypeDesc::new("Application", Some(id)));

        assert!(Arc::ptr_eq(&first, &second));
        assert!(Arc::ptr_eq(&first, &cache.get(&id).unwrap()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn side_table_per_object() {
        let table: ObjectTable<String> = ObjectTable::new();
        let first = MockObject::builder("A").build();
        let second = MockObject::builder("A").build();

        let a = table.get_or_insert_with(&first, || "first".to_string());
        let again = table.get_or_insert_with(&first, || "other".to_string());
        table.get_or_insert_with(&second, || "second".to_string());

        assert!(Arc::ptr_eq(&a, &again));
        assert_eq!(table.get(&second).as_deref().map(String::as_str), Some("second"));
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn entries_die_with_their_object() {
        let table: ObjectTable<u32> = ObjectTable::new();
        let first = MockObject::builder("A").build();
        table.get_or_insert_with(&first, || 1);
        drop(first);

        let second = MockObject::builder("B").build();
        table.get_or_insert_with(&second, || 2);
        assert_eq!(table.len(), 2);
        table.purge();
        assert_eq!(table.len(), 1);

        assert_eq!(table.remove(&second).as_deref(), Some(&2));
        assert!(table.is_empty());
    }

    #[test]
    fn insertions_purge_at_the_mark() {
        let table: ObjectTable<usize> = ObjectTable::new();
        let live: Vec<ComPtr> = (0..PURGE_MARK / 2)
            .map(|_| MockObject::builder("Live").build())
            .collect();
        for (index, object) in live.iter().enumerate() {
            table.get_or_insert_with(object, || index);
        }
        for index in live.len()..PURGE_MARK {
            let dead = MockObject::builder("Dead").build();
            table.get_or_insert_with(&dead, || index);
        }
        assert_eq!(table.len(), PURGE_MARK);

        let next = MockObject::builder("Next").build();
        table.get_or_insert_with(&next, || PURGE_MARK);
        assert_eq!(table.len(), live.len() + 1);

        // The mark moved to twice the surviving size
        for _ in 0..PURGE_MARK {
            let dead = MockObject::builder("Dead").build();
            table.get_or_insert_with(&dead, || 0);
        }
        assert!(table.len() <= 2 * (live.len() + 1));
        assert!(live.iter().all(|object| table.get(object).is_some()));
    }
}
