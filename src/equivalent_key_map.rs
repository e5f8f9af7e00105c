//! EquivalentKeyMap: public map over `Key` with structural lookup of
//! composite keys and reference memoization.

use crate::handle_hash_map::{Cursor, Handle, HandleHashMap};
use crate::identity::{Identity, IdentityRef};
use crate::key::Key;
use crate::tree::{Forest, NodeId};
use core::cell::RefCell;
use core::fmt;
use core::hash::BuildHasher;
use core::ops::Index;
use log::{debug, trace};
use slotmap::SlotMap;
use std::collections::hash_map::RandomState;

slotmap::new_key_type! {
    struct EntryId;
}

/// One logical entry.
struct Entry<V> {
    value: V,
    /// Flat-table handle of the reference currently memoized for this entry.
    memo: Handle,
    /// Terminal tree node; `None` for simple keys.
    node: Option<NodeId>,
}

/// How a key was resolved to its entry.
#[derive(Copy, Clone)]
struct Found {
    id: EntryId,
    /// Resolved through the flat table (simple key or memoized reference)
    /// rather than a tree walk.
    memoized: bool,
}

/// A map whose array and object keys match by structural equivalence.
///
/// Simple keys behave as in an ordinary hash map. A composite key is found
/// by any key that is structurally equal to it (see [`Key`]). The last
/// reference used to `set` or `get` an entry is memoized, so repeated
/// lookups through the same reference skip the tree walk entirely.
///
/// `get` and `has` take `&self` but may re-memoize the entry under the
/// reference they were given; that bookkeeping lives behind a `RefCell`.
/// The map is single-threaded.
///
/// ```
/// use equivalent_key_map::{EquivalentKeyMap, Key};
///
/// let mut m = EquivalentKeyMap::new();
/// m.set(Key::object([("a", 1), ("b", 2)]), 10);
/// assert_eq!(m.get(&Key::object([("b", 2), ("a", 1)])), Some(&10));
/// assert_eq!(m.get(&Key::object([("a", 1)])), None);
/// ```
pub struct EquivalentKeyMap<V, S = RandomState> {
    entries: SlotMap<EntryId, Entry<V>>,
    index: RefCell<HandleHashMap<Identity, EntryId, S>>,
    forest: Forest<EntryId>,
}

impl<V> EquivalentKeyMap<V> {
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<V> Default for EquivalentKeyMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V, S> EquivalentKeyMap<V, S>
where
    S: BuildHasher,
{
    /// Create an empty map whose flat table hashes with `hasher`.
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            entries: SlotMap::with_key(),
            index: RefCell::new(HandleHashMap::with_hasher(hasher)),
            forest: Forest::new(),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or overwrite the entry for `key` and memoize `key` for it.
    /// Returns the map for chaining.
    pub fn set(&mut self, key: Key, value: V) -> &mut Self {
        let node = self.forest.find_or_insert(&key);
        let existing = match node {
            Some(node) => self.forest.slot(node),
            None => {
                let index = self.index.get_mut();
                index
                    .find(&IdentityRef(&key))
                    .and_then(|h| h.value(&*index).copied())
            }
        };

        match existing {
            Some(id) => {
                let entry = &mut self.entries[id];
                entry.value = value;
                if node.is_some() {
                    let memo = entry.memo;
                    Self::rekey(self.index.get_mut(), memo, key);
                }
            }
            None => {
                let index = self.index.get_mut();
                let id = self.entries.insert_with_key(|id| Entry {
                    value,
                    memo: Self::memoize(index, key, id),
                    node,
                });
                if let Some(node) = node {
                    self.forest.set_slot(node, Some(id));
                }
            }
        }
        self
    }

    /// Value for `key`, if present. A composite key found through a
    /// reference other than the memoized one becomes the memoized reference.
    pub fn get(&self, key: &Key) -> Option<&V> {
        let found = self.lookup(key)?;
        if !found.memoized {
            self.remember(found.id, key);
        }
        self.entries.get(found.id).map(|e| &e.value)
    }

    pub fn get_mut(&mut self, key: &Key) -> Option<&mut V> {
        let found = self.lookup(key)?;
        if !found.memoized {
            self.remember(found.id, key);
        }
        self.entries.get_mut(found.id).map(|e| &mut e.value)
    }

    /// Whether an entry exists for `key`. Presence is what counts, not the
    /// stored value: `0`, `""` or `false` values are present.
    pub fn has(&self, key: &Key) -> bool {
        self.get(key).is_some()
    }

    /// Remove the entry for `key`. Returns whether one existed. The tree path
    /// of a composite key is kept and reused if an equivalent key is set again.
    pub fn delete(&mut self, key: &Key) -> bool {
        let Some(found) = self.lookup(key) else {
            return false;
        };
        let Some(entry) = self.entries.remove(found.id) else {
            return false;
        };
        let _ = self.index.get_mut().remove(entry.memo);
        if let Some(node) = entry.node {
            self.forest.set_slot(node, None);
        }
        trace!("deleted {:?} key, {} entries left", key.kind(), self.entries.len());
        true
    }

    /// Remove every entry and drop all tree nodes.
    pub fn clear(&mut self) {
        debug!(
            "clearing {} entries and {} tree nodes",
            self.entries.len(),
            self.forest.node_count()
        );
        self.entries.clear();
        self.index.get_mut().clear();
        self.forest.clear();
    }

    /// Call `f(value, key, map)` for each entry in iteration order.
    ///
    /// `f` may look keys up in the map. An entry re-memoized by such a
    /// lookup moves to the back and is visited again.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&V, &Key, &Self),
    {
        for (key, value) in self.iter() {
            f(value, &key, self);
        }
    }

    /// Entries in the order their memoized keys were (re)inserted. Yields
    /// the memoized reference of each composite entry.
    pub fn iter(&self) -> Iter<'_, V, S> {
        Iter {
            map: self,
            cursor: None,
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = Key> + '_ {
        self.iter().map(|(k, _)| k)
    }

    pub fn values(&self) -> impl Iterator<Item = &V> + '_ {
        self.iter().map(|(_, v)| v)
    }

    fn lookup(&self, key: &Key) -> Option<Found> {
        let memoized = {
            let index = self.index.borrow();
            let id = index
                .find(&IdentityRef(key))
                .and_then(|h| h.value(&*index).copied());
            id
        };
        if let Some(id) = memoized {
            return Some(Found { id, memoized: true });
        }
        let node = self.forest.find(key)?;
        let id = self.forest.slot(node)?;
        Some(Found {
            id,
            memoized: false,
        })
    }

    fn remember(&self, id: EntryId, key: &Key) {
        let Some(entry) = self.entries.get(id) else {
            return;
        };
        trace!("memoizing new {:?} reference", key.kind());
        Self::rekey(&mut self.index.borrow_mut(), entry.memo, key.clone());
    }

    fn memoize(index: &mut HandleHashMap<Identity, EntryId, S>, key: Key, id: EntryId) -> Handle {
        match index.insert(Identity(key), id) {
            Ok(handle) => handle,
            Err(e) => unreachable!("key memoized for two entries: {e:?}"),
        }
    }

    fn rekey(index: &mut HandleHashMap<Identity, EntryId, S>, memo: Handle, key: Key) {
        // A reference resolves to exactly one path, so no other entry can hold it.
        if let Err(e) = index.rekey(memo, Identity(key)) {
            unreachable!("memoized reference out of sync: {e:?}");
        }
    }
}

/// Iterator over `(key, &value)` in the map's iteration order.
///
/// Holds no borrow of the flat table between items, so lookups on the same
/// map are allowed while iterating.
pub struct Iter<'a, V, S = RandomState> {
    map: &'a EquivalentKeyMap<V, S>,
    cursor: Option<Cursor>,
}

impl<'a, V, S> Iterator for Iter<'a, V, S>
where
    S: BuildHasher,
{
    type Item = (Key, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let (cursor, key, id) = {
            let index = self.map.index.borrow();
            let (cursor, handle) = index.next_after(self.cursor)?;
            let key = handle.key(&*index)?.0.clone();
            let id = *handle.value(&*index)?;
            (cursor, key, id)
        };
        self.cursor = Some(cursor);
        self.map.entries.get(id).map(|e| (key, &e.value))
    }
}

impl<'a, V, S> IntoIterator for &'a EquivalentKeyMap<V, S>
where
    S: BuildHasher,
{
    type Item = (Key, &'a V);
    type IntoIter = Iter<'a, V, S>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<V, S> Clone for EquivalentKeyMap<V, S>
where
    V: Clone,
    S: BuildHasher + Clone,
{
    /// Independent copy built by replaying `set` over every entry.
    fn clone(&self) -> Self {
        let mut copy = Self::with_hasher(self.index.borrow().hasher().clone());
        for (key, value) in self.iter() {
            copy.set(key, value.clone());
        }
        copy
    }
}

impl<V, S> Extend<(Key, V)> for EquivalentKeyMap<V, S>
where
    S: BuildHasher,
{
    fn extend<I: IntoIterator<Item = (Key, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.set(key, value);
        }
    }
}

impl<V, S> FromIterator<(Key, V)> for EquivalentKeyMap<V, S>
where
    S: BuildHasher + Default,
{
    fn from_iter<I: IntoIterator<Item = (Key, V)>>(iter: I) -> Self {
        let mut map = Self::with_hasher(S::default());
        map.extend(iter);
        map
    }
}

impl<V, const N: usize> From<[(Key, V); N]> for EquivalentKeyMap<V> {
    fn from(pairs: [(Key, V); N]) -> Self {
        pairs.into_iter().collect()
    }
}

impl<V, S> Index<&Key> for EquivalentKeyMap<V, S>
where
    S: BuildHasher,
{
    type Output = V;

    /// # Panics
    ///
    /// Panics if `key` is not present.
    fn index(&self, key: &Key) -> &V {
        match self.get(key) {
            Some(value) => value,
            None => panic!("key not present in EquivalentKeyMap: {key:?}"),
        }
    }
}

impl<V, S> fmt::Debug for EquivalentKeyMap<V, S>
where
    V: fmt::Debug,
    S: BuildHasher,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}
