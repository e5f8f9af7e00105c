//! HandleHashMap: insertion-ordered hash index with stable handles.
//!
//! Entries live in a `SlotMap` and are indexed by a `hashbrown::HashTable`
//! of slot keys. Each entry also carries a sequence number; an ordered side
//! index over those numbers gives insertion-order iteration and lets a
//! cursor step forward even while entries are moved to the back.

// Part of the API is only reached by tests and the bench_internal hook.
#![cfg_attr(not(feature = "bench_internal"), allow(dead_code))]

use core::hash::{BuildHasher, Hash};
use core::ops::Bound;
use hashbrown::{Equivalent, HashTable};
use slotmap::{DefaultKey, SlotMap};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::hash_map::RandomState;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Handle(DefaultKey);

impl Handle {
    pub(crate) fn new(k: DefaultKey) -> Self {
        Handle(k)
    }
    pub(crate) fn raw_handle(&self) -> DefaultKey {
        self.0
    }

    pub fn key<'a, K, V, S>(&self, map: &'a HandleHashMap<K, V, S>) -> Option<&'a K>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        map.handle_key(*self)
    }

    pub fn value<'a, K, V, S>(&self, map: &'a HandleHashMap<K, V, S>) -> Option<&'a V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        map.handle_value(*self)
    }

    pub fn value_mut<'a, K, V, S>(&self, map: &'a mut HandleHashMap<K, V, S>) -> Option<&'a mut V>
    where
        K: Eq + Hash,
        S: BuildHasher,
    {
        map.handle_value_mut(*self)
    }
}

/// Position in insertion order. Positions only grow: an entry moved to the
/// back gets a fresh one, so a cursor never revisits earlier positions.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Cursor(u64);

#[derive(Debug)]
struct Entry<K, V> {
    key: K,
    value: V,
    hash: u64,
    seq: u64,
}

pub struct HandleHashMap<K, V, S = RandomState> {
    hasher: S,
    index: HashTable<DefaultKey>,
    slots: SlotMap<DefaultKey, Entry<K, V>>,
    order: BTreeMap<u64, DefaultKey>,
    next_seq: u64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum InsertError {
    /// Another live entry already holds the key.
    DuplicateKey,
    /// The handle does not refer to a live entry.
    StaleHandle,
}

impl<K, V> HandleHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }
}

impl<K, V> Default for HandleHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over entries in insertion order.
pub struct Iter<'a, K, V> {
    order: btree_map::Values<'a, u64, DefaultKey>,
    slots: &'a SlotMap<DefaultKey, Entry<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (Handle, &'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let slots = self.slots;
        self.order
            .by_ref()
            .find_map(|&k| slots.get(k).map(|e| (Handle::new(k), &e.key, &e.value)))
    }
}

impl<K, V, S> HandleHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self {
            index: HashTable::new(),
            hasher,
            slots: SlotMap::with_key(),
            order: BTreeMap::new(),
            next_seq: 0,
        }
    }

    fn make_hash<Q>(&self, q: &Q) -> u64
    where
        Q: ?Sized + Hash,
    {
        self.hasher.hash_one(q)
    }

    pub fn hasher(&self) -> &S {
        &self.hasher
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn find<Q>(&self, q: &Q) -> Option<Handle>
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        let hash = self.make_hash(q);
        self.index
            .find(hash, |&k| {
                self.slots
                    .get(k)
                    .map(|e| q.equivalent(&e.key))
                    .unwrap_or(false)
            })
            .map(|&k| Handle::new(k))
    }

    pub fn contains_key<Q>(&self, q: &Q) -> bool
    where
        Q: ?Sized + Hash + Equivalent<K>,
    {
        self.find(q).is_some()
    }

    /// Insert a new entry at the back. Duplicate keys are rejected and the
    /// map is left unchanged.
    pub fn insert(&mut self, key: K, value: V) -> Result<Handle, InsertError> {
        let hash = self.make_hash(&key);
        match self.index.entry(
            hash,
            |&kk| self.slots.get(kk).map(|e| e.key == key).unwrap_or(false),
            |&kk| self.slots.get(kk).map(|e| e.hash).unwrap_or(0),
        ) {
            hashbrown::hash_table::Entry::Occupied(_) => Err(InsertError::DuplicateKey),
            hashbrown::hash_table::Entry::Vacant(v) => {
                let seq = self.next_seq;
                self.next_seq += 1;
                let k = self.slots.insert(Entry {
                    key,
                    value,
                    hash,
                    seq,
                });
                let _ = v.insert(k);
                self.order.insert(seq, k);
                Ok(Handle::new(k))
            }
        }
    }

    pub fn remove(&mut self, handle: Handle) -> Option<(K, V)> {
        let k = handle.raw_handle();

        let entry = self.slots.remove(k)?;

        // Unlink from index via occupied entry removal
        if let Ok(occupied) = self.index.find_entry(entry.hash, |&kk| kk == k) {
            occupied.remove();
        }
        self.order.remove(&entry.seq);

        Some((entry.key, entry.value))
    }

    /// Replace the key of a live entry and move it to the back, keeping its
    /// handle. Returns the previous key. Fails without changes if another
    /// entry already holds `key`.
    pub fn rekey(&mut self, handle: Handle, key: K) -> Result<K, InsertError> {
        let k = handle.raw_handle();
        let old_hash = self.slots.get(k).ok_or(InsertError::StaleHandle)?.hash;
        let hash = self.make_hash(&key);
        let holder = self.index.find(hash, |&kk| {
            self.slots.get(kk).map(|e| e.key == key).unwrap_or(false)
        });
        if matches!(holder, Some(&other) if other != k) {
            return Err(InsertError::DuplicateKey);
        }

        if let Ok(occupied) = self.index.find_entry(old_hash, |&kk| kk == k) {
            occupied.remove();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let entry = self.slots.get_mut(k).ok_or(InsertError::StaleHandle)?;
        let old_key = core::mem::replace(&mut entry.key, key);
        let old_seq = core::mem::replace(&mut entry.seq, seq);
        entry.hash = hash;
        self.order.remove(&old_seq);
        self.order.insert(seq, k);
        let _ = self
            .index
            .insert_unique(hash, k, |&kk| self.slots.get(kk).map(|e| e.hash).unwrap_or(0));
        Ok(old_key)
    }

    /// First entry strictly after `cursor` in insertion order, or the first
    /// entry overall when `cursor` is `None`.
    pub fn next_after(&self, cursor: Option<Cursor>) -> Option<(Cursor, Handle)> {
        let lower = match cursor {
            Some(Cursor(seq)) => Bound::Excluded(seq),
            None => Bound::Unbounded,
        };
        self.order
            .range((lower, Bound::Unbounded))
            .next()
            .map(|(&seq, &k)| (Cursor(seq), Handle::new(k)))
    }

    pub fn clear(&mut self) {
        self.index.clear();
        self.slots.clear();
        self.order.clear();
    }

    pub(crate) fn handle_key(&self, h: Handle) -> Option<&K> {
        self.slots.get(h.raw_handle()).map(|e| &e.key)
    }

    pub(crate) fn handle_value(&self, h: Handle) -> Option<&V> {
        self.slots.get(h.raw_handle()).map(|e| &e.value)
    }

    pub(crate) fn handle_value_mut(&mut self, h: Handle) -> Option<&mut V> {
        self.slots.get_mut(h.raw_handle()).map(|e| &mut e.value)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            order: self.order.values(),
            slots: &self.slots,
        }
    }
}
