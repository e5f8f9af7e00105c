#![cfg(test)]

// Property tests for HandleHashMap kept inside the crate so they do not
// require feature gates to access internal modules.

use crate::handle_hash_map::{Handle, HandleHashMap, InsertError};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::hash_map::RandomState;
use std::fmt;
use std::hash::{BuildHasher, Hasher};

// Key newtype with Borrow<str> to exercise borrowed lookup.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
struct Key(String);
impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
impl std::borrow::Borrow<str> for Key {
    fn borrow(&self) -> &str {
        &self.0
    }
}

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Insert(usize, i32),
    Remove(usize),
    Find(usize),
    Contains(String),
    Mutate(usize, i32),
    Rekey(usize, usize),
    Iterate,
    Walk,
}

fn key_from(pool: &[String], i: usize) -> Key {
    Key(pool[i].clone())
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Insert(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Find),
            prop_oneof![
                contains_pool.prop_map(|s: String| s),
                "[a-z]{0,5}".prop_map(|s| s)
            ]
            .prop_map(OpI::Contains),
            (idx.clone(), any::<i32>()).prop_map(|(i, d)| OpI::Mutate(i, d)),
            (idx.clone(), idx.clone()).prop_map(|(i, j)| OpI::Rekey(i, j)),
            Just(OpI::Iterate),
            Just(OpI::Walk),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Model: live entries in iteration order, each with the handle it was given.
struct Model {
    entries: Vec<(Key, i32, Handle)>,
}

impl Model {
    fn position(&self, k: &Key) -> Option<usize> {
        self.entries.iter().position(|(mk, _, _)| mk == k)
    }
}

// State-machine equivalence against an ordered Vec model. Invariants
// exercised across random operation sequences:
// - Duplicate keys are rejected; on success a unique stable Handle is returned.
// - `find`/`contains_key` parity and handle stability for live entries.
// - `remove(handle)` returns the owned `(K,V)` matching the model and invalidates the handle.
// - `rekey` keeps the handle, moves the entry to the back, and rejects keys held elsewhere.
// - `iter` and cursor walks yield live entries exactly once, in insertion order.
// - Stale handles never resolve; `len`/`is_empty` parity with the model after each op.
fn run_state_machine<S: BuildHasher>(
    mut sut: HandleHashMap<Key, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model = Model { entries: Vec::new() };
    let mut stale: Vec<Handle> = Vec::new();

    for op in ops {
        match op {
            OpI::Insert(i, v) => {
                let k = key_from(&pool, i);
                let already = model.position(&k).is_some();
                match sut.insert(k.clone(), v) {
                    Ok(h) => {
                        prop_assert!(!already, "insert must fail on duplicate");
                        model.entries.push((k, v, h));
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(already, "duplicate error only when key exists");
                    }
                    Err(e) => prop_assert!(false, "unexpected insert error {:?}", e),
                }
            }
            OpI::Remove(i) => {
                let k = key_from(&pool, i);
                if let Some(pos) = model.position(&k) {
                    let (mk, mv, h) = model.entries.remove(pos);
                    let (kk, vv) = sut.remove(h).expect("handle valid for removal");
                    prop_assert_eq!(kk, mk);
                    prop_assert_eq!(vv, mv);
                    stale.push(h);
                } else {
                    prop_assert!(sut.find(&k).is_none());
                }
            }
            OpI::Find(i) => {
                let k = key_from(&pool, i);
                let found = sut.find(&k);
                let tracked = model.position(&k).map(|p| model.entries[p].2);
                prop_assert_eq!(found, tracked);
            }
            OpI::Contains(s) => {
                let has = sut.contains_key(s.as_str());
                let has_model = model.entries.iter().any(|(k, _, _)| k.0 == s);
                prop_assert_eq!(has, has_model);
            }
            OpI::Mutate(i, d) => {
                let k = key_from(&pool, i);
                if let Some(pos) = model.position(&k) {
                    let h = model.entries[pos].2;
                    match h.value_mut(&mut sut) {
                        Some(vr) => {
                            *vr = vr.saturating_add(d);
                            model.entries[pos].1 = model.entries[pos].1.saturating_add(d);
                        }
                        None => prop_assert!(false, "live handle should resolve"),
                    }
                }
            }
            OpI::Rekey(i, j) => {
                let from = key_from(&pool, i);
                let to = key_from(&pool, j);
                let Some(pos) = model.position(&from) else {
                    continue;
                };
                let h = model.entries[pos].2;
                let holder = model.position(&to);
                match sut.rekey(h, to.clone()) {
                    Ok(old) => {
                        prop_assert!(holder.is_none() || holder == Some(pos));
                        prop_assert_eq!(old, from);
                        let (_, v, h) = model.entries.remove(pos);
                        model.entries.push((to, v, h));
                    }
                    Err(InsertError::DuplicateKey) => {
                        prop_assert!(holder.is_some() && holder != Some(pos));
                    }
                    Err(e) => prop_assert!(false, "unexpected rekey error {:?}", e),
                }
            }
            OpI::Iterate => {
                let seen: Vec<(Handle, Key, i32)> =
                    sut.iter().map(|(h, k, v)| (h, k.clone(), *v)).collect();
                let expected: Vec<(Handle, Key, i32)> = model
                    .entries
                    .iter()
                    .map(|(k, v, h)| (*h, k.clone(), *v))
                    .collect();
                prop_assert_eq!(seen, expected);
            }
            OpI::Walk => {
                let mut cursor = None;
                let mut walked = Vec::new();
                while let Some((c, h)) = sut.next_after(cursor) {
                    walked.push(h);
                    cursor = Some(c);
                }
                let expected: Vec<Handle> = model.entries.iter().map(|(_, _, h)| *h).collect();
                prop_assert_eq!(walked, expected);
            }
        }

        // Post-conditions after each op
        for &h in &stale {
            prop_assert!(h.value(&sut).is_none());
        }
        prop_assert_eq!(sut.len(), model.entries.len());
        prop_assert_eq!(sut.is_empty(), model.entries.is_empty());
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        let sut: HandleHashMap<Key, i32, RandomState> = HandleHashMap::new();
        run_state_machine(sut, pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress equality resolution.
#[derive(Clone, Default)]
struct ConstBuildHasher;
struct ConstHasher;
impl BuildHasher for ConstBuildHasher {
    type Hasher = ConstHasher;
    fn build_hasher(&self) -> Self::Hasher {
        ConstHasher
    }
}
impl Hasher for ConstHasher {
    fn write(&mut self, _bytes: &[u8]) {}
    fn finish(&self) -> u64 {
        0
    }
}

// Property: Same state-machine invariants as above, under worst-case
// collision behavior (constant hasher). This stresses equality probing
// and collision resolution in the index, including rekey re-indexing.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        let sut: HandleHashMap<Key, i32, ConstBuildHasher> = HandleHashMap::with_hasher(ConstBuildHasher);
        run_state_machine(sut, pool, ops)?;
    }
}
