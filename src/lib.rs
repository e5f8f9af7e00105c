//! equivalent-key-map: a single-threaded map whose array and object keys
//! are matched by structural equivalence instead of by reference.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: deep-equality lookup without serializing keys, with repeated
//!   lookups through the same key reference costing one hash probe.
//! - Layers:
//!   - `Key`: dynamically shaped key. Simple variants compare by value;
//!     `Array`/`Object` are `Rc`-shared and carry reference identity.
//!   - HandleHashMap<K, V, S>: insertion-ordered hash index with stable
//!     generational handles (`SlotMap` + `hashbrown::HashTable`). Used as
//!     the flat table, keyed by identity.
//!   - Forest: arena of discrimination-tree nodes, one tree for arrays and
//!     one for objects, resolving each composite key to a terminal node per
//!     equivalence class.
//!   - EquivalentKeyMap<V, S>: public API. An entry arena holds values; the
//!     flat table maps simple keys and the memoized reference of each
//!     composite entry to its entry; tree terminals point at entries.
//!
//! Constraints
//! - Single-threaded: `Key` uses `Rc`, the flat table sits in a `RefCell`.
//! - Exactly one flat-table entry per live logical entry: simple keys map
//!   to themselves, composite entries to their last-used reference.
//! - Cost of a miss or of a lookup through a new reference is proportional
//!   to the key's size and nesting, not to the number of entries.
//!
//! Memoization
//! - `set` and successful `get`/`has` through a composite reference make it
//!   the memoized reference of its entry, evicting the previous one. The
//!   flat table keeps the memoized `Key` alive, so its pointer cannot be
//!   recycled for an unrelated key while memoized.
//! - Lookup first probes the flat table by identity; only on a miss does it
//!   walk the tree.
//!
//! Ordering
//! - Iteration follows the flat table's insertion order. Re-memoizing (and
//!   re-setting a composite key) moves an entry to the back; overwriting a
//!   simple key keeps its position.
//!
//! Notes and non-goals
//! - Tree nodes are not pruned on delete; an equivalent key set later
//!   reuses the path. `clear()` drops all nodes.
//! - Keys are immutable once built; there is no cycle detection because
//!   an `Rc` tree built through the public constructors cannot form one.
//! - No weak or concurrent variants.

mod equivalent_key_map;
#[cfg(feature = "bench_internal")]
pub mod handle_hash_map;
#[cfg(not(feature = "bench_internal"))]
mod handle_hash_map;
mod handle_hash_map_proptest;
mod identity;
mod key;
mod tree;

// Public surface
pub use equivalent_key_map::{EquivalentKeyMap, Iter};
pub use key::{Key, KeyKind};
