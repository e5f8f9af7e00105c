//! Identity view of a key, as used by the flat table.
//!
//! Simple keys hash and compare by value (SameValueZero for numbers).
//! Composite keys hash and compare by `Rc` allocation, never by contents.
//! Whoever stores an `Identity` keeps the allocation alive, so a pointer
//! in a live table cannot be reused by another key.

use crate::key::Key;
use core::hash::{Hash, Hasher};
use std::rc::Rc;

/// Owned identity, stored in tables.
#[derive(Clone, Debug)]
pub(crate) struct Identity(pub(crate) Key);

/// Borrowed identity, used to probe tables without cloning the key.
#[derive(Copy, Clone, Debug)]
pub(crate) struct IdentityRef<'a>(pub(crate) &'a Key);

fn hash_identity<H: Hasher>(key: &Key, state: &mut H) {
    match key {
        Key::Null => state.write_u8(0),
        Key::Bool(b) => {
            state.write_u8(1);
            b.hash(state);
        }
        Key::Number(n) => {
            state.write_u8(2);
            n.hash(state);
        }
        Key::String(s) => {
            state.write_u8(3);
            s.hash(state);
        }
        Key::Array(items) => {
            state.write_u8(4);
            (Rc::as_ptr(items) as *const () as usize).hash(state);
        }
        Key::Object(props) => {
            state.write_u8(5);
            (Rc::as_ptr(props) as *const () as usize).hash(state);
        }
    }
}

impl Hash for Identity {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_identity(&self.0, state)
    }
}

impl Hash for IdentityRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        hash_identity(self.0, state)
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.0.ptr_eq(&other.0)
    }
}

impl Eq for Identity {}

impl hashbrown::Equivalent<Identity> for IdentityRef<'_> {
    fn equivalent(&self, key: &Identity) -> bool {
        self.0.ptr_eq(&key.0)
    }
}

impl From<&IdentityRef<'_>> for Identity {
    fn from(r: &IdentityRef<'_>) -> Self {
        Identity(r.0.clone())
    }
}
