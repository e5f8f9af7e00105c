//! Key: the dynamically shaped key accepted by `EquivalentKeyMap`.
//!
//! Simple keys (`Null`, `Bool`, `Number`, `String`) compare by value.
//! Composite keys (`Array`, `Object`) are shared behind `Rc`: cloning a
//! composite key copies the reference, and the map memoizes lookups by
//! that reference. Structural equality (`PartialEq`/`Hash` on `Key`) is the
//! same relation the map uses to decide whether two keys are equivalent.

use ordered_float::OrderedFloat;
use std::collections::btree_map;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Key {
    Null,
    Bool(bool),
    /// Compared with SameValueZero: `NaN` equals `NaN`, `-0.0` equals `0.0`.
    Number(OrderedFloat<f64>),
    String(Rc<str>),
    Array(Rc<[Key]>),
    /// Property bag. Properties are kept sorted by name.
    Object(Rc<BTreeMap<String, Key>>),
}

/// Which table or tree a key is routed to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum KeyKind {
    Simple,
    Array,
    Object,
}

impl Key {
    /// Build an array key. Each call allocates a new reference.
    pub fn array<I>(items: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Key>,
    {
        Key::Array(items.into_iter().map(Into::into).collect())
    }

    /// Build an object key from `(name, value)` pairs. A repeated name keeps
    /// its last value. Each call allocates a new reference.
    pub fn object<I, N, T>(props: I) -> Self
    where
        I: IntoIterator<Item = (N, T)>,
        N: Into<String>,
        T: Into<Key>,
    {
        Key::Object(Rc::new(
            props
                .into_iter()
                .map(|(n, v)| (n.into(), v.into()))
                .collect(),
        ))
    }

    pub fn kind(&self) -> KeyKind {
        match self {
            Key::Array(_) => KeyKind::Array,
            Key::Object(_) => KeyKind::Object,
            _ => KeyKind::Simple,
        }
    }

    pub fn is_simple(&self) -> bool {
        self.kind() == KeyKind::Simple
    }

    /// Reference identity: composite keys are identical only when they share
    /// the same allocation; simple keys fall back to value equality.
    pub fn ptr_eq(&self, other: &Key) -> bool {
        match (self, other) {
            (Key::Array(a), Key::Array(b)) => Rc::ptr_eq(a, b),
            (Key::Object(a), Key::Object(b)) => Rc::ptr_eq(a, b),
            (a, b) if a.is_simple() && b.is_simple() => a == b,
            _ => false,
        }
    }

    /// Property steps of a composite key: array elements in index order,
    /// object properties in sorted name order. Empty for simple keys.
    pub(crate) fn props(&self) -> Props<'_> {
        match self {
            Key::Array(items) => Props::Array(items.iter().enumerate()),
            Key::Object(props) => Props::Object(props.iter()),
            _ => Props::Empty,
        }
    }
}

/// Property name of one step down a discrimination tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Prop {
    Index(usize),
    Name(Box<str>),
}

/// Borrowed form of [`Prop`] used for lookups.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum PropRef<'a> {
    Index(usize),
    Name(&'a str),
}

impl Prop {
    fn as_ref(&self) -> PropRef<'_> {
        match self {
            Prop::Index(i) => PropRef::Index(*i),
            Prop::Name(n) => PropRef::Name(n),
        }
    }
}

impl Hash for Prop {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_ref().hash(state)
    }
}

impl Hash for PropRef<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            PropRef::Index(i) => {
                state.write_u8(0);
                i.hash(state);
            }
            PropRef::Name(n) => {
                state.write_u8(1);
                n.hash(state);
            }
        }
    }
}

impl hashbrown::Equivalent<Prop> for PropRef<'_> {
    fn equivalent(&self, key: &Prop) -> bool {
        *self == key.as_ref()
    }
}

impl From<&PropRef<'_>> for Prop {
    fn from(p: &PropRef<'_>) -> Self {
        match *p {
            PropRef::Index(i) => Prop::Index(i),
            PropRef::Name(n) => Prop::Name(n.into()),
        }
    }
}

pub(crate) enum Props<'a> {
    Array(core::iter::Enumerate<core::slice::Iter<'a, Key>>),
    Object(btree_map::Iter<'a, String, Key>),
    Empty,
}

impl<'a> Iterator for Props<'a> {
    type Item = (PropRef<'a>, &'a Key);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Props::Array(it) => it.next().map(|(i, v)| (PropRef::Index(i), v)),
            Props::Object(it) => it.next().map(|(n, v)| (PropRef::Name(n.as_str()), v)),
            Props::Empty => None,
        }
    }
}

impl From<bool> for Key {
    fn from(b: bool) -> Self {
        Key::Bool(b)
    }
}

impl From<f64> for Key {
    fn from(n: f64) -> Self {
        Key::Number(OrderedFloat(n))
    }
}

impl From<f32> for Key {
    fn from(n: f32) -> Self {
        Key::Number(OrderedFloat(f64::from(n)))
    }
}

macro_rules! key_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Key {
                fn from(n: $t) -> Self {
                    Key::Number(OrderedFloat(n as f64))
                }
            }
        )*
    };
}

key_from_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key::String(s.into())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Key::String(s.into())
    }
}

impl From<Rc<str>> for Key {
    fn from(s: Rc<str>) -> Self {
        Key::String(s)
    }
}

impl From<Vec<Key>> for Key {
    fn from(items: Vec<Key>) -> Self {
        Key::Array(items.into())
    }
}

impl<T: Into<Key>> From<Option<T>> for Key {
    fn from(v: Option<T>) -> Self {
        v.map_or(Key::Null, Into::into)
    }
}

#[cfg(feature = "json")]
mod json {
    use super::Key;
    use serde_json::{Map, Number, Value};

    impl From<Value> for Key {
        fn from(v: Value) -> Self {
            match v {
                Value::Null => Key::Null,
                Value::Bool(b) => Key::Bool(b),
                // Every JSON number has an f64 reading unless arbitrary precision is on.
                Value::Number(n) => n.as_f64().map_or(Key::Null, Key::from),
                Value::String(s) => Key::from(s),
                Value::Array(items) => Key::array(items),
                Value::Object(props) => Key::object(props),
            }
        }
    }

    // Integral values within the exactly representable range come back as
    // JSON integers, so `1` survives a round trip as `1` rather than `1.0`.
    fn number(n: f64) -> Value {
        const EXACT: f64 = 9_007_199_254_740_992.0;
        if n.fract() == 0.0 && n.abs() <= EXACT {
            Value::from(n as i64)
        } else {
            Number::from_f64(n).map_or(Value::Null, Value::Number)
        }
    }

    impl From<&Key> for Value {
        fn from(k: &Key) -> Self {
            match k {
                Key::Null => Value::Null,
                Key::Bool(b) => Value::Bool(*b),
                Key::Number(n) => number(n.0),
                Key::String(s) => Value::String(s.to_string()),
                Key::Array(items) => Value::Array(items.iter().map(Value::from).collect()),
                Key::Object(props) => Value::Object(
                    props
                        .iter()
                        .map(|(n, v)| (n.clone(), Value::from(v)))
                        .collect::<Map<_, _>>(),
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_equality_ignores_property_order() {
        let a = Key::object([("a", 1), ("b", 2)]);
        let b = Key::object([("b", 2), ("a", 1)]);
        assert_eq!(a, b);
        assert!(!a.ptr_eq(&b));
        assert!(a.ptr_eq(&a.clone()));
    }

    #[test]
    fn array_order_matters_and_arrays_are_not_objects() {
        assert_ne!(Key::array([1, 2]), Key::array([2, 1]));
        assert_ne!(Key::array(["a"]), Key::object([("0", "a")]));
        assert_ne!(Key::array(Vec::<Key>::new()), Key::object(Vec::<(String, Key)>::new()));
    }

    #[test]
    fn numbers_use_same_value_zero() {
        assert_eq!(Key::from(f64::NAN), Key::from(f64::NAN));
        assert_eq!(Key::from(-0.0), Key::from(0.0));
        assert_eq!(Key::from(1), Key::from(1.0));
        assert_ne!(Key::from(1), Key::from("1"));
    }

    #[test]
    fn simple_keys_are_identical_by_value() {
        assert!(Key::from("a").ptr_eq(&Key::from("a")));
        assert!(Key::Null.ptr_eq(&Key::from(None::<i32>)));
        assert!(!Key::Null.ptr_eq(&Key::from(false)));
    }

    #[test]
    fn props_walk_in_canonical_order() {
        let k = Key::object([("b", 2), ("a", 1), ("c", 3)]);
        let names: Vec<_> = k.props().map(|(p, _)| p).collect();
        assert_eq!(
            names,
            vec![PropRef::Name("a"), PropRef::Name("b"), PropRef::Name("c")]
        );

        let k = Key::array(["x", "y"]);
        let steps: Vec<_> = k.props().collect();
        assert_eq!(steps[0], (PropRef::Index(0), &Key::from("x")));
        assert_eq!(steps[1], (PropRef::Index(1), &Key::from("y")));

        assert_eq!(Key::from(3).props().count(), 0);
    }

    #[test]
    fn kind_routes_keys() {
        assert_eq!(Key::Null.kind(), KeyKind::Simple);
        assert_eq!(Key::from("s").kind(), KeyKind::Simple);
        assert_eq!(Key::array([1]).kind(), KeyKind::Array);
        assert_eq!(Key::object([("a", 1)]).kind(), KeyKind::Object);
    }

    #[cfg(feature = "json")]
    #[test]
    fn json_bridge_preserves_structure() {
        let v = serde_json::json!({ "a": 1, "b": { "c": [true, null, "x"] } });
        let k = Key::from(v.clone());
        assert_eq!(
            k,
            Key::object([
                ("a", Key::from(1)),
                (
                    "b",
                    Key::object([("c", Key::array([Key::from(true), Key::Null, Key::from("x")]))]),
                ),
            ])
        );
        assert_eq!(serde_json::Value::from(&k), v);
        assert_eq!(serde_json::Value::from(&Key::from(f64::NAN)), serde_json::Value::Null);
    }
}
