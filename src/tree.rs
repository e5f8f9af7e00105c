//! Discrimination forest: routes each composite key to one terminal node
//! per equivalence class.
//!
//! A key is walked one property at a time (array elements by index,
//! object properties by sorted name). Each step follows the edge for the
//! property name into a branch, then picks the child for the property
//! value. Simple values pick a child by identity. Composite values are
//! themselves walked through a nested subtree hanging off the branch; the
//! `next` slot of that walk's terminal node is where the outer walk
//! resumes. Deep equivalence falls out of the recursion.
//!
//! Both `slot` and `next` live outside the edge map, so no property name
//! can collide with them. Nodes are never pruned.

use crate::identity::{Identity, IdentityRef};
use crate::key::{Key, KeyKind, Prop, PropRef};
use hashbrown::HashMap;
use slotmap::SlotMap;

slotmap::new_key_type! {
    pub(crate) struct NodeId;
}

#[derive(Debug)]
struct Node<T> {
    edges: HashMap<Prop, Branch>,
    /// Terminal slot of a top-level key.
    slot: Option<T>,
    /// Continuation after a nested composite value ends here.
    next: Option<NodeId>,
}

impl<T> Default for Node<T> {
    fn default() -> Self {
        Self {
            edges: HashMap::new(),
            slot: None,
            next: None,
        }
    }
}

/// Children of one property edge, keyed by the property value.
#[derive(Debug, Default)]
struct Branch {
    simple: HashMap<Identity, NodeId>,
    arrays: Option<NodeId>,
    objects: Option<NodeId>,
}

impl Branch {
    fn subtree(&self, kind: KeyKind) -> Option<NodeId> {
        match kind {
            KeyKind::Array => self.arrays,
            KeyKind::Object => self.objects,
            KeyKind::Simple => None,
        }
    }

    fn subtree_mut(&mut self, kind: KeyKind) -> Option<&mut Option<NodeId>> {
        match kind {
            KeyKind::Array => Some(&mut self.arrays),
            KeyKind::Object => Some(&mut self.objects),
            KeyKind::Simple => None,
        }
    }
}

pub(crate) struct Forest<T> {
    nodes: SlotMap<NodeId, Node<T>>,
    arrays: NodeId,
    objects: NodeId,
    #[cfg(test)]
    pub(crate) walks: core::cell::Cell<usize>,
}

impl<T: Copy> Forest<T> {
    pub(crate) fn new() -> Self {
        let mut nodes = SlotMap::with_key();
        let arrays = nodes.insert(Node::default());
        let objects = nodes.insert(Node::default());
        Self {
            nodes,
            arrays,
            objects,
            #[cfg(test)]
            walks: core::cell::Cell::new(0),
        }
    }

    fn root(&self, kind: KeyKind) -> Option<NodeId> {
        match kind {
            KeyKind::Array => Some(self.arrays),
            KeyKind::Object => Some(self.objects),
            KeyKind::Simple => None,
        }
    }

    /// Terminal node of `key`, if its whole path exists. `None` for simple keys.
    pub(crate) fn find(&self, key: &Key) -> Option<NodeId> {
        let root = self.root(key.kind())?;
        #[cfg(test)]
        self.walks.set(self.walks.get() + 1);
        self.walk(root, key)
    }

    fn walk(&self, root: NodeId, key: &Key) -> Option<NodeId> {
        let mut node = root;
        for (prop, value) in key.props() {
            node = self.descend(node, prop, value)?;
        }
        Some(node)
    }

    fn descend(&self, node: NodeId, prop: PropRef<'_>, value: &Key) -> Option<NodeId> {
        let branch = self.nodes.get(node)?.edges.get(&prop)?;
        match value.kind() {
            KeyKind::Simple => branch.simple.get(&IdentityRef(value)).copied(),
            kind => {
                let end = self.walk(branch.subtree(kind)?, value)?;
                self.nodes.get(end)?.next
            }
        }
    }

    /// Terminal node of `key`, creating the missing part of its path.
    /// `None` for simple keys.
    pub(crate) fn find_or_insert(&mut self, key: &Key) -> Option<NodeId> {
        let root = self.root(key.kind())?;
        Some(self.walk_or_insert(root, key))
    }

    fn walk_or_insert(&mut self, root: NodeId, key: &Key) -> NodeId {
        let mut node = root;
        for (prop, value) in key.props() {
            node = self.descend_or_insert(node, prop, value);
        }
        node
    }

    fn descend_or_insert(&mut self, node: NodeId, prop: PropRef<'_>, value: &Key) -> NodeId {
        let kind = value.kind();
        let existing = {
            let branch = self.branch_mut(node, prop);
            match kind {
                KeyKind::Simple => branch.simple.get(&IdentityRef(value)).copied(),
                _ => branch.subtree(kind),
            }
        };

        if kind == KeyKind::Simple {
            if let Some(child) = existing {
                return child;
            }
            let child = self.nodes.insert(Node::default());
            self.branch_mut(node, prop)
                .simple
                .insert(Identity(value.clone()), child);
            return child;
        }

        let sub = match existing {
            Some(sub) => sub,
            None => {
                let sub = self.nodes.insert(Node::default());
                if let Some(slot) = self.branch_mut(node, prop).subtree_mut(kind) {
                    *slot = Some(sub);
                }
                sub
            }
        };
        let end = self.walk_or_insert(sub, value);
        match self.nodes[end].next {
            Some(next) => next,
            None => {
                let next = self.nodes.insert(Node::default());
                self.nodes[end].next = Some(next);
                next
            }
        }
    }

    fn branch_mut(&mut self, node: NodeId, prop: PropRef<'_>) -> &mut Branch {
        self.nodes[node].edges.entry_ref(&prop).or_default()
    }

    pub(crate) fn slot(&self, node: NodeId) -> Option<T> {
        self.nodes.get(node).and_then(|n| n.slot)
    }

    /// Replace the terminal slot of `node`, returning the previous content.
    pub(crate) fn set_slot(&mut self, node: NodeId, slot: Option<T>) -> Option<T> {
        let n = self.nodes.get_mut(node)?;
        core::mem::replace(&mut n.slot, slot)
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn clear(&mut self) {
        self.nodes.clear();
        self.arrays = self.nodes.insert(Node::default());
        self.objects = self.nodes.insert(Node::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terminal(f: &mut Forest<u32>, key: &Key) -> NodeId {
        f.find_or_insert(key).expect("composite key")
    }

    #[test]
    fn equivalent_keys_share_a_terminal() {
        let mut f = Forest::<u32>::new();
        let a = terminal(&mut f, &Key::object([("a", Key::from(1)), ("b", Key::object([("c", 2)]))]));
        let b = Key::object([("b", Key::object([("c", 2)])), ("a", Key::from(1))]);
        assert_eq!(f.find(&b), Some(a));
        assert_eq!(terminal(&mut f, &b), a);
    }

    #[test]
    fn different_keys_get_different_terminals() {
        let mut f = Forest::<u32>::new();
        let keys = [
            Key::array(Vec::<Key>::new()),
            Key::object(Vec::<(String, Key)>::new()),
            Key::array(["a"]),
            Key::object([("0", "a")]),
            Key::array([1, 2]),
            Key::array([2, 1]),
            Key::object([("a", 1)]),
            Key::object([("a", "1")]),
            Key::object([("a", Key::array([1]))]),
            Key::object([("a", Key::object([("0", 1)]))]),
            Key::object([("a", Key::array([Key::array([1])]))]),
            Key::object([("a", Key::array([1])), ("b", Key::Null)]),
        ];
        let ends: Vec<NodeId> = keys.iter().map(|k| terminal(&mut f, k)).collect();
        for i in 0..ends.len() {
            for j in (i + 1)..ends.len() {
                assert_ne!(ends[i], ends[j], "{:?} vs {:?}", keys[i], keys[j]);
            }
        }
    }

    #[test]
    fn find_does_not_create_nodes() {
        let mut f = Forest::<u32>::new();
        terminal(&mut f, &Key::object([("a", 1)]));
        let before = f.node_count();
        assert_eq!(f.find(&Key::object([("a", 2)])), None);
        assert_eq!(f.find(&Key::object([("a", 1), ("b", 1)])), None);
        assert_eq!(f.find(&Key::array([1])), None);
        assert_eq!(f.find(&Key::from(1)), None);
        assert_eq!(f.node_count(), before);
    }

    #[test]
    fn property_named_like_a_sentinel_is_just_a_property() {
        let mut f = Forest::<u32>::new();
        let plain = terminal(&mut f, &Key::object(Vec::<(String, Key)>::new()));
        let named = terminal(&mut f, &Key::object([("_ekm_value", 1)]));
        assert_ne!(plain, named);
        f.set_slot(plain, Some(7));
        assert_eq!(f.slot(named), None);
        assert_eq!(f.slot(plain), Some(7));
    }

    #[test]
    fn slots_survive_until_clear() {
        let mut f = Forest::<u32>::new();
        let k = Key::array([Key::object([("x", 1)])]);
        let n = terminal(&mut f, &k);
        assert_eq!(f.set_slot(n, Some(1)), None);
        assert_eq!(f.set_slot(n, None), Some(1));
        assert_eq!(f.find(&k), Some(n), "path is kept after emptying the slot");

        f.clear();
        assert_eq!(f.find(&k), None);
        assert_eq!(f.node_count(), 2);
    }
}
