//! Groups and the group registry.
//!
//! A [`Group`] owns a permission trie, a priority, a cookie map, and
//! an optional parent handle. Groups form a forest: the parent slot
//! holds the parent's registry key (its name hash) rather than a
//! reference, so deletion can never dangle and chain walks go through
//! the [`GroupStore`].
//!
//! Lookups delegate up the parent chain: a group answers with the
//! first decisive verdict found along the chain, and cookie reads
//! fall through the chain the same way. Chain walks carry a visited
//! guard so a corrupt store can never hang a reader; `set_parent`
//! refuses cycles up front.

use ahash::{AHashMap, AHashSet};
use warden_engine::{Fingerprint, Node};
use warden_types::{str_hash, CookieValue, Status};

/// A named, priority-carrying owner of a permission trie.
#[derive(Debug)]
pub struct Group {
    pub(crate) name: String,
    pub(crate) priority: i32,
    /// Registry key (name hash) of the parent, if any.
    pub(crate) parent: Option<u64>,
    pub(crate) nodes: Node,
    pub(crate) cookies: AHashMap<String, CookieValue>,
}

impl Group {
    /// Creates a group and bulk-loads its permission lines.
    #[must_use]
    pub(crate) fn new(name: &str, perms: &[String], priority: i32, parent: Option<u64>) -> Self {
        let mut nodes = Node::new();
        for perm in perms {
            nodes.add(&Fingerprint::parse(perm));
        }
        nodes.optimize();
        Self {
            name: name.to_string(),
            priority,
            parent,
            nodes,
            cookies: AHashMap::new(),
        }
    }

    /// The group's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The group's priority (higher wins immunity tie-breaks).
    #[must_use]
    pub fn priority(&self) -> i32 {
        self.priority
    }
}

/// Registry of all groups, keyed by name hash.
#[derive(Debug, Default)]
pub struct GroupStore {
    groups: AHashMap<u64, Group>,
}

impl GroupStore {
    /// Looks a group up by registry key.
    #[must_use]
    pub fn get(&self, key: u64) -> Option<&Group> {
        self.groups.get(&key)
    }

    pub(crate) fn get_mut(&mut self, key: u64) -> Option<&mut Group> {
        self.groups.get_mut(&key)
    }

    /// Looks a group up by name.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<&Group> {
        self.get(str_hash(name))
    }

    #[must_use]
    pub(crate) fn contains(&self, key: u64) -> bool {
        self.groups.contains_key(&key)
    }

    pub(crate) fn insert(&mut self, key: u64, group: Group) {
        self.groups.insert(key, group);
    }

    pub(crate) fn remove(&mut self, key: u64) -> Option<Group> {
        self.groups.remove(&key)
    }

    /// Number of registered groups.
    #[must_use]
    pub fn len(&self) -> usize {
        self.groups.len()
    }

    /// Returns `true` if no groups are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &Group)> {
        self.groups.iter().map(|(k, g)| (*k, g))
    }

    pub(crate) fn values_mut(&mut self) -> impl Iterator<Item = &mut Group> {
        self.groups.values_mut()
    }

    /// Walks the parent chain starting at `start` (inclusive),
    /// guarding against cycles.
    pub(crate) fn chain(&self, start: u64) -> ChainIter<'_> {
        ChainIter {
            store: self,
            next: Some(start),
            visited: AHashSet::new(),
        }
    }

    /// Resolves a fingerprint along a group's parent chain: the
    /// first decisive verdict wins, `PermNotFound` only if the whole
    /// chain abstains.
    pub(crate) fn check_chain(&self, start: u64, fp: &Fingerprint<'_>) -> Status {
        for (_, group) in self.chain(start) {
            let verdict = group.nodes.check(fp);
            if verdict.is_decisive() {
                return verdict;
            }
        }
        Status::PermNotFound
    }

    /// Resolves a cookie along a group's parent chain.
    pub(crate) fn cookie_chain(&self, start: u64, name: &str) -> Option<&CookieValue> {
        for (_, group) in self.chain(start) {
            if let Some(value) = group.cookies.get(name) {
                return Some(value);
            }
        }
        None
    }

    /// Returns `true` if `target` is `start` or an ancestor of it.
    pub(crate) fn chain_reaches(&self, start: u64, target: u64) -> bool {
        self.chain(start).any(|(key, _)| key == target)
    }

    /// Returns `true` if `target` is a proper ancestor of `start`.
    pub(crate) fn has_ancestor(&self, start: u64, target: u64) -> bool {
        self.chain(start).skip(1).any(|(key, _)| key == target)
    }
}

/// Iterator over a parent chain, cycle-guarded.
pub(crate) struct ChainIter<'a> {
    store: &'a GroupStore,
    next: Option<u64>,
    visited: AHashSet<u64>,
}

impl<'a> Iterator for ChainIter<'a> {
    type Item = (u64, &'a Group);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.next.take()?;
        if !self.visited.insert(key) {
            return None;
        }
        let group = self.store.get(key)?;
        self.next = group.parent;
        Some((key, group))
    }
}
