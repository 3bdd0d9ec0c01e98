//! The permission trie.
//!
//! A [`Node`] is either the root of a permission set or one path
//! component of it. Children are keyed by segment hash; the segment
//! text is kept on the child for dumping. A node carries three
//! declaration flags:
//!
//! - `end_node` — this exact path was explicitly added, as opposed to
//!   a purely structural ancestor. Deletion prunes emptied chains
//!   without erasing an ancestor that was itself a declared leaf.
//! - `wildcard` — a `.*` rule terminated here; it acts as the default
//!   for everything underneath, shadowable by more specific
//!   declarations.
//! - `state` — the polarity (allow/deny) of the declaration.
//!
//! Temporary declarations additionally carry an absolute expiry
//! timestamp and the id of their entry in the [`TimerWheel`]; every
//! path that removes a node kills the timers anchored in it.

use std::fmt::Write as _;

use ahash::AHashMap;
use warden_types::Status;

use crate::fingerprint::Fingerprint;
use crate::timer::{TimerId, TimerWheel};

/// One node of a permission trie.
///
/// The root is always retained, even when the set is empty.
#[derive(Debug, Default)]
pub struct Node {
    children: AHashMap<u64, Node>,
    /// Segment text, empty on the root.
    label: String,
    state: bool,
    wildcard: bool,
    end_node: bool,
    /// 0 = permanent, else absolute expiry in unix seconds.
    timestamp: i64,
    timer: Option<TimerId>,
}

impl Node {
    /// Creates an empty root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn child_of(label: &str) -> Self {
        Self {
            label: label.to_string(),
            ..Self::default()
        }
    }

    /// Resolves a fingerprint against this set.
    ///
    /// Walks one segment at a time, remembering the most recent
    /// wildcard ancestor (the root included). A missed child reports
    /// the last wildcard's polarity, or `PermNotFound` if none was
    /// seen. Reaching the end of the fingerprint reports the current
    /// node's polarity if it is a declared endpoint, otherwise again
    /// the last wildcard's.
    #[must_use]
    pub fn check(&self, fp: &Fingerprint<'_>) -> Status {
        let mut current = self;
        let mut last_wild = self.wildcard.then_some(self);

        for (hash, _) in fp.segments() {
            match current.children.get(hash) {
                Some(child) => {
                    current = child;
                    if current.wildcard {
                        last_wild = Some(current);
                    }
                }
                None => return Self::verdict_of(last_wild),
            }
        }

        if current.end_node {
            polarity(current.state)
        } else {
            Self::verdict_of(last_wild)
        }
    }

    fn verdict_of(last_wild: Option<&Node>) -> Status {
        match last_wild {
            Some(node) => polarity(node.state),
            None => Status::PermNotFound,
        }
    }

    /// Inserts a declaration, creating intermediate nodes as needed.
    ///
    /// Returns a handle to the reached node so the caller can attach
    /// or refresh an expiry timer; `None` for a no-op fingerprint.
    pub fn add(&mut self, fp: &Fingerprint<'_>) -> Option<&mut Node> {
        if fp.is_noop() {
            return None;
        }
        let mut node = self;
        for (hash, label) in fp.segments() {
            node = node
                .children
                .entry(*hash)
                .or_insert_with(|| Self::child_of(label));
        }
        node.state = fp.allow();
        node.wildcard = fp.wildcard();
        node.end_node = true;
        Some(node)
    }

    /// Removes a declaration and prunes emptied chains.
    ///
    /// - A bare `*` resets the whole set: all descendant timers are
    ///   killed, children cleared, and the root flags reset; the root
    ///   itself is preserved.
    /// - A wildcard-terminated path resets the reached node the same
    ///   way, then prunes.
    /// - An exact path erases the reached node (and its subtree,
    ///   timers included) from its parent, then prunes.
    ///
    /// Pruning walks back toward the root erasing every node that
    /// became empty and is not itself a declared endpoint.
    pub fn remove(&mut self, fp: &Fingerprint<'_>, wheel: &TimerWheel) {
        if fp.is_noop() {
            return;
        }
        if fp.is_all() {
            self.kill_all_timers(wheel);
            self.children.clear();
            self.reset_flags();
            return;
        }
        if fp.wildcard() {
            let Some(node) = self.descend_mut(fp.segments()) else {
                return;
            };
            node.kill_all_timers(wheel);
            node.children.clear();
            node.reset_flags();
            self.prune(fp.segments());
        } else {
            let Some((last, prefix)) = fp.segments().split_last() else {
                return;
            };
            let Some(parent) = self.descend_mut(prefix) else {
                return;
            };
            let Some(child) = parent.children.get(&last.0) else {
                return;
            };
            child.kill_all_timers(wheel);
            parent.children.remove(&last.0);
            self.prune(prefix);
        }
    }

    fn reset_flags(&mut self) {
        self.state = false;
        self.wildcard = false;
        self.end_node = false;
        self.timestamp = 0;
        self.timer = None;
    }

    fn descend_mut(&mut self, path: &[(u64, &str)]) -> Option<&mut Node> {
        let mut node = self;
        for (hash, _) in path {
            node = node.children.get_mut(hash)?;
        }
        Some(node)
    }

    /// Erases emptied, undeclared nodes along `path`, deepest first.
    fn prune(&mut self, path: &[(u64, &str)]) {
        let Some((&(hash, _), rest)) = path.split_first() else {
            return;
        };
        if let Some(child) = self.children.get_mut(&hash) {
            child.prune(rest);
            if !child.end_node && child.children.is_empty() {
                self.children.remove(&hash);
            }
        }
    }

    /// Kills the timer anchored here and in every descendant.
    pub fn kill_all_timers(&self, wheel: &TimerWheel) {
        if let Some(id) = self.timer {
            wheel.kill(id);
        }
        for child in self.children.values() {
            child.kill_all_timers(wheel);
        }
    }

    /// Renders every declaration in this set.
    ///
    /// One entry per declared endpoint: `-` prefix on a denial, `.*`
    /// suffix on a wildcard, ` <timestamp>` suffix on a temporary
    /// entry. A wildcard on the root is emitted first as `*` or
    /// `-*`. Order is otherwise unspecified.
    #[must_use]
    pub fn dump(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.wildcard {
            let mut entry = String::from(if self.state { "*" } else { "-*" });
            if self.timestamp > 0 {
                let _ = write!(entry, " {}", self.timestamp);
            }
            out.push(entry);
        }
        for child in self.children.values() {
            child.dump_into(&child.label, &mut out);
        }
        out
    }

    fn dump_into(&self, path: &str, out: &mut Vec<String>) {
        if self.end_node {
            let mut entry = String::new();
            if !self.state {
                entry.push('-');
            }
            entry.push_str(path);
            if self.wildcard {
                entry.push_str(".*");
            }
            if self.timestamp > 0 {
                let _ = write!(entry, " {}", self.timestamp);
            }
            out.push(entry);
        }
        for child in self.children.values() {
            child.dump_into(&format!("{path}.{}", child.label), out);
        }
    }

    /// Shrinks every child map to fit, bottom-up.
    ///
    /// Called once after a bulk load so subsequent lookups hit
    /// optimally sized tables.
    pub fn optimize(&mut self) {
        let mut stack: Vec<&mut Node> = vec![self];
        while let Some(node) = stack.pop() {
            node.children.shrink_to_fit();
            stack.extend(node.children.values_mut());
        }
    }

    /// `true` when the set holds no declarations and no structure.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.children.is_empty() && !self.wildcard && !self.end_node
    }

    /// Expiry timestamp; 0 for a permanent declaration.
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    /// Sets the expiry timestamp.
    pub fn set_timestamp(&mut self, timestamp: i64) {
        self.timestamp = timestamp;
    }

    /// Timer wheel entry driving this declaration's expiry, if any.
    #[must_use]
    pub fn timer(&self) -> Option<TimerId> {
        self.timer
    }

    /// Attaches or clears the expiry timer handle.
    pub fn set_timer(&mut self, timer: Option<TimerId>) {
        self.timer = timer;
    }
}

fn polarity(state: bool) -> Status {
    if state {
        Status::Allow
    } else {
        Status::Disallow
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_with(perms: &[&str]) -> Node {
        let mut node = Node::new();
        for perm in perms {
            node.add(&Fingerprint::parse(perm));
        }
        node
    }

    fn check(node: &Node, perm: &str) -> Status {
        node.check(&Fingerprint::parse(perm))
    }

    fn sorted_dump(node: &Node) -> Vec<String> {
        let mut dump = node.dump();
        dump.sort();
        dump
    }

    // ── check ────────────────────────────────────────────────

    #[test]
    fn exact_match() {
        let node = node_with(&["admin.kick"]);
        assert_eq!(check(&node, "admin.kick"), Status::Allow);
        assert_eq!(check(&node, "admin.ban"), Status::PermNotFound);
    }

    #[test]
    fn denial_polarity() {
        let node = node_with(&["-admin.kick"]);
        assert_eq!(check(&node, "admin.kick"), Status::Disallow);
    }

    #[test]
    fn wildcard_covers_subtree() {
        let node = node_with(&["admin.*"]);
        assert_eq!(check(&node, "admin.kick"), Status::Allow);
        assert_eq!(check(&node, "admin.kick.temp"), Status::Allow);
        assert_eq!(check(&node, "chat.send"), Status::PermNotFound);
    }

    #[test]
    fn wildcard_node_answers_for_its_own_path() {
        let node = node_with(&["admin.*"]);
        assert_eq!(check(&node, "admin"), Status::Allow);
    }

    #[test]
    fn specific_declaration_shadows_wildcard() {
        let node = node_with(&["admin.*", "-admin.root"]);
        assert_eq!(check(&node, "admin.kick"), Status::Allow);
        assert_eq!(check(&node, "admin.root"), Status::Disallow);
    }

    #[test]
    fn miss_below_specific_falls_back_to_last_wildcard() {
        // "admin.root" is an exact declaration, not a wildcard, so a
        // miss underneath it reports the nearest wildcard ancestor.
        let node = node_with(&["admin.*", "-admin.root"]);
        assert_eq!(check(&node, "admin.root.sub"), Status::Allow);
    }

    #[test]
    fn nested_wildcards_most_specific_wins() {
        let node = node_with(&["a.*", "-a.b.*"]);
        assert_eq!(check(&node, "a.x"), Status::Allow);
        assert_eq!(check(&node, "a.b.c"), Status::Disallow);
        assert_eq!(check(&node, "a.b.c.d"), Status::Disallow);
    }

    #[test]
    fn root_wildcard_is_default_for_everything() {
        let node = node_with(&["*"]);
        assert_eq!(check(&node, "anything.at.all"), Status::Allow);

        let node = node_with(&["-*"]);
        assert_eq!(check(&node, "anything"), Status::Disallow);
    }

    #[test]
    fn structural_ancestor_is_not_a_declaration() {
        // Only "a.b" was declared; "a" is structure.
        let node = node_with(&["a.b"]);
        assert_eq!(check(&node, "a"), Status::PermNotFound);
    }

    #[test]
    fn empty_set_finds_nothing() {
        let node = Node::new();
        assert_eq!(check(&node, "anything"), Status::PermNotFound);
    }

    // ── add ──────────────────────────────────────────────────

    #[test]
    fn add_returns_reached_node() {
        let mut node = Node::new();
        let reached = node
            .add(&Fingerprint::parse("vip.badge"))
            .expect("non-noop add");
        reached.set_timestamp(42);
        assert_eq!(
            node.children.values().next().map(|c| c.label.as_str()),
            Some("vip")
        );
    }

    #[test]
    fn add_empty_is_noop() {
        let mut node = Node::new();
        assert!(node.add(&Fingerprint::parse("")).is_none());
        assert!(node.is_empty());
    }

    #[test]
    fn re_add_flips_polarity() {
        let mut node = node_with(&["admin.kick"]);
        assert_eq!(check(&node, "admin.kick"), Status::Allow);
        node.add(&Fingerprint::parse("-admin.kick"));
        assert_eq!(check(&node, "admin.kick"), Status::Disallow);
    }

    // ── remove / prune ───────────────────────────────────────

    #[test]
    fn remove_round_trip_leaves_empty_tree() {
        let wheel = TimerWheel::new();
        let mut node = node_with(&["admin.kick.temp"]);
        node.remove(&Fingerprint::parse("admin.kick.temp"), &wheel);
        assert!(node.is_empty());
        assert!(node.dump().is_empty());
        assert_eq!(check(&node, "admin.kick.temp"), Status::PermNotFound);
    }

    #[test]
    fn prune_stops_at_declared_ancestor() {
        let wheel = TimerWheel::new();
        let mut node = node_with(&["a.b", "a.b.c.d"]);
        node.remove(&Fingerprint::parse("a.b.c.d"), &wheel);
        // "a.b" is still declared; the chain must survive up to it.
        assert_eq!(check(&node, "a.b"), Status::Allow);
        assert_eq!(check(&node, "a.b.c.d"), Status::PermNotFound);
        assert_eq!(sorted_dump(&node), ["a.b"]);
    }

    #[test]
    fn prune_stops_at_ancestor_with_other_children() {
        let wheel = TimerWheel::new();
        let mut node = node_with(&["a.b.c", "a.b.d"]);
        node.remove(&Fingerprint::parse("a.b.c"), &wheel);
        assert_eq!(check(&node, "a.b.d"), Status::Allow);
        assert_eq!(sorted_dump(&node), ["a.b.d"]);
    }

    #[test]
    fn remove_exact_erases_subtree() {
        let wheel = TimerWheel::new();
        let mut node = node_with(&["a.b", "a.b.c"]);
        node.remove(&Fingerprint::parse("a.b"), &wheel);
        assert_eq!(check(&node, "a.b.c"), Status::PermNotFound);
        assert!(node.is_empty());
    }

    #[test]
    fn remove_wildcard_clears_rule_and_subtree() {
        let wheel = TimerWheel::new();
        let mut node = node_with(&["a.*", "a.b.c"]);
        node.remove(&Fingerprint::parse("a.*"), &wheel);
        assert_eq!(check(&node, "a.x"), Status::PermNotFound);
        assert_eq!(check(&node, "a.b.c"), Status::PermNotFound);
        assert!(node.is_empty());
    }

    #[test]
    fn remove_all_resets_root_but_preserves_it() {
        let wheel = TimerWheel::new();
        let mut node = node_with(&["*", "a.b", "-c.d.*"]);
        node.remove(&Fingerprint::parse("*"), &wheel);
        assert!(node.is_empty());
        assert!(node.dump().is_empty());
        assert_eq!(check(&node, "a.b"), Status::PermNotFound);
    }

    #[test]
    fn remove_missing_path_is_noop() {
        let wheel = TimerWheel::new();
        let mut node = node_with(&["a.b"]);
        node.remove(&Fingerprint::parse("a.x.y"), &wheel);
        node.remove(&Fingerprint::parse("z"), &wheel);
        assert_eq!(check(&node, "a.b"), Status::Allow);
    }

    #[test]
    fn remove_kills_anchored_timers() {
        let wheel = TimerWheel::new();
        let mut node = Node::new();
        let reached = node
            .add(&Fingerprint::parse("vip.badge"))
            .expect("non-noop add");
        let id = wheel.create(3600, std::sync::Arc::new(|_, _| {}), false, Vec::new());
        reached.set_timer(Some(id));
        reached.set_timestamp(99);

        assert!(wheel.contains(id));
        node.remove(&Fingerprint::parse("vip.badge"), &wheel);
        assert!(!wheel.contains(id));
    }

    #[test]
    fn remove_subtree_kills_descendant_timers() {
        let wheel = TimerWheel::new();
        let mut node = Node::new();
        node.add(&Fingerprint::parse("vip"));
        let deep = node
            .add(&Fingerprint::parse("vip.badge.gold"))
            .expect("non-noop add");
        let id = wheel.create(3600, std::sync::Arc::new(|_, _| {}), false, Vec::new());
        deep.set_timer(Some(id));

        node.remove(&Fingerprint::parse("vip"), &wheel);
        assert!(!wheel.contains(id));
    }

    // ── dump ─────────────────────────────────────────────────

    #[test]
    fn dump_grammar() {
        let node = node_with(&["admin.kick", "-admin.ban", "vip.*"]);
        assert_eq!(sorted_dump(&node), ["-admin.ban", "admin.kick", "vip.*"]);
    }

    #[test]
    fn dump_root_wildcard_first() {
        let node = node_with(&["-*", "a.b"]);
        let dump = node.dump();
        assert_eq!(dump[0], "-*");
        assert!(dump.contains(&"a.b".to_string()));
    }

    #[test]
    fn dump_temporary_entry_carries_timestamp() {
        let mut node = Node::new();
        let reached = node
            .add(&Fingerprint::parse("vip.badge"))
            .expect("non-noop add");
        reached.set_timestamp(1_735_689_600);
        assert_eq!(node.dump(), ["vip.badge 1735689600"]);
    }

    #[test]
    fn dump_skips_structural_nodes() {
        let node = node_with(&["a.b.c"]);
        assert_eq!(node.dump(), ["a.b.c"]);
    }

    // ── optimize ─────────────────────────────────────────────

    #[test]
    fn optimize_preserves_contents() {
        let mut node = node_with(&["a.b", "-c.*", "d.e.f"]);
        let before = sorted_dump(&node);
        node.optimize();
        assert_eq!(sorted_dump(&node), before);
        assert_eq!(check(&node, "c.x"), Status::Disallow);
    }
}
