//! Property-based tests locking the dump grammar and pruning.

use proptest::collection::vec;
use proptest::prelude::*;

use crate::fingerprint::Fingerprint;
use crate::node::Node;
use crate::timer::TimerWheel;
use warden_types::Status;

/// A random permission line within the wire grammar: one to four
/// short segments, optional wildcard tail, optional denial.
fn perm_strategy() -> impl Strategy<Value = String> {
    (
        any::<bool>(),
        vec("[a-d][a-z]{0,2}", 1..=4),
        any::<bool>(),
    )
        .prop_map(|(deny, segments, wildcard)| {
            let mut perm = String::new();
            if deny {
                perm.push('-');
            }
            perm.push_str(&segments.join("."));
            if wildcard {
                perm.push_str(".*");
            }
            perm
        })
}

fn sorted_dump(node: &Node) -> Vec<String> {
    let mut dump = node.dump();
    dump.sort();
    dump
}

proptest! {
    /// Dump output re-parses into an equivalent set: adding the dump
    /// of a trie to a fresh trie dumps the same entries.
    #[test]
    fn dump_readd_fixpoint(perms in vec(perm_strategy(), 0..24)) {
        let mut original = Node::new();
        for perm in &perms {
            original.add(&Fingerprint::parse(perm));
        }
        let dump = sorted_dump(&original);

        let mut reloaded = Node::new();
        for entry in &dump {
            reloaded.add(&Fingerprint::parse(entry));
        }
        prop_assert_eq!(sorted_dump(&reloaded), dump);
    }

    /// Adding a set of permissions and then removing every one of
    /// them, in any order, leaves an empty, fully pruned tree.
    #[test]
    fn add_then_remove_all_prunes_to_empty(
        perms in vec(perm_strategy(), 0..24),
        seed in any::<u64>(),
    ) {
        let wheel = TimerWheel::new();
        let mut node = Node::new();
        for perm in &perms {
            node.add(&Fingerprint::parse(perm));
        }

        // Remove in a seed-shuffled order.
        let mut order: Vec<&String> = perms.iter().collect();
        let len = order.len();
        if len > 1 {
            for i in 0..len {
                order.swap(i, (seed as usize).wrapping_mul(i + 1) % len);
            }
        }
        for perm in order {
            node.remove(&Fingerprint::parse(perm), &wheel);
        }

        prop_assert!(node.is_empty());
        prop_assert!(node.dump().is_empty());
    }

    /// The most recent declaration for an exact path decides its
    /// verdict, regardless of what else was added.
    #[test]
    fn last_exact_declaration_wins(
        perms in vec(perm_strategy(), 0..16),
        path in vec("[a-d][a-z]{0,2}", 1..=4),
        deny in any::<bool>(),
    ) {
        let exact = path.join(".");
        let line = if deny { format!("-{exact}") } else { exact.clone() };

        let mut node = Node::new();
        for perm in &perms {
            node.add(&Fingerprint::parse(perm));
        }
        node.add(&Fingerprint::parse(&line));

        let expected = if deny { Status::Disallow } else { Status::Allow };
        prop_assert_eq!(node.check(&Fingerprint::parse(&exact)), expected);
    }
}
