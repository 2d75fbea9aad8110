//! Property tests for the sorted waitlist.

use proptest::prelude::*;

use loris_engine::waitlist::{TieBreak, Waitlist};

proptest! {
    /// Popping always yields non-increasing keys, regardless of the
    /// insertion order and tie-break policy.
    #[test]
    fn pops_are_sorted_by_descending_key(
        entries in proptest::collection::vec((0usize..64, -20i64..20), 1..40),
        lifo in any::<bool>(),
    ) {
        let tie = if lifo { TieBreak::Lifo } else { TieBreak::Fifo };
        let mut w = Waitlist::new(tie);
        let mut keys = std::collections::HashMap::new();
        for (v, k) in entries {
            if w.add(v, k) {
                keys.insert(v, k);
            }
        }

        let mut last: Option<i64> = None;
        let mut popped = 0usize;
        while let Some(v) = w.pop() {
            let k = keys[&v];
            if let Some(prev) = last {
                prop_assert!(k <= prev, "key {k} after {prev}");
            }
            last = Some(k);
            popped += 1;
        }
        prop_assert_eq!(popped, keys.len());
        prop_assert!(w.is_empty());
    }

    /// Set semantics: membership queries agree with add/remove history.
    #[test]
    fn membership_is_consistent(
        ops in proptest::collection::vec((0usize..16, -5i64..5, any::<bool>()), 0..60),
    ) {
        let mut w = Waitlist::new(TieBreak::Lifo);
        let mut model = std::collections::HashSet::new();
        for (v, k, remove) in ops {
            if remove {
                prop_assert_eq!(w.remove(v), model.remove(&v));
            } else {
                prop_assert_eq!(w.add(v, k), model.insert(v));
            }
            prop_assert_eq!(w.len(), model.len());
            prop_assert_eq!(w.contains(v), model.contains(&v));
        }
    }
}
