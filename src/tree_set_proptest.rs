#![cfg(test)]

// Structural property tests for TreeSet kept inside the crate so they can
// check parent links and arena bookkeeping directly.

use crate::tree_set::{Position, TreeSet};
use proptest::prelude::*;
use std::collections::BTreeSet;

#[derive(Clone, Debug)]
enum Op {
    Insert(u8),
    InsertHintAtLowerBound(u8),
    InsertHintAt(u8, u8),
    Remove(u8),
    RemoveAtLowerBound(u8),
    PopFirst,
    PopLast,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => any::<u8>().prop_map(Op::Insert),
        2 => any::<u8>().prop_map(Op::InsertHintAtLowerBound),
        1 => (any::<u8>(), any::<u8>()).prop_map(|(h, v)| Op::InsertHintAt(h, v)),
        2 => any::<u8>().prop_map(Op::Remove),
        1 => any::<u8>().prop_map(Op::RemoveAtLowerBound),
        1 => Just(Op::PopFirst),
        1 => Just(Op::PopLast),
    ]
}

// Property: TreeSet against BTreeSet.
// - After every op the tree's parent links are consistent, every arena node
//   is reachable and the in-order sequence is strictly ascending.
// - Insert/remove results (inserted flag, returned value, successor
//   position) match the model.
// - Walking successor/predecessor from either end visits the model in order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_structure_matches_model(ops in proptest::collection::vec(arb_op(), 1..120)) {
        let mut sut: TreeSet<u8> = TreeSet::new();
        let mut model: BTreeSet<u8> = BTreeSet::new();

        for op in ops {
            match op {
                Op::Insert(v) => {
                    let (pos, inserted) = sut.insert(v);
                    prop_assert_eq!(inserted, model.insert(v));
                    prop_assert_eq!(sut.get_at(pos), Some(&v));
                }
                Op::InsertHintAtLowerBound(v) => {
                    let hint = sut.lower_bound(&v);
                    let (pos, inserted) = sut.insert_hint(hint, v);
                    prop_assert_eq!(inserted, model.insert(v));
                    prop_assert_eq!(sut.get_at(pos), Some(&v));
                }
                Op::InsertHintAt(h, v) => {
                    // Arbitrary, usually wrong, hint.
                    let hint = sut.find(&h).unwrap_or(Position::END);
                    let (pos, inserted) = sut.insert_hint(hint, v);
                    prop_assert_eq!(inserted, model.insert(v));
                    prop_assert_eq!(sut.get_at(pos), Some(&v));
                }
                Op::Remove(v) => {
                    prop_assert_eq!(sut.remove(&v), model.take(&v));
                }
                Op::RemoveAtLowerBound(v) => {
                    let pos = sut.lower_bound(&v);
                    let expected = model.range(v..).next().copied();
                    match sut.remove_at(pos) {
                        Some((got, next)) => {
                            prop_assert_eq!(Some(got), expected);
                            model.remove(&got);
                            let after = model.range(got..).next();
                            prop_assert_eq!(sut.get_at(next), after);
                        }
                        None => prop_assert!(expected.is_none()),
                    }
                }
                Op::PopFirst => prop_assert_eq!(sut.pop_first(), model.pop_first()),
                Op::PopLast => prop_assert_eq!(sut.pop_last(), model.pop_last()),
            }

            sut.assert_structure();
            prop_assert_eq!(sut.len(), model.len());

            let mut forward = Vec::new();
            let mut pos = sut.begin();
            while let Some(v) = sut.get_at(pos) {
                forward.push(*v);
                pos = sut.successor(pos);
            }
            prop_assert!(forward.iter().eq(model.iter()));

            let mut backward = Vec::new();
            let mut pos = sut.predecessor(sut.end());
            while let Some(v) = sut.get_at(pos) {
                backward.push(*v);
                pos = sut.predecessor(pos);
            }
            prop_assert!(backward.iter().eq(model.iter().rev()));
        }
    }
}

// Property: bounds agree with BTreeSet ranges for every key.
proptest! {
    #[test]
    fn prop_bounds_match_ranges(keys in proptest::collection::vec(0u8..64, 0..40), key in 0u8..70) {
        let sut: TreeSet<u8> = keys.iter().copied().collect();
        let model: BTreeSet<u8> = keys.into_iter().collect();

        prop_assert_eq!(sut.get_at(sut.lower_bound(&key)), model.range(key..).next());
        let above = model.range((std::ops::Bound::Excluded(key), std::ops::Bound::Unbounded)).next();
        prop_assert_eq!(sut.get_at(sut.upper_bound(&key)), above);
        prop_assert_eq!(sut.contains(&key), model.contains(&key));
        prop_assert!(sut.iter().rev().eq(model.iter().rev()));
        prop_assert_eq!(sut.clone().into_iter().collect::<Vec<_>>(), model.into_iter().collect::<Vec<_>>());
    }
}
