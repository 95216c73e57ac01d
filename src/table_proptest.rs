#![cfg(test)]

// Property tests for Table kept inside the crate, next to the code they
// check, so they can use a custom hasher without extra plumbing.

use crate::table::{Actual, Table};
use core::hash::{BuildHasher, Hasher};
use proptest::prelude::*;
use std::collections::hash_map::RandomState;
use std::collections::{BTreeSet, HashMap};

// Pool-indexed operations to improve shrinking: indices shrink to earlier keys,
// pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum Op {
    Store(usize, i32),
    Swap(usize, i32),
    Delete(usize),
    LoadAndDelete(usize),
    LoadOrStore(usize, i32),
    Load(usize),
    Contains(String),
    // `None` is compare-and-delete.
    Compare(usize, bool, Option<i32>),
    Range(usize),
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<Op>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let contains_pool = proptest::sample::select(pool.clone());
        let op = prop_oneof![
            4 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Store(i, v)),
            1 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::Swap(i, v)),
            2 => idx.clone().prop_map(Op::Delete),
            2 => idx.clone().prop_map(Op::LoadAndDelete),
            3 => (idx.clone(), any::<i32>()).prop_map(|(i, v)| Op::LoadOrStore(i, v)),
            3 => idx.clone().prop_map(Op::Load),
            1 => prop_oneof![contains_pool, "[a-z]{0,5}"].prop_map(Op::Contains),
            2 => (idx.clone(), any::<bool>(), any::<Option<i32>>())
                .prop_map(|(i, hit, new)| Op::Compare(i, hit, new)),
            1 => (0usize..10).prop_map(Op::Range),
            1 => Just(Op::Clear),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// Runs one scenario against `sut` and a std HashMap model, asserting after
// every step that:
// - load/contains_key parity with the model for the touched key,
// - load_or_store never overwrites and reports `loaded` iff the key existed,
// - load_and_delete/swap return exactly the model's previous value,
// - compare-and-* act only when the expected value matches,
// - range visits each key at most once, and all of them unless stopped,
// - len/is_empty parity with the model.
fn check_against_model<S: BuildHasher>(
    mut sut: Table<i32, S>,
    pool: &[String],
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        match op {
            Op::Store(i, v) => {
                sut.store(pool[i].as_str(), v);
                model.insert(pool[i].clone(), v);
            }
            Op::Swap(i, v) => {
                let prev = sut.swap(pool[i].clone(), v);
                let expected = model.insert(pool[i].clone(), v);
                prop_assert_eq!(prev.as_deref(), expected.as_ref());
            }
            Op::Delete(i) => {
                sut.delete(&pool[i]);
                model.remove(&pool[i]);
                prop_assert!(sut.load(&pool[i]).is_none());
            }
            Op::LoadAndDelete(i) => {
                let got = sut.load_and_delete(&pool[i]);
                let expected = model.remove(&pool[i]);
                prop_assert_eq!(got.as_deref(), expected.as_ref());
                prop_assert!(!sut.contains_key(&pool[i]));
            }
            Op::LoadOrStore(i, v) => {
                let actual = sut.load_or_store(pool[i].as_str(), v);
                match model.get(&pool[i]) {
                    Some(&existing) => {
                        prop_assert!(actual.loaded(), "hit must report loaded");
                        prop_assert_eq!(**actual.value(), existing);
                    }
                    None => {
                        prop_assert!(matches!(actual, Actual::Stored(_)));
                        prop_assert_eq!(**actual.value(), v);
                        model.insert(pool[i].clone(), v);
                    }
                }
            }
            Op::Load(i) => {
                prop_assert_eq!(sut.load(&pool[i]).map(|v| **v), model.get(&pool[i]).copied());
            }
            Op::Contains(s) => {
                prop_assert_eq!(sut.contains_key(&s), model.contains_key(&s));
            }
            Op::Compare(i, hit, new) => {
                let current = model.get(&pool[i]).copied();
                let guess = match current {
                    Some(c) if hit => c,
                    Some(c) => c.wrapping_add(1),
                    None => 0,
                };
                let matched = current == Some(guess);
                match new {
                    Some(v) => {
                        prop_assert_eq!(sut.compare_and_swap(&pool[i], &guess, v), matched);
                        if matched {
                            model.insert(pool[i].clone(), v);
                        }
                    }
                    None => {
                        prop_assert_eq!(sut.compare_and_delete(&pool[i], &guess), matched);
                        if matched {
                            model.remove(&pool[i]);
                        }
                    }
                }
            }
            Op::Range(stop_after) => {
                let mut seen = BTreeSet::new();
                let mut calls = 0usize;
                sut.range(|k, v| {
                    calls += 1;
                    assert!(seen.insert(k.to_string()), "key visited twice");
                    assert_eq!(model.get(k), Some(&**v));
                    calls < stop_after
                });
                let expected = if stop_after == 0 {
                    model.len().min(1)
                } else {
                    model.len().min(stop_after)
                };
                prop_assert_eq!(calls, expected);
            }
            Op::Clear => {
                sut.clear();
                model.clear();
            }
        }

        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
    }

    let s_keys: BTreeSet<String> = sut.iter().map(|(k, _)| k.to_string()).collect();
    let m_keys: BTreeSet<String> = model.keys().cloned().collect();
    prop_assert_eq!(s_keys, m_keys);
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        check_against_model(Table::<i32, RandomState>::new(), &pool, ops)?;
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

// Property: same invariants as above under worst-case collision behavior.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        check_against_model(Table::with_hasher(ConstBuildHasher), &pool, ops)?;
    }
}
