#![cfg(test)]

// Property tests for OpenTable kept inside the crate so they can call the
// internal probe-invariant checker after every operation.

use crate::{OpenTable, TableError};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;
use std::collections::{BTreeSet, HashMap};
use std::hash::{BuildHasher, Hasher};

// Pool-indexed operations to improve shrinking: indices shrink to earlier
// keys, pool length shrinks, and op lists shrink in length.
#[derive(Clone, Debug)]
enum OpI {
    Put(usize, i32),
    PutOpt(usize, Option<i32>),
    Remove(usize),
    Get(usize),
    GetMut(usize, i32),
    ContainsValue(i32),
    Iterate,
    CursorWalk,
    Clear,
}

fn arb_scenario() -> impl Strategy<Value = (Vec<String>, Vec<OpI>)> {
    proptest::collection::vec("[a-z]{0,5}", 1..=8).prop_flat_map(|pool| {
        let idxs: Vec<usize> = (0..pool.len()).collect();
        let idx = proptest::sample::select(idxs);
        let op = prop_oneof![
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::Put(i, v)),
            (idx.clone(), proptest::option::of(any::<i32>())).prop_map(|(i, v)| OpI::PutOpt(i, v)),
            idx.clone().prop_map(OpI::Remove),
            idx.clone().prop_map(OpI::Get),
            (idx.clone(), any::<i32>()).prop_map(|(i, v)| OpI::GetMut(i, v)),
            any::<i32>().prop_map(OpI::ContainsValue),
            Just(OpI::Iterate),
            Just(OpI::CursorWalk),
            Just(OpI::Clear),
        ];
        proptest::collection::vec(op, 1..60).prop_map(move |ops| (pool.clone(), ops))
    })
}

// State-machine equivalence against std::collections::HashMap. Invariants
// exercised across random operation sequences:
// - put returns the model's previous value; len/is_empty parity after each op.
// - put_opt(None) is rejected and leaves the table untouched.
// - get/get_mut/remove parity through borrowed (&str) lookups.
// - Iteration and an undisturbed cursor walk both yield exactly the model's
//   pairs, each once.
// - The probe invariant (no empty slot inside a probe run, counters match
//   the array) holds after every operation.
fn run_scenario<S: BuildHasher>(
    mut sut: OpenTable<String, i32, S>,
    pool: Vec<String>,
    ops: Vec<OpI>,
) -> Result<(), TestCaseError> {
    let mut model: HashMap<String, i32> = HashMap::new();

    for op in ops {
        match op {
            OpI::Put(i, v) => {
                let k = pool[i].clone();
                let prev = sut.put(k.clone(), v);
                prop_assert_eq!(prev, model.insert(k, v));
            }
            OpI::PutOpt(i, v) => {
                let k = pool[i].clone();
                match v {
                    Some(v) => {
                        let res = sut.put_opt(k.clone(), Some(v));
                        prop_assert_eq!(res, Ok(model.insert(k, v)));
                    }
                    None => {
                        let len_before = sut.len();
                        prop_assert_eq!(sut.put_opt(k, None), Err(TableError::AbsentValue));
                        prop_assert_eq!(sut.len(), len_before);
                    }
                }
            }
            OpI::Remove(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.remove(k.as_str()), model.remove(k));
            }
            OpI::Get(i) => {
                let k = &pool[i];
                prop_assert_eq!(sut.get(k.as_str()), model.get(k));
            }
            OpI::GetMut(i, v) => {
                let k = &pool[i];
                let s = sut.get_mut(k.as_str());
                let m = model.get_mut(k);
                prop_assert_eq!(s.is_some(), m.is_some());
                if let (Some(sv), Some(mv)) = (s, m) {
                    *sv = v;
                    *mv = v;
                }
            }
            OpI::ContainsValue(v) => {
                let has_model = model.values().any(|mv| *mv == v);
                prop_assert_eq!(sut.contains_value(&v), has_model);
            }
            OpI::Iterate => {
                let s_pairs: BTreeSet<(String, i32)> =
                    sut.iter().map(|(k, v)| (k.clone(), *v)).collect();
                let m_pairs: BTreeSet<(String, i32)> =
                    model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(s_pairs, m_pairs);
            }
            OpI::CursorWalk => {
                let mut cur = sut.cursor();
                let mut seen = BTreeSet::new();
                loop {
                    match cur.next(&sut) {
                        Ok(Some((k, v))) => {
                            prop_assert!(seen.insert((k.clone(), *v)), "slot visited twice");
                        }
                        Ok(None) => break,
                        Err(e) => {
                            return Err(TestCaseError::fail(format!(
                                "undisturbed cursor failed: {e}"
                            )))
                        }
                    }
                }
                let expect: BTreeSet<(String, i32)> =
                    model.iter().map(|(k, v)| (k.clone(), *v)).collect();
                prop_assert_eq!(seen, expect);
            }
            OpI::Clear => {
                sut.clear();
                model.clear();
            }
        }

        // Post-conditions after each op.
        prop_assert_eq!(sut.len(), model.len());
        prop_assert_eq!(sut.is_empty(), model.is_empty());
        sut.check_probe_invariant();
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine((pool, ops) in arb_scenario()) {
        run_scenario(OpenTable::new(), pool, ops)?;
    }
}

// Collision variant using a constant hasher to stress probe runs, tombstone
// reuse, and the full-cycle insertion path.
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

proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine_with_collisions((pool, ops) in arb_scenario()) {
        run_scenario(OpenTable::with_hasher(ConstBuildHasher), pool, ops)?;
    }
}
