#![cfg(test)]

// Property tests for HashTable kept inside the crate so they can reach
// the structural invariant checker.

use crate::hash_table::HashTable;
use crate::policy::{First, Multi, Policy, Unique};
use core::hash::{BuildHasher, Hasher};
use hashbrown::HashMap;
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

const KEYS: u8 = 8;

type Table<P, S> = HashTable<(u8, i32), First, P, S>;
type Model = HashMap<u8, Vec<i32>>;

#[derive(Clone, Debug)]
enum Op {
    Insert(u8, i32),
    EraseKey(u8),
    EraseFound(u8),
    EraseSpan(usize, usize),
    Rehash(usize),
    Reserve(usize),
    MaxLoad(f32),
    Clear,
}

fn arb_ops() -> impl Strategy<Value = Vec<Op>> {
    let op = prop_oneof![
        8 => (0..KEYS, any::<i32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => (0..KEYS).prop_map(Op::EraseKey),
        2 => (0..KEYS).prop_map(Op::EraseFound),
        1 => (0usize..12, 0usize..5).prop_map(|(s, n)| Op::EraseSpan(s, n)),
        1 => (0usize..48).prop_map(Op::Rehash),
        1 => (0usize..48).prop_map(Op::Reserve),
        1 => prop_oneof![Just(0.5f32), Just(0.75), Just(1.0), Just(4.0)].prop_map(Op::MaxLoad),
        1 => Just(Op::Clear),
    ];
    proptest::collection::vec(op, 1..80)
}

fn take_from_model(model: &mut Model, (k, v): (u8, i32)) -> Result<(), TestCaseError> {
    let run = model.get_mut(&k).ok_or_else(|| TestCaseError::fail("key absent in model"))?;
    let at = run
        .iter()
        .position(|&x| x == v)
        .ok_or_else(|| TestCaseError::fail("value absent in model"))?;
    run.swap_remove(at);
    if run.is_empty() {
        model.remove(&k);
    }
    Ok(())
}

fn sorted_contents<P: Policy, S: BuildHasher>(t: &Table<P, S>) -> Vec<(u8, i32)> {
    let mut v: Vec<(u8, i32)> = t.iter().copied().collect();
    v.sort_unstable();
    v
}

fn check_against_model<P: Policy, S: BuildHasher>(
    t: &Table<P, S>,
    model: &Model,
) -> Result<(), TestCaseError> {
    t.check_invariants().map_err(TestCaseError::fail)?;

    let expected_len: usize = model.values().map(Vec::len).sum();
    prop_assert_eq!(t.len(), expected_len);
    prop_assert_eq!(t.is_empty(), expected_len == 0);

    for k in 0..KEYS {
        let n = model.get(&k).map_or(0, Vec::len);
        prop_assert_eq!(t.count(&k), n);
        prop_assert_eq!(t.contains(&k), n > 0);
        let (first, last) = t.equal_range(&k);
        prop_assert_eq!(first.is_end(), n == 0);
        prop_assert_eq!(t.range(first, last).count(), n);
        prop_assert!(t.range(first, last).all(|(kk, _)| *kk == k));
    }

    let mut want: Vec<(u8, i32)> = model
        .iter()
        .flat_map(|(k, vs)| vs.iter().map(move |v| (*k, *v)))
        .collect();
    want.sort_unstable();
    prop_assert_eq!(sorted_contents(t), want);

    // Every element sits in the bucket its key hashes to, exactly once.
    let mut total = 0;
    for b in 0..t.bucket_count() {
        for (k, _) in t.bucket_iter(b).expect("bucket in range") {
            prop_assert_eq!(t.bucket(k), b);
            total += 1;
        }
    }
    prop_assert_eq!(total, t.len());
    Ok(())
}

fn run_state_machine<P: Policy, S: BuildHasher>(
    mut sut: Table<P, S>,
    ops: Vec<Op>,
) -> Result<(), TestCaseError> {
    let mut model: Model = HashMap::new();

    for op in ops {
        match op {
            Op::Insert(k, v) => {
                let present = model.contains_key(&k);
                let _ = sut.insert((k, v));
                if P::UNIQUE && present {
                    // The first value stays.
                    let kept = *sut.get(&k).expect("key present");
                    prop_assert_eq!(model[&k].as_slice(), &[kept][..]);
                } else {
                    model.entry(k).or_default().push(v);
                    prop_assert!(sut.load_factor() <= sut.max_load_factor());
                }
            }
            Op::EraseKey(k) => {
                let n = model.remove(&k).map_or(0, |vs| vs.len());
                prop_assert_eq!(sut.erase_key(&k), n);
            }
            Op::EraseFound(k) => {
                let pos = sut.find(&k);
                match sut.element(pos).copied() {
                    Some(elem) => {
                        let next = sut.advance(pos);
                        prop_assert_eq!(sut.erase(pos), Ok(next));
                        take_from_model(&mut model, elem)?;
                        prop_assert!(sut.element(pos).is_none());
                    }
                    None => prop_assert!(!model.contains_key(&k)),
                }
            }
            Op::EraseSpan(skip, n) => {
                let order: Vec<(u8, i32)> = sut.iter().copied().collect();
                let skip = skip.min(order.len());
                let n = n.min(order.len() - skip);
                let mut first = sut.begin();
                for _ in 0..skip {
                    first = sut.advance(first);
                }
                let mut last = first;
                for _ in 0..n {
                    last = sut.advance(last);
                }
                prop_assert_eq!(sut.erase_range(first, last), Ok(last));
                for &elem in &order[skip..skip + n] {
                    take_from_model(&mut model, elem)?;
                }
            }
            Op::Rehash(n) => {
                let before = sorted_contents(&sut);
                sut.rehash(n);
                prop_assert!(sut.bucket_count() >= n.max(1));
                prop_assert!(sut.load_factor() <= sut.max_load_factor());
                prop_assert_eq!(sorted_contents(&sut), before);
            }
            Op::Reserve(n) => {
                sut.reserve(n);
                let room = (sut.bucket_count() as f32 * sut.max_load_factor()).floor() as usize;
                prop_assert!(room + 1 >= n);
            }
            Op::MaxLoad(ml) => {
                prop_assert!(sut.set_max_load_factor(ml).is_ok());
            }
            Op::Clear => {
                let buckets = sut.bucket_count();
                sut.clear();
                model.clear();
                prop_assert_eq!(sut.bucket_count(), buckets);
            }
        }
        check_against_model(&sut, &model)?;
    }
    Ok(())
}

// Sends every key to the same bucket.
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

// Property: random insert/erase/rehash interleavings keep the table equal
// to a multiset model and keep every structural invariant intact:
// - the global list reaches each node once with correct back links,
// - each bucket is one run and its anchor precedes that run,
// - equal keys are contiguous (and unique in unique tables),
// - bucket iteration partitions the elements by `hash % bucket_count`,
// - rehash preserves contents and never undershoots the load factor.
proptest! {
    #![proptest_config(ProptestConfig { cases: 96, .. ProptestConfig::default() })]

    #[test]
    fn prop_unique_state_machine(buckets in 1usize..6, ops in arb_ops()) {
        let sut: Table<Unique, _> = HashTable::with_buckets(buckets);
        run_state_machine(sut, ops)?;
    }

    #[test]
    fn prop_multi_state_machine(buckets in 1usize..6, ops in arb_ops()) {
        let sut: Table<Multi, _> = HashTable::with_buckets(buckets);
        run_state_machine(sut, ops)?;
    }

    #[test]
    fn prop_unique_state_machine_with_collisions(ops in arb_ops()) {
        let sut: Table<Unique, ConstBuildHasher> = HashTable::with_buckets_and_hasher(2, ConstBuildHasher);
        run_state_machine(sut, ops)?;
    }

    #[test]
    fn prop_multi_state_machine_with_collisions(ops in arb_ops()) {
        let sut: Table<Multi, ConstBuildHasher> = HashTable::with_buckets_and_hasher(2, ConstBuildHasher);
        run_state_machine(sut, ops)?;
    }
}
