//! Convergence properties of the keyed record table

use std::collections::BTreeMap;

use proptest::prelude::*;

use crate::common::{record, TestStore};

#[derive(Debug, Clone)]
enum Op {
    Upsert { slot: usize, size: u64 },
    Delete { slot: usize },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..6, 0u64..10_000).prop_map(|(slot, size)| Op::Upsert { slot, size }),
        1 => (0usize..6).prop_map(|slot| Op::Delete { slot }),
    ]
}

fn slot_path(slot: usize) -> String {
    format!("C:\\prop\\file{}.dat", slot)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever order writes arrive in, the table ends up holding exactly the
    /// last write for each path.
    #[test]
    fn store_converges_to_last_write_per_path(ops in prop::collection::vec(op(), 1..40)) {
        let fixture = TestStore::new();
        let mut expected: BTreeMap<String, u64> = BTreeMap::new();

        for op in &ops {
            match *op {
                Op::Upsert { slot, size } => {
                    fixture.store.upsert(&record(&slot_path(slot), size)).unwrap();
                    expected.insert(slot_path(slot), size);
                }
                Op::Delete { slot } => {
                    fixture.store.delete(&slot_path(slot)).unwrap();
                    expected.remove(&slot_path(slot));
                }
            }
        }

        let actual: BTreeMap<String, u64> = fixture
            .store
            .query("file", 100)
            .unwrap()
            .into_iter()
            .map(|r| (r.path, r.size))
            .collect();
        prop_assert_eq!(actual, expected.clone());
        prop_assert_eq!(fixture.store.count().unwrap(), expected.len() as u64);
    }

    /// Replaying the same upserts twice changes nothing.
    #[test]
    fn repeated_upserts_are_idempotent(sizes in prop::collection::vec(0u64..1_000_000, 1..20)) {
        let fixture = TestStore::new();
        let records: Vec<_> = sizes
            .iter()
            .enumerate()
            .map(|(i, size)| record(&slot_path(i), *size))
            .collect();

        fixture.store.upsert_batch(&records).unwrap();
        let first = fixture.paths();
        fixture.store.upsert_batch(&records).unwrap();

        prop_assert_eq!(fixture.paths(), first);
        prop_assert_eq!(fixture.store.count().unwrap(), records.len() as u64);
    }

    /// `limit` always bounds the row count.
    #[test]
    fn limit_is_respected(count in 0usize..30, limit in 1usize..40) {
        let fixture = TestStore::new();
        let records: Vec<_> = (0..count).map(|i| record(&slot_path(i), 1)).collect();
        fixture.store.upsert_batch(&records).unwrap();

        let substring = fixture.store.query("file", limit).unwrap();
        let glob = fixture.store.query("file*.dat", limit).unwrap();
        prop_assert_eq!(substring.len(), count.min(limit));
        prop_assert_eq!(glob.len(), count.min(limit));
    }
}
