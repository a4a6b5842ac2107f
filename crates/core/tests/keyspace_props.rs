//! Property tests for key layout and id allocation.

use provchain_core::{sequence, EntityKind, EntityStore};
use provchain_ledger::{LedgerStore, MemoryLedger};
use proptest::prelude::*;

fn arb_kind() -> impl Strategy<Value = EntityKind> {
    prop_oneof![
        Just(EntityKind::Good),
        Just(EntityKind::Lot),
        Just(EntityKind::Order),
    ]
}

proptest! {
    /// Every allocated key parses back to its id and lies inside the scan band.
    #[test]
    fn keys_parse_back_and_fall_in_scan_band(kind in arb_kind(), n in 1u64..=u64::MAX / 2) {
        let key = kind.key(n);
        prop_assert_eq!(kind.parse_key(&key), Some(n));
        prop_assert_eq!(EntityKind::of_key(&key), Some(kind));
        let (start, end) = kind.scan_bounds();
        prop_assert!(start.as_str() <= key.as_str() && key.as_str() < end.as_str());
        prop_assert!(kind.sequence_key() >= end.as_str());
    }

    /// Sorting by parsed id gives numeric order whatever the byte order.
    #[test]
    fn parsed_order_is_numeric(ids in prop::collection::btree_set(1u64..100_000, 1..50)) {
        let mut keys: Vec<String> = ids.iter().map(|n| EntityKind::Good.key(*n)).collect();
        keys.sort();
        let mut parsed: Vec<u64> = keys
            .iter()
            .filter_map(|k| EntityKind::Good.parse_key(k))
            .collect();
        parsed.sort_unstable();
        let expected: Vec<u64> = ids.into_iter().collect();
        prop_assert_eq!(parsed, expected);
    }

    /// `n` allocations hand out exactly 1..=n.
    #[test]
    fn allocation_has_no_gaps(kind in arb_kind(), n in 1usize..40) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let allocated = rt.block_on(async {
            let ledger = MemoryLedger::new();
            let mut out = Vec::with_capacity(n);
            for _ in 0..n {
                let mut txn = ledger.begin().await.unwrap();
                let id = sequence::next(&mut EntityStore::new(&ledger, &mut txn), kind)
                    .await
                    .unwrap();
                ledger.commit(txn).await.unwrap();
                out.push(id);
            }
            out
        });
        prop_assert_eq!(allocated, (1..=n as u64).collect::<Vec<_>>());
    }
}
