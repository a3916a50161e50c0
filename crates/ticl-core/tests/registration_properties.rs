//! Property-based tests for the desired-registration store.
//!
//! These verify the set-function invariants that the wire protocol depends
//! on: the digest depends only on membership (never on insertion order or
//! duplicate operations), and add/remove are idempotent.

use proptest::prelude::*;
use ticl_core::digest::Sha256Digest;
use ticl_core::registration_manager::DesiredRegistrationStore;
use ticl_proto::ObjectId;

fn object_id_strategy() -> impl Strategy<Value = ObjectId> {
    (0i32..8, prop::collection::vec(any::<u8>(), 1..12))
        .prop_map(|(source, name)| ObjectId::new(source, name))
}

fn object_ids_strategy() -> impl Strategy<Value = Vec<ObjectId>> {
    prop::collection::vec(object_id_strategy(), 0..20)
}

fn store_with(object_ids: &[ObjectId]) -> DesiredRegistrationStore<Sha256Digest> {
    let mut store = DesiredRegistrationStore::new(Sha256Digest);
    store.add(object_ids);
    store
}

proptest! {
    #[test]
    fn digest_is_a_set_function(object_ids in object_ids_strategy()) {
        let forward = store_with(&object_ids);

        let mut reversed = object_ids.clone();
        reversed.reverse();
        let backward = store_with(&reversed);

        prop_assert_eq!(forward.get_digest(), backward.get_digest());
        prop_assert_eq!(forward.size(), backward.size());
    }

    #[test]
    fn add_is_idempotent(object_ids in object_ids_strategy()) {
        let once = store_with(&object_ids);

        let mut twice = store_with(&object_ids);
        twice.add(&object_ids);

        prop_assert_eq!(once.get_digest(), twice.get_digest());
        prop_assert_eq!(once.size(), twice.size());
    }

    #[test]
    fn remove_is_idempotent(object_ids in object_ids_strategy(), removed in object_ids_strategy()) {
        let mut once = store_with(&object_ids);
        once.remove(&removed);

        let mut twice = store_with(&object_ids);
        twice.remove(&removed);
        twice.remove(&removed);

        prop_assert_eq!(once.get_digest(), twice.get_digest());
        prop_assert_eq!(once.size(), twice.size());
    }

    #[test]
    fn remove_inverts_add(object_ids in object_ids_strategy()) {
        let empty_digest = DesiredRegistrationStore::new(Sha256Digest).get_digest();

        let mut store = store_with(&object_ids);
        store.remove(&object_ids);

        prop_assert_eq!(store.size(), 0);
        prop_assert_eq!(store.get_digest(), empty_digest);
    }

    #[test]
    fn prefix_partition_is_exhaustive(object_ids in object_ids_strategy()) {
        let store = store_with(&object_ids);

        // Two-bit prefixes partition the element space; every stored
        // element appears in exactly one cell.
        let cells: Vec<Vec<ObjectId>> = [0x00u8, 0x40, 0x80, 0xC0]
            .iter()
            .map(|prefix| store.get_elements(&[*prefix], 2))
            .collect();

        let total: usize = cells.iter().map(Vec::len).sum();
        prop_assert_eq!(total, store.size());
    }
}
