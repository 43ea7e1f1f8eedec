//! Property-based tests for identifier sharding

use glacierdir::entity::EntityId;
use proptest::prelude::*;
use std::path::Path;

fn rgi_id() -> impl Strategy<Value = String> {
    (prop::sample::select(vec!["50", "60", "61"]), 1u32..20, 0u32..100_000)
        .prop_map(|(v, region, n)| format!("RGI{}-{:02}.{:05}", v, region, n))
}

proptest! {
    #[test]
    fn prop_directory_is_a_pure_function_of_id(id in rgi_id()) {
        let root = Path::new("/data/per_glacier");
        let a = EntityId::new(id.clone()).unwrap();
        let b = EntityId::new(id.clone()).unwrap();
        prop_assert_eq!(a.dir_under(root), b.dir_under(root));

        let dir = a.dir_under(root);
        let components: Vec<String> = dir
            .strip_prefix(root)
            .unwrap()
            .iter()
            .map(|c| c.to_string_lossy().to_string())
            .collect();
        prop_assert_eq!(components, vec![id[..8].to_string(), id[..11].to_string(), id.clone()]);
    }

    #[test]
    fn prop_short_ids_are_rejected(id in "[A-Z0-9.-]{0,10}") {
        prop_assert!(EntityId::new(id).is_err());
    }

    #[test]
    fn prop_ids_with_separators_are_rejected(prefix in "RGI60-11\\.[0-9]{1,3}", suffix in "[0-9]{1,3}") {
        let id = format!("{}/{}", prefix, suffix);
        prop_assert!(EntityId::new(id).is_err());
    }
}
