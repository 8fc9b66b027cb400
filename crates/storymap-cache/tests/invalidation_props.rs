use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use storymap_cache::TaggedCache;

fn entries() -> impl Strategy<Value = Vec<(u8, Vec<u8>)>> {
    prop::collection::vec((0u8..20, prop::collection::vec(0u8..6, 0..4)), 1..30)
}

proptest! {
    #[test]
    fn prop_invalidate_removes_exactly_the_tagged_keys(entries in entries(), victim in 0u8..6) {
        let cache: TaggedCache<u8> = TaggedCache::new(1_000);
        // Last insert per key wins, tags included
        let mut tags_by_key: HashMap<String, HashSet<String>> = HashMap::new();
        for (key, tags) in &entries {
            let key = format!("k{key}");
            let tags: Vec<String> = tags.iter().map(|t| format!("t{t}")).collect();
            tags_by_key.insert(key.clone(), tags.iter().cloned().collect());
            cache.insert(&key, &tags, 0);
        }

        let victim = format!("t{victim}");
        let expected_removed = tags_by_key.values().filter(|tags| tags.contains(&victim)).count();
        prop_assert_eq!(cache.invalidate(&victim), expected_removed);

        for (key, tags) in &tags_by_key {
            prop_assert_eq!(cache.contains(key), !tags.contains(&victim), "{}", key);
        }
        prop_assert!(cache.keys_for_tag(&victim).is_empty());

        // Surviving keys are recorded under exactly their latest tags
        for tag in (0u8..6).map(|t| format!("t{t}")) {
            let mut expected: Vec<String> = tags_by_key
                .iter()
                .filter(|(_, tags)| tags.contains(&tag) && !tags.contains(&victim))
                .map(|(key, _)| key.clone())
                .collect();
            expected.sort();
            prop_assert_eq!(cache.keys_for_tag(&tag), expected, "{}", tag);
        }
    }
}
