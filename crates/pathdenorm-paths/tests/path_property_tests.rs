use pathdenorm_paths::{format_paths, matches, parse_paths, relation_name, retains, Path};
use proptest::prelude::*;

const MAX_PATH_LEN: usize = 6;
const MAX_PATHS: usize = 5;

fn segment_strategy() -> impl Strategy<Value = String> {
    (
        prop::sample::select(vec!["pet", "pets", "owner", "owners", "partner", "self"]),
        prop::option::of(prop::sample::select(vec!["dog", "cat"])),
    )
        .prop_map(|(name, variant)| match variant {
            Some(tag) => format!("{name}({tag})"),
            None => name.to_string(),
        })
}

fn path_strategy() -> impl Strategy<Value = Path> {
    prop::collection::vec(segment_strategy(), 1..=MAX_PATH_LEN).prop_map(Path::from)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn every_prefix_of_an_allowed_path_matches(path in path_strategy()) {
        for len in 0..=path.len() {
            let prefix = Path::from_segments(path.segments()[..len].iter().cloned());
            prop_assert!(matches(&prefix, &path, false));
        }
    }

    #[test]
    fn bare_relation_matches_variant_segment_when_polymorphic(path in path_strategy()) {
        for len in 1..=path.len() {
            let mut segments = path.segments()[..len].to_vec();
            let last = segments.pop().unwrap_or_default();
            segments.push(relation_name(&last).to_string());
            prop_assert!(matches(&Path::from(segments), &path, true));
        }
    }

    #[test]
    fn longer_candidates_never_match(path in path_strategy(), extra in segment_strategy()) {
        let longer = path.child(&extra);
        prop_assert!(!matches(&longer, &path, false));
    }

    #[test]
    fn retention_is_monotone_in_the_allowed_set(
        candidate in path_strategy(),
        small in prop::collection::vec(path_strategy(), 0..=MAX_PATHS),
        more in prop::collection::vec(path_strategy(), 0..=MAX_PATHS),
        polymorphic_last in any::<bool>(),
    ) {
        let mut large = small.clone();
        large.extend(more);
        if retains(&candidate, &small, polymorphic_last) {
            prop_assert!(retains(&candidate, &large, polymorphic_last));
        }
    }

    #[test]
    fn formatted_paths_parse_back(paths in prop::collection::vec(path_strategy(), 1..=MAX_PATHS)) {
        let mut unique: Vec<Path> = Vec::new();
        for path in paths {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }
        let text = format_paths(&unique);
        let parsed = parse_paths(&text).expect("parse formatted paths");
        prop_assert_eq!(parsed, unique);
    }
}
