use std::collections::BTreeSet;

use pathdenorm_core::{prune, EntityType, Path, Schema, SubSchema};
use proptest::prelude::*;

fn schema() -> Schema {
    Schema::new(SubSchema::array(SubSchema::entity("people")))
        .define(
            EntityType::new("people")
                .relation("pet", SubSchema::entity("dogs"))
                .relation("partner", SubSchema::entity("people"))
                .relation("self", SubSchema::entity("people")),
        )
        .define(
            EntityType::new("dogs").relation("owners", SubSchema::array(SubSchema::entity("people"))),
        )
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("pet".to_string()),
        Just("partner".to_string()),
        Just("owners".to_string()),
        Just("self".to_string()),
        Just("missing".to_string()),
    ]
}

fn path() -> impl Strategy<Value = Path> {
    proptest::collection::vec(segment(), 0..=5).prop_map(Path::from)
}

fn paths() -> impl Strategy<Value = Vec<Path>> {
    proptest::collection::vec(path(), 0..=4)
}

/// `registry key -> retained relation names` for every registered type.
fn shape(schema: &Schema) -> Vec<(String, BTreeSet<String>)> {
    schema
        .entities()
        .map(|entity| (entity.registry_key(), entity.relations.keys().cloned().collect()))
        .collect()
}

fn is_prefix(prefix: &Path, of: &Path) -> bool {
    prefix.len() <= of.len() && prefix.segments() == &of.segments()[..prefix.len()]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn pruning_is_idempotent(allowed in paths()) {
        let once = prune(&schema(), &allowed).expect("prune");
        let twice = prune(&once.schema, &allowed).expect("prune again");
        prop_assert_eq!(&twice.schema, &once.schema);
        prop_assert_eq!(&twice.aliases, &once.aliases);
    }

    #[test]
    fn more_paths_never_remove_a_relation(small in paths(), extra in paths()) {
        let mut large = small.clone();
        large.extend(extra);

        let narrow: std::collections::BTreeMap<_, _> =
            shape(&prune(&schema(), &small).expect("prune").schema).into_iter().collect();
        let wide: std::collections::BTreeMap<_, _> =
            shape(&prune(&schema(), &large).expect("prune").schema).into_iter().collect();

        for (key, relations) in &narrow {
            let Some(wider) = wide.get(key) else {
                return Err(TestCaseError::fail(format!("`{key}` vanished with more paths")));
            };
            prop_assert!(relations.is_subset(wider), "`{}` lost relations", key);
        }
    }

    #[test]
    fn aliases_only_exist_along_allowed_paths(allowed in paths()) {
        let pruned = prune(&schema(), &allowed).expect("prune");
        for entity in pruned.schema.entities() {
            if let Some(alias) = &entity.alias {
                prop_assert!(
                    allowed.iter().any(|path| is_prefix(alias.path(), path)),
                    "alias `{}` is not on an allowed path",
                    alias
                );
                prop_assert!(alias.path().len() <= 5);
            }
        }
    }
}
