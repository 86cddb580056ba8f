//! Property-Based Tests for relation labels and the `/relations` wire format

use procura_core::{
    humanize_relation_type, normalize_relation_groups, Entity, RelationDirection, RelationGroup,
    SchemaId,
};
use proptest::prelude::*;

fn relation_type_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{1,8}(_[A-Z]{1,8}){0,3}"
}

fn direction_strategy() -> impl Strategy<Value = RelationDirection> {
    prop_oneof![Just(RelationDirection::Outgoing), Just(RelationDirection::Incoming)]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Humanized labels have no underscores, one word per identifier segment,
    /// and every word starts with an uppercase letter.
    #[test]
    fn prop_humanized_labels_are_title_cased(relation_type in relation_type_strategy()) {
        let label = humanize_relation_type(&relation_type);
        prop_assert!(!label.contains('_'));
        prop_assert_eq!(label.split(' ').count(), relation_type.split('_').count());
        for word in label.split(' ') {
            let first = word.chars().next();
            prop_assert!(first.map(|c| c.is_uppercase()).unwrap_or(false));
            prop_assert!(word.chars().skip(1).all(|c| c.is_lowercase()));
        }
    }

    /// Groups survive the wire untouched, bare or wrapped in `data`.
    #[test]
    fn prop_relation_groups_survive_the_wire(
        relation_type in relation_type_strategy(),
        direction in direction_strategy(),
        ids in prop::collection::vec("[A-Z]{2}-[0-9]{1,4}", 0..6),
    ) {
        let group = RelationGroup {
            schema: SchemaId::new("line_items"),
            direction,
            relation_type,
            data: ids.iter().map(|id| Entity::new(id.as_str())).collect(),
        };
        let bare = serde_json::to_value(vec![group.clone()]).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let wrapped = serde_json::json!({ "data": bare.clone() });

        let from_bare = normalize_relation_groups(bare).map_err(|e| TestCaseError::fail(e.to_string()))?;
        let from_wrapped = normalize_relation_groups(wrapped).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(&from_bare, &vec![group]);
        prop_assert_eq!(from_bare, from_wrapped);
    }
}
