//! Structural validation and repair of the root document
//!
//! Validation is shallow: it checks that every section exists with the right
//! container kind. Repair is total: any JSON value comes out as a usable
//! document, keeping every field that was already valid.

use serde_json::{Map, Value};

use crate::consts::*;
use crate::document::{ClaimDocument, HealthSection, IndexedList, RoadmapSection, StageId};

/// Top-level sections that must be JSON objects
const OBJECT_SECTIONS: [&str; 5] = ["profile", "evidence", "documents", "health", "roadmap"];

/// Check a candidate root document's shape
pub fn validate_structure(value: &Value) -> bool {
    let Some(root) = value.as_object() else {
        return false;
    };
    if !root.get("schemaVersion").is_some_and(Value::is_number) {
        return false;
    }
    if !OBJECT_SECTIONS
        .iter()
        .all(|key| root.get(*key).is_some_and(Value::is_object))
    {
        return false;
    }
    root.get("timeline").is_some_and(Value::is_array)
}

/// Overlay `value` onto a fresh default document
///
/// Wrong-kind fields fall back to their defaults, unknown keys are kept, and
/// both counts are recomputed from their lists.
pub fn repair_structure(value: Value, now_ms: i64) -> ClaimDocument {
    let mut root = match value {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let mut doc = ClaimDocument::new(now_ms);

    if let Some(version) = root
        .remove("schemaVersion")
        .and_then(|v| v.as_u64())
        .and_then(|v| u32::try_from(v).ok())
    {
        doc.schema_version = version;
    }
    if let Some(timestamp) = root.remove("timestamp").and_then(|v| v.as_i64()) {
        doc.timestamp = timestamp;
    }
    if let Some(Value::Object(profile)) = root.remove("profile") {
        doc.profile = profile;
    }
    if let Some(evidence) = root.remove("evidence") {
        doc.evidence = repair_indexed(evidence);
    }
    if let Some(documents) = root.remove("documents") {
        doc.documents = repair_indexed(documents);
    }
    if let Some(Value::Array(timeline)) = root.remove("timeline") {
        doc.timeline = timeline;
    }
    if let Some(health) = root.remove("health") {
        doc.health = repair_health(health);
    }
    if let Some(roadmap) = root.remove("roadmap") {
        doc.roadmap = repair_roadmap(roadmap);
    }

    doc.extra = root;
    doc.reindex();
    doc
}

fn repair_indexed(value: Value) -> IndexedList {
    let Value::Object(mut map) = value else {
        return IndexedList::default();
    };
    let list = match map.remove("list") {
        Some(Value::Array(list)) => list,
        _ => Vec::new(),
    };
    map.remove("count");
    let mut repaired = IndexedList {
        list,
        count: 0,
        extra: map,
    };
    repaired.reindex();
    repaired
}

fn repair_health(value: Value) -> HealthSection {
    let Value::Object(mut map) = value else {
        return HealthSection::default();
    };
    let last_score = map.remove("lastScore").and_then(|v| v.as_f64());
    HealthSection {
        last_score,
        extra: map,
    }
}

fn repair_roadmap(value: Value) -> RoadmapSection {
    let Value::Object(mut map) = value else {
        return RoadmapSection::default();
    };
    let stages_completed = match map.remove("stagesCompleted") {
        Some(Value::Array(stages)) => stages.iter().filter_map(StageId::from_json).collect(),
        _ => Default::default(),
    };
    let current_stage = map
        .remove("currentStage")
        .and_then(|v| v.as_i64())
        .unwrap_or(FIRST_STAGE);
    RoadmapSection {
        stages_completed,
        current_stage,
        extra: map,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn valid_value() -> Value {
        ClaimDocument::new(1_000).to_value()
    }

    #[test]
    fn test_default_document_is_valid() {
        assert!(validate_structure(&valid_value()));
    }

    #[test]
    fn test_validate_rejects_missing_or_wrong_kind() {
        assert!(!validate_structure(&json!(null)));
        assert!(!validate_structure(&json!([1, 2, 3])));

        for key in ["schemaVersion", "profile", "evidence", "documents", "timeline", "health", "roadmap"] {
            let mut value = valid_value();
            value.as_object_mut().unwrap().remove(key);
            assert!(!validate_structure(&value), "missing {key} should be invalid");
        }

        let mut value = valid_value();
        value["timeline"] = json!({});
        assert!(!validate_structure(&value));

        let mut value = valid_value();
        value["profile"] = json!([]);
        assert!(!validate_structure(&value));

        let mut value = valid_value();
        value["schemaVersion"] = json!("2");
        assert!(!validate_structure(&value));
    }

    #[test]
    fn test_validate_ignores_deep_types() {
        let mut value = valid_value();
        value["evidence"] = json!({"list": "not a list", "count": "three"});
        assert!(validate_structure(&value));
    }

    #[test]
    fn test_repair_fills_gaps_and_keeps_valid_fields() {
        let repaired = repair_structure(
            json!({
                "schemaVersion": 2,
                "profile": {"name": "Jane Doe"},
                "timeline": "garbage",
                "roadmap": {"currentStage": 4},
                "adjusterNotes": ["call back"]
            }),
            5_000,
        );

        assert_eq!(repaired.profile.get("name"), Some(&json!("Jane Doe")));
        assert!(repaired.timeline.is_empty());
        assert_eq!(repaired.roadmap.current_stage, 4);
        assert!(repaired.roadmap.stages_completed.is_empty());
        assert_eq!(repaired.health.last_score, None);
        assert_eq!(repaired.timestamp, 5_000);
        assert_eq!(repaired.extra.get("adjusterNotes"), Some(&json!(["call back"])));
    }

    #[test]
    fn test_repair_recomputes_counts() {
        let repaired = repair_structure(
            json!({
                "evidence": {"list": ["a", "b", "c"], "count": 0, "sortBy": "date"},
                "documents": {"list": "oops", "count": 9}
            }),
            0,
        );
        assert_eq!(repaired.evidence.count, 3);
        assert_eq!(repaired.evidence.extra.get("sortBy"), Some(&json!("date")));
        assert_eq!(repaired.documents.count, 0);
        assert!(repaired.documents.list.is_empty());
    }

    #[test]
    fn test_repair_non_object_yields_default() {
        let repaired = repair_structure(json!("{bad json"), 42);
        assert_eq!(repaired, ClaimDocument::new(42));
    }

    #[test]
    fn test_repair_filters_unusable_stage_ids() {
        let repaired = repair_structure(
            json!({"roadmap": {"stagesCompleted": [1, "appraisal", 2.5, null, {"id": 3}]}}),
            0,
        );
        let stages: Vec<_> = repaired.roadmap.stages_completed.into_iter().collect();
        assert_eq!(stages, vec![StageId::from(1_i64), StageId::from("appraisal")]);
    }

    fn arb_json() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z]{0,6}".prop_map(Value::String),
        ];
        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::vec(
                    (
                        prop_oneof![
                            Just("schemaVersion".to_string()),
                            Just("profile".to_string()),
                            Just("evidence".to_string()),
                            Just("list".to_string()),
                            Just("count".to_string()),
                            Just("timeline".to_string()),
                            Just("health".to_string()),
                            Just("roadmap".to_string()),
                            "[a-z]{1,5}",
                        ],
                        inner
                    ),
                    0..5
                )
                .prop_map(|pairs| Value::Object(pairs.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn prop_repair_always_validates(value in arb_json()) {
            let repaired = repair_structure(value, 7);
            prop_assert!(validate_structure(&repaired.to_value()));
            prop_assert!(repaired.counts_consistent());
        }

        #[test]
        fn prop_repair_is_idempotent(value in arb_json()) {
            let once = repair_structure(value, 7);
            let twice = repair_structure(once.to_value(), 99);
            prop_assert_eq!(once, twice);
        }
    }
}
