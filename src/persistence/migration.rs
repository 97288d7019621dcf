//! Schema migration
//!
//! Version 1 of the app kept each section under its own flat LocalStorage key.
//! Upgrading builds a fresh document, pulls whatever legacy keys exist into
//! it, and carries over keys of the old root document that the current shape
//! does not know. Each legacy key is absorbed independently; a malformed one
//! is skipped without affecting the others.

use serde_json::Value;

use crate::consts::*;
use crate::document::{ClaimDocument, IndexedList, Section, StageId};
use crate::platform::StorageBackend;

pub const LEGACY_PROFILE: &str = "cn_claim_profile";
pub const LEGACY_EVIDENCE_LIST: &str = "cn_evidence_list";
pub const LEGACY_EVIDENCE_COUNT: &str = "cn_evidence_photo_count";
pub const LEGACY_DOCUMENT_LIST: &str = "cn_document_list";
pub const LEGACY_DOCUMENT_COUNT: &str = "cn_docs_generated";
pub const LEGACY_TIMELINE: &str = "cn_claim_timeline";
pub const LEGACY_HEALTH: &str = "cn_claim_health_score";
pub const LEGACY_CURRENT_STAGE: &str = "currentStageId";
pub const LEGACY_COMPLETED_STAGES: &str = "completedStageIds";

/// Every pre-migration key, including roadmap keys that are purged but never migrated
pub const LEGACY_KEYS: [&str; 11] = [
    LEGACY_PROFILE,
    LEGACY_EVIDENCE_LIST,
    LEGACY_EVIDENCE_COUNT,
    LEGACY_DOCUMENT_LIST,
    LEGACY_DOCUMENT_COUNT,
    LEGACY_TIMELINE,
    LEGACY_HEALTH,
    LEGACY_CURRENT_STAGE,
    LEGACY_COMPLETED_STAGES,
    "claimRoadmapProgress",
    "roadmapToolStatus",
];

/// Schema version recorded on a parsed root value (`None` if absent or not an integer)
pub fn schema_version_of(value: &Value) -> Option<u64> {
    value.get("schemaVersion").and_then(Value::as_u64)
}

/// Whether `value` predates the current schema
pub fn is_stale(value: &Value) -> bool {
    schema_version_of(value).is_none_or(|v| v < u64::from(SCHEMA_VERSION))
}

/// Upgrade an old root document, absorbing legacy flat keys from `legacy`
pub fn migrate<B: StorageBackend + ?Sized>(old: &Value, legacy: &B, now_ms: i64) -> ClaimDocument {
    log::info!(
        "Upgrading claim schema from {} to {}",
        schema_version_of(old).unwrap_or(1),
        SCHEMA_VERSION
    );
    let mut doc = ClaimDocument::new(now_ms);

    if let Some(Value::Object(profile)) = read_json(legacy, LEGACY_PROFILE) {
        doc.profile = profile;
    }
    if let Some(evidence) = read_indexed(legacy, LEGACY_EVIDENCE_LIST, LEGACY_EVIDENCE_COUNT) {
        doc.evidence = evidence;
    }
    if let Some(documents) = read_indexed(legacy, LEGACY_DOCUMENT_LIST, LEGACY_DOCUMENT_COUNT) {
        doc.documents = documents;
    }
    if let Some(Value::Array(timeline)) = read_json(legacy, LEGACY_TIMELINE) {
        doc.timeline = timeline;
    }
    if let Some(health) = read_json(legacy, LEGACY_HEALTH) {
        doc.health.last_score = health.get("score").and_then(Value::as_f64);
    }
    if let Some(stage) = read_raw(legacy, LEGACY_CURRENT_STAGE) {
        doc.roadmap.current_stage = parse_int_prefix(&stage)
            .filter(|n| *n != 0)
            .unwrap_or(FIRST_STAGE);
    }
    if let Some(Value::Array(stages)) = read_json(legacy, LEGACY_COMPLETED_STAGES) {
        doc.roadmap.stages_completed = stages.iter().filter_map(StageId::from_json).collect();
    }

    if let Some(root) = old.as_object() {
        for (key, value) in root {
            if !Section::is_reserved_key(key) {
                doc.extra.insert(key.clone(), value.clone());
            }
        }
    }

    doc
}

fn read_raw<B: StorageBackend + ?Sized>(legacy: &B, key: &str) -> Option<String> {
    match legacy.get(key) {
        Ok(value) => value,
        Err(e) => {
            log::warn!("Legacy key {} unreadable: {}", key, e);
            None
        }
    }
}

fn read_json<B: StorageBackend + ?Sized>(legacy: &B, key: &str) -> Option<Value> {
    let raw = read_raw(legacy, key)?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Skipping malformed legacy key {}: {}", key, e);
            None
        }
    }
}

/// Legacy list plus its separately stored counter (counter wins when non-zero)
fn read_indexed<B: StorageBackend + ?Sized>(
    legacy: &B,
    list_key: &str,
    count_key: &str,
) -> Option<IndexedList> {
    let Value::Array(list) = read_json(legacy, list_key)? else {
        log::warn!("Skipping legacy key {}: not a list", list_key);
        return None;
    };
    let count = read_raw(legacy, count_key)
        .and_then(|raw| parse_int_prefix(&raw))
        .and_then(|n| u64::try_from(n).ok())
        .filter(|n| *n != 0)
        .unwrap_or(list.len() as u64);
    Some(IndexedList {
        list,
        count,
        extra: Default::default(),
    })
}

/// Leading decimal integer of `raw`, ignoring surrounding whitespace and any trailing text
fn parse_int_prefix(raw: &str) -> Option<i64> {
    let trimmed = raw.trim_start();
    let sign_len = usize::from(trimmed.starts_with(['-', '+']));
    let digits = trimmed[sign_len..]
        .find(|c: char| !c.is_ascii_digit())
        .map_or(trimmed.len(), |end| end + sign_len);
    trimmed[..digits].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::MemoryBackend;
    use serde_json::json;

    #[test]
    fn test_staleness() {
        assert!(is_stale(&json!({})));
        assert!(is_stale(&json!({"schemaVersion": 1})));
        assert!(is_stale(&json!({"schemaVersion": "2"})));
        assert!(is_stale(&json!("not an object")));
        assert!(!is_stale(&json!({"schemaVersion": 2})));
        assert!(!is_stale(&json!({"schemaVersion": 3})));
    }

    #[test]
    fn test_migrate_without_legacy_keys_is_default() {
        let backend = MemoryBackend::new();
        let doc = migrate(&json!({"schemaVersion": 1}), &backend, 10);
        assert_eq!(doc, ClaimDocument::new(10));
    }

    #[test]
    fn test_migrate_absorbs_legacy_keys() {
        let backend = MemoryBackend::new();
        backend.set(LEGACY_PROFILE, r#"{"name":"Jane Doe","policy":"HO-3"}"#).unwrap();
        backend.set(LEGACY_EVIDENCE_LIST, r#"["roof.jpg","fence.jpg"]"#).unwrap();
        backend.set(LEGACY_EVIDENCE_COUNT, "7").unwrap();
        backend.set(LEGACY_DOCUMENT_LIST, r#"[{"type":"appeal"}]"#).unwrap();
        backend.set(LEGACY_TIMELINE, r#"[{"date":"2024-01-01","event":"Loss reported"}]"#).unwrap();
        backend.set(LEGACY_HEALTH, r#"{"score":64,"grade":"C"}"#).unwrap();
        backend.set(LEGACY_CURRENT_STAGE, "3").unwrap();
        backend.set(LEGACY_COMPLETED_STAGES, "[1,2]").unwrap();

        let doc = migrate(&json!({}), &backend, 0);

        assert_eq!(doc.profile.get("name"), Some(&json!("Jane Doe")));
        assert_eq!(doc.evidence.list.len(), 2);
        assert_eq!(doc.evidence.count, 7);
        assert_eq!(doc.documents.count, 1);
        assert_eq!(doc.timeline[0]["event"], json!("Loss reported"));
        assert_eq!(doc.health.last_score, Some(64.0));
        assert_eq!(doc.roadmap.current_stage, 3);
        assert!(doc.roadmap.stages_completed.contains(&StageId::from(2_i64)));
        assert_eq!(doc.schema_version, SCHEMA_VERSION);
    }

    #[test]
    fn test_malformed_legacy_key_does_not_block_others() {
        let backend = MemoryBackend::new();
        backend.set(LEGACY_PROFILE, "{not json").unwrap();
        backend.set(LEGACY_EVIDENCE_LIST, r#"{"not":"a list"}"#).unwrap();
        backend.set(LEGACY_TIMELINE, r#"[{"event":"Inspection"}]"#).unwrap();
        backend.set(LEGACY_CURRENT_STAGE, "abc").unwrap();

        let doc = migrate(&json!({"schemaVersion": 1}), &backend, 0);
        assert!(doc.profile.is_empty());
        assert!(doc.evidence.list.is_empty());
        assert_eq!(doc.timeline.len(), 1);
        assert_eq!(doc.roadmap.current_stage, FIRST_STAGE);
    }

    #[test]
    fn test_unknown_old_keys_are_carried_over() {
        let backend = MemoryBackend::new();
        let old = json!({
            "schemaVersion": 1,
            "timestamp": 5,
            "profile": {"name": "dropped in favor of legacy keys"},
            "claimNumber": "CLM-881",
            "adjuster": {"name": "R. Smith"}
        });

        let doc = migrate(&old, &backend, 0);
        assert_eq!(doc.extra.get("claimNumber"), Some(&json!("CLM-881")));
        assert_eq!(doc.extra.get("adjuster"), Some(&json!({"name": "R. Smith"})));
        assert!(!doc.extra.contains_key("schemaVersion"));
        assert!(!doc.extra.contains_key("timestamp"));
        assert!(doc.profile.is_empty());
    }

    #[test]
    fn test_parse_int_prefix() {
        assert_eq!(parse_int_prefix("12"), Some(12));
        assert_eq!(parse_int_prefix(" 4 photos"), Some(4));
        assert_eq!(parse_int_prefix("-3"), Some(-3));
        assert_eq!(parse_int_prefix("abc"), None);
        assert_eq!(parse_int_prefix(""), None);
    }
}
