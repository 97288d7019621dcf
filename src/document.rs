//! Root document and its sections
//!
//! Everything the claim assistant persists lives in one [`ClaimDocument`].
//! Unknown keys are carried in `extra` maps so data written by a newer
//! release survives a load/save cycle through this one.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::consts::*;

/// A list section with a derived count (evidence, generated documents)
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IndexedList {
    pub list: Vec<Value>,
    pub count: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl IndexedList {
    /// Recompute `count` from the backing list
    pub fn reindex(&mut self) {
        self.count = self.list.len() as u64;
    }

    /// Whether `count` agrees with the list length
    pub fn is_consistent(&self) -> bool {
        self.count == self.list.len() as u64
    }

    /// Append an entry and keep the count in step
    pub fn push(&mut self, entry: Value) {
        self.list.push(entry);
        self.reindex();
    }
}

/// Claim health section
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSection {
    pub last_score: Option<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Roadmap stage identifier (numeric in current data, named in some older pages)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageId {
    Number(i64),
    Name(String),
}

impl StageId {
    /// Interpret a JSON value as a stage id (integers and strings only)
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(StageId::Number),
            Value::String(s) => Some(StageId::Name(s.clone())),
            _ => None,
        }
    }
}

impl From<i64> for StageId {
    fn from(n: i64) -> Self {
        StageId::Number(n)
    }
}

impl From<&str> for StageId {
    fn from(s: &str) -> Self {
        StageId::Name(s.to_string())
    }
}

/// Roadmap progress section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapSection {
    pub stages_completed: BTreeSet<StageId>,
    pub current_stage: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for RoadmapSection {
    fn default() -> Self {
        Self {
            stages_completed: BTreeSet::new(),
            current_stage: FIRST_STAGE,
            extra: Map::new(),
        }
    }
}

/// The single persisted root document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimDocument {
    pub schema_version: u32,
    /// Last write time (epoch ms), stamped by the store on save
    pub timestamp: i64,
    pub profile: Map<String, Value>,
    pub evidence: IndexedList,
    pub documents: IndexedList,
    pub timeline: Vec<Value>,
    pub health: HealthSection,
    pub roadmap: RoadmapSection,
    /// Top-level keys this release does not know about
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ClaimDocument {
    /// Fresh document for a claim that has never been saved
    pub fn new(now_ms: i64) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            timestamp: now_ms,
            profile: Map::new(),
            evidence: IndexedList::default(),
            documents: IndexedList::default(),
            timeline: Vec::new(),
            health: HealthSection::default(),
            roadmap: RoadmapSection::default(),
            extra: Map::new(),
        }
    }

    /// Recompute every derived count from its backing list
    pub fn reindex(&mut self) {
        self.evidence.reindex();
        self.documents.reindex();
    }

    /// Whether all derived counts agree with their lists
    pub fn counts_consistent(&self) -> bool {
        self.evidence.is_consistent() && self.documents.is_consistent()
    }

    /// Copy out one section
    pub fn section(&self, section: Section) -> SectionValue {
        match section {
            Section::Profile => SectionValue::Profile(self.profile.clone()),
            Section::Evidence => SectionValue::Evidence(self.evidence.clone()),
            Section::Documents => SectionValue::Documents(self.documents.clone()),
            Section::Timeline => SectionValue::Timeline(self.timeline.clone()),
            Section::Health => SectionValue::Health(self.health.clone()),
            Section::Roadmap => SectionValue::Roadmap(self.roadmap.clone()),
        }
    }

    /// Replace one section wholesale
    pub fn set_section(&mut self, value: SectionValue) {
        match value {
            SectionValue::Profile(v) => self.profile = v,
            SectionValue::Evidence(v) => self.evidence = v,
            SectionValue::Documents(v) => self.documents = v,
            SectionValue::Timeline(v) => self.timeline = v,
            SectionValue::Health(v) => self.health = v,
            SectionValue::Roadmap(v) => self.roadmap = v,
        }
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Name rejected at the section boundary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown section `{0}`")]
pub struct UnknownSection(pub String);

/// Known top-level sections of the root document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    Profile,
    Evidence,
    Documents,
    Timeline,
    Health,
    Roadmap,
}

impl Section {
    pub const ALL: [Section; 6] = [
        Section::Profile,
        Section::Evidence,
        Section::Documents,
        Section::Timeline,
        Section::Health,
        Section::Roadmap,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Profile => "profile",
            Section::Evidence => "evidence",
            Section::Documents => "documents",
            Section::Timeline => "timeline",
            Section::Health => "health",
            Section::Roadmap => "roadmap",
        }
    }

    /// Whether `key` names a field the root document shape owns
    pub fn is_reserved_key(key: &str) -> bool {
        key == "schemaVersion" || key == "timestamp" || key.parse::<Section>().is_ok()
    }

    /// Decode a JSON value into this section's type
    pub fn decode(&self, value: Value) -> Result<SectionValue, serde_json::Error> {
        Ok(match self {
            Section::Profile => SectionValue::Profile(serde_json::from_value(value)?),
            Section::Evidence => SectionValue::Evidence(serde_json::from_value(value)?),
            Section::Documents => SectionValue::Documents(serde_json::from_value(value)?),
            Section::Timeline => SectionValue::Timeline(serde_json::from_value(value)?),
            Section::Health => SectionValue::Health(serde_json::from_value(value)?),
            Section::Roadmap => SectionValue::Roadmap(serde_json::from_value(value)?),
        })
    }
}

impl FromStr for Section {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Section::ALL
            .into_iter()
            .find(|section| section.as_str() == s)
            .ok_or_else(|| UnknownSection(s.to_string()))
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed value of one section
#[derive(Debug, Clone, PartialEq)]
pub enum SectionValue {
    Profile(Map<String, Value>),
    Evidence(IndexedList),
    Documents(IndexedList),
    Timeline(Vec<Value>),
    Health(HealthSection),
    Roadmap(RoadmapSection),
}

impl SectionValue {
    pub fn section(&self) -> Section {
        match self {
            SectionValue::Profile(_) => Section::Profile,
            SectionValue::Evidence(_) => Section::Evidence,
            SectionValue::Documents(_) => Section::Documents,
            SectionValue::Timeline(_) => Section::Timeline,
            SectionValue::Health(_) => Section::Health,
            SectionValue::Roadmap(_) => Section::Roadmap,
        }
    }

    pub fn to_value(&self) -> Value {
        let encoded = match self {
            SectionValue::Profile(v) => serde_json::to_value(v),
            SectionValue::Evidence(v) | SectionValue::Documents(v) => serde_json::to_value(v),
            SectionValue::Timeline(v) => serde_json::to_value(v),
            SectionValue::Health(v) => serde_json::to_value(v),
            SectionValue::Roadmap(v) => serde_json::to_value(v),
        };
        encoded.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_document_shape() {
        let doc = ClaimDocument::new(1_700_000_000_000);
        let value = doc.to_value();
        assert_eq!(
            value,
            json!({
                "schemaVersion": 2,
                "timestamp": 1_700_000_000_000_i64,
                "profile": {},
                "evidence": {"list": [], "count": 0},
                "documents": {"list": [], "count": 0},
                "timeline": [],
                "health": {"lastScore": null},
                "roadmap": {"stagesCompleted": [], "currentStage": 1}
            })
        );
    }

    #[test]
    fn test_unknown_keys_survive_decode() {
        let mut value = ClaimDocument::new(0).to_value();
        value["claimNotes"] = json!("keep me");
        value["evidence"]["lastSync"] = json!(42);

        let doc: ClaimDocument = serde_json::from_value(value.clone()).unwrap();
        assert_eq!(doc.extra.get("claimNotes"), Some(&json!("keep me")));
        assert_eq!(doc.evidence.extra.get("lastSync"), Some(&json!(42)));
        assert_eq!(doc.to_value(), value);
    }

    #[test]
    fn test_mixed_stage_ids() {
        let roadmap: RoadmapSection = serde_json::from_value(json!({
            "stagesCompleted": [3, "intake", 1, 3],
            "currentStage": 4
        }))
        .unwrap();
        assert_eq!(roadmap.stages_completed.len(), 3);
        assert!(roadmap.stages_completed.contains(&StageId::from("intake")));
        assert!(roadmap.stages_completed.contains(&StageId::from(1_i64)));
    }

    #[test]
    fn test_section_names() {
        for section in Section::ALL {
            assert_eq!(section.as_str().parse::<Section>(), Ok(section));
        }
        assert_eq!(
            "Profile".parse::<Section>(),
            Err(UnknownSection("Profile".to_string()))
        );
        assert!(Section::is_reserved_key("timestamp"));
        assert!(Section::is_reserved_key("roadmap"));
        assert!(!Section::is_reserved_key("claimNotes"));
    }

    #[test]
    fn test_set_section_replaces_only_that_section() {
        let mut doc = ClaimDocument::new(0);
        let timeline = vec![json!({"date": "2024-01-01", "event": "Loss reported"})];
        doc.set_section(SectionValue::Timeline(timeline.clone()));

        assert_eq!(doc.section(Section::Timeline), SectionValue::Timeline(timeline));
        assert_eq!(doc.section(Section::Profile), SectionValue::Profile(Map::new()));
    }

    #[test]
    fn test_indexed_list_push_keeps_count() {
        let mut evidence = IndexedList::default();
        evidence.push(json!("photo-1.jpg"));
        evidence.push(json!("photo-2.jpg"));
        assert_eq!(evidence.count, 2);
        assert!(evidence.is_consistent());

        evidence.count = 0;
        assert!(!evidence.is_consistent());
        evidence.reindex();
        assert_eq!(evidence.count, 2);
    }

    #[test]
    fn test_section_decode_rejects_wrong_kind() {
        assert!(Section::Timeline.decode(json!({"not": "a list"})).is_err());
        let decoded = Section::Health.decode(json!({"lastScore": 72.5})).unwrap();
        assert_eq!(decoded.section(), Section::Health);
        assert_eq!(decoded.to_value(), json!({"lastScore": 72.5}));
    }
}
