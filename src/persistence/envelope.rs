//! Export/import transfer envelope
//!
//! ```json
//! { "exportVersion": 1, "exportedAt": "2024-01-01T00:00:00.000Z",
//!   "schemaVersion": 2, "data": { ...root document... } }
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::validation::{repair_structure, validate_structure};
use crate::consts::*;
use crate::document::ClaimDocument;

/// Why an import file was rejected
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("import file is not valid JSON: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("unsupported export version {found:?} (expected {})", EXPORT_VERSION)]
    UnsupportedVersion { found: Option<Value> },
    #[error("import file has no usable claim data")]
    InvalidData,
}

/// Versioned wrapper around an exported root document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferEnvelope {
    pub export_version: u32,
    /// ISO-8601 UTC export time
    pub exported_at: String,
    pub schema_version: u32,
    pub data: ClaimDocument,
}

impl TransferEnvelope {
    /// Wrap a document for export at `now_ms`
    pub fn wrap(data: ClaimDocument, now_ms: i64) -> Self {
        Self {
            export_version: EXPORT_VERSION,
            exported_at: iso_timestamp(now_ms),
            schema_version: data.schema_version,
            data,
        }
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Check an import envelope and pull out its document
///
/// Shape-valid data with bad deep field types is repaired rather than rejected.
pub fn unwrap_envelope(envelope: Value, now_ms: i64) -> Result<ClaimDocument, EnvelopeError> {
    let Value::Object(mut envelope) = envelope else {
        return Err(EnvelopeError::InvalidData);
    };
    let version = envelope.get("exportVersion");
    if version.and_then(Value::as_u64) != Some(u64::from(EXPORT_VERSION)) {
        return Err(EnvelopeError::UnsupportedVersion {
            found: version.cloned(),
        });
    }
    let data = envelope.remove("data").ok_or(EnvelopeError::InvalidData)?;
    if !validate_structure(&data) {
        return Err(EnvelopeError::InvalidData);
    }
    match serde_json::from_value::<ClaimDocument>(data.clone()) {
        Ok(doc) => Ok(doc),
        Err(e) => {
            log::warn!("Imported claim data needs repair: {}", e);
            Ok(repair_structure(data, now_ms))
        }
    }
}

/// Parse and check an import file
pub fn unwrap_envelope_str(raw: &str, now_ms: i64) -> Result<ClaimDocument, EnvelopeError> {
    unwrap_envelope(serde_json::from_str(raw)?, now_ms)
}

/// Download file name for an export taken at `now_ms`
pub fn export_file_name(now_ms: i64) -> String {
    format!("claim-navigator-claim-export-{now_ms}.json")
}

/// `Date.prototype.toISOString` rendering of an epoch-ms time
pub fn iso_timestamp(now_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(now_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_iso_timestamp_matches_js() {
        assert_eq!(iso_timestamp(1_704_067_200_000), "2024-01-01T00:00:00.000Z");
        assert_eq!(iso_timestamp(1_704_067_200_123), "2024-01-01T00:00:00.123Z");
    }

    #[test]
    fn test_wrap_shape() {
        let envelope = TransferEnvelope::wrap(ClaimDocument::new(0), 1_704_067_200_000);
        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["exportVersion"], json!(1));
        assert_eq!(value["schemaVersion"], json!(2));
        assert_eq!(value["exportedAt"], json!("2024-01-01T00:00:00.000Z"));
        assert!(validate_structure(&value["data"]));
    }

    #[test]
    fn test_unwrap_round_trip() {
        let mut doc = ClaimDocument::new(0);
        doc.timeline.push(json!({"date": "2024-01-01", "event": "Loss reported"}));
        let raw = TransferEnvelope::wrap(doc.clone(), 0).to_json_pretty().unwrap();

        assert_eq!(unwrap_envelope_str(&raw, 0).unwrap(), doc);
    }

    #[test]
    fn test_unwrap_rejects_wrong_version() {
        let err = unwrap_envelope(json!({"exportVersion": 2, "data": {}}), 0).unwrap_err();
        assert!(matches!(err, EnvelopeError::UnsupportedVersion { .. }));

        let data = ClaimDocument::new(0).to_value();
        let err = unwrap_envelope(json!({"data": data}), 0).unwrap_err();
        assert!(matches!(err, EnvelopeError::UnsupportedVersion { found: None }));
    }

    #[test]
    fn test_unwrap_rejects_bad_data() {
        assert!(matches!(
            unwrap_envelope(json!({"exportVersion": 1}), 0),
            Err(EnvelopeError::InvalidData)
        ));
        assert!(matches!(
            unwrap_envelope(json!({"exportVersion": 1, "data": {"profile": {}}}), 0),
            Err(EnvelopeError::InvalidData)
        ));
        assert!(matches!(
            unwrap_envelope_str("{not json", 0),
            Err(EnvelopeError::Malformed(_))
        ));
        assert!(matches!(
            unwrap_envelope(json!([1]), 0),
            Err(EnvelopeError::InvalidData)
        ));
    }

    #[test]
    fn test_unwrap_repairs_deep_types() {
        let mut data = ClaimDocument::new(0).to_value();
        data["evidence"] = json!({"list": ["a", "b"], "count": "two"});
        let doc = unwrap_envelope(json!({"exportVersion": 1, "data": data}), 0).unwrap();
        assert_eq!(doc.evidence.count, 2);
    }

    #[test]
    fn test_export_file_name() {
        assert_eq!(export_file_name(42), "claim-navigator-claim-export-42.json");
    }
}
