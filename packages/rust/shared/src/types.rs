//! Core domain types for raw and enriched tool records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RecordStatus
// ---------------------------------------------------------------------------

/// Processing status of a raw record.
///
/// The integer encoding (`0`, `1`, `-1`) is the storage contract and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Processed,
    Failed,
}

impl RecordStatus {
    /// Integer code persisted in the `status` column.
    pub fn code(self) -> i64 {
        match self {
            Self::Pending => 0,
            Self::Processed => 1,
            Self::Failed => -1,
        }
    }

    /// Decode a persisted status code.
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Processed),
            -1 => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processed => "processed",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// RawRecord
// ---------------------------------------------------------------------------

/// A tool awaiting enrichment, as produced by the upstream collector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRecord {
    /// Store-assigned identifier (UUID v7).
    pub id: String,
    /// Arbitrary metadata. Name, URL and logo live under one of several legacy keys.
    pub fields: serde_json::Map<String, serde_json::Value>,
    /// Current processing status.
    pub status: RecordStatus,
    /// Diagnostic text, only when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// When the failure was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_at: Option<DateTime<Utc>>,
    /// When the record left `Pending`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    /// When the record was inserted.
    pub created_at: DateTime<Utc>,
}

impl RawRecord {
    /// Look up `key` in the metadata and return it if it is a non-blank string.
    pub fn text_field(&self, key: &str) -> Option<&str> {
        self.fields
            .get(key)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

/// A terminal (or operator-requested) status transition for a raw record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusUpdate {
    /// Enrichment succeeded.
    Processed { at: DateTime<Utc> },
    /// Enrichment failed hard.
    Failed { message: String, at: DateTime<Utc> },
    /// Operator reset; clears error and processing timestamps.
    Pending,
}

impl StatusUpdate {
    pub fn status(&self) -> RecordStatus {
        match self {
            Self::Processed { .. } => RecordStatus::Processed,
            Self::Failed { .. } => RecordStatus::Failed,
            Self::Pending => RecordStatus::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Enriched profile
// ---------------------------------------------------------------------------

/// A named feature with a one-line description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    #[serde(default)]
    pub description: String,
}

/// Pros and cons lists. Either may be empty but the structure is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProsCons {
    #[serde(default)]
    pub pros: Vec<String>,
    #[serde(default)]
    pub cons: Vec<String>,
}

/// The normalized analysis of one tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolProfile {
    /// URL-safe identifier, unique across enriched records once persisted.
    pub slug: String,
    pub name: String,
    pub website: String,
    pub tagline: String,
    pub short_description: String,
    pub company: String,
    /// Long-form description.
    pub description: String,
    pub categories: Vec<String>,
    pub features: Vec<Feature>,
    pub integrations: Vec<String>,
    pub pros_cons: ProsCons,
    pub use_cases: Vec<String>,
}

/// An enriched record before the store assigns it an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEnrichedRecord {
    /// Raw record that produced this result.
    pub original_id: String,
    #[serde(flatten)]
    pub profile: ToolProfile,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
    pub processed_at: DateTime<Utc>,
}

/// A persisted enriched record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    /// Store-assigned identifier (UUID v7), distinct from `original_id`.
    pub id: String,
    #[serde(flatten)]
    pub record: NewEnrichedRecord,
}

// ---------------------------------------------------------------------------
// Reporting
// ---------------------------------------------------------------------------

/// Status counts across both stores.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineStatus {
    pub pending: u64,
    pub processed: u64,
    pub failed: u64,
    pub total_enriched: u64,
}

/// One page of enriched records, newest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedPage {
    pub items: Vec<EnrichedRecord>,
    pub page: u64,
    pub page_size: u64,
    pub total: u64,
    pub total_pages: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_storage_contract() {
        assert_eq!(RecordStatus::Pending.code(), 0);
        assert_eq!(RecordStatus::Processed.code(), 1);
        assert_eq!(RecordStatus::Failed.code(), -1);
        assert_eq!(RecordStatus::from_code(-1), Some(RecordStatus::Failed));
        assert_eq!(RecordStatus::from_code(2), None);
    }

    #[test]
    fn text_field_skips_blank_and_non_string() {
        let fields = serde_json::json!({
            "name": "   ",
            "title": 42,
            "tool_name": "  Linear ",
        });
        let record = RawRecord {
            id: "r1".into(),
            fields: fields.as_object().cloned().unwrap_or_default(),
            status: RecordStatus::Pending,
            error_message: None,
            error_at: None,
            processed_at: None,
            created_at: Utc::now(),
        };
        assert_eq!(record.text_field("name"), None);
        assert_eq!(record.text_field("title"), None);
        assert_eq!(record.text_field("tool_name"), Some("Linear"));
        assert_eq!(record.text_field("missing"), None);
    }

    #[test]
    fn enriched_record_serializes_flat() {
        let record = EnrichedRecord {
            id: "e1".into(),
            record: NewEnrichedRecord {
                original_id: "r1".into(),
                profile: ToolProfile {
                    slug: "linear".into(),
                    name: "Linear".into(),
                    ..Default::default()
                },
                logo: None,
                processed_at: Utc::now(),
            },
        };
        let json = serde_json::to_value(&record).expect("serialize");
        assert_eq!(json["id"], "e1");
        assert_eq!(json["original_id"], "r1");
        assert_eq!(json["slug"], "linear");
        assert!(json["pros_cons"]["pros"].is_array());
        assert!(json.get("logo").is_none());
    }
}
