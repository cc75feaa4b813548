//! Moderation reports filed against areas.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::Area;

/// Canned report reasons offered to the user; a free-form reason is also
/// accepted.
pub const REPORT_REASONS: [&str; 4] = ["잘못된 위치", "잘못된 정보", "중복 등록", "부적절한 사진"];

/// Reason stored when a free-form reason is left empty.
pub const FALLBACK_REASON: &str = "기타";

/// A free-form moderation report, keyed by a store-assigned ID.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(rename = "reportedAreaID")]
    pub reported_area_id: String,
    #[serde(rename = "reportedName")]
    pub reported_name: String,
    #[serde(rename = "reportedBy")]
    pub reported_by: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl Report {
    /// Builds a report against `area`. An empty reason falls back to
    /// [`FALLBACK_REASON`]; an area that never got a document ID is
    /// recorded as `unknown`.
    pub fn new(area: &Area, reported_by: impl Into<String>, reason: impl Into<String>) -> Self {
        let reason = reason.into();
        Self {
            reported_area_id: area
                .document_id
                .clone()
                .unwrap_or_else(|| "unknown".to_string()),
            reported_name: area.name.clone(),
            reported_by: reported_by.into(),
            reason: if reason.is_empty() {
                FALLBACK_REASON.to_string()
            } else {
                reason
            },
            timestamp: Utc::now(),
        }
    }

    /// Serializes into the wire field bag.
    pub fn to_fields(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(bag)) => bag,
            _ => Map::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_from_area() {
        let area = Area::new("이름", "설명", 1.0, 2.0).with_document_id("1.0_2.0");
        let report = Report::new(&area, "me@example.com", "잘못된 위치");
        assert_eq!(report.reported_area_id, "1.0_2.0");
        assert_eq!(report.reported_name, "이름");
        assert_eq!(report.reason, "잘못된 위치");
    }

    #[test]
    fn test_empty_reason_falls_back() {
        let area = Area::new("이름", "설명", 1.0, 2.0);
        let report = Report::new(&area, "me@example.com", "");
        assert_eq!(report.reason, FALLBACK_REASON);
        assert_eq!(report.reported_area_id, "unknown");
    }

    #[test]
    fn test_wire_field_names() {
        let area = Area::new("이름", "설명", 1.0, 2.0).with_document_id("1.0_2.0");
        let bag = Report::new(&area, "me@example.com", "중복 등록").to_fields();
        for field in ["reportedAreaID", "reportedName", "reportedBy", "reason", "timestamp"] {
            assert!(bag.contains_key(field), "missing field {field}");
        }
    }
}
