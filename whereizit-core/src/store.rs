//! Change events delivered by the remote document store.
//!
//! A live subscription pushes ordered batches of per-document deltas for
//! the lifetime of its owner. Within one batch, records are processed in
//! the order the store delivered them; no cross-batch ordering is assumed
//! beyond delivery order.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Collection holding all area documents.
pub const AREAS_COLLECTION: &str = "smokingAreas";

/// Collection holding moderation reports.
pub const REPORTS_COLLECTION: &str = "reports";

/// The kind of a document delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Modified,
    Removed,
}

/// A single document delta, carrying the document's full field bag.
///
/// `removed` changes carry the last known field bag so consumers can
/// still parse the record they are dropping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChange {
    pub kind: ChangeKind,
    pub document_id: String,
    pub fields: Map<String, Value>,
}

impl DocumentChange {
    pub fn added(document_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            kind: ChangeKind::Added,
            document_id: document_id.into(),
            fields,
        }
    }

    pub fn modified(document_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            kind: ChangeKind::Modified,
            document_id: document_id.into(),
            fields,
        }
    }

    pub fn removed(document_id: impl Into<String>, fields: Map<String, Value>) -> Self {
        Self {
            kind: ChangeKind::Removed,
            document_id: document_id.into(),
            fields,
        }
    }
}

/// An ordered batch of deltas, as delivered by the store.
pub type ChangeBatch = Vec<DocumentChange>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_kind_wire_format() {
        assert_eq!(serde_json::to_string(&ChangeKind::Added).unwrap(), "\"added\"");
        assert_eq!(
            serde_json::to_string(&ChangeKind::Modified).unwrap(),
            "\"modified\""
        );
        assert_eq!(
            serde_json::to_string(&ChangeKind::Removed).unwrap(),
            "\"removed\""
        );
    }

    #[test]
    fn test_change_roundtrip() {
        let fields = json!({"name": "A"}).as_object().unwrap().clone();
        let change = DocumentChange::added("doc-1", fields);
        let encoded = serde_json::to_string(&change).unwrap();
        let decoded: DocumentChange = serde_json::from_str(&encoded).unwrap();
        assert_eq!(change, decoded);
    }
}
