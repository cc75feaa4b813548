//! WebSocket subscription protocol.
//!
//! Messages are JSON-encoded text frames. A client opens the socket,
//! sends `subscribe` for a collection, and then receives `changes`
//! batches until either side closes. The first batch after subscribing
//! is a snapshot of the collection delivered as all-`added` changes.

use serde::{Deserialize, Serialize};

use crate::store::ChangeBatch;

/// A protocol message, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProtocolMessage {
    /// Client -> server: start streaming a collection.
    Subscribe { collection: String },
    /// Server -> client: a batch of document deltas.
    Changes {
        collection: String,
        changes: ChangeBatch,
    },
    /// Server -> client: terminal error.
    Error { message: String },
}

impl ProtocolMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DocumentChange;
    use serde_json::json;

    #[test]
    fn test_subscribe_roundtrip() {
        let msg = ProtocolMessage::Subscribe {
            collection: "smokingAreas".into(),
        };
        let encoded = msg.encode().unwrap();
        assert!(encoded.contains("\"type\":\"subscribe\""));
        assert_eq!(ProtocolMessage::decode(&encoded).unwrap(), msg);
    }

    #[test]
    fn test_changes_roundtrip() {
        let fields = json!({"name": "A"}).as_object().unwrap().clone();
        let msg = ProtocolMessage::Changes {
            collection: "smokingAreas".into(),
            changes: vec![DocumentChange::added("doc-1", fields)],
        };
        let decoded = ProtocolMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_unknown_type_is_error() {
        assert!(ProtocolMessage::decode("{\"type\":\"bogus\"}").is_err());
    }
}
