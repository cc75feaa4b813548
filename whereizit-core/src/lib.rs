//! Whereizit Core Library
//!
//! Shared types and logic for Whereizit applications: the area domain
//! model, the save-flow draft, and the live marker reconciliation
//! controller.

pub mod category;
pub mod document_id;
pub mod draft;
pub mod models;
pub mod protocol;
pub mod reconcile;
pub mod session;
pub mod store;
pub mod tags;

pub use category::Category;
pub use document_id::derive_document_id;
pub use draft::{AreaDraft, DraftError, DraftMode, DESCRIPTION_PLACEHOLDER};
pub use models::{Area, Report, FALLBACK_REASON, REPORT_REASONS};
pub use protocol::ProtocolMessage;
pub use reconcile::{AreaSync, MapSurface, MarkerHandle, UiEvent};
pub use session::{Principal, Session};
pub use store::{
    ChangeBatch, ChangeKind, DocumentChange, AREAS_COLLECTION, REPORTS_COLLECTION,
};
pub use tags::{is_allowed, vocabulary, TagAxis};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
