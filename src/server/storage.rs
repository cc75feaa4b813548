//! Server-side document storage.
//!
//! Stores documents as JSON files, one file per document:
//! ```text
//! <DATA_DIR>/collections/
//!   smokingAreas/
//!     37.123456789_127.123456789.json
//!   reports/
//!     <uuid>.json
//! ```
//!
//! Writes are serialized by the caller; this type only touches the
//! filesystem.

use serde_json::{Map, Value};
use std::fs;
use std::io;
use std::path::PathBuf;

/// Errors that can occur during document storage operations.
#[derive(Debug)]
pub enum DocumentStoreError {
    /// I/O error reading or writing a file.
    IoError(PathBuf, io::Error),
    /// Error parsing or serializing a document.
    JsonError(PathBuf, String),
    /// Invalid collection or document name (e.g., contains path
    /// separators).
    InvalidName(String),
}

impl std::fmt::Display for DocumentStoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DocumentStoreError::IoError(path, e) => {
                write!(f, "I/O error for {}: {}", path.display(), e)
            }
            DocumentStoreError::JsonError(path, e) => {
                write!(f, "Failed to parse document {}: {}", path.display(), e)
            }
            DocumentStoreError::InvalidName(name) => {
                write!(f, "Invalid collection or document name: {}", name)
            }
        }
    }
}

impl std::error::Error for DocumentStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DocumentStoreError::IoError(_, e) => Some(e),
            _ => None,
        }
    }
}

/// On-disk JSON document store.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    data_dir: PathBuf,
}

impl DocumentStore {
    /// Creates a new document store rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Validates a collection or document name to prevent path traversal.
    fn validate_name(name: &str) -> Result<(), DocumentStoreError> {
        if name.is_empty()
            || name.contains('/')
            || name.contains('\\')
            || name.contains("..")
            || name.starts_with('.')
        {
            return Err(DocumentStoreError::InvalidName(name.to_string()));
        }
        Ok(())
    }

    fn collection_dir(&self, collection: &str) -> PathBuf {
        self.data_dir.join("collections").join(collection)
    }

    fn doc_path(&self, collection: &str, document_id: &str) -> PathBuf {
        self.collection_dir(collection)
            .join(format!("{document_id}.json"))
    }

    /// Loads a document's field bag.
    ///
    /// Returns `Ok(None)` if the document doesn't exist.
    pub fn load(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<Map<String, Value>>, DocumentStoreError> {
        Self::validate_name(collection)?;
        Self::validate_name(document_id)?;

        let path = self.doc_path(collection, document_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(DocumentStoreError::IoError(path, e)),
        };

        let value: Value = serde_json::from_str(&contents)
            .map_err(|e| DocumentStoreError::JsonError(path.clone(), e.to_string()))?;
        match value {
            Value::Object(fields) => Ok(Some(fields)),
            _ => Err(DocumentStoreError::JsonError(
                path,
                "document root is not an object".to_string(),
            )),
        }
    }

    /// Creates or replaces a document.
    ///
    /// Returns `true` if the document existed before the write, so the
    /// caller can publish `modified` rather than `added`.
    pub fn upsert(
        &self,
        collection: &str,
        document_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<bool, DocumentStoreError> {
        Self::validate_name(collection)?;
        Self::validate_name(document_id)?;

        let dir = self.collection_dir(collection);
        fs::create_dir_all(&dir).map_err(|e| DocumentStoreError::IoError(dir.clone(), e))?;

        let path = self.doc_path(collection, document_id);
        let existed = path.exists();

        let contents = serde_json::to_string_pretty(&Value::Object(fields.clone()))
            .map_err(|e| DocumentStoreError::JsonError(path.clone(), e.to_string()))?;
        fs::write(&path, contents).map_err(|e| DocumentStoreError::IoError(path, e))?;

        Ok(existed)
    }

    /// Deletes a document.
    ///
    /// Returns the last stored field bag so the caller can publish a
    /// `removed` change carrying it, or `None` if the document did not
    /// exist.
    pub fn delete(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<Map<String, Value>>, DocumentStoreError> {
        let fields = match self.load(collection, document_id)? {
            Some(fields) => fields,
            None => return Ok(None),
        };

        let path = self.doc_path(collection, document_id);
        fs::remove_file(&path).map_err(|e| DocumentStoreError::IoError(path, e))?;
        Ok(Some(fields))
    }

    /// Lists every document in a collection, sorted by document ID.
    ///
    /// A collection that was never written to is empty, not an error.
    pub fn list(
        &self,
        collection: &str,
    ) -> Result<Vec<(String, Map<String, Value>)>, DocumentStoreError> {
        Self::validate_name(collection)?;

        let dir = self.collection_dir(collection);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DocumentStoreError::IoError(dir, e)),
        };

        let mut documents = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DocumentStoreError::IoError(dir.clone(), e))?;
            let name = entry.file_name();
            let Some(document_id) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            // Files this store didn't write (dotfiles, editor droppings)
            // are not documents.
            if Self::validate_name(document_id).is_err() {
                continue;
            }
            if let Some(fields) = self.load(collection, document_id)? {
                documents.push((document_id.to_string(), fields));
            }
        }

        documents.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(documents)
    }

    /// One-shot scoped read: documents whose string field `field` equals
    /// `value`.
    pub fn query_by_field(
        &self,
        collection: &str,
        field: &str,
        value: &str,
    ) -> Result<Vec<(String, Map<String, Value>)>, DocumentStoreError> {
        let documents = self.list(collection)?;
        Ok(documents
            .into_iter()
            .filter(|(_, fields)| {
                fields.get(field).and_then(Value::as_str) == Some(value)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn fields(name: &str, user: &str) -> Map<String, Value> {
        json!({"name": name, "uploadUser": user})
            .as_object()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        assert!(store.load("smokingAreas", "missing").unwrap().is_none());
    }

    #[test]
    fn test_upsert_and_load() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        let existed = store
            .upsert("smokingAreas", "1.0_2.0", &fields("A", "me"))
            .unwrap();
        assert!(!existed);

        let loaded = store.load("smokingAreas", "1.0_2.0").unwrap().unwrap();
        assert_eq!(loaded.get("name"), Some(&Value::String("A".into())));

        let existed = store
            .upsert("smokingAreas", "1.0_2.0", &fields("B", "me"))
            .unwrap();
        assert!(existed);
    }

    #[test]
    fn test_delete_returns_last_fields() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        store
            .upsert("smokingAreas", "1.0_2.0", &fields("A", "me"))
            .unwrap();
        let removed = store.delete("smokingAreas", "1.0_2.0").unwrap().unwrap();
        assert_eq!(removed.get("name"), Some(&Value::String("A".into())));

        assert!(store.delete("smokingAreas", "1.0_2.0").unwrap().is_none());
        assert!(store.load("smokingAreas", "1.0_2.0").unwrap().is_none());
    }

    #[test]
    fn test_list_sorted() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        store.upsert("smokingAreas", "b", &fields("B", "me")).unwrap();
        store.upsert("smokingAreas", "a", &fields("A", "me")).unwrap();

        let docs = store.list("smokingAreas").unwrap();
        let ids: Vec<&str> = docs.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, ["a", "b"]);
    }

    #[test]
    fn test_list_unknown_collection_is_empty() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        assert!(store.list("reports").unwrap().is_empty());
    }

    #[test]
    fn test_query_by_field() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        store.upsert("smokingAreas", "a", &fields("A", "me")).unwrap();
        store.upsert("smokingAreas", "b", &fields("B", "you")).unwrap();

        let mine = store
            .query_by_field("smokingAreas", "uploadUser", "me")
            .unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].0, "a");
    }

    #[test]
    fn test_invalid_names_rejected() {
        let dir = tempdir().unwrap();
        let store = DocumentStore::new(dir.path());

        for bad in ["", "../escape", "a/b", ".hidden"] {
            assert!(store.load(bad, "x").is_err(), "collection {bad:?} accepted");
            assert!(store.load("smokingAreas", bad).is_err(), "id {bad:?} accepted");
        }
    }
}
