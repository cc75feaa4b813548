//! Server-side modules for the Whereizit server.

pub mod blobs;
pub mod hub;
pub mod routes;
pub mod storage;
pub mod users;

pub use blobs::{BlobStore, BlobStoreError};
pub use hub::ChangeHub;
pub use routes::{router, AppState};
pub use storage::{DocumentStore, DocumentStoreError};
pub use users::{Account, AccountStore, AccountStoreError};
