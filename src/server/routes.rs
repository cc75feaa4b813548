//! HTTP and WebSocket handlers.

use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, Request, State, WebSocketUpgrade,
    },
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{any, get, post},
    Extension, Json, Router,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;

use whereizit_core::{DocumentChange, Principal, ProtocolMessage};

use super::blobs::BlobStore;
use super::hub::ChangeHub;
use super::storage::DocumentStore;
use super::users::{AccountStore, AccountStoreError};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Document store; writes are serialized through the mutex so the
    /// existed-before check and the write publish a consistent change
    /// kind.
    pub documents: Arc<Mutex<DocumentStore>>,
    pub hub: Arc<ChangeHub>,
    pub accounts: Arc<RwLock<AccountStore>>,
    pub blobs: Arc<BlobStore>,
}

/// Raw API key of the authenticated request, alongside its principal.
#[derive(Debug, Clone)]
pub struct ApiKey(pub String);

/// Error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

fn error_response(status: StatusCode, error: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error,
            message: message.into(),
        }),
    )
        .into_response()
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/users", post(register))
        .route("/ws", any(ws_handler));

    let protected_routes = Router::new()
        .route("/me", get(me).delete(delete_me))
        .route(
            "/collections/{collection}/documents",
            get(list_documents).post(create_document),
        )
        .route(
            "/collections/{collection}/documents/{id}",
            get(get_document).put(put_document).delete(delete_document),
        )
        .route("/blobs", post(upload_blob))
        .route("/blobs/{name}", get(get_blob).delete(delete_blob))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

/// Authentication middleware: resolves `Authorization: Bearer <key>` to a
/// [`Principal`] in the request extensions.
async fn auth_middleware(State(state): State<AppState>, mut request: Request, next: Next) -> Response {
    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let api_key = match auth_header {
        Some(h) if h.starts_with("Bearer ") => h[7..].to_string(),
        Some(_) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "invalid_auth",
                "Authorization header must use Bearer scheme",
            );
        }
        None => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "missing_auth",
                "Authorization header required",
            );
        }
    };

    let principal = state
        .accounts
        .read()
        .expect("account store lock poisoned")
        .authenticate(&api_key);

    match principal {
        Some(principal) => {
            request.extensions_mut().insert(principal);
            request.extensions_mut().insert(ApiKey(api_key));
            next.run(request).await
        }
        None => error_response(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key"),
    }
}

// ============================================================================
// Identity
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Serialize)]
struct RegisterResponse {
    principal: Principal,
    api_key: String,
}

async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Response {
    if request.email.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "invalid_email", "email is required");
    }

    let result = state
        .accounts
        .write()
        .expect("account store lock poisoned")
        .register(&request.email, request.display_name);

    match result {
        Ok((principal, api_key)) => (
            StatusCode::CREATED,
            Json(RegisterResponse { principal, api_key }),
        )
            .into_response(),
        Err(AccountStoreError::EmailTaken(email)) => error_response(
            StatusCode::CONFLICT,
            "email_taken",
            format!("An account already exists for {email}"),
        ),
        Err(e) => {
            tracing::error!("failed to register account: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                e.to_string(),
            )
        }
    }
}

async fn me(Extension(principal): Extension<Principal>) -> Json<Principal> {
    Json(principal)
}

async fn delete_me(State(state): State<AppState>, Extension(key): Extension<ApiKey>) -> Response {
    let result = state
        .accounts
        .write()
        .expect("account store lock poisoned")
        .delete(&key.0);

    match result {
        // The account's areas stay in the store.
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => {
            tracing::error!("failed to delete account: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                e.to_string(),
            )
        }
    }
}

// ============================================================================
// Documents
// ============================================================================

#[derive(Serialize)]
struct DocumentEnvelope {
    id: String,
    fields: Map<String, Value>,
}

#[derive(Serialize)]
struct ListResponse {
    documents: Vec<DocumentEnvelope>,
}

async fn list_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let documents = state.documents.lock().await;
    let result = match params.get("uploadUser") {
        Some(email) => documents.query_by_field(&collection, "uploadUser", email),
        None => documents.list(&collection),
    };

    match result {
        Ok(documents) => Json(ListResponse {
            documents: documents
                .into_iter()
                .map(|(id, fields)| DocumentEnvelope { id, fields })
                .collect(),
        })
        .into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, "storage_error", e.to_string()),
    }
}

async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    match state.documents.lock().await.load(&collection, &id) {
        Ok(Some(fields)) => Json(DocumentEnvelope { id, fields }).into_response(),
        Ok(None) => error_response(StatusCode::NOT_FOUND, "not_found", "No such document"),
        Err(e) => error_response(StatusCode::BAD_REQUEST, "storage_error", e.to_string()),
    }
}

async fn put_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(fields): Json<Map<String, Value>>,
) -> Response {
    let existed = {
        let documents = state.documents.lock().await;
        match documents.upsert(&collection, &id, &fields) {
            Ok(existed) => existed,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, "storage_error", e.to_string())
            }
        }
    };

    let change = if existed {
        DocumentChange::modified(&id, fields)
    } else {
        DocumentChange::added(&id, fields)
    };
    state.hub.publish(&collection, change).await;

    StatusCode::NO_CONTENT.into_response()
}

#[derive(Serialize)]
struct CreatedResponse {
    id: String,
}

async fn create_document(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(fields): Json<Map<String, Value>>,
) -> Response {
    let id = uuid::Uuid::new_v4().to_string();

    {
        let documents = state.documents.lock().await;
        if let Err(e) = documents.upsert(&collection, &id, &fields) {
            return error_response(StatusCode::BAD_REQUEST, "storage_error", e.to_string());
        }
    }

    state
        .hub
        .publish(&collection, DocumentChange::added(&id, fields))
        .await;

    (StatusCode::CREATED, Json(CreatedResponse { id })).into_response()
}

async fn delete_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Response {
    let removed = {
        let documents = state.documents.lock().await;
        match documents.delete(&collection, &id) {
            Ok(removed) => removed,
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, "storage_error", e.to_string())
            }
        }
    };

    match removed {
        Some(fields) => {
            state
                .hub
                .publish(&collection, DocumentChange::removed(&id, fields))
                .await;
            StatusCode::NO_CONTENT.into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "not_found", "No such document"),
    }
}

// ============================================================================
// Blobs
// ============================================================================

#[derive(Deserialize)]
struct UploadRequest {
    /// Base64-encoded bytes.
    data: String,
}

#[derive(Serialize)]
struct UploadResponse {
    url: String,
}

async fn upload_blob(
    State(state): State<AppState>,
    Json(request): Json<UploadRequest>,
) -> Response {
    use base64::{engine::general_purpose::STANDARD, Engine};

    let bytes = match STANDARD.decode(&request.data) {
        Ok(bytes) => bytes,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                "invalid_payload",
                format!("data is not valid base64: {e}"),
            )
        }
    };

    match state.blobs.store(&bytes) {
        Ok(url) => Json(UploadResponse { url }).into_response(),
        Err(e) => {
            tracing::error!("blob upload failed: {}", e);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                e.to_string(),
            )
        }
    }
}

async fn get_blob(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.blobs.read(&name) {
        Ok(bytes) => ([(header::CONTENT_TYPE, "image/jpeg")], bytes).into_response(),
        Err(super::blobs::BlobStoreError::NotFound(_)) => {
            error_response(StatusCode::NOT_FOUND, "not_found", "No such blob")
        }
        Err(e) => error_response(StatusCode::BAD_REQUEST, "storage_error", e.to_string()),
    }
}

async fn delete_blob(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.blobs.delete(&name) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, "storage_error", e.to_string()),
    }
}

// ============================================================================
// Live subscription
// ============================================================================

#[derive(Deserialize)]
struct WsParams {
    #[serde(default)]
    key: String,
}

/// WebSocket endpoint. Authentication uses the `key` query parameter
/// because browsers and most WS clients cannot set headers on upgrade.
async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsParams>,
    State(state): State<AppState>,
) -> Response {
    let principal = state
        .accounts
        .read()
        .expect("account store lock poisoned")
        .authenticate(&params.key);

    if principal.is_none() {
        return error_response(StatusCode::UNAUTHORIZED, "invalid_key", "Invalid API key");
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(mut socket: WebSocket, state: AppState) {
    // First frame must be a subscribe message.
    let collection = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => match ProtocolMessage::decode(&text) {
                Ok(ProtocolMessage::Subscribe { collection }) => break collection,
                Ok(_) | Err(_) => {
                    let _ = send_error(&mut socket, "expected a subscribe message").await;
                    return;
                }
            },
            Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
            _ => return,
        }
    };

    tracing::info!(collection = %collection, "subscription opened");

    // Register with the hub before reading the snapshot so nothing is
    // missed in between; a write landing in the gap is delivered twice,
    // which reconciliation tolerates.
    let mut updates = state.hub.subscribe(&collection).await;

    let snapshot = {
        let documents = state.documents.lock().await;
        match documents.list(&collection) {
            Ok(documents) => documents,
            Err(e) => {
                let _ = send_error(&mut socket, &e.to_string()).await;
                return;
            }
        }
    };

    let (mut sender, mut receiver) = socket.split();

    let snapshot_batch: Vec<DocumentChange> = snapshot
        .into_iter()
        .map(|(id, fields)| DocumentChange::added(id, fields))
        .collect();
    if !snapshot_batch.is_empty()
        && send_changes(&mut sender, &collection, snapshot_batch)
            .await
            .is_err()
    {
        return;
    }

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(batch) => {
                    if send_changes(&mut sender, &collection, batch).await.is_err() {
                        break;
                    }
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(collection = %collection, skipped, "subscriber lagged");
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            },
            message = receiver.next() => match message {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
        }
    }

    tracing::info!(collection = %collection, "subscription closed");
}

async fn send_changes(
    sender: &mut SplitSink<WebSocket, Message>,
    collection: &str,
    changes: Vec<DocumentChange>,
) -> Result<(), axum::Error> {
    let message = ProtocolMessage::Changes {
        collection: collection.to_string(),
        changes,
    };
    match message.encode() {
        Ok(text) => sender.send(Message::Text(text.into())).await,
        Err(e) => {
            tracing::error!("failed to encode change batch: {}", e);
            Ok(())
        }
    }
}

async fn send_error(socket: &mut WebSocket, message: &str) -> Result<(), axum::Error> {
    let message = ProtocolMessage::Error {
        message: message.to_string(),
    };
    match message.encode() {
        Ok(text) => socket.send(Message::Text(text.into())).await,
        Err(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use tower::ServiceExt;

    fn test_state(dir: &std::path::Path) -> AppState {
        AppState {
            documents: Arc::new(Mutex::new(DocumentStore::new(dir))),
            hub: Arc::new(ChangeHub::new()),
            accounts: Arc::new(RwLock::new(AccountStore::load(dir))),
            blobs: Arc::new(BlobStore::new(dir)),
        }
    }

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health_is_public() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_documents_require_auth() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/collections/smokingAreas/documents")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_then_me() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(test_state(dir.path()));

        let response = app
            .clone()
            .oneshot(
                axum::http::Request::builder()
                    .method("POST")
                    .uri("/users")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"email":"me@example.com"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let body = body_json(response).await;
        let api_key = body["api_key"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/me")
                    .header("authorization", format!("Bearer {api_key}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["email"], "me@example.com");
    }

    #[tokio::test]
    async fn test_document_crud_publishes_changes() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(dir.path());
        let mut updates = state.hub.subscribe("smokingAreas").await;
        let api_key = state
            .accounts
            .write()
            .unwrap()
            .register("me@example.com", None)
            .unwrap()
            .1;
        let app = router(state);

        let put = axum::http::Request::builder()
            .method("PUT")
            .uri("/collections/smokingAreas/documents/1.0_2.0")
            .header("authorization", format!("Bearer {api_key}"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"A"}"#))
            .unwrap();
        let response = app.clone().oneshot(put).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let batch = updates.recv().await.unwrap();
        assert_eq!(batch[0].kind, whereizit_core::ChangeKind::Added);

        // Second write to the same ID is a modification.
        let put = axum::http::Request::builder()
            .method("PUT")
            .uri("/collections/smokingAreas/documents/1.0_2.0")
            .header("authorization", format!("Bearer {api_key}"))
            .header("content-type", "application/json")
            .body(Body::from(r#"{"name":"B"}"#))
            .unwrap();
        app.clone().oneshot(put).await.unwrap();
        let batch = updates.recv().await.unwrap();
        assert_eq!(batch[0].kind, whereizit_core::ChangeKind::Modified);

        let delete = axum::http::Request::builder()
            .method("DELETE")
            .uri("/collections/smokingAreas/documents/1.0_2.0")
            .header("authorization", format!("Bearer {api_key}"))
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let batch = updates.recv().await.unwrap();
        assert_eq!(batch[0].kind, whereizit_core::ChangeKind::Removed);
        // The removal still carries the last stored fields.
        assert_eq!(batch[0].fields["name"], "B");
    }
}
