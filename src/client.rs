//! HTTP/WebSocket client for the Whereizit server.
//!
//! REST calls cover the one-shot document, blob, and identity
//! operations; `subscribe` opens the long-lived change subscription and
//! forwards decoded batches over a channel until the socket closes.

use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use whereizit_core::{ChangeBatch, Principal, ProtocolMessage};

/// Errors from client operations.
#[derive(Debug)]
pub enum ClientError {
    /// Failed to reach the server
    HttpError(String),
    /// WebSocket error
    WebSocketError(String),
    /// Unexpected wire payload
    ProtocolError(String),
    /// The server rejected the request
    ServerError { status: u16, message: String },
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientError::HttpError(e) => write!(f, "HTTP error: {}", e),
            ClientError::WebSocketError(e) => write!(f, "WebSocket error: {}", e),
            ClientError::ProtocolError(e) => write!(f, "Protocol error: {}", e),
            ClientError::ServerError { status, message } => {
                write!(f, "Server returned {}: {}", status, message)
            }
        }
    }
}

impl std::error::Error for ClientError {}

/// A stored document and its ID.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentEnvelope {
    pub id: String,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    documents: Vec<DocumentEnvelope>,
}

#[derive(Debug, Deserialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

/// Returned by account registration: the principal plus its API key.
#[derive(Debug, Deserialize)]
pub struct RegisteredAccount {
    pub principal: Principal,
    pub api_key: String,
}

/// Client for the Whereizit server.
#[derive(Debug, Clone)]
pub struct StoreClient {
    server_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl StoreClient {
    pub fn new(server_url: String, api_key: String) -> Self {
        Self {
            server_url,
            api_key,
            http: reqwest::Client::new(),
        }
    }

    /// Fetches the current principal from the /me endpoint.
    pub async fn me(&self) -> Result<Principal, ClientError> {
        let response = self
            .http
            .get(self.build_http_url("/me"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        Self::json_body(response).await
    }

    /// Registers a new account and returns its API key.
    pub async fn register(
        &self,
        email: &str,
        display_name: Option<&str>,
    ) -> Result<RegisteredAccount, ClientError> {
        let mut body = Map::new();
        body.insert("email".into(), Value::String(email.to_string()));
        if let Some(name) = display_name {
            body.insert("display_name".into(), Value::String(name.to_string()));
        }

        let response = self
            .http
            .post(self.build_http_url("/users"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        Self::json_body(response).await
    }

    /// Deletes the current account. The account's areas remain.
    pub async fn delete_account(&self) -> Result<(), ClientError> {
        let response = self
            .http
            .delete(self.build_http_url("/me"))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        Self::empty_body(response).await
    }

    /// Creates or replaces a document under an explicit ID.
    pub async fn upsert_document(
        &self,
        collection: &str,
        document_id: &str,
        fields: &Map<String, Value>,
    ) -> Result<(), ClientError> {
        let path = format!("/collections/{}/documents/{}", collection, document_id);
        let response = self
            .http
            .put(self.build_http_url(&path))
            .bearer_auth(&self.api_key)
            .json(fields)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        Self::empty_body(response).await
    }

    /// Creates a document under a store-assigned ID.
    pub async fn create_document(
        &self,
        collection: &str,
        fields: &Map<String, Value>,
    ) -> Result<String, ClientError> {
        let path = format!("/collections/{}/documents", collection);
        let response = self
            .http
            .post(self.build_http_url(&path))
            .bearer_auth(&self.api_key)
            .json(fields)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        let created: CreatedResponse = Self::json_body(response).await?;
        Ok(created.id)
    }

    /// Fetches a single document, or `None` if it does not exist.
    pub async fn get_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<DocumentEnvelope>, ClientError> {
        let path = format!("/collections/{}/documents/{}", collection, document_id);
        let response = self
            .http
            .get(self.build_http_url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::json_body(response).await.map(Some)
    }

    /// Lists every document in a collection.
    pub async fn list_documents(
        &self,
        collection: &str,
    ) -> Result<Vec<DocumentEnvelope>, ClientError> {
        let path = format!("/collections/{}/documents", collection);
        let response = self
            .http
            .get(self.build_http_url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        let list: ListResponse = Self::json_body(response).await?;
        Ok(list.documents)
    }

    /// One-shot scoped read: documents whose `uploadUser` equals `email`.
    pub async fn query_by_upload_user(
        &self,
        collection: &str,
        email: &str,
    ) -> Result<Vec<DocumentEnvelope>, ClientError> {
        let path = format!("/collections/{}/documents", collection);
        let response = self
            .http
            .get(self.build_http_url(&path))
            .query(&[("uploadUser", email)])
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        let list: ListResponse = Self::json_body(response).await?;
        Ok(list.documents)
    }

    /// Deletes a document.
    pub async fn delete_document(
        &self,
        collection: &str,
        document_id: &str,
    ) -> Result<(), ClientError> {
        let path = format!("/collections/{}/documents/{}", collection, document_id);
        let response = self
            .http
            .delete(self.build_http_url(&path))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        Self::empty_body(response).await
    }

    /// Uploads image bytes to the blob store, returning the durable URL.
    pub async fn upload_blob(&self, bytes: &[u8]) -> Result<String, ClientError> {
        use base64::{engine::general_purpose::STANDARD, Engine};

        let mut body = Map::new();
        body.insert("data".into(), Value::String(STANDARD.encode(bytes)));

        let response = self
            .http
            .post(self.build_http_url("/blobs"))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        let uploaded: UploadResponse = Self::json_body(response).await?;
        Ok(uploaded.url)
    }

    /// Deletes a blob by its URL. Used to clean up a replaced photo.
    pub async fn delete_blob(&self, url: &str) -> Result<(), ClientError> {
        let name = url
            .rsplit('/')
            .next()
            .filter(|n| !n.is_empty())
            .ok_or_else(|| ClientError::ProtocolError(format!("not a blob URL: {url}")))?;
        let response = self
            .http
            .delete(self.build_http_url(&format!("/blobs/{}", name)))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ClientError::HttpError(e.to_string()))?;
        Self::empty_body(response).await
    }

    /// Opens the live subscription for a collection.
    ///
    /// Batches arrive on the returned channel in delivery order; the
    /// channel closes when the server ends the stream or the socket
    /// fails.
    pub async fn subscribe(
        &self,
        collection: &str,
    ) -> Result<mpsc::UnboundedReceiver<ChangeBatch>, ClientError> {
        let ws_url = self.build_ws_url();
        let (ws_stream, _) = connect_async(&ws_url)
            .await
            .map_err(|e| ClientError::WebSocketError(e.to_string()))?;

        let (mut sender, mut receiver) = ws_stream.split();

        let subscribe = ProtocolMessage::Subscribe {
            collection: collection.to_string(),
        }
        .encode()
        .map_err(|e| ClientError::ProtocolError(e.to_string()))?;

        sender
            .send(Message::Text(subscribe.into()))
            .await
            .map_err(|e| ClientError::WebSocketError(e.to_string()))?;

        let (batches, batch_rx) = mpsc::unbounded_channel();
        let collection = collection.to_string();

        tokio::spawn(async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => match ProtocolMessage::decode(&text) {
                        Ok(ProtocolMessage::Changes {
                            collection: c,
                            changes,
                        }) if c == collection => {
                            if batches.send(changes).is_err() {
                                break;
                            }
                        }
                        Ok(ProtocolMessage::Error { message }) => {
                            tracing::error!("subscription error: {}", message);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::warn!("undecodable subscription frame: {}", e);
                        }
                    },
                    Ok(Message::Ping(data)) => {
                        let _ = sender.send(Message::Pong(data)).await;
                    }
                    Ok(Message::Close(_)) | Err(_) => break,
                    Ok(_) => {}
                }
            }
        });

        Ok(batch_rx)
    }

    /// Builds the WebSocket URL for the subscription endpoint.
    fn build_ws_url(&self) -> String {
        let base_url = if self.server_url.starts_with("http://") {
            self.server_url.replace("http://", "ws://")
        } else if self.server_url.starts_with("https://") {
            self.server_url.replace("https://", "wss://")
        } else if !self.server_url.starts_with("ws://") && !self.server_url.starts_with("wss://") {
            format!("ws://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}/ws?key={}", base_url.trim_end_matches('/'), self.api_key)
    }

    /// Builds an HTTP URL for a given path.
    fn build_http_url(&self, path: &str) -> String {
        let base_url = if self.server_url.starts_with("ws://") {
            self.server_url.replace("ws://", "http://")
        } else if self.server_url.starts_with("wss://") {
            self.server_url.replace("wss://", "https://")
        } else if !self.server_url.starts_with("http://")
            && !self.server_url.starts_with("https://")
        {
            format!("http://{}", self.server_url)
        } else {
            self.server_url.clone()
        };

        format!("{}{}", base_url.trim_end_matches('/'), path)
    }

    async fn json_body<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::ServerError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        response
            .json()
            .await
            .map_err(|e| ClientError::ProtocolError(e.to_string()))
    }

    async fn empty_body(response: reqwest::Response) -> Result<(), ClientError> {
        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::ServerError {
                status: status.as_u16(),
                message: response.text().await.unwrap_or_default(),
            });
        }
        Ok(())
    }
}
