//! WebSocket client for connecting to the compute backend.
//!
//! [`BackendClient`] holds the connection configuration for one backend
//! instance. Call [`BackendClient::connect`] to establish a live
//! [`BackendConnection`] over WebSocket.

use tokio_tungstenite::{connect_async, MaybeTlsStream};

/// Configuration handle for one backend instance.
pub struct BackendClient {
    ws_url: String,
}

/// A live WebSocket connection to the backend.
pub struct BackendConnection {
    /// Unique client ID sent during the WebSocket handshake.
    pub client_id: String,
    /// The raw WebSocket stream for reading/writing frames.
    pub ws_stream: tokio_tungstenite::WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>,
}

impl BackendClient {
    /// Create a new client targeting a backend instance.
    ///
    /// * `ws_url` - WebSocket base URL, e.g. `ws://host:8188`.
    pub fn new(ws_url: String) -> Self {
        Self { ws_url }
    }

    /// WebSocket base URL (e.g. `ws://host:8188`).
    pub fn ws_url(&self) -> &str {
        &self.ws_url
    }

    /// Connect to the backend WebSocket endpoint.
    ///
    /// Generates a unique `client_id` (UUID v4) and appends it as a
    /// query parameter so that the backend can address messages back to
    /// this specific client.
    pub async fn connect(&self) -> Result<BackendConnection, ClientError> {
        let client_id = uuid::Uuid::new_v4().to_string();
        let url = format!("{}/ws?clientId={}", self.ws_url, client_id);

        let (ws_stream, _response) = connect_async(&url).await.map_err(|e| {
            ClientError::Connection(format!(
                "Failed to connect to backend at {}: {e}",
                self.ws_url
            ))
        })?;

        tracing::info!(
            client_id = %client_id,
            "Connected to backend at {}",
            self.ws_url,
        );

        Ok(BackendConnection {
            client_id,
            ws_stream,
        })
    }
}

/// Errors that can occur when working with the WebSocket client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Failed to establish the initial WebSocket connection.
    #[error("Connection error: {0}")]
    Connection(String),
}
