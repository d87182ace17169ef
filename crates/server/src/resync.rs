//! Capability resync against the backend HTTP API.
//!
//! After every successful WebSocket connect the bridge calls
//! [`SchemaResync::resync`], which refetches the backend's node schema
//! so cached capabilities never go stale across a backend restart or a
//! plugin change.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use easel_bridge::{ResyncError, ResyncHandler};

/// Fetches the backend node schema over HTTP and tracks its size.
pub struct SchemaResync {
    client: reqwest::Client,
    api_url: String,
    node_kinds: AtomicUsize,
}

impl SchemaResync {
    /// Create a resync handler for a backend instance.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://host:8188`.
    pub fn new(api_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            node_kinds: AtomicUsize::new(0),
        }
    }

    /// Node kinds seen in the most recent schema fetch.
    pub fn known_node_kinds(&self) -> usize {
        self.node_kinds.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ResyncHandler for SchemaResync {
    async fn resync(&self) -> Result<(), ResyncError> {
        let response = self
            .client
            .get(format!("{}/object_info", self.api_url))
            .send()
            .await
            .map_err(|e| ResyncError(format!("schema request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResyncError(format!("schema request returned {status}")));
        }

        let schema: HashMap<String, serde_json::Value> = response
            .json()
            .await
            .map_err(|e| ResyncError(format!("schema body unreadable: {e}")))?;

        self.node_kinds.store(schema.len(), Ordering::Relaxed);
        tracing::info!(node_kinds = schema.len(), "Backend schema refreshed");
        Ok(())
    }
}
