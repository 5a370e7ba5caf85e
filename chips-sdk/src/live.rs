//! Client for a remote card service.
//!
//! Speaks JSON-RPC 2.0 over HTTP POST to a single endpoint (`/rpc` unless
//! the URL carries its own path). Each call is a single attempt; retry
//! policy belongs to the caller.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chips_core::{
    BoxId, Card, CardBox, CardId, CardInfo, ChipsError, ChipsResult, CreateCardOptions,
    EntityKind, SaveCardOptions,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use url::Url;

use crate::backend::{BackendMode, CardBackend};

const JSONRPC_VERSION: &str = "2.0";

/// Default request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// RPC error code for a missing card or box.
pub const RPC_NOT_FOUND: i32 = -32004;

/// RPC error code for invalid parameters.
pub const RPC_INVALID_PARAMS: i32 = -32602;

/// JSON-RPC backed [`CardBackend`].
#[derive(Debug)]
pub struct LiveBackend {
    http: Client,
    endpoint: Url,
    request_id: AtomicU64,
}

impl LiveBackend {
    /// Create a client for the service at `base_url`.
    ///
    /// `base_url` may be the RPC endpoint itself or just the host, in which
    /// case `/rpc` is appended.
    ///
    /// # Errors
    ///
    /// Returns [`ChipsError::Validation`] if the URL is malformed or the HTTP
    /// client cannot be built.
    pub fn new(base_url: &str, client_name: &str) -> ChipsResult<Self> {
        let mut url = Url::parse(base_url)
            .map_err(|e| ChipsError::Validation(format!("invalid endpoint {base_url}: {e}")))?;

        if url.path().is_empty() || url.path() == "/" {
            url.set_path("/rpc");
        }

        let http = Client::builder()
            .user_agent(format!("{client_name} (chips-sdk)"))
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChipsError::Validation(format!("cannot build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: url,
            request_id: AtomicU64::new(1),
        })
    }

    /// The resolved RPC endpoint.
    #[must_use]
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    async fn send_rpc<T>(&self, method: &str, params: Value) -> ChipsResult<T>
    where
        for<'de> T: Deserialize<'de>,
    {
        let id = self.request_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .map_err(|e| ChipsError::BackendUnavailable(format!("{method}: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(ChipsError::BackendUnavailable(format!(
                "{method}: server returned {status}"
            )));
        }
        if !status.is_success() {
            return Err(ChipsError::Validation(format!(
                "{method}: server rejected request with {status}"
            )));
        }

        let rpc: JsonRpcResponse = response.json().await.map_err(|e| {
            ChipsError::BackendUnavailable(format!("{method}: malformed response: {e}"))
        })?;

        if let Some(error) = rpc.error {
            return Err(error.into_chips_error(method));
        }

        // A null or absent result is only acceptable where T accepts null
        let result = rpc.result.unwrap_or(Value::Null);
        serde_json::from_value(result).map_err(|e| {
            ChipsError::BackendUnavailable(format!("{method}: unexpected result shape: {e}"))
        })
    }
}

#[async_trait]
impl CardBackend for LiveBackend {
    fn mode(&self) -> BackendMode {
        BackendMode::Live
    }

    async fn create_card(&self, options: &CreateCardOptions) -> ChipsResult<Card> {
        let params = serde_json::to_value(options)?;
        self.send_rpc("cards.create", params).await
    }

    async fn open_card(&self, id: &CardId) -> ChipsResult<Card> {
        self.send_rpc("cards.open", json!({ "id": id })).await
    }

    async fn save_card(&self, patch: &SaveCardOptions) -> ChipsResult<Card> {
        let params = serde_json::to_value(patch)?;
        self.send_rpc("cards.save", params).await
    }

    async fn delete_card(&self, id: &CardId) -> ChipsResult<()> {
        let _: Value = self.send_rpc("cards.delete", json!({ "id": id })).await?;
        Ok(())
    }

    async fn get_box(&self, id: &BoxId) -> ChipsResult<CardBox> {
        self.send_rpc("boxes.get", json!({ "id": id })).await
    }

    async fn list_boxes(&self) -> ChipsResult<Vec<CardBox>> {
        self.send_rpc("boxes.list", json!({})).await
    }

    async fn list_cards(&self) -> ChipsResult<Vec<CardInfo>> {
        self.send_rpc("cards.list", json!({})).await
    }
}

#[derive(Debug, Clone, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'a str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[allow(dead_code)]
    jsonrpc: String,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcError {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

impl JsonRpcError {
    fn into_chips_error(self, method: &str) -> ChipsError {
        match self.code {
            RPC_NOT_FOUND => {
                let data = self.data.unwrap_or(Value::Null);
                let entity = match data.get("entity").and_then(Value::as_str) {
                    Some("box") => EntityKind::Box,
                    _ => EntityKind::Card,
                };
                let id = data
                    .get("id")
                    .and_then(Value::as_str)
                    .map_or(self.message, str::to_string);
                ChipsError::NotFound { entity, id }
            }
            RPC_INVALID_PARAMS => ChipsError::Validation(self.message),
            code => ChipsError::BackendUnavailable(format!(
                "{method}: rpc error {code}: {}",
                self.message
            )),
        }
    }
}
