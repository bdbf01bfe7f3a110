//! # HTTP Transport
//!
//! One `POST` per request against the service's JSON-RPC endpoint (`/jsonrpc` on Kodi).
use super::{Transport, TransportError, jsonrpc};
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// A one-shot transport over HTTP or HTTPS.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    credentials: Option<(String, Option<String>)>,
}

impl HttpTransport {
    /// Creates a transport posting to `url` (e.g. `http://localhost:8080/jsonrpc`).
    pub fn new(url: impl Into<String>) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder().build()?;

        Ok(Self {
            client,
            url: url.into(),
            credentials: None,
        })
    }

    /// Sends HTTP basic credentials with every request.
    pub fn with_basic_auth(mut self, username: impl Into<String>, password: Option<String>) -> Self {
        self.credentials = Some((username.into(), password));
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn request(
        &mut self,
        method: &str,
        params: Option<Value>,
        id: Option<String>,
    ) -> Result<jsonrpc::JsonRpcResponse, TransportError> {
        let id = id.unwrap_or_else(|| Uuid::new_v4().to_string());
        let body = jsonrpc::encode_request(method, params.as_ref(), &id)?;

        let mut request = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);

        if let Some((username, password)) = &self.credentials {
            request = request.basic_auth(username, password.as_ref());
        }

        debug!(url = %self.url, method, %id, "sending http request");

        let text = request.send().await?.error_for_status()?.text().await?;

        jsonrpc::decode_frame(&text)
            .map_err(|err| TransportError::Decode(err.to_string()))?
            .into_response(&id)
    }
}
