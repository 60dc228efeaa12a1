//! Pass-through proxy to the completion provider.
//!
//! Browsers cannot hold the provider key, so the server forwards their
//! request bodies with the configured bearer key attached and hands back
//! whatever the provider answered.

use reqwest::Client;
use serde_json::Value;
use tracing::{debug, warn};

use super::{ChatEndpoint, UpstreamError};

#[derive(Debug, Clone)]
pub struct Relay {
    http: Client,
    endpoint: ChatEndpoint,
}

impl Relay {
    pub fn new(endpoint: ChatEndpoint) -> Result<Self, UpstreamError> {
        let http = Client::builder().build().map_err(UpstreamError::transport)?;
        Ok(Self { http, endpoint })
    }

    /// Forward `body` unchanged and return the provider's status and body.
    ///
    /// Non-2xx answers are not errors here; they are relayed as-is. A
    /// non-JSON body comes back as a JSON string. Only a failure to reach the
    /// provider is an `Err`.
    pub async fn forward(&self, body: &Value) -> Result<(u16, Value), UpstreamError> {
        let url = self.endpoint.completions_url();
        let response = self
            .endpoint
            .authorize(self.http.post(&url).json(body))
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "relay could not reach provider");
                UpstreamError::transport(e)
            })?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(UpstreamError::transport)?;
        debug!(status, bytes = text.len(), "relayed provider response");

        let payload = serde_json::from_str(&text).unwrap_or(Value::String(text));
        Ok((status, payload))
    }
}
