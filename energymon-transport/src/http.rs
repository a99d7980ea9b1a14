//! Connector over a real HTTP client.

use std::future::Future;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::connector::Connector;
use crate::error::{Result, TransportError};

/// POSTs JSON documents with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpConnector {
    client: Client,
}

impl HttpConnector {
    /// Build a client whose requests time out after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("energymon/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Client(e.to_string()))?;
        Ok(Self { client })
    }
}

/// Map a client error onto the transport taxonomy.
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else if e.is_builder() {
        TransportError::InvalidUrl(e.to_string())
    } else if e.is_decode() {
        TransportError::Decode(e.to_string())
    } else {
        TransportError::Connection(e.to_string())
    }
}

impl Connector for HttpConnector {
    fn post(
        &self,
        url: &str,
        body: &Value,
        token: Option<&str>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Value>> + Send {
        let mut request = self.client.post(url).timeout(timeout).json(body);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        async move {
            let response = request.send().await.map_err(classify)?;
            let status = response.status();
            debug!("POST {} -> {}", response.url(), status);

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(TransportError::Status {
                    code: status.as_u16(),
                    body,
                });
            }

            let text = response.text().await.map_err(classify)?;
            serde_json::from_str(&text).map_err(|e| TransportError::Decode(e.to_string()))
        }
    }

    fn probe(&self, url: &str, timeout: Duration) -> impl Future<Output = Result<()>> + Send {
        let request = self.client.get(url).timeout(timeout);

        async move {
            let response = request.send().await.map_err(classify)?;
            debug!("GET {} -> {}", response.url(), response.status());
            Ok(())
        }
    }
}
