//! Connector standing in for a collector.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tracing::debug;

use crate::connector::Connector;
use crate::error::{Result, TransportError};

#[derive(Debug, Default)]
struct Inner {
    received: Vec<Value>,
    failures_left: usize,
    attempts: usize,
}

/// Acknowledges every POST the way the collector does and keeps the
/// payloads it received.
///
/// Clones share state, so a test can keep one clone to inspect traffic.
#[derive(Debug, Clone, Default)]
pub struct SimulatedConnector {
    inner: Arc<Mutex<Inner>>,
}

impl SimulatedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next `count` POSTs with a connection error.
    pub fn fail_next(&self, count: usize) {
        self.inner.lock().failures_left = count;
    }

    /// Payloads acknowledged so far.
    pub fn received(&self) -> Vec<Value> {
        self.inner.lock().received.clone()
    }

    /// POSTs attempted so far, failed ones included.
    pub fn attempts(&self) -> usize {
        self.inner.lock().attempts
    }

    fn acknowledge(&self, url: &str, body: &Value) -> Result<Value> {
        let mut inner = self.inner.lock();
        inner.attempts += 1;

        if inner.failures_left > 0 {
            inner.failures_left -= 1;
            return Err(TransportError::Connection(format!(
                "simulated collector unreachable: {}",
                url
            )));
        }

        inner.received.push(body.clone());
        debug!("Simulated collector received payload for {}", url);

        let count = body
            .get("readings")
            .and_then(Value::as_array)
            .map_or(1, Vec::len);
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Ok(json!({
            "status": "success",
            "message": "Readings received",
            "timestamp": timestamp,
            "count": count,
        }))
    }
}

impl Connector for SimulatedConnector {
    fn post(
        &self,
        url: &str,
        body: &Value,
        _token: Option<&str>,
        _timeout: Duration,
    ) -> impl Future<Output = Result<Value>> + Send {
        std::future::ready(self.acknowledge(url, body))
    }

    fn probe(&self, _url: &str, _timeout: Duration) -> impl Future<Output = Result<()>> + Send {
        std::future::ready(Ok(()))
    }
}
