//! A single request attempt, without retry.

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

use crate::error::Result;

/// Performs one request attempt against a collector.
pub trait Connector: Send + Sync {
    /// POST `body` as JSON to `url` and return the JSON answer.
    fn post(
        &self,
        url: &str,
        body: &Value,
        token: Option<&str>,
        timeout: Duration,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Check that `url` answers at all.
    fn probe(&self, url: &str, timeout: Duration) -> impl Future<Output = Result<()>> + Send;
}
