//! Resilient delivery of JSON documents to an HTTP collector.
//!
//! [`ResilientTransport`] wraps a [`Connector`] (one attempt) with a
//! [`RetryPolicy`] and a [`Delay`]:
//!
//! ```text
//! send_request: [simulated failure?] -> [canned response?] -> attempt 1 -> wait -> attempt 2 -> ...
//! ```
//!
//! A request makes at most `max_retries + 1` attempts. Simulation state is
//! consulted before anything is dispatched.

mod connector;
mod delay;
mod error;
mod http;
mod policy;
mod resilient;
mod simulated;

pub use connector::Connector;
pub use delay::{Delay, RecordingDelay, TokioDelay};
pub use error::{Result, TransportError};
pub use http::HttpConnector;
pub use policy::RetryPolicy;
pub use resilient::{ConnectorFactory, PROBE_PATH, ResilientTransport};
pub use simulated::SimulatedConnector;

use std::future::Future;
use std::time::Duration;

use serde_json::Value;

/// Default request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Capability interface for delivering documents to a collector.
pub trait Transport: Send + Sync {
    /// Bind to `base_url`. A second call logs a warning and changes nothing.
    fn initialize(&self, base_url: &str, timeout: Duration) -> Result<()>;

    fn is_initialized(&self) -> bool;

    /// Replace the retry policy for requests started from now on.
    fn set_retry_policy(&self, policy: RetryPolicy);

    /// Bearer token sent with every request. `None` removes it.
    fn set_authentication(&self, token: Option<String>);

    /// POST `payload` to `base_url + endpoint`, retrying per the policy.
    fn send_request(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> impl Future<Output = Result<Value>> + Send;

    /// Whether the collector can be reached. Never fails.
    fn test_connection(&self) -> impl Future<Output = bool> + Send;

    /// Arm or disarm failure injection for every request.
    fn simulate_failure(&self, armed: bool);

    /// Answer requests to `endpoint` with `response` without dispatching.
    fn set_simulated_response(&self, endpoint: &str, response: Value);
}
