//! Retry loop around a connector.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use reqwest::Url;
use serde_json::Value;
use tracing::{Instrument, Span, debug, error, info, info_span, warn};

use crate::connector::Connector;
use crate::delay::{Delay, TokioDelay};
use crate::error::{Result, TransportError};
use crate::http::HttpConnector;
use crate::policy::RetryPolicy;
use crate::simulated::SimulatedConnector;
use crate::{DEFAULT_TIMEOUT, Transport};

/// Endpoint probed by `test_connection`.
pub const PROBE_PATH: &str = "/health";

/// Builds the connector once the timeout is known.
pub type ConnectorFactory<C> = Box<dyn Fn(Duration) -> Result<C> + Send + Sync>;

struct State<C> {
    base_url: Option<String>,
    connector: Option<Arc<C>>,
    timeout: Duration,
    policy: RetryPolicy,
    token: Option<String>,
    simulate_failure: bool,
    responses: HashMap<String, Value>,
}

/// Where a request goes, decided under the lock.
enum Route<C> {
    Canned(Value),
    Dispatch(Dispatch<C>),
}

/// Everything one request needs, copied out of the lock.
struct Dispatch<C> {
    connector: Arc<C>,
    url: String,
    timeout: Duration,
    policy: RetryPolicy,
    token: Option<String>,
}

/// Transport with bounded retry and backoff.
///
/// The lock is never held while a request is in flight or while waiting
/// between attempts; each request works on a snapshot of the policy.
pub struct ResilientTransport<C: Connector, D: Delay = TokioDelay> {
    factory: ConnectorFactory<C>,
    delay: D,
    state: Mutex<State<C>>,
    span: Span,
}

impl ResilientTransport<HttpConnector> {
    /// Transport over a real HTTP client.
    pub fn http() -> Self {
        Self::new(Box::new(HttpConnector::new))
    }
}

impl ResilientTransport<SimulatedConnector> {
    /// Transport answered by `connector`.
    pub fn simulated(connector: SimulatedConnector) -> Self {
        Self::new(Box::new(move |_| Ok(connector.clone())))
    }
}

impl<C: Connector> ResilientTransport<C> {
    pub fn new(factory: ConnectorFactory<C>) -> Self {
        Self {
            factory,
            delay: TokioDelay,
            state: Mutex::new(State {
                base_url: None,
                connector: None,
                timeout: DEFAULT_TIMEOUT,
                policy: RetryPolicy::default(),
                token: None,
                simulate_failure: false,
                responses: HashMap::new(),
            }),
            span: info_span!("transport"),
        }
    }
}

impl<C: Connector, D: Delay> ResilientTransport<C, D> {
    /// Replace how the transport waits between attempts.
    pub fn with_delay<D2: Delay>(self, delay: D2) -> ResilientTransport<C, D2> {
        ResilientTransport {
            factory: self.factory,
            delay,
            state: self.state,
            span: self.span,
        }
    }

    /// Replace the logging span operations run in.
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.state.lock().policy
    }

    fn route(&self, endpoint: &str) -> Result<Route<C>> {
        let state = self.state.lock();

        let (Some(base_url), Some(connector)) = (&state.base_url, &state.connector) else {
            error!("HTTP client not initialized");
            return Err(TransportError::NotInitialized);
        };

        if state.simulate_failure {
            warn!("Simulated HTTP request failure");
            return Err(TransportError::Simulated);
        }

        if let Some(response) = state.responses.get(endpoint) {
            debug!("Returning simulated response for endpoint: {}", endpoint);
            return Ok(Route::Canned(response.clone()));
        }

        Ok(Route::Dispatch(Dispatch {
            connector: Arc::clone(connector),
            url: format!("{}{}", base_url, endpoint),
            timeout: state.timeout,
            policy: state.policy,
            token: state.token.clone(),
        }))
    }

    async fn run(&self, dispatch: Dispatch<C>, payload: &Value) -> Result<Value> {
        let Dispatch {
            connector,
            url,
            timeout,
            policy,
            token,
        } = dispatch;

        let mut waits = policy.delays();
        let mut attempt: u32 = 1;

        loop {
            debug!("HTTP attempt {} to {}", attempt, url);

            let err = match connector
                .post(&url, payload, token.as_deref(), timeout)
                .await
            {
                Ok(response) => return Ok(response),
                Err(e) => e,
            };

            if !err.is_retryable() {
                error!("HTTP request to {} failed: {}", url, err);
                return Err(err);
            }

            let Some(wait) = waits.next() else {
                error!("HTTP request failed after {} attempts: {}", attempt, err);
                return Err(err);
            };

            warn!(
                "HTTP request failed (attempt {}): {}; retrying in {:?}",
                attempt, err, wait
            );
            self.delay.delay(wait).await;
            attempt += 1;
        }
    }
}

impl<C: Connector, D: Delay> Transport for ResilientTransport<C, D> {
    fn initialize(&self, base_url: &str, timeout: Duration) -> Result<()> {
        let _enter = self.span.enter();
        let mut state = self.state.lock();

        if state.base_url.is_some() {
            warn!("HttpClient already initialized");
            return Ok(());
        }

        let trimmed = base_url.trim().trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(TransportError::InvalidUrl(base_url.to_string()));
        }
        Url::parse(trimmed)
            .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base_url, e)))?;

        let connector = (self.factory)(timeout).inspect_err(|e| error!("{}", e))?;

        state.connector = Some(Arc::new(connector));
        state.base_url = Some(trimmed.to_string());
        state.timeout = timeout;
        info!("HttpClient initialized with base URL: {}", trimmed);
        Ok(())
    }

    fn is_initialized(&self) -> bool {
        self.state.lock().base_url.is_some()
    }

    fn set_retry_policy(&self, policy: RetryPolicy) {
        let _enter = self.span.enter();
        self.state.lock().policy = policy;
        debug!(
            "Set retry policy - max: {}, delay: {:?}, exponential: {}",
            policy.max_retries, policy.initial_delay, policy.exponential
        );
    }

    fn set_authentication(&self, token: Option<String>) {
        self.state.lock().token = token;
    }

    fn send_request(
        &self,
        endpoint: &str,
        payload: &Value,
    ) -> impl Future<Output = Result<Value>> + Send {
        let span = self.span.clone();
        async move {
            match self.route(endpoint)? {
                Route::Canned(response) => Ok(response),
                Route::Dispatch(dispatch) => self.run(dispatch, payload).await,
            }
        }
        .instrument(span)
    }

    fn test_connection(&self) -> impl Future<Output = bool> + Send {
        let span = self.span.clone();
        async move {
            let probe = {
                let state = self.state.lock();
                match (&state.base_url, &state.connector) {
                    (Some(base_url), Some(connector)) if !state.simulate_failure => {
                        if state.responses.contains_key(PROBE_PATH) {
                            return true;
                        }
                        Some((
                            Arc::clone(connector),
                            format!("{}{}", base_url, PROBE_PATH),
                            state.timeout,
                        ))
                    }
                    _ => None,
                }
            };

            let Some((connector, url, timeout)) = probe else {
                warn!("Connection test failed: client not initialized or failure simulated");
                return false;
            };

            match connector.probe(&url, timeout).await {
                Ok(()) => {
                    info!("Collector reachable at {}", url);
                    true
                }
                Err(e) => {
                    warn!("Collector unreachable at {}: {}", url, e);
                    false
                }
            }
        }
        .instrument(span)
    }

    fn simulate_failure(&self, armed: bool) {
        self.state.lock().simulate_failure = armed;
    }

    fn set_simulated_response(&self, endpoint: &str, response: Value) {
        let _enter = self.span.enter();
        self.state
            .lock()
            .responses
            .insert(endpoint.to_string(), response);
        debug!("Set simulated response for endpoint: {}", endpoint);
    }
}
