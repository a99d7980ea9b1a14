//! Retry loop and simulation behaviour of `ResilientTransport`.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use energymon_transport::{
    Connector, Delay, PROBE_PATH, RecordingDelay, ResilientTransport, Result, RetryPolicy,
    SimulatedConnector, Transport, TransportError,
};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::Notify;

const BASE: &str = "http://collector.test:3000";

/// Connector replaying a script of results; succeeds once the script runs out.
#[derive(Clone, Default)]
struct Scripted {
    script: Arc<Mutex<VecDeque<Result<Value>>>>,
    requests: Arc<Mutex<Vec<(String, Option<String>)>>>,
    probe_fails: bool,
}

impl Scripted {
    fn failing(times: usize) -> Self {
        let connector = Self::default();
        for i in 0..times {
            connector
                .script
                .lock()
                .push_back(Err(TransportError::Connection(format!("refused #{}", i + 1))));
        }
        connector
    }

    fn push(&self, result: Result<Value>) {
        self.script.lock().push_back(result);
    }

    fn attempts(&self) -> usize {
        self.requests.lock().len()
    }

    fn urls(&self) -> Vec<String> {
        self.requests.lock().iter().map(|(u, _)| u.clone()).collect()
    }
}

impl Connector for Scripted {
    fn post(
        &self,
        url: &str,
        _body: &Value,
        token: Option<&str>,
        _timeout: Duration,
    ) -> impl Future<Output = Result<Value>> + Send {
        self.requests
            .lock()
            .push((url.to_string(), token.map(str::to_string)));
        let next = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(json!({"status": "success"})));
        std::future::ready(next)
    }

    fn probe(&self, url: &str, _timeout: Duration) -> impl Future<Output = Result<()>> + Send {
        let result = if self.probe_fails {
            Err(TransportError::Connection(url.to_string()))
        } else {
            Ok(())
        };
        std::future::ready(result)
    }
}

fn transport(
    connector: &Scripted,
) -> (ResilientTransport<Scripted, RecordingDelay>, RecordingDelay) {
    let delay = RecordingDelay::new();
    let factory_connector = connector.clone();
    let transport = ResilientTransport::new(Box::new(move |_| Ok(factory_connector.clone())))
        .with_delay(delay.clone());
    transport.initialize(BASE, Duration::from_secs(5)).unwrap();
    (transport, delay)
}

fn ms(values: &[u64]) -> Vec<Duration> {
    values.iter().map(|v| Duration::from_millis(*v)).collect()
}

#[tokio::test]
async fn test_exhausted_retries_make_max_plus_one_attempts() {
    let connector = Scripted::failing(10);
    let (transport, delay) = transport(&connector);
    transport.set_retry_policy(RetryPolicy::new(3, Duration::from_millis(100), true));

    let err = transport
        .send_request("/api/readings", &json!({}))
        .await
        .unwrap_err();

    assert_eq!(connector.attempts(), 4);
    assert_eq!(delay.waits(), ms(&[100, 200, 400]));
    // The last failure is the one propagated.
    assert!(matches!(err, TransportError::Connection(ref m) if m == "refused #4"));
}

#[tokio::test]
async fn test_fixed_backoff() {
    let connector = Scripted::failing(10);
    let (transport, delay) = transport(&connector);
    transport.set_retry_policy(RetryPolicy::new(2, Duration::from_millis(50), false));

    assert!(transport.send_request("/x", &json!({})).await.is_err());
    assert_eq!(connector.attempts(), 3);
    assert_eq!(delay.waits(), ms(&[50, 50]));
}

#[tokio::test]
async fn test_success_short_circuits() {
    let connector = Scripted::failing(2);
    let (transport, delay) = transport(&connector);
    transport.set_retry_policy(RetryPolicy::new(5, Duration::from_millis(100), true));

    let response = transport.send_request("/x", &json!({})).await.unwrap();
    assert_eq!(response["status"], "success");
    assert_eq!(connector.attempts(), 3);
    assert_eq!(delay.waits(), ms(&[100, 200]));
}

#[tokio::test]
async fn test_zero_retries_single_attempt() {
    let connector = Scripted::failing(1);
    let (transport, delay) = transport(&connector);
    transport.set_retry_policy(RetryPolicy::none());

    assert!(transport.send_request("/x", &json!({})).await.is_err());
    assert_eq!(connector.attempts(), 1);
    assert!(delay.waits().is_empty());
}

#[tokio::test]
async fn test_status_and_decode_failures_are_retried() {
    let connector = Scripted::default();
    connector.push(Err(TransportError::Status {
        code: 404,
        body: "not found".into(),
    }));
    connector.push(Err(TransportError::Decode("expected value".into())));
    let (transport, delay) = transport(&connector);
    transport.set_retry_policy(RetryPolicy::new(3, Duration::from_millis(100), true));

    let response = transport.send_request("/x", &json!({})).await.unwrap();
    assert_eq!(response["status"], "success");
    assert_eq!(connector.attempts(), 3);
    assert_eq!(delay.waits(), ms(&[100, 200]));
}

#[tokio::test]
async fn test_persistent_client_status_exhausts_retries() {
    let connector = Scripted::default();
    for _ in 0..10 {
        connector.push(Err(TransportError::Status {
            code: 400,
            body: "bad".into(),
        }));
    }
    let (transport, delay) = transport(&connector);
    transport.set_retry_policy(RetryPolicy::new(2, Duration::from_millis(10), false));

    let err = transport.send_request("/x", &json!({})).await.unwrap_err();
    assert!(matches!(err, TransportError::Status { code: 400, .. }));
    assert_eq!(connector.attempts(), 3);
    assert_eq!(delay.waits(), ms(&[10, 10]));
}

#[tokio::test]
async fn test_local_error_is_final() {
    let connector = Scripted::default();
    connector.push(Err(TransportError::InvalidUrl("bad host".into())));
    let (transport, delay) = transport(&connector);

    let err = transport.send_request("/x", &json!({})).await.unwrap_err();
    assert!(matches!(err, TransportError::InvalidUrl(_)));
    assert_eq!(connector.attempts(), 1);
    assert!(delay.waits().is_empty());
}

#[tokio::test]
async fn test_not_initialized() {
    let transport = ResilientTransport::simulated(SimulatedConnector::new());
    assert!(!transport.is_initialized());
    assert!(matches!(
        transport.send_request("/x", &json!({})).await,
        Err(TransportError::NotInitialized)
    ));
    assert!(!transport.test_connection().await);
}

#[tokio::test]
async fn test_simulated_failure_dispatches_nothing() {
    let connector = Scripted::default();
    let (transport, _) = transport(&connector);
    transport.set_simulated_response("/x", json!({"canned": true}));

    transport.simulate_failure(true);
    assert!(matches!(
        transport.send_request("/x", &json!({})).await,
        Err(TransportError::Simulated)
    ));
    assert!(!transport.test_connection().await);
    assert_eq!(connector.attempts(), 0);

    transport.simulate_failure(false);
    assert!(transport.send_request("/x", &json!({})).await.is_ok());
}

#[tokio::test]
async fn test_canned_response_takes_priority() {
    let connector = Scripted::failing(10);
    let (transport, _) = transport(&connector);
    let canned = json!({"status": "ok", "items": [1, 2, 3]});
    transport.set_simulated_response("/api/readings", canned.clone());

    let response = transport
        .send_request("/api/readings", &json!({"ignored": true}))
        .await
        .unwrap();
    assert_eq!(response, canned);
    assert_eq!(connector.attempts(), 0);

    // Other endpoints still go out.
    transport.set_retry_policy(RetryPolicy::none());
    assert!(transport.send_request("/other", &json!({})).await.is_err());
    assert_eq!(connector.urls(), vec![format!("{}/other", BASE)]);
}

#[tokio::test]
async fn test_bearer_token_and_url_join() {
    let connector = Scripted::default();
    let delay = RecordingDelay::new();
    let factory_connector = connector.clone();
    let transport = ResilientTransport::new(Box::new(move |_| Ok(factory_connector.clone())))
        .with_delay(delay);
    transport
        .initialize("http://collector.test:3000/", Duration::from_secs(1))
        .unwrap();

    transport.set_authentication(Some("secret-key".into()));
    transport.send_request("/api/readings", &json!({})).await.unwrap();
    transport.set_authentication(None);
    transport.send_request("/api/readings", &json!({})).await.unwrap();

    let requests = connector.requests.lock().clone();
    assert_eq!(
        requests,
        vec![
            (
                "http://collector.test:3000/api/readings".to_string(),
                Some("secret-key".to_string())
            ),
            ("http://collector.test:3000/api/readings".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn test_double_initialize_keeps_first_binding() {
    let connector = Scripted::default();
    let (transport, _) = transport(&connector);

    transport
        .initialize("http://elsewhere.test", Duration::from_secs(1))
        .unwrap();
    transport.send_request("/x", &json!({})).await.unwrap();
    assert_eq!(connector.urls(), vec![format!("{}/x", BASE)]);
}

#[tokio::test]
async fn test_invalid_base_url() {
    let transport = ResilientTransport::simulated(SimulatedConnector::new());
    assert!(matches!(
        transport.initialize("", Duration::from_secs(1)),
        Err(TransportError::InvalidUrl(_))
    ));
    assert!(matches!(
        transport.initialize("not a url", Duration::from_secs(1)),
        Err(TransportError::InvalidUrl(_))
    ));
    assert!(!transport.is_initialized());
}

#[tokio::test]
async fn test_connector_construction_failure() {
    let transport: ResilientTransport<Scripted> = ResilientTransport::new(Box::new(|_| {
        Err(TransportError::Client("no TLS backend".into()))
    }));
    assert!(matches!(
        transport.initialize(BASE, Duration::from_secs(1)),
        Err(TransportError::Client(_))
    ));
    assert!(!transport.is_initialized());
}

#[tokio::test]
async fn test_connection_probe() {
    let connector = Scripted::default();
    let (transport, _) = transport(&connector);
    assert!(transport.test_connection().await);

    let unreachable = Scripted {
        probe_fails: true,
        ..Scripted::default()
    };
    let (transport, _) = self::transport(&unreachable);
    assert!(!transport.test_connection().await);

    transport.set_simulated_response(PROBE_PATH, json!({"status": "up"}));
    assert!(transport.test_connection().await);
}

/// Delay that parks until the test releases it.
#[derive(Clone, Default)]
struct GateDelay {
    entered: Arc<Notify>,
    release: Arc<Notify>,
}

impl Delay for GateDelay {
    fn delay(&self, _duration: Duration) -> impl Future<Output = ()> + Send {
        let entered = self.entered.clone();
        let release = self.release.clone();
        async move {
            entered.notify_one();
            release.notified().await;
        }
    }
}

#[tokio::test]
async fn test_policy_change_during_wait_spares_in_flight_request() {
    let connector = Scripted::failing(10);
    let gate = GateDelay::default();
    let factory_connector = connector.clone();
    let transport = Arc::new(
        ResilientTransport::new(Box::new(move |_| Ok(factory_connector.clone())))
            .with_delay(gate.clone()),
    );
    transport.initialize(BASE, Duration::from_secs(1)).unwrap();
    transport.set_retry_policy(RetryPolicy::new(2, Duration::from_millis(10), true));

    let in_flight = {
        let transport = transport.clone();
        tokio::spawn(async move { transport.send_request("/x", &json!({})).await })
    };

    gate.entered.notified().await;
    // Not blocked by the waiting request.
    transport.set_retry_policy(RetryPolicy::none());
    gate.release.notify_one();

    gate.entered.notified().await;
    gate.release.notify_one();

    assert!(in_flight.await.unwrap().is_err());
    assert_eq!(connector.attempts(), 3);
    assert_eq!(transport.retry_policy(), RetryPolicy::none());
}
