//! Waiting between retry attempts.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// Something that can wait for a duration.
pub trait Delay: Send + Sync {
    fn delay(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Real waits on the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioDelay;

impl Delay for TokioDelay {
    fn delay(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

/// Records requested waits and returns immediately.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay {
    waits: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every wait requested so far, in order.
    pub fn waits(&self) -> Vec<Duration> {
        self.waits.lock().clone()
    }
}

impl Delay for RecordingDelay {
    fn delay(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        self.waits.lock().push(duration);
        std::future::ready(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_delay() {
        let delay = RecordingDelay::new();
        let observer = delay.clone();

        delay.delay(Duration::from_millis(5)).await;
        delay.delay(Duration::from_millis(10)).await;

        assert_eq!(
            observer.waits(),
            vec![Duration::from_millis(5), Duration::from_millis(10)]
        );
    }

    #[tokio::test]
    async fn test_tokio_delay_waits() {
        let start = tokio::time::Instant::now();
        TokioDelay.delay(Duration::from_millis(20)).await;
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
