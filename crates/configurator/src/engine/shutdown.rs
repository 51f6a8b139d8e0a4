use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

/// Graceful-stop signal shared between the engine and a signal handler.
///
/// Requesting a stop never interrupts a running operation. It only cuts
/// short the engine's sleeps and makes it stop at the end of the cycle.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    requested: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request(&self) {
        self.requested.store(true, Ordering::Release);
        self.notify.notify_waiters();
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    /// Sleeps for `duration`, returning early if a stop is requested.
    pub async fn sleep(&self, duration: Duration) {
        let notified = self.notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        if self.is_requested() {
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = notified => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_request_cuts_sleep_short() {
        let shutdown = Shutdown::new();
        let handle = shutdown.clone();

        let started = Instant::now();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.request();
        });
        shutdown.sleep(Duration::from_secs(30)).await;

        assert!(shutdown.is_requested());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_sleep_after_request_returns_immediately() {
        let shutdown = Shutdown::new();
        shutdown.request();

        let started = Instant::now();
        shutdown.sleep(Duration::from_secs(30)).await;
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_request_from_plain_thread() {
        let shutdown = Shutdown::new();
        let handle = shutdown.clone();
        std::thread::spawn(move || handle.request()).join().unwrap();
        assert!(shutdown.is_requested());
    }
}
