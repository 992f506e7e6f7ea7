//! Bounded, fixed-interval retry for dependencies that become ready
//! eventually (a secret store, a freshly scheduled agent).
//!
//! `f` runs once, then up to `max_attempts` more times with `interval` between
//! calls. No backoff, no jitter. Intermediate failures are logged; only the
//! last one is returned. The wait between calls can be cut short through a
//! `watch` channel, which stops retrying and returns the last error.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct Retry {
    max_attempts: u32,
    interval: Duration,
    cancel: Option<watch::Receiver<bool>>,
}

impl Retry {
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            cancel: None,
        }
    }

    /// Stop waiting as soon as `true` is sent on the channel.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub async fn run<T, E, F, Fut>(&self, label: &str, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Display,
    {
        let mut cancel = self.cancel.clone();
        let total = self.max_attempts.saturating_add(1);
        let mut attempt = 1;
        loop {
            let err = match f().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(%label, attempt, "succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if attempt >= total {
                warn!(%label, attempt, error = %err, "giving up");
                return Err(err);
            }
            warn!(
                %label,
                attempt,
                remaining = total - attempt,
                error = %err,
                "attempt failed, retrying in {}ms",
                self.interval.as_millis()
            );

            match cancel.as_mut() {
                Some(rx) => {
                    tokio::select! {
                        _ = tokio::time::sleep(self.interval) => {}
                        _ = cancelled(rx) => {
                            warn!(%label, attempt, "retry cancelled");
                            return Err(err);
                        }
                    }
                }
                None => tokio::time::sleep(self.interval).await,
            }
            attempt += 1;
        }
    }
}

/// Resolves once `true` is observed. A dropped sender never cancels.
async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Call `f` up to `max_attempts + 1` times, sleeping `interval` between calls.
pub async fn retry<T, E, F, Fut>(max_attempts: u32, interval: Duration, f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    Retry::new(max_attempts, interval).run("retry", f).await
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
