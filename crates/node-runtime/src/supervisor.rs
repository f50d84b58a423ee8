//! Supervised retry loops.
//!
//! A task that fails is rerun after a fixed delay until it returns `Ok`,
//! shutdown fires, a fatal error occurs or the attempt cap is reached. The
//! delay is interruptible by shutdown. There is no backoff.

use es_01_emote_aggregator::AggregatorError;
use es_02_broadcast_relay::RelayError;
use es_03_media_source::MediaError;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Errors a supervisor can classify.
pub trait Retryable {
    /// Retrying cannot help.
    fn is_fatal(&self) -> bool {
        false
    }
}

impl Retryable for AggregatorError {}

impl Retryable for RelayError {
    fn is_fatal(&self) -> bool {
        matches!(self, RelayError::InvalidConfig(_))
    }
}

impl Retryable for MediaError {
    fn is_fatal(&self) -> bool {
        MediaError::is_fatal(self)
    }
}

/// When and how often to rerun a failed task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub delay: Duration,
    /// `None` retries forever.
    pub max_attempts: Option<u32>,
}

/// How supervision ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorExit {
    /// The task returned `Ok` on its own.
    Completed,
    /// Shutdown fired.
    Shutdown,
    /// The task failed with an error that retrying cannot fix.
    Fatal(String),
    /// The attempt cap was reached.
    Exhausted { attempts: u32, last_error: String },
}

impl SupervisorExit {
    pub fn is_failure(&self) -> bool {
        matches!(self, SupervisorExit::Fatal(_) | SupervisorExit::Exhausted { .. })
    }
}

/// Reruns one named task according to a [`RetryPolicy`].
pub struct Supervisor {
    name: &'static str,
    policy: RetryPolicy,
    shutdown: watch::Receiver<bool>,
}

impl Supervisor {
    pub fn new(name: &'static str, policy: RetryPolicy, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            name,
            policy,
            shutdown,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Drive `attempt` until supervision ends. Each attempt receives its own
    /// shutdown receiver.
    pub async fn run<F, Fut, E>(mut self, mut attempt: F) -> SupervisorExit
    where
        F: FnMut(watch::Receiver<bool>) -> Fut,
        Fut: Future<Output = Result<(), E>>,
        E: Retryable + Display,
    {
        let mut failures = 0u32;

        loop {
            if *self.shutdown.borrow() {
                return SupervisorExit::Shutdown;
            }

            let error = match attempt(self.shutdown.clone()).await {
                Ok(()) if *self.shutdown.borrow() => return SupervisorExit::Shutdown,
                Ok(()) => {
                    info!(task = self.name, "Task finished");
                    return SupervisorExit::Completed;
                }
                // Failures caused by the shutdown itself (e.g. a closed bus).
                Err(_) if *self.shutdown.borrow() => return SupervisorExit::Shutdown,
                Err(e) => e,
            };

            if error.is_fatal() {
                error!(task = self.name, error = %error, "Task failed fatally");
                return SupervisorExit::Fatal(error.to_string());
            }

            failures += 1;
            if let Some(max) = self.policy.max_attempts {
                if failures >= max {
                    error!(task = self.name, attempts = failures, error = %error, "Task gave up");
                    return SupervisorExit::Exhausted {
                        attempts: failures,
                        last_error: error.to_string(),
                    };
                }
            }

            warn!(
                task = self.name,
                attempt = failures,
                delay = ?self.policy.delay,
                error = %error,
                "Task failed, retrying"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.policy.delay) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return SupervisorExit::Shutdown;
                    }
                }
            }
        }
    }
}
