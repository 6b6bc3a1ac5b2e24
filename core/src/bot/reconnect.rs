//! Bounded reconnect loop around a single connection attempt
//!
//! The first attempt is not a retry. After a retryable failure the controller
//! waits `retry_delay` and tries again, up to `max_retries` more times. It
//! never waits after the final failure, so `R` retries cost `R` delays and
//! `R + 1` attempts. Authentication failures and cancellation end the loop
//! immediately without consuming retries.

use crate::config::ReconnectConfig;
use crate::error::ConnectError;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Failed,
    Retrying,
    /// Every retry failed; the loop has given up
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub retry_delay: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::from_config(&ReconnectConfig::default())
    }
}

impl ReconnectPolicy {
    pub fn from_config(config: &ReconnectConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_delay: config.retry_delay(),
        }
    }

    /// Whether another attempt is allowed after `retries_used` retries
    pub fn should_retry(&self, retries_used: u32) -> bool {
        retries_used < self.max_retries
    }
}

/// Suspension between attempts
#[async_trait]
pub trait Delay: Send + Sync {
    async fn wait(&self, duration: Duration);
}

pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

pub struct ReconnectController<D = TokioDelay> {
    policy: ReconnectPolicy,
    delay: D,
    state: watch::Sender<ConnectionState>,
}

impl ReconnectController<TokioDelay> {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self::with_delay(policy, TokioDelay)
    }
}

impl<D: Delay> ReconnectController<D> {
    pub fn with_delay(policy: ReconnectPolicy, delay: D) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        Self {
            policy,
            delay,
            state,
        }
    }

    pub fn policy(&self) -> &ReconnectPolicy {
        &self.policy
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ConnectionState) {
        self.state.send_replace(state);
    }

    /// Drive `connect` until it succeeds, fails terminally, or retries run
    /// out. `connect` receives the retry number, 0 for the first attempt.
    pub async fn run<F, Fut>(&self, mut connect: F) -> Result<(), ConnectError>
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = Result<(), ConnectError>> + Send,
    {
        let max = self.policy.max_retries;
        let mut retry = 0u32;

        loop {
            self.set_state(ConnectionState::Connecting);
            if retry > 0 {
                info!("Attempting to reconnect... (Retry {}/{})", retry, max);
            }

            let err = match connect(retry).await {
                Ok(()) => {
                    self.set_state(ConnectionState::Connected);
                    if retry > 0 {
                        info!("Reconnected successfully");
                    }
                    return Ok(());
                }
                Err(err) => err,
            };

            self.set_state(ConnectionState::Failed);
            if !err.is_retryable() {
                error!("connection attempt ended without retry: {}", err);
                return Err(err);
            }

            if !self.policy.should_retry(retry) {
                self.set_state(ConnectionState::Exhausted);
                error!("giving up after {} retries: {}", max, err);
                return Err(err);
            }

            retry += 1;
            self.set_state(ConnectionState::Retrying);
            if self.policy.retry_delay.is_zero() {
                warn!("connection failed: {}", err);
            } else {
                warn!(
                    "connection failed: {}; retrying in {}s",
                    err,
                    self.policy.retry_delay.as_secs()
                );
                self.delay.wait(self.policy.retry_delay).await;
            }
        }
    }
}
