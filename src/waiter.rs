//! Polling of asynchronous server-side operations.
//!
//! A [`Waiter`] calls a refresh function until the observed state reaches one
//! of the target states. States that are neither pending nor target abort the
//! wait instead of being polled until the timeout.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::api::{self, ApiError};

#[derive(Error, Debug)]
pub enum WaitError {
    #[error(
        "timeout while waiting for state to become '{target}' (last state: '{last_state}', timeout: {timeout:?})"
    )]
    Timeout {
        target: String,
        last_state: String,
        timeout: Duration,
    },

    #[error("unexpected state '{state}', wanted target '{target}'")]
    UnexpectedState { state: String, target: String },

    #[error("operation ended in state '{state}'")]
    Failed { state: String },

    #[error("cancelled while waiting for state to become '{target}'")]
    Cancelled { target: String },

    #[error(transparent)]
    Refresh(#[from] ApiError),
}

#[derive(Debug, Clone)]
pub struct Waiter {
    /// States in which polling continues
    pub pending: &'static [&'static str],
    /// States ending the wait successfully
    pub target: &'static [&'static str],
    /// States ending the wait with an error
    pub failed: &'static [&'static str],
    pub timeout: Duration,
    /// Wait before the first poll
    pub delay: Duration,
    /// First interval between polls, doubled after every poll
    pub min_interval: Duration,
    pub max_interval: Duration,
    pub cancel: CancellationToken,
}

enum Outcome<T> {
    Done(Result<T, WaitError>),
    Elapsed,
    Cancelled,
}

impl Waiter {
    pub fn new(
        pending: &'static [&'static str],
        target: &'static [&'static str],
        cancel: CancellationToken,
    ) -> Self {
        Self {
            pending,
            target,
            failed: &[],
            timeout: Duration::from_secs(10 * 60),
            delay: Duration::ZERO,
            min_interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(10),
            cancel,
        }
    }

    /// Wait for a task to complete
    pub fn task(cancel: CancellationToken) -> Self {
        Self {
            failed: &["failed"],
            delay: Duration::from_secs(1),
            min_interval: Duration::from_secs(5),
            ..Self::new(&["pending", "running"], &["completed"], cancel)
        }
    }

    /// Wait for a virtual machine build to complete
    pub fn virtual_machine_build(cancel: CancellationToken) -> Self {
        Self {
            failed: &["failed"],
            timeout: Duration::from_secs(20 * 60),
            delay: Duration::from_secs(2),
            min_interval: Duration::from_secs(5),
            ..Self::new(&["draft", "pending", "building"], &["complete"], cancel)
        }
    }

    /// Wait for a freshly built virtual machine to be running
    pub fn virtual_machine_started(cancel: CancellationToken) -> Self {
        Self {
            delay: Duration::from_secs(2),
            min_interval: Duration::from_secs(5),
            ..Self::new(
                &["stopped", "allocating", "allocated", "starting", "migrating"],
                &["started"],
                cancel,
            )
        }
    }

    /// Wait for a virtual machine to be stopped
    pub fn virtual_machine_stopped(cancel: CancellationToken) -> Self {
        Self {
            delay: Duration::from_secs(2),
            min_interval: Duration::from_secs(5),
            ..Self::new(
                &["started", "stopping", "shutting_down"],
                &["stopped"],
                cancel,
            )
        }
    }

    /// Wait for a purged trash object to disappear
    pub fn trash_object_purged(cancel: CancellationToken) -> Self {
        Self {
            delay: Duration::from_secs(1),
            min_interval: Duration::from_secs(2),
            ..Self::new(&["exists"], &["not_found"], cancel)
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    /// Poll `refresh` until it reports a target state
    ///
    /// `refresh` returns the current object along with its state.
    pub async fn wait<T, F, Fut>(&self, mut refresh: F) -> Result<T, WaitError>
    where
        T: Send,
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = api::Result<(T, String)>> + Send,
    {
        let mut last_state = String::new();

        let outcome = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Outcome::Cancelled,
            result = tokio::time::timeout(self.timeout, self.poll(&mut refresh, &mut last_state)) => {
                match result {
                    Ok(result) => Outcome::Done(result),
                    Err(_) => Outcome::Elapsed,
                }
            }
        };

        match outcome {
            Outcome::Done(result) => result,
            Outcome::Elapsed => Err(WaitError::Timeout {
                target: self.target.join(", "),
                last_state,
                timeout: self.timeout,
            }),
            Outcome::Cancelled => Err(WaitError::Cancelled {
                target: self.target.join(", "),
            }),
        }
    }

    async fn poll<T, F, Fut>(&self, refresh: &mut F, last_state: &mut String) -> Result<T, WaitError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = api::Result<(T, String)>>,
    {
        tokio::time::sleep(self.delay).await;

        let mut interval = self.min_interval;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let (value, state) = refresh().await?;
            last_state.clone_from(&state);

            if self.target.contains(&state.as_str()) {
                debug!(state, attempt, "target state reached");
                return Ok(value);
            }
            if self.failed.contains(&state.as_str()) {
                return Err(WaitError::Failed { state });
            }
            if !self.pending.contains(&state.as_str()) {
                return Err(WaitError::UnexpectedState {
                    state,
                    target: self.target.join(", "),
                });
            }

            trace!(state, attempt, interval_ms = interval.as_millis(), "still pending");
            tokio::time::sleep(interval).await;
            interval = interval
                .saturating_mul(2)
                .min(self.max_interval)
                .max(self.min_interval);
        }
    }
}
