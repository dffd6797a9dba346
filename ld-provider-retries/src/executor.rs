//! Retry executor for running operations under a policy.

use crate::classify::Decision;
use crate::error::ExecError;
use crate::gate::ConcurrencyGate;
use crate::outcome::Attempt;
use crate::policy::RetryPolicy;
use chrono::Utc;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// State of a retry sequence.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Current attempt number (1-indexed).
    pub attempt: u32,
    /// Total time spent waiting.
    pub total_wait_time: Duration,
    /// History of attempts.
    pub history: Vec<AttemptInfo>,
}

/// Information about a single attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct AttemptInfo {
    /// Attempt number.
    pub attempt: u32,
    /// Response status, if a response arrived.
    pub status: Option<u16>,
    /// How the outcome was classified.
    pub decision: Decision,
}

/// Runs operations through the concurrency gate under a retry policy.
///
/// The operation is invoked once per attempt and must be safe to repeat.
#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    gate: ConcurrencyGate,
}

impl RetryExecutor {
    /// Create an executor over a gate.
    pub fn new(gate: ConcurrencyGate) -> Self {
        Self { gate }
    }

    /// The gate every attempt goes through.
    pub fn gate(&self) -> &ConcurrencyGate {
        &self.gate
    }

    /// Execute an operation with retries.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let policy = RetryPolicy::rate_limit();
    /// let outcome = executor
    ///     .execute(&policy, &cancel, || client.get_flag(project, key))
    ///     .await;
    /// ```
    pub async fn execute<T, E, F, Fut>(
        &self,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        operation: F,
    ) -> Attempt<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: From<ExecError>,
    {
        self.execute_with_state(policy, cancel, operation).await.0
    }

    /// Execute with retries and get state information.
    pub async fn execute_with_state<T, E, F, Fut>(
        &self,
        policy: &RetryPolicy,
        cancel: &CancellationToken,
        mut operation: F,
    ) -> (Attempt<T, E>, RetryState)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
        E: From<ExecError>,
    {
        let mut state = RetryState::default();
        let max_attempts = policy.attempts_allowed();

        loop {
            state.attempt += 1;

            let outcome = match self.gate.run(cancel, async { operation().await }).await {
                Ok(outcome) => outcome,
                Err(err) => return (Attempt::err(err.into(), None), state),
            };

            let status = outcome.status();
            let decision = policy.decide(outcome.meta.as_ref(), state.attempt, Utc::now());
            state.history.push(AttemptInfo {
                attempt: state.attempt,
                status,
                decision,
            });

            let wait = match decision {
                Decision::Succeed | Decision::FailFatal => return (outcome, state),
                Decision::RetryAfter(wait) => wait,
            };

            if state.attempt >= max_attempts {
                warn!(
                    policy = policy.name(),
                    attempt = state.attempt,
                    status,
                    "Retry exhausted"
                );
                let attempts = state.attempt;
                return (policy.exhaust(outcome, attempts), state);
            }

            debug!(
                policy = policy.name(),
                attempt = state.attempt,
                max_attempts,
                status,
                wait_ms = wait.as_millis() as u64,
                "Waiting before retry"
            );
            state.total_wait_time += wait;

            // A suspension that ends the sequence carries no response.
            if let Err(err) = self.gate.pause(cancel, wait).await {
                return (Attempt::err(err.into(), None), state);
            }
        }
    }
}
