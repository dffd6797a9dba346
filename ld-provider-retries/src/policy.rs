//! Retry policies: a classifier plus an attempt budget.

use crate::backoff::{Jitter, RandomJitter, WaitStrategy};
use crate::classify::{
    Classifier, ClassifyContext, Decision, RateLimitClassifier, ServerErrorClassifier,
    StatusClassifier,
};
use crate::error::ExecError;
use crate::outcome::{Attempt, ResponseMeta};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

/// Total calls allowed for `429` responses (20 retries).
pub const MAX_RATE_LIMIT_ATTEMPTS: u32 = 21;
/// Total calls allowed for `409` responses (5 retries).
pub const MAX_CONFLICT_ATTEMPTS: u32 = 6;
/// Total calls allowed for `404` responses after a create (12 retries).
pub const MAX_NOT_FOUND_ATTEMPTS: u32 = 13;
/// Total calls allowed for 5xx responses (12 retries).
pub const MAX_SERVER_ERROR_ATTEMPTS: u32 = 13;

/// Shortest header-less or conflict wait.
pub const RETRY_WAIT_MIN: Duration = Duration::from_millis(200);
/// Width of the jitter window added to [`RETRY_WAIT_MIN`].
pub const RETRY_WAIT_SPREAD: Duration = Duration::from_millis(300);
/// Upper bound of exponential waits.
pub const RETRY_WAIT_MAX: Duration = Duration::from_secs(10);
/// Wait between `404` retries.
pub const NOT_FOUND_WAIT: Duration = Duration::from_secs(1);
/// Longest wait a `X-RateLimit-Reset` header can impose.
pub const MAX_RESET_WAIT: Duration = Duration::from_secs(60);

/// What a policy returns when its last allowed attempt is still retryable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exhaustion {
    /// Return the last outcome, turning a success into [`ExecError::Exhausted`].
    Fail,
    /// Return the last outcome untouched.
    PassThrough,
}

/// A classifier, an attempt budget and a jitter source.
///
/// Built once and shared read-only by every call that uses it.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    name: &'static str,
    max_attempts: u32,
    classifier: Arc<dyn Classifier>,
    on_exhausted: Exhaustion,
    jitter: Arc<dyn Jitter>,
}

impl RetryPolicy {
    /// Create a policy allowing a single attempt.
    pub fn new(name: &'static str, classifier: impl Classifier + 'static) -> Self {
        Self {
            name,
            max_attempts: 1,
            classifier: Arc::new(classifier),
            on_exhausted: Exhaustion::Fail,
            jitter: Arc::new(RandomJitter),
        }
    }

    /// `429` handling with the default header-less wait.
    pub fn rate_limit() -> Self {
        Self::rate_limit_with(WaitStrategy::Jittered {
            base: RETRY_WAIT_MIN,
            spread: RETRY_WAIT_SPREAD,
        })
    }

    /// `429` handling with a custom header-less wait.
    pub fn rate_limit_with(fallback: WaitStrategy) -> Self {
        Self::new(
            "rate-limit",
            RateLimitClassifier::new(fallback).with_reset_jitter(true),
        )
        .max_attempts(MAX_RATE_LIMIT_ATTEMPTS)
    }

    /// `409` handling with the default wait.
    pub fn conflict() -> Self {
        Self::conflict_with(WaitStrategy::Jittered {
            base: RETRY_WAIT_MIN,
            spread: RETRY_WAIT_SPREAD,
        })
    }

    /// `409` handling with a custom wait.
    pub fn conflict_with(wait: WaitStrategy) -> Self {
        Self::new("conflict", StatusClassifier::new(409, wait)).max_attempts(MAX_CONFLICT_ATTEMPTS)
    }

    /// `404` handling with the default wait.
    pub fn not_found() -> Self {
        Self::not_found_with(WaitStrategy::Fixed(NOT_FOUND_WAIT))
    }

    /// `404` handling with a custom wait. The final 404 is handed back as-is.
    pub fn not_found_with(wait: WaitStrategy) -> Self {
        Self::new("not-found", StatusClassifier::new(404, wait))
            .max_attempts(MAX_NOT_FOUND_ATTEMPTS)
            .on_exhausted(Exhaustion::PassThrough)
    }

    /// 5xx handling with the default exponential wait.
    pub fn server_errors() -> Self {
        Self::server_errors_with(WaitStrategy::Exponential {
            initial: RETRY_WAIT_MIN,
            max: RETRY_WAIT_MAX,
            multiplier: 2.0,
        })
    }

    /// 5xx handling with a custom wait.
    pub fn server_errors_with(wait: WaitStrategy) -> Self {
        Self::new("server-error", ServerErrorClassifier::new(wait))
            .max_attempts(MAX_SERVER_ERROR_ATTEMPTS)
    }

    /// Set the total number of calls. Values below one are raised to one.
    #[must_use]
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.max_attempts = n.max(1);
        self
    }

    /// Set the exhaustion behaviour.
    #[must_use]
    pub fn on_exhausted(mut self, exhaustion: Exhaustion) -> Self {
        self.on_exhausted = exhaustion;
        self
    }

    /// Replace the jitter source.
    #[must_use]
    pub fn with_jitter(mut self, jitter: impl Jitter + 'static) -> Self {
        self.jitter = Arc::new(jitter);
        self
    }

    /// Policy name used in logs and errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Total number of calls allowed.
    pub fn attempts_allowed(&self) -> u32 {
        self.max_attempts
    }

    /// Classify the outcome of the given (1-indexed) attempt.
    pub fn decide(&self, meta: Option<&ResponseMeta>, attempt: u32, now: DateTime<Utc>) -> Decision {
        let cx = ClassifyContext {
            attempt,
            now,
            jitter: self.jitter.as_ref(),
        };
        self.classifier.classify(meta, &cx)
    }

    /// Finish a sequence whose last attempt was still retryable.
    pub fn exhaust<T, E>(&self, outcome: Attempt<T, E>, attempts: u32) -> Attempt<T, E>
    where
        E: From<ExecError>,
    {
        match (self.on_exhausted, outcome.result) {
            (Exhaustion::Fail, Ok(_)) => {
                let status = outcome.meta.as_ref().map(ResponseMeta::status).unwrap_or_default();
                Attempt::err(
                    ExecError::Exhausted {
                        policy: self.name,
                        attempts,
                        status,
                    }
                    .into(),
                    outcome.meta,
                )
            }
            (_, result) => Attempt::new(result, outcome.meta),
        }
    }
}

/// The policies a client applies, built once at construction.
#[derive(Debug, Clone)]
pub struct PolicySet {
    /// `429` policy.
    pub rate_limit: RetryPolicy,
    /// `409` policy.
    pub conflict: RetryPolicy,
    /// `404` policy.
    pub not_found: RetryPolicy,
    /// 5xx policy.
    pub server_errors: RetryPolicy,
}

impl Default for PolicySet {
    fn default() -> Self {
        Self {
            rate_limit: RetryPolicy::rate_limit(),
            conflict: RetryPolicy::conflict(),
            not_found: RetryPolicy::not_found(),
            server_errors: RetryPolicy::server_errors(),
        }
    }
}

impl PolicySet {
    /// Policies with the default budgets but no waiting and no jitter.
    pub fn immediate() -> Self {
        use crate::backoff::NoJitter;
        Self {
            rate_limit: RetryPolicy::rate_limit_with(WaitStrategy::None).with_jitter(NoJitter),
            conflict: RetryPolicy::conflict_with(WaitStrategy::None).with_jitter(NoJitter),
            not_found: RetryPolicy::not_found_with(WaitStrategy::None).with_jitter(NoJitter),
            server_errors: RetryPolicy::server_errors_with(WaitStrategy::None)
                .with_jitter(NoJitter),
        }
    }
}
