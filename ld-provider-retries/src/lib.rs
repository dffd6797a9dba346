//! # ld-provider-retries
//!
//! Execution policy for calls against the LaunchDarkly REST API.
//!
//! The API rate-limits aggressively, serializes conflicting writes and is only
//! eventually consistent after a create. This crate turns a single logical
//! call into a reliably completed one without knowing what the call does.
//!
//! ## Core Concepts
//!
//! - **[`Attempt`]**: what an operation returns, a result plus [`ResponseMeta`]
//! - **[`RetryPolicy`]**: a [`Classifier`] and an attempt budget
//! - **[`RetryExecutor`]**: runs an operation under a policy
//! - **[`ConcurrencyGate`]**: caps remote calls in flight across the process
//! - **[`Paginator`]**: drains an offset/limit list endpoint
//!
//! ## Policies
//!
//! - [`RetryPolicy::rate_limit`]: `429`, waiting for `X-RateLimit-Reset`
//! - [`RetryPolicy::conflict`]: `409` from concurrent patches
//! - [`RetryPolicy::not_found`]: `404` right after a create
//! - [`RetryPolicy::server_errors`]: 5xx with exponential backoff
//!
//! Each policy only intercepts its own status and passes everything else
//! through, so executors nest freely.
//!
//! ## Example
//!
//! ```ignore
//! use ld_provider_retries::prelude::*;
//!
//! let executor = RetryExecutor::new(ConcurrencyGate::new(1));
//! let cancel = CancellationToken::new();
//! let rate_limit = RetryPolicy::rate_limit();
//! let conflict = RetryPolicy::conflict();
//!
//! let outcome = executor
//!     .execute(&rate_limit, &cancel, || {
//!         executor.execute(&conflict, &cancel, || patch_flag(&ops))
//!     })
//!     .await;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod classify;
pub mod error;
pub mod executor;
pub mod gate;
pub mod outcome;
pub mod paginate;
pub mod policy;
pub mod transport;

// Re-exports
pub use backoff::{duration_until, parse_reset, Jitter, NoJitter, RandomJitter, SeededJitter, WaitStrategy};
pub use classify::{
    ClassifyContext, Classifier, Decision, RateLimitClassifier, ServerErrorClassifier,
    StatusClassifier,
};
pub use error::{ExecError, Suspension};
pub use executor::{AttemptInfo, RetryExecutor, RetryState};
pub use gate::ConcurrencyGate;
pub use outcome::{Attempt, ResponseMeta, RATE_LIMIT_RESET_HEADER};
pub use paginate::{Page, Paginator};
pub use policy::{Exhaustion, PolicySet, RetryPolicy};
pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Attempt, CancellationToken, ConcurrencyGate, Decision, ExecError, Page, Paginator,
        PolicySet, ResponseMeta, RetryExecutor, RetryPolicy, WaitStrategy,
    };
}
