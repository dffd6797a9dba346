//! Errors raised by the execution layer itself.
//!
//! Operation errors belong to the caller and are never wrapped. The layer only
//! injects its own kinds through `E: From<ExecError>`.

use std::fmt;
use thiserror::Error;

/// Where a call sequence was suspended when it was cancelled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suspension {
    /// Waiting for a concurrency gate slot.
    AwaitingSlot,
    /// Sleeping between two attempts.
    BackingOff,
}

impl fmt::Display for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingSlot => f.write_str("waiting for a concurrency slot"),
            Self::BackingOff => f.write_str("backing off before a retry"),
        }
    }
}

/// Errors produced by the gate, the retry executor and the paginator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The caller's cancellation token fired at a suspension point.
    #[error("operation cancelled while {0}")]
    Cancelled(Suspension),

    /// A retryable status was still returned after the last allowed attempt.
    #[error("{policy} retries exhausted after {attempts} attempts (last status {status})")]
    Exhausted {
        /// Name of the policy that gave up.
        policy: &'static str,
        /// Number of calls made.
        attempts: u32,
        /// Status of the last response.
        status: u16,
    },

    /// The concurrency gate was closed while acquiring a slot.
    #[error("concurrency gate closed")]
    GateClosed,

    /// A page came back empty before the reported total was reached.
    #[error("pagination stalled at offset {offset}: server reported {total} items")]
    PageStalled {
        /// Offset of the empty page.
        offset: usize,
        /// Total reported by the server.
        total: usize,
    },
}

impl ExecError {
    /// Check if this is a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    /// Check if this is an exhausted retry sequence.
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted { .. })
    }

    /// Get the last observed status for exhausted sequences.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Exhausted { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancelled_is_not_exhausted() {
        let err = ExecError::Cancelled(Suspension::BackingOff);
        assert!(err.is_cancelled());
        assert!(!err.is_exhausted());
        assert_eq!(err.status(), None);
    }

    #[test]
    fn test_exhausted_display() {
        let err = ExecError::Exhausted {
            policy: "rate-limit",
            attempts: 21,
            status: 429,
        };
        assert_eq!(
            err.to_string(),
            "rate-limit retries exhausted after 21 attempts (last status 429)"
        );
        assert_eq!(err.status(), Some(429));
    }

    #[test]
    fn test_suspension_display() {
        let err = ExecError::Cancelled(Suspension::AwaitingSlot);
        assert_eq!(
            err.to_string(),
            "operation cancelled while waiting for a concurrency slot"
        );
    }
}
