//! Classification of a response into a retry decision.

use crate::backoff::{duration_until, parse_reset, Jitter, WaitStrategy};
use crate::outcome::ResponseMeta;
use crate::policy::MAX_RESET_WAIT;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::Duration;

/// What to do with the outcome of one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Return the outcome to the caller. Also used for statuses a policy does not handle.
    Succeed,
    /// Return the outcome to the caller as a non-retryable failure.
    FailFatal,
    /// Retry after waiting.
    RetryAfter(Duration),
}

impl Decision {
    /// Check if this decision asks for another attempt.
    pub fn is_retry(&self) -> bool {
        matches!(self, Decision::RetryAfter(_))
    }
}

/// Inputs a classifier may use besides the response itself.
#[derive(Clone, Copy)]
pub struct ClassifyContext<'a> {
    /// Attempts made so far (1-indexed).
    pub attempt: u32,
    /// Wall-clock time the response was observed.
    pub now: DateTime<Utc>,
    /// Jitter source of the policy.
    pub jitter: &'a dyn Jitter,
}

impl fmt::Debug for ClassifyContext<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifyContext")
            .field("attempt", &self.attempt)
            .field("now", &self.now)
            .finish_non_exhaustive()
    }
}

/// Maps transport metadata to a [`Decision`].
///
/// `meta` is `None` when the call failed before a response arrived; no
/// classifier in this crate retries those.
pub trait Classifier: Send + Sync + fmt::Debug {
    /// Classify one outcome.
    fn classify(&self, meta: Option<&ResponseMeta>, cx: &ClassifyContext<'_>) -> Decision;
}

/// Retries `429 Too Many Requests`, honouring `X-RateLimit-Reset`.
#[derive(Debug, Clone)]
pub struct RateLimitClassifier {
    /// Wait used when the reset header is missing or unparsable.
    pub fallback: WaitStrategy,
    /// Add `[0, wait)` jitter to header-dictated waits.
    pub reset_jitter: bool,
    /// Upper bound of header-dictated waits, jitter included.
    pub max_reset_wait: Duration,
}

impl RateLimitClassifier {
    /// Create a classifier with the given header-less wait.
    pub fn new(fallback: WaitStrategy) -> Self {
        Self {
            fallback,
            reset_jitter: false,
            max_reset_wait: MAX_RESET_WAIT,
        }
    }

    /// Bound waits derived from the reset header.
    #[must_use]
    pub fn with_max_reset_wait(mut self, max: Duration) -> Self {
        self.max_reset_wait = max;
        self
    }

    /// Spread header-dictated waits over `[wait, 2 * wait)`.
    #[must_use]
    pub fn with_reset_jitter(mut self, enabled: bool) -> Self {
        self.reset_jitter = enabled;
        self
    }
}

impl Classifier for RateLimitClassifier {
    fn classify(&self, meta: Option<&ResponseMeta>, cx: &ClassifyContext<'_>) -> Decision {
        let Some(meta) = meta else {
            return Decision::FailFatal;
        };

        match meta.status() {
            429 => match meta.rate_limit_reset().and_then(parse_reset) {
                Some(reset) => {
                    let wait = duration_until(reset, cx.now).min(self.max_reset_wait);
                    let wait = if self.reset_jitter {
                        wait.saturating_add(cx.jitter.sample(wait))
                    } else {
                        wait
                    };
                    Decision::RetryAfter(wait.min(self.max_reset_wait))
                }
                None => Decision::RetryAfter(self.fallback.calculate(cx.attempt, cx.jitter)),
            },
            _ if meta.is_success() => Decision::Succeed,
            _ => Decision::FailFatal,
        }
    }
}

/// Retries a single status after a wait; everything else is passed through.
///
/// Used for `409 Conflict` and for `404 Not Found` right after a create.
#[derive(Debug, Clone)]
pub struct StatusClassifier {
    /// Status to retry.
    pub status: u16,
    /// Wait between attempts.
    pub wait: WaitStrategy,
}

impl StatusClassifier {
    /// Create a classifier for one status.
    pub fn new(status: u16, wait: WaitStrategy) -> Self {
        Self { status, wait }
    }
}

impl Classifier for StatusClassifier {
    fn classify(&self, meta: Option<&ResponseMeta>, cx: &ClassifyContext<'_>) -> Decision {
        match meta {
            Some(meta) if meta.status() == self.status => {
                Decision::RetryAfter(self.wait.calculate(cx.attempt, cx.jitter))
            }
            _ => Decision::Succeed,
        }
    }
}

/// Retries 5xx responses except `501 Not Implemented`.
#[derive(Debug, Clone)]
pub struct ServerErrorClassifier {
    /// Wait between attempts.
    pub wait: WaitStrategy,
}

impl ServerErrorClassifier {
    /// Create a server-error classifier.
    pub fn new(wait: WaitStrategy) -> Self {
        Self { wait }
    }
}

impl Classifier for ServerErrorClassifier {
    fn classify(&self, meta: Option<&ResponseMeta>, cx: &ClassifyContext<'_>) -> Decision {
        match meta.map(ResponseMeta::status) {
            Some(501) => Decision::FailFatal,
            Some(status) if (500..=599).contains(&status) => {
                Decision::RetryAfter(self.wait.calculate(cx.attempt, cx.jitter))
            }
            _ => Decision::Succeed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backoff::{NoJitter, SeededJitter};
    use chrono::Duration as ChronoDuration;
    use rstest::rstest;

    fn cx(now: DateTime<Utc>) -> ClassifyContext<'static> {
        ClassifyContext {
            attempt: 1,
            now,
            jitter: &NoJitter,
        }
    }

    fn rate_limit() -> RateLimitClassifier {
        RateLimitClassifier::new(WaitStrategy::Fixed(Duration::from_millis(300)))
    }

    #[test]
    fn test_rate_limit_future_reset() {
        let now = Utc::now();
        let reset = (now + ChronoDuration::milliseconds(100)).timestamp_millis();
        let meta = ResponseMeta::new(429).header_value("X-RateLimit-Reset", &reset.to_string());

        let Decision::RetryAfter(wait) = rate_limit().classify(Some(&meta), &cx(now)) else {
            panic!("expected a retry");
        };
        assert!(wait <= Duration::from_millis(100));
        assert!(wait >= Duration::from_millis(99));
    }

    #[test]
    fn test_rate_limit_past_reset_retries_immediately() {
        let now = Utc::now();
        let reset = (now - ChronoDuration::milliseconds(100)).timestamp_millis();
        let meta = ResponseMeta::new(429).header_value("X-RateLimit-Reset", &reset.to_string());

        let decision = rate_limit()
            .with_reset_jitter(true)
            .classify(Some(&meta), &cx(now));
        assert_eq!(decision, Decision::RetryAfter(Duration::ZERO));
    }

    #[rstest]
    #[case::beyond_chrono_range(i64::MAX)]
    #[case::year_2286(9_999_999_999_999)]
    fn test_rate_limit_far_future_reset_is_capped(#[case] reset: i64) {
        let meta = ResponseMeta::new(429).header_value("X-RateLimit-Reset", &reset.to_string());

        let decision = rate_limit()
            .with_reset_jitter(true)
            .classify(Some(&meta), &cx(Utc::now()));
        assert_eq!(decision, Decision::RetryAfter(MAX_RESET_WAIT));
    }

    #[test]
    fn test_rate_limit_custom_reset_cap() {
        let now = Utc::now();
        let reset = (now + ChronoDuration::hours(2)).timestamp_millis();
        let meta = ResponseMeta::new(429).header_value("X-RateLimit-Reset", &reset.to_string());

        let decision = rate_limit()
            .with_max_reset_wait(Duration::from_secs(5))
            .classify(Some(&meta), &cx(now));
        assert_eq!(decision, Decision::RetryAfter(Duration::from_secs(5)));
    }

    #[rstest]
    #[case(None)]
    #[case(Some("not-a-number"))]
    #[case(Some(""))]
    fn test_rate_limit_without_usable_header(#[case] header: Option<&str>) {
        let mut meta = ResponseMeta::new(429);
        if let Some(value) = header {
            meta = meta.header_value("X-RateLimit-Reset", value);
        }
        let decision = rate_limit().classify(Some(&meta), &cx(Utc::now()));
        assert_eq!(decision, Decision::RetryAfter(Duration::from_millis(300)));
    }

    #[test]
    fn test_rate_limit_reset_jitter_bounds() {
        let now = Utc::now();
        let reset = (now + ChronoDuration::milliseconds(200)).timestamp_millis();
        let meta = ResponseMeta::new(429).header_value("X-RateLimit-Reset", &reset.to_string());
        let jitter = SeededJitter::new(3);
        let cx = ClassifyContext {
            attempt: 1,
            now,
            jitter: &jitter,
        };

        let Decision::RetryAfter(wait) = rate_limit()
            .with_reset_jitter(true)
            .classify(Some(&meta), &cx)
        else {
            panic!("expected a retry");
        };
        assert!(wait >= Duration::from_millis(199));
        assert!(wait < Duration::from_millis(400));
    }

    #[rstest]
    #[case(200, Decision::Succeed)]
    #[case(204, Decision::Succeed)]
    #[case(400, Decision::FailFatal)]
    #[case(404, Decision::FailFatal)]
    #[case(409, Decision::FailFatal)]
    #[case(500, Decision::FailFatal)]
    fn test_rate_limit_other_statuses(#[case] status: u16, #[case] expected: Decision) {
        let meta = ResponseMeta::new(status);
        assert_eq!(rate_limit().classify(Some(&meta), &cx(Utc::now())), expected);
    }

    #[test]
    fn test_rate_limit_without_response_is_fatal() {
        assert_eq!(rate_limit().classify(None, &cx(Utc::now())), Decision::FailFatal);
    }

    #[rstest]
    #[case(409, true)]
    #[case(200, false)]
    #[case(404, false)]
    #[case(429, false)]
    #[case(500, false)]
    fn test_conflict_only_intercepts_409(#[case] status: u16, #[case] retried: bool) {
        let classifier = StatusClassifier::new(409, WaitStrategy::Fixed(Duration::from_millis(5)));
        let decision = classifier.classify(Some(&ResponseMeta::new(status)), &cx(Utc::now()));
        if retried {
            assert_eq!(decision, Decision::RetryAfter(Duration::from_millis(5)));
        } else {
            assert_eq!(decision, Decision::Succeed);
        }
    }

    #[test]
    fn test_status_classifier_without_response_passes_through() {
        let classifier = StatusClassifier::new(404, WaitStrategy::None);
        assert_eq!(classifier.classify(None, &cx(Utc::now())), Decision::Succeed);
    }

    #[rstest]
    #[case(500, true)]
    #[case(502, true)]
    #[case(503, true)]
    #[case(599, true)]
    #[case(501, false)]
    #[case(429, false)]
    #[case(200, false)]
    fn test_server_errors(#[case] status: u16, #[case] retried: bool) {
        let classifier = ServerErrorClassifier::new(WaitStrategy::Fixed(Duration::from_millis(1)));
        let decision = classifier.classify(Some(&ResponseMeta::new(status)), &cx(Utc::now()));
        assert_eq!(decision.is_retry(), retried);
    }
}
