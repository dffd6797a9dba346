//! The value an operation hands back: its result plus transport metadata.

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

/// Response header carrying the rate-limit reset time in epoch milliseconds.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";

/// Transport metadata of one remote call.
#[derive(Debug, Clone, Default)]
pub struct ResponseMeta {
    status: u16,
    headers: HeaderMap,
}

impl ResponseMeta {
    /// Create metadata for a status with no headers.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
        }
    }

    /// Create metadata from a status and a full header map.
    pub fn with_headers(status: u16, headers: HeaderMap) -> Self {
        Self { status, headers }
    }

    /// Add a header. Invalid names or values are ignored.
    #[must_use]
    pub fn header_value(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Whether the status is 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Look up a header, case-insensitively. Non-UTF-8 values read as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The raw `X-RateLimit-Reset` value, if present.
    pub fn rate_limit_reset(&self) -> Option<&str> {
        self.header(RATE_LIMIT_RESET_HEADER)
    }

    /// All response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }
}

/// Result of one operation invocation, or of a whole retry sequence.
///
/// Mirrors the `(result, response, error)` triple of a generated API client:
/// a failed call may still carry the response that caused it.
#[derive(Debug)]
pub struct Attempt<T, E> {
    /// Decoded value or the operation's error.
    pub result: Result<T, E>,
    /// Metadata of the response, absent when no response was received.
    pub meta: Option<ResponseMeta>,
}

impl<T, E> Attempt<T, E> {
    /// Create an attempt from its parts.
    pub fn new(result: Result<T, E>, meta: Option<ResponseMeta>) -> Self {
        Self { result, meta }
    }

    /// A successful call.
    pub fn ok(value: T, meta: ResponseMeta) -> Self {
        Self::new(Ok(value), Some(meta))
    }

    /// A failed call, with the response if one arrived.
    pub fn err(error: E, meta: Option<ResponseMeta>) -> Self {
        Self::new(Err(error), meta)
    }

    /// Status of the response, if any.
    pub fn status(&self) -> Option<u16> {
        self.meta.as_ref().map(ResponseMeta::status)
    }

    /// Whether the response was a 404.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// Drop the metadata.
    pub fn into_result(self) -> Result<T, E> {
        self.result
    }

    /// Split into result and metadata.
    pub fn into_parts(self) -> (Result<T, E>, Option<ResponseMeta>) {
        (self.result, self.meta)
    }

    /// Map the success value, keeping the metadata.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Attempt<U, E> {
        Attempt {
            result: self.result.map(f),
            meta: self.meta,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let meta = ResponseMeta::new(429).header_value("X-RateLimit-Reset", "1700000000000");
        assert_eq!(meta.rate_limit_reset(), Some("1700000000000"));
        assert_eq!(meta.header("X-RATELIMIT-RESET"), Some("1700000000000"));
    }

    #[test]
    fn test_invalid_header_is_ignored() {
        let meta = ResponseMeta::new(200).header_value("bad header", "x");
        assert!(meta.headers().is_empty());
    }

    #[test]
    fn test_attempt_accessors() {
        let attempt: Attempt<(), &str> = Attempt::err("gone", Some(ResponseMeta::new(404)));
        assert!(attempt.is_not_found());
        assert_eq!(attempt.status(), Some(404));
        assert_eq!(attempt.into_result(), Err("gone"));

        let attempt: Attempt<u32, &str> = Attempt::ok(2, ResponseMeta::new(200));
        let doubled = attempt.map(|v| v * 2);
        assert_eq!(doubled.status(), Some(200));
        assert_eq!(doubled.into_result(), Ok(4));
    }

    #[test]
    fn test_success_range() {
        assert!(ResponseMeta::new(204).is_success());
        assert!(!ResponseMeta::new(301).is_success());
        assert!(!ResponseMeta::new(429).is_success());
    }
}
