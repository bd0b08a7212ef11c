use std::time::Duration;

use rand::Rng;

use super::transport::TransportError;
use crate::config::UploadSection;

#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Wait, then resend the same request. `retry` is the 1-based retry number.
    Retry { retry: u32, wait: Duration },
    Exhausted,
    NotRetriable,
}

/// Exponential backoff with one retry budget shared by transient HTTP
/// statuses and transport failures.
#[derive(Debug, Clone)]
pub struct UploadRetryPolicy {
    max_retries: u32,
    retriable_statuses: Vec<u16>,
}

impl Default for UploadRetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            retriable_statuses: vec![500, 502, 503, 504],
        }
    }
}

impl UploadRetryPolicy {
    pub fn new(max_retries: u32, retriable_statuses: Vec<u16>) -> Self {
        Self {
            max_retries,
            retriable_statuses,
        }
    }

    pub fn from_config(config: &UploadSection) -> Self {
        Self::new(config.max_retries, config.retriable_statuses.clone())
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn is_retriable(&self, error: &TransportError) -> bool {
        match error {
            TransportError::Http { status, .. } => self.retriable_statuses.contains(status),
            TransportError::Transport(_) | TransportError::NoProgress { .. } => true,
        }
    }

    /// `2^retry` seconds plus up to one second of jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        let base = 2f64.powi(retry.min(62) as i32);
        let jitter: f64 = rand::thread_rng().gen::<f64>();
        Duration::from_secs_f64(base + jitter)
    }

    /// Charges `error` against `retries_used` and says what to do next.
    pub fn decide(&self, retries_used: &mut u32, error: &TransportError) -> RetryDecision {
        if !self.is_retriable(error) {
            return RetryDecision::NotRetriable;
        }
        *retries_used += 1;
        if *retries_used > self.max_retries {
            return RetryDecision::Exhausted;
        }
        RetryDecision::Retry {
            retry: *retries_used,
            wait: self.backoff(*retries_used),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http(status: u16) -> TransportError {
        TransportError::Http {
            status,
            body: String::new(),
        }
    }

    #[test]
    fn backoff_grows_exponentially_with_jitter() {
        let policy = UploadRetryPolicy::default();
        for retry in 1..=5u32 {
            let wait = policy.backoff(retry).as_secs_f64();
            let base = 2f64.powi(retry as i32);
            assert!(wait >= base && wait < base + 1.0, "retry {retry}: {wait}");
        }
    }

    #[test]
    fn statuses_and_transport_errors_share_budget() {
        let policy = UploadRetryPolicy::default();
        let mut used = 0;
        let errors = [
            http(503),
            TransportError::Transport("reset".into()),
            http(500),
            TransportError::Transport("timeout".into()),
            http(504),
        ];
        for (index, error) in errors.iter().enumerate() {
            match policy.decide(&mut used, error) {
                RetryDecision::Retry { retry, .. } => assert_eq!(retry as usize, index + 1),
                other => panic!("unexpected {other:?}"),
            }
        }
        assert_eq!(policy.decide(&mut used, &http(502)), RetryDecision::Exhausted);
    }

    #[test]
    fn client_errors_do_not_consume_budget() {
        let policy = UploadRetryPolicy::default();
        let mut used = 0;
        assert_eq!(policy.decide(&mut used, &http(403)), RetryDecision::NotRetriable);
        assert_eq!(policy.decide(&mut used, &http(400)), RetryDecision::NotRetriable);
        assert_eq!(used, 0);
    }
}
