//! Per-batch retry state machine
//!
//! `Pending -> Requesting -> { Success | Retrying -> Requesting | Exhausted -> Fallback }`
//!
//! `Success` and `Fallback` are terminal. The adapter drives the machine,
//! performing the request in `Requesting` and the backoff sleep in
//! `Retrying`; everything here is pure.

use super::EmbeddingError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Cap on the exponential multiplier (2^6 = 64x the base delay)
const MAX_BACKOFF_SHIFT: u32 = 6;

/// Delay policy between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffPolicy {
    Fixed,
    Exponential,
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (1-based)
    pub fn delay(self, base: Duration, retry: u32) -> Duration {
        match self {
            BackoffPolicy::Fixed => base,
            BackoffPolicy::Exponential => {
                let shift = retry.saturating_sub(1).min(MAX_BACKOFF_SHIFT);
                base.saturating_mul(1u32 << shift)
            }
        }
    }
}

/// Lifecycle of one batch
#[derive(Debug, Clone, PartialEq)]
pub enum BatchState {
    Pending,
    Requesting { attempt: u32 },
    Retrying { attempt: u32, error: EmbeddingError },
    Success { vectors: Vec<Vec<f32>>, attempts: u32 },
    Exhausted { attempts: u32, error: EmbeddingError },
    Fallback { attempts: u32, error: EmbeddingError },
}

impl BatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BatchState::Success { .. } | BatchState::Fallback { .. })
    }

    /// Transition out of `Requesting` given the attempt's result
    ///
    /// A batch gets `1 + max_retries` attempts. Non-recoverable errors go
    /// straight to `Exhausted`.
    pub fn after_attempt(
        attempt: u32,
        result: Result<Vec<Vec<f32>>, EmbeddingError>,
        max_retries: u32,
    ) -> BatchState {
        match result {
            Ok(vectors) => BatchState::Success {
                vectors,
                attempts: attempt,
            },
            Err(error) if error.is_recoverable() && attempt <= max_retries => {
                BatchState::Retrying { attempt, error }
            }
            Err(error) => BatchState::Exhausted {
                attempts: attempt,
                error,
            },
        }
    }

    /// Transitions that do not need I/O
    ///
    /// `Requesting` is returned unchanged: leaving it requires the
    /// attempt's outcome (see `after_attempt`).
    pub fn advance(self) -> BatchState {
        match self {
            BatchState::Pending => BatchState::Requesting { attempt: 1 },
            BatchState::Retrying { attempt, .. } => BatchState::Requesting {
                attempt: attempt + 1,
            },
            BatchState::Exhausted { attempts, error } => BatchState::Fallback { attempts, error },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transport_err() -> EmbeddingError {
        EmbeddingError::Transport("connection refused".to_string())
    }

    #[test]
    fn test_fixed_backoff() {
        let base = Duration::from_millis(100);
        assert_eq!(BackoffPolicy::Fixed.delay(base, 1), base);
        assert_eq!(BackoffPolicy::Fixed.delay(base, 5), base);
    }

    #[test]
    fn test_exponential_backoff() {
        let base = Duration::from_millis(100);
        assert_eq!(BackoffPolicy::Exponential.delay(base, 1), base);
        assert_eq!(
            BackoffPolicy::Exponential.delay(base, 3),
            Duration::from_millis(400)
        );
        assert_eq!(
            BackoffPolicy::Exponential.delay(base, 50),
            Duration::from_millis(6400)
        );
    }

    #[test]
    fn test_success_path() {
        let state = BatchState::Pending.advance();
        assert_eq!(state, BatchState::Requesting { attempt: 1 });

        let state = BatchState::after_attempt(1, Ok(vec![vec![1.0]]), 2);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_retry_then_fallback() {
        // max_retries = 1: attempt 1 retries, attempt 2 exhausts
        let state = BatchState::after_attempt(1, Err(transport_err()), 1);
        assert!(matches!(state, BatchState::Retrying { attempt: 1, .. }));
        assert_eq!(state.advance(), BatchState::Requesting { attempt: 2 });

        let state = BatchState::after_attempt(2, Err(transport_err()), 1);
        assert!(matches!(state, BatchState::Exhausted { attempts: 2, .. }));
        assert!(!state.is_terminal());

        let state = state.advance();
        assert!(matches!(state, BatchState::Fallback { attempts: 2, .. }));
        assert!(state.is_terminal());
    }

    #[test]
    fn test_invalid_config_not_retried() {
        let err = EmbeddingError::InvalidConfig("bad".to_string());
        let state = BatchState::after_attempt(1, Err(err), 3);
        assert!(matches!(state, BatchState::Exhausted { attempts: 1, .. }));
    }
}
