//! Load state tracking for a single document URL

use std::time::Duration;

use super::decode::DecodeError;
use super::fetch::FetchError;
use super::{LOAD_TIMEOUT, MAX_ATTEMPTS};

/// Where a document load currently stands.
///
/// Per URL the engine produces exactly one terminal sequence
/// `Loading(0) -> [Loading(n) ->]* -> Ready | Empty | Error`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing to show (no URL)
    Idle,

    /// Fetch+decode in flight; `attempt` is 0-based and monotonic per URL
    Loading { attempt: u32 },

    /// Document decoded and pages painted (or painting)
    Ready { page_count: usize },

    /// Document decoded but has no pages
    Empty,

    /// All attempts exhausted
    Error { message: String, attempt: u32 },
}

impl LoadState {
    /// True once no further transitions can happen for this URL
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoadState::Ready { .. } | LoadState::Empty | LoadState::Error { .. }
        )
    }
}

/// Why a load attempt failed.
///
/// All three variants route through the same retry path; the attempt counter
/// does not distinguish them. Only the final message shown after the last
/// attempt differs.
#[derive(Debug, thiserror::Error)]
pub enum LoadFault {
    #[error("network: {0}")]
    Network(#[from] FetchError),

    #[error("decode: {0}")]
    Decode(#[from] DecodeError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Retry and timeout policy for document loads.
///
/// Pure decision logic; the engine owns the clock and the dispatching.
#[derive(Clone, Debug)]
pub struct LoadPolicy {
    /// Total attempts per URL, including the first
    pub max_attempts: u32,
    /// Budget for one fetch+decode attempt
    pub timeout: Duration,
}

impl Default for LoadPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            timeout: LOAD_TIMEOUT,
        }
    }
}

impl LoadPolicy {
    /// State after attempt `attempt` failed: the next `Loading`, or terminal
    /// `Error` once the budget is exhausted. Retries are immediate; there is
    /// no backoff.
    #[must_use]
    pub fn after_failure(&self, attempt: u32, fault: &LoadFault) -> LoadState {
        let next = attempt + 1;
        if next < self.max_attempts {
            LoadState::Loading { attempt: next }
        } else {
            LoadState::Error {
                message: fault.to_string(),
                attempt,
            }
        }
    }

    /// State after a successful decode
    #[must_use]
    pub fn after_success(&self, page_count: usize) -> LoadState {
        if page_count == 0 {
            LoadState::Empty
        } else {
            LoadState::Ready { page_count }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeout_fault() -> LoadFault {
        LoadFault::Timeout(Duration::from_secs(20))
    }

    #[test]
    fn failures_walk_through_every_attempt_then_stop() {
        let policy = LoadPolicy::default();

        assert_eq!(
            policy.after_failure(0, &timeout_fault()),
            LoadState::Loading { attempt: 1 }
        );
        assert_eq!(
            policy.after_failure(1, &timeout_fault()),
            LoadState::Loading { attempt: 2 }
        );

        let terminal = policy.after_failure(2, &timeout_fault());
        assert!(matches!(terminal, LoadState::Error { attempt: 2, .. }));
    }

    #[test]
    fn final_error_carries_the_fault_message() {
        let policy = LoadPolicy {
            max_attempts: 1,
            timeout: Duration::from_secs(5),
        };

        match policy.after_failure(0, &timeout_fault()) {
            LoadState::Error { message, .. } => assert!(message.contains("timed out")),
            other => panic!("expected error, got {other:?}"),
        }
    }

    #[test]
    fn success_distinguishes_empty_documents() {
        let policy = LoadPolicy::default();

        assert_eq!(policy.after_success(0), LoadState::Empty);
        assert_eq!(
            policy.after_success(12),
            LoadState::Ready { page_count: 12 }
        );
    }

    #[test]
    fn terminal_states() {
        assert!(!LoadState::Idle.is_terminal());
        assert!(!LoadState::Loading { attempt: 1 }.is_terminal());
        assert!(LoadState::Empty.is_terminal());
        assert!(LoadState::Ready { page_count: 3 }.is_terminal());
        assert!(LoadState::Error {
            message: "nope".into(),
            attempt: 2
        }
        .is_terminal());
    }
}
