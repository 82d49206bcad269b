//! Bounded polling and cancellation
//!
//! Every wait on a finished register goes through [`poll_until`], which spins
//! briefly, then yields, and gives up with `Timeout` when the policy's bound
//! is exceeded or with `Cancelled` when the token is tripped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Limits applied to a busy-wait
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollPolicy {
    /// Wall-clock deadline. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Maximum number of condition checks. `None` is unlimited.
    pub max_polls: Option<u64>,
    /// Checks performed with a CPU spin hint before switching to `yield_now`
    pub spin_before_yield: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(10)),
            max_polls: None,
            spin_before_yield: 64,
        }
    }
}

impl PollPolicy {
    /// Poll forever (no deadline, no poll limit)
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            max_polls: None,
            ..Self::default()
        }
    }

    /// Give up after `max_polls` checks, with no deadline
    pub fn with_max_polls(max_polls: u64) -> Self {
        Self {
            timeout: None,
            max_polls: Some(max_polls),
            ..Self::default()
        }
    }

    /// Give up after `timeout`
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            ..Self::default()
        }
    }
}

/// Shared abort flag
///
/// Clones observe the same flag, so a token handed to an interrupt handler
/// can stop an orchestrator running on another thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, untripped token
    pub fn new() -> Self {
        Self::default()
    }

    /// Trip the token
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Clear the token so work can resume
    pub fn reset(&self) {
        self.0.store(false, Ordering::SeqCst);
    }

    /// Has the token been tripped?
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` if the token has been tripped
    pub fn check(&self, what: &'static str) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled { what })
        } else {
            Ok(())
        }
    }
}

/// Poll `cond` until it returns true.
///
/// Returns the number of checks performed.
///
/// # Errors
///
/// - `Cancelled` if `cancel` is tripped before the condition holds
/// - `Timeout` if the policy's deadline or poll limit is exceeded
pub fn poll_until<F>(
    policy: &PollPolicy,
    cancel: &CancelToken,
    what: &'static str,
    mut cond: F,
) -> Result<u64>
where
    F: FnMut() -> bool,
{
    let start = Instant::now();
    let mut polls: u64 = 0;
    loop {
        polls += 1;
        if cond() {
            tracing::trace!(what, polls, "poll satisfied");
            return Ok(polls);
        }
        cancel.check(what)?;

        let exceeded_polls = policy.max_polls.is_some_and(|max| polls >= max);
        let exceeded_time = policy.timeout.is_some_and(|t| start.elapsed() >= t);
        if exceeded_polls || exceeded_time {
            return Err(Error::Timeout {
                what,
                elapsed: start.elapsed(),
                polls,
            });
        }

        if polls < u64::from(policy.spin_before_yield) {
            std::hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_counts_checks() {
        let mut remaining = 5;
        let polls = poll_until(&PollPolicy::default(), &CancelToken::new(), "test", || {
            remaining -= 1;
            remaining == 0
        })
        .unwrap();
        assert_eq!(polls, 5);
    }

    #[test]
    fn test_poll_limit() {
        let err = poll_until(
            &PollPolicy::with_max_polls(10),
            &CancelToken::new(),
            "never",
            || false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Timeout { polls: 10, .. }));
    }

    #[test]
    fn test_poll_deadline() {
        let err = poll_until(
            &PollPolicy::with_timeout(Duration::from_millis(5)),
            &CancelToken::new(),
            "never",
            || false,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Timeout { what: "never", .. }));
    }

    #[test]
    fn test_poll_cancelled() {
        let token = CancelToken::new();
        let remote = token.clone();
        let mut n = 0;
        let err = poll_until(&PollPolicy::unbounded(), &token, "cancel", || {
            n += 1;
            if n == 3 {
                remote.cancel();
            }
            false
        })
        .unwrap_err();
        assert!(matches!(err, Error::Cancelled { what: "cancel" }));

        token.reset();
        assert!(token.check("after reset").is_ok());
    }
}
