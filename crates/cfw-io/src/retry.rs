//! Shared retry policy for every transport call (tile service, direct COG
//! range reads, object store, STAC registration). Capped exponential
//! backoff on `CfwError::Transport`/`CfwError::Io`; every other error
//! kind is permanent and propagates on the first attempt.

use std::time::Duration;

use backoff::{retry as backoff_retry, Error as BackoffError, ExponentialBackoff};
use cfw_core::{CfwError, CfwResult};
use tracing::warn;

/// Runs `op` under a capped exponential backoff, retrying only
/// `CfwError::Transport`/`CfwError::Io`. At least 3 attempts are made
/// before giving up; the final error is returned unchanged.
pub fn with_backoff<T>(
    label: &str,
    mut op: impl FnMut() -> CfwResult<T>,
) -> CfwResult<T> {
    let policy = ExponentialBackoff {
        initial_interval: Duration::from_millis(250),
        max_interval: Duration::from_secs(10),
        max_elapsed_time: Some(Duration::from_secs(60)),
        multiplier: 2.0,
        ..ExponentialBackoff::default()
    };

    let mut attempt: u32 = 0;
    backoff_retry(policy, || {
        attempt += 1;
        match op() {
            Ok(v) => Ok(v),
            Err(err) if err.is_retriable() => {
                warn!(label, attempt, error = %err, "transport call failed, retrying");
                Err(BackoffError::transient(err))
            }
            Err(err) => Err(BackoffError::permanent(err)),
        }
    })
    .map_err(|err| match err {
        BackoffError::Permanent(e) => e,
        BackoffError::Transient { err, .. } => err,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn succeeds_after_transient_failures() {
        let calls = RefCell::new(0);
        let result = with_backoff("test", || {
            *calls.borrow_mut() += 1;
            if *calls.borrow() < 3 {
                Err(CfwError::Transport("flaky".into()))
            } else {
                Ok(42)
            }
        });
        assert_eq!(result.unwrap(), 42);
        assert_eq!(*calls.borrow(), 3);
    }

    #[test]
    fn permanent_errors_are_not_retried() {
        let calls = RefCell::new(0);
        let result: CfwResult<()> = with_backoff("test", || {
            *calls.borrow_mut() += 1;
            Err(CfwError::Config("bad arg".into()))
        });
        assert!(result.is_err());
        assert_eq!(*calls.borrow(), 1);
    }
}
