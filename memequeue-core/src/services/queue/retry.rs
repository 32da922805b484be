// File: memequeue-core/src/services/queue/retry.rs
//
// Conflict handling for the queue operations. Every public queue operation
// runs as one serializable transaction; when Postgres reports a serialization
// failure, or a guarded update inside the attempt loses its race
// (Error::QueueConflict), the whole attempt is re-run from a fresh read with
// exponential backoff plus jitter, up to a bounded number of tries.

use std::future::Future;
use rand::Rng;
use sqlx::{Pool, Postgres, Transaction};
use tokio::time::{sleep, Duration};
use tracing::debug;
use memequeue_common::error::Error;

pub const MAX_ATTEMPTS: u32 = 5;
const BASE_BACKOFF_MS: u64 = 10;

/// Begin a transaction at serializable isolation. The SET must be the first
/// statement of the transaction.
pub async fn begin_serializable(
    pool: &Pool<Postgres>,
) -> Result<Transaction<'static, Postgres>, Error> {
    let mut tx = pool.begin().await?;
    sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
        .execute(&mut *tx)
        .await?;
    Ok(tx)
}

/// Postgres signals a lost serializable race as SQLSTATE 40001
/// (serialization_failure) or 40P01 (deadlock_detected).
pub fn is_serialization_failure(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            matches!(db_err.code().as_deref(), Some("40001") | Some("40P01"))
        }
        _ => false,
    }
}

pub fn is_retryable(err: &Error) -> bool {
    match err {
        Error::QueueConflict(_) => true,
        Error::Database(e) => is_serialization_failure(e),
        _ => false,
    }
}

/// Run `attempt` until it succeeds, fails non-transiently, or the retry
/// budget runs out. Exhaustion surfaces as `Error::ConcurrentModification`;
/// callers never see a raw conflict.
pub async fn run_with_retries<T, F, Fut>(op_name: &str, mut attempt: F) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut backoff_ms = BASE_BACKOFF_MS;
    for tries in 1..=MAX_ATTEMPTS {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if is_retryable(&e) => {
                if tries == MAX_ATTEMPTS {
                    return Err(Error::ConcurrentModification(format!(
                        "{} still conflicting after {} attempts",
                        op_name, MAX_ATTEMPTS
                    )));
                }
                let jitter = rand::rng().random_range(0..=backoff_ms);
                debug!(
                    "{} lost a race on attempt {}/{} ({}); retrying in {}ms",
                    op_name,
                    tries,
                    MAX_ATTEMPTS,
                    e,
                    backoff_ms + jitter
                );
                sleep(Duration::from_millis(backoff_ms + jitter)).await;
                backoff_ms *= 2;
            }
            Err(e) => return Err(e),
        }
    }
    unreachable!("retry loop returns within the attempt budget")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::assert_ok;

    #[test]
    fn queue_conflict_is_retryable() {
        assert!(is_retryable(&Error::QueueConflict("slot changed".into())));
        assert!(!is_retryable(&Error::NotFound("x".into())));
        assert!(!is_retryable(&Error::ConcurrentModification("y".into())));
    }

    #[tokio::test]
    async fn succeeds_after_transient_conflicts() {
        let calls = AtomicU32::new(0);
        let result = tokio_test::assert_ok!(
            run_with_retries("test_op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(Error::QueueConflict("try again".into()))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
        );
        assert_eq!(result, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_surfaces_concurrent_modification() {
        let result: Result<(), Error> = run_with_retries("test_op", || async {
            Err(Error::QueueConflict("never resolves".into()))
        })
        .await;
        match result {
            Err(Error::ConcurrentModification(_)) => {}
            other => panic!("expected ConcurrentModification, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn non_transient_errors_pass_through() {
        let calls = AtomicU32::new(0);
        let result: Result<(), Error> = run_with_retries("test_op", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(Error::NotFound("gone".into())) }
        })
        .await;
        match result {
            Err(Error::NotFound(_)) => {}
            other => panic!("expected NotFound, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
