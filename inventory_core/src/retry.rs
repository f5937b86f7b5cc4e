use anyhow::Result;
use std::future::Future;
use std::time::{Duration, Instant};

/// Retry a fallible operation on a fixed interval within a wall-clock budget.
///
/// The budget is checked only after a failed attempt, so the operation always
/// runs at least once; the attempt that fails after the budget has been
/// exceeded returns its error unchanged. Newly registered descriptors and
/// just-written points may not be visible to reads right away, and this loop
/// absorbs that propagation delay without an unbounded wait.
pub async fn with_retry<T, F, Fut>(
    what: &str,
    interval: Duration,
    budget: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let start = Instant::now();
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if start.elapsed() <= budget {
                    println!("Failed to {}, retrying...", what);
                    async_std::task::sleep(interval).await;
                } else {
                    return Err(err);
                }
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use async_std::task;
    use std::cell::Cell;

    const TICK: Duration = Duration::from_millis(10);

    #[test]
    fn returns_the_first_success_without_retrying() {
        let attempts = Cell::new(0u32);
        let result: Result<u32> = task::block_on(with_retry("poll", TICK, TICK * 10, || {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move { Ok(n) }
        }));
        assert_eq!(result.unwrap(), 1);
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn retries_until_the_operation_succeeds() {
        let attempts = Cell::new(0u32);
        let result: Result<u32> = task::block_on(with_retry("poll", TICK, TICK * 50, || {
            let n = attempts.get() + 1;
            attempts.set(n);
            async move {
                if n < 3 {
                    Err(anyhow::format_err!("not yet visible"))
                } else {
                    Ok(n)
                }
            }
        }));
        assert_eq!(result.unwrap(), 3);
        assert_eq!(attempts.get(), 3);
    }

    #[test]
    fn aborts_with_the_original_error_once_the_budget_is_exceeded() {
        let budget = TICK * 10;
        let attempts = Cell::new(0u32);
        let start = Instant::now();
        let result: Result<()> = task::block_on(with_retry("poll", TICK, budget, || {
            attempts.set(attempts.get() + 1);
            async { Err(anyhow::format_err!("still not visible")) }
        }));

        // It retried at least once, and kept the final error
        let err = result.unwrap_err();
        assert_eq!(err.to_string(), "still not visible");
        assert!(attempts.get() >= 2, "only {} attempts", attempts.get());

        // It did not give up before the budget was spent
        assert!(start.elapsed() > budget);
    }

    #[test]
    fn the_budget_is_checked_after_an_attempt_not_before() {
        let attempts = Cell::new(0u32);
        let result: Result<()> = task::block_on(with_retry(
            "poll",
            Duration::from_millis(0),
            Duration::from_millis(0),
            || {
                attempts.set(attempts.get() + 1);
                async { Err(anyhow::format_err!("boom")) }
            },
        ));
        assert!(result.is_err());
        assert_eq!(attempts.get(), 1);
    }
}
