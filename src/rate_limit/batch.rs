use super::RateLimiter;
use std::future::Future;

/// Run `operations` one after another through `limiter`.
///
/// Results come back in input order. A failed operation leaves its error at
/// its position and the batch carries on with the next one.
pub async fn batch_requests<T, E, F, Fut, I>(
    limiter: &RateLimiter,
    operations: I,
) -> Vec<Result<T, E>>
where
    I: IntoIterator<Item = F>,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let operations = operations.into_iter();
    let mut results = Vec::with_capacity(operations.size_hint().0);
    let mut failures = 0usize;

    for operation in operations {
        let result = limiter.make_request(operation).await;
        if result.is_err() {
            failures += 1;
        }
        results.push(result);
    }

    if failures > 0 {
        tracing::debug!(
            bucket = limiter.name(),
            total = results.len(),
            failures,
            "Batch finished with failures"
        );
    }

    results
}
