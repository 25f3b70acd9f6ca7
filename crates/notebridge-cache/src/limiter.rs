//! Bounded-concurrency fan-out.

use std::future::Future;

use futures::stream::{self, StreamExt};

/// Run `worker` over every item with at most `limit` futures in flight.
///
/// Completion order is unspecified. Workers return `()`, so failures must
/// be handled inside the worker; every item is attempted regardless of how
/// earlier ones went. A `limit` of zero is treated as one.
pub async fn run_limited<I, F, Fut>(limit: usize, items: I, worker: F)
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: Future<Output = ()>,
{
    stream::iter(items)
        .for_each_concurrent(limit.max(1), worker)
        .await;
}
