//! Fan-out scheduler for independent upload tasks.
//!
//! DESIGN
//! ======
//! Each task is spawned onto the runtime so it makes progress on its own.
//! The caller gets results in submission order once every task succeeds,
//! or the first error as soon as any task fails. Failing fast does not
//! cancel siblings: their join handles are dropped, which detaches rather
//! than aborts, so in-flight uploads still finish (and finalize) later.

use std::future::Future;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::task::JoinError;

/// Run every task concurrently; resolve when all succeed, reject on the
/// first failure.
///
/// # Errors
///
/// Returns the first task error observed, or a [`JoinError`] conversion if
/// a task panicked.
pub async fn run_all<T, E, Fut>(tasks: impl IntoIterator<Item = Fut>) -> Result<Vec<T>, E>
where
    Fut: Future<Output = Result<T, E>> + Send + 'static,
    T: Send + 'static,
    E: From<JoinError> + Send + 'static,
{
    let mut pending: FuturesUnordered<_> = tasks
        .into_iter()
        .enumerate()
        .map(|(idx, task)| {
            let handle = tokio::spawn(task);
            async move { (idx, handle.await) }
        })
        .collect();

    let mut slots: Vec<Option<T>> = std::iter::repeat_with(|| None).take(pending.len()).collect();
    while let Some((idx, joined)) = pending.next().await {
        match joined {
            Ok(Ok(value)) => slots[idx] = Some(value),
            Ok(Err(e)) => return Err(e),
            Err(join_err) => return Err(E::from(join_err)),
        }
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
#[path = "scheduler_test.rs"]
mod tests;
