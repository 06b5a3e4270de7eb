//! Bounded-concurrency batch execution.
//!
//! Runs a fallible async operation over a list of items in fixed-size
//! groups: every item in a group runs concurrently, groups run one
//! after another with an optional pause in between. Keeps burst size
//! against rate-limited providers predictable.

use std::future::Future;
use std::time::Duration;

use futures::future;
use tokio::time::sleep;
use tracing::debug;

/// Process `items` in groups of `batch_size`, pausing `delay_between`
/// groups. Results come back in input order.
///
/// A failing item does not cancel its group; the first error (in input
/// order) is returned once the group has finished. A `batch_size` of
/// zero is treated as one.
pub async fn run_in_batches<T, R, E, F, Fut>(
    items: Vec<T>,
    batch_size: usize,
    delay_between: Duration,
    process: F,
) -> Result<Vec<R>, E>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    let batch_size = batch_size.max(1);
    let total_batches = items.len().div_ceil(batch_size);
    let mut results = Vec::with_capacity(items.len());

    let mut remaining = items.into_iter().peekable();
    let mut batch_index = 0usize;

    while remaining.peek().is_some() {
        let group: Vec<T> = remaining.by_ref().take(batch_size).collect();
        batch_index += 1;
        debug!(
            batch = batch_index,
            total_batches,
            size = group.len(),
            "Processing batch"
        );

        let outputs = future::join_all(group.into_iter().map(&process)).await;
        for output in outputs {
            results.push(output?);
        }

        if remaining.peek().is_some() && !delay_between.is_zero() {
            sleep(delay_between).await;
        }
    }

    Ok(results)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn splits_into_groups_with_delay_between() {
        let start = Instant::now();
        let stamps: Arc<std::sync::Mutex<Vec<u64>>> = Arc::new(std::sync::Mutex::new(Vec::new()));

        let items: Vec<u32> = (0..12).collect();
        let recorder = Arc::clone(&stamps);
        let results = run_in_batches(items, 5, Duration::from_secs(1), move |n| {
            let recorder = Arc::clone(&recorder);
            async move {
                recorder
                    .lock()
                    .unwrap()
                    .push(Instant::now().duration_since(start).as_secs());
                Ok::<u32, ()>(n * 2)
            }
        })
        .await
        .unwrap();

        assert_eq!(results, (0..12).map(|n| n * 2).collect::<Vec<_>>());

        // Groups of 5, 5, 2 start at 0s, 1s, 2s.
        let stamps = stamps.lock().unwrap();
        assert_eq!(stamps.iter().filter(|&&t| t == 0).count(), 5);
        assert_eq!(stamps.iter().filter(|&&t| t == 1).count(), 5);
        assert_eq!(stamps.iter().filter(|&&t| t == 2).count(), 2);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn preserves_order_within_a_group() {
        // Later items finish first; output order must still follow input.
        let items = vec![3u64, 2, 1];
        let results = run_in_batches(items, 3, Duration::ZERO, |n| async move {
            sleep(Duration::from_millis(n * 10)).await;
            Ok::<u64, ()>(n)
        })
        .await
        .unwrap();

        assert_eq!(results, vec![3, 2, 1]);
    }

    #[tokio::test]
    async fn error_surfaces_after_group_completes() {
        let processed = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&processed);
        let result = run_in_batches(vec![1u32, 2, 3], 3, Duration::ZERO, move |n| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                if n == 2 { Err("boom") } else { Ok(n) }
            }
        })
        .await;

        assert_eq!(result, Err("boom"));
        // Siblings in the failing group still ran.
        assert_eq!(processed.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_batch_size_acts_as_one() {
        let start = Instant::now();
        let results = run_in_batches(vec![1u32, 2, 3], 0, Duration::from_secs(1), |n| async move {
            Ok::<u32, ()>(n)
        })
        .await
        .unwrap();

        assert_eq!(results, vec![1, 2, 3]);
        // Three singleton groups, two pauses.
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn no_delay_after_final_group() {
        let start = Instant::now();
        let results =
            run_in_batches(vec![1u32, 2, 3], 5, Duration::from_secs(1), |n| async move {
                Ok::<u32, ()>(n)
            })
            .await
            .unwrap();

        assert_eq!(results, vec![1, 2, 3]);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test]
    async fn empty_input_yields_empty_output() {
        let results = run_in_batches(Vec::<u32>::new(), 5, Duration::ZERO, |n| async move {
            Ok::<u32, ()>(n)
        })
        .await
        .unwrap();

        assert!(results.is_empty());
    }
}
