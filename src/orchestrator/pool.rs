//! Bounded worker pool for independent test files
//!
//! At most `workers` jobs run at once. Each job reports through one channel
//! to a single collector, which returns the results in input order.

use std::future::Future;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

/// Run `job` over `items` with bounded concurrency
///
/// Jobs must not share mutable state with each other; anything a job needs
/// (such as its own forked session) is created inside the job. A job that
/// panics or is cancelled before reporting gets `on_lost(index)` in its slot,
/// so one lost item never discards the results of the others.
pub async fn run_bounded<I, T, F, Fut, L>(items: Vec<I>, workers: usize, job: F, on_lost: L) -> Vec<T>
where
    I: Send + 'static,
    T: Send + 'static,
    F: Fn(usize, I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = T> + Send + 'static,
    L: Fn(usize) -> T,
{
    let total = items.len();
    if total == 0 {
        return Vec::new();
    }

    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let job = Arc::new(job);
    let (tx, mut rx) = mpsc::channel::<(usize, T)>(total);
    let mut tasks = JoinSet::new();

    for (index, item) in items.into_iter().enumerate() {
        let permits = permits.clone();
        let job = job.clone();
        let tx = tx.clone();
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let output = job(index, item).await;
            let _ = tx.send((index, output)).await;
        });
    }
    drop(tx);

    let mut slots: Vec<Option<T>> = (0..total).map(|_| None).collect();
    while let Some((index, output)) = rx.recv().await {
        slots[index] = Some(output);
    }

    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            tracing::error!(error = %e, panicked = e.is_panic(), "Worker task failed");
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(index, slot)| {
            slot.unwrap_or_else(|| {
                tracing::warn!(index, "Worker produced no result");
                on_lost(index)
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let items = vec![30u64, 5, 20, 1];
        let results = run_bounded(
            items,
            4,
            |index, delay| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                index * 10
            },
            |_| usize::MAX,
        )
        .await;
        assert_eq!(results, vec![0, 10, 20, 30]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));
        let (r, p) = (running.clone(), peak.clone());

        run_bounded(
            (0..8).collect::<Vec<_>>(),
            2,
            move |_, _| {
                let running = r.clone();
                let peak = p.clone();
                async move {
                    let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    running.fetch_sub(1, Ordering::SeqCst);
                }
            },
            |_| (),
        )
        .await;

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let results: Vec<u8> =
            run_bounded(Vec::<u8>::new(), 3, |_, x| async move { x }, |_| 0).await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_panicking_job_keeps_other_results() {
        let results = run_bounded(
            vec![0, 1, 2],
            2,
            |_, x| async move {
                if x == 1 {
                    panic!("worker blew up");
                }
                Ok(x * 10)
            },
            |index| Err(format!("item {index} lost")),
        )
        .await;

        assert_eq!(results, vec![Ok(0), Err("item 1 lost".to_string()), Ok(20)]);
    }
}
