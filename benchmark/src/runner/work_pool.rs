//! @ai:module:intent Bounded-concurrency, order-preserving map over a slice of items
//! @ai:module:layer infrastructure
//! @ai:module:public_api run, ProgressFn
//! @ai:module:stateless true

use futures::future::try_join_all;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Completion hook, fired once per item in completion order.
pub type ProgressFn<'a, R> = &'a (dyn Fn(usize, &R) + Send + Sync);

/// @ai:intent Map `worker` over `items` with at most `concurrency` items in flight
/// @ai:pre worker captures its own per-item errors unless the batch should abort
/// @ai:post result[i] is worker(items[i], i); on the first Err the remaining loops are dropped
/// @ai:effects none beyond those of worker and on_complete
pub async fn run<'a, T, R, E, F, Fut>(
    items: &'a [T],
    concurrency: usize,
    worker: F,
    on_complete: Option<ProgressFn<'_, R>>,
) -> Result<Vec<R>, E>
where
    F: Fn(&'a T, usize) -> Fut,
    Fut: Future<Output = Result<R, E>>,
{
    if items.is_empty() {
        return Ok(Vec::new());
    }

    let workers = concurrency.clamp(1, items.len());
    let cursor = AtomicUsize::new(0);

    let loops = (0..workers).map(|_| {
        let cursor = &cursor;
        let worker = &worker;
        async move {
            let mut finished = Vec::new();
            loop {
                let index = cursor.fetch_add(1, Ordering::SeqCst);
                if index >= items.len() {
                    break;
                }

                let result = worker(&items[index], index).await?;
                if let Some(callback) = on_complete {
                    callback(index, &result);
                }
                finished.push((index, result));
            }
            Ok::<_, E>(finished)
        }
    });

    let batches = try_join_all(loops).await?;

    let mut slots: Vec<Option<R>> = (0..items.len()).map(|_| None).collect();
    for (index, result) in batches.into_iter().flatten() {
        slots[index] = Some(result);
    }

    Ok(slots.into_iter().flatten().collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    struct InFlight {
        current: AtomicUsize,
        peak: AtomicUsize,
    }

    impl InFlight {
        fn new() -> Self {
            Self {
                current: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
            }
        }

        fn enter(&self) {
            let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn leave(&self) {
            self.current.fetch_sub(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_results_follow_input_order() {
        let items: Vec<u64> = (0..10).collect();

        // Later items finish first.
        let results = run(
            &items,
            4,
            |item, index| async move {
                tokio::time::sleep(Duration::from_millis(100 - *item * 10)).await;
                Ok::<_, String>((index, item * 2))
            },
            None,
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 10);
        for (i, (index, doubled)) in results.iter().enumerate() {
            assert_eq!(*index, i);
            assert_eq!(*doubled, i as u64 * 2);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_exceeds_concurrency() {
        for concurrency in 1..=6 {
            let items: Vec<u64> = (0..6).collect();
            let in_flight = InFlight::new();

            let results = run(
                &items,
                concurrency,
                |item, _| {
                    let in_flight = &in_flight;
                    async move {
                        in_flight.enter();
                        tokio::time::sleep(Duration::from_millis(10 + item % 3)).await;
                        in_flight.leave();
                        Ok::<_, String>(*item)
                    }
                },
                None,
            )
            .await
            .unwrap();

            assert_eq!(results, items);
            assert!(in_flight.peak.load(Ordering::SeqCst) <= concurrency);
            assert_eq!(in_flight.peak.load(Ordering::SeqCst), concurrency);
        }
    }

    #[tokio::test]
    async fn test_concurrency_is_clamped() {
        let items = vec![1, 2, 3];

        let zero = run(&items, 0, |item, _| async move { Ok::<_, String>(*item) }, None)
            .await
            .unwrap();
        let huge = run(&items, 100, |item, _| async move { Ok::<_, String>(*item) }, None)
            .await
            .unwrap();

        assert_eq!(zero, vec![1, 2, 3]);
        assert_eq!(huge, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_empty_input() {
        let items: Vec<u32> = Vec::new();
        let results = run(&items, 4, |item, _| async move { Ok::<_, String>(*item) }, None)
            .await
            .unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_on_complete_fires_once_per_item() {
        let items: Vec<u64> = (0..8).collect();
        let seen = Mutex::new(Vec::new());
        let progress: ProgressFn<'_, u64> = &|index, value| {
            seen.lock().unwrap().push((index, *value));
        };

        run(
            &items,
            3,
            |item, _| async move {
                tokio::time::sleep(Duration::from_millis(50 - *item * 5)).await;
                Ok::<_, String>(*item + 100)
            },
            Some(progress),
        )
        .await
        .unwrap();

        let mut seen = seen.into_inner().unwrap();
        seen.sort();
        let expected: Vec<(usize, u64)> = (0..8).map(|i| (i as usize, i + 100)).collect();
        assert_eq!(seen, expected);
    }

    #[tokio::test]
    async fn test_error_fails_the_batch() {
        let items = vec![1, 2, 3, 4];

        let result = run(
            &items,
            2,
            |item, _| async move {
                if *item == 3 {
                    Err(format!("item {item} failed"))
                } else {
                    Ok(*item)
                }
            },
            None,
        )
        .await;

        assert_eq!(result, Err("item 3 failed".to_string()));
    }
}
