//! In-process fan-out runner.
//!
//! Runs independent units with bounded concurrency. Each unit is retried on
//! transient failure; the first unit to fail terminally aborts the rest.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async_if, RetryConfig, RetryResult};

/// Bounded, retrying executor for fan-out units.
#[derive(Debug, Clone)]
pub struct FanOutRunner {
    max_concurrency: usize,
    retry: RetryConfig,
    cancel_rx: Option<watch::Receiver<bool>>,
}

impl FanOutRunner {
    pub fn new(max_concurrency: usize, retry: RetryConfig) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            retry,
            cancel_rx: None,
        }
    }

    /// Stop launching units once the signal flips to `true`.
    pub fn with_cancel(mut self, cancel_rx: watch::Receiver<bool>) -> Self {
        self.cancel_rx = Some(cancel_rx);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Run `unit` over every task and return the outputs in task order.
    ///
    /// Returns only after every launched unit has finished or been aborted.
    pub async fn run<T, R, F, Fut>(&self, tasks: Vec<T>, unit: F) -> WorkerResult<Vec<R>>
    where
        T: Send + Sync + 'static,
        R: Send + 'static,
        F: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = WorkerResult<R>> + Send + 'static,
    {
        let total = tasks.len();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let unit = Arc::new(unit);
        let mut join_set = JoinSet::new();

        debug!(
            "Fanning out {} units with concurrency {}",
            total, self.max_concurrency
        );

        for (index, task) in tasks.into_iter().enumerate() {
            if self.is_cancelled() {
                join_set.abort_all();
                return Err(WorkerError::Cancelled);
            }

            // Fail fast: stop launching once a finished unit has failed
            while let Some(joined) = join_set.try_join_next() {
                if let Err(e) = flatten(joined) {
                    join_set.abort_all();
                    return Err(e);
                }
            }

            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| WorkerError::TaskFailed(e.to_string()))?;

            let task = Arc::new(task);
            let unit = Arc::clone(&unit);
            let retry = self.retry.clone();

            join_set.spawn(async move {
                let _permit = permit;
                let result =
                    retry_async_if(&retry, WorkerError::is_retryable, || (*unit)(Arc::clone(&task)))
                        .await;
                match result {
                    RetryResult::Success(output) => Ok((index, output)),
                    RetryResult::Failed { error, attempts } => {
                        metrics::record_unit_retries(attempts.saturating_sub(1));
                        Err(error)
                    }
                }
            });
        }

        let mut outputs: Vec<Option<R>> = (0..total).map(|_| None).collect();
        let mut first_error = None;

        while let Some(joined) = join_set.join_next().await {
            match flatten(joined) {
                Ok((index, output)) => outputs[index] = Some(output),
                Err(e) => {
                    if first_error.is_none() {
                        warn!("Fan-out unit failed, aborting remaining units: {}", e);
                        join_set.abort_all();
                        first_error = Some(e);
                    }
                }
            }
        }

        if let Some(e) = first_error {
            return Err(e);
        }

        outputs
            .into_iter()
            .map(|o| o.ok_or_else(|| WorkerError::TaskFailed("unit produced no output".into())))
            .collect()
    }
}

fn flatten<R>(
    joined: Result<WorkerResult<(usize, R)>, tokio::task::JoinError>,
) -> WorkerResult<(usize, R)> {
    match joined {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => Err(WorkerError::Cancelled),
        Err(e) => Err(WorkerError::TaskFailed(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
    use std::time::Duration;
    use vmod_classifier::ClassifierError;

    fn runner(max: usize) -> FanOutRunner {
        FanOutRunner::new(
            max,
            RetryConfig::new("test")
                .with_max_retries(2)
                .with_base_delay(Duration::from_millis(1)),
        )
    }

    fn transient() -> WorkerError {
        WorkerError::classification_failed(
            "k.png",
            ClassifierError::ServiceUnavailable("throttled".into()),
        )
    }

    #[tokio::test]
    async fn test_outputs_in_task_order() {
        let out = runner(4)
            .run(vec![30u64, 10, 20], |ms: Arc<u64>| async move {
                tokio::time::sleep(Duration::from_millis(*ms)).await;
                Ok(*ms * 2)
            })
            .await
            .unwrap();
        assert_eq!(out, vec![60, 20, 40]);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (f, p) = (Arc::clone(&in_flight), Arc::clone(&peak));
        runner(2)
            .run((0..8).collect::<Vec<u32>>(), move |_| {
                let (in_flight, peak) = (Arc::clone(&f), Arc::clone(&p));
                async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert!(peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let out = runner(1)
            .run(vec![()], move |_| {
                let calls = Arc::clone(&c);
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(transient())
                    } else {
                        Ok("done")
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(out, vec!["done"]);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_unit_fails_job() {
        let err = runner(2)
            .run(vec![1, 2, 3], |n: Arc<i32>| async move {
                if *n == 2 {
                    Err(transient())
                } else {
                    Ok(*n)
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::ClassificationFailed { .. }));
    }

    #[tokio::test]
    async fn test_terminal_failure_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = Arc::clone(&calls);

        let err = runner(1)
            .run(vec![()], move |_| {
                let calls = Arc::clone(&c);
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(WorkerError::consolidation_parse("k", "bad"))
                }
            })
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::ConsolidationParse { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_launch() {
        let (tx, rx) = watch::channel(true);
        let err = runner(1)
            .with_cancel(rx)
            .run(vec![()], |_| async { Ok(()) })
            .await
            .unwrap_err();

        assert!(matches!(err, WorkerError::Cancelled));
        drop(tx);
    }
}
