//! Bounded concurrency scheduler with ordered results.
//!
//! [`TaskScheduler::run_all`] runs one worker per input item with at most
//! `limit` workers in flight, returns outputs in input order, and stops
//! dispatching as soon as a failure is observed.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tracing::{debug, instrument, warn};

/// Minimum worker limit.
pub const MIN_CONCURRENCY: usize = 1;

/// Maximum worker limit.
pub const MAX_CONCURRENCY: usize = 64;

/// Errors from a scheduled batch.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError<E> {
    /// A worker returned an error.
    #[error("task {index} failed: {source}")]
    Task {
        /// Input position of the failed item.
        index: usize,
        /// The worker's error.
        #[source]
        source: E,
    },

    /// A worker panicked or was cancelled.
    #[error("task {index} panicked: {message}")]
    Panicked {
        /// Input position of the item.
        index: usize,
        /// Panic payload, when it was a string.
        message: String,
    },

    /// Semaphore was closed unexpectedly.
    #[error("semaphore closed unexpectedly")]
    SemaphoreClosed,
}

impl<E> SchedulerError<E> {
    /// Input index of the failing item, when there is one.
    #[must_use]
    pub fn index(&self) -> Option<usize> {
        match self {
            Self::Task { index, .. } | Self::Panicked { index, .. } => Some(*index),
            Self::SemaphoreClosed => None,
        }
    }
}

/// Host parallelism clamped to the allowed range.
#[must_use]
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map_or(MIN_CONCURRENCY, std::num::NonZeroUsize::get)
        .clamp(MIN_CONCURRENCY, MAX_CONCURRENCY)
}

/// Runs independent async tasks with a fixed worker limit.
///
/// # Concurrency Model
///
/// - A semaphore permit is acquired before each worker future is created
/// - Each worker runs in its own Tokio task and holds its permit until done
/// - A failing worker raises a shared flag; no item is dispatched after it
///   is seen, and already running workers are allowed to finish
#[derive(Debug, Clone)]
pub struct TaskScheduler {
    semaphore: Arc<Semaphore>,
    limit: usize,
}

impl Default for TaskScheduler {
    fn default() -> Self {
        Self::new(default_concurrency())
    }
}

impl TaskScheduler {
    /// Creates a scheduler; `limit` is clamped to `1..=64`.
    #[must_use]
    pub fn new(limit: usize) -> Self {
        let limit = limit.clamp(MIN_CONCURRENCY, MAX_CONCURRENCY);
        debug!(limit, "creating task scheduler");
        Self {
            semaphore: Arc::new(Semaphore::new(limit)),
            limit,
        }
    }

    /// Returns the effective worker limit.
    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Runs `worker` over every item and returns the outputs in input order.
    ///
    /// # Errors
    ///
    /// Returns the first observed failure, tagged with its input index. Items
    /// after that point are never started.
    #[instrument(skip_all, fields(limit = self.limit))]
    pub async fn run_all<I, F, Fut, T, E>(
        &self,
        items: I,
        worker: F,
    ) -> Result<Vec<T>, SchedulerError<E>>
    where
        I: IntoIterator,
        F: Fn(I::Item) -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: Send + 'static,
    {
        let failed = Arc::new(AtomicBool::new(false));
        let mut tasks: JoinSet<Result<T, E>> = JoinSet::new();
        let mut indices: HashMap<Id, usize> = HashMap::new();
        let mut outputs: Vec<Option<T>> = Vec::new();
        let mut first_error: Option<SchedulerError<E>> = None;

        for (index, item) in items.into_iter().enumerate() {
            let permit = self
                .semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|_| SchedulerError::SemaphoreClosed)?;

            while let Some(joined) = tasks.try_join_next_with_id() {
                collect(joined, &indices, &mut outputs, &mut first_error);
            }
            if failed.load(Ordering::SeqCst) || first_error.is_some() {
                debug!(index, "failure observed; not dispatching further items");
                break;
            }

            outputs.push(None);
            let future = worker(item);
            let flag = Arc::clone(&failed);
            let handle = tasks.spawn(async move {
                let _permit = permit;
                let result = future.await;
                if result.is_err() {
                    flag.store(true, Ordering::SeqCst);
                }
                result
            });
            indices.insert(handle.id(), index);
        }

        debug!(in_flight = tasks.len(), "waiting for workers to finish");
        while let Some(joined) = tasks.join_next_with_id().await {
            collect(joined, &indices, &mut outputs, &mut first_error);
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        outputs
            .into_iter()
            .enumerate()
            .map(|(index, output)| {
                output.ok_or_else(|| SchedulerError::Panicked {
                    index,
                    message: "task produced no output".to_string(),
                })
            })
            .collect()
    }
}

/// Looks up the submission index of a finished task.
///
/// Every spawned task is registered before it can be joined, so a miss is a
/// bookkeeping bug.
fn task_index(indices: &HashMap<Id, usize>, id: Id) -> usize {
    let index = indices.get(&id).copied();
    debug_assert!(index.is_some(), "task {id} finished without a registered index");
    index.unwrap_or_default()
}

fn collect<T, E>(
    joined: Result<(Id, Result<T, E>), JoinError>,
    indices: &HashMap<Id, usize>,
    outputs: &mut [Option<T>],
    first_error: &mut Option<SchedulerError<E>>,
) {
    match joined {
        Ok((id, Ok(value))) => {
            outputs[task_index(indices, id)] = Some(value);
        }
        Ok((id, Err(source))) => {
            let index = task_index(indices, id);
            if first_error.is_none() {
                *first_error = Some(SchedulerError::Task { index, source });
            } else {
                debug!(index, "additional task failure after the first");
            }
        }
        Err(join_error) => {
            let index = task_index(indices, join_error.id());
            let message = if join_error.is_panic() {
                panic_message(join_error.into_panic())
            } else {
                "task cancelled".to_string()
            };
            warn!(index, %message, "worker panicked");
            if first_error.is_none() {
                *first_error = Some(SchedulerError::Panicked { index, message });
            }
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
