//! Bounded-concurrency task scheduler.
//!
//! Descriptors are pulled one at a time from a `next` function, so the
//! sequence can be open-ended or stop on a condition only the last
//! descriptor knows about. At most `max_concurrency` workers hold a permit at
//! once; results come back in completion order.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{Id, JoinError, JoinSet};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{TaskError, ValidationError};

/// Diagnostics stamped on a descriptor by the scheduler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskStats {
    /// Tasks dispatched before this one.
    pub task_count: usize,
    /// Worker run time, set when the worker returns `Ok`.
    pub duration_ms: u64,
    /// Permits still available right after this task acquired its own.
    pub permits_at_dispatch: usize,
    pub semaphore_wait_us: u64,
}

/// A unit of scheduled work.
pub trait TaskData: Send + 'static {
    /// Positive, dense, ascending from 1.
    fn task_id(&self) -> u32;

    fn stats(&self) -> &TaskStats;

    fn stats_mut(&mut self) -> &mut TaskStats;
}

/// Minimal descriptor for work that needs nothing beyond its id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskModel {
    pub task_id: u32,
    pub stats: TaskStats,
}

impl TaskModel {
    pub fn new(task_id: u32) -> Self {
        Self {
            task_id,
            stats: TaskStats::default(),
        }
    }
}

impl TaskData for TaskModel {
    fn task_id(&self) -> u32 {
        self.task_id
    }

    fn stats(&self) -> &TaskStats {
        &self.stats
    }

    fn stats_mut(&mut self) -> &mut TaskStats {
        &mut self.stats
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on descriptors produced in one run.
    pub max_task_count: usize,
    /// Workers allowed in flight at once.
    pub max_concurrency: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_task_count: 10,
            max_concurrency: 4,
        }
    }
}

impl SchedulerConfig {
    pub fn new(max_task_count: usize, max_concurrency: usize) -> Result<Self, ValidationError> {
        let config = Self {
            max_task_count,
            max_concurrency,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.max_task_count == 0 {
            return Err(ValidationError::ZeroTaskCount);
        }
        if self.max_concurrency == 0 {
            return Err(ValidationError::ZeroConcurrency);
        }
        Ok(())
    }
}

/// Outcome of one scheduler run.
#[derive(Debug)]
pub struct RunSummary<D> {
    /// One entry per dispatched task, in completion order.
    pub results: Vec<Result<D, TaskError>>,
    pub dispatched: usize,
    /// The run stopped dispatching because the token fired.
    pub cancelled: bool,
    pub elapsed_ms: u64,
}

impl<D: TaskData> RunSummary<D> {
    pub fn succeeded(&self) -> impl Iterator<Item = &D> {
        self.results.iter().filter_map(|result| result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskError> {
        self.results.iter().filter_map(|result| result.as_ref().err())
    }

    /// Task ids of every result, sorted ascending.
    pub fn task_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self
            .results
            .iter()
            .map(|result| match result {
                Ok(descriptor) => descriptor.task_id(),
                Err(error) => error.task_id(),
            })
            .collect();
        ids.sort_unstable();
        ids
    }
}

type Factory<D> = Arc<dyn Fn(u32) -> D + Send + Sync>;
type NextFn<D> = Arc<dyn Fn(&D) -> Option<D> + Send + Sync>;

/// Runs a worker function over a pulled sequence of descriptors.
pub struct ConcurrentScheduler<D> {
    config: SchedulerConfig,
    factory: Factory<D>,
    next: Option<NextFn<D>>,
}

impl<D: TaskData> ConcurrentScheduler<D> {
    /// `factory(id)` builds the descriptor for task `id`. Without
    /// [`Self::with_next`], ids run from 1 to `max_task_count`.
    pub fn new(
        config: SchedulerConfig,
        factory: impl Fn(u32) -> D + Send + Sync + 'static,
    ) -> Result<Self, ValidationError> {
        config.validate()?;
        Ok(Self {
            config,
            factory: Arc::new(factory),
            next: None,
        })
    }

    /// Replaces the default successor function. `max_task_count` still caps
    /// the run.
    pub fn with_next(mut self, next: impl Fn(&D) -> Option<D> + Send + Sync + 'static) -> Self {
        self.next = Some(Arc::new(next));
        self
    }

    pub fn config(&self) -> SchedulerConfig {
        self.config
    }

    /// Successor of `current`, or `None` when the sequence ends.
    ///
    /// A successor whose id does not increase or exceeds `max_task_count`
    /// ends the sequence.
    fn next_after(&self, current: &D) -> Option<D> {
        let current_id = current.task_id();
        let next = match &self.next {
            Some(next) => next(current)?,
            None => {
                let next_id = current_id.checked_add(1)?;
                if !self.within_bound(next_id) {
                    return None;
                }
                return Some((self.factory)(next_id));
            }
        };

        let next_id = next.task_id();
        if next_id <= current_id || !self.within_bound(next_id) {
            warn!(
                current_id,
                next_id,
                max_task_count = self.config.max_task_count,
                "successor task id out of sequence, stopping dispatch"
            );
            return None;
        }
        Some(next)
    }

    fn within_bound(&self, task_id: u32) -> bool {
        usize::try_from(task_id)
            .map(|id| id <= self.config.max_task_count)
            .unwrap_or(false)
    }

    /// Dispatches descriptors until the sequence ends, the task cap is
    /// reached or `cancel` fires, then waits for every in-flight worker.
    ///
    /// A worker's `Err` or panic is recorded against its task only.
    pub async fn run<F, Fut, E>(&self, process: F, cancel: &CancellationToken) -> RunSummary<D>
    where
        F: Fn(D, CancellationToken) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<D, E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let started = Instant::now();
        let process = Arc::new(process);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let mut workers: JoinSet<Result<D, TaskError>> = JoinSet::new();
        let mut task_ids: HashMap<Id, u32> = HashMap::new();
        let mut results = Vec::new();
        let mut dispatched = 0_usize;
        let mut cancelled = false;

        let mut current = Some((self.factory)(1));
        while let Some(mut descriptor) = current.take() {
            if dispatched >= self.config.max_task_count {
                break;
            }

            let wait_started = Instant::now();
            let permit = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    cancelled = true;
                    break;
                }
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let task_id = descriptor.task_id();
            let stats = descriptor.stats_mut();
            stats.task_count = dispatched;
            stats.permits_at_dispatch = semaphore.available_permits();
            stats.semaphore_wait_us = wait_started.elapsed().as_micros() as u64;
            debug!(
                task_id,
                task_count = dispatched,
                permits = stats.permits_at_dispatch,
                wait_us = stats.semaphore_wait_us,
                "dispatching task"
            );

            current = self.next_after(&descriptor);

            let worker = Arc::clone(&process);
            let token = cancel.clone();
            let handle = workers.spawn(async move {
                let worker_started = Instant::now();
                let outcome = worker(descriptor, token).await;
                drop(permit);

                match outcome {
                    Ok(mut descriptor) => {
                        descriptor.stats_mut().duration_ms =
                            worker_started.elapsed().as_millis() as u64;
                        Ok(descriptor)
                    }
                    Err(error) => Err(TaskError::Failed {
                        task_id,
                        message: error.to_string(),
                    }),
                }
            });
            task_ids.insert(handle.id(), task_id);
            dispatched += 1;

            if workers.len() >= self.config.max_concurrency {
                if let Some(joined) = workers.join_next_with_id().await {
                    results.push(collect(joined, &mut task_ids));
                }
            }
        }

        while let Some(joined) = workers.join_next_with_id().await {
            results.push(collect(joined, &mut task_ids));
        }

        let summary = RunSummary {
            results,
            dispatched,
            cancelled,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };
        let failed = summary.failures().count();
        if cancelled {
            warn!(dispatched, failed, "scheduler run cancelled");
        } else {
            info!(
                dispatched,
                failed,
                elapsed_ms = summary.elapsed_ms,
                "scheduler run finished"
            );
        }
        summary
    }
}

fn collect<D>(
    joined: Result<(Id, Result<D, TaskError>), JoinError>,
    task_ids: &mut HashMap<Id, u32>,
) -> Result<D, TaskError> {
    match joined {
        Ok((id, outcome)) => {
            task_ids.remove(&id);
            if let Err(error) = &outcome {
                warn!(task_id = error.task_id(), error = %error, "task failed");
            }
            outcome
        }
        Err(join_error) => {
            let task_id = task_ids.remove(&join_error.id()).unwrap_or_default();
            let error = if join_error.is_panic() {
                TaskError::Panicked {
                    task_id,
                    message: panic_message(join_error.into_panic()),
                }
            } else {
                TaskError::Aborted { task_id }
            };
            warn!(task_id, error = %error, "task did not complete");
            Err(error)
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
