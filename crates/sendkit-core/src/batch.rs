//! Many request units through one sender under the scheduler.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ValidationError;
use crate::scheduler::{ConcurrentScheduler, RunSummary, SchedulerConfig, TaskData, TaskStats};
use crate::sender::Sender;
use crate::unit::{Payload, RequestUnit};

/// Scheduler descriptor carrying one request unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTask<T> {
    pub task_id: u32,
    pub stats: TaskStats,
    pub unit: RequestUnit<T>,
}

impl<T> RequestTask<T> {
    /// The unit's `iteration` is set to the task id.
    pub fn new(task_id: u32, unit: RequestUnit<T>) -> Self {
        Self {
            task_id,
            stats: TaskStats::default(),
            unit: unit.with_iteration(task_id),
        }
    }
}

impl<T: Payload> TaskData for RequestTask<T> {
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

/// Sends `build(id)` for ids `1..=max_task_count`, at most
/// `max_concurrency` at a time.
///
/// A unit that fails validation in a sender that doesn't trap it shows up as
/// a failed task in the summary.
pub async fn run_requests<S, T>(
    sender: Arc<S>,
    config: SchedulerConfig,
    build: impl Fn(u32) -> RequestUnit<T> + Send + Sync + 'static,
    cancel: &CancellationToken,
) -> Result<RunSummary<RequestTask<T>>, ValidationError>
where
    S: Sender + 'static,
    T: Payload,
{
    let scheduler = ConcurrentScheduler::new(config, move |task_id| {
        RequestTask::new(task_id, build(task_id))
    })?;

    let summary = scheduler
        .run(
            move |mut task: RequestTask<T>, token: CancellationToken| {
                let sender = Arc::clone(&sender);
                async move {
                    task.unit = sender.send(task.unit, &token).await?;
                    Ok::<_, ValidationError>(task)
                }
            },
            cancel,
        )
        .await;

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TaskError;
    use crate::sender::SendFuture;

    struct EchoSender;

    impl Sender for EchoSender {
        fn send<'a, T: Payload>(
            &'a self,
            mut unit: RequestUnit<T>,
            _cancel: &'a CancellationToken,
        ) -> SendFuture<'a, T> {
            Box::pin(async move {
                unit.validate()?;
                unit.status_code = 200;
                unit.response = serde_json::from_value(serde_json::json!(unit.request_path)).ok();
                Ok(unit)
            })
        }
    }

    #[tokio::test]
    async fn every_id_gets_its_own_unit() {
        let summary = run_requests(
            Arc::new(EchoSender),
            SchedulerConfig::new(4, 2).expect("valid config"),
            |id| RequestUnit::<String>::get(format!("/items/{id}")),
            &CancellationToken::new(),
        )
        .await
        .expect("valid config");

        assert_eq!(summary.task_ids(), vec![1, 2, 3, 4]);
        for task in summary.succeeded() {
            assert_eq!(task.unit.iteration, task.task_id);
            assert_eq!(
                task.unit.response.as_deref(),
                Some(format!("/items/{}", task.task_id).as_str())
            );
        }
    }

    #[tokio::test]
    async fn invalid_unit_fails_only_its_task() {
        let summary = run_requests(
            Arc::new(EchoSender),
            SchedulerConfig::new(3, 3).expect("valid config"),
            |id| RequestUnit::<String>::get(if id == 2 { String::new() } else { format!("/{id}") }),
            &CancellationToken::new(),
        )
        .await
        .expect("valid config");

        assert_eq!(summary.succeeded().count(), 2);
        let failures: Vec<_> = summary.failures().collect();
        assert!(matches!(failures.as_slice(), [TaskError::Failed { task_id: 2, .. }]));
    }
}
