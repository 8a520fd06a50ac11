use std::sync::Arc;

use sendkit_core::{run_requests, HttpMethod, PipelineBuilder, PipelineConfig, RequestTask, RequestUnit, RunSummary};
use serde::Serialize;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::cli::BatchArgs;
use crate::error::CliError;

use super::{cache_minutes, CommandResult};

#[derive(Debug, Serialize)]
struct BatchReport<'a> {
    dispatched: usize,
    succeeded: usize,
    failed: usize,
    cancelled: bool,
    elapsed_ms: u64,
    tasks: Vec<&'a RequestTask<Value>>,
    task_errors: Vec<String>,
}

impl<'a> BatchReport<'a> {
    fn from_summary(summary: &'a RunSummary<RequestTask<Value>>) -> Self {
        let mut tasks: Vec<&RequestTask<Value>> = summary.succeeded().collect();
        tasks.sort_by_key(|task| task.task_id);

        let task_errors: Vec<String> = summary.failures().map(ToString::to_string).collect();
        let succeeded = tasks.iter().filter(|task| task.unit.is_success()).count();

        Self {
            dispatched: summary.dispatched,
            succeeded,
            failed: summary.results.len() - succeeded,
            cancelled: summary.cancelled,
            elapsed_ms: summary.elapsed_ms,
            tasks,
            task_errors,
        }
    }
}

pub async fn run(
    args: &BatchArgs,
    mut config: PipelineConfig,
    cancel: &CancellationToken,
) -> Result<CommandResult, CliError> {
    if let Some(tasks) = args.tasks {
        config.scheduler.max_task_count = tasks;
    }
    if let Some(concurrency) = args.concurrency {
        config.scheduler.max_concurrency = concurrency;
    }
    config.validate()?;

    let method: HttpMethod = args.method.into();
    let minutes = cache_minutes(method, args.cache_minutes, &config);
    let template = args.path.clone();
    let scheduler = config.scheduler;
    let pipeline = Arc::new(PipelineBuilder::new(config).build()?);

    let summary = run_requests(
        pipeline,
        scheduler,
        move |task_id| {
            RequestUnit::<Value>::new(method, expand_path(&template, task_id)).with_cache_minutes(minutes)
        },
        cancel,
    )
    .await?;

    let report = BatchReport::from_summary(&summary);
    Ok(CommandResult {
        failed: report.failed > 0,
        cancelled: report.cancelled,
        data: serde_json::to_value(&report)?,
    })
}

fn expand_path(template: &str, task_id: u32) -> String {
    template.replace("{id}", &task_id.to_string())
}
