//! Bounded parallel execution of copy tasks

use tracing::instrument;

use crate::copy::{self, CopyOutcome};
use crate::error::Result;
use crate::plan::CopyTask;
use crate::progress::Progress;
use crate::report::Report;

/// Run `work` for every item with at most `limit` futures in flight.
///
/// As soon as one future finishes the next item is spawned. Results are handed to
/// `on_done` and returned in completion order.
pub async fn run_bounded<I, T, F, Fut>(
    items: I,
    limit: usize,
    mut work: F,
    mut on_done: impl FnMut(&T),
) -> std::result::Result<Vec<T>, tokio::task::JoinError>
where
    I: IntoIterator,
    F: FnMut(I::Item) -> Fut,
    Fut: std::future::Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let limit = std::cmp::max(1, limit);
    let mut results = vec![];
    let mut join_set = tokio::task::JoinSet::new();
    for item in items {
        while join_set.len() >= limit {
            let Some(res) = join_set.join_next().await else {
                break;
            };
            let result = res?;
            on_done(&result);
            results.push(result);
        }
        join_set.spawn(work(item));
    }
    while let Some(res) = join_set.join_next().await {
        let result = res?;
        on_done(&result);
        results.push(result);
    }
    Ok(results)
}

/// Copy every task, `concurrency` files at a time.
///
/// A failed copy never stops the others: every task is attempted exactly once and its
/// outcome lands in the returned [`Report`].
#[instrument(skip(tasks, progress), fields(tasks = tasks.len()))]
pub async fn run(
    tasks: Vec<CopyTask>,
    settings: copy::Settings,
    concurrency: usize,
    progress: &Progress,
) -> Result<Report> {
    let outcomes = run_bounded(
        tasks,
        concurrency,
        move |task| async move { copy::copy_file(task, &settings).await },
        |outcome: &CopyOutcome| {
            match outcome {
                CopyOutcome::Success { task, bytes } => {
                    tracing::info!("copied {task} ({bytes} bytes)");
                }
                CopyOutcome::Skipped { task, reason } => {
                    tracing::info!("skipped {task}: {reason}");
                }
                CopyOutcome::Failed { task, error } => {
                    tracing::error!("failed copying {task}: {error}");
                }
            }
            progress.record(outcome);
        },
    )
    .await
    .map_err(|error| anyhow::Error::new(error).context("copy task did not complete"))?;
    Ok(Report::new(outcomes))
}
