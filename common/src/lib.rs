//! Engine behind the `cpy` tool: copy files selected by glob patterns into a directory
//!
//! A run goes through four stages:
//!
//! 1. [`pattern::expand`] turns the source patterns into a sorted list of files, applying
//!    `!negations` last
//! 2. [`plan::plan`] decides each file's destination: structure below the pattern root is
//!    kept unless `flat` is set, and the rename rule rewrites the file name
//! 3. [`schedule::run`] copies the files with a bounded number of concurrent tasks
//! 4. [`report::Report`] collects the outcomes and separates skips from failures
//!
//! Fatal problems (missing operands, nothing matched, a literal source that doesn't exist)
//! are returned before anything is copied. Per-file failures never interrupt other copies
//! and are reported together once every file was attempted.
//!
//! # Example
//!
//! ```rust,no_run
//! # async fn example() -> common::Result<()> {
//! let patterns = common::pattern::PatternSet::new(&["src/*.png", "!src/goat.png"])?;
//! let config = common::RunConfiguration::new(std::env::current_dir().unwrap());
//! let report = common::copy(&patterns, std::path::Path::new("dist"), &config, false).await?;
//! let summary = report.into_result()?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

use tracing::instrument;

pub mod config;
pub mod copy;
pub mod error;
pub mod pattern;
pub mod plan;
pub mod progress;
pub mod report;
pub mod schedule;
#[cfg(test)]
mod testutils;

pub use config::{OutputConfig, RunConfiguration, RuntimeConfig, ThrottleConfig};
pub use error::{Error, FileError, Result};
pub use report::{Report, Summary};

/// Expand the patterns and compute every copy without touching the destination.
#[instrument(skip(patterns, config))]
pub async fn plan_copy(
    patterns: &pattern::PatternSet,
    destination: &std::path::Path,
    config: &RunConfiguration,
) -> Result<Vec<plan::CopyTask>> {
    let matches = pattern::expand(patterns, &config.cwd, config.dot).await?;
    tracing::debug!("{} files matched", matches.len());
    Ok(plan::plan(&matches, destination, config))
}

/// Copy every file matched by `patterns` into `destination`.
///
/// Returns `Err` only for fatal conditions; inspect the [`Report`] (or call
/// [`Report::into_result`]) for per-file failures.
#[instrument(skip(patterns, config))]
pub async fn copy(
    patterns: &pattern::PatternSet,
    destination: &std::path::Path,
    config: &RunConfiguration,
    show_progress: bool,
) -> Result<Report> {
    let tasks = plan_copy(patterns, destination, config).await?;
    let progress = progress::Progress::new(tasks.len() as u64, show_progress);
    let settings = copy::Settings {
        overwrite: config.overwrite,
    };
    let report = schedule::run(tasks, settings, config.concurrency, &progress).await;
    progress.finish();
    report
}

fn log_level(output: &OutputConfig) -> tracing_subscriber::filter::LevelFilter {
    use tracing_subscriber::filter::LevelFilter;
    if output.quiet {
        return LevelFilter::OFF;
    }
    match output.verbose {
        0 => LevelFilter::ERROR,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

fn init_tracing(output: &OutputConfig) {
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(log_level(output).into())
        .from_env_lossy();
    // logs go to stdout, progress and the final error message to stderr
    let res = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stdout)
        .with_target(false)
        .try_init();
    if let Err(error) = res {
        eprintln!("failed to initialize logging: {error}");
    }
}

fn build_runtime(runtime: &RuntimeConfig) -> anyhow::Result<tokio::runtime::Runtime> {
    use anyhow::Context;
    let mut builder = tokio::runtime::Builder::new_multi_thread();
    builder.enable_all();
    if runtime.max_workers > 0 {
        builder.worker_threads(runtime.max_workers);
    }
    if runtime.max_blocking_threads > 0 {
        builder.max_blocking_threads(runtime.max_blocking_threads);
    }
    builder.build().context("failed to create tokio runtime")
}

/// Set up logging, throttling and the tokio runtime, then run `func` to completion.
///
/// Errors are printed to stderr (unless quiet) and turned into `None`; the summary is
/// printed when requested or when running verbosely.
pub fn run<Fut>(
    output: OutputConfig,
    runtime: RuntimeConfig,
    throttle: ThrottleConfig,
    func: impl FnOnce() -> Fut,
) -> Option<Summary>
where
    Fut: std::future::Future<Output = Result<Summary>>,
{
    init_tracing(&output);
    let runtime = match build_runtime(&runtime) {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("{error:#}");
            return None;
        }
    };
    if let Some(max_open_files) = throttle.max_open_files {
        throttle::set_max_open_files(max_open_files);
    }
    if throttle.ops_throttle > 0 {
        let (tokens, interval) = throttle::replenish_schedule(throttle.ops_throttle);
        throttle::init_ops_tokens(tokens);
        runtime.spawn(throttle::run_ops_replenish_thread(tokens, interval));
    }
    let print_summary = output.print_summary || output.verbose > 0;
    match runtime.block_on(func()) {
        Ok(summary) => {
            if print_summary {
                println!("{summary}");
            }
            Some(summary)
        }
        Err(error) => {
            if !output.quiet {
                eprintln!("{error}");
            }
            if let (true, Error::PartialFailure { summary, .. }) = (print_summary, &error) {
                println!("{summary}");
            }
            None
        }
    }
}
