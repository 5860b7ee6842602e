//! Configuration types for a copy run and its runtime

use crate::plan::RenameRule;

/// Everything the engine needs to know about one invocation.
///
/// Built once from command line input and passed explicitly to every stage.
#[derive(Debug, Clone)]
pub struct RunConfiguration {
    /// Base directory for relative patterns and a relative destination
    pub cwd: std::path::PathBuf,
    /// Replace existing destination files (otherwise they are skipped)
    pub overwrite: bool,
    pub rename: RenameRule,
    /// Let wildcards match entries whose name begins with a period
    pub dot: bool,
    /// Put every copied file directly into the destination directory
    pub flat: bool,
    /// Maximum number of files copied at the same time (>= 1)
    pub concurrency: usize,
}

impl RunConfiguration {
    #[must_use]
    pub fn new(cwd: std::path::PathBuf) -> Self {
        Self {
            cwd,
            overwrite: true,
            rename: RenameRule::None,
            dot: false,
            flat: false,
            concurrency: default_concurrency(),
        }
    }
}

/// Twice the available parallelism, never less than 1.
#[must_use]
pub fn default_concurrency() -> usize {
    let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
    std::cmp::max(1, cores * 2)
}

/// Runtime configuration for tokio and thread pools
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads (0 = number of CPU cores)
    pub max_workers: usize,
    /// Number of blocking threads (0 = tokio default of 512)
    pub max_blocking_threads: usize,
}

/// Throttling configuration for resource control
#[derive(Debug, Clone, Copy, Default)]
pub struct ThrottleConfig {
    /// Maximum number of open files (None or 0 = no limit)
    pub max_open_files: Option<usize>,
    /// Copy operations per second (0 = no throttle)
    pub ops_throttle: usize,
}

/// Output and logging configuration
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputConfig {
    /// Suppress error output
    pub quiet: bool,
    /// Verbosity level: 0=ERROR, 1=INFO, 2=DEBUG, 3=TRACE
    pub verbose: u8,
    /// Print summary statistics at the end
    pub print_summary: bool,
}
