use anyhow::Context;
use clap::Parser;
use tracing::instrument;

#[derive(Parser, Debug, Clone)]
#[command(
    name = "cpy",
    version,
    about = "Copy files matched by glob patterns",
    long_about = "`cpy` copies every file matched by the <source> patterns into the <destination> directory.

<source> can contain globs if quoted. Patterns starting with `!` exclude whatever they match.

EXAMPLES:
    # Copy all .png files in src folder into dist except src/goat.png
    cpy 'src/*.png' '!src/goat.png' dist

    # Copy all files inside src folder into dist and preserve path structure
    cpy . '../dist/' --cwd=src

    # Copy all .png files in the src folder to dist and prefix the image filenames
    cpy 'src/*.png' dist --cwd=src --rename=hi-{{basename}}"
)]
struct Args {
    // Copy options
    /// Don't overwrite the destination
    #[arg(long, help_heading = "Copy options")]
    no_overwrite: bool,

    /// Working directory for files (default: current directory)
    #[arg(long, value_name = "DIR", help_heading = "Copy options")]
    cwd: Option<std::path::PathBuf>,

    /// Rename all <source> filenames to <FILENAME>
    ///
    /// Supports the `{{basename}}` template: it is replaced with the original name without
    /// its extension, and the original extension is kept.
    #[arg(long, value_name = "FILENAME", help_heading = "Copy options")]
    rename: Option<String>,

    /// Allow patterns to match entries that begin with a period (.)
    #[arg(long, help_heading = "Copy options")]
    dot: bool,

    /// Flatten directory structure, all copied files will be put in the same directory
    #[arg(long, help_heading = "Copy options")]
    flat: bool,

    /// Print what would be copied without copying anything
    #[arg(long, help_heading = "Copy options")]
    dry_run: bool,

    // Progress & output
    /// Show progress
    #[arg(long, help_heading = "Progress & output")]
    progress: bool,

    /// Print summary at the end
    #[arg(long, help_heading = "Progress & output")]
    summary: bool,

    /// Verbose level (implies "summary"): -v INFO / -vv DEBUG / -vvv TRACE (default: ERROR)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, help_heading = "Progress & output")]
    verbose: u8,

    /// Quiet mode, don't report errors
    #[arg(short = 'q', long = "quiet", help_heading = "Progress & output")]
    quiet: bool,

    // Performance & throttling
    /// Number of files being copied concurrently (default: twice the number of CPU cores)
    #[arg(long, value_name = "N", value_parser = parse_concurrency, help_heading = "Performance & throttling")]
    concurrency: Option<usize>,

    /// Maximum number of open files, 0 or unspecified means no limit
    #[arg(long, value_name = "N", help_heading = "Performance & throttling")]
    max_open_files: Option<usize>,

    /// Throttle the number of copy operations per second, 0 means no throttle
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Performance & throttling"
    )]
    ops_throttle: usize,

    // Advanced settings
    /// Number of worker threads, 0 means number of cores
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_workers: usize,

    /// Number of blocking worker threads, 0 means Tokio runtime default (512)
    #[arg(
        long,
        default_value = "0",
        value_name = "N",
        help_heading = "Advanced settings"
    )]
    max_blocking_threads: usize,

    // ARGUMENTS
    /// Source pattern(s) followed by the destination directory
    #[arg(value_name = "SOURCE... DESTINATION")]
    paths: Vec<String>,
}

fn parse_concurrency(value: &str) -> Result<usize, String> {
    match value.parse::<usize>() {
        Ok(0) => Err("concurrency must be at least 1".to_string()),
        Ok(n) => Ok(n),
        Err(error) => Err(error.to_string()),
    }
}

fn resolve_cwd(cwd: Option<&std::path::Path>) -> anyhow::Result<std::path::PathBuf> {
    let current = std::env::current_dir().context("failed reading the current directory")?;
    Ok(match cwd {
        Some(cwd) => current.join(cwd),
        None => current,
    })
}

#[instrument]
async fn async_main(args: Args) -> common::Result<common::Summary> {
    let Some((destination, sources)) = args
        .paths
        .split_last()
        .filter(|(destination, sources)| {
            !destination.is_empty()
                && !sources.is_empty()
                && sources.iter().all(|source| !source.is_empty())
        })
    else {
        return Err(common::Error::Usage(
            "`source` and `destination` required".to_string(),
        ));
    };
    let patterns = common::pattern::PatternSet::new(sources)?;
    let config = common::RunConfiguration {
        cwd: resolve_cwd(args.cwd.as_deref())?,
        overwrite: !args.no_overwrite,
        rename: args
            .rename
            .as_deref()
            .map(common::plan::RenameRule::parse)
            .transpose()?
            .unwrap_or_default(),
        dot: args.dot,
        flat: args.flat,
        concurrency: args
            .concurrency
            .unwrap_or_else(common::config::default_concurrency),
    };
    tracing::debug!("run configuration: {:?}", &config);
    let destination = std::path::Path::new(destination);
    if args.dry_run {
        let tasks = common::plan_copy(&patterns, destination, &config).await?;
        for task in &tasks {
            println!("{task}");
        }
        return Ok(common::Summary::default());
    }
    let report = common::copy(&patterns, destination, &config, args.progress).await?;
    report.into_result()
}

fn main() {
    let args = Args::parse();
    let func = {
        let args = args.clone();
        || async_main(args)
    };
    let output = common::OutputConfig {
        quiet: args.quiet,
        verbose: args.verbose,
        print_summary: args.summary && !args.dry_run,
    };
    let runtime = common::RuntimeConfig {
        max_workers: args.max_workers,
        max_blocking_threads: args.max_blocking_threads,
    };
    let throttle = common::ThrottleConfig {
        max_open_files: args.max_open_files,
        ops_throttle: args.ops_throttle,
    };
    let res = common::run(output, runtime, throttle, func);
    if res.is_none() {
        std::process::exit(1);
    }
}
