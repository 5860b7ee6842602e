use tokio::io::AsyncWriteExt;
use tracing::instrument;

use crate::error::FileError;
use crate::plan::CopyTask;

#[derive(Debug, Copy, Clone)]
pub struct Settings {
    pub overwrite: bool,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// destination exists and overwriting is disabled
    AlreadyExists,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            SkipReason::AlreadyExists => write!(f, "destination already exists"),
        }
    }
}

/// What happened to a single [`CopyTask`].
#[derive(Debug, Clone)]
pub enum CopyOutcome {
    Success { task: CopyTask, bytes: u64 },
    Skipped { task: CopyTask, reason: SkipReason },
    Failed { task: CopyTask, error: FileError },
}

impl CopyOutcome {
    #[must_use]
    pub fn task(&self) -> &CopyTask {
        match self {
            CopyOutcome::Success { task, .. }
            | CopyOutcome::Skipped { task, .. }
            | CopyOutcome::Failed { task, .. } => task,
        }
    }
}

/// Copy one file, creating the destination's parent directories as needed.
///
/// Never returns an error: every I/O problem is reported as [`CopyOutcome::Failed`].
#[instrument(skip(task), fields(src = ?task.source, dst = ?task.destination))]
pub async fn copy_file(task: CopyTask, settings: &Settings) -> CopyOutcome {
    throttle::get_ops_token().await;
    let parent = task.destination.parent().unwrap_or(std::path::Path::new("/"));
    if let Err(error) = tokio::fs::create_dir_all(parent).await {
        tracing::debug!("failed creating directory {:?}: {}", parent, &error);
        let error = FileError::new(parent, &error);
        return CopyOutcome::Failed { task, error };
    }
    match tokio::fs::symlink_metadata(&task.destination).await {
        Ok(_) if !settings.overwrite => {
            tracing::debug!("destination exists, skipping");
            return CopyOutcome::Skipped {
                task,
                reason: SkipReason::AlreadyExists,
            };
        }
        Ok(_) => {
            if is_same_file(&task).await {
                let error = std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "source and destination are the same file",
                );
                return failed(task, Side::Destination, &error);
            }
            tracing::debug!("destination exists, overwriting");
        }
        Err(_) => {}
    }
    let _open_file_guard = throttle::open_file_permit().await;
    tracing::debug!("copying data");
    let mut reader = match tokio::fs::File::open(&task.source).await {
        Ok(reader) => reader,
        Err(error) => return failed(task, Side::Source, &error),
    };
    let permissions = match reader.metadata().await {
        Ok(metadata) if metadata.is_dir() => {
            let error = std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "source is a directory",
            );
            return failed(task, Side::Source, &error);
        }
        Ok(metadata) => metadata.permissions(),
        Err(error) => return failed(task, Side::Source, &error),
    };
    // data goes to a staging file that is renamed over the destination once complete, so
    // tasks sharing a destination never interleave their writes
    let staging = staging_path(&task.destination);
    let bytes = match write_staged(&mut reader, &staging, permissions).await {
        Ok(bytes) => bytes,
        Err(error) => {
            discard_staged(&staging).await;
            return failed(task, Side::Destination, &error);
        }
    };
    if let Err(error) = tokio::fs::rename(&staging, &task.destination).await {
        discard_staged(&staging).await;
        return failed(task, Side::Destination, &error);
    }
    CopyOutcome::Success { task, bytes }
}

static STAGING_COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);

/// Hidden sibling of `destination`, unique within this process.
fn staging_path(destination: &std::path::Path) -> std::path::PathBuf {
    let id = STAGING_COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    let name = destination
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    destination.with_file_name(format!(".{name}.cpy-{}-{id}.tmp", std::process::id()))
}

async fn write_staged(
    reader: &mut tokio::fs::File,
    staging: &std::path::Path,
    permissions: std::fs::Permissions,
) -> std::io::Result<u64> {
    let mut writer = tokio::fs::File::create(staging).await?;
    let bytes = tokio::io::copy(reader, &mut writer).await?;
    writer.flush().await?;
    // permissions are best-effort, the content is what matters
    if let Err(error) = tokio::fs::set_permissions(staging, permissions).await {
        tracing::warn!("failed setting permissions on {:?}: {}", staging, error);
    }
    Ok(bytes)
}

async fn discard_staged(staging: &std::path::Path) {
    match tokio::fs::remove_file(staging).await {
        Err(error) if error.kind() != std::io::ErrorKind::NotFound => {
            tracing::warn!("failed removing staging file {:?}: {}", staging, error);
        }
        _ => {}
    }
}

enum Side {
    Source,
    Destination,
}

fn failed(task: CopyTask, side: Side, error: &std::io::Error) -> CopyOutcome {
    let path = match side {
        Side::Source => &task.source,
        Side::Destination => &task.destination,
    };
    tracing::debug!("copy failed on {:?}: {}", path, error);
    let error = FileError::new(path, error);
    CopyOutcome::Failed { task, error }
}

async fn is_same_file(task: &CopyTask) -> bool {
    match (
        tokio::fs::canonicalize(&task.source).await,
        tokio::fs::canonicalize(&task.destination).await,
    ) {
        (Ok(src), Ok(dst)) => src == dst,
        _ => false,
    }
}
