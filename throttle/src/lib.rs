//! Resource throttling for file copy workers
//!
//! Two process-wide limits are provided, both disabled until configured:
//!
//! 1. **Open Files Limit** - caps the number of files held open at the same time
//! 2. **Operations Throttle** - caps the number of copy operations started per second
//!
//! Both are token semaphores. Open-file permits are returned when their guard is dropped,
//! operation tokens are consumed and refilled by a background task.
//!
//! ```rust,no_run
//! use throttle::{get_ops_token, init_ops_tokens, open_file_permit, run_ops_replenish_thread, set_max_open_files};
//! use std::time::Duration;
//!
//! # async fn example() {
//! set_max_open_files(1024);
//! // 10 tokens every 100ms = 100 operations per second
//! init_ops_tokens(10);
//! tokio::spawn(run_ops_replenish_thread(10, Duration::from_millis(100)));
//!
//! get_ops_token().await;
//! let _guard = open_file_permit().await;
//! // open and copy the file while the guard is alive
//! # }
//! ```

mod semaphore;

static OPEN_FILES_LIMIT: semaphore::Semaphore = semaphore::Semaphore::new();
static OPS_THROTTLE: semaphore::Semaphore = semaphore::Semaphore::new();

/// Limit the number of concurrently open files, 0 disables the limit.
pub fn set_max_open_files(max_open_files: usize) {
    tracing::debug!("max open files: {max_open_files}");
    OPEN_FILES_LIMIT.setup(max_open_files);
}

pub struct OpenFileGuard {
    _permit: Option<tokio::sync::SemaphorePermit<'static>>,
}

pub async fn open_file_permit() -> OpenFileGuard {
    OpenFileGuard {
        _permit: OPEN_FILES_LIMIT.acquire().await,
    }
}

/// Configure the per-interval operation budget, 0 disables throttling.
pub fn init_ops_tokens(ops_tokens: usize) {
    OPS_THROTTLE.setup(ops_tokens);
}

pub async fn get_ops_token() {
    OPS_THROTTLE.consume().await;
}

pub async fn run_ops_replenish_thread(replenish: usize, interval: std::time::Duration) {
    OPS_THROTTLE.run_replenish_thread(replenish, interval).await;
}

/// Split an operations-per-second budget into a (tokens, interval) replenish schedule.
///
/// The second is divided into as many equal intervals as possible (at most 100, so every
/// 10ms) while keeping a whole number of tokens per interval, which keeps bursts short and
/// `tokens / interval` equal to the requested rate.
#[must_use]
pub fn replenish_schedule(ops_per_second: usize) -> (usize, std::time::Duration) {
    if ops_per_second == 0 {
        return (0, std::time::Duration::from_secs(1));
    }
    let intervals = gcd(ops_per_second, 100);
    (
        ops_per_second / intervals,
        std::time::Duration::from_millis(1000 / intervals as u64),
    )
}

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_scales_with_rate() {
        assert_eq!(
            replenish_schedule(1000),
            (10, std::time::Duration::from_millis(10))
        );
        assert_eq!(
            replenish_schedule(50),
            (1, std::time::Duration::from_millis(20))
        );
        assert_eq!(replenish_schedule(3), (3, std::time::Duration::from_secs(1)));
        assert_eq!(
            replenish_schedule(150),
            (3, std::time::Duration::from_millis(20))
        );
        assert_eq!(replenish_schedule(199), (199, std::time::Duration::from_secs(1)));
    }

    #[test]
    fn schedule_preserves_requested_rate() {
        for ops_per_second in (1..=2000).chain([4096, 12345, 1_000_000]) {
            let (tokens, interval) = replenish_schedule(ops_per_second);
            assert!(tokens >= 1);
            assert!(interval >= std::time::Duration::from_millis(10));
            let per_second = tokens as u128 * 1000 / interval.as_millis();
            assert_eq!(per_second, ops_per_second as u128, "rate {ops_per_second}");
        }
    }

    #[tokio::test]
    async fn unconfigured_limits_do_not_block() {
        let _first = open_file_permit().await;
        let _second = open_file_permit().await;
        get_ops_token().await;
    }
}
