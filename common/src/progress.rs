use crate::copy::CopyOutcome;

const TEMPLATE: &str = "{spinner} [{elapsed_precise}] [{bar:40}] {pos}/{len} files {msg}";

/// Progress bar over the planned copy tasks, drawn on stderr.
///
/// A disabled bar is hidden, so callers can report into it unconditionally.
#[derive(Clone)]
pub struct Progress {
    bar: indicatif::ProgressBar,
}

impl Progress {
    #[must_use]
    pub fn new(total: u64, enabled: bool) -> Self {
        if !enabled {
            return Self::hidden();
        }
        let style = indicatif::ProgressStyle::with_template(TEMPLATE)
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
            .progress_chars("=>-");
        let bar = indicatif::ProgressBar::new(total).with_style(style);
        Self { bar }
    }
    #[must_use]
    pub fn hidden() -> Self {
        Self {
            bar: indicatif::ProgressBar::hidden(),
        }
    }
    pub fn record(&self, outcome: &CopyOutcome) {
        if let Some(name) = outcome.task().source.file_name() {
            self.bar.set_message(name.to_string_lossy().into_owned());
        }
        self.bar.inc(1);
    }
    #[must_use]
    pub fn position(&self) -> u64 {
        self.bar.position()
    }
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}
