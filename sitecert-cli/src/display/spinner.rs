use indicatif::{ProgressBar, ProgressStyle};
use sitecert_core::CheckTarget;
use std::time::Duration;

const TICK_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

/// Per-target progress line on stderr, cleared once the check completes.
///
/// A hidden spinner still carries its message, which keeps the caller free
/// of terminal checks.
pub struct Spinner {
    progress: ProgressBar,
}

impl Spinner {
    /// Spinner for the `index`-th (zero-based) of `total` targets.
    pub fn connecting(index: usize, total: usize, target: &CheckTarget, visible: bool) -> Self {
        let progress = if visible {
            ProgressBar::new_spinner()
        } else {
            ProgressBar::hidden()
        };

        let style = ProgressStyle::default_spinner()
            .tick_chars(TICK_CHARS)
            .template("{spinner:.cyan} {msg} {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner());
        progress.set_style(style);
        progress.set_message(format!("[{}/{}] Connecting to {}", index + 1, total, target));

        if visible {
            progress.enable_steady_tick(Duration::from_millis(80));
        }

        Self { progress }
    }

    pub fn message(&self) -> String {
        self.progress.message()
    }

    /// Clear the line before the report for this target is printed.
    pub fn finish(self) {
        self.progress.finish_and_clear();
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if !self.progress.is_finished() {
            self.progress.finish_and_clear();
        }
    }
}
