//! Pull progress bar

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use addonpack_core::ImageReference;
use addonpack_image::{PullObserver, PullOutcome};

/// Shows one bar for the pull batch on stderr; invisible until pulls start
pub struct PullProgress {
    bar: ProgressBar,
}

impl PullProgress {
    pub fn new() -> Self {
        let bar = ProgressBar::hidden();
        if let Ok(style) =
            ProgressStyle::with_template("  {spinner} pulling [{bar:30}] {pos}/{len} {wide_msg}")
        {
            bar.set_style(style.progress_chars("=> "));
        }
        Self { bar }
    }

    /// Remove the bar from the terminal
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl Default for PullProgress {
    fn default() -> Self {
        Self::new()
    }
}

impl PullObserver for PullProgress {
    fn on_start(&self, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_draw_target(ProgressDrawTarget::stderr());
    }

    fn on_complete(&self, image: &ImageReference, outcome: &PullOutcome) {
        if let PullOutcome::Failed(_) = outcome {
            self.bar.println(format!("  failed to pull {}", image));
        }
        self.bar.set_message(image.to_string());
        self.bar.inc(1);
    }
}
