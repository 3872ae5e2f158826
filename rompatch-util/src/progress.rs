pub use rompatch::{PatchProgress, SilentProgress};

/// Console progress reporter using an indicatif progress bar.
///
/// The bar stays hidden until [`PatchProgress::begin`] is called and is
/// drawn on stderr so it does not mix with the summary printed on stdout.
#[cfg(feature = "cli")]
pub struct ConsoleProgress {
    bar: indicatif::ProgressBar,
    label: &'static str,
}

#[cfg(feature = "cli")]
impl ConsoleProgress {
    pub fn new(label: &'static str) -> Self {
        Self {
            bar: indicatif::ProgressBar::hidden(),
            label,
        }
    }
}

#[cfg(feature = "cli")]
impl PatchProgress for ConsoleProgress {
    fn begin(&self, total: u64) {
        let style = indicatif::ProgressStyle::default_bar()
            .template("{msg:>10} {bar:40.cyan/blue} {bytes}/{total_bytes} [{elapsed_precise}]")
            .unwrap_or_else(|_| indicatif::ProgressStyle::default_bar())
            .progress_chars("━╸─");

        self.bar
            .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        self.bar.set_length(total);
        self.bar.set_position(0);
        self.bar.set_style(style);
        self.bar.set_message(self.label);
        self.bar.reset();
    }

    fn update(&self, processed: u64) {
        self.bar.set_position(processed);
    }

    fn complete(&self) {
        self.bar.finish_and_clear();
    }
}
