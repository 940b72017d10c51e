//! Spinner shown while a component installs

use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

const TICK_STRINGS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Progress display for one component install
pub struct InstallProgress {
    spinner: ProgressBar,
}

impl InstallProgress {
    /// Start a spinner labelled `message`, or a hidden one when `visible` is false
    pub fn start(message: &str, visible: bool) -> Self {
        if !visible {
            return Self {
                spinner: ProgressBar::hidden(),
            };
        }

        let style = ProgressStyle::with_template("{spinner} {msg}...")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICK_STRINGS);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }

    /// Update the step shown next to the spinner
    pub fn step(&self, message: &str) {
        self.spinner.set_message(message.to_string());
    }

    pub fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    /// Stop the spinner, leaving the last message on screen
    pub fn abandon(&self) {
        self.spinner.abandon();
    }
}
