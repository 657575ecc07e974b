//! Terminal feedback for `evidence_scan`: one timed line per scan step
//! (loading the detector, opening the video, exporting) and a frame bar
//! while the engine runs. Everything goes to stderr so stdout keeps only
//! the run summary.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::{Duration, Instant};

/// Animated output is only used on a terminal, and in `auto` mode only when
/// stdout is not being piped.
#[derive(Clone, Debug)]
pub struct Ui {
    animated: bool,
}

impl Ui {
    pub fn from_args(ui_flag: Option<&str>, stderr_is_tty: bool, stdout_piped: bool) -> Self {
        let animated = stderr_is_tty
            && match ui_flag {
                Some("plain") => false,
                Some("pretty") => true,
                _ => !stdout_piped,
            };
        Self { animated }
    }

    /// Start a scan step. The step reports its duration when dropped.
    pub fn step(&self, label: &str) -> ScanStep {
        let spinner = if self.animated {
            let spinner = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            spinner.set_style(
                ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed}]")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            spinner.set_message(label.to_string());
            spinner.enable_steady_tick(Duration::from_millis(100));
            Some(spinner)
        } else {
            eprintln!("{}...", label);
            None
        };
        ScanStep {
            label: label.to_string(),
            started: Instant::now(),
            spinner,
        }
    }

    /// Frame progress for an analysis run. An unknown frame count (0) shows
    /// a running counter instead of a bar.
    pub fn frames(&self, total_frames: u64) -> FrameProgress {
        if !self.animated {
            return FrameProgress { bar: None };
        }
        let (bar, template) = if total_frames > 0 {
            (
                ProgressBar::with_draw_target(Some(total_frames), ProgressDrawTarget::stderr()),
                "{bar:32.green/white} {pos}/{len} frames ({percent}%) {msg}",
            )
        } else {
            (
                ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr()),
                "{spinner} {pos} frames {msg}",
            )
        };
        bar.set_style(
            ProgressStyle::with_template(template).unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        FrameProgress { bar: Some(bar) }
    }
}

pub struct ScanStep {
    label: String,
    started: Instant,
    spinner: Option<ProgressBar>,
}

impl Drop for ScanStep {
    fn drop(&mut self) {
        let line = format!("{}: done in {}", self.label, short_elapsed(self.started.elapsed()));
        match &self.spinner {
            Some(spinner) => spinner.finish_with_message(line),
            None => eprintln!("{}", line),
        }
    }
}

pub struct FrameProgress {
    bar: Option<ProgressBar>,
}

impl FrameProgress {
    pub fn update(&self, position: u64, evidence: usize, rate: &str) {
        if let Some(bar) = &self.bar {
            bar.set_position(position);
            bar.set_message(format!("{} evidence, {}", evidence, rate));
        }
    }

    pub fn finish(&self, message: &str) {
        match &self.bar {
            Some(bar) => bar.finish_with_message(message.to_string()),
            None => eprintln!("{}", message),
        }
    }
}

fn short_elapsed(elapsed: Duration) -> String {
    match elapsed.as_millis() {
        ms if ms < 1000 => format!("{}ms", ms),
        _ => format!("{:.1}s", elapsed.as_secs_f64()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_flag_and_pipes_disable_animation() {
        assert!(!Ui::from_args(Some("plain"), true, false).animated);
        assert!(!Ui::from_args(Some("auto"), true, true).animated);
        assert!(!Ui::from_args(Some("pretty"), false, false).animated);
        assert!(Ui::from_args(Some("pretty"), true, true).animated);
        assert!(Ui::from_args(None, true, false).animated);
    }

    #[test]
    fn step_durations_switch_to_seconds() {
        assert_eq!(short_elapsed(Duration::from_millis(250)), "250ms");
        assert_eq!(short_elapsed(Duration::from_millis(2_340)), "2.3s");
    }
}
