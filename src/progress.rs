//! Terminal progress for the pipeline phases and registry loops.
//!
//! With `--log-only` the bars are hidden and phase names and periodic
//! counts go through `log` instead.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use log::info;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Set once from `--log-only` before any bar is created.
pub static LOG_ONLY: AtomicBool = AtomicBool::new(false);

pub fn set_log_only(value: bool) {
    LOG_ONLY.store(value, Ordering::Relaxed);
}

pub fn is_log_only() -> bool {
    LOG_ONLY.load(Ordering::Relaxed)
}

/// Seconds below a minute, fractional minutes above.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

const BAR_TEMPLATE: &str =
    "{msg:<34} [{elapsed_precise}] {wide_bar:.green/white} {pos}/{len} ({per_sec}, ETA {eta})";
const SPINNER_TEMPLATE: &str = "{spinner:.green} {msg} [{elapsed_precise}]";

/// Hidden in log-only mode, where the phase name is logged once instead.
fn attach(pb: ProgressBar, style: Option<ProgressStyle>, msg: &str) -> ProgressBar {
    if is_log_only() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
        info!("{}", msg);
    } else if let Some(style) = style {
        pb.set_style(style);
    }
    pb.set_message(msg.to_string());
    pb
}

/// Bar for a phase with a known number of steps.
pub fn create_progress_bar(len: u64, msg: &str) -> ProgressBar {
    let style = ProgressStyle::with_template(BAR_TEMPLATE)
        .ok()
        .map(|s| s.progress_chars("#>-"));
    attach(ProgressBar::new(len), style, msg)
}

/// Log progress periodically for tail-friendly output.
/// Only logs when in log-only mode and at specified intervals.
pub fn log_progress(phase: &str, current: u64, total: u64, interval: u64) {
    if total == 0 || interval == 0 {
        return;
    }
    if is_log_only() && (current % interval == 0 || current == total) {
        let pct = 100.0 * current as f64 / total as f64;
        info!("[{}] {}/{} ({:.1}%)", phase, current, total, pct);
    }
}

/// Spinner for phases without a step count (loading, indexing).
pub fn create_spinner(msg: &str) -> ProgressBar {
    let pb = attach(
        ProgressBar::new_spinner(),
        ProgressStyle::with_template(SPINNER_TEMPLATE).ok(),
        msg,
    );
    if !is_log_only() {
        pb.enable_steady_tick(Duration::from_millis(120));
    }
    pb
}

/// Percentage helper for summaries; 0 when the denominator is 0.
pub fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        100.0 * part as f64 / whole as f64
    }
}
