//! Status panel: onboarding progress for the terminal.

use crate::onboarding::{ONBOARDING_DAYS, UserStatus};

/// Width of the progress bar in cells.
pub const BAR_WIDTH: usize = 28;

pub const LOADING_TEXT: &str = "Loading status...";
pub const COMPLETE_BANNER: &str = "🎉 Onboarding Complete!";

/// Render a proportional bar for `percent` (clamped to 0..=100).
pub fn progress_bar(percent: f64, width: usize) -> String {
    let fraction = (percent / 100.0).clamp(0.0, 1.0);
    let filled = ((fraction * width as f64).round() as usize).min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

/// Render the whole panel. `None` means no status has been loaded yet.
pub fn render_status(status: Option<&UserStatus>) -> String {
    let Some(status) = status else {
        return LOADING_TEXT.to_string();
    };

    let mut lines = vec![
        "Your Progress".to_string(),
        format!("Day {} of {}", status.onboarding_step, ONBOARDING_DAYS),
        format!(
            "{} {}% Complete",
            progress_bar(status.progress(), BAR_WIDTH),
            status.progress_percent()
        ),
        format!("Member: {}", status.username),
    ];

    if let Some(started) = status.started_on() {
        lines.push(format!("Started: {}", started.format("%b %-d, %Y")));
    }

    if let Some(question) = status.current_question.as_deref() {
        if !status.onboarding_complete {
            lines.push(format!("Today: {question}"));
        }
    }

    if status.onboarding_complete {
        lines.push(COMPLETE_BANNER.to_string());
    }

    lines.join("\n")
}
