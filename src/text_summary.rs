//! Text output for the `--text` mode.
//!
//! Progress lines go to stderr as the task advances; the summary is printed
//! to stdout once the session ends.

use crate::model::{TaskReport, TaskState, TaskStatus};
use crate::view::{progress_percent, step_states, StepState};
use std::time::Duration;

const BAR_WIDTH: usize = 20;

/// Pre-formatted lines for text output.
pub(crate) struct TextSummary {
    pub lines: Vec<String>,
}

fn progress_bar(percent: u16) -> String {
    let filled = (percent as usize * BAR_WIDTH) / 100;
    format!("[{}{}]", "#".repeat(filled), "-".repeat(BAR_WIDTH - filled))
}

fn step_marks(status: TaskStatus) -> String {
    step_states(status)
        .iter()
        .map(|(m, s)| {
            let mark = match s {
                StepState::Completed => "x",
                StepState::Current => ">",
                StepState::Pending => " ",
                StepState::Failed => "!",
            };
            format!("[{mark}] {}", m.label)
        })
        .collect::<Vec<_>>()
        .join("  ")
}

/// One line describing the state the task just entered.
pub(crate) fn progress_line(elapsed: Duration, state: &TaskState) -> String {
    let secs = elapsed.as_secs();
    let prefix = format!("[{:>3}:{:02}]", secs / 60, secs % 60);
    match state {
        TaskState::Idle { error: Some(e) } => format!("{prefix} submission failed: {e}"),
        TaskState::Idle { error: None } => format!("{prefix} idle"),
        TaskState::Submitting { input } => format!("{prefix} submitting \"{input}\""),
        TaskState::Active { status, .. } => format!(
            "{prefix} {:<12} {} {:>3}%  {}",
            status.as_str(),
            progress_bar(progress_percent(*status)),
            progress_percent(*status),
            step_marks(*status)
        ),
        TaskState::Completed { .. } => format!(
            "{prefix} {:<12} {} 100%",
            "completed",
            progress_bar(100)
        ),
        TaskState::Failed { error, .. } => format!("{prefix} failed: {error}"),
    }
}

/// Build the closing summary for a finished session.
pub(crate) fn build_text_summary(report: &TaskReport) -> TextSummary {
    let mut lines = Vec::new();

    lines.push(format!("Input: {}", report.input));
    if let Some(task_id) = report.task_id.as_deref() {
        lines.push(format!("Task: {task_id}"));
    }
    lines.push(format!("Status: {}", report.status));

    match report.status {
        TaskStatus::Completed => {
            lines.push("Separation complete. Your stems and analysis package is ready.".into());
            match report.download_url.as_deref() {
                Some(url) => lines.push(format!("Download: {url}")),
                None => lines.push("Download: the server did not report a package file".into()),
            }
            if let Some(path) = report.saved_to.as_ref() {
                lines.push(format!("Saved: {}", path.display()));
            }
        }
        TaskStatus::Failed | TaskStatus::Idle => {
            if let Some(error) = report.error.as_deref() {
                lines.push(format!("Error: {error}"));
            }
        }
        _ => lines.push("Task still running on the server; not tracked any more.".into()),
    }

    let elapsed = Duration::from_secs(report.elapsed.as_secs());
    lines.push(format!("Elapsed: {}", humantime::format_duration(elapsed)));

    TextSummary { lines }
}
