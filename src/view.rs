//! Presentation model.
//!
//! Pure functions from task state to what the user should see. The TUI and
//! the text/JSON modes render from these; none of them keep progress state of
//! their own.

use crate::model::{TaskState, TaskStatus};
use serde::Serialize;

/// One milestone of the step tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Milestone {
    pub status: TaskStatus,
    pub label: &'static str,
}

pub const MILESTONES: [Milestone; 4] = [
    Milestone {
        status: TaskStatus::Downloading,
        label: "Downloading",
    },
    Milestone {
        status: TaskStatus::Separating,
        label: "AI Separating",
    },
    Milestone {
        status: TaskStatus::Analyzing,
        label: "Analyzing",
    },
    Milestone {
        status: TaskStatus::Packaging,
        label: "Packaging",
    },
];

/// Feature highlights shown on the idle screen.
pub const FEATURES: [(&str, &str); 3] = [
    (
        "Stem Isolation",
        "Isolate vocals, drums, bass and more using Demucs AI.",
    ),
    (
        "Deep Analysis",
        "Get accurate BPM, Musical Key, and LUFS loudness data.",
    ),
    (
        "Zip Export",
        "Everything packaged and ready for your DAW or sampler.",
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Pending,
    Current,
    Completed,
    Failed,
}

/// Classify one milestone against the current status.
pub fn step_state(milestone: TaskStatus, current: TaskStatus) -> StepState {
    match current {
        TaskStatus::Failed => return StepState::Failed,
        TaskStatus::Completed => return StepState::Completed,
        _ => {}
    }
    match (current.pipeline_index(), milestone.pipeline_index()) {
        (Some(c), Some(m)) if c > m => StepState::Completed,
        (Some(c), Some(m)) if c == m => StepState::Current,
        _ => StepState::Pending,
    }
}

pub fn step_states(current: TaskStatus) -> [(Milestone, StepState); 4] {
    MILESTONES.map(|m| (m, step_state(m.status, current)))
}

/// Width of the progress bar, in percent.
pub fn progress_percent(status: TaskStatus) -> u16 {
    match status {
        TaskStatus::Idle | TaskStatus::Submitting => 0,
        TaskStatus::Queued => 5,
        TaskStatus::Downloading => 25,
        TaskStatus::Separating => 55,
        TaskStatus::Analyzing => 75,
        TaskStatus::Packaging => 90,
        TaskStatus::Completed | TaskStatus::Failed => 100,
    }
}

/// Which screen to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    Idle {
        error: Option<String>,
    },
    InProgress {
        status: TaskStatus,
        steps: [(Milestone, StepState); 4],
        percent: u16,
    },
    Completed {
        download_url: Option<String>,
    },
    Failed {
        error: String,
    },
}

pub fn view_for(state: &TaskState, base_url: &str) -> View {
    match state {
        TaskState::Idle { error } => View::Idle {
            error: error.clone(),
        },
        TaskState::Submitting { .. } | TaskState::Active { .. } => {
            let status = state.status();
            View::InProgress {
                status,
                steps: step_states(status),
                percent: progress_percent(status),
            }
        }
        TaskState::Completed { result_file, .. } => View::Completed {
            download_url: result_file
                .as_deref()
                .map(|f| crate::api::download_url(base_url, f)),
        },
        TaskState::Failed { error, .. } => View::Failed {
            error: error.clone(),
        },
    }
}
