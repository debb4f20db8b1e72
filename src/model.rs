use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub user_agent: String,
    pub progress_policy: ProgressPolicy,
}

/// How poll responses are allowed to move the tracked status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPolicy {
    /// Every response overwrites the tracked status.
    #[default]
    Trust,
    /// Backward moves along the pipeline are logged and ignored.
    Monotonic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Idle,
    Submitting,
    Queued,
    Downloading,
    Separating,
    Analyzing,
    Packaging,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Server-side pipeline order. Drives step highlighting and progress.
    pub const PIPELINE: [TaskStatus; 6] = [
        TaskStatus::Queued,
        TaskStatus::Downloading,
        TaskStatus::Separating,
        TaskStatus::Analyzing,
        TaskStatus::Packaging,
        TaskStatus::Completed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Idle => "idle",
            TaskStatus::Submitting => "submitting",
            TaskStatus::Queued => "queued",
            TaskStatus::Downloading => "downloading",
            TaskStatus::Separating => "separating",
            TaskStatus::Analyzing => "analyzing",
            TaskStatus::Packaging => "packaging",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        }
    }

    /// Position in [`TaskStatus::PIPELINE`]; `None` for client-only states and `failed`.
    pub fn pipeline_index(self) -> Option<usize> {
        Self::PIPELINE.iter().position(|s| *s == self)
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Parse a status string reported by the backend.
    ///
    /// `idle` and `submitting` only exist on the client, so the backend
    /// reporting them is treated the same as an unknown value.
    pub fn from_server(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "queued" => Some(TaskStatus::Queued),
            "downloading" => Some(TaskStatus::Downloading),
            "separating" => Some(TaskStatus::Separating),
            "analyzing" => Some(TaskStatus::Analyzing),
            "packaging" => Some(TaskStatus::Packaging),
            "completed" => Some(TaskStatus::Completed),
            "failed" => Some(TaskStatus::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `POST /process`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitReceipt {
    pub task_id: String,
}

/// Body of `GET /tasks/{task_id}`. The status stays a raw string so that an
/// unexpected value is a soft failure of one poll, not a decode error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub status: String,
    #[serde(default)]
    pub result_file: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Client-side lifecycle of the single tracked task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum TaskState {
    Idle {
        error: Option<String>,
    },
    Submitting {
        input: String,
    },
    Active {
        task_id: String,
        status: TaskStatus,
    },
    Completed {
        task_id: String,
        result_file: Option<String>,
    },
    Failed {
        task_id: String,
        error: String,
    },
}

impl Default for TaskState {
    fn default() -> Self {
        TaskState::Idle { error: None }
    }
}

impl TaskState {
    pub fn status(&self) -> TaskStatus {
        match self {
            TaskState::Idle { .. } => TaskStatus::Idle,
            TaskState::Submitting { .. } => TaskStatus::Submitting,
            TaskState::Active { status, .. } => *status,
            TaskState::Completed { .. } => TaskStatus::Completed,
            TaskState::Failed { .. } => TaskStatus::Failed,
        }
    }

    pub fn task_id(&self) -> Option<&str> {
        match self {
            TaskState::Active { task_id, .. }
            | TaskState::Completed { task_id, .. }
            | TaskState::Failed { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            TaskState::Idle { error } => error.as_deref(),
            TaskState::Failed { error, .. } => Some(error),
            _ => None,
        }
    }

    pub fn result_file(&self) -> Option<&str> {
        match self {
            TaskState::Completed { result_file, .. } => result_file.as_deref(),
            _ => None,
        }
    }

    /// True while a submission or poll cycle is in flight; new input is refused.
    pub fn is_busy(&self) -> bool {
        matches!(self, TaskState::Submitting { .. } | TaskState::Active { .. })
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }
}

#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged { state: TaskState },
    Info(InfoEvent),
}

/// Structured info events emitted by the session and consumed by UI/CLI layers.
#[derive(Debug, Clone)]
pub enum InfoEvent {
    Message(String),
    Submitted { task_id: String },
    Abandoned { task_id: String },
    Saved { path: PathBuf },
    SaveFailed { reason: String },
}

impl InfoEvent {
    /// Render a human-readable message for UI/CLI layers.
    pub fn to_message(&self) -> String {
        match self {
            InfoEvent::Message(msg) => msg.clone(),
            InfoEvent::Submitted { task_id } => format!("Task submitted: {task_id}"),
            InfoEvent::Abandoned { task_id } => {
                format!("Stopped tracking task {task_id}")
            }
            InfoEvent::Saved { path } => format!("Saved: {}", path.display()),
            InfoEvent::SaveFailed { reason } => format!("Download failed: {reason}"),
        }
    }
}

/// Final outcome printed by the scripted output modes.
#[derive(Debug, Clone, Serialize)]
pub struct TaskReport {
    pub timestamp_utc: String,
    pub base_url: String,
    pub input: String,
    pub task_id: Option<String>,
    pub status: TaskStatus,
    pub result_file: Option<String>,
    pub download_url: Option<String>,
    pub error: Option<String>,
    #[serde(with = "humantime_serde")]
    pub elapsed: Duration,
    pub saved_to: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_statuses_parse_case_insensitively() {
        assert_eq!(
            TaskStatus::from_server("Separating"),
            Some(TaskStatus::Separating)
        );
        assert_eq!(TaskStatus::from_server(" failed "), Some(TaskStatus::Failed));
        assert_eq!(TaskStatus::from_server("submitting"), None);
        assert_eq!(TaskStatus::from_server("exploding"), None);
    }

    #[test]
    fn pipeline_index_covers_only_server_progression() {
        assert_eq!(TaskStatus::Queued.pipeline_index(), Some(0));
        assert_eq!(TaskStatus::Completed.pipeline_index(), Some(5));
        assert_eq!(TaskStatus::Failed.pipeline_index(), None);
        assert_eq!(TaskStatus::Idle.pipeline_index(), None);
    }

    #[test]
    fn snapshot_tolerates_extra_and_null_fields() {
        let body = r#"{"task_id":"t1","status":"queued","result_file":null,"error":null,"created_at":"2024-01-01 00:00:00"}"#;
        let snap: TaskSnapshot = serde_json::from_str(body).unwrap();
        assert_eq!(snap.status, "queued");
        assert!(snap.result_file.is_none());
        assert!(snap.error.is_none());
    }

    #[test]
    fn task_state_serializes_with_state_tag() {
        let state = TaskState::Completed {
            task_id: "t1".into(),
            result_file: Some("t1.zip".into()),
        };
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(v["state"], "completed");
        assert_eq!(v["result_file"], "t1.zip");
        assert_eq!(state.status(), TaskStatus::Completed);
        assert!(state.is_terminal());
        assert!(!state.is_busy());
    }

    #[test]
    fn failed_state_keeps_task_id() {
        let state = TaskState::Failed {
            task_id: "t1".into(),
            error: "Packaging failed".into(),
        };
        assert_eq!(state.task_id(), Some("t1"));
        assert_eq!(state.error(), Some("Packaging failed"));
        let v = serde_json::to_value(&state).unwrap();
        assert_eq!(v["state"], "failed");
        assert_eq!(v["task_id"], "t1");
    }
}
