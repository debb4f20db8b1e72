//! Task lifecycle transitions.
//!
//! Pure state handling for the single tracked task. Nothing here performs I/O;
//! the controller loop feeds in backend results and acts on what comes back.

use crate::error::ApiError;
use crate::model::{ProgressPolicy, SubmitReceipt, TaskSnapshot, TaskState, TaskStatus};

const SUBMIT_FALLBACK_ERROR: &str = "Failed to submit task";
const PIPELINE_FALLBACK_ERROR: &str = "Processing failed";

/// What the poll loop should do after a status response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PollOutcome {
    /// Still running; keep ticking.
    Continue,
    /// Reached `completed` or `failed`; stop polling.
    Finished,
    /// Response for a task that is no longer tracked.
    Stale,
}

pub(crate) struct Lifecycle {
    state: TaskState,
    policy: ProgressPolicy,
}

impl Lifecycle {
    pub fn new(policy: ProgressPolicy) -> Self {
        Self {
            state: TaskState::default(),
            policy,
        }
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    /// Task id that should currently be polled.
    pub fn active_task(&self) -> Option<&str> {
        match &self.state {
            TaskState::Active { task_id, .. } => Some(task_id),
            _ => None,
        }
    }

    /// Start a submission. Returns the text to send, as typed, or `None` when
    /// the submit is a no-op (blank input, or a task is already in flight).
    ///
    /// Any finished task is dropped here without telling the backend.
    pub fn begin_submit(&mut self, input: &str) -> Option<String> {
        if input.trim().is_empty() {
            tracing::debug!("ignoring empty submission");
            return None;
        }
        if self.state.is_busy() {
            tracing::debug!(status = %self.state.status(), "ignoring submission while busy");
            return None;
        }
        self.state = TaskState::Submitting {
            input: input.to_string(),
        };
        Some(input.to_string())
    }

    pub fn submit_succeeded(&mut self, receipt: SubmitReceipt) {
        if !matches!(self.state, TaskState::Submitting { .. }) {
            tracing::warn!(task_id = %receipt.task_id, "submission finished after state moved on");
            return;
        }
        tracing::info!(task_id = %receipt.task_id, "task queued");
        self.state = TaskState::Active {
            task_id: receipt.task_id,
            status: TaskStatus::Queued,
        };
    }

    pub fn submit_failed(&mut self, err: &ApiError) {
        tracing::warn!(error = %err, "submission failed");
        let message = err
            .detail()
            .map(str::to_owned)
            .unwrap_or_else(|| SUBMIT_FALLBACK_ERROR.to_string());
        self.state = TaskState::Idle {
            error: Some(message),
        };
    }

    /// Apply one status response for `task_id`.
    pub fn apply_snapshot(&mut self, task_id: &str, snapshot: TaskSnapshot) -> PollOutcome {
        let current = match &self.state {
            TaskState::Active {
                task_id: active,
                status,
            } if active == task_id => *status,
            _ => {
                tracing::debug!(task_id, "dropping status for untracked task");
                return PollOutcome::Stale;
            }
        };

        let Some(next) = TaskStatus::from_server(&snapshot.status) else {
            tracing::warn!(task_id, status = %snapshot.status, "unrecognised task status");
            return PollOutcome::Continue;
        };

        match next {
            TaskStatus::Completed => {
                if snapshot.result_file.is_none() {
                    tracing::warn!(task_id, "task completed without a result file");
                }
                tracing::info!(task_id, result_file = ?snapshot.result_file, "task completed");
                self.state = TaskState::Completed {
                    task_id: task_id.to_string(),
                    result_file: snapshot.result_file,
                };
                PollOutcome::Finished
            }
            TaskStatus::Failed => {
                let error = snapshot
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| PIPELINE_FALLBACK_ERROR.to_string());
                tracing::info!(task_id, %error, "task failed");
                self.state = TaskState::Failed {
                    task_id: task_id.to_string(),
                    error,
                };
                PollOutcome::Finished
            }
            _ => {
                if self.policy == ProgressPolicy::Monotonic && is_regression(current, next) {
                    tracing::warn!(task_id, from = %current, to = %next, "ignoring backward status");
                    return PollOutcome::Continue;
                }
                if next != current {
                    tracing::debug!(task_id, from = %current, to = %next, "status changed");
                }
                self.state = TaskState::Active {
                    task_id: task_id.to_string(),
                    status: next,
                };
                PollOutcome::Continue
            }
        }
    }

    /// Transient poll failure: logged only, the next tick retries.
    pub fn poll_failed(&self, task_id: &str, err: &ApiError) {
        tracing::warn!(task_id, error = %err, "status poll failed");
    }

    /// Back to `idle` with error and result cleared. Returns the task that
    /// stopped being tracked, if any.
    pub fn reset(&mut self) -> Option<String> {
        let dropped = self.state.task_id().map(str::to_owned);
        self.state = TaskState::default();
        dropped
    }
}

fn is_regression(current: TaskStatus, next: TaskStatus) -> bool {
    match (current.pipeline_index(), next.pipeline_index()) {
        (Some(c), Some(n)) => n < c,
        _ => false,
    }
}
