use crate::model::{InfoEvent, SessionEvent, TaskState};
use crate::view::{self, View};
use std::path::PathBuf;
use std::time::Instant;

const SPINNER: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

pub struct UiState {
    pub tab: usize,
    pub input: String,
    pub task: TaskState,
    pub info: String,
    pub base_url: String,
    pub save_dir: PathBuf,
    pub saved_path: Option<PathBuf>,
    pub downloading: bool,
    // Animation frame, advanced once per render tick
    pub frame: usize,
    pub task_started: Option<Instant>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            tab: 0,
            input: String::new(),
            task: TaskState::default(),
            info: String::new(),
            base_url: String::new(),
            save_dir: PathBuf::from("."),
            saved_path: None,
            downloading: false,
            frame: 0,
            task_started: None,
        }
    }
}

impl UiState {
    pub fn apply_event(&mut self, ev: SessionEvent) {
        match ev {
            SessionEvent::StateChanged { state } => {
                match &state {
                    TaskState::Submitting { .. } => {
                        self.task_started = Some(Instant::now());
                        self.saved_path = None;
                        self.info = "Submitting…".into();
                    }
                    TaskState::Idle { .. } => {
                        self.task_started = None;
                        self.saved_path = None;
                    }
                    TaskState::Completed { .. } => {
                        self.info = "Separation complete".into();
                    }
                    TaskState::Failed { .. } => {
                        self.info = "Processing failed".into();
                    }
                    TaskState::Active { .. } => {}
                }
                self.task = state;
            }
            SessionEvent::Info(info) => {
                match &info {
                    InfoEvent::Saved { path } => {
                        self.downloading = false;
                        self.saved_path = Some(path.clone());
                    }
                    InfoEvent::SaveFailed { .. } => self.downloading = false,
                    _ => {}
                }
                self.info = info.to_message();
            }
        }
    }

    /// The input box accepts edits and submits only while no task is in flight.
    pub fn input_enabled(&self) -> bool {
        !self.task.is_busy()
    }

    pub fn view(&self) -> View {
        view::view_for(&self.task, &self.base_url)
    }

    pub fn download_url(&self) -> Option<String> {
        self.task
            .result_file()
            .map(|f| crate::api::download_url(&self.base_url, f))
    }

    pub fn spinner(&self) -> &'static str {
        SPINNER[self.frame % SPINNER.len()]
    }

    pub fn elapsed_label(&self) -> Option<String> {
        let secs = self.task_started?.elapsed().as_secs();
        Some(format!("{}:{:02}", secs / 60, secs % 60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaskStatus;

    fn changed(state: TaskState) -> SessionEvent {
        SessionEvent::StateChanged { state }
    }

    #[test]
    fn input_locked_while_task_runs() {
        let mut state = UiState::default();
        assert!(state.input_enabled());

        state.apply_event(changed(TaskState::Submitting {
            input: "song".into(),
        }));
        assert!(!state.input_enabled());
        assert!(state.task_started.is_some());

        state.apply_event(changed(TaskState::Active {
            task_id: "t1".into(),
            status: TaskStatus::Analyzing,
        }));
        assert!(!state.input_enabled());

        state.apply_event(changed(TaskState::Failed {
            task_id: "t1".into(),
            error: "Packaging failed".into(),
        }));
        assert!(state.input_enabled());
    }

    #[test]
    fn saved_path_tracked_until_reset() {
        let mut state = UiState {
            base_url: "http://localhost:8000".into(),
            downloading: true,
            ..Default::default()
        };
        state.apply_event(changed(TaskState::Completed {
            task_id: "t1".into(),
            result_file: Some("t1.zip".into()),
        }));
        assert_eq!(
            state.download_url().as_deref(),
            Some("http://localhost:8000/download/t1.zip")
        );

        state.apply_event(SessionEvent::Info(InfoEvent::Saved {
            path: PathBuf::from("./t1.zip"),
        }));
        assert!(!state.downloading);
        assert_eq!(state.saved_path, Some(PathBuf::from("./t1.zip")));
        assert_eq!(state.info, "Saved: ./t1.zip");

        state.apply_event(changed(TaskState::default()));
        assert_eq!(state.saved_path, None);
        assert_eq!(state.download_url(), None);
    }

    #[test]
    fn spinner_cycles() {
        let mut state = UiState::default();
        let first = state.spinner();
        state.frame = SPINNER.len();
        assert_eq!(state.spinner(), first);
    }
}
