//! Application-level orchestration.
//!
//! This module owns the task lifecycle (submit, poll, reset) and the session
//! loop that talks to the backend. UI/CLI layers send [`UiCommand`]s and render
//! the state carried by the session's events.

mod controller;
mod lifecycle;

pub(crate) use controller::{run_controller, UiCommand};
