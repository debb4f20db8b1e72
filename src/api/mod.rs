//! Backend access.
//!
//! The session talks to the processing service only through [`TaskBackend`],
//! which keeps the poll loop testable against a scripted backend.

mod client;
mod download;

use crate::error::ApiError;
use crate::model::{SubmitReceipt, TaskSnapshot};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub(crate) use client::{download_url, HttpBackend};

#[async_trait]
pub(crate) trait TaskBackend: Send + Sync {
    /// `POST /process` with the song URL or search text.
    async fn submit(&self, input: &str) -> Result<SubmitReceipt, ApiError>;

    /// `GET /tasks/{task_id}`.
    async fn task_status(&self, task_id: &str) -> Result<TaskSnapshot, ApiError>;

    /// Stream `GET /download/{filename}` into `dest_dir`, returning the written path.
    async fn download(&self, filename: &str, dest_dir: &Path) -> Result<PathBuf, ApiError>;
}
