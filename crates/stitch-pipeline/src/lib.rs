//! Clothes-registration pipeline: stage image files locally, upload them to
//! assigned storage slots, submit one analysis batch, poll until the batch
//! finishes, then let the user confirm and commit each analyzed item
//! independently.
//!
//! The remote store and analysis service sit behind the [`FileStore`] and
//! [`AnalysisService`] traits; the HTTP client implements them elsewhere.

use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use stitch_core::ClothesAttributes;
use thiserror::Error;

mod form;
mod pipeline;
mod staging;

pub use form::ItemForm;
pub use pipeline::{
    CommitOutcome, Phase, PipelineOptions, PollOutcome, RegistrationPipeline, ReviewTask,
};
pub use staging::{StagedFile, UploadStatus, data_url_preview, is_supported_image};

/// Metadata sent when requesting upload slots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    pub name: String,
    pub mime_type: String,
}

/// One assigned upload slot: a remote file id plus a presigned destination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    pub file_id: u64,
    pub upload_url: String,
}

/// Acknowledgement of a submitted analysis batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReceipt {
    pub batch_id: String,
    pub accepted_count: usize,
}

/// Analysis progress of one file within a batch.
///
/// `task_id` is stable across polls for the same input file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisUpdate {
    pub task_id: String,
    pub file_id: u64,
    #[serde(default)]
    pub image_url: Option<String>,
    pub status: TaskStatus,
    #[serde(default)]
    pub suggestion: ClothesAttributes,
}

/// One poll response for a batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPoll {
    pub results: Vec<AnalysisUpdate>,
    pub is_finished: bool,
}

/// Per-task analysis stage. Transitions only move forward; `Completed` and
/// `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Preprocessing,
    Analyzing,
    Completed,
    Failed,
}

impl TaskStatus {
    fn rank(self) -> u8 {
        match self {
            TaskStatus::Preprocessing => 0,
            TaskStatus::Analyzing => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// Monotonic merge: a terminal status is never left, and a poll can only
    /// move a task forward through the stages.
    pub fn advance(self, observed: TaskStatus) -> TaskStatus {
        if self.is_terminal() {
            return self;
        }
        if observed.rank() >= self.rank() {
            observed
        } else {
            self
        }
    }
}

/// Fields committed for one reviewed item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitRequest {
    pub task_id: String,
    pub file_id: u64,
    #[serde(flatten)]
    pub form: ItemForm,
}

/// Boxed future returned by the store/service traits.
pub type ServiceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

/// Remote binary storage reached through presigned upload slots.
pub trait FileStore: Send + Sync {
    /// Request one slot per file for the given purpose (e.g. `"CLOTHES"`).
    fn request_upload_slots<'a>(
        &'a self,
        purpose: &'a str,
        files: &'a [FileMeta],
    ) -> ServiceFuture<'a, Vec<UploadSlot>>;

    /// Raw binary PUT to an assigned slot.
    fn put_object<'a>(
        &'a self,
        upload_url: &'a str,
        mime_type: &'a str,
        bytes: &'a [u8],
    ) -> ServiceFuture<'a, ()>;
}

/// The asynchronous clothes-analysis service.
pub trait AnalysisService: Send + Sync {
    fn submit_batch<'a>(&'a self, file_ids: &'a [u64]) -> ServiceFuture<'a, BatchReceipt>;

    fn poll_batch<'a>(&'a self, batch_id: &'a str) -> ServiceFuture<'a, BatchPoll>;

    fn commit_item<'a>(&'a self, request: &'a CommitRequest) -> ServiceFuture<'a, ()>;
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("operation not allowed while {0:?}")]
    WrongPhase(Phase),
    #[error("no staged files to submit")]
    NothingStaged,
    #[error("staging limit reached ({0} files max)")]
    StagingLimit(usize),
    #[error("unsupported image type: {0}")]
    UnsupportedImage(String),
    #[error("no such staged file index: {0}")]
    BadStagedIndex(usize),
    #[error("unknown task: {0}")]
    UnknownTask(String),
    #[error("task is not completed")]
    TaskNotCompleted,
    #[error("a category is required before saving")]
    MissingCategory,
    #[error("item already saved")]
    AlreadySaved,
    #[error("upload slot count mismatch: asked {requested}, got {assigned}")]
    SlotMismatch { requested: usize, assigned: usize },
    #[error("upload of '{file}' failed: {message}")]
    Upload { file: String, message: String },
    #[error("batch submission failed: {0}")]
    Submit(String),
    #[error("slot request failed: {0}")]
    SlotRequest(String),
    #[error("commit failed: {0}")]
    Commit(String),
    #[error("registration session cancelled")]
    Cancelled,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_monotonic() {
        assert_eq!(
            TaskStatus::Preprocessing.advance(TaskStatus::Analyzing),
            TaskStatus::Analyzing
        );
        assert_eq!(
            TaskStatus::Analyzing.advance(TaskStatus::Preprocessing),
            TaskStatus::Analyzing
        );
        assert_eq!(
            TaskStatus::Analyzing.advance(TaskStatus::Completed),
            TaskStatus::Completed
        );
    }

    #[test]
    fn terminal_status_absorbs() {
        assert_eq!(
            TaskStatus::Completed.advance(TaskStatus::Analyzing),
            TaskStatus::Completed
        );
        assert_eq!(
            TaskStatus::Failed.advance(TaskStatus::Completed),
            TaskStatus::Failed
        );
    }

    #[test]
    fn analysis_update_decodes_wire_shape() {
        let raw = r#"{
            "taskId": "t-1",
            "fileId": 55,
            "status": "ANALYZING"
        }"#;
        let update: AnalysisUpdate = serde_json::from_str(raw).unwrap();
        assert_eq!(update.task_id, "t-1");
        assert_eq!(update.status, TaskStatus::Analyzing);
        assert!(update.suggestion.materials.is_empty());
    }
}
