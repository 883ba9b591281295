use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::future::join_all;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::form::ItemForm;
use crate::staging::{StagedFile, UploadStatus, is_supported_image};
use crate::{
    AnalysisService, AnalysisUpdate, CommitRequest, FileMeta, FileStore, PipelineError,
    TaskStatus,
};

/// Top-level phase of one registration session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Staging files locally; no network traffic yet.
    Collecting,
    /// Slots requested, uploads in flight, batch being submitted.
    Analyzing,
    /// Batch accepted; polling for per-task results and taking commits.
    Reviewing,
    /// Every committable item saved.
    Done,
    /// Terminal; all in-memory state discarded.
    Cancelled,
}

/// One analyzed file under review.
#[derive(Debug, Clone)]
pub struct ReviewTask {
    pub task_id: String,
    pub file_id: u64,
    pub image_url: Option<String>,
    pub status: TaskStatus,
    pub form: ItemForm,
    pub saved: bool,
}

/// Result of one [`RegistrationPipeline::poll_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// A response was merged; `finished` reflects the batch-level flag.
    Applied { finished: bool },
    /// Polling already observed the finished flag; no request was made.
    AlreadyFinished,
    /// A previous poll is still unresolved; this one was refused.
    InFlight,
    /// The poll request failed; transient, the next tick retries.
    Failed,
}

/// Result of one commit attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Saved,
    /// The item was committed earlier; no request was made.
    AlreadySaved,
}

/// Pipeline tuning.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Upload-slot purpose tag sent to the store.
    pub purpose: String,
    pub max_staged_files: usize,
    pub poll_interval: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        PipelineOptions {
            purpose: "CLOTHES".to_string(),
            max_staged_files: 10,
            poll_interval: Duration::from_secs(3),
        }
    }
}

struct Inner {
    phase: Phase,
    staged: Vec<StagedFile>,
    tasks: Vec<ReviewTask>,
    batch_id: Option<String>,
    error: Option<String>,
    /// Serializes polls: poll N+1 is refused while poll N is unresolved.
    poll_in_flight: bool,
    /// Latched once the batch-level finished flag is observed.
    poll_finished: bool,
    /// Bumped on cancel; responses from an older generation are discarded.
    generation: u64,
}

/// One clothes-registration session.
///
/// Owns all staged files, analysis results, and editable forms exclusively;
/// discarded on [`cancel`](RegistrationPipeline::cancel). The phases run
/// `Collecting → Analyzing → Reviewing → Done`, with `Cancelled` reachable
/// from anywhere.
pub struct RegistrationPipeline {
    store: Arc<dyn FileStore>,
    service: Arc<dyn AnalysisService>,
    options: PipelineOptions,
    cancel: CancellationToken,
    state: Mutex<Inner>,
}

impl RegistrationPipeline {
    pub fn new(
        store: Arc<dyn FileStore>,
        service: Arc<dyn AnalysisService>,
        options: PipelineOptions,
    ) -> Self {
        RegistrationPipeline {
            store,
            service,
            options,
            cancel: CancellationToken::new(),
            state: Mutex::new(Inner {
                phase: Phase::Collecting,
                staged: Vec::new(),
                tasks: Vec::new(),
                batch_id: None,
                error: None,
                poll_in_flight: false,
                poll_finished: false,
                generation: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Lock the state and verify the session wasn't cancelled while a
    /// network call was out.
    fn lock_live(&self, generation: u64) -> Result<MutexGuard<'_, Inner>, PipelineError> {
        let st = self.lock();
        if st.generation != generation {
            return Err(PipelineError::Cancelled);
        }
        Ok(st)
    }

    // ── Collecting ──────────────────────────────────────────────────────

    /// Stage one image file. Returns its index in the staged list.
    pub fn stage_file(
        &self,
        name: impl Into<String>,
        mime_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Result<usize, PipelineError> {
        let name = name.into();
        let mime_type = mime_type.into();
        if !is_supported_image(&mime_type) {
            return Err(PipelineError::UnsupportedImage(mime_type));
        }

        let mut st = self.lock();
        if st.phase != Phase::Collecting {
            return Err(PipelineError::WrongPhase(st.phase));
        }
        if st.staged.len() >= self.options.max_staged_files {
            return Err(PipelineError::StagingLimit(self.options.max_staged_files));
        }
        st.staged.push(StagedFile::new(name, mime_type, bytes));
        Ok(st.staged.len() - 1)
    }

    pub fn remove_staged(&self, index: usize) -> Result<(), PipelineError> {
        let mut st = self.lock();
        if st.phase != Phase::Collecting {
            return Err(PipelineError::WrongPhase(st.phase));
        }
        if index >= st.staged.len() {
            return Err(PipelineError::BadStagedIndex(index));
        }
        st.staged.remove(index);
        Ok(())
    }

    // ── Analyzing ───────────────────────────────────────────────────────

    /// Submit the staged set: request slots, upload every file concurrently,
    /// then submit one analysis batch.
    ///
    /// The uploads are an all-or-nothing barrier: any single failure aborts
    /// the attempt before batch submission and returns the session to
    /// `Collecting` with the error surfaced. Files already uploaded during an
    /// aborted attempt are abandoned; the store garbage-collects unreferenced
    /// objects.
    pub async fn submit(&self) -> Result<(), PipelineError> {
        let (generation, files) = {
            let mut st = self.lock();
            if st.phase != Phase::Collecting {
                return Err(PipelineError::WrongPhase(st.phase));
            }
            if st.staged.is_empty() {
                return Err(PipelineError::NothingStaged);
            }
            st.phase = Phase::Analyzing;
            st.error = None;
            for file in &mut st.staged {
                file.status = UploadStatus::Uploading;
            }
            (st.generation, st.staged.clone())
        };

        match self.run_submission(&files).await {
            Ok(batch_id) => {
                let mut st = self.lock_live(generation)?;
                for file in &mut st.staged {
                    file.status = UploadStatus::Uploaded;
                }
                st.batch_id = Some(batch_id);
                st.phase = Phase::Reviewing;
                Ok(())
            }
            Err(err) => {
                let mut st = self.lock_live(generation)?;
                st.phase = Phase::Collecting;
                if let PipelineError::Upload { file: ref name, .. } = err {
                    for file in &mut st.staged {
                        file.status = if file.name == *name {
                            UploadStatus::Failed
                        } else {
                            UploadStatus::Staged
                        };
                    }
                    tracing::debug!(
                        "aborted batch leaves uploaded slots behind; server-side GC assumed"
                    );
                } else {
                    for file in &mut st.staged {
                        file.status = UploadStatus::Staged;
                    }
                }
                st.error = Some(err.to_string());
                Err(err)
            }
        }
    }

    async fn run_submission(&self, files: &[StagedFile]) -> Result<String, PipelineError> {
        let metas: Vec<FileMeta> = files
            .iter()
            .map(|f| FileMeta {
                name: f.name.clone(),
                mime_type: f.mime_type.clone(),
            })
            .collect();

        let slots = self
            .store
            .request_upload_slots(&self.options.purpose, &metas)
            .await
            .map_err(PipelineError::SlotRequest)?;
        if slots.len() != files.len() {
            return Err(PipelineError::SlotMismatch {
                requested: files.len(),
                assigned: slots.len(),
            });
        }

        // All uploads run concurrently; the batch is submitted only if every
        // one of them succeeds.
        let uploads = slots.iter().zip(files).map(|(slot, file)| async move {
            self.store
                .put_object(&slot.upload_url, &file.mime_type, &file.bytes)
                .await
                .map_err(|message| PipelineError::Upload {
                    file: file.name.clone(),
                    message,
                })
        });
        for result in join_all(uploads).await {
            result?;
        }

        let file_ids: Vec<u64> = slots.iter().map(|s| s.file_id).collect();
        let receipt = self
            .service
            .submit_batch(&file_ids)
            .await
            .map_err(PipelineError::Submit)?;
        tracing::debug!(
            batch_id = %receipt.batch_id,
            accepted = receipt.accepted_count,
            "analysis batch submitted"
        );
        Ok(receipt.batch_id)
    }

    // ── Reviewing ───────────────────────────────────────────────────────

    /// Issue one poll for the current batch and merge the response.
    ///
    /// Polls are strictly serialized: a call while a previous poll is
    /// unresolved is refused, and once the finished flag has been observed no
    /// further requests are made.
    pub async fn poll_once(&self) -> Result<PollOutcome, PipelineError> {
        let (generation, batch_id) = {
            let mut st = self.lock();
            if st.phase != Phase::Reviewing {
                return Err(PipelineError::WrongPhase(st.phase));
            }
            if st.poll_finished {
                return Ok(PollOutcome::AlreadyFinished);
            }
            if st.poll_in_flight {
                return Ok(PollOutcome::InFlight);
            }
            let batch_id = match st.batch_id.clone() {
                Some(id) => id,
                None => return Err(PipelineError::WrongPhase(st.phase)),
            };
            st.poll_in_flight = true;
            (st.generation, batch_id)
        };

        let result = self.service.poll_batch(&batch_id).await;

        let mut st = self.lock_live(generation)?;
        st.poll_in_flight = false;
        match result {
            Ok(poll) => {
                for update in poll.results {
                    merge_update(&mut st.tasks, update);
                }
                if poll.is_finished {
                    st.poll_finished = true;
                    // A batch with nothing left to commit (every task Failed,
                    // or every Completed task already saved) finishes here;
                    // no commit event will ever run the Done check for it.
                    if all_committable_saved(&st.tasks) {
                        st.phase = Phase::Done;
                    }
                }
                Ok(PollOutcome::Applied {
                    finished: st.poll_finished,
                })
            }
            Err(message) => {
                tracing::warn!(batch_id = %batch_id, error = %message, "batch poll failed");
                st.error = Some(message);
                Ok(PollOutcome::Failed)
            }
        }
    }

    /// Drive [`poll_once`](Self::poll_once) on the configured interval until
    /// the batch finishes or the session is cancelled.
    pub async fn run_poll_loop(&self) -> Result<(), PipelineError> {
        let mut interval = tokio::time::interval(self.options.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                // Cancellation wins over a tick that became ready at the
                // same time.
                biased;
                _ = self.cancel.cancelled() => return Err(PipelineError::Cancelled),
                _ = interval.tick() => {
                    match self.poll_once().await? {
                        PollOutcome::Applied { finished: true } | PollOutcome::AlreadyFinished => {
                            return Ok(());
                        }
                        PollOutcome::Applied { finished: false }
                        | PollOutcome::InFlight
                        | PollOutcome::Failed => {}
                    }
                }
            }
        }
    }

    /// Apply a user edit to one item's form. Rejected once the item is saved.
    pub fn update_item(
        &self,
        task_id: &str,
        edit: impl FnOnce(&mut ItemForm),
    ) -> Result<(), PipelineError> {
        let mut st = self.lock();
        if st.phase != Phase::Reviewing {
            return Err(PipelineError::WrongPhase(st.phase));
        }
        let task = st
            .tasks
            .iter_mut()
            .find(|t| t.task_id == task_id)
            .ok_or_else(|| PipelineError::UnknownTask(task_id.to_string()))?;
        if task.saved {
            return Err(PipelineError::AlreadySaved);
        }
        edit(&mut task.form);
        Ok(())
    }

    /// Commit one completed item. Idempotent: committing an already-saved
    /// item is a no-op outcome, not an error, and makes no request.
    pub async fn commit_item(&self, task_id: &str) -> Result<CommitOutcome, PipelineError> {
        let (generation, request) = {
            let st = self.lock();
            // Done is allowed so a duplicate commit after the last item still
            // reports AlreadySaved instead of a phase error.
            if st.phase != Phase::Reviewing && st.phase != Phase::Done {
                return Err(PipelineError::WrongPhase(st.phase));
            }
            let task = st
                .tasks
                .iter()
                .find(|t| t.task_id == task_id)
                .ok_or_else(|| PipelineError::UnknownTask(task_id.to_string()))?;
            if task.saved {
                return Ok(CommitOutcome::AlreadySaved);
            }
            if task.status != TaskStatus::Completed {
                return Err(PipelineError::TaskNotCompleted);
            }
            if task.form.category.is_none() {
                return Err(PipelineError::MissingCategory);
            }
            (
                st.generation,
                CommitRequest {
                    task_id: task.task_id.clone(),
                    file_id: task.file_id,
                    form: task.form.clone(),
                },
            )
        };

        let result = self.service.commit_item(&request).await;

        let mut st = self.lock_live(generation)?;
        match result {
            Ok(()) => {
                if let Some(task) = st.tasks.iter_mut().find(|t| t.task_id == task_id) {
                    task.saved = true;
                }
                if st.poll_finished && all_committable_saved(&st.tasks) {
                    st.phase = Phase::Done;
                }
                Ok(CommitOutcome::Saved)
            }
            Err(message) => {
                // The item stays editable and committable.
                st.error = Some(message.clone());
                Err(PipelineError::Commit(message))
            }
        }
    }

    // ── Cancellation & accessors ────────────────────────────────────────

    /// Cancel the session from any phase: stops the poll loop synchronously
    /// and discards all in-memory state. In-flight requests are not aborted;
    /// their responses are discarded when they resolve. Uploaded but
    /// uncommitted files are left to the store's garbage collection.
    pub fn cancel(&self) {
        self.cancel.cancel();
        let mut st = self.lock();
        st.generation += 1;
        st.phase = Phase::Cancelled;
        st.staged.clear();
        st.tasks.clear();
        st.batch_id = None;
        st.poll_in_flight = false;
        tracing::debug!("registration session cancelled");
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn staged(&self) -> Vec<StagedFile> {
        self.lock().staged.clone()
    }

    pub fn tasks(&self) -> Vec<ReviewTask> {
        self.lock().tasks.clone()
    }

    pub fn batch_id(&self) -> Option<String> {
        self.lock().batch_id.clone()
    }

    pub fn poll_finished(&self) -> bool {
        self.lock().poll_finished
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Merge one per-task update without losing user edits: status only moves
/// forward, and AI suggestions seed empty form fields only.
fn merge_update(tasks: &mut Vec<ReviewTask>, update: AnalysisUpdate) {
    match tasks.iter_mut().find(|t| t.task_id == update.task_id) {
        Some(task) => {
            task.status = task.status.advance(update.status);
            if task.image_url.is_none() {
                task.image_url = update.image_url;
            }
            if task.status == TaskStatus::Completed {
                task.form.seed_from(&update.suggestion);
            }
        }
        None => {
            let mut form = ItemForm::default();
            if update.status == TaskStatus::Completed {
                form.seed_from(&update.suggestion);
            }
            tasks.push(ReviewTask {
                task_id: update.task_id,
                file_id: update.file_id,
                image_url: update.image_url,
                status: update.status,
                form,
                saved: false,
            });
        }
    }
}

/// Done means every `Completed` task is saved; `Failed` tasks are terminal
/// but unsavable and don't block completion.
fn all_committable_saved(tasks: &[ReviewTask]) -> bool {
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Completed)
        .all(|t| t.saved)
}
