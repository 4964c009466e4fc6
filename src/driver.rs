//! The workload driver: what one simulated user does per task.
//!
//! Each public task method is a self-contained unit of work. Nothing escapes
//! a task: every transport error, unexpected status, or malformed body is
//! either recorded as a failed outcome (tracked calls) or logged (cleanup
//! deletes). Calls within a task run strictly one after another.

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, error, info, warn};

use crate::api::{ChatApi, TimedError, TimedResponse, CHAT_COMPLETIONS_REQUEST, FILE_UPLOAD_REQUEST};
use crate::errors::FailureReason;
use crate::example_files::{ExampleFile, ExampleFiles};
use crate::metrics::{TASKS_SKIPPED_TOTAL, TASKS_TOTAL};
use crate::outcome::{
    check_elapsed, classify_analysis, classify_chat, classify_completion, classify_upload,
    delete_succeeded, OutcomeRecord,
};
use crate::payload::{ChatMessage, ChatPayload, FileId, ModelName};
use crate::prompts::{analysis_prompts, conversation, SIMPLE_PROMPTS};
use crate::stats::StatsRecorder;
use crate::task::ChatTask;

/// Per-actor settings of the driver.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Models to pick from; must not be empty.
    pub models: Vec<ModelName>,
    pub example_files: ExampleFiles,
    /// Tracked calls slower than this are failures even when the status is fine.
    pub max_response_time: Duration,
}

/// Executes tasks for one actor.
pub struct WorkloadDriver {
    api: ChatApi,
    models: Vec<ModelName>,
    example_files: ExampleFiles,
    max_response_time: Duration,
    stats: Arc<StatsRecorder>,
    rng: StdRng,
}

impl WorkloadDriver {
    /// Creates a driver. The random source decides every prompt, model,
    /// temperature and file choice, so a seeded `StdRng` gives repeatable runs.
    pub fn new(
        api: ChatApi,
        config: DriverConfig,
        stats: Arc<StatsRecorder>,
        rng: StdRng,
    ) -> Result<Self, String> {
        if config.models.is_empty() {
            return Err("Model pool must contain at least one model".to_string());
        }

        Ok(Self {
            api,
            models: config.models,
            example_files: config.example_files,
            max_response_time: config.max_response_time,
            stats,
            rng,
        })
    }

    /// Random source shared with the actor loop (task choice, wait times).
    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    /// Runs one task to completion.
    pub async fn run_task(&mut self, task: ChatTask) {
        TASKS_TOTAL.with_label_values(&[task.name()]).inc();

        match task {
            ChatTask::SimpleCompletion => self.simple_completion().await,
            ChatTask::MultiTurnCompletion => self.multi_turn_completion().await,
            ChatTask::UploadAnalyzeDeleteUntracked => self.upload_analyze_delete_untracked().await,
            ChatTask::UploadAnalyzeDeleteTracked => self.upload_analyze_delete_tracked().await,
        }
    }

    /// One random prompt with a random temperature in [0.5, 1.0].
    pub async fn simple_completion(&mut self) {
        let prompt = SIMPLE_PROMPTS
            .choose(&mut self.rng)
            .copied()
            .unwrap_or(SIMPLE_PROMPTS[0]);
        let payload = ChatPayload {
            model: self.pick_model(),
            messages: vec![ChatMessage::user(prompt)],
            temperature: Some(self.rng.gen_range(0.5..=1.0)),
        };

        let outcome = match self.api.chat_completion(&payload).await {
            Ok(response) => {
                let result = classify_completion(
                    response.status,
                    &response.body,
                    response.elapsed,
                    self.max_response_time,
                );
                match &result {
                    Ok(body) => info!(
                        model = %payload.model,
                        elapsed_secs = response.elapsed.as_secs_f64(),
                        tokens = %body.total_tokens_label(),
                        "Completion success"
                    ),
                    Err(FailureReason::InvalidResponse(detail)) => {
                        error!(error = %detail, "Completion response could not be parsed")
                    }
                    Err(reason) => error!(
                        model = %payload.model,
                        status_code = response.status,
                        reason = %reason,
                        "Completion failed"
                    ),
                }
                tracked(CHAT_COMPLETIONS_REQUEST, &response, result.map(|_| ()))
            }
            Err(e) => {
                error!(model = %payload.model, error = %e.error, "Completion request failed");
                transport_failure(CHAT_COMPLETIONS_REQUEST, &e)
            }
        };

        self.stats.record(&outcome);
    }

    /// The fixed user → assistant → user conversation; the body is not inspected.
    pub async fn multi_turn_completion(&mut self) {
        let payload = ChatPayload {
            model: self.pick_model(),
            messages: conversation(),
            temperature: None,
        };

        let outcome = match self.api.chat_completion(&payload).await {
            Ok(response) => {
                let result = classify_chat(response.status, response.elapsed, self.max_response_time);
                match &result {
                    Ok(()) => info!(
                        model = %payload.model,
                        elapsed_secs = response.elapsed.as_secs_f64(),
                        "Multi-turn success"
                    ),
                    Err(reason) => error!(
                        model = %payload.model,
                        status_code = response.status,
                        reason = %reason,
                        "Multi-turn failed"
                    ),
                }
                tracked(CHAT_COMPLETIONS_REQUEST, &response, result)
            }
            Err(e) => {
                error!(model = %payload.model, error = %e.error, "Multi-turn request failed");
                transport_failure(CHAT_COMPLETIONS_REQUEST, &e)
            }
        };

        self.stats.record(&outcome);
    }

    /// Upload a random example file, analyze it, then delete it.
    ///
    /// The upload is recorded as soon as it is classified. The delete is a
    /// cleanup call: it is attempted once and only logged.
    pub async fn upload_analyze_delete_untracked(&mut self) {
        let task = ChatTask::UploadAnalyzeDeleteUntracked;
        let Some(file) = self.pick_example_file(task).await else {
            return;
        };
        let filename = file.filename.clone();

        let upload = self.api.upload_file(&file.filename, file.bytes).await;
        let (outcome, file_id) = self.classify_upload_response(&filename, upload);
        self.stats.record(&outcome);

        let Some(file_id) = file_id else {
            return;
        };
        self.analyze_file(&file_id, &filename).await;
        self.delete_file_untracked(&file_id, &filename).await;
    }

    /// Upload, analyze and delete with the delete inside the upload's scope.
    ///
    /// The upload outcome is recorded when the scope ends. A delete that
    /// fails at the transport level turns the upload into a failure; a delete
    /// answered with an unexpected status is only logged.
    pub async fn upload_analyze_delete_tracked(&mut self) {
        let task = ChatTask::UploadAnalyzeDeleteTracked;
        let Some(file) = self.pick_example_file(task).await else {
            return;
        };
        let filename = file.filename.clone();

        let upload = self.api.upload_file(&file.filename, file.bytes).await;
        let (mut outcome, file_id) = self.classify_upload_response(&filename, upload);

        if let Some(file_id) = file_id {
            self.analyze_file(&file_id, &filename).await;

            if let Err(reason) = self.delete_file_in_scope(&file_id, &filename).await {
                outcome.result = Err(reason);
            }
        }

        self.stats.record(&outcome);
    }

    /// Asks a model about an uploaded file. Always tracked.
    async fn analyze_file(&mut self, file_id: &FileId, filename: &str) {
        let prompt = analysis_prompts(filename)
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_default();
        let payload = ChatPayload {
            model: self.pick_model(),
            messages: vec![ChatMessage::user(prompt).with_files(vec![file_id.clone()])],
            temperature: None,
        };

        let outcome = match self.api.chat_completion(&payload).await {
            Ok(response) => {
                let result = classify_analysis(
                    response.status,
                    &response.body,
                    response.elapsed,
                    self.max_response_time,
                );
                match &result {
                    Ok(reply) => info!(
                        filename = %filename,
                        file_id = %file_id,
                        elapsed_secs = response.elapsed.as_secs_f64(),
                        reply = %reply,
                        "Analysis success"
                    ),
                    Err(reason) => error!(
                        filename = %filename,
                        file_id = %file_id,
                        status_code = response.status,
                        reason = %reason,
                        "Analysis failed"
                    ),
                }
                tracked(CHAT_COMPLETIONS_REQUEST, &response, result.map(|_| ()))
            }
            Err(e) => {
                error!(filename = %filename, file_id = %file_id, error = %e.error, "Analysis request failed");
                transport_failure(CHAT_COMPLETIONS_REQUEST, &e)
            }
        };

        self.stats.record(&outcome);
    }

    /// Cleanup delete whose outcome is only logged.
    async fn delete_file_untracked(&self, file_id: &FileId, filename: &str) {
        match self.api.delete_file(file_id).await {
            Ok(response) if delete_succeeded(response.status) => {
                info!(filename = %filename, file_id = %file_id, "Deleted (untracked)")
            }
            Ok(response) => warn!(
                filename = %filename,
                file_id = %file_id,
                status_code = response.status,
                "Delete failed"
            ),
            Err(e) => error!(
                filename = %filename,
                file_id = %file_id,
                error = %e.error,
                "Delete error"
            ),
        }
    }

    /// Delete performed inside the upload's scope.
    ///
    /// Returns the failure to charge to the upload when the call itself broke.
    async fn delete_file_in_scope(&self, file_id: &FileId, filename: &str) -> Result<(), FailureReason> {
        match self.api.delete_file(file_id).await {
            Ok(response) if delete_succeeded(response.status) => {
                info!(filename = %filename, file_id = %file_id, "Deleted");
                Ok(())
            }
            Ok(response) => {
                warn!(
                    filename = %filename,
                    file_id = %file_id,
                    status_code = response.status,
                    "Delete failed"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    filename = %filename,
                    file_id = %file_id,
                    error = %e.error,
                    "Delete error, marking upload as failed"
                );
                Err(FailureReason::InvalidResponse(e.error.to_string()))
            }
        }
    }

    /// Classifies an upload response into its outcome and, when the server
    /// created a file, its id. A slow upload is a failure but still returns
    /// the id so the file gets analyzed and deleted.
    fn classify_upload_response(
        &self,
        filename: &str,
        upload: Result<TimedResponse, TimedError>,
    ) -> (OutcomeRecord, Option<FileId>) {
        let response = match upload {
            Ok(response) => response,
            Err(e) => {
                error!(filename = %filename, error = %e.error, "Upload request failed");
                return (transport_failure(FILE_UPLOAD_REQUEST, &e), None);
            }
        };

        match classify_upload(response.status, &response.body) {
            Ok(file_id) => {
                let result = check_elapsed(response.elapsed, self.max_response_time);
                match &result {
                    Ok(()) => info!(
                        filename = %filename,
                        file_id = %file_id,
                        elapsed_secs = response.elapsed.as_secs_f64(),
                        "Uploaded"
                    ),
                    Err(reason) => error!(
                        filename = %filename,
                        file_id = %file_id,
                        reason = %reason,
                        "Upload too slow"
                    ),
                }
                (tracked(FILE_UPLOAD_REQUEST, &response, result), Some(file_id))
            }
            Err(FailureReason::MissingFileId) => {
                error!(filename = %filename, "No file_id in upload response");
                (
                    tracked(FILE_UPLOAD_REQUEST, &response, Err(FailureReason::MissingFileId)),
                    None,
                )
            }
            Err(reason) => {
                error!(
                    filename = %filename,
                    status_code = response.status,
                    "Upload failed"
                );
                (tracked(FILE_UPLOAD_REQUEST, &response, Err(reason)), None)
            }
        }
    }

    /// Picks an example file, or logs why the task is skipped.
    async fn pick_example_file(&mut self, task: ChatTask) -> Option<ExampleFile> {
        match self.example_files.pick(&mut self.rng).await {
            Ok(Some(file)) => {
                debug!(
                    task = %task,
                    path = %file.path.display(),
                    bytes = file.bytes.len(),
                    "Picked example file"
                );
                Some(file)
            }
            Ok(None) => {
                warn!(
                    task = %task,
                    dir = %self.example_files.dir().display(),
                    "No example files found"
                );
                TASKS_SKIPPED_TOTAL.with_label_values(&[task.name()]).inc();
                None
            }
            Err(e) => {
                error!(
                    task = %task,
                    dir = %self.example_files.dir().display(),
                    error = %e,
                    "Failed to read example file"
                );
                TASKS_SKIPPED_TOTAL.with_label_values(&[task.name()]).inc();
                None
            }
        }
    }

    fn pick_model(&mut self) -> ModelName {
        // The pool is non-empty, checked in `new`.
        self.models
            .choose(&mut self.rng)
            .cloned()
            .unwrap_or_else(|| self.models[0].clone())
    }
}

fn tracked(
    request: &'static str,
    response: &TimedResponse,
    result: Result<(), FailureReason>,
) -> OutcomeRecord {
    OutcomeRecord {
        request,
        elapsed: response.elapsed,
        status_code: Some(response.status),
        result,
    }
}

fn transport_failure(request: &'static str, e: &TimedError) -> OutcomeRecord {
    OutcomeRecord {
        request,
        elapsed: e.elapsed,
        status_code: None,
        result: Err(FailureReason::from_reqwest(&e.error, e.elapsed)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn config(models: Vec<ModelName>) -> DriverConfig {
        DriverConfig {
            models,
            example_files: ExampleFiles::new("example-files"),
            max_response_time: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_empty_model_pool_is_rejected() {
        let api = ChatApi::new(reqwest::Client::new(), "http://localhost:1");
        let result = WorkloadDriver::new(
            api,
            config(vec![]),
            Arc::new(StatsRecorder::new()),
            StdRng::seed_from_u64(1),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_pick_model_stays_in_pool() {
        let api = ChatApi::new(reqwest::Client::new(), "http://localhost:1");
        let models = vec![ModelName::new("a"), ModelName::new("b")];
        let mut driver = WorkloadDriver::new(
            api,
            config(models.clone()),
            Arc::new(StatsRecorder::new()),
            StdRng::seed_from_u64(3),
        )
        .unwrap();

        for _ in 0..50 {
            assert!(models.contains(&driver.pick_model()));
        }
    }
}
