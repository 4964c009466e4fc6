//! Outcome of a tracked call and the rules that classify it.
//!
//! Classification is kept free of I/O so every rule can be exercised with
//! plain status codes and durations.

use std::time::Duration;

use crate::errors::FailureReason;
use crate::payload::{extract_file_id, extract_reply_text, CompletionBody, FileId};

/// One measured sample, handed to the stats recorder exactly once.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    /// Request name in the report, e.g. `POST /api/chat/completions`.
    pub request: &'static str,
    pub elapsed: Duration,
    /// None when the transport failed before a response arrived.
    pub status_code: Option<u16>,
    pub result: Result<(), FailureReason>,
}

impl OutcomeRecord {
    pub fn success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn failure_reason(&self) -> Option<&FailureReason> {
        self.result.as_ref().err()
    }
}

/// Fails a call that took longer than `limit`. Equal to the limit still passes.
pub fn check_elapsed(elapsed: Duration, limit: Duration) -> Result<(), FailureReason> {
    if elapsed > limit {
        Err(FailureReason::Timeout { elapsed })
    } else {
        Ok(())
    }
}

/// Classifies a chat completion whose body is not inspected (multi-turn).
pub fn classify_chat(status: u16, elapsed: Duration, limit: Duration) -> Result<(), FailureReason> {
    if status != 200 {
        return Err(FailureReason::Status(status));
    }
    check_elapsed(elapsed, limit)
}

/// Classifies a simple completion: status, then body, then elapsed time.
///
/// On success returns the parsed body so the caller can log token usage.
pub fn classify_completion(
    status: u16,
    body: &[u8],
    elapsed: Duration,
    limit: Duration,
) -> Result<CompletionBody, FailureReason> {
    if status != 200 {
        return Err(FailureReason::Status(status));
    }
    let parsed = CompletionBody::parse(body)
        .map_err(FailureReason::InvalidResponse)?;
    check_elapsed(elapsed, limit)?;
    Ok(parsed)
}

/// Classifies an analyze call and returns the model's reply text.
pub fn classify_analysis(
    status: u16,
    body: &[u8],
    elapsed: Duration,
    limit: Duration,
) -> Result<String, FailureReason> {
    if status != 200 {
        return Err(FailureReason::Status(status));
    }
    let reply = extract_reply_text(body).map_err(FailureReason::InvalidResponse)?;
    check_elapsed(elapsed, limit)?;
    Ok(reply)
}

/// Extracts the FileId an upload produced.
///
/// The elapsed bound is not applied here: a slow upload still created a file
/// that has to be cleaned up, so the caller checks the time separately.
pub fn classify_upload(status: u16, body: &[u8]) -> Result<FileId, FailureReason> {
    if !matches!(status, 200 | 201) {
        return Err(FailureReason::Status(status));
    }
    extract_file_id(body).ok_or(FailureReason::MissingFileId)
}

/// Whether a delete status counts as done.
pub fn delete_succeeded(status: u16) -> bool {
    matches!(status, 200 | 204)
}
