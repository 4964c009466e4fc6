//! Calls against the target chat/file API.
//!
//! Every call returns a [`TimedResponse`]: the status, the full body, and the
//! time until the response headers arrived. The body read is not part of the
//! measured time. Authentication comes from the client's default headers.

use std::time::{Duration, Instant};

use reqwest::multipart::{Form, Part};
use tracing::debug;

use crate::metrics::{GaugeGuard, REQUESTS_IN_FLIGHT};
use crate::payload::{ChatPayload, FileId};

pub const CHAT_COMPLETIONS_PATH: &str = "/api/chat/completions";
pub const FILES_PATH: &str = "/api/v1/files/";

/// Report names of the tracked requests.
pub const CHAT_COMPLETIONS_REQUEST: &str = "POST /api/chat/completions";
pub const FILE_UPLOAD_REQUEST: &str = "POST /api/v1/files/";

/// A response that has been fully read.
#[derive(Debug, Clone)]
pub struct TimedResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub elapsed: Duration,
}

/// A transport failure together with how long the call ran before failing.
#[derive(Debug)]
pub struct TimedError {
    pub error: reqwest::Error,
    pub elapsed: Duration,
}

/// Thin client for the three endpoints the workload uses.
#[derive(Debug, Clone)]
pub struct ChatApi {
    client: reqwest::Client,
    base_url: String,
}

impl ChatApi {
    /// `base_url` is the scheme and host, e.g. `https://chat.example.com`.
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    /// `POST /api/chat/completions` with a JSON body.
    pub async fn chat_completion(&self, payload: &ChatPayload) -> Result<TimedResponse, TimedError> {
        let url = format!("{}{}", self.base_url, CHAT_COMPLETIONS_PATH);
        send_timed(self.client.post(url).json(payload)).await
    }

    /// `POST /api/v1/files/` with one multipart `file` part.
    pub async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<TimedResponse, TimedError> {
        let url = format!("{}{}", self.base_url, FILES_PATH);
        let started = Instant::now();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")
            .map_err(|error| TimedError {
                error,
                elapsed: started.elapsed(),
            })?;
        let form = Form::new().part("file", part);

        send_timed(self.client.post(url).multipart(form)).await
    }

    /// `DELETE /api/v1/files/{file_id}`.
    pub async fn delete_file(&self, file_id: &FileId) -> Result<TimedResponse, TimedError> {
        let url = format!("{}{}{}", self.base_url, FILES_PATH, file_id);
        send_timed(self.client.delete(url)).await
    }
}

async fn send_timed(request: reqwest::RequestBuilder) -> Result<TimedResponse, TimedError> {
    let _in_flight = GaugeGuard::inc(&REQUESTS_IN_FLIGHT);
    let started = Instant::now();
    read_response(request, started).await
}

async fn read_response(
    request: reqwest::RequestBuilder,
    started: Instant,
) -> Result<TimedResponse, TimedError> {
    let response = request.send().await.map_err(|error| TimedError {
        error,
        elapsed: started.elapsed(),
    })?;
    let elapsed = started.elapsed();
    let status = response.status().as_u16();

    let body = response.bytes().await.map_err(|error| TimedError {
        error,
        elapsed: started.elapsed(),
    })?;

    debug!(
        status_code = status,
        elapsed_ms = elapsed.as_millis() as u64,
        body_len = body.len(),
        "Response received"
    );

    Ok(TimedResponse {
        status,
        body: body.to_vec(),
        elapsed,
    })
}
