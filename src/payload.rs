//! Request and response shapes of the chat/file API.
//!
//! Payloads are built fresh for every request and never mutated after send.
//! Response parsing is deliberately narrow: only the fields a task looks at
//! are modelled, everything else in the body is ignored.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Identifier of a backend model a request targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ModelName(String);

impl ModelName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned identifier of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message of a chat conversation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    /// Uploaded files the message refers to. Omitted from the JSON when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<FileId>>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            files: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            files: None,
        }
    }

    /// Attaches files to the message.
    pub fn with_files(mut self, files: Vec<FileId>) -> Self {
        self.files = Some(files);
        self
    }
}

/// Body of `POST /api/chat/completions`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatPayload {
    pub model: ModelName,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

/// A parsed completion response body.
///
/// The body must be a JSON object and `usage`, when present and not null,
/// must be an object too. `total_tokens` is only reported, never validated.
#[derive(Debug, Clone)]
pub struct CompletionBody {
    body: Value,
}

impl CompletionBody {
    pub fn parse(body: &[u8]) -> Result<Self, String> {
        let body: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;
        if !body.is_object() {
            return Err("response body is not a JSON object".to_string());
        }
        match body.get("usage") {
            None | Some(Value::Null) | Some(Value::Object(_)) => Ok(Self { body }),
            Some(_) => Err("usage is not a JSON object".to_string()),
        }
    }

    /// Total tokens as reported, or `"unknown"` when absent or null.
    pub fn total_tokens_label(&self) -> String {
        match self.body.pointer("/usage/total_tokens") {
            None | Some(Value::Null) => "unknown".to_string(),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        }
    }
}

/// Extracts the assistant reply, `choices[0].message.content`.
pub fn extract_reply_text(body: &[u8]) -> Result<String, String> {
    let value: Value = serde_json::from_slice(body).map_err(|e| e.to_string())?;
    value
        .pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| "missing choices[0].message.content".to_string())
}

/// Extracts the FileId from an upload response body.
///
/// `id` takes precedence; `file_id` is only consulted when `id` is absent,
/// null or empty. String values are taken verbatim, integer values are
/// rendered in decimal. Returns None when neither field yields an id or the
/// body is not JSON.
pub fn extract_file_id(body: &[u8]) -> Option<FileId> {
    let value: Value = serde_json::from_slice(body).ok()?;
    id_field(&value, "id").or_else(|| id_field(&value, "file_id"))
}

fn id_field(value: &Value, field: &str) -> Option<FileId> {
    match value.get(field)? {
        Value::String(s) if !s.is_empty() => Some(FileId::new(s.clone())),
        Value::Number(n) if n.is_u64() || n.is_i64() => Some(FileId::new(n.to_string())),
        _ => None,
    }
}
