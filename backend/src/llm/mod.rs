//! Chat-completion backed features: recognising tasks in emails and the
//! streaming assistant.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use serde::Deserialize;
use thiserror::Error;

use shared::api::{parse_due_at, ChatMessage, SummarizeEmail};

mod deepseek;
pub mod sse;

pub use deepseek::DeepSeekClient;

/// Text deltas of a streamed reply
pub type TextStream = BoxStream<'static, anyhow::Result<String>>;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM request failed: {0}")]
    Request(String),

    #[error("Unparseable LLM reply: {0}")]
    Parse(String),
}

impl LlmError {
    pub fn public_message(&self) -> &'static str {
        match self {
            LlmError::Request(_) => "AI service request failed",
            LlmError::Parse(_) => "AI response parsing error",
        }
    }
}

/// What the task recognizer decided about an email
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct TaskExtraction {
    #[serde(default)]
    pub is_task: bool,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub due_at: Option<String>,
}

impl TaskExtraction {
    /// The task text, if this is a task with something to do
    pub fn task_content(&self) -> Option<&str> {
        if !self.is_task {
            return None;
        }
        self.content
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    }

    pub fn due_at(&self) -> Option<DateTime<Utc>> {
        self.due_at.as_deref().and_then(parse_due_at)
    }
}

/// Remove a surrounding markdown code fence (```json ... ```) if present.
pub fn strip_code_fence(reply: &str) -> &str {
    let mut text = reply.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

pub fn parse_task_reply(reply: &str) -> Result<TaskExtraction, LlmError> {
    serde_json::from_str(strip_code_fence(reply)).map_err(|e| {
        tracing::error!("Raw task recognizer reply: {}", reply);
        LlmError::Parse(e.to_string())
    })
}

#[async_trait]
pub trait TaskExtractor: Send + Sync {
    async fn extract(&self, email: &SummarizeEmail) -> Result<TaskExtraction, LlmError>;
}

#[async_trait]
pub trait ChatStreamer: Send + Sync {
    /// Start a reply to the conversation; errors after the first byte arrive
    /// through the stream.
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream, LlmError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n{\"a\":1}```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[test]
    fn test_parse_task_reply() {
        let reply = "```json\n{\"is_task\": true, \"content\": \"Send the Q3 deck\", \"due_at\": \"2025-07-01\"}\n```";
        let task = parse_task_reply(reply).unwrap();

        assert_eq!(task.task_content(), Some("Send the Q3 deck"));
        assert_eq!(
            task.due_at().unwrap().to_rfc3339(),
            "2025-07-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_not_a_task() {
        let task = parse_task_reply(r#"{"is_task": false, "content": "", "due_at": ""}"#).unwrap();
        assert_eq!(task.task_content(), None);
        assert_eq!(task.due_at(), None);

        // A task without content is not persisted
        let empty = parse_task_reply(r#"{"is_task": true, "content": "  "}"#).unwrap();
        assert_eq!(empty.task_content(), None);
    }

    #[test]
    fn test_unparseable_reply() {
        let err = parse_task_reply("Sure! Here is the JSON you asked for").unwrap_err();
        assert_eq!(err.public_message(), "AI response parsing error");
    }
}
