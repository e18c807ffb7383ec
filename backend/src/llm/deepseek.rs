use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};

use shared::api::{ChatMessage, ChatRole, SummarizeEmail};

use super::sse::{delta_content, SseDecoder, SseEvent};
use super::{parse_task_reply, ChatStreamer, LlmError, TaskExtraction, TaskExtractor, TextStream};
use crate::config::AppConfig;

const TASK_RECOGNIZER_PROMPT: &str = r#"You are an intelligent email task recognizer. Please analyze the email content and return results in JSON format.

Return format:
{
  "is_task": boolean,
  "content": "Task description (if it's a task) within 140 characters",
  "due_at": "Due date in ISO format (if available)"
}

If the email is not a task (e.g., notification, advertisement, spam), set is_task to false and leave other fields empty."#;

const ASSISTANT_PROMPT: &str = r#"You are a helpful AI assistant for a mail management application called MailGPT.

Your role is to help users with:
- Email management and organization
- Task extraction and prioritization from emails
- Email composition and response suggestions
- General productivity and workflow optimization

Be concise, helpful, and focus on email and task-related assistance."#;

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Deserialize)]
struct CompletionMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct DeepSeekClient {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: Option<String>,
}

impl DeepSeekClient {
    pub fn new(base_url: &str, model: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            model: model.into(),
            api_key,
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        if config.llm_api_key.is_none() {
            tracing::warn!("LLM_API_KEY not set, AI requests will be sent unauthenticated");
        }
        Self::new(
            &config.llm_base_url,
            config.llm_model.clone(),
            config.llm_api_key.clone(),
        )
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response, LlmError> {
        let mut request = self.client.post(&self.endpoint).json(&CompletionRequest {
            model: &self.model,
            messages,
            stream,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| LlmError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Request(format!("{}: {}", status, body)));
        }
        Ok(response)
    }
}

fn system(content: &str) -> ChatMessage {
    ChatMessage {
        role: ChatRole::System,
        content: content.to_string(),
    }
}

#[async_trait]
impl TaskExtractor for DeepSeekClient {
    async fn extract(&self, email: &SummarizeEmail) -> Result<TaskExtraction, LlmError> {
        let email_json =
            serde_json::to_string_pretty(email).map_err(|e| LlmError::Request(e.to_string()))?;
        let messages = [
            system(TASK_RECOGNIZER_PROMPT),
            ChatMessage {
                role: ChatRole::User,
                content: format!("Analyze the following email content:\n\n{}", email_json),
            },
        ];

        let response: CompletionResponse = self
            .send(&messages, false)
            .await?
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let reply = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("reply has no choices".to_string()))?;

        let extraction = parse_task_reply(&reply)?;
        tracing::debug!(is_task = extraction.is_task, "Task recognizer result");
        Ok(extraction)
    }
}

#[async_trait]
impl ChatStreamer for DeepSeekClient {
    async fn stream(&self, messages: Vec<ChatMessage>) -> Result<TextStream, LlmError> {
        let mut conversation = Vec::with_capacity(messages.len() + 1);
        conversation.push(system(ASSISTANT_PROMPT));
        conversation.extend(messages.into_iter().filter(|m| m.role != ChatRole::System));

        let bytes = self.send(&conversation, true).await?.bytes_stream();
        Ok(Box::pin(decode_deltas(bytes)))
    }
}

/// Turn a streamed completion body into its text deltas, stopping at `[DONE]`
fn decode_deltas<S, B, E>(bytes: S) -> impl Stream<Item = anyhow::Result<String>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::try_stream! {
        futures::pin_mut!(bytes);
        let mut decoder = SseDecoder::new();
        'read: while let Some(chunk) = bytes.next().await {
            let chunk = chunk?;
            for event in decoder.push(chunk.as_ref()) {
                match event {
                    SseEvent::Done => break 'read,
                    SseEvent::Data(payload) => {
                        if let Some(text) = delta_content(&payload)? {
                            yield text;
                        }
                    }
                }
            }
        }
    }
}
