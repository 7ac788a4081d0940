//! Chat completion client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::message::{Message, ToolCall, ToolDefinition};
use super::stream::{AssistantReply, ReplyAccumulator};
use crate::endpoint::{self, Endpoint};
use crate::{Error, Result};

/// Longest pause tolerated between two stream events
const IDLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Remote language model
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Request the next assistant message for `messages`
    ///
    /// Text is forwarded to `sink` as it arrives.
    ///
    /// # Errors
    ///
    /// Returns `Error::Completion` on any transport or API failure and
    /// `Error::Cancelled` if `cancel` fires
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        sink: &mut (dyn for<'s> FnMut(&'s str) + Send),
        cancel: &CancellationToken,
    ) -> Result<AssistantReply>;
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    tools: &'a [ToolDefinition],
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
}

#[derive(Deserialize)]
struct ResponseChoice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ToolCall>,
}

/// Talks to `POST {base}/chat/completions`
pub struct ChatClient {
    endpoint: Arc<Endpoint>,
    model: String,
    stream: bool,
}

impl ChatClient {
    /// Create a streaming client for `model`
    #[must_use]
    pub const fn new(endpoint: Arc<Endpoint>, model: String) -> Self {
        Self {
            endpoint,
            model,
            stream: true,
        }
    }

    /// Toggle server-sent streaming
    #[must_use]
    pub const fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Model identifier
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn send(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<reqwest::Response> {
        let request = ChatRequest {
            model: &self.model,
            messages,
            tools,
            stream: self.stream,
        };

        tracing::debug!(
            model = %self.model,
            messages = messages.len(),
            tools = tools.len(),
            stream = self.stream,
            "requesting completion"
        );

        let response = self
            .endpoint
            .post("chat/completions")?
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::Completion(format!("request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Error::Completion(endpoint::error_message(response).await));
        }
        Ok(response)
    }

    async fn request(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        sink: &mut (dyn FnMut(&str) + Send),
    ) -> Result<AssistantReply> {
        let response = self.send(messages, tools).await?;

        if !self.stream {
            let body: ChatResponse = response
                .json()
                .await
                .map_err(|e| Error::Completion(format!("failed to parse response: {e}")))?;
            let message = body
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| Error::Completion("response has no choices".to_string()))?
                .message;
            let content = message.content.unwrap_or_default();
            if !content.is_empty() {
                sink(&content);
            }
            return Ok(AssistantReply {
                content,
                tool_calls: message.tool_calls,
            });
        }

        let mut events = response.bytes_stream().eventsource();
        let mut accumulator = ReplyAccumulator::new();

        loop {
            let event = match tokio::time::timeout(IDLE_TIMEOUT, events.next()).await {
                Ok(Some(Ok(event))) => event,
                // Some servers close without a [DONE] marker
                Ok(None) => break,
                Ok(Some(Err(e))) => return Err(Error::Completion(format!("stream error: {e}"))),
                Err(_) => {
                    return Err(Error::Completion(format!(
                        "stream idle for {}s",
                        IDLE_TIMEOUT.as_secs()
                    )));
                }
            };

            tracing::trace!(data = %event.data, "completion chunk");
            if event.data.trim() == "[DONE]" {
                break;
            }
            accumulator.apply(&event.data, sink)?;
        }

        tracing::debug!(finish_reason = ?accumulator.finish_reason(), "completion stream ended");
        Ok(accumulator.finish())
    }
}

#[async_trait]
impl ChatModel for ChatClient {
    async fn complete(
        &self,
        messages: &[Message],
        tools: &[ToolDefinition],
        sink: &mut (dyn for<'s> FnMut(&'s str) + Send),
        cancel: &CancellationToken,
    ) -> Result<AssistantReply> {
        tokio::select! {
            result = self.request(messages, tools, sink) => result,
            () = cancel.cancelled() => Err(Error::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_omits_empty_tools() {
        let messages = [Message::user("hi")];
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            tools: &[],
            stream: true,
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "gpt-4o-mini",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": true
            })
        );
    }

    #[test]
    fn request_carries_tool_definitions() {
        let tools = [ToolDefinition::function(
            "current_time",
            "Current time",
            json!({"type": "object"}),
        )];
        let request = ChatRequest {
            model: "m",
            messages: &[],
            tools: &tools,
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["tools"][0]["function"]["name"], "current_time");
    }

    #[test]
    fn parses_non_streaming_tool_call_response() {
        let body: ChatResponse = serde_json::from_value(json!({
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [{
                        "id": "call_1",
                        "type": "function",
                        "function": {"name": "turn_lights", "arguments": "{\"on\":true}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }))
        .unwrap();
        let message = &body.choices[0].message;
        assert!(message.content.is_none());
        assert_eq!(message.tool_calls[0].name(), "turn_lights");
    }
}
