//! Streamed chat completion consumption
//!
//! Server-sent chunks carry text deltas and tool-call fragments keyed by
//! position. [`ReplyAccumulator`] folds them into one [`AssistantReply`].

use serde::Deserialize;

use super::message::ToolCall;
use crate::{Error, Result};

/// Highest number of tool calls accepted in one streamed reply
const MAX_TOOL_CALLS: usize = 64;

/// One `chat.completion.chunk` event
#[derive(Debug, Deserialize)]
pub struct CompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallDelta>,
}

/// Fragment of a tool call; `id` and `name` arrive once, arguments in pieces
#[derive(Debug, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Complete assistant message of one completion request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssistantReply {
    pub content: String,
    pub tool_calls: Vec<ToolCall>,
}

impl AssistantReply {
    /// Plain text reply
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    /// Reply requesting tools
    #[must_use]
    pub const fn with_tool_calls(tool_calls: Vec<ToolCall>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }

    /// Whether the model wants tools resolved before it answers
    #[must_use]
    pub fn wants_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// In-progress tool call being assembled from streaming events
#[derive(Debug, Default, Clone)]
struct PendingToolCall {
    id: String,
    name: String,
    arguments: String,
}

/// Folds streamed chunks into an [`AssistantReply`]
#[derive(Debug, Default)]
pub struct ReplyAccumulator {
    content: String,
    pending: Vec<PendingToolCall>,
    finish_reason: Option<String>,
}

impl ReplyAccumulator {
    /// Empty accumulator
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one SSE data payload; text deltas are forwarded to `sink`
    ///
    /// # Errors
    ///
    /// Returns `Error::Completion` if the payload is not a chunk or carries an API error
    pub fn apply(&mut self, data: &str, sink: &mut (dyn FnMut(&str) + Send)) -> Result<()> {
        let chunk: CompletionChunk = serde_json::from_str(data)
            .map_err(|e| Error::Completion(format!("malformed stream chunk: {e}")))?;

        if let Some(error) = chunk.error {
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .map_or_else(|| error.to_string(), ToString::to_string);
            return Err(Error::Completion(message));
        }

        // Only the first choice is requested
        let Some(choice) = chunk.choices.into_iter().next() else {
            return Ok(());
        };

        if let Some(text) = choice.delta.content.filter(|t| !t.is_empty()) {
            sink(&text);
            self.content.push_str(&text);
        }

        for delta in choice.delta.tool_calls {
            let idx = delta.index;
            if idx >= MAX_TOOL_CALLS {
                return Err(Error::Completion("tool call index out of range".to_string()));
            }
            if idx >= self.pending.len() {
                self.pending.resize_with(idx + 1, PendingToolCall::default);
            }
            let pending = &mut self.pending[idx];
            if let Some(id) = delta.id {
                pending.id = id;
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    pending.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    pending.arguments.push_str(&arguments);
                }
            }
        }

        if choice.finish_reason.is_some() {
            self.finish_reason = choice.finish_reason;
        }
        Ok(())
    }

    /// Why the model stopped, once known
    #[must_use]
    pub fn finish_reason(&self) -> Option<&str> {
        self.finish_reason.as_deref()
    }

    /// Finished reply; fragments that never got a name are dropped
    #[must_use]
    pub fn finish(self) -> AssistantReply {
        let tool_calls = self
            .pending
            .into_iter()
            .filter(|tc| !tc.name.is_empty())
            .map(|tc| ToolCall::new(tc.id, tc.name, tc.arguments))
            .collect();

        AssistantReply {
            content: self.content,
            tool_calls,
        }
    }
}
