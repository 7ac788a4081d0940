//! Append-only conversation transcript

use std::collections::HashSet;

use super::message::{Message, ToolCall};

/// Ordered message history owned by the turn loop
///
/// Messages are only ever appended; nothing is reordered or pruned for the
/// lifetime of the process.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    /// Empty conversation
    #[must_use]
    pub const fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    /// Conversation seeded with a system prompt (skipped when blank)
    #[must_use]
    pub fn with_system_prompt(prompt: &str) -> Self {
        let mut conversation = Self::new();
        if !prompt.trim().is_empty() {
            conversation.messages.push(Message::system(prompt));
        }
        conversation
    }

    /// Append a user message
    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    /// Append an assistant reply
    pub fn push_assistant(&mut self, text: impl Into<String>, tool_calls: Vec<ToolCall>) {
        self.messages.push(Message::assistant(text, tool_calls));
    }

    /// Append the result for one tool call
    pub fn push_tool_result(
        &mut self,
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
    ) {
        self.messages.push(Message::tool(tool_call_id, content));
    }

    /// All messages in insertion order
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Number of messages
    #[must_use]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether nothing has been said yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Last message, if any
    #[must_use]
    pub fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Ids of tool calls from the latest assistant message that have no
    /// result yet, in the order they were issued
    #[must_use]
    pub fn unanswered_tool_calls(&self) -> Vec<&str> {
        let Some(start) = self
            .messages
            .iter()
            .rposition(|m| matches!(m, Message::Assistant { .. }))
        else {
            return Vec::new();
        };

        let answered: HashSet<&str> = self.messages[start + 1..]
            .iter()
            .filter_map(|m| match m {
                Message::Tool { tool_call_id, .. } => Some(tool_call_id.as_str()),
                _ => None,
            })
            .collect();

        self.messages[start]
            .tool_calls()
            .iter()
            .map(|call| call.id.as_str())
            .filter(|id| !answered.contains(id))
            .collect()
    }

    /// Whether another completion request may be issued
    #[must_use]
    pub fn ready_for_completion(&self) -> bool {
        self.unanswered_tool_calls().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_system_prompt_is_skipped() {
        assert!(Conversation::with_system_prompt("  ").is_empty());
        assert_eq!(Conversation::with_system_prompt("be nice").len(), 1);
    }

    #[test]
    fn appends_in_order() {
        let mut conversation = Conversation::new();
        conversation.push_user("hello");
        conversation.push_assistant("hi there", Vec::new());

        let roles: Vec<_> = conversation
            .messages()
            .iter()
            .map(|m| matches!(m, Message::User { .. }))
            .collect();
        assert_eq!(roles, vec![true, false]);
        assert_eq!(conversation.last().and_then(Message::text), Some("hi there"));
    }

    #[test]
    fn tracks_unanswered_calls() {
        let mut conversation = Conversation::new();
        conversation.push_user("lights and music");
        conversation.push_assistant(
            "",
            vec![
                ToolCall::new("a", "turn_lights", "{}"),
                ToolCall::new("b", "play_music", "{}"),
            ],
        );
        assert_eq!(conversation.unanswered_tool_calls(), vec!["a", "b"]);
        assert!(!conversation.ready_for_completion());

        conversation.push_tool_result("a", "ok");
        assert_eq!(conversation.unanswered_tool_calls(), vec!["b"]);

        conversation.push_tool_result("b", "playing");
        assert!(conversation.ready_for_completion());
    }

    #[test]
    fn results_for_older_calls_do_not_count() {
        let mut conversation = Conversation::new();
        conversation.push_assistant("", vec![ToolCall::new("a", "t", "{}")]);
        conversation.push_tool_result("a", "ok");
        conversation.push_assistant("", vec![ToolCall::new("a2", "t", "{}")]);
        assert_eq!(conversation.unanswered_tool_calls(), vec!["a2"]);
    }
}
