//! Completion loop of a single turn
//!
//! Submits the conversation to the model, resolves any requested tools in
//! the order they were issued and repeats until the model answers without
//! tool calls.

use tokio_util::sync::CancellationToken;

use super::client::ChatModel;
use super::conversation::Conversation;
use crate::tools::ToolRegistry;
use crate::{Error, Result};

/// Configuration for the completion loop
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AgentRunConfig {
    /// Max tool resolution rounds per turn; `None` loops until the model stops
    pub max_tool_rounds: Option<u32>,
}

/// Tool lifecycle events for callers that surface progress
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentNotifyEvent {
    /// Tool invocation started
    ToolStart { tool_id: String, name: String },
    /// Tool invocation completed
    ToolResult {
        tool_id: String,
        name: String,
        output: String,
        is_error: bool,
    },
}

/// Run the completion loop and return the final assistant text
///
/// Every assistant message and tool result is appended to `conversation`.
/// Tool failures become tool-result text for the model; only completion
/// failures, cancellation and an exceeded tool bound end the loop early.
///
/// # Errors
///
/// Returns `Error::Completion` if the model call fails, `Error::Cancelled`
/// on shutdown, or `Error::ToolLoopExceeded` past `max_tool_rounds`
pub async fn run_agent_turn(
    model: &dyn ChatModel,
    tools: &ToolRegistry,
    conversation: &mut Conversation,
    config: AgentRunConfig,
    sink: &mut (dyn FnMut(&str) + Send),
    cancel: &CancellationToken,
) -> Result<String> {
    run_agent_turn_with(
        model,
        tools,
        conversation,
        config,
        sink,
        &mut |_: AgentNotifyEvent| {},
        cancel,
    )
    .await
}

/// [`run_agent_turn`] reporting tool progress to `notify`
///
/// # Errors
///
/// Same as [`run_agent_turn`]
pub async fn run_agent_turn_with(
    model: &dyn ChatModel,
    tools: &ToolRegistry,
    conversation: &mut Conversation,
    config: AgentRunConfig,
    sink: &mut (dyn FnMut(&str) + Send),
    notify: &mut (dyn FnMut(AgentNotifyEvent) + Send),
    cancel: &CancellationToken,
) -> Result<String> {
    let definitions = tools.definitions();
    let mut rounds: u32 = 0;

    loop {
        debug_assert!(conversation.ready_for_completion());

        let reply = model
            .complete(conversation.messages(), &definitions, sink, cancel)
            .await?;
        conversation.push_assistant(reply.content.clone(), reply.tool_calls.clone());

        if !reply.wants_tools() {
            tracing::debug!(rounds, chars = reply.content.len(), "completion loop finished");
            return Ok(reply.content);
        }

        if let Some(max) = config.max_tool_rounds.filter(|&max| rounds >= max) {
            let exceeded = Error::ToolLoopExceeded(max);
            tracing::warn!(max, pending = reply.tool_calls.len(), "tool loop bound reached");
            for call in &reply.tool_calls {
                conversation.push_tool_result(&call.id, exceeded.to_string());
            }
            return Err(exceeded);
        }
        rounds += 1;

        for call in &reply.tool_calls {
            notify(AgentNotifyEvent::ToolStart {
                tool_id: call.id.clone(),
                name: call.name().to_string(),
            });

            let (output, is_error) = match tools.resolve(call, cancel).await {
                Ok(output) => (output, false),
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        tool = %call.name(),
                        id = %call.id,
                        error = %e,
                        "tool call failed"
                    );
                    (e.to_string(), true)
                }
            };

            notify(AgentNotifyEvent::ToolResult {
                tool_id: call.id.clone(),
                name: call.name().to_string(),
                output: output.clone(),
                is_error,
            });
            conversation.push_tool_result(&call.id, output);
        }
    }
}
