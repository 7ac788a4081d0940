//! Conversation state and the model side of a turn

mod client;
mod conversation;
mod message;
mod runner;
mod stream;

pub use client::{ChatClient, ChatModel};
pub use conversation::Conversation;
pub use message::{FunctionCall, FunctionDefinition, Message, ToolCall, ToolDefinition};
pub use runner::{AgentNotifyEvent, AgentRunConfig, run_agent_turn, run_agent_turn_with};
pub use stream::{AssistantReply, ReplyAccumulator};
