use crate::error::{DiscoveryError, Result};
use crate::llm::types::Message;
use crate::tools::ToolDefinition;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A chat model that can be bound to a set of tools
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Returns false if the model cannot be given tools at all
    fn supports_tool_calling(&self) -> bool {
        true
    }

    /// Produces the next assistant message for a conversation, with `tools`
    /// bound as the callable actions for this turn
    async fn invoke(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Message>;
}

/// One recorded [`ScriptedModel`] invocation
#[derive(Debug, Clone)]
pub struct ModelCall {
    /// Conversation passed to the model
    pub messages: Vec<Message>,
    /// Names of the bound tools, in binding order
    pub tool_names: Vec<String>,
}

#[derive(Debug, Default)]
struct Script {
    replies: VecDeque<Message>,
    calls: Vec<ModelCall>,
}

/// Model replaying canned replies in order and recording what it was given.
///
/// Fails with a model error once the script is exhausted.
#[derive(Debug)]
pub struct ScriptedModel {
    script: Mutex<Script>,
    tool_calling: bool,
}

impl ScriptedModel {
    /// Creates a model that answers with `replies`, one per invocation
    pub fn new(replies: impl IntoIterator<Item = Message>) -> Self {
        Self {
            script: Mutex::new(Script {
                replies: replies.into_iter().collect(),
                calls: Vec::new(),
            }),
            tool_calling: true,
        }
    }

    /// Model that reports no tool-calling support
    pub fn without_tool_calling(replies: impl IntoIterator<Item = Message>) -> Self {
        Self {
            tool_calling: false,
            ..Self::new(replies)
        }
    }

    /// Appends a reply to the script
    pub fn push_reply(&self, reply: Message) {
        self.lock().replies.push_back(reply);
    }

    /// Invocations so far
    pub fn calls(&self) -> Vec<ModelCall> {
        self.lock().calls.clone()
    }

    /// Replies not yet consumed
    pub fn remaining(&self) -> usize {
        self.lock().replies.len()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ChatModel for ScriptedModel {
    fn supports_tool_calling(&self) -> bool {
        self.tool_calling
    }

    async fn invoke(&self, messages: &[Message], tools: &[ToolDefinition]) -> Result<Message> {
        let mut script = self.lock();
        script.calls.push(ModelCall {
            messages: messages.to_vec(),
            tool_names: tools.iter().map(|tool| tool.name.clone()).collect(),
        });
        script
            .replies
            .pop_front()
            .ok_or_else(|| DiscoveryError::Model("Scripted model has no replies left".to_string()))
    }
}
