use crate::llm::Message;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One executed search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRecord {
    /// Query text sent to the index
    pub query: String,
    /// Ids of the tools found, best first
    pub result_ids: Vec<String>,
    /// When the search ran
    pub timestamp: DateTime<Utc>,
}

impl SearchRecord {
    /// Records a search that ran now
    pub fn new(query: impl Into<String>, result_ids: Vec<String>) -> Self {
        Self {
            query: query.into(),
            result_ids,
            timestamp: Utc::now(),
        }
    }
}

/// State carried between the nodes of the discovery loop.
///
/// Only grows during one run: nodes return a [`StateUpdate`] that is merged
/// in with [`DiscoveryState::apply`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryState {
    /// Conversation so far
    pub messages: Vec<Message>,
    /// Tools discovered so far
    pub selected_tool_ids: Vec<String>,
    /// Every search that ran, in order
    pub search_history: Vec<SearchRecord>,
}

/// Partial update produced by one node
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateUpdate {
    /// Messages to merge
    pub messages: Vec<Message>,
    /// Tool ids to add to the selection
    pub selected_tool_ids: Vec<String>,
    /// Searches to append
    pub search_history: Vec<SearchRecord>,
}

impl StateUpdate {
    /// Update carrying only messages
    pub fn messages(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Returns true if merging would change nothing
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
            && self.selected_tool_ids.is_empty()
            && self.search_history.is_empty()
    }
}

impl DiscoveryState {
    /// State starting from a conversation
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// State starting from one user message
    pub fn from_user(content: impl Into<String>) -> Self {
        Self::new(vec![Message::user(content)])
    }

    /// Most recent message
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Merges a node's update.
    ///
    /// Messages are appended, except that a message whose id is already in
    /// the log replaces that entry; messages without an id get a fresh one.
    /// Selected ids are a set union and history is appended.
    pub fn apply(&mut self, update: StateUpdate) {
        for mut message in update.messages {
            let id = message
                .id
                .get_or_insert_with(|| Uuid::new_v4().to_string())
                .clone();
            match self
                .messages
                .iter_mut()
                .find(|existing| existing.id.as_deref() == Some(id.as_str()))
            {
                Some(existing) => *existing = message,
                None => self.messages.push(message),
            }
        }

        for id in update.selected_tool_ids {
            if !self.selected_tool_ids.contains(&id) {
                self.selected_tool_ids.push(id);
            }
        }

        self.search_history.extend(update.search_history);
    }
}
