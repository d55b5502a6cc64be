use crate::discovery::execution::{DirectExecution, ExecutionStrategy};
use crate::discovery::router::{route, Route};
use crate::discovery::search_tool::{
    extract_query, format_matches, search_tool_definition, SEARCH_TOOL_NAME,
};
use crate::discovery::state::{DiscoveryState, SearchRecord, StateUpdate};
use crate::error::{DiscoveryError, Result};
use crate::llm::{ChatModel, Message, MessageRole, ToolCall};
use crate::loader::ToolLoader;
use crate::search::{SearchIndex, SearchOptions, DEFAULT_SEARCH_LIMIT};
use crate::telemetry::add_metric;
use crate::tools::{result_to_text, SharedTool, ToolDefinition};
use futures::future;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Default cap on node executions per run
pub const DEFAULT_MAX_ITERATIONS: usize = 25;

/// Options of the discovery loop
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Instructions prepended to the model input unless the conversation
    /// already starts with a system message
    #[serde(default)]
    pub system_prompt: Option<String>,

    /// Results per search call
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Node executions allowed per run
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Name of the search meta-tool
    #[serde(default = "default_search_tool_name")]
    pub search_tool_name: String,
}

fn default_search_limit() -> usize {
    DEFAULT_SEARCH_LIMIT
}

fn default_max_iterations() -> usize {
    DEFAULT_MAX_ITERATIONS
}

fn default_search_tool_name() -> String {
    SEARCH_TOOL_NAME.to_string()
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            search_limit: DEFAULT_SEARCH_LIMIT,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            search_tool_name: default_search_tool_name(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Decide,
    Search,
    Act,
}

/// Agent loop that searches for tools, loads them and executes them.
///
/// Each run alternates `decide` with either `search` or `act` until the
/// model replies without tool calls.
pub struct DiscoveryAgent {
    model: Arc<dyn ChatModel>,
    index: Arc<SearchIndex>,
    loader: Arc<ToolLoader>,
    pinned: Vec<SharedTool>,
    execution: Arc<dyn ExecutionStrategy>,
    config: DiscoveryConfig,
}

impl fmt::Debug for DiscoveryAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DiscoveryAgent")
            .field("pinned", &self.pinned.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl DiscoveryAgent {
    /// Creates the loop.
    ///
    /// Fails with a configuration error if the model cannot be bound to tools.
    pub fn new(
        model: Arc<dyn ChatModel>,
        index: Arc<SearchIndex>,
        loader: Arc<ToolLoader>,
        config: DiscoveryConfig,
    ) -> Result<Self> {
        if !model.supports_tool_calling() {
            return Err(DiscoveryError::Config(
                "The discovery loop needs a model that supports tool calling".to_string(),
            ));
        }

        Ok(Self {
            model,
            index,
            loader,
            pinned: Vec::new(),
            execution: Arc::new(DirectExecution),
            config,
        })
    }

    /// Tools bound on every turn without being searched for
    pub fn with_pinned_tools(mut self, tools: Vec<SharedTool>) -> Self {
        self.pinned = tools;
        self
    }

    /// Replaces how the act node invokes tools
    pub fn with_execution_strategy(mut self, execution: Arc<dyn ExecutionStrategy>) -> Self {
        self.execution = execution;
        self
    }

    /// Loop options
    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Runs the loop on a single user message
    pub async fn invoke(&self, input: &str) -> Result<DiscoveryState> {
        self.run_from(DiscoveryState::from_user(input)).await
    }

    /// Runs the loop on a conversation
    pub async fn run(&self, messages: Vec<Message>) -> Result<DiscoveryState> {
        self.run_from(DiscoveryState::new(messages)).await
    }

    /// Runs the loop from an existing state until the model stops calling tools
    #[instrument(skip(self, state), fields(messages = state.messages.len()))]
    pub async fn run_from(&self, mut state: DiscoveryState) -> Result<DiscoveryState> {
        let mut node = Node::Decide;
        let mut steps = 0;

        loop {
            if steps >= self.config.max_iterations {
                warn!("Discovery loop stopped after {} steps", steps);
                return Err(DiscoveryError::IterationLimit(self.config.max_iterations));
            }
            steps += 1;

            let update = match node {
                Node::Decide => self.decide_node(&state).await?,
                Node::Search => self.search_node(&state).await?,
                Node::Act => self.act_node(&state).await?,
            };
            state.apply(update);

            node = match node {
                Node::Decide => match self.route(&state) {
                    Route::Search => Node::Search,
                    Route::Act => Node::Act,
                    Route::End => break,
                },
                Node::Search | Node::Act => Node::Decide,
            };
            debug!("Next node: {:?}", node);
        }

        info!(
            "Discovery loop finished after {} steps with {} selected tools",
            steps,
            state.selected_tool_ids.len()
        );
        add_metric("discovery_loop_steps", steps as f64, &[]);
        Ok(state)
    }

    /// Where the loop goes after `decide`
    pub fn route(&self, state: &DiscoveryState) -> Route {
        route(state, &self.config.search_tool_name)
    }

    /// Asks the model for the next step with the search tool, pinned tools
    /// and every loadable selected tool bound
    #[instrument(skip(self, state))]
    pub async fn decide_node(&self, state: &DiscoveryState) -> Result<StateUpdate> {
        let tools = self.available_tools(state).await;
        let definitions = bound_definitions(&self.config.search_tool_name, &tools);

        let input = self.model_input(&state.messages);
        let reply = self.model.invoke(&input, &definitions).await?;
        debug!(
            "Model replied with {} tool calls ({} tools bound)",
            reply.tool_calls.len(),
            definitions.len()
        );

        Ok(StateUpdate::messages(vec![reply]))
    }

    /// Runs each search call on the last message, in order
    #[instrument(skip(self, state))]
    pub async fn search_node(&self, state: &DiscoveryState) -> Result<StateUpdate> {
        let mut update = StateUpdate::default();
        let Some(last) = state.last_message() else {
            return Ok(update);
        };

        let options = SearchOptions::with_limit(self.config.search_limit);
        for call in last
            .tool_calls
            .iter()
            .filter(|call| call.name == self.config.search_tool_name)
        {
            let query = extract_query(call);
            let (content, found) = match self.index.search_tools(&query, &options).await {
                Ok(matches) => {
                    let found: Vec<String> =
                        matches.iter().map(|hit| hit.result.tool_id.clone()).collect();
                    (format_matches(&query, &matches), found)
                }
                Err(err) => {
                    warn!("Tool search for {:?} failed: {}", query, err);
                    (format!("Error: tool search failed: {}", err), Vec::new())
                }
            };

            info!("Search {:?} found {} tools", query, found.len());
            update.messages.push(Message::tool(call.id.clone(), content));
            update.selected_tool_ids.extend(found.iter().cloned());
            update.search_history.push(SearchRecord::new(query, found));
        }

        Ok(update)
    }

    /// Executes the tool calls on the last message against the pinned and
    /// selected tools.
    ///
    /// Failures become error-bearing tool messages.
    #[instrument(skip(self, state))]
    pub async fn act_node(&self, state: &DiscoveryState) -> Result<StateUpdate> {
        let Some(last) = state.last_message() else {
            return Ok(StateUpdate::default());
        };
        if last.role != MessageRole::Assistant || last.tool_calls.is_empty() {
            return Ok(StateUpdate::default());
        }

        let tools = self.available_tools(state).await;
        let calls = last
            .tool_calls
            .iter()
            .filter(|call| call.name != self.config.search_tool_name);
        let messages = future::join_all(calls.map(|call| self.execute_call(&tools, call))).await;

        Ok(StateUpdate::messages(messages))
    }

    async fn execute_call(&self, tools: &[SharedTool], call: &ToolCall) -> Message {
        let Some(tool) = tools.iter().find(|tool| tool.definition().name == call.name) else {
            warn!("Model called unavailable tool {}", call.name);
            return Message::tool(
                call.id.clone(),
                format!("Error: tool '{}' is not available", call.name),
            );
        };

        match self.execution.execute(Arc::clone(tool), call).await {
            Ok(value) => {
                add_metric("discovery_tool_call", 1.0, &[("tool", call.name.clone())]);
                Message::tool(call.id.clone(), result_to_text(&value))
            }
            Err(err) => {
                warn!("Tool {} failed: {}", call.name, err);
                add_metric("discovery_tool_error", 1.0, &[("tool", call.name.clone())]);
                Message::tool(call.id.clone(), format!("Error: {}", err))
            }
        }
    }

    /// Pinned tools followed by every selected tool that loads
    async fn available_tools(&self, state: &DiscoveryState) -> Vec<SharedTool> {
        let loads = state
            .selected_tool_ids
            .iter()
            .map(|id| self.loader.load(id));
        let results = future::join_all(loads).await;

        let mut tools = self.pinned.clone();
        for (id, result) in state.selected_tool_ids.iter().zip(results) {
            match result {
                Ok(tool) => tools.push(tool),
                Err(err) => warn!("Dropping tool {} from this turn: {}", id, err),
            }
        }
        tools
    }

    fn model_input(&self, messages: &[Message]) -> Vec<Message> {
        match &self.config.system_prompt {
            Some(prompt)
                if messages
                    .first()
                    .map_or(true, |first| first.role != MessageRole::System) =>
            {
                let mut input = Vec::with_capacity(messages.len() + 1);
                input.push(Message::system(prompt.clone()));
                input.extend_from_slice(messages);
                input
            }
            _ => messages.to_vec(),
        }
    }
}

/// Search tool first, then each tool whose name is not yet bound
fn bound_definitions(search_tool_name: &str, tools: &[SharedTool]) -> Vec<ToolDefinition> {
    let mut seen = HashSet::from([search_tool_name.to_string()]);
    std::iter::once(search_tool_definition(search_tool_name))
        .chain(
            tools
                .iter()
                .map(|tool| tool.definition())
                .filter(|definition| seen.insert(definition.name.clone()))
                .cloned(),
        )
        .collect()
}
