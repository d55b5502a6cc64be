use crate::discovery::state::DiscoveryState;
use tracing::debug;

/// Next node after `decide`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Run the requested searches
    Search,
    /// Execute the requested tool calls
    Act,
    /// Stop the loop
    End,
}

/// Routes on the last message only.
///
/// A reply asking for the search tool goes to `Search` even when it also
/// requests other tools; those calls are not executed this turn.
pub fn route(state: &DiscoveryState, search_tool_name: &str) -> Route {
    let Some(last) = state.last_message() else {
        return Route::End;
    };
    if !last.is_model_reply() || !last.has_tool_calls() {
        return Route::End;
    }

    let searches = last
        .tool_calls
        .iter()
        .filter(|call| call.name == search_tool_name)
        .count();

    if searches == 0 {
        return Route::Act;
    }
    if searches < last.tool_calls.len() {
        debug!(
            "Deferring {} tool calls requested alongside a search",
            last.tool_calls.len() - searches
        );
    }
    Route::Search
}
