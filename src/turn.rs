//! The model phase of a conversation turn: context, call, record.

use log::debug;

use crate::error::Result;
use crate::history::{ConversationStore, Exchange, Scope};
use crate::ollama::ChatModel;

/// How a turn uses the conversation store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Replay recorded exchanges as model context.
    Replay,
    /// Record exchanges for reference without feeding them back.
    RecordOnly,
}

/// Fetch context per policy, call the model, and record the exchange.
///
/// The exchange is recorded only when the model call succeeds; a failed call
/// leaves the scope untouched and propagates the error for the caller to
/// translate into a user-facing reply.
pub async fn chat_turn(
    model: &impl ChatModel,
    store: &ConversationStore,
    scope: Scope,
    policy: HistoryPolicy,
    speaker: Option<String>,
    prompt: &str,
) -> Result<String> {
    let context = match policy {
        HistoryPolicy::Replay => store.history(scope),
        HistoryPolicy::RecordOnly => Vec::new(),
    };
    debug!("Running chat turn with {} context exchange(s)", context.len());

    let response = model.chat(prompt, &context).await?;

    store.record(scope, Exchange::new(speaker, prompt, response.clone()));
    debug!(
        "Recorded exchange; scope now holds {} exchange(s)",
        store.len(scope)
    );

    Ok(response)
}
