//! In-memory conversation history, keyed by scope.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use poise::serenity_prelude::ChannelId;

/// Maximum exchanges retained per scope; the oldest entries are evicted first.
pub const MAX_EXCHANGES: usize = 50;

/// One prompt/response pair, recorded after a successful turn.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub speaker: Option<String>,
    pub prompt: String,
    pub response: String,
    pub recorded_at: DateTime<Utc>,
}

impl Exchange {
    #[must_use]
    pub fn new(
        speaker: Option<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Self {
            speaker,
            prompt: prompt.into(),
            response: response.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Boundary for history retention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Scope {
    /// A single history shared by every caller, regardless of channel.
    Global,
    /// History partitioned by channel.
    Channel(ChannelId),
}

/// Process-lifetime store of past exchanges.
///
/// Each operation takes the lock once, so appends to a single scope never
/// interleave. There is no cross-turn exclusion: two concurrent turns on the
/// same scope may interleave their read and record steps, so the context one
/// turn sees can miss the other's exchange.
#[derive(Debug, Default)]
pub struct ConversationStore {
    scopes: Mutex<HashMap<Scope, Vec<Exchange>>>,
}

impl ConversationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Scope, Vec<Exchange>>> {
        self.scopes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the recorded exchanges for a scope, oldest first.
    #[must_use]
    pub fn history(&self, scope: Scope) -> Vec<Exchange> {
        self.lock().get(&scope).cloned().unwrap_or_default()
    }

    /// Number of exchanges currently recorded for a scope.
    #[must_use]
    pub fn len(&self, scope: Scope) -> usize {
        self.lock().get(&scope).map_or(0, Vec::len)
    }

    /// Append an exchange to a scope, creating the scope entry if absent.
    ///
    /// Keeps at most [`MAX_EXCHANGES`] entries per scope.
    pub fn record(&self, scope: Scope, exchange: Exchange) {
        let mut scopes = self.lock();
        let entries = scopes.entry(scope).or_default();
        entries.push(exchange);
        if entries.len() > MAX_EXCHANGES {
            let excess = entries.len() - MAX_EXCHANGES;
            entries.drain(..excess);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_scope_has_empty_history() {
        let store = ConversationStore::new();
        assert!(store.history(Scope::Global).is_empty());
        assert_eq!(store.len(Scope::Channel(ChannelId::new(42))), 0);
    }

    #[test]
    fn record_preserves_insertion_order() {
        let store = ConversationStore::new();
        for i in 0..5 {
            store.record(
                Scope::Global,
                Exchange::new(None, format!("prompt {i}"), format!("response {i}")),
            );
        }

        let history = store.history(Scope::Global);
        assert_eq!(history.len(), 5);
        for (i, exchange) in history.iter().enumerate() {
            assert_eq!(exchange.prompt, format!("prompt {i}"));
            assert_eq!(exchange.response, format!("response {i}"));
        }
    }

    #[test]
    fn scopes_are_independent() {
        let store = ConversationStore::new();
        store.record(Scope::Global, Exchange::new(None, "a", "b"));
        store.record(
            Scope::Channel(ChannelId::new(1)),
            Exchange::new(Some("alice".to_string()), "c", "d"),
        );

        assert_eq!(store.len(Scope::Global), 1);
        assert_eq!(store.len(Scope::Channel(ChannelId::new(1))), 1);
        assert_eq!(store.len(Scope::Channel(ChannelId::new(2))), 0);
    }

    #[test]
    fn oldest_exchanges_are_evicted_past_the_cap() {
        let store = ConversationStore::new();
        for i in 0..(MAX_EXCHANGES + 10) {
            store.record(Scope::Global, Exchange::new(None, format!("p{i}"), "r"));
        }

        let history = store.history(Scope::Global);
        assert_eq!(history.len(), MAX_EXCHANGES);
        assert_eq!(history[0].prompt, "p10");
        assert_eq!(history[MAX_EXCHANGES - 1].prompt, format!("p{}", MAX_EXCHANGES + 9));
    }
}
