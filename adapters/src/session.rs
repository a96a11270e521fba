use async_trait::async_trait;
use cg_core::{ConversationTurn, SessionStore};
use config::ConversationConfig;
use dashmap::DashMap;
use errors::SessionError;
use std::time::Duration;
use tokio::time::Instant;

struct SessionEntry {
    turns: Vec<ConversationTurn>,
    last_active: Instant
}

/// Process-local conversation history. Contents are lost on restart.
///
/// Bounded three ways: each session keeps only its most recent
/// `max_turns` turns, sessions idle for `idle_ttl` are forgotten, and once
/// `max_sessions` are held a new session evicts the least recently active one.
pub struct InMemorySessionStore {
    sessions: DashMap<String, SessionEntry>,
    max_turns: usize,
    max_sessions: usize,
    idle_ttl: Duration
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::from_config(&ConversationConfig::default())
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_turns: usize, max_sessions: usize, idle_ttl: Duration) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns: max_turns.max(1),
            max_sessions: max_sessions.max(1),
            idle_ttl
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::with_limits(
            config.max_stored_turns,
            config.max_sessions,
            config.session_idle()
        )
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    fn is_expired(&self, entry: &SessionEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.last_active) >= self.idle_ttl
    }

    /// Drops every idle session and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.sessions.len();
        self.sessions.retain(|_, entry| !self.is_expired(entry, now));
        let removed = before.saturating_sub(self.sessions.len());
        if removed > 0 {
            tracing::debug!(removed, "Expired conversation sessions purged");
        }
        removed
    }

    fn make_room(&self) {
        if self.purge_expired() > 0 && self.sessions.len() < self.max_sessions {
            return;
        }
        let oldest = self
            .sessions
            .iter()
            .min_by_key(|entry| entry.value().last_active)
            .map(|entry| entry.key().clone());
        if let Some(session_id) = oldest {
            self.sessions.remove(&session_id);
            tracing::info!(
                max_sessions = self.max_sessions,
                "Session limit reached, evicted least recently active session"
            );
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get(&self, session_id: &str) -> Result<Vec<ConversationTurn>, SessionError> {
        let now = Instant::now();
        let live = self
            .sessions
            .get(session_id)
            .map(|entry| (!self.is_expired(&entry, now)).then(|| entry.turns.clone()));

        match live {
            Some(Some(turns)) => Ok(turns),
            Some(None) => {
                self.sessions
                    .remove_if(session_id, |_, entry| self.is_expired(entry, now));
                Ok(Vec::new())
            }
            None => Ok(Vec::new())
        }
    }

    async fn append(&self, session_id: &str, turn: ConversationTurn) -> Result<(), SessionError> {
        if !self.sessions.contains_key(session_id) && self.sessions.len() >= self.max_sessions {
            self.make_room();
        }

        let now = Instant::now();
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionEntry {
                turns: Vec::new(),
                last_active: now
            });
        if self.is_expired(&entry, now) {
            entry.turns.clear();
        }
        entry.last_active = now;
        entry.turns.push(turn);

        let excess = entry.turns.len().saturating_sub(self.max_turns);
        if excess > 0 {
            entry.turns.drain(..excess);
        }
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), SessionError> {
        self.sessions.remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cg_core::TurnRole;

    #[tokio::test]
    async fn test_append_get_clear() {
        let store = InMemorySessionStore::new();
        let session = testing::unique_session_id();

        assert!(store.get(&session).await.unwrap().is_empty());

        store
            .append(&session, ConversationTurn::user("hi"))
            .await
            .unwrap();
        store
            .append(&session, ConversationTurn::assistant("hello"))
            .await
            .unwrap();

        let turns = store.get(&session).await.unwrap();
        assert_eq!(turns.len(), 2);
        assert_eq!(turns[0].role, TurnRole::User);
        assert_eq!(turns[1].content, "hello");

        store.clear(&session).await.unwrap();
        assert!(store.get(&session).await.unwrap().is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_turns_capped_per_session() {
        let store = InMemorySessionStore::with_limits(4, 10, Duration::from_secs(60));
        let session = testing::unique_session_id();

        for i in 0..10 {
            store
                .append(&session, ConversationTurn::user(format!("message {}", i)))
                .await
                .unwrap();
        }

        let turns = store.get(&session).await.unwrap();
        let contents: Vec<_> = turns.iter().map(|t| t.content.as_str()).collect();
        assert_eq!(
            contents,
            vec!["message 6", "message 7", "message 8", "message 9"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_sessions_expire() {
        let store = InMemorySessionStore::with_limits(10, 10, Duration::from_secs(60));
        let session = testing::unique_session_id();

        store
            .append(&session, ConversationTurn::user("hi"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.get(&session).await.unwrap().len(), 1);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(store.get(&session).await.unwrap().is_empty());
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_limit_evicts_least_recently_active() {
        let store = InMemorySessionStore::with_limits(10, 2, Duration::from_secs(3_600));

        store
            .append("first", ConversationTurn::user("a"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        store
            .append("second", ConversationTurn::user("b"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        store
            .append("first", ConversationTurn::assistant("c"))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;

        store
            .append("third", ConversationTurn::user("d"))
            .await
            .unwrap();

        assert_eq!(store.session_count(), 2);
        assert!(store.get("second").await.unwrap().is_empty());
        assert_eq!(store.get("first").await.unwrap().len(), 2);
        assert_eq!(store.get("third").await.unwrap().len(), 1);
    }
}
