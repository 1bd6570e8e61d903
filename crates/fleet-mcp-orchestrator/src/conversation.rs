//! In-memory conversation contexts with idle-expiry sweeping.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use fleet_mcp_core::error::FleetResult;
use fleet_mcp_core::validation;

/// Messages kept per context; the oldest are trimmed beyond this.
pub const MAX_MESSAGES: usize = 50;

/// Contexts idle longer than this are purged.
pub const DEFAULT_IDLE_TTL: Duration = Duration::from_secs(60 * 60);

/// How often the sweeper runs.
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

/// One conversation's state.
#[derive(Debug, Clone)]
pub struct ConversationContext {
    pub id: String,
    messages: VecDeque<ConversationMessage>,
    pub created_at: DateTime<Utc>,
    last_used: Instant,
    /// Server targeted when a plan step leaves its server blank
    pub preferred_server: Option<String>,
}

impl ConversationContext {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            messages: VecDeque::new(),
            created_at: Utc::now(),
            last_used: Instant::now(),
            preferred_server: None,
        }
    }

    /// A fresh random context id.
    pub fn generate_id() -> String {
        Uuid::new_v4().to_string()
    }

    pub fn push(&mut self, role: MessageRole, content: impl Into<String>) {
        self.messages.push_back(ConversationMessage {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        });
        while self.messages.len() > MAX_MESSAGES {
            self.messages.pop_front();
        }
        self.touch();
    }

    pub fn messages(&self) -> impl Iterator<Item = &ConversationMessage> {
        self.messages.iter()
    }

    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    pub fn touch(&mut self) {
        self.last_used = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_used.elapsed()
    }
}

/// Concurrent map of context-id → context, plus the background sweeper.
pub struct ConversationStore {
    contexts: RwLock<HashMap<String, ConversationContext>>,
    idle_ttl: Duration,
}

impl ConversationStore {
    pub fn new(idle_ttl: Duration) -> Self {
        Self {
            contexts: RwLock::new(HashMap::new()),
            idle_ttl,
        }
    }

    /// Fetch a snapshot of the context, creating it on first use. The read
    /// counts as a touch.
    pub async fn get_or_create(&self, id: &str) -> FleetResult<ConversationContext> {
        validation::validate_context_id(id)?;
        let mut contexts = self.contexts.write().await;
        let context = contexts
            .entry(id.to_string())
            .or_insert_with(|| ConversationContext::new(id));
        context.touch();
        Ok(context.clone())
    }

    pub async fn append(
        &self,
        id: &str,
        role: MessageRole,
        content: impl Into<String>,
    ) -> FleetResult<()> {
        validation::validate_context_id(id)?;
        let mut contexts = self.contexts.write().await;
        contexts
            .entry(id.to_string())
            .or_insert_with(|| ConversationContext::new(id))
            .push(role, content);
        Ok(())
    }

    pub async fn set_preferred_server(&self, id: &str, server: Option<String>) -> FleetResult<()> {
        validation::validate_context_id(id)?;
        let mut contexts = self.contexts.write().await;
        let context = contexts
            .entry(id.to_string())
            .or_insert_with(|| ConversationContext::new(id));
        context.preferred_server = server;
        context.touch();
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> bool {
        self.contexts.write().await.remove(id).is_some()
    }

    pub async fn len(&self) -> usize {
        self.contexts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.contexts.read().await.is_empty()
    }

    /// One eviction pass over a snapshot of ids; returns how many contexts
    /// were purged.
    pub async fn sweep_once(&self) -> usize {
        let expired: Vec<String> = {
            let contexts = self.contexts.read().await;
            contexts
                .iter()
                .filter(|(_, context)| context.idle_for() >= self.idle_ttl)
                .map(|(id, _)| id.clone())
                .collect()
        };

        if expired.is_empty() {
            return 0;
        }

        let mut contexts = self.contexts.write().await;
        let mut evicted = 0;
        for id in expired {
            // Re-check under the write lock; the context may have been
            // touched since the snapshot.
            if contexts
                .get(&id)
                .map(|context| context.idle_for() >= self.idle_ttl)
                .unwrap_or(false)
            {
                contexts.remove(&id);
                evicted += 1;
            }
        }
        if evicted > 0 {
            debug!(evicted, "swept idle conversation contexts");
        }
        evicted
    }

    /// Spawn the periodic sweeper task.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.sweep_once().await;
            }
        })
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new(DEFAULT_IDLE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn history_is_bounded() {
        let store = ConversationStore::default();
        for i in 0..(MAX_MESSAGES + 10) {
            store
                .append("ctx", MessageRole::User, format!("message {i}"))
                .await
                .unwrap();
        }

        let context = store.get_or_create("ctx").await.unwrap();
        assert_eq!(context.message_count(), MAX_MESSAGES);
        // The oldest messages were trimmed.
        let first = context.messages().next().unwrap();
        assert_eq!(first.content, "message 10");
    }

    #[tokio::test]
    async fn invalid_ids_are_rejected() {
        let store = ConversationStore::default();
        assert!(store.get_or_create("bad id!").await.is_err());
        assert!(store
            .append(&"x".repeat(101), MessageRole::User, "hi")
            .await
            .is_err());
    }

    #[tokio::test]
    async fn idle_contexts_are_swept() {
        let store = ConversationStore::new(Duration::from_millis(50));
        store.append("old", MessageRole::User, "hi").await.unwrap();

        tokio::time::sleep(Duration::from_millis(80)).await;
        store.append("fresh", MessageRole::User, "hi").await.unwrap();

        assert_eq!(store.sweep_once().await, 1);
        assert_eq!(store.len().await, 1);
        assert!(store.get_or_create("fresh").await.is_ok());
    }

    #[tokio::test]
    async fn touch_defers_eviction() {
        let store = ConversationStore::new(Duration::from_millis(80));
        store.append("ctx", MessageRole::User, "hi").await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        // Reading is a touch.
        store.get_or_create("ctx").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.sweep_once().await, 0);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn sweeper_task_evicts_in_background() {
        let store = Arc::new(ConversationStore::new(Duration::from_millis(40)));
        store.append("ctx", MessageRole::User, "hi").await.unwrap();

        let sweeper = store.start_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(store.is_empty().await);
        sweeper.abort();
    }

    #[tokio::test]
    async fn generated_ids_validate() {
        let id = ConversationContext::generate_id();
        assert!(fleet_mcp_core::validation::validate_context_id(&id).is_ok());
    }
}
