use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, info};

use super::types::ConversationState;
use crate::models::chat::{ConversationId, Message};

/// Exclusive access to one conversation, held across a whole round trip
pub type ConversationGuard = OwnedMutexGuard<ConversationState>;

type Slot = Arc<Mutex<ConversationState>>;

/// Thread-safe in-memory conversation store.
///
/// The map is sharded (DashMap) and every conversation sits behind its own
/// async mutex, so read-modify-write sequences on one id are serialized while
/// different ids proceed in parallel.
#[derive(Clone)]
pub struct ConversationStore {
    storage: Arc<DashMap<ConversationId, Slot>>,
    default_context: Arc<str>,
}

impl ConversationStore {
    pub fn new(default_context: impl Into<String>) -> Self {
        info!("Initializing conversation store with DashMap");
        Self {
            storage: Arc::new(DashMap::new()),
            default_context: Arc::from(default_context.into()),
        }
    }

    pub fn default_context(&self) -> &str {
        &self.default_context
    }

    fn fresh_state(&self) -> ConversationState {
        ConversationState::new(&*self.default_context)
    }

    /// Get the slot for `conversation_id`, creating a default one if absent.
    /// The shard lock is released before the caller awaits the slot mutex.
    fn slot(&self, conversation_id: &str) -> Slot {
        if let Some(slot) = self.storage.get(conversation_id) {
            return slot.value().clone();
        }

        self.storage
            .entry(conversation_id.to_string())
            .or_insert_with(|| {
                debug!(conversation_id, "Creating conversation state");
                Arc::new(Mutex::new(self.fresh_state()))
            })
            .value()
            .clone()
    }

    /// Lock a conversation for exclusive use
    pub async fn lock(&self, conversation_id: &str) -> ConversationGuard {
        self.slot(conversation_id).lock_owned().await
    }

    /// Snapshot of the state, created with the default context when absent
    pub async fn get_or_create(&self, conversation_id: &str) -> ConversationState {
        self.lock(conversation_id).await.clone()
    }

    /// Overwrite the context. A conversation that does not exist yet is
    /// created with the supplied context, not the default.
    pub async fn set_context(&self, conversation_id: &str, context: impl Into<String>) {
        let mut state = self.lock(conversation_id).await;
        state.context = context.into();
        state.touch();
        debug!(conversation_id, "Context updated");
    }

    /// Replace the state with default context and empty history
    pub async fn reset(&self, conversation_id: &str) {
        let mut state = self.lock(conversation_id).await;
        *state = self.fresh_state();
        debug!(conversation_id, "Conversation reset");
    }

    pub async fn append_message(&self, conversation_id: &str, message: Message) {
        self.lock(conversation_id).await.push(message);
    }

    /// Keep only the most recent `window_size` messages
    pub async fn truncate(&self, conversation_id: &str, window_size: usize) {
        let dropped = self.lock(conversation_id).await.truncate_to(window_size);
        if dropped > 0 {
            debug!(conversation_id, dropped, "History truncated");
        }
    }

    /// Drop conversations idle for at least `ttl`.
    ///
    /// A slot that is locked, or whose handle is held by a caller about to
    /// lock it, is kept. Returns the number of conversations removed.
    pub fn evict_idle(&self, ttl: Duration) -> usize {
        let start_len = self.storage.len();

        self.storage.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(state) => !state.is_idle(ttl),
                Err(_) => true,
            }
        });

        let count = start_len.saturating_sub(self.storage.len());
        if count > 0 {
            info!("Evicted {} idle conversations", count);
        }
        count
    }

    /// Get number of known conversations
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}
