//! Conversation memory management module
//!
//! Provides in-memory conversation state with:
//! - Sharded map of conversations (DashMap)
//! - Per-conversation async locking
//! - Sliding window history bounding

mod store;
pub mod types;

pub use store::{ConversationGuard, ConversationStore};
pub use types::ConversationState;

pub use crate::models::chat::{ConversationId, Message};
