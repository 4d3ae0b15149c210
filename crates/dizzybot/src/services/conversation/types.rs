use std::time::{Duration, Instant};

use crate::models::chat::Message;

/// Conversation state stored per chat room
#[derive(Debug, Clone)]
pub struct ConversationState {
    /// System instruction shaping the persona
    pub context: String,

    /// Message history, oldest first
    pub messages: Vec<Message>,

    /// Last activity timestamp, drives idle eviction
    pub last_activity: Instant,
}

impl ConversationState {
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            messages: Vec::new(),
            last_activity: Instant::now(),
        }
    }

    pub fn touch(&mut self) {
        self.last_activity = Instant::now();
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
        self.touch();
    }

    /// Keep only the most recent `window` messages.
    /// Returns how many were dropped.
    pub fn truncate_to(&mut self, window: usize) -> usize {
        let excess = self.messages.len().saturating_sub(window);
        if excess > 0 {
            self.messages.drain(..excess);
        }
        excess
    }

    /// Untouched for at least `ttl`
    pub fn is_idle(&self, ttl: Duration) -> bool {
        self.last_activity.elapsed() >= ttl
    }

    /// Working copy of the history with `message` appended
    pub fn with_pending(&self, message: Message) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.messages.len() + 1);
        messages.extend(self.messages.iter().cloned());
        messages.push(message);
        messages
    }
}
