use serde::{Deserialize, Serialize};

/// Chat-room key, externally a stringified integer
pub type ConversationId = String;

/// One turn of dialogue, replayed to the model in order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub content: String,
}

impl Message {
    pub fn new(author: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            author: author.into(),
            content: content.into(),
        }
    }
}

/// Few-shot example sent alongside the prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub input: Message,
    pub output: Message,
}

// ===== REQUEST MODELS =====

#[derive(Debug, Deserialize)]
pub struct InboundMessage {
    pub conversation_id: ConversationId,
    pub author_id: i64,
    pub text: String,
}

// ===== RESPONSE MODELS =====

#[derive(Debug, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub reply: String,
}
