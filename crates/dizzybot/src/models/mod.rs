pub mod chat;

pub use chat::{ConversationId, Example, InboundMessage, Message, ReplyMessage};
