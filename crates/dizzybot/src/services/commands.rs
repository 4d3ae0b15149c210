use std::collections::HashSet;
use tracing::{debug, info};

use super::generation::GenerationClient;
use crate::config::ConversationConfig;
use crate::models::chat::ConversationId;
use crate::utils::error::GenerationError;

pub const RESET_REPLY: &str = "Reset successfully";
pub const CONTEXT_REPLY: &str = "Context updated";
pub const CONTEXT_USAGE: &str = "Usage: /context <instruction for the bot>";
pub const UNKNOWN_REPLY: &str = "I don't know that command";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    Reset,
    SetContext(&'a str),
    MissingContext,
    Unknown(&'a str),
    Chat(&'a str),
}

/// Which chats get answered and the canned replies used around the model
#[derive(Debug, Clone)]
pub struct ChatPolicy {
    /// Empty means every chat is allowed
    pub allowed_conversations: HashSet<ConversationId>,
    pub refusal_reply: String,
    pub fallback_reply: String,
}

impl ChatPolicy {
    pub fn from_config(config: &ConversationConfig) -> Self {
        Self {
            allowed_conversations: config.allowed_conversations.iter().cloned().collect(),
            refusal_reply: config.refusal_reply.clone(),
            fallback_reply: config.fallback_reply.clone(),
        }
    }

    pub fn is_allowed(&self, conversation_id: &str) -> bool {
        self.allowed_conversations.is_empty() || self.allowed_conversations.contains(conversation_id)
    }
}

/// Split inbound text into a bot command or a plain chat message.
/// `/cmd@botname args` is accepted and the mention ignored.
pub fn parse(text: &str) -> Command<'_> {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Command::Chat(text);
    };

    let (head, args) = match rest.split_once(char::is_whitespace) {
        Some((head, args)) => (head, args.trim()),
        None => (rest, ""),
    };
    let name = head.split('@').next().unwrap_or(head);

    match name.to_ascii_lowercase().as_str() {
        "reset" => Command::Reset,
        "context" if args.is_empty() => Command::MissingContext,
        "context" => Command::SetContext(args),
        _ => Command::Unknown(name),
    }
}

/// Run one inbound message against the generation client and produce the
/// text to send back
pub async fn execute(
    client: &GenerationClient,
    policy: &ChatPolicy,
    conversation_id: &str,
    author_id: i64,
    text: &str,
) -> Result<String, GenerationError> {
    if !policy.is_allowed(conversation_id) {
        info!(conversation_id, "Refusing chat outside the allow list");
        return Ok(policy.refusal_reply.clone());
    }

    let command = parse(text);
    debug!(conversation_id, ?command, "Executing inbound message");

    match command {
        Command::Reset => {
            client.reset_conversation(conversation_id).await;
            Ok(RESET_REPLY.to_string())
        }
        Command::SetContext(context) => {
            client.set_context(conversation_id, context).await;
            Ok(CONTEXT_REPLY.to_string())
        }
        Command::MissingContext => Ok(CONTEXT_USAGE.to_string()),
        Command::Unknown(_) => Ok(UNKNOWN_REPLY.to_string()),
        Command::Chat(message) => {
            let reply = client
                .generate_text(conversation_id, author_id, message)
                .await?;
            if reply.trim().is_empty() {
                Ok(policy.fallback_reply.clone())
            } else {
                Ok(reply)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HistoryPolicy, SummaryFailure};
    use crate::models::chat::Message;
    use crate::services::conversation::ConversationStore;
    use crate::services::generation::GenerationOptions;
    use crate::services::palm::{GenerationResponse, MockMessageGenerator};
    use std::sync::Arc;

    #[test]
    fn test_parse_commands() {
        assert_eq!(parse("/reset"), Command::Reset);
        assert_eq!(parse("  /RESET@dizzybot "), Command::Reset);
        assert_eq!(parse("/context be brief"), Command::SetContext("be brief"));
        assert_eq!(
            parse("/context@dizzybot   talk like a cat "),
            Command::SetContext("talk like a cat")
        );
        assert_eq!(parse("/context"), Command::MissingContext);
        assert_eq!(parse("/start"), Command::Unknown("start"));
        assert_eq!(parse("hello there"), Command::Chat("hello there"));
    }

    fn open_policy() -> ChatPolicy {
        ChatPolicy {
            allowed_conversations: HashSet::new(),
            refusal_reply: "go away".to_string(),
            fallback_reply: "fallback".to_string(),
        }
    }

    fn client_replying(content: &'static str) -> GenerationClient {
        let mut mock = MockMessageGenerator::new();
        mock.expect_generate_message().returning(move |_| {
            Ok(GenerationResponse {
                candidates: vec![Message::new("bot", content)],
                ..GenerationResponse::default()
            })
        });
        GenerationClient::new(
            ConversationStore::new("default"),
            Arc::new(mock),
            GenerationOptions {
                temperature: 0.5,
                candidate_count: 1,
                examples: Vec::new(),
                window_size: 5,
                history_policy: HistoryPolicy::SlidingWindow,
                summary_instruction: "Summarize the conversation in detail".to_string(),
                summary_failure: SummaryFailure::Truncate,
            },
        )
    }

    #[tokio::test]
    async fn test_execute_context_then_reset() {
        let client = client_replying("ok");

        let reply = execute(&client, &open_policy(), "1", 5, "/context be a poet").await.unwrap();
        assert_eq!(reply, CONTEXT_REPLY);
        assert_eq!(client.conversation("1").await.context, "be a poet");

        let reply = execute(&client, &open_policy(), "1", 5, "/reset").await.unwrap();
        assert_eq!(reply, RESET_REPLY);
        assert_eq!(client.conversation("1").await.context, "default");
    }

    #[tokio::test]
    async fn test_execute_substitutes_fallback_for_empty_reply() {
        let client = client_replying("   ");

        let reply = execute(&client, &open_policy(), "1", 5, "hi").await.unwrap();

        assert_eq!(reply, "fallback");
    }

    #[tokio::test]
    async fn test_execute_unknown_command_skips_model() {
        let client = client_replying("unused");

        let reply = execute(&client, &open_policy(), "1", 5, "/dance").await.unwrap();

        assert_eq!(reply, UNKNOWN_REPLY);
        assert!(client.conversation("1").await.messages.is_empty());
    }

    #[tokio::test]
    async fn test_execute_refuses_chats_outside_allow_list() {
        let mut mock = MockMessageGenerator::new();
        mock.expect_generate_message().never();
        let client = GenerationClient::new(
            ConversationStore::new("default"),
            Arc::new(mock),
            GenerationOptions {
                temperature: 0.5,
                candidate_count: 1,
                examples: Vec::new(),
                window_size: 5,
                history_policy: HistoryPolicy::SlidingWindow,
                summary_instruction: "Summarize the conversation in detail".to_string(),
                summary_failure: SummaryFailure::Truncate,
            },
        );
        let policy = ChatPolicy {
            allowed_conversations: HashSet::from(["-1001905601063".to_string()]),
            ..open_policy()
        };

        for text in ["hello", "/reset", "/context be rude"] {
            let reply = execute(&client, &policy, "12345", 5, text).await.unwrap();
            assert_eq!(reply, "go away");
        }
        assert_eq!(client.conversation("12345").await.context, "default");
    }

    #[test]
    fn test_policy_from_config() {
        let mut config = ConversationConfig::default();
        assert!(ChatPolicy::from_config(&config).is_allowed("anyone"));

        config.allowed_conversations = vec!["-1001905601063".to_string()];
        let policy = ChatPolicy::from_config(&config);
        assert!(policy.is_allowed("-1001905601063"));
        assert!(!policy.is_allowed("42"));
        assert_eq!(policy.refusal_reply, config.refusal_reply);
    }
}
