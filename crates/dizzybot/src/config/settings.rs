use anyhow::{bail, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

use crate::models::chat::Example;

pub const DEFAULT_CONTEXT: &str = "You are a helpful personal assistant: DizzyBot, you are wise, \
you are in a group chat. You will help to answer the members' questions, when you do not know, \
just say you don't know, do not make up your answer, use emoji as much as you can. Make the \
conversation as natural as possible, open and fun. Provide more information, and always think \
twice before you say something.";

pub const DEFAULT_SUMMARY_INSTRUCTION: &str = "Summarize the conversation in detail";

pub const DEFAULT_REFUSAL_REPLY: &str = "To use this bot please contact the bot owner";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
    pub dispatcher: DispatcherConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    pub api_version: String,
    pub model: String,
    pub api_key: String,
    pub temperature: f32,
    pub candidate_count: u32,
    pub timeout_seconds: u64,
    #[serde(default)]
    pub examples: Vec<Example>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_version: "v1beta2".to_string(),
            model: "chat-bison-001".to_string(),
            api_key: String::new(),
            temperature: 0.5,
            candidate_count: 1,
            timeout_seconds: 30,
            examples: Vec::new(),
        }
    }
}

/// How history is bounded once it grows past the window
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HistoryPolicy {
    #[default]
    SlidingWindow,
    Summarize,
}

/// What to do when the summary call itself fails
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SummaryFailure {
    Fail,
    #[default]
    Truncate,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationConfig {
    pub window_size: usize,
    pub default_context: String,
    pub history_policy: HistoryPolicy,
    pub summary_instruction: String,
    pub summary_failure: SummaryFailure,
    pub fallback_reply: String,
    /// Chats the bot answers; empty means every chat
    #[serde(default)]
    pub allowed_conversations: Vec<String>,
    pub refusal_reply: String,
    /// Conversations untouched this long are dropped; 0 keeps them forever
    pub idle_ttl_seconds: u64,
    pub eviction_interval_seconds: u64,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            window_size: 5,
            default_context: DEFAULT_CONTEXT.to_string(),
            history_policy: HistoryPolicy::default(),
            summary_instruction: DEFAULT_SUMMARY_INSTRUCTION.to_string(),
            summary_failure: SummaryFailure::default(),
            fallback_reply: "I have nothing to say 🤐".to_string(),
            allowed_conversations: Vec::new(),
            refusal_reply: DEFAULT_REFUSAL_REPLY.to_string(),
            idle_ttl_seconds: 6 * 60 * 60,
            eviction_interval_seconds: 60,
        }
    }
}

/// Queue overflow behaviour for the worker pool
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    #[default]
    Block,
    Reject,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DispatcherConfig {
    pub worker_count: usize,
    pub queue_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_count: 100,
            queue_capacity: 1000,
            overflow: OverflowPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// `EnvFilter` directives, overridden by `RUST_LOG`
    pub filter: String,
    pub format: LogFormat,
    pub directory: String,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,dizzybot=debug".to_string(),
            format: LogFormat::default(),
            directory: "logs".to_string(),
            file_prefix: "dizzybot".to_string(),
        }
    }
}

impl Settings {
    /// Load `config/settings.toml` (optional) overlaid with `APP__*` env vars
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let llm = LlmConfig::default();
        let conversation = ConversationConfig::default();
        let dispatcher = DispatcherConfig::default();
        let logging = LoggingConfig::default();

        let config = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080_i64)?
            .set_default("llm.base_url", llm.base_url)?
            .set_default("llm.api_version", llm.api_version)?
            .set_default("llm.model", llm.model)?
            .set_default("llm.api_key", llm.api_key)?
            .set_default("llm.temperature", llm.temperature as f64)?
            .set_default("llm.candidate_count", llm.candidate_count as u64)?
            .set_default("llm.timeout_seconds", llm.timeout_seconds)?
            .set_default("conversation.window_size", conversation.window_size as u64)?
            .set_default("conversation.default_context", conversation.default_context)?
            .set_default("conversation.history_policy", "sliding_window")?
            .set_default("conversation.summary_instruction", conversation.summary_instruction)?
            .set_default("conversation.summary_failure", "truncate")?
            .set_default("conversation.fallback_reply", conversation.fallback_reply)?
            .set_default("conversation.refusal_reply", conversation.refusal_reply)?
            .set_default("conversation.idle_ttl_seconds", conversation.idle_ttl_seconds)?
            .set_default(
                "conversation.eviction_interval_seconds",
                conversation.eviction_interval_seconds,
            )?
            .set_default("dispatcher.worker_count", dispatcher.worker_count as u64)?
            .set_default("dispatcher.queue_capacity", dispatcher.queue_capacity as u64)?
            .set_default("dispatcher.overflow", "block")?
            .set_default("logging.filter", logging.filter)?
            .set_default("logging.format", "pretty")?
            .set_default("logging.directory", logging.directory)?
            .set_default("logging.file_prefix", logging.file_prefix)?
            .add_source(File::with_name("config/settings").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("conversation.allowed_conversations"),
            )
            .build()?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            bail!("llm.api_key is empty (set APP__LLM__API_KEY)");
        }
        if !(0.0..=1.0).contains(&self.llm.temperature) {
            bail!("llm.temperature must be within [0, 1], got {}", self.llm.temperature);
        }
        if self.llm.candidate_count == 0 {
            bail!("llm.candidate_count must be at least 1");
        }
        if self.conversation.window_size == 0 {
            bail!("conversation.window_size must be at least 1");
        }
        if self.dispatcher.worker_count == 0 || self.dispatcher.queue_capacity == 0 {
            bail!("dispatcher.worker_count and dispatcher.queue_capacity must be positive");
        }
        if self.conversation.idle_ttl_seconds > 0 && self.conversation.eviction_interval_seconds == 0 {
            bail!("conversation.eviction_interval_seconds must be positive when idle_ttl_seconds is set");
        }
        Ok(())
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}
