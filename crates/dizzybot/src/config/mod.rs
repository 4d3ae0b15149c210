pub mod settings;

pub use settings::{
    ConversationConfig, DispatcherConfig, HistoryPolicy, LlmConfig, LogFormat, LoggingConfig,
    OverflowPolicy, ServerConfig, Settings, SummaryFailure,
};
