use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::{ConversationConfig, HistoryPolicy, LlmConfig, SummaryFailure};
use crate::models::chat::{Example, Message};
use crate::services::conversation::{ConversationState, ConversationStore};
use crate::services::palm::{GenerationRequest, MessageGenerator, MessagePrompt};
use crate::utils::error::GenerationError;

/// Fixed generation parameters and history bounding policy
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub candidate_count: u32,
    pub examples: Vec<Example>,
    pub window_size: usize,
    pub history_policy: HistoryPolicy,
    pub summary_instruction: String,
    pub summary_failure: SummaryFailure,
}

impl GenerationOptions {
    pub fn from_config(llm: &LlmConfig, conversation: &ConversationConfig) -> Self {
        Self {
            temperature: llm.temperature,
            candidate_count: llm.candidate_count,
            examples: llm.examples.clone(),
            window_size: conversation.window_size.max(1),
            history_policy: conversation.history_policy,
            summary_instruction: conversation.summary_instruction.clone(),
            summary_failure: conversation.summary_failure,
        }
    }
}

/// One LLM round trip per call, committed into the conversation store only
/// once the provider answered successfully.
pub struct GenerationClient {
    store: ConversationStore,
    generator: Arc<dyn MessageGenerator>,
    options: GenerationOptions,
}

impl GenerationClient {
    pub fn new(
        store: ConversationStore,
        generator: Arc<dyn MessageGenerator>,
        options: GenerationOptions,
    ) -> Self {
        info!(
            window_size = options.window_size,
            policy = ?options.history_policy,
            "Generation client ready"
        );
        Self {
            store,
            generator,
            options,
        }
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    /// Generate a reply to `text` and fold the exchange into the history.
    ///
    /// The conversation stays locked for the whole round trip. On any error the
    /// committed history is left exactly as it was.
    #[instrument(skip(self, text), fields(text_len = text.len()))]
    pub async fn generate_text(
        &self,
        conversation_id: &str,
        author_id: i64,
        text: &str,
    ) -> Result<String, GenerationError> {
        let start = Instant::now();
        let mut state = self.store.lock(conversation_id).await;

        let author = author_id.to_string();
        let working = state.with_pending(Message::new(author.clone(), text));
        let request = self.build_request(&state.context, working);

        let reply = self
            .generator
            .generate_message(&request)
            .await?
            .into_reply()?;

        let mut committed = request.prompt.messages;
        committed.push(reply.clone());

        if committed.len() > self.options.window_size
            && self.options.history_policy == HistoryPolicy::Summarize
        {
            match self.summarize(&state.context, &committed, &author).await {
                Ok(summary) => committed = vec![summary],
                Err(err) if self.options.summary_failure == SummaryFailure::Fail => {
                    warn!(error = %err, "Summary failed, dropping the turn");
                    return Err(err);
                }
                Err(err) => {
                    warn!(error = %err, "Summary failed, falling back to sliding window");
                }
            }
        }

        state.messages = committed;
        let dropped = state.truncate_to(self.options.window_size);
        state.touch();

        debug!(
            history = state.messages.len(),
            dropped,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Reply committed"
        );

        Ok(reply.content)
    }

    /// Ask the model to condense `history` into a single message authored by
    /// `requester`
    async fn summarize(
        &self,
        context: &str,
        history: &[Message],
        requester: &str,
    ) -> Result<Message, GenerationError> {
        debug!(messages = history.len(), "Summarizing conversation");

        let mut working = history.to_vec();
        working.push(Message::new(requester, self.options.summary_instruction.as_str()));
        let request = self.build_request(context, working);

        let summary = self
            .generator
            .generate_message(&request)
            .await?
            .into_reply()?;

        Ok(Message::new(requester, summary.content))
    }

    fn build_request(&self, context: &str, messages: Vec<Message>) -> GenerationRequest {
        GenerationRequest {
            prompt: MessagePrompt {
                context: context.to_string(),
                messages,
                examples: self.options.examples.clone(),
            },
            temperature: self.options.temperature,
            candidate_count: self.options.candidate_count,
        }
    }

    pub async fn reset_conversation(&self, conversation_id: &str) {
        self.store.reset(conversation_id).await;
        info!(conversation_id, "Conversation reset");
    }

    pub async fn set_context(&self, conversation_id: &str, context: &str) {
        self.store.set_context(conversation_id, context).await;
        info!(conversation_id, context_len = context.len(), "Context set");
    }

    /// Snapshot of a conversation
    pub async fn conversation(&self, conversation_id: &str) -> ConversationState {
        self.store.get_or_create(conversation_id).await
    }
}
