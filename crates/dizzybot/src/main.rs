use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use dizzybot::config::Settings;
use dizzybot::handlers::build_router;
use dizzybot::services::conversation::ConversationStore;
use dizzybot::services::{ChatPolicy, Dispatcher, GenerationClient, GenerationOptions, PalmClient};
use dizzybot::state::AppState;
use dizzybot::utils::logger::init_logger;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let settings = Settings::load()?;
    init_logger(&settings.logging)?;

    info!("🚀 Starting DizzyBot...");
    info!(
        model = %settings.llm.model,
        window_size = settings.conversation.window_size,
        "✅ Configuration loaded"
    );

    // Conversation store + generation client
    let store = ConversationStore::new(settings.conversation.default_context.clone());
    if settings.conversation.idle_ttl_seconds > 0 {
        spawn_eviction(
            store.clone(),
            Duration::from_secs(settings.conversation.idle_ttl_seconds),
            Duration::from_secs(settings.conversation.eviction_interval_seconds),
        );
    }
    let generator = Arc::new(PalmClient::new(settings.llm.clone()));
    let client = Arc::new(GenerationClient::new(
        store,
        generator,
        GenerationOptions::from_config(&settings.llm, &settings.conversation),
    ));

    // Worker pool
    let dispatcher = Arc::new(Dispatcher::start(
        client.clone(),
        &settings.dispatcher,
        ChatPolicy::from_config(&settings.conversation),
    ));
    info!("✅ Dispatcher started");

    let app = build_router(AppState::new(client, dispatcher));

    let addr = settings.listen_addr();
    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Periodically drop conversations nobody has touched for `ttl`
fn spawn_eviction(store: ConversationStore, ttl: Duration, period: Duration) {
    info!(
        "🧹 Evicting conversations idle for {}s every {}s",
        ttl.as_secs(),
        period.as_secs()
    );
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            store.evict_idle(ttl);
        }
    });
}
