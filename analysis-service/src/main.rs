use adapters::{
    HttpSpeechSynthesizer, HttpTextGenerator, InMemorySessionStore, PlainTextExtractor
};
use analysis_service::{AgentCollaborators, AppState, router};
use cg_core::TextToSpeech;
use config::Config;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(None)?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.observability.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting contract analysis service");

    if config.upstream.api_key.is_none() {
        warn!("No upstream API key configured; analysis calls will be rejected");
    }

    let synthesizer = HttpSpeechSynthesizer::new(&config.voice)?;
    let text_to_speech: Option<Arc<dyn TextToSpeech>> = if synthesizer.is_configured() {
        Some(Arc::new(synthesizer))
    } else {
        info!("Text-to-speech not configured, /chat/voice replies are text only");
        None
    };

    let collaborators = AgentCollaborators {
        generator: Arc::new(HttpTextGenerator::new(&config.upstream)?),
        sessions: Arc::new(InMemorySessionStore::from_config(&config.conversation)),
        // No transcription backend ships; /chat/voice takes text.
        speech_to_text: None,
        text_to_speech
    };
    let extractor = Arc::new(PlainTextExtractor::from_config(&config.pipeline));

    let state = AppState::new(&config, collaborators, extractor);
    let app = router(state);

    let addr = format!("{}:{}", config.server.bind_address, config.server.port);
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
