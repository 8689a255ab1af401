//! Voice Courier - hands-free voice messaging
//!
//! A Rust backend implementing a multi-turn voice composition state
//! machine: recordings are transcribed by a speech backend, the recipient
//! and message are tracked across turns, and a spoken confirmation sends
//! the message to the chosen contact.

mod api;
mod classifier;
mod config;
mod dispatcher;
mod recipient;
mod runtime;
mod state_machine;
mod transcription;
mod transport;

use api::{create_router, AppState};
use classifier::UtteranceClassifier;
use config::Config;
use recipient::ContactDirectory;
use runtime::{RuntimeManager, SessionSettings};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transcription::HttpTranscriptionClient;
use transport::ChatHub;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voice_courier=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = Config::from_env()?;

    // Speech backend client
    let transcriber =
        HttpTranscriptionClient::new(&config.transcribe_url, config.transcribe_timeout)?;
    tracing::info!(
        endpoint = %config.transcribe_url,
        timeout_secs = config.transcribe_timeout.as_secs(),
        default_voice = %config.default_voice,
        "Transcription client initialized"
    );

    // Chat transport and session runtimes
    let hub = Arc::new(ChatHub::new(ContactDirectory::new()));
    let classifier = UtteranceClassifier::new(config.short_utterance_max_chars);
    tracing::info!(
        short_utterance_max_chars = classifier.short_utterance_max_chars(),
        "Confirmation classifier configured"
    );

    let runtime = RuntimeManager::new(
        Arc::new(transcriber),
        hub,
        SessionSettings {
            classifier,
            default_voice: config.default_voice,
            buffer: config.session_buffer,
        },
    );

    // Create application state
    let state = AppState::new(runtime);

    // Create router
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Voice courier server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
