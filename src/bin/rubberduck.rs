//! Droid binary: constructs every collaborator explicitly and hands them
//! to the supervisor. Nothing happens at import time; a missing required
//! credential fails here, before any hardware is touched.

use rubberduck::agent::capability::Capability;
use rubberduck::agent::memory::{FileMemoryBackend, MemoryCapability};
use rubberduck::agent::search::WebSearchCapability;
use rubberduck::agent::service::HttpAgentService;
use rubberduck::agent::AgentGateway;
use rubberduck::audio::MicArbiter;
use rubberduck::display::{ConsoleFace, ConsoleStatus, SharedDisplay};
use rubberduck::speech::service::HttpSpeechService;
use rubberduck::speech::SpeechIo;
use rubberduck::wake::spotter::KeywordSpotter;
use rubberduck::wake::WakeListener;
use rubberduck::{Credentials, DroidConfig, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("rubberduck droid starting");

    let config_path = std::env::var("RUBBERDUCK_CONFIG").ok().map(PathBuf::from);
    let config = DroidConfig::load(config_path.as_deref())?;
    let credentials = Credentials::from_env()?;

    // Shared pieces.
    let arbiter = MicArbiter::new();
    let display = SharedDisplay::new();
    let face = Arc::new(ConsoleFace);
    let status = Arc::new(ConsoleStatus);

    // Wake listening.
    let spotter = KeywordSpotter::new(&config.wake, config.audio.input_sample_rate)?;
    let wake = WakeListener::new(Box::new(spotter), arbiter.clone(), config.audio.clone());

    // Speech I/O.
    let speech_service = Arc::new(HttpSpeechService::new(
        &config.speech,
        credentials.speech_key.clone(),
        &credentials.speech_region,
    ));
    let speech = Arc::new(SpeechIo::new(
        speech_service,
        arbiter,
        config.audio.clone(),
        config.speech.clone(),
    ));

    // Reasoning service with its capabilities.
    let memory_backend = Arc::new(FileMemoryBackend::new(
        &config.memory.root_dir,
        &config.agent.user_id,
    ));
    let capabilities: Vec<Arc<dyn Capability>> = vec![
        Arc::new(WebSearchCapability::new(credentials.search_api_key.clone())),
        Arc::new(MemoryCapability::new(memory_backend)),
    ];
    let agent_service = Arc::new(HttpAgentService::new(
        &config.agent,
        credentials.agent_api_key.clone(),
        capabilities,
    )?);
    let gateway = Arc::new(AgentGateway::new(agent_service));

    let supervisor = Supervisor::new(config, wake, speech, gateway, display, face, status);
    supervisor.run().await.map_err(|e| {
        tracing::error!(error = %e, "rubberduck exited with error");
        anyhow::anyhow!("rubberduck failed: {e}")
    })?;

    tracing::info!("rubberduck shut down cleanly");
    Ok(())
}
