//! KeryxFlow entrypoint: load configuration, wire the orchestrator and
//! its ports, and serve the REST/WS surface until a shutdown command or
//! signal arrives.

use clap::Parser;
use keryxflow::api::{self, AppState};
use keryxflow::config::{AdapterMode, Settings};
use keryxflow::engine::{Engine, EngineCommand, SHUTDOWN_DEADLINE};
use keryxflow::llm::UnavailableLlm;
use keryxflow::news::NoNewsFeed;
use keryxflow::notify::TracingSink;
use keryxflow_execution::{ExchangeAdapter, PaperEngine, PaperEngineConfig};
use keryxflow_integration::bus::EventBus;
use keryxflow_risk::guardrails::Guardrails;
use keryxflow_store::Store;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "keryxflow", version, about = "Event-driven cryptocurrency trading engine")]
struct Cli {
    /// Path to a JSON settings file. Falls back to defaults when absent.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for the append-only journal. In-memory (no persistence)
    /// when omitted.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Address to bind the REST/WS surface to.
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Bearer token required on every request. Empty disables auth.
    #[arg(long, default_value = "")]
    auth_token: String,
}

fn load_settings(path: Option<&PathBuf>) -> Settings {
    match path {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(settings) => settings,
                Err(err) => {
                    tracing::warn!(error = %err, path = %path.display(), "failed to parse settings file; using defaults");
                    Settings::default()
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, path = %path.display(), "failed to read settings file; using defaults");
                Settings::default()
            }
        },
        None => Settings::default(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    let guardrails = Guardrails::production();
    let settings = load_settings(cli.config.as_ref()).validated_against(&guardrails);

    let store = match &cli.data_dir {
        Some(dir) => Arc::new(Store::open(dir)?),
        None => Arc::new(Store::in_memory()),
    };

    let bus = EventBus::new();

    if settings.system.mode == AdapterMode::Live {
        return Err("live trading is not wired to a real exchange in this build".into());
    }

    // Paper mode is the only adapter this build ships; the orchestrator's
    // fill bookkeeping and its adapter port are the same instance.
    let paper = Arc::new(PaperEngine::new(PaperEngineConfig::default(), store.clone()));
    let adapter: Arc<dyn ExchangeAdapter> = paper.clone();

    let llm = Arc::new(UnavailableLlm);
    let news = Arc::new(NoNewsFeed);
    let notify = Arc::new(TracingSink);

    let engine = Arc::new(Engine::new(settings, guardrails, store, bus, paper, adapter, llm, news, notify));

    let (command_tx, command_rx) = tokio::sync::mpsc::channel(16);
    let run_handle = tokio::spawn(engine.clone().run(command_rx));

    let app_state = Arc::new(AppState::new(engine, cli.auth_token));
    let router = api::rest::router(app_state);

    let listener = tokio::net::TcpListener::bind(&cli.bind).await?;
    tracing::info!(addr = %cli.bind, "keryxflow listening");

    tokio::select! {
        result = axum::serve(listener, router) => {
            if let Err(err) = result {
                tracing::error!(error = %err, "server exited with error");
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    let _ = command_tx.send(EngineCommand::Shutdown).await;
    let _ = tokio::time::timeout(SHUTDOWN_DEADLINE, run_handle).await;

    Ok(())
}
