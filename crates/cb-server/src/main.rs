//! Collection-bot webhook server entry point.
//!
//! Builds the session store, agent and sweeper, serves the webhook, and on
//! Ctrl-C stops accepting requests and cancels the sweeper.

use cb_agent::{OpenAiChatModel, ToolCallingAgent, ToolRegistry};
use cb_server::cli::Cli;
use cb_server::state::AppState;
use cb_session::{SessionStore, Sweeper, SweeperConfig};
use clap::Parser;
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cb_server::telemetry::init_tracing(cli.verbose);
    let config = cli.into_config()?;

    tracing::info!("Application starting; initializing services");

    let store = Arc::new(SessionStore::from_config(&config.session));
    let model = Arc::new(OpenAiChatModel::from_config(&config.agent)?);
    let agent = Arc::new(
        ToolCallingAgent::new(model, ToolRegistry::with_defaults())
            .with_max_iterations(config.agent.max_iterations),
    );
    let sweeper = Sweeper::spawn(Arc::clone(&store), SweeperConfig::from(&config.session));

    let app = cb_server::app_with_state(AppState::new(store, agent));
    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    tracing::info!(addr = %listener.local_addr()?, model = %config.agent.model, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.shutdown().await;
    tracing::info!("Application stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Could not listen for Ctrl-C; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}
