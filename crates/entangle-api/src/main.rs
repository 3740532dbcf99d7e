//! Entangle CLI and REST API entry point.
//!
//! Binary name: `entangle`
//!
//! Parses CLI arguments, opens storage and the completion provider, then
//! dispatches to the command handler or starts the REST API server.

mod cli;
mod http;
mod state;

use anyhow::Context;
use clap::Parser;

use cli::{Cli, Commands};
use entangle_observe::tracing_setup::{TracingOptions, init_tracing, shutdown_tracing};
use entangle_types::turn::TurnInput;
use state::{AppState, Storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let options = TracingOptions {
        default_filter: TracingOptions::filter_for_verbosity(cli.verbose, cli.quiet).to_string(),
        json: cli.json,
        otel: cli.otel,
    };
    init_tracing(&options).map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { chat_id } => {
            // Reading needs no provider credentials
            let storage = Storage::open().await?;
            let result = cli::chat::show_transcript(&storage, &chat_id, cli.json).await;
            storage.db_pool.close().await;
            result?;
        }

        Commands::Send {
            chat_id,
            sender_id,
            content,
        } => {
            let state = AppState::init().await?;
            let input = TurnInput::new(chat_id, sender_id, content);
            let result = cli::chat::send_turn(&state, input, cli.json).await;
            state.db_pool.close().await;
            result?;
        }

        Commands::Serve { port, host } => {
            let state = AppState::init().await?;
            let host = host.unwrap_or_else(|| state.config.server.host.clone());
            let port = port.unwrap_or(state.config.server.port);

            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr)
                .await
                .with_context(|| format!("binding {addr}"))?;

            if !cli.quiet {
                println!(
                    "  {} Entangle API listening on {}",
                    console::style("⚡").bold(),
                    console::style(format!("http://{addr}")).cyan()
                );
                println!("  {}", console::style("Press Ctrl+C to stop").dim());
            }
            tracing::info!(
                %addr,
                model = %state.config.completion.model,
                auth = state.auth.is_enabled(),
                "server started"
            );

            let db_pool = state.db_pool.clone();
            let router = http::router::build_router(state);

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            db_pool.close().await;
            if !cli.quiet {
                println!("\n  Server stopped.");
            }
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
