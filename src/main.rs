//! Homebrain console client
//!
//! Talks to the Homebrain chat backend: sends turns, renders streamed or
//! synchronous replies, and lets the user browse and resume past sessions.

mod backend;
mod config;
mod console;
mod directory;
mod runtime;
mod state_machine;
mod stream;

use backend::{HttpBackend, LoggingBackend};
use config::ClientConfig;
use console::{Command, HELP};
use state_machine::{ConvContext, Event};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging; stdout belongs to the conversation
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "homebrain=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false)
                .with_writer(std::io::stderr),
        )
        .init();

    // Configuration
    let config = ClientConfig::from_env()?;
    tracing::info!(api_url = %config.api_url, mode = %config.mode, "Starting Homebrain client");

    let http = HttpBackend::new(&config.api_url);
    match http.health().await {
        Ok(health) if health.is_ok() => {
            tracing::info!(service = %health.service, "Backend is healthy");
        }
        Ok(health) => {
            tracing::warn!(status = %health.status, "Backend reports a degraded status");
        }
        Err(e) => {
            tracing::warn!(error = %e, "Backend health check failed; continuing anyway");
        }
    }

    let backend = Arc::new(LoggingBackend::new(http));
    let (handle, _runtime) = runtime::start(
        ConvContext::new(config.mode),
        backend.clone(),
        backend,
    );

    let view = tokio::spawn(console::run_view(handle.subscribe(), std::io::stdout()));

    println!("{HELP}");
    handle.send(Event::RefreshSessions).await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let Some(command) = Command::parse(&line) else {
            continue;
        };
        match command {
            Command::Quit => break,
            Command::Help => println!("{HELP}"),
            Command::Unknown(input) => println!("! unknown command: {input} (try /help)"),
            command => {
                if let Some(event) = command.into_event() {
                    handle.send(event).await?;
                }
            }
        }
    }

    view.abort();
    Ok(())
}
