mod commands;
mod config;
mod terminal;

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::Parser;
use client_core::{
    dispatch_intent, run_intent_loop, HttpRagBackend, SessionController, INTENT_QUEUE_CAPACITY,
};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::mpsc,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::{
    commands::{parse_command, Command, HELP},
    config::{load_settings, normalize_backend_url, Overrides},
    terminal::TerminalUi,
};

/// Terminal chat client for a retrieval-augmented generation backend.
#[derive(Parser, Debug)]
#[command(name = "rag_chat", version)]
struct Args {
    /// TOML config file; defaults to ./rag_chat.toml, then the user config dir.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    backend_url: Option<String>,
    /// Stream answers from /query/stream instead of waiting for /query.
    #[arg(long)]
    stream: bool,
    /// Answer without retrieving from uploaded documents.
    #[arg(long)]
    no_rag: bool,
    #[arg(long)]
    max_tokens: Option<u32>,
    #[arg(long)]
    temperature: Option<f32>,
    /// Fallback log filter when RUST_LOG is unset.
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            backend_url: self.backend_url.clone(),
            use_rag: self.no_rag.then_some(false),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            stream: self.stream.then_some(true),
            log_level: self.log_level.clone(),
        }
    }
}

fn init_tracing(default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut settings = load_settings(args.config.as_deref())?;
    settings.apply_overrides(args.overrides());
    let backend_url = normalize_backend_url(&settings.backend_url)?;
    init_tracing(&settings.log_level);

    info!(
        backend_url = %backend_url,
        stream = settings.stream,
        use_rag = settings.use_rag,
        "starting rag chat client"
    );

    let ui = Arc::new(TerminalUi::stdout());
    let backend = Arc::new(HttpRagBackend::new(backend_url));
    let controller = SessionController::new(backend, ui.clone(), settings.controller_settings());
    controller.initialize().await;
    ui.notice("Type a question, or /help for commands.");

    let (intent_tx, intent_rx) = mpsc::channel(INTENT_QUEUE_CAPACITY);
    let intent_loop = tokio::spawn(run_intent_loop(controller, intent_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if ui.answer_confirmation(&line) {
            continue;
        }
        match parse_command(&line) {
            Ok(None) => {}
            Ok(Some(Command::Quit)) => break,
            Ok(Some(Command::Help)) => ui.notice(HELP),
            Ok(Some(Command::Intent(intent))) => {
                if let Some(label) = intent.control().and_then(|c| ui.disabled_label(c)) {
                    ui.notice(&format!("[{label}]"));
                    continue;
                }
                let mut status = String::new();
                dispatch_intent(&intent_tx, intent, &mut status);
                if !status.is_empty() {
                    ui.notice(&status);
                }
            }
            Err(err) => ui.notice(&err.to_string()),
        }
    }

    // Requests still in flight are abandoned on exit.
    drop(intent_tx);
    ui.cancel_confirmation();
    intent_loop.abort();
    if let Err(err) = intent_loop.await {
        debug!(error = %err, "intent loop stopped");
    }
    info!("rag chat client exiting");
    Ok(())
}
