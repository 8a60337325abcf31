//! CLI entry point for convai.

mod cli;

use clap::Parser;
use convai::build_info::startup_metadata_line;
use convai::config::load_config;
use convai::gateway::backend_from_config;
use convai::logging::init_tracing;
use convai::session::Session;
use convai::ui::{RenderSink, Renderer, StdinInput};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::debug;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    // Load config.
    let loaded = match load_config(args.config.as_deref()) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };
    let mut config = loaded.config;

    // Apply CLI overrides.
    args.apply_overrides(&mut config);

    init_tracing(&config.logging.level);
    debug!(source = ?loaded.source, "configuration loaded");

    let renderer = Arc::new(Renderer::new(config.display.color));
    for diagnostic in &loaded.diagnostics {
        renderer.warn(diagnostic);
    }

    // Configuration problems are reported before anything touches the model.
    if let Err(e) = config.validate() {
        exit_with_error(renderer.as_ref(), &e.to_string());
    }
    let model_dir = match config.resolve_model_dir() {
        Ok(dir) => dir,
        Err(e) => exit_with_error(renderer.as_ref(), &e.to_string()),
    };
    let backend = match backend_from_config(&config.model) {
        Ok(backend) => backend,
        Err(e) => exit_with_error(renderer.as_ref(), &e.to_string()),
    };
    let step = config.model.step;

    let mut session = match Session::new(config, backend, renderer.clone()) {
        Ok(session) => session,
        Err(e) => exit_with_error(renderer.as_ref(), &e.to_string()),
    };

    renderer.info(&startup_metadata_line());
    renderer.info(&format!("model: {} (checkpoint {step})", model_dir.display()));
    if let Some(paths) = session.paths() {
        renderer.info(&format!("transcript: {}", paths.transcript.display()));
    }

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });
    session.set_cancellation_receiver(Some(cancel_rx));

    let mut input = StdinInput::new();
    let result = session.run(&mut input).await;
    eprintln!();

    // Exit explicitly: a pending stdin read would otherwise hold the runtime open.
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => exit_with_error(renderer.as_ref(), &e.to_string()),
    }
}

fn exit_with_error(renderer: &dyn RenderSink, msg: &str) -> ! {
    renderer.error(msg);
    std::process::exit(1);
}
