// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Postwerk — watches a download folder for carrier label PDFs and produces
// proof-of-postage sheets, QR pages, packing slips and label sheets.
//
// Entry point. Initialises logging, loads the configuration, attaches the
// console and runs the watch loop until it ends or the operator types `exit`.

mod services;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use postwerk_core::error::{PostwerkError, Result};
use postwerk_document::TemplateWriter;
use postwerk_watch::{Pipeline, Prompter, WatchOutcome, watch};
use tokio::runtime::Handle;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

use services::config_file::{self, ConfigLoad};
use services::{banner, console};

#[derive(Parser, Debug)]
#[command(name = "postwerk", version, about = "Turns carrier label PDFs into shipping paperwork")]
struct Cli {
    /// Configuration file; `.json` is appended when missing.
    #[arg(default_value = "config.json")]
    config: PathBuf,

    /// Write a blank, fillable proof-of-postage template to this path and exit.
    #[arg(long, value_name = "PATH")]
    write_template: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(code) => code,
        Err(PostwerkError::Configuration(err)) => {
            eprintln!("The configuration has {} problem(s):", err.problems.len());
            for problem in &err.problems {
                eprintln!("  - {problem}");
            }
            ExitCode::FAILURE
        }
        Err(err) => {
            error!(error = %err, "Postwerk stopped");
            eprintln!("postwerk: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    if let Some(path) = cli.write_template {
        TemplateWriter::new().write_to_file(&path)?;
        info!(path = %path.display(), "Wrote proof of postage template");
        return Ok(ExitCode::SUCCESS);
    }

    let config_path = config_file::config_path(&cli.config);
    let settings = match config_file::load_settings(&config_path)? {
        ConfigLoad::Loaded(settings) => Arc::new(settings),
        ConfigLoad::CreatedDefault(path) => {
            println!(
                "No configuration found. Defaults were written to {}; edit them and start postwerk again.",
                path.display()
            );
            return Ok(ExitCode::SUCCESS);
        }
    };

    info!("Postwerk starting");
    banner::log(&settings);

    let pipeline = Arc::new(Pipeline::from_settings(Arc::clone(&settings), Handle::current())?);
    let (prompter, exit_requests) = console::attach();
    let prompter: Arc<dyn Prompter> = Arc::new(prompter);

    tokio::select! {
        outcome = watch(settings, pipeline, prompter) => match outcome? {
            WatchOutcome::StoppedAfterFirstRun => Ok(ExitCode::SUCCESS),
            WatchOutcome::WatchEnded => Err(PostwerkError::Watch("watching ended unexpectedly".into())),
        },
        () = exit_requested(exit_requests) => {
            info!("Exit requested");
            Ok(ExitCode::SUCCESS)
        }
    }
}

/// Resolves on `exit`. Closed input (no console attached) never resolves.
async fn exit_requested(mut requests: UnboundedReceiver<()>) {
    if requests.recv().await.is_none() {
        std::future::pending::<()>().await;
    }
}
