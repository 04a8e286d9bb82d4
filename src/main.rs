//! Entry point: parses the CLI, wires up logging, and dispatches to the
//! `build` or `serve` subcommand.

use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use audioid::cli::{Cli, Command};
use audioid::index::{build_index, Matcher};
use audioid::server::{router, AppState};
use audioid::{audio_io, snapshot};

const TEMP_AUDIO_DIR: &str = "./temp_audio";

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new("info"))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn run_build(songs_dir: &Path, snapshot_dir: &Path) -> Result<()> {
    let mut tracks = Vec::new();

    let entries = fs::read_dir(songs_dir)
        .with_context(|| format!("reading songs directory {}", songs_dir.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(OsStr::to_str) != Some("wav") {
            continue;
        }
        let label = path
            .file_stem()
            .and_then(OsStr::to_str)
            .unwrap_or("unknown")
            .to_string();

        tracing::info!(track = %label, "ingesting");
        let decoded = audio_io::load_wav_file(&path)
            .with_context(|| format!("decoding {}", path.display()))?;
        tracks.push((label, decoded.samples, decoded.channels, decoded.sample_rate));
    }

    if tracks.is_empty() {
        anyhow::bail!("no .wav files found in {}", songs_dir.display());
    }

    let (index, registry) = build_index(&tracks).context("fingerprinting track batch")?;
    snapshot::save_snapshot(snapshot_dir, &index, &registry)
        .with_context(|| format!("writing snapshot to {}", snapshot_dir.display()))?;

    tracing::info!(
        tracks = registry.len(),
        hashes = index.hash_count(),
        "snapshot written"
    );
    Ok(())
}

async fn run_serve(snapshot_dir: &Path, port: u16) -> Result<()> {
    fs::create_dir_all(TEMP_AUDIO_DIR).context("creating temp_audio directory")?;

    let (index, registry) = snapshot::load_snapshot(snapshot_dir)
        .with_context(|| format!("loading snapshot from {}", snapshot_dir.display()))?;
    tracing::info!(tracks = registry.len(), "snapshot loaded");

    let matcher = Arc::new(Matcher::loaded(index, registry));
    let app = router(AppState { matcher });

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding port {port}"))?;
    tracing::info!(port, "listening");
    axum::serve(listener, app).await.context("server loop failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command.unwrap_or_default() {
        Command::Build {
            songs_dir,
            snapshot_dir,
        } => run_build(&songs_dir, &snapshot_dir),
        Command::Serve { snapshot_dir, port } => run_serve(&snapshot_dir, port).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "fatal error");
            ExitCode::FAILURE
        }
    }
}
