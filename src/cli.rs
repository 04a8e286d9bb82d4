//! Command-line surface: `serve` and `build` subcommands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "audioid", version, about = "Audio fingerprint identification service")]
pub struct Cli {
    /// Defaults to `serve` when no subcommand is given.
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Fingerprints every WAV file in a directory and writes a snapshot.
    Build {
        /// Directory of `.wav` tracks, one file per track, labeled by file stem.
        #[arg(long)]
        songs_dir: PathBuf,

        /// Directory the snapshot (`index.bin`, `registry.bin`) is written to.
        #[arg(long, default_value = "./snapshot")]
        snapshot_dir: PathBuf,
    },

    /// Loads a snapshot and serves `/shazam` queries over HTTP.
    Serve {
        /// Directory the snapshot (`index.bin`, `registry.bin`) is read from.
        #[arg(long, default_value = "./snapshot")]
        snapshot_dir: PathBuf,

        /// Port to listen on.
        #[arg(long, default_value_t = 8000)]
        port: u16,
    },
}

impl Default for Command {
    /// Running the binary with no subcommand serves, matching a reverse-proxied
    /// deployment where `audioid` is just started against an existing snapshot.
    fn default() -> Self {
        Command::Serve {
            snapshot_dir: PathBuf::from("./snapshot"),
            port: 8000,
        }
    }
}
