use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Offline tooling for SnapBatch snapshot directories
#[derive(Parser, Debug)]
#[command(name = "snapbatch", version, about = "SnapBatch snapshot tooling")]
pub struct Cli {
    #[command(subcommand)]
    pub cmd: Cmd,
}

#[derive(Subcommand, Debug)]
pub enum Cmd {
    /// List record identities per snapshot file in a directory
    List {
        #[arg(long)]
        dir: PathBuf,
    },
    /// Print the recorded value for one identity
    Show {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long)]
        identity: String,
    },
    /// Parse-check every snapshot file and report
    Doctor {
        #[arg(long)]
        dir: PathBuf,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}
