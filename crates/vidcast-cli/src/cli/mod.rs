use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod preview;
mod probe;
mod push;

pub use preview::PreviewCommand;
pub use probe::ProbeCommand;
pub use push::PushCommand;

#[derive(Parser, Debug)]
#[command(name = "vidcast")]
#[command(about = "Loop local video files into a streaming server without re-encoding")]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, env = "VIDCAST_LOG", default_value = "info")]
    pub log_level: String,

    /// Write logs to this file instead of stderr
    #[arg(long, global = true, env = "VIDCAST_LOG_FILE")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print stream metadata for one or more files
    Probe(ProbeCommand),
    /// Decode the first frames of a file to PNG images
    Preview(PreviewCommand),
    /// Push files to the streaming server, one session per file
    Push(PushCommand),
}

impl Args {
    pub fn run(self) -> Result<()> {
        match self.command {
            Command::Probe(cmd)   => cmd.run(),
            Command::Preview(cmd) => cmd.run(),
            Command::Push(cmd)    => cmd.run(),
        }
    }
}
