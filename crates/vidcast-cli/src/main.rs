// crates/vidcast-cli/src/main.rs
//
// `vidcast` binary. Stands in for the operator UI: probe files, dump preview
// frames, and push files to a streaming server with a small stdin console.

use anyhow::Result;
use clap::Parser;
use mimalloc::MiMalloc;

mod cli;
mod console;
mod logging;
mod report;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    logging::init(&args.log_level, args.log_file.as_deref())?;
    vidcast_media::init()?;
    args.run()
}
