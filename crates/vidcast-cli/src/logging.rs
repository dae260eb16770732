// crates/vidcast-cli/src/logging.rs
//
// Subscriber setup for the binary. Library crates only emit events.
//
// Console output goes to stderr so stdout stays clean for command output
// (`probe --json`). With `--log-file` everything goes to that file instead,
// without ANSI colours and with thread names, since push workers log from
// their own threads.

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context as _, Result};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// `RUST_LOG` wins over `level` when set.
pub fn init(level: &str, log_file: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("bad log level {level:?}"))?;

    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("could not create log file {}", path.display()))?;
            let layer = fmt::layer()
                .with_ansi(false)
                .with_thread_names(true)
                .with_writer(Mutex::new(file));
            registry.with(layer).try_init()?;
        }
        None => {
            let layer = fmt::layer()
                .with_target(false)
                .with_writer(io::stderr);
            registry.with(layer).try_init()?;
        }
    }

    tracing::debug!(level, file = ?log_file, "logging initialised");
    Ok(())
}
