use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use clap::Parser;
use tracing::info;

use vidcast_media::frame_queue::POLL_INTERVAL;
use vidcast_media::{DecodeWorker, FrameQueue};

use crate::report::{thumbnail_name, write_png};

#[derive(Parser, Debug)]
pub struct PreviewCommand {
    /// File to decode
    pub file: PathBuf,

    /// Number of frames to write
    #[arg(short = 'n', long, default_value_t = 10)]
    pub frames: usize,

    /// Output directory
    #[arg(short, long, default_value = ".")]
    pub out: PathBuf,
}

impl PreviewCommand {
    pub fn run(self) -> Result<()> {
        std::fs::create_dir_all(&self.out)
            .with_context(|| format!("could not create {}", self.out.display()))?;

        let queue  = Arc::new(FrameQueue::new());
        let mut worker = DecodeWorker::spawn(&self.file, Arc::clone(&queue))
            .context("could not start decode thread")?;

        let mut written = 0;
        while written < self.frames {
            match queue.pop_timeout(POLL_INTERVAL) {
                Some(image) => {
                    let dest = self.out.join(thumbnail_name(&self.file, Some(written)));
                    write_png(&image, &dest)?;
                    written += 1;
                }
                // Producer done and nothing left in flight.
                None if worker.is_finished() && queue.is_empty() => break,
                None => {}
            }
        }
        worker.stop();
        let unused = queue.len();
        queue.clear();

        info!(file = %self.file.display(), written, unused, "preview done");
        println!("{written} frame(s) written to {}", self.out.display());
        Ok(())
    }
}
