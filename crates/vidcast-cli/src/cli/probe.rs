use std::path::{Path, PathBuf};
use std::thread;

use anyhow::{Context as _, Result};
use clap::Parser;
use crossbeam_channel::unbounded;
use tracing::{debug, warn};

use vidcast_core::admission::{check_descriptor, check_extension};
use vidcast_core::MediaDescriptor;

use crate::report::{thumbnail_name, write_png};

#[derive(Parser, Debug)]
pub struct ProbeCommand {
    /// Files to probe
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Print descriptors as JSON
    #[arg(long)]
    pub json: bool,

    /// Save each file's preview frame as PNG into this directory
    #[arg(long)]
    pub thumbnail_dir: Option<PathBuf>,

    /// Files probed concurrently
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,
}

impl ProbeCommand {
    pub fn run(self) -> Result<()> {
        let descriptors = run_parallel(&self.files, self.jobs, vidcast_media::probe);

        if let Some(dir) = &self.thumbnail_dir {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("could not create {}", dir.display()))?;
            for desc in &descriptors {
                let Some(frame) = &desc.preview_frame else { continue };
                let dest = dir.join(thumbnail_name(&desc.source_path, None));
                match write_png(frame, &dest) {
                    Ok(())  => debug!(dest = %dest.display(), "thumbnail written"),
                    Err(e)  => warn!(dest = %dest.display(), "thumbnail failed: {e:#}"),
                }
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&descriptors)?);
            return Ok(());
        }

        for (path, desc) in self.files.iter().zip(&descriptors) {
            if desc.is_usable() {
                println!("{}", desc.summary());
            } else {
                println!("File: {}", path.display());
            }
            let verdict = check_extension(path).and_then(|()| check_descriptor(path, desc));
            match verdict {
                Ok(())  => println!("Streamable: yes\n"),
                Err(e)  => println!("Streamable: no ({e})\n"),
            }
        }
        Ok(())
    }
}

/// Apply `job` to every path on up to `jobs` threads. Results keep input order.
///
/// Probing can read a whole file (duration fallback), so many files are never
/// probed one after another on the caller's thread.
pub fn run_parallel<T, F>(paths: &[PathBuf], jobs: usize, job: F) -> Vec<T>
where
    T: Send,
    F: Fn(&Path) -> T + Sync,
{
    let (work_tx, work_rx) = unbounded::<(usize, &Path)>();
    let (done_tx, done_rx) = unbounded::<(usize, T)>();
    for (i, path) in paths.iter().enumerate() {
        let _ = work_tx.send((i, path.as_path()));
    }
    drop(work_tx);

    let workers = jobs.clamp(1, paths.len().max(1));
    thread::scope(|s| {
        for _ in 0..workers {
            let (work_rx, done_tx, job) = (work_rx.clone(), done_tx.clone(), &job);
            s.spawn(move || {
                for (i, path) in work_rx.iter() {
                    let _ = done_tx.send((i, job(path)));
                }
            });
        }
    });
    drop(done_tx);

    let mut results: Vec<(usize, T)> = done_rx.iter().collect();
    results.sort_by_key(|(i, _)| *i);
    results.into_iter().map(|(_, t)| t).collect()
}

/// Used by `push`: same as `run_parallel(paths, jobs, vidcast_media::admit)`
/// but keeps the path next to each verdict.
pub fn admit_all(
    paths: &[PathBuf],
    jobs:  usize,
) -> Vec<(PathBuf, Result<MediaDescriptor, vidcast_core::AdmitError>)> {
    let verdicts = run_parallel(paths, jobs, vidcast_media::admit);
    paths.iter().cloned().zip(verdicts).collect()
}
