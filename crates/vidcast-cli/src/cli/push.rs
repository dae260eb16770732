use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Result};
use clap::Parser;
use uuid::Uuid;

use vidcast_core::helpers::url::StreamUrls;
use vidcast_core::StreamTarget;
use vidcast_media::{SessionEvent, SessionRegistry};

use crate::cli::probe::admit_all;
use crate::console;
use crate::report::ProgressBoard;

const PROGRESS_EVERY: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
pub struct PushCommand {
    /// Files to push, one session each
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Streaming server address used in generated sink URLs
    #[arg(long, env = "VIDCAST_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Streaming server port used in generated sink URLs
    #[arg(long, env = "VIDCAST_PORT", default_value_t = 8554)]
    pub port: u16,

    /// Path segment before the stream number
    #[arg(long, default_value = "stream")]
    pub path_prefix: String,

    /// Explicit sink URL (single file only)
    #[arg(long)]
    pub url: Option<String>,

    /// Times each file is replayed
    #[arg(long, default_value_t = 1_000_000)]
    pub loops: u32,

    /// Files admitted concurrently
    #[arg(short, long, default_value_t = 4)]
    pub jobs: usize,

    /// Run without the stdin console; exit once every session has ended
    #[arg(long)]
    pub no_console: bool,
}

impl PushCommand {
    pub fn run(self) -> Result<()> {
        if self.url.is_some() && self.files.len() != 1 {
            bail!("--url can only be used with a single file");
        }

        let urls     = StreamUrls::new(&self.host, self.port, &self.path_prefix);
        let registry = SessionRegistry::new();
        let mut board = ProgressBoard::new(PROGRESS_EVERY);

        for (path, verdict) in admit_all(&self.files, self.jobs) {
            let desc = match verdict {
                Ok(desc) => desc,
                Err(e) => {
                    println!("skipped: {e}");
                    continue;
                }
            };
            let url = self.url.clone().unwrap_or_else(|| urls.next_url());
            let target = StreamTarget::new(&url, &path).with_loops(self.loops);
            let id = registry.spawn(target)?;
            board.set_duration(id, desc.duration_seconds);
            println!("[{}] {url}  <- {}", registry.len(), path.display());
        }

        if registry.is_empty() {
            bail!("no file could be admitted");
        }

        if self.no_console {
            watch_until_finished(&registry, &mut board);
            return Ok(());
        }

        println!("{}", console::HELP);
        let done = AtomicBool::new(false);
        thread::scope(|s| {
            s.spawn(|| watch(&registry, &mut board, &done));
            let result = console::run(&registry, io::stdin().lock(), &mut io::stdout());
            done.store(true, Ordering::Release);
            result
        })
    }
}

fn label(registry: &SessionRegistry, id: Uuid) -> String {
    match registry.ids().iter().position(|x| *x == id) {
        Some(i) => format!("[{}]", i + 1),
        None    => "[-]".into(),
    }
}

fn event_id(event: &SessionEvent) -> Uuid {
    match event {
        SessionEvent::Progress { id, .. } | SessionEvent::Finished { id, .. } => *id,
    }
}

/// Print progress until `done` is set.
fn watch(registry: &SessionRegistry, board: &mut ProgressBoard, done: &AtomicBool) {
    while !done.load(Ordering::Acquire) {
        let Ok(event) = registry.rx.recv_timeout(Duration::from_millis(200)) else { continue };
        if let Some(line) = board.line(&label(registry, event_id(&event)), &event, Instant::now()) {
            println!("{line}");
        }
    }
}

/// How often the watcher reconciles with session state, whatever the event flow.
const STATE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

/// Print progress until every session has reported a final outcome.
fn watch_until_finished(registry: &SessionRegistry, board: &mut ProgressBoard) {
    let mut tracker = FinishTracker::new(Instant::now());
    while !tracker.all_finished(registry) {
        let event = registry.rx.recv_timeout(STATE_CHECK_INTERVAL).ok();
        let now   = Instant::now();
        if let Some(event) = &event {
            let id = event_id(event);
            if let Some(line) = board.line(&label(registry, id), event, now) {
                println!("{line}");
            }
        }
        tracker.observe(registry, event.as_ref(), now);
    }
}

/// Which sessions are done. Finished events can be dropped under backpressure
/// while other sessions keep the channel busy, so registry state is also
/// polled on a clock rather than only when the channel goes quiet.
struct FinishTracker {
    finished:   HashSet<Uuid>,
    last_check: Instant,
}

impl FinishTracker {
    fn new(now: Instant) -> Self {
        Self { finished: HashSet::new(), last_check: now }
    }

    fn observe(&mut self, registry: &SessionRegistry, event: Option<&SessionEvent>, now: Instant) {
        if let Some(SessionEvent::Finished { id, .. }) = event {
            self.finished.insert(*id);
        }
        if event.is_none() || now.duration_since(self.last_check) >= STATE_CHECK_INTERVAL {
            self.last_check = now;
            for id in registry.ids() {
                if matches!(registry.state(id), Ok(vidcast_media::SessionState::Finished(_))) {
                    self.finished.insert(id);
                }
            }
        }
    }

    fn all_finished(&self, registry: &SessionRegistry) -> bool {
        self.finished.len() >= registry.len()
    }
}
