// crates/vidcast-cli/src/console.rs
//
// Line-oriented operator console for `vidcast push`.
//
// Sessions are addressed by a 1-based display ordinal. Ordinals are
// recomputed from the registry's insertion order on every command, so after
// `remove 1` the old session 2 becomes 1; the registry id never changes.
//
// End of input behaves like `quit`: every session is stopped and joined
// before `run` returns.

use std::io::{BufRead, Write};

use anyhow::Result;
use tracing::info;
use uuid::Uuid;

use vidcast_core::helpers::url::with_host;
use vidcast_media::SessionRegistry;

use crate::report::{describe_outcome, describe_state};

pub const HELP: &str = "\
commands:
  list               show sessions
  stop <n>           stop session n
  start <n>          (re)start session n
  remove <n>         stop and forget session n
  host <n> <addr>    point session n at another server address and restart it
  quit               stop everything and exit";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConsoleCommand {
    List,
    Stop(usize),
    Start(usize),
    Remove(usize),
    Host(usize, String),
    Help,
    Quit,
}

/// `Ok(None)` for a blank line.
pub fn parse(line: &str) -> Result<Option<ConsoleCommand>, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else { return Ok(None) };

    let mut ordinal = || -> Result<usize, String> {
        let raw = words.next().ok_or_else(|| format!("{verb}: missing session number"))?;
        match raw.parse::<usize>() {
            Ok(n) if n >= 1 => Ok(n),
            _ => Err(format!("{verb}: bad session number {raw:?}")),
        }
    };

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "list" | "ls"         => ConsoleCommand::List,
        "stop"                => ConsoleCommand::Stop(ordinal()?),
        "start"               => ConsoleCommand::Start(ordinal()?),
        "remove" | "rm"       => ConsoleCommand::Remove(ordinal()?),
        "host" => {
            let n = ordinal()?;
            let addr = words.next().ok_or("host: missing address")?;
            ConsoleCommand::Host(n, addr.to_string())
        }
        "help" | "?"          => ConsoleCommand::Help,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => return Err(format!("unknown command {other:?} (try help)")),
    };
    Ok(Some(cmd))
}

/// Read commands until `quit` or end of input, then stop every session.
pub fn run<R: BufRead, W: Write>(registry: &SessionRegistry, input: R, out: &mut W) -> Result<()> {
    for line in input.lines() {
        let line = line?;
        match parse(&line) {
            Ok(None) => {}
            Ok(Some(ConsoleCommand::Quit)) => break,
            Ok(Some(cmd)) => {
                if let Err(e) = execute(registry, cmd, out) {
                    writeln!(out, "error: {e:#}")?;
                }
            }
            Err(msg) => writeln!(out, "{msg}")?,
        }
    }

    info!(sessions = registry.len(), "stopping all sessions");
    for (n, (_, outcome)) in registry.stop_all().iter().enumerate() {
        if let Some(outcome) = outcome {
            writeln!(out, "[{}] {}", n + 1, describe_outcome(outcome))?;
        }
    }
    Ok(())
}

fn resolve(registry: &SessionRegistry, n: usize) -> Result<Uuid> {
    registry
        .ids()
        .get(n - 1)
        .copied()
        .ok_or_else(|| anyhow::anyhow!("no session {n}"))
}

fn execute<W: Write>(registry: &SessionRegistry, cmd: ConsoleCommand, out: &mut W) -> Result<()> {
    match cmd {
        ConsoleCommand::List => {
            for (i, id) in registry.ids().into_iter().enumerate() {
                let target = registry.target(id)?;
                let state  = registry.state(id)?;
                writeln!(
                    out,
                    "{:>3}  {:<28} {}  <- {}",
                    i + 1,
                    describe_state(&state),
                    target.sink_url,
                    target.source_path.display(),
                )?;
            }
        }
        ConsoleCommand::Stop(n) => {
            let outcome = registry.stop(resolve(registry, n)?)?;
            match outcome {
                Some(o) => writeln!(out, "[{n}] {}", describe_outcome(&o))?,
                None    => writeln!(out, "[{n}] was not started")?,
            }
        }
        ConsoleCommand::Start(n) => {
            registry.restart(resolve(registry, n)?)?;
            writeln!(out, "[{n}] started")?;
        }
        ConsoleCommand::Remove(n) => {
            registry.remove(resolve(registry, n)?)?;
            writeln!(out, "[{n}] removed")?;
        }
        ConsoleCommand::Host(n, addr) => {
            let id = resolve(registry, n)?;
            let mut target = registry.target(id)?;
            target.sink_url = with_host(&target.sink_url, &addr)?;
            writeln!(out, "[{n}] -> {}", target.sink_url)?;
            registry.start(id, target)?;
        }
        ConsoleCommand::Help => writeln!(out, "{HELP}")?,
        ConsoleCommand::Quit => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use vidcast_core::{PushOutcome, StreamTarget};
    use vidcast_media::registry::Runner;

    fn idle_runner() -> Runner {
        Arc::new(|_: &StreamTarget, stop: &AtomicBool| {
            while !stop.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(2));
            }
            PushOutcome::Stopped { frames: 0 }
        })
    }

    fn registry_with(n: usize) -> SessionRegistry {
        let reg = SessionRegistry::with_runner(idle_runner());
        for i in 1..=n {
            reg.spawn(StreamTarget::new(format!("rtsp://127.0.0.1:8554/stream/{i}"), format!("{i}.ts")))
                .unwrap();
        }
        reg
    }

    fn run_script(reg: &SessionRegistry, script: &str) -> String {
        let mut out = Vec::new();
        run(reg, Cursor::new(script.to_string()), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse("  "), Ok(None));
        assert_eq!(parse("list"), Ok(Some(ConsoleCommand::List)));
        assert_eq!(parse("STOP 2"), Ok(Some(ConsoleCommand::Stop(2))));
        assert_eq!(parse("rm 1"), Ok(Some(ConsoleCommand::Remove(1))));
        assert_eq!(
            parse("host 3 10.0.0.5"),
            Ok(Some(ConsoleCommand::Host(3, "10.0.0.5".into())))
        );
        assert_eq!(parse("q"), Ok(Some(ConsoleCommand::Quit)));
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(parse("stop").is_err());
        assert!(parse("stop 0").is_err());
        assert!(parse("start two").is_err());
        assert!(parse("host 1").is_err());
        assert!(parse("dance").is_err());
    }

    #[test]
    fn end_of_input_stops_everything() {
        let reg = registry_with(2);
        let out = run_script(&reg, "list\n");
        assert!(out.contains("  1  running"));
        assert!(out.contains("rtsp://127.0.0.1:8554/stream/2"));
        for id in reg.ids() {
            assert!(!matches!(reg.state(id).unwrap(), vidcast_media::SessionState::Running));
        }
    }

    #[test]
    fn remove_renumbers_display_ordinals() {
        let reg = registry_with(3);
        let survivors = reg.ids()[1..].to_vec();
        let out = run_script(&reg, "remove 1\nlist\nquit\n");
        assert!(out.contains("[1] removed"));
        assert_eq!(reg.ids(), survivors);
        // Old session 2 is now listed first.
        assert!(out
            .lines()
            .any(|l| l.starts_with("  1  running") && l.contains("/stream/2")));
    }

    #[test]
    fn stop_then_start_restarts() {
        let reg = registry_with(1);
        let out = run_script(&reg, "stop 1\nstart 1\nlist\n");
        assert!(out.contains("[1] stopped (0 frames)"));
        assert!(out.contains("[1] started"));
        assert!(out.contains("  1  running"));
    }

    #[test]
    fn host_repoints_session() {
        let reg = registry_with(1);
        let out = run_script(&reg, "host 1 192.168.1.20\n");
        assert!(out.contains("[1] -> rtsp://192.168.1.20:8554/stream/1"));
        let id = reg.ids()[0];
        assert_eq!(reg.target(id).unwrap().sink_url, "rtsp://192.168.1.20:8554/stream/1");
    }

    #[test]
    fn unknown_session_reports_error_and_continues() {
        let reg = registry_with(1);
        let out = run_script(&reg, "stop 9\nlist\n");
        assert!(out.contains("error: no session 9"));
        assert!(out.contains("  1  running"));
    }
}
