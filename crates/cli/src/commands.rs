//! Subcommand implementations.
//!
//! Each command writes its report to the supplied writer (stdout in the
//! binary) and leaves diagnostics to `tracing`.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::{Args, Subcommand};
use sequencer::{
    read_visit_flag, reset_visit_flag, Route, Sequencer, SequencerSettings, StorageKey,
    TimerKind, Transition, Trigger, VisitStore,
};
use storage::{FileStore, MemoryStore};
use timers::{
    HostInput, MemorySurface, RealtimeDriver, RecordingHooks, Scenario, Simulation,
    SimulationReport, StopCondition, StopReason, TimerQueue,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

/// What to do.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Replay a page load on a virtual clock and print the transitions.
    Simulate(SimulateArgs),
    /// Drive a page load in real time; every line on stdin is a click.
    Run(RunArgs),
    /// Show whether the visit flag is set.
    Status,
    /// Clear the visit flag so the next entry-page load shows the overlay.
    Reset,
}

#[derive(Debug, Args)]
pub struct SimulateArgs {
    /// Path or URL of the page being loaded.
    #[arg(default_value = "/")]
    pub route: String,

    /// Click the overlay this many milliseconds after load. Repeatable.
    #[arg(long = "click-at", value_name = "MS")]
    pub click_at: Vec<u64>,

    /// How long to keep the virtual clock running, in milliseconds.
    #[arg(long, value_name = "MS", default_value_t = 30_000)]
    pub horizon: u64,

    /// Use a throwaway in-memory store instead of the configured file.
    #[arg(long)]
    pub ephemeral: bool,

    /// Simulate a page without the animation hooks.
    #[arg(long)]
    pub no_hooks: bool,

    /// Print the journal as JSON lines.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path or URL of the page being loaded.
    #[arg(default_value = "/")]
    pub route: String,

    /// Keep running until the fallback timer has fired as well.
    #[arg(long)]
    pub drain: bool,

    /// Run without the animation hooks.
    #[arg(long)]
    pub no_hooks: bool,

    /// Print the journal as JSON lines.
    #[arg(long)]
    pub json: bool,
}

/// Resolved inputs shared by every command.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub settings: SequencerSettings,
    pub store_path: PathBuf,
}

fn hooks(disabled: bool) -> RecordingHooks {
    if disabled {
        RecordingHooks::absent()
    } else {
        RecordingHooks::present()
    }
}

fn open_store(path: &Path) -> anyhow::Result<FileStore> {
    FileStore::open(path).with_context(|| format!("failed to open store {}", path.display()))
}

// ---------------------------------------------------------------------------
// simulate
// ---------------------------------------------------------------------------

pub fn simulate(ctx: &Resolved, args: &SimulateArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let route = Route::parse(&args.route)?;
    let scenario = args
        .click_at
        .iter()
        .fold(Scenario::new(route), |s, ms| s.click_at(Duration::from_millis(*ms)))
        .horizon(Duration::from_millis(args.horizon));

    info!(route = %scenario.route, clicks = scenario.clicks.len(), "simulating page load");
    let report = if args.ephemeral {
        run_scenario(MemoryStore::new(), ctx, &scenario, args.no_hooks)
    } else {
        run_scenario(open_store(&ctx.store_path)?, ctx, &scenario, args.no_hooks)
    };

    if args.json {
        write_json_lines(out, &report.journal)?;
    } else {
        write!(out, "{}", render_journal(&report.journal))?;
        writeln!(out, "{}", render_summary(&report))?;
    }
    Ok(())
}

fn run_scenario<S: VisitStore>(
    store: S,
    ctx: &Resolved,
    scenario: &Scenario,
    no_hooks: bool,
) -> SimulationReport {
    Simulation::new(store, ctx.settings.clone(), hooks(no_hooks)).run(scenario)
}

// ---------------------------------------------------------------------------
// run
// ---------------------------------------------------------------------------

pub async fn run(ctx: &Resolved, args: &RunArgs, out: &mut dyn Write) -> anyhow::Result<()> {
    let (tx, rx) = mpsc::channel(16);
    spawn_stdin_reader(tx.clone()).context("failed to start stdin reader")?;
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = tx.send(HostInput::Shutdown).await;
        }
    });

    let result = drive(ctx, args, rx, out).await;
    interrupt.abort();
    result
}

/// Runs one page load fed by `inputs` and prints its journal. Returns as
/// soon as the stop condition is met, whether or not `inputs` is still open.
async fn drive(
    ctx: &Resolved,
    args: &RunArgs,
    inputs: mpsc::Receiver<HostInput>,
    out: &mut dyn Write,
) -> anyhow::Result<()> {
    let route = Route::parse(&args.route)?;
    let store = open_store(&ctx.store_path)?;
    let surface = MemorySurface::with_contract(&ctx.settings.dom);
    let sequencer = Sequencer::new(store, surface, TimerQueue::new())
        .with_hooks(hooks(args.no_hooks))
        .with_settings(ctx.settings.clone());

    let stop = if args.drain {
        StopCondition::TimersDrained
    } else {
        StopCondition::OverlayHidden
    };
    let mut driver = RealtimeDriver::new(sequencer).stop_when(stop);

    match driver.run(&route, inputs).await {
        StopReason::Shutdown => warn!("interrupted before the overlay finished"),
        other => info!(?other, "run finished"),
    }

    let journal = driver.sequencer().journal();
    if args.json {
        write_json_lines(out, journal)?;
    } else {
        write!(out, "{}", render_journal(journal))?;
    }
    Ok(())
}

/// Forwards every stdin line as a click.
///
/// A blocking read cannot be cancelled, so it runs on a detached thread
/// that the process does not wait for on exit.
fn spawn_stdin_reader(tx: mpsc::Sender<HostInput>) -> std::io::Result<()> {
    std::thread::Builder::new()
        .name("curtain-stdin".to_string())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                if let Err(e) = line {
                    warn!(error = %e, "stdin closed");
                    return;
                }
                if tx.blocking_send(HostInput::Click).is_err() {
                    return;
                }
            }
        })?;
    Ok(())
}

// ---------------------------------------------------------------------------
// status / reset
// ---------------------------------------------------------------------------

pub fn status(ctx: &Resolved, out: &mut dyn Write) -> anyhow::Result<()> {
    let store = open_store(&ctx.store_path)?;
    let key = &ctx.settings.visit_key;
    let visited = read_visit_flag(&store, key)?;
    writeln!(out, "{}", describe_flag(&store, key, visited))?;
    Ok(())
}

fn describe_flag(store: &FileStore, key: &StorageKey, visited: bool) -> String {
    match store.entry(key) {
        Some(entry) if visited => format!("{key}: visited (since {})", entry.updated_at),
        Some(entry) => format!(
            "{key}: not visited (unexpected value {:?} at {})",
            entry.value, entry.updated_at
        ),
        None => format!("{key}: not visited"),
    }
}

pub fn reset(ctx: &Resolved, out: &mut dyn Write) -> anyhow::Result<()> {
    let mut store = open_store(&ctx.store_path)?;
    reset_visit_flag(&mut store, &ctx.settings.visit_key)?;
    writeln!(out, "{}: cleared", ctx.settings.visit_key)?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

fn trigger_label(trigger: Trigger) -> String {
    match trigger {
        Trigger::Initialize => "initialize".to_string(),
        Trigger::Click => "click".to_string(),
        Trigger::Host => "host".to_string(),
        Trigger::Timer(kind) => {
            let name = match kind {
                TimerKind::AutoStart => "auto_start",
                TimerKind::Fallback => "fallback",
                TimerKind::Emphasis => "emphasis",
                TimerKind::ContentReveal => "content_reveal",
                TimerKind::OverlayRemoval => "overlay_removal",
            };
            format!("timer:{name}")
        }
    }
}

/// Fixed-width table, one row per transition.
fn render_journal(journal: &[Transition]) -> String {
    let mut table = format!("{:>8}  {:<10} {:<10} {}\n", "AT_MS", "FROM", "TO", "TRIGGER");
    for t in journal {
        let from = t.from.map_or_else(|| "-".to_string(), |s| s.to_string());
        table.push_str(&format!(
            "{:>8}  {:<10} {:<10} {}\n",
            t.at.as_millis(),
            from,
            t.to.to_string(),
            trigger_label(t.trigger)
        ));
    }
    table
}

fn render_summary(report: &SimulationReport) -> String {
    let state = report
        .final_state
        .map_or_else(|| "none".to_string(), |s| s.to_string());
    format!(
        "outcome={} final={} content_revealed={} pending_timers={}",
        serde_json::to_value(report.outcome)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default(),
        state,
        report.content_revealed,
        report.pending_timers
    )
}

fn write_json_lines(out: &mut dyn Write, journal: &[Transition]) -> anyhow::Result<()> {
    for t in journal {
        writeln!(out, "{}", serde_json::to_string(t)?)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ctx(dir: &tempfile::TempDir) -> Resolved {
        Resolved {
            settings: SequencerSettings::default(),
            store_path: dir.path().join("store.json"),
        }
    }

    fn simulate_args(route: &str) -> SimulateArgs {
        SimulateArgs {
            route: route.to_string(),
            click_at: Vec::new(),
            horizon: 30_000,
            ephemeral: false,
            no_hooks: false,
            json: false,
        }
    }

    fn output(f: impl FnOnce(&mut dyn Write) -> anyhow::Result<()>) -> String {
        let mut buf = Vec::new();
        f(&mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn simulate_prints_the_auto_start_table() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(&dir);

        let text = output(|out| simulate(&ctx, &simulate_args("/"), out));

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "   AT_MS  FROM       TO         TRIGGER",
                "       0  -          shown      initialize",
                "   20000  shown      exploding  timer:auto_start",
                "   20800  exploding  revealed   timer:content_reveal",
                "   21900  revealed   hidden     timer:overlay_removal",
                "outcome=shown final=hidden content_revealed=true pending_timers=0",
            ]
        );
    }

    #[test]
    fn second_simulation_on_the_same_store_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(&dir);
        output(|out| simulate(&ctx, &simulate_args("https://example.com/index.html"), out));

        let text = output(|out| simulate(&ctx, &simulate_args("/"), out));

        assert!(text.ends_with("outcome=skipped final=hidden content_revealed=true pending_timers=0\n"));
    }

    #[test]
    fn ephemeral_simulation_leaves_no_store() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(&dir);
        let args = SimulateArgs {
            ephemeral: true,
            json: true,
            click_at: vec![1_000],
            ..simulate_args("/")
        };

        let text = output(|out| simulate(&ctx, &args, out));

        assert!(!ctx.store_path.exists());
        let first: serde_json::Value = serde_json::from_str(text.lines().nth(1).unwrap()).unwrap();
        assert_eq!(first["to"], "exploding");
        assert_eq!(first["at"], 1_000);
    }

    #[test]
    fn malformed_route_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(&dir);
        let mut sink = Vec::new();

        assert!(simulate(&ctx, &simulate_args("/about me.html"), &mut sink).is_err());
    }

    #[test]
    fn status_and_reset_follow_the_flag() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(&dir);

        assert_eq!(output(|out| status(&ctx, out)), "hasVisitedHome: not visited\n");

        output(|out| simulate(&ctx, &simulate_args("/"), out));
        assert!(output(|out| status(&ctx, out)).starts_with("hasVisitedHome: visited (since "));

        assert_eq!(output(|out| reset(&ctx, out)), "hasVisitedHome: cleared\n");
        assert_eq!(output(|out| status(&ctx, out)), "hasVisitedHome: not visited\n");
    }

    #[test]
    fn unexpected_flag_values_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(&dir);
        let mut store = FileStore::open(&ctx.store_path).unwrap();
        store.set(&ctx.settings.visit_key, "yes").unwrap();

        let text = output(|out| status(&ctx, out));

        assert!(text.contains("not visited (unexpected value \"yes\""), "got {text}");
    }

    fn run_args() -> RunArgs {
        RunArgs {
            route: "/".to_string(),
            drain: false,
            no_hooks: false,
            json: false,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_returns_while_input_stays_open() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(&dir);
        let (tx, rx) = mpsc::channel(1);
        let mut buf = Vec::new();

        drive(&ctx, &run_args(), rx, &mut buf).await.unwrap();

        assert!(!tx.is_closed(), "input channel still open");
        let text = String::from_utf8(buf).unwrap();
        assert!(text.ends_with("   21900  revealed   hidden     timer:overlay_removal\n"), "got {text}");
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ctx(&dir);
        let (tx, rx) = mpsc::channel(1);
        tx.send(HostInput::Shutdown).await.unwrap();
        let mut buf = Vec::new();

        drive(&ctx, &RunArgs { json: true, ..run_args() }, rx, &mut buf)
            .await
            .unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text.lines().count(), 1, "only the initial state: {text}");
    }

    #[test]
    fn trigger_labels_name_the_timer() {
        assert_eq!(trigger_label(Trigger::Timer(TimerKind::Fallback)), "timer:fallback");
        assert_eq!(trigger_label(Trigger::Click), "click");
    }
}
