//! buildmux entrypoint: runs simulated build actions under a live console.
use anyhow::Result;
use clap::Parser;
use core_config::load_from;
use core_console::{Color, Console, ConsoleConfig, status};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Once;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

const LOG_FILE: &str = "buildmux.log";
const STEP_DELAY: Duration = Duration::from_millis(60);

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "buildmux", version, about = "Concurrent build output multiplexer")]
struct Args {
    /// Worker threads running actions concurrently.
    #[arg(long, default_value_t = 4)]
    jobs: usize,
    /// Simulated build actions to run.
    #[arg(long, default_value_t = 16)]
    actions: usize,
    /// Configuration file path (overrides discovery of `buildmux.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Never draw status rows; plain scrolling output only.
    #[arg(long)]
    plain: bool,
}

/// One simulated unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Action {
    name: String,
    steps: u32,
    warns: bool,
}

const UNITS: &[&str] = &[
    "core-text", "core-events", "parser", "lexer", "codegen", "linker", "runtime", "stdlib",
    "docs", "tests",
];

fn plan(actions: usize) -> Vec<Action> {
    (0..actions)
        .map(|i| {
            // Cheap deterministic spread of durations.
            let mix = (i as u32).wrapping_mul(2_654_435_761) >> 28;
            Action {
                name: format!("{}#{i}", UNITS[i % UNITS.len()]),
                steps: 3 + mix % 6,
                warns: i % 7 == 3,
            }
        })
        .collect()
}

fn run_action(console: &Console, action: &Action) {
    let line = console.status_line();
    let started = Instant::now();
    for step in 1..=action.steps {
        status!(line, "[{}] compiling ({step}/{})", action.name, action.steps);
        thread::sleep(STEP_DELAY);
    }
    if action.warns {
        let _ = writeln!(console.stderr(), "warning: {}: unused variable `tmp`", action.name);
    }
    line.update_colored(Color::Green, format_args!("[{}] done", action.name));
    let _ = writeln!(
        console.stdout(),
        "finished {} in {}ms",
        action.name,
        started.elapsed().as_millis()
    );
    line.close();
}

fn run_build(console: &Console, actions: &[Action], jobs: usize) {
    let next = AtomicUsize::new(0);
    thread::scope(|scope| {
        for worker in 0..jobs.max(1) {
            let console = console.clone();
            let next = &next;
            let spawned = thread::Builder::new()
                .name(format!("buildmux-worker-{worker}"))
                .spawn_scoped(scope, move || {
                    while let Some(action) = actions.get(next.fetch_add(1, Ordering::Relaxed)) {
                        run_action(&console, action);
                    }
                });
            if let Err(e) = spawned {
                warn!(target: "runtime", worker, %e, "worker_spawn_failed");
            }
        }
    });
    // Leftovers only when no worker could be spawned.
    while let Some(action) = actions.get(next.fetch_add(1, Ordering::Relaxed)) {
        run_action(console, action);
    }
}

fn configure_logging() -> Option<WorkerGuard> {
    let log_dir = Path::new(".");
    let log_path = log_dir.join(LOG_FILE);
    if log_path.exists() {
        let _ = std::fs::remove_file(&log_path);
    }

    let file_appender = tracing_appender::rolling::never(log_dir, LOG_FILE);
    let (nb_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(nb_writer)
        .with_ansi(false)
        .try_init()
        .ok()
        .map(|_| guard)
}

fn install_panic_hook() {
    static HOOK: Once = Once::new();
    HOOK.call_once(|| {
        let default_panic = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |info| {
            tracing::error!(target: "runtime.panic", ?info, "panic");
            default_panic(info);
        }));
    });
}

fn console_config(args: &Args) -> Result<ConsoleConfig> {
    let config = load_from(args.config.clone())?;
    let mut console = config.console().clone();
    console.plain |= args.plain;
    Ok(console)
}

fn main() -> Result<()> {
    let _log_guard = configure_logging();
    install_panic_hook();

    let args = Args::parse();
    let config = console_config(&args)?;
    info!(
        target: "runtime",
        jobs = args.jobs,
        actions = args.actions,
        plain = config.plain,
        "startup"
    );

    let console = Console::open(&config);
    let started = Instant::now();
    let actions = plan(args.actions);
    run_build(&console, &actions, args.jobs);
    let _ = writeln!(
        console.stdout(),
        "built {} actions in {:.2}s",
        actions.len(),
        started.elapsed().as_secs_f64()
    );
    console.close();

    info!(target: "runtime", elapsed_ms = started.elapsed().as_millis() as u64, "shutdown");
    Ok(())
}
