use std::collections::HashSet;
use std::io;
use std::process::ExitCode;

use clap::Parser;
use convtree_core::config::{DEFAULT_ORPHAN_RECOVERY_RATIO, DEFAULT_TASK_WINDOW_MS};
use convtree_core::{
    FlattenOptions, ProviderRoots, ThreadTarget, load_thread_view, render_thread_markdown,
    resolve_thread_view, thread_view_to_raw_json,
};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "convtree",
    version,
    about = "Flatten a Claude session log into its reading order"
)]
struct Cli {
    /// Session URI like claude://<session_id>, or a path to a session .jsonl file
    target: String,

    /// Output the flattened view as JSON instead of markdown
    #[arg(long)]
    raw: bool,

    /// Collapse a message into a hidden placeholder (repeatable)
    #[arg(long = "hide", value_name = "UUID")]
    hide: Vec<String>,

    /// Window in milliseconds for grouping async agent launches
    #[arg(long, default_value_t = DEFAULT_TASK_WINDOW_MS)]
    task_window_ms: i64,

    /// Minimum reachable fraction before unreachable messages are dropped
    #[arg(long, default_value_t = DEFAULT_ORPHAN_RECOVERY_RATIO, value_parser = parse_ratio)]
    orphan_ratio: f64,
}

fn parse_ratio(value: &str) -> Result<f64, String> {
    let ratio = value
        .parse::<f64>()
        .map_err(|err| format!("`{value}` is not a number: {err}"))?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("`{value}` is not between 0 and 1"))
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> convtree_core::Result<()> {
    let target = ThreadTarget::parse(&cli.target)?;
    let hidden = cli.hide.into_iter().collect::<HashSet<_>>();
    let options = FlattenOptions {
        task_window_ms: cli.task_window_ms,
        orphan_recovery_ratio: cli.orphan_ratio,
    };

    let view = match &target {
        ThreadTarget::Uri(_) => {
            let roots = ProviderRoots::from_env_or_home()?;
            resolve_thread_view(&target, &roots, &hidden, &options)?
        }
        ThreadTarget::Path(path) => load_thread_view(path, &hidden, &options)?,
    };

    if cli.raw {
        let raw_json = thread_view_to_raw_json(&view)?;
        println!("{raw_json}");
    } else {
        let markdown = render_thread_markdown(&view);
        print!("{markdown}");
    }

    Ok(())
}
