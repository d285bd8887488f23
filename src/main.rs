use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::mpsc;

mod app;
mod config;
mod ingest;

use app::{AppState, parse_mask};
use config::ConsoleConfig;
use ingest::{Incoming, InputFormat, InputSource, InputStream};
use logscope_store::{TickOutcome, ViewPredicate};

/// Logscope - a headless console for filtering live structured log streams
#[derive(Parser, Debug)]
#[command(name = "logscope")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Input file (reads stdin when omitted)
    #[arg(value_name = "INPUT")]
    input: Option<PathBuf>,

    /// Config file (defaults to ./logscope.toml if present)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Input line format
    #[arg(long, value_enum)]
    format: Option<InputFormat>,

    /// Only show records from this process (repeatable)
    #[arg(long = "process", value_name = "NAME")]
    processes: Vec<String>,

    /// Severities to show: `all`, `warn+`, or a list like `info,error`
    #[arg(long, value_name = "MASK")]
    severity: Option<String>,

    /// Records classified per idle tick
    #[arg(long)]
    batch_size: Option<usize>,

    /// Append source location to each row
    #[arg(long)]
    extended: bool,

    /// Print per-process and per-severity counts on exit
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ConsoleConfig::load(args.config.as_deref())?;

    // Diagnostics go to stderr; stdout carries only rows
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = run_app(args, config).await;

    if let Err(e) = &result {
        eprintln!("Error: {:#}", e);
    }

    result
}

async fn run_app(args: Args, config: ConsoleConfig) -> Result<()> {
    let mask = match &args.severity {
        Some(mask) => parse_mask(mask).map_err(anyhow::Error::msg)?,
        None => config.filter.mask(),
    };
    let processes = if args.processes.is_empty() {
        config.filter.processes.clone()
    } else {
        args.processes.clone()
    };
    let batch_size = args.batch_size.unwrap_or(config.scheduler.batch_size);
    let format = args.format.unwrap_or(config.input.format);
    let show_stats = args.stats || config.display.stats;

    let predicate = ViewPredicate::all()
        .with_processes(processes)
        .with_severities(mask);
    let mut state = AppState::new(predicate, batch_size, args.extended || config.display.extended)
        .context("invalid console settings")?;

    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<Incoming>();
    let source = match args.input {
        Some(path) => InputSource::File(path),
        None => InputSource::Stdin,
    };
    let mut input = InputStream::start(source, format, input_tx).await?;
    let mut input_open = true;

    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    // Main event loop: input first, batch work only when nothing else is ready
    loop {
        tokio::select! {
            biased;

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }

            maybe_item = input_rx.recv(), if input_open => {
                match maybe_item {
                    Some(Incoming::Record(record)) => state.ingest(&record),
                    Some(Incoming::Command(action)) => state.handle_action(action)?,
                    None => input_open = false,
                }
            }

            _ = std::future::ready(()), if state.armed => {
                if state.tick() == TickOutcome::Idle {
                    out.flush()?;
                }
            }
        }

        state.render(&mut out)?;

        if state.stats_requested {
            state.stats_requested = false;
            state.write_stats(&mut out)?;
        }

        if state.should_quit || (!input_open && !state.armed) {
            break;
        }
    }

    input.stop();
    state.drain_all();
    state.render(&mut out)?;
    if show_stats {
        state.write_stats(&mut out)?;
    }
    out.flush()?;

    Ok(())
}
