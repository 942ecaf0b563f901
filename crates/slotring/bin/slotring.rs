//! Runs a producer/consumer/monitor pool over one slot buffer until Ctrl+C.
//!
//! Run with: `RUST_LOG=info cargo run -p slotring --bin slotring -- --duration 10s`

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use slotring::{Config, Controller, Pacing, DEFAULT_CAPACITY, DEFAULT_WORKERS};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PacingArg {
    /// Poll continuously
    Spin,
    /// Spin, yield, then sleep briefly while the buffer is full/empty
    Backoff,
    /// Sleep for --pause after every iteration
    Sleep,
}

#[derive(Parser)]
#[command(name = "slotring")]
#[command(about = "bounded slot buffer shared by polling producer and consumer threads")]
struct Args {
    #[arg(long, default_value_t = DEFAULT_CAPACITY, help = "number of slots (one stays free)")]
    capacity: usize,

    #[arg(long, default_value_t = DEFAULT_WORKERS, help = "producer threads")]
    producers: usize,

    #[arg(long, default_value_t = DEFAULT_WORKERS, help = "consumer threads")]
    consumers: usize,

    #[arg(
        long,
        default_value = "1s",
        value_parser = humantime::parse_duration,
        help = "pause between monitor dumps"
    )]
    monitor_interval: Duration,

    #[arg(long, value_enum, default_value_t = PacingArg::Spin, help = "producer/consumer pacing")]
    pacing: PacingArg,

    #[arg(
        long,
        default_value = "1s",
        value_parser = humantime::parse_duration,
        help = "pause used by --pacing sleep"
    )]
    pause: Duration,

    #[arg(
        short,
        long,
        value_parser = humantime::parse_duration,
        help = "stop after this long (e.g. 10s, 5m); default waits for ctrl+c"
    )]
    duration: Option<Duration>,
}

impl Args {
    fn config(&self) -> Config {
        let pacing = match self.pacing {
            PacingArg::Spin => Pacing::Spin,
            PacingArg::Backoff => Pacing::Backoff,
            PacingArg::Sleep => Pacing::Sleep(self.pause),
        };
        Config::new(self.capacity, self.producers, self.consumers)
            .with_monitor_interval(self.monitor_interval)
            .with_pacing(pacing)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let summary = Controller::run(args.config(), args.duration)
        .context("slot buffer run failed")?;

    tracing::info!(
        produced = summary.produced(),
        consumed = summary.consumed(),
        state = %summary.snapshot,
        "clean shutdown"
    );
    Ok(())
}
