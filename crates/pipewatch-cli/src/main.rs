mod sim;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pipewatch_reporter::{PipelineReporter, RenderFormat, ReporterConfig};
use sim::Simulation;

#[derive(Parser)]
#[command(name = "pipewatch", version)]
struct Cli {
    /// Config file (default: ~/.pipewatch/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write a default config file
    Init {
        #[arg(long)]
        force: bool,
    },

    /// Take one snapshot of a simulated pipeline
    Snapshot {
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long, default_value_t = 2)]
        outputs: usize,
        /// text | json | pretty
        #[arg(long)]
        format: Option<RenderFormat>,
        /// Let the simulation run this long before the snapshot
        #[arg(long, default_value_t = 200)]
        warmup_ms: u64,
    },

    /// Print a snapshot of a simulated pipeline on every interval
    Watch {
        #[arg(long, default_value_t = 4)]
        workers: usize,
        #[arg(long, default_value_t = 2)]
        outputs: usize,
        #[arg(long)]
        format: Option<RenderFormat>,
        #[arg(long)]
        interval_ms: Option<u64>,
        #[arg(long)]
        count: Option<u32>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg_path = cli.config.unwrap_or_else(ReporterConfig::default_path);

    match cli.cmd {
        Command::Init { force } => {
            if cfg_path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", cfg_path.display());
            }
            ReporterConfig::default().save_to(&cfg_path)?;
            println!("Wrote {}", cfg_path.display());
        }
        Command::Snapshot { workers, outputs, format, warmup_ms } => {
            let cfg = ReporterConfig::load_from(&cfg_path)?;
            let format = format.unwrap_or(cfg.render.format);

            let sim = Simulation::start(workers, outputs);
            std::thread::sleep(Duration::from_millis(warmup_ms));
            let reporter = PipelineReporter::from_config(sim.pipeline(), &cfg);
            let snapshot = reporter.snapshot();
            sim.stop();

            let snapshot = snapshot.context("snapshot failed")?;
            println!("{}", snapshot.render(format)?);
        }
        Command::Watch { workers, outputs, format, interval_ms, count } => {
            let mut cfg = ReporterConfig::load_from(&cfg_path)?;
            if let Some(ms) = interval_ms {
                cfg.watch.interval_ms = ms;
            }
            let count = count.or(cfg.watch.count);
            let format = format.unwrap_or(cfg.render.format);

            let sim = Simulation::start(workers, outputs);
            let reporter = PipelineReporter::from_config(sim.pipeline(), &cfg);
            let mut taken = 0u32;
            while count.map_or(true, |c| taken < c) {
                std::thread::sleep(cfg.watch_interval());
                match reporter.snapshot() {
                    Ok(snapshot) => println!("{}", snapshot.render(format)?),
                    Err(e) => tracing::warn!(error = %e, "snapshot failed"),
                }
                taken += 1;
            }
            sim.stop();
        }
    }

    Ok(())
}
