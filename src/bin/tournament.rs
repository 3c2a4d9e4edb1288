use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use tournament::config::DEFAULT_CONNECT_TIMEOUT;
use tournament::{GroupConfig, RunConfig};

/// Run a two-level tournament/rendezvous barrier benchmark.
#[derive(Parser, Debug)]
#[command(name = "tournament")]
#[command(about = "Tournament barrier across threads, rendezvous barrier across processes", long_about = None)]
struct Cli {
    /// Number of threads in this process
    threads: usize,

    /// Barrier episodes each thread performs
    barriers: usize,

    /// Rank of this process in the group
    #[arg(long, default_value_t = 0)]
    rank: usize,

    /// Number of processes in the group
    #[arg(long, default_value_t = 1)]
    group_size: usize,

    /// Address rank 0 listens on and the other ranks connect to
    #[arg(long)]
    coordinator: Option<SocketAddr>,

    /// How long non-zero ranks retry connecting to rank 0
    #[arg(long, default_value_t = DEFAULT_CONNECT_TIMEOUT.as_millis() as u64)]
    connect_timeout_ms: u64,

    /// Print the run summary as a single JSON line
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Log filter, e.g. `debug` or `tournament=trace` (overrides RUST_LOG)
    #[arg(long)]
    log: Option<String>,
}

impl Cli {
    fn into_config(self) -> Result<RunConfig> {
        anyhow::ensure!(self.group_size > 0, "--group-size must be at least 1");
        let group = if self.group_size > 1 {
            let coordinator = self
                .coordinator
                .context("--coordinator is required when --group-size is above 1")?;
            Some(GroupConfig {
                rank: self.rank,
                group_size: self.group_size,
                coordinator,
                connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            })
        } else {
            anyhow::ensure!(self.rank == 0, "--rank {} needs a --group-size above it", self.rank);
            anyhow::ensure!(
                self.coordinator.is_none(),
                "--coordinator needs a --group-size above 1"
            );
            None
        };

        let config = RunConfig {
            threads: self.threads,
            barriers: self.barriers,
            group,
        };
        config.validate().context("invalid configuration")?;
        Ok(config)
    }
}

fn init_logging(filter: Option<&str>) -> Result<()> {
    let filter = match filter {
        Some(f) => EnvFilter::try_new(f).with_context(|| format!("bad log filter {f:?}"))?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_names(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log.as_deref())?;

    let json = cli.json;
    let config = cli.into_config()?;
    let summary = config.run().context("barrier run failed")?;

    if json {
        println!("{}", serde_json::to_string(&summary)?);
    } else {
        println!(
            "rank {}/{}: {} threads x {} barriers ({} rounds) in {} us ({:.1} ns/barrier)",
            summary.rank,
            summary.group_size,
            summary.threads,
            summary.barriers,
            summary.num_rounds,
            summary.elapsed_us,
            summary.per_episode_ns
        );
    }
    Ok(())
}
