use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use std::process::Command;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Tournament barrier workspace automation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the criterion barrier benchmarks and summarize them
    Bench {
        /// Run quickly (lower sample size/time)
        #[arg(long, default_value_t = false)]
        quick: bool,

        /// Generate report only (skip running benchmarks)
        #[arg(long, default_value_t = false)]
        report_only: bool,
    },
    /// Time the `tournament` binary across a range of thread counts
    Sweep {
        /// Largest thread count; the sweep doubles from 1 up to it
        #[arg(long, default_value_t = 16)]
        max_threads: usize,

        /// Barrier episodes per run
        #[arg(long, default_value_t = 100_000)]
        barriers: usize,
    },
}

/// The fields of the binary's `--json` summary the report needs.
#[derive(Deserialize)]
struct RunSummary {
    threads: usize,
    num_rounds: usize,
    elapsed_us: u64,
    per_episode_ns: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Bench { quick, report_only } => {
            if !report_only {
                run_benchmarks(quick)?;
            }
            generate_report()?;
        }
        Commands::Sweep {
            max_threads,
            barriers,
        } => sweep(max_threads, barriers)?,
    }

    Ok(())
}

fn run_benchmarks(quick: bool) -> Result<()> {
    println!("Running barrier benchmarks...");
    let start = Instant::now();

    let mut cmd = Command::new("cargo");
    cmd.env("CARGO_INCREMENTAL", "0")
        .args(["bench", "--bench", "barrier_benchmark", "--"]);

    if quick {
        cmd.args(["--measurement-time", "0.5", "--noplot", "--sample-size", "10"]);
    }

    let status = cmd.status().context("failed to launch cargo bench")?;
    if !status.success() {
        bail!("barrier benchmarks failed");
    }
    println!("Finished in {:.2?}", start.elapsed());
    Ok(())
}

/// Episodes per second keyed by `group / parameter`, then by function.
type Results = BTreeMap<String, BTreeMap<String, f64>>;

fn generate_report() -> Result<()> {
    println!("\n>>> Generating Report...");
    let criterion_dir = Path::new("target/criterion");
    if !criterion_dir.exists() {
        eprintln!("No criterion output found at {}", criterion_dir.display());
        return Ok(());
    }

    let mut results = Results::new();
    collect_results(criterion_dir, &mut results)?;

    let mut functions: Vec<&String> = results.values().flat_map(|m| m.keys()).collect();
    functions.sort();
    functions.dedup();

    let report_path = Path::new("benchmark_results/report.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(report_path)?;

    writeln!(file, "# Barrier Benchmark Report")?;
    writeln!(file)?;
    write!(file, "| Benchmark |")?;
    for f in &functions {
        write!(file, " {f} (episodes/s) |")?;
    }
    writeln!(file)?;
    write!(file, "|---|")?;
    for _ in &functions {
        write!(file, "---|")?;
    }
    writeln!(file)?;

    for (row, by_function) in &results {
        write!(file, "| {row} |")?;
        for f in &functions {
            match by_function.get(*f) {
                Some(rate) => write!(file, " {} |", human(*rate))?,
                None => write!(file, " N/A |")?,
            }
        }
        writeln!(file)?;
    }

    println!("Report written to {}", report_path.display());
    Ok(())
}

fn human(rate: f64) -> String {
    if rate > 1_000_000.0 {
        format!("{:.2}M", rate / 1_000_000.0)
    } else if rate > 1_000.0 {
        format!("{:.2}K", rate / 1_000.0)
    } else {
        format!("{rate:.0}")
    }
}

/// Walks criterion's `<group>/<function>/<parameter>/new/` directories.
fn collect_results(dir: &Path, results: &mut Results) -> Result<()> {
    for entry in fs::read_dir(dir)?.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.file_name().and_then(|s| s.to_str()) != Some("new") {
            collect_results(&path, results)?;
            continue;
        }

        let benchmark = read_json(&path.join("benchmark.json"))?;
        let estimates = read_json(&path.join("estimates.json"))?;

        let field = |key: &str| benchmark.get(key).and_then(|v| v.as_str()).map(str::to_owned);
        let (Some(group), Some(function)) = (field("group_id"), field("function_id")) else {
            continue;
        };
        let row = match field("value_str") {
            Some(value) => format!("{group} / {value}"),
            None => group,
        };

        let elements = benchmark
            .get("throughput")
            .and_then(|t| t.get("Elements"))
            .and_then(|e| e.as_f64())
            .unwrap_or(1.0);
        let time_ns = estimates
            .get("mean")
            .and_then(|m| m.get("point_estimate"))
            .and_then(|p| p.as_f64())
            .unwrap_or(0.0);
        if time_ns > 0.0 {
            results
                .entry(row)
                .or_default()
                .insert(function, elements * 1e9 / time_ns);
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> Result<serde_json::Value> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&content).with_context(|| format!("parsing {}", path.display()))
}

fn sweep(max_threads: usize, barriers: usize) -> Result<()> {
    println!("Building tournament binary...");
    let status = Command::new("cargo")
        .args(["build", "--release", "--bin", "tournament"])
        .status()?;
    if !status.success() {
        bail!("failed to build the tournament binary");
    }

    let bin = Path::new("target/release/tournament");
    let mut rows = Vec::new();
    let mut threads = 1;
    while threads <= max_threads.max(1) {
        let output = Command::new(bin)
            .args([threads.to_string(), barriers.to_string()])
            .args(["--json", "--log", "warn"])
            .output()
            .with_context(|| format!("running {}", bin.display()))?;
        if !output.status.success() {
            bail!(
                "{threads} threads failed: {}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
        let summary: RunSummary = serde_json::from_slice(&output.stdout)
            .context("binary did not print a JSON summary")?;
        println!(
            "{:>3} threads: {:>10.1} ns/episode",
            summary.threads, summary.per_episode_ns
        );
        rows.push(summary);
        threads *= 2;
    }

    let report_path = Path::new("benchmark_results/sweep.md");
    if let Some(parent) = report_path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut file = fs::File::create(report_path)?;
    writeln!(file, "# Thread Sweep ({barriers} barriers)")?;
    writeln!(file)?;
    writeln!(file, "| Threads | Rounds | Elapsed (us) | ns / episode |")?;
    writeln!(file, "|---|---|---|---|")?;
    for r in &rows {
        writeln!(
            file,
            "| {} | {} | {} | {:.1} |",
            r.threads, r.num_rounds, r.elapsed_us, r.per_episode_ns
        )?;
    }

    println!("Sweep written to {}", report_path.display());
    Ok(())
}
