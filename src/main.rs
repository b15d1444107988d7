use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use rayon::prelude::*;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ferrite_bench::bench::{run_pair, RunReport};
use ferrite_bench::config::BenchConfig;
use ferrite_bench::datasets::Framework;
use ferrite_bench::solver::{build_solver, SolverConfig};

/// Benchmark optimizers on the imperative and graph training engines
#[derive(Parser, Debug)]
#[command(name = "ferrite-bench", version, about, long_about = None)]
struct Cli {
    /// Benchmark config (JSON); the built-in default when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Only run solvers of this engine (imperative, graph)
    #[arg(short, long)]
    engine: Option<Framework>,

    /// Override the patience of every solver
    #[arg(long)]
    patience: Option<usize>,

    /// Stop every run after this many checkpoints
    #[arg(long)]
    max_checkpoints: Option<usize>,

    /// Run solver configurations concurrently
    #[arg(long)]
    parallel: bool,

    /// Write the reports here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Write the effective config to this path and exit
    #[arg(long)]
    dump_config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> ferrite_bench::Result<()> {
    let mut config = match &cli.config {
        Some(path) => BenchConfig::load_json(path)?,
        None => BenchConfig::default(),
    };
    if let Some(max) = cli.max_checkpoints {
        config.run.max_checkpoints = Some(max);
    }
    if let Some(patience) = cli.patience {
        for grid in &mut config.grids {
            grid.stopping.patience = patience;
        }
    }
    if let Some(engine) = cli.engine {
        config.grids.retain(|g| g.engine == engine);
    }

    if let Some(path) = &cli.dump_config {
        config.save_json(path)?;
        info!(path = %path.display(), "config written");
        return Ok(());
    }

    let configs: Vec<SolverConfig> = config.grids.iter().flat_map(|g| g.expand()).collect();
    info!(n_configs = configs.len(), "starting benchmark");

    let run_one = |solver_config: &SolverConfig| -> ferrite_bench::Result<RunReport> {
        let source = config.dataset.for_framework(solver_config.engine);
        let mut solver = build_solver(*solver_config);
        run_pair(solver.as_mut(), source.as_ref(), &config.run)
    };
    let reports: Vec<RunReport> = if cli.parallel {
        configs.par_iter().map(run_one).collect::<ferrite_bench::Result<_>>()?
    } else {
        configs.iter().map(run_one).collect::<ferrite_bench::Result<_>>()?
    };

    let skipped = reports.iter().filter(|r| r.is_skipped()).count();
    info!(runs = reports.len() - skipped, skipped, "benchmark finished");
    write_reports(&reports, cli.output.as_ref())
}

fn write_reports(reports: &[RunReport], output: Option<&PathBuf>) -> ferrite_bench::Result<()> {
    match output {
        Some(path) => {
            let writer = io::BufWriter::new(std::fs::File::create(path)?);
            serde_json::to_writer_pretty(writer, reports)?;
        }
        None => {
            let stdout = io::stdout();
            let mut lock = stdout.lock();
            serde_json::to_writer_pretty(&mut lock, reports)?;
            writeln!(lock)?;
        }
    }
    Ok(())
}
