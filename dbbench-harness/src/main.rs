//! dbbench entry point.
//!
//! Usage:
//!   dbbench run --backend postgres                # standard plan
//!   dbbench run --backend memory --plan small     # quick in-process run
//!   dbbench run --backend arango --json out.json  # export the report
//!   dbbench populate --backend postgres -n 1000000 --chunk 10000

use clap::{Args, Parser, Subcommand};
use dbbench_core::{BackendKind, BenchConfig, BenchResult, PlanKind, ResultExt};
use dbbench_harness::{
    connect, init_tracing, override_endpoint, populate, run_suite, PopulateOptions, SuiteOptions,
    SuitePlan, TelemetryConfig,
};
use dbbench_storage::Capability;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "dbbench", version, about = "Database workload benchmark harness")]
struct Cli {
    /// Emit JSON log lines on stderr.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the workload suite against one backend and print the report.
    Run(RunArgs),
    /// Fill a backend with flat artifacts up to a target count.
    Populate(PopulateArgs),
}

#[derive(Args, Debug)]
struct RunArgs {
    /// postgres, arango, neo4j or memory.
    #[arg(long)]
    backend: BackendKind,

    /// standard or small; defaults to the configured plan.
    #[arg(long)]
    plan: Option<PlanKind>,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the report as JSON to this path.
    #[arg(long)]
    json: Option<PathBuf>,

    /// Capabilities to skip (comma-separated, e.g. read_one,read_many).
    #[arg(long, value_delimiter = ',')]
    skip: Vec<Capability>,

    /// Seed for update patches.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Args, Debug)]
struct PopulateArgs {
    /// postgres, arango or neo4j.
    #[arg(long)]
    backend: BackendKind,

    /// Connection string or URL overriding the configured one.
    #[arg(long)]
    endpoint: Option<String>,

    /// The number of entries to reach inside the database.
    #[arg(short, default_value_t = 1_000_000)]
    n: u64,

    /// Maximum inserts of one bulk operation.
    #[arg(long, default_value_t = 10_000)]
    chunk: usize,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut telemetry = TelemetryConfig::from_env();
    telemetry.json |= cli.log_json;
    if let Err(e) = init_tracing(&telemetry) {
        eprintln!("{}", e);
    }

    let result = match cli.command {
        Command::Run(args) => run(args).await,
        Command::Populate(args) => populate_cmd(args).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "dbbench failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// File (if given), then `DBBENCH_*` environment variables.
fn load_config(path: Option<&Path>) -> BenchResult<BenchConfig> {
    let mut config = match path {
        Some(path) => BenchConfig::from_path(path)?,
        None => BenchConfig::default(),
    };
    config.apply_env(|key| std::env::var(key).ok())?;
    Ok(config)
}

async fn run(args: RunArgs) -> BenchResult<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(plan) = args.plan {
        config.suite.plan = plan;
    }
    if args.seed.is_some() {
        config.suite.seed = args.seed;
    }
    config.validate()?;

    let backend = connect(args.backend, &config).await?;
    let plan = SuitePlan::for_kind(config.suite.plan);
    let options = SuiteOptions {
        skip: args.skip.into_iter().collect(),
        seed: config.suite.seed,
    };

    let run = run_suite(backend.as_ref(), &plan, &options).await;
    print!("{}", run.report);

    if let Some(path) = &args.json {
        let json = run.report.to_json().context("failed encoding report")?;
        std::fs::write(path, json).context("failed writing report")?;
        info!(path = %path.display(), "report written");
    }

    match run.error {
        Some(e) => Err(e),
        None => Ok(ExitCode::SUCCESS),
    }
}

async fn populate_cmd(args: PopulateArgs) -> BenchResult<ExitCode> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(endpoint) = args.endpoint {
        override_endpoint(&mut config, args.backend, endpoint);
    }
    config.validate()?;

    let backend = connect(args.backend, &config).await?;
    let summary = populate(
        backend.as_ref(),
        PopulateOptions {
            target: args.n,
            chunk: args.chunk,
        },
    )
    .await?;
    info!(
        existing = summary.existing,
        inserted = summary.inserted,
        "populate finished"
    );
    Ok(ExitCode::SUCCESS)
}
