// SPDX-License-Identifier: MIT
// taskgang: run cyclic, barrier-synchronized gangs from the command line
//
// - `search` looks for words in batches of strings, one cycle per batch.
// - `gcd` computes greatest common divisors of random operand pairs.
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use taskgang::barrier::FailurePolicy;
use taskgang::config::{BarrierKind, GangConfig, QueueVariant};
use taskgang::gang::GangReport;
use taskgang::gangs::{random_batches, run_gcd, run_search};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Gang configuration as JSON. Options given on the command line win.
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Number of worker threads
    #[arg(long, global = true)]
    workers: Option<usize>,

    /// Whether a failed element counts toward finishing its cycle
    #[arg(long, value_enum, global = true)]
    failure_policy: Option<FailurePolicy>,

    /// Give up on a cycle that is not done after this many milliseconds
    #[arg(long = "timeout-ms", value_name = "MS", global = true)]
    timeout_ms: Option<u64>,

    /// Completion barrier the driver waits on
    #[arg(long, value_enum, global = true)]
    barrier: Option<BarrierKind>,

    /// Queue used for results and completion events
    #[arg(long, value_enum, global = true)]
    queue_kind: Option<QueueVariant>,

    #[arg(long, global = true)]
    queue_capacity: Option<usize>,

    /// Print the report and results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Search batches of strings for words
    Search {
        /// Word to look for (repeatable)
        #[arg(long = "word", value_name = "WORD", required = true)]
        words: Vec<String>,

        /// Comma separated strings forming one batch (repeatable, one cycle each)
        #[arg(long = "batch", value_name = "S1,S2,..", required = true)]
        batches: Vec<String>,
    },
    /// Compute greatest common divisors of random pairs
    Gcd {
        /// Pairs per cycle
        #[arg(long, default_value_t = 8)]
        pairs: usize,

        #[arg(long, default_value_t = 3)]
        cycles: usize,

        /// Largest operand
        #[arg(long, default_value_t = 1_000_000)]
        max: u64,

        /// Seed for reproducible operands
        #[arg(long)]
        seed: Option<u64>,
    },
}

#[derive(Serialize)]
struct Output<R> {
    report: GangReport,
    results: Vec<R>,
}

fn validate_args(args: &Args) -> Result<(), String> {
    if args.workers == Some(0) {
        return Err("--workers must be at least 1".into());
    }
    if args.timeout_ms == Some(0) {
        return Err("--timeout-ms must be at least 1".into());
    }
    if args.queue_capacity == Some(0) {
        return Err("--queue-capacity must be at least 1".into());
    }

    match &args.command {
        Command::Search { words, batches } => {
            if words.iter().any(|w| w.is_empty()) {
                return Err("--word must not be empty".into());
            }
            if batches.iter().any(|b| b.trim().is_empty()) {
                return Err("--batch must contain at least one string".into());
            }
        }
        Command::Gcd {
            pairs, cycles, max, ..
        } => {
            if *pairs == 0 || *cycles == 0 {
                return Err("--pairs and --cycles must be at least 1".into());
            }
            if *max == 0 {
                return Err("--max must be at least 1".into());
            }
        }
    }

    Ok(())
}

fn load_config(args: &Args) -> anyhow::Result<GangConfig> {
    let mut config = match &args.config {
        Some(path) => GangConfig::from_json_file(path)?,
        None => GangConfig::default(),
    };
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(policy) = args.failure_policy {
        config.failure_policy = policy;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.await_timeout_ms = Some(timeout_ms);
    }
    if let Some(barrier) = args.barrier {
        config.barrier = barrier;
    }
    if let Some(kind) = args.queue_kind {
        config.queue_kind = kind;
    }
    if let Some(capacity) = args.queue_capacity {
        config.queue_capacity = capacity;
    }
    config.verbose |= args.verbose;
    config.validate()?;
    Ok(config)
}

fn print_output<R: Serialize + std::fmt::Debug>(
    json: bool,
    report: GangReport,
    results: Vec<R>,
) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&Output { report, results })?
        );
    } else {
        for result in &results {
            println!("{result:?}");
        }
        println!("{report:?}");
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if let Err(e) = validate_args(&args) {
        eprintln!("Error: {e}");
        std::process::exit(2);
    }

    let config = load_config(&args)?;
    let default_filter = if config.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    info!("Starting taskgang with {config:?}");

    match args.command {
        Command::Search { words, batches } => {
            let batches: Vec<Vec<String>> = batches
                .iter()
                .map(|batch| batch.split(',').map(|s| s.trim().to_owned()).collect())
                .collect();
            let (report, results) = run_search(&config, &words, batches)?;
            print_output(args.json, report, results)?;
        }
        Command::Gcd {
            pairs,
            cycles,
            max,
            seed,
        } => {
            let mut rng = match seed {
                Some(seed) => fastrand::Rng::with_seed(seed),
                None => fastrand::Rng::new(),
            };
            let batches = random_batches(&mut rng, cycles, pairs, max);
            let (report, results) = run_gcd(&config, batches)?;
            print_output(args.json, report, results)?;
        }
    }

    Ok(())
}
