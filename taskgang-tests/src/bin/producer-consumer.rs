// SPDX-License-Identifier: MIT
//
// Author: Johannes Leupolz <dev@leupolz.eu>

use clap::Parser;
use log::info;
use taskgang::config::QueueVariant;
use taskgang_tests::producer_consumer::run_check;

#[derive(Debug, Parser)]
#[command(author, version, about = "Push a counting sequence through a bounded queue")]
struct Args {
    #[arg(long, value_enum, default_value_t)]
    kind: QueueVariant,

    #[arg(long, default_value_t = 10)]
    capacity: usize,

    #[arg(long, default_value_t = 100_000)]
    items: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    if args.capacity == 0 {
        eprintln!("Error: --capacity must be at least 1");
        std::process::exit(2);
    }

    info!(
        "Pushing {} items through a {:?} queue of capacity {}",
        args.items, args.kind, args.capacity
    );
    let check = run_check(args.kind.into(), args.capacity, args.items)?;
    println!("{}", serde_json::to_string(&check)?);

    if !check.passed() {
        std::process::exit(1);
    }
    Ok(())
}
