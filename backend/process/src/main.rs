use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, bail};
use clap::Parser;

use process::{RunOptions, run, run_periodically, utils::collect_ids};

/// Drives the spend check of the spend guard service over a list of live ads.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Live ad ids to check
    ad_ids: Vec<String>,

    /// File with one live ad id per line, `#` starts a comment
    #[arg(long)]
    file: Option<PathBuf>,

    /// Base URL of the spend guard service
    #[arg(long, default_value = "http://localhost:1111")]
    endpoint: String,

    /// Ad ids per request
    #[arg(long, default_value_t = 25)]
    batch_size: usize,

    /// Repeat the run every N minutes until interrupted
    #[arg(long)]
    interval_mins: Option<u64>,

    /// Seconds to wait for one batch before giving up on it
    #[arg(long, default_value_t = 120)]
    timeout_secs: u64,

    /// Only sync spend from Meta, never pause
    #[arg(long)]
    sync_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let contents = match &args.file {
        Some(path) => Some(
            fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?,
        ),
        None => None,
    };

    let (ad_ids, rejected) = collect_ids(args.ad_ids, contents.as_deref());
    for id in &rejected {
        println!("Skipping malformed ad id: {id:?}");
    }

    if ad_ids.is_empty() {
        bail!("no ad ids to check");
    }

    let options = RunOptions::new(
        args.endpoint,
        args.batch_size,
        args.sync_only,
        Duration::from_secs(args.timeout_secs),
    )?;

    match args.interval_mins {
        Some(0) => bail!("--interval-mins must be at least 1"),
        Some(mins) => run_periodically(&ad_ids, &options, Duration::from_secs(mins * 60)).await,
        None => {
            let totals = run(&ad_ids, &options).await?;
            if totals.failed > 0 {
                bail!("{} of {} ads failed", totals.failed, totals.total);
            }

            Ok(())
        }
    }
}
