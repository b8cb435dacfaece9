use std::time::Duration;

use anyhow::{Error, anyhow, bail};
use indicatif::{ProgressBar, ProgressStyle};
use ledger::payloads::{AdIdsRequest, BatchResponse};
use reqwest::{Client, StatusCode};

pub mod models;
pub mod utils;

use models::{RunTotals, SPEND_CHECK_PATH, SYNC_INSIGHTS_PATH};
use utils::timestamp;

pub struct RunOptions {
    pub url: String,
    pub batch_size: usize,
    pub sync_only: bool,
    pub timeout: Duration,
}

impl RunOptions {
    pub fn new(
        endpoint: String,
        batch_size: usize,
        sync_only: bool,
        timeout: Duration,
    ) -> Result<Self, Error> {
        if batch_size == 0 {
            bail!("batch size must be at least 1");
        }

        if timeout.is_zero() {
            bail!("timeout must be positive");
        }

        let path = if sync_only {
            SYNC_INSIGHTS_PATH
        } else {
            SPEND_CHECK_PATH
        };

        Ok(Self {
            url: format!("{}{path}", endpoint.trim_end_matches('/')),
            batch_size,
            sync_only,
            timeout,
        })
    }
}

/// Posts one batch. 200 and 207 both carry per-ad results.
async fn post_batch(client: &Client, url: &str, batch: &[String]) -> Result<BatchResponse, Error> {
    let res = client
        .post(url)
        .json(&AdIdsRequest::batch(batch.to_vec()))
        .send()
        .await?;

    let status = res.status();

    #[cfg(feature = "verbose")]
    println!("Status: {}\n", status);

    let body = res.text().await?;

    if status != StatusCode::OK && status != StatusCode::MULTI_STATUS {
        return Err(anyhow!("service answered {status}: {body}"));
    }

    Ok(serde_json::from_str(&body)?)
}

fn report(response: &BatchResponse) -> RunTotals {
    for result in response.results.iter().filter(|r| !r.success) {
        match &result.error {
            Some(error) => println!("  {} failed: {:?} {}", result.ad_id, error.code, error.message),
            None => println!("  {} failed", result.ad_id),
        }
    }

    for result in response.results.iter().filter(|r| r.auto_paused) {
        println!(
            "  {} auto-paused (unpaid {}, available {})",
            result.ad_id,
            result.unpaid.unwrap_or_default(),
            result.available_balance.unwrap_or_default()
        );
    }

    for result in &response.results {
        for warning in &result.warnings {
            println!("  {} warning: {warning}", result.ad_id);
        }
    }

    RunTotals {
        total: response.summary.total,
        succeeded: response.summary.succeeded,
        failed: response.summary.failed,
        auto_paused: response.summary.auto_paused,
        unreachable_batches: 0,
    }
}

pub async fn run(ad_ids: &[String], options: &RunOptions) -> Result<RunTotals, Error> {
    let client = Client::builder().timeout(options.timeout).build()?;
    let batches: Vec<&[String]> = ad_ids.chunks(options.batch_size).collect();

    let pb = ProgressBar::new(batches.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
        )?
        .progress_chars("=> "),
    );

    let mut totals = RunTotals::default();

    for batch in batches {
        pb.set_message(format!("Checking {} ads", batch.len()));

        match post_batch(&client, &options.url, batch).await {
            Ok(response) => totals.add(&report(&response)),
            Err(e) => {
                println!("  Batch of {} ads failed: {e}", batch.len());
                totals.add(&RunTotals {
                    total: batch.len(),
                    failed: batch.len(),
                    unreachable_batches: 1,
                    ..Default::default()
                });
            }
        }

        pb.inc(1);
    }

    pb.finish_with_message("Done");

    let mode = if options.sync_only { "synced" } else { "checked" };
    println!(
        "\n[{}] {} ads {mode}: {} succeeded, {} failed, {} auto-paused\n",
        timestamp(),
        totals.total,
        totals.succeeded,
        totals.failed,
        totals.auto_paused
    );

    Ok(totals)
}

/// Re-runs forever. A failed run is reported and the next tick tries again.
pub async fn run_periodically(
    ad_ids: &[String],
    options: &RunOptions,
    every: Duration,
) -> Result<(), Error> {
    let mut interval = tokio::time::interval(every);

    loop {
        interval.tick().await;
        println!("[{}] Starting run over {} ads", timestamp(), ad_ids.len());

        if let Err(e) = run(ad_ids, options).await {
            println!("[{}] Run failed: {e}", timestamp());
        }
    }
}
