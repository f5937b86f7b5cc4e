//! Labeled custom metric writer
//!
//! Creates, writes, and reads one labeled custom metric time series: the
//! number of shirts of a given color and size in inventory.

mod config;

use anyhow::Result;
use std::time::Duration;

use inventory_core::api::{MonitoringClient, Point};
use inventory_core::error::{log_failure, verbose_errors_enabled};
use inventory_core::metadata::MetadataClient;
use inventory_core::retry::with_retry;
use inventory_core::{now_rfc3339, LabelSet};

use crate::config::Config;

/// How long to wait after registering the metric descriptor before writing,
/// so the descriptor can propagate.
const DESCRIPTOR_PROPAGATION_DELAY: Duration = Duration::from_secs(2);

/// How long to wait between failed read attempts while written data propagates.
const READ_RETRY_INTERVAL: Duration = Duration::from_secs(3);

/// How long to keep retrying failed reads before giving up.
const READ_RETRY_BUDGET: Duration = Duration::from_secs(20);

/// The program's main entry point.
fn main() {
    let result = Config::load().and_then(|config| async_std::task::block_on(run(config)));
    if let Err(err) = result {
        eprintln!("Failed to complete operations on custom metric: {:#}", err);
        std::process::exit(1);
    }
}

/// Runs the create/write/read sequence, returning the points read back.
async fn run(config: Config) -> Result<Vec<Point>> {
    verbose_errors_enabled(config.debug);

    // Resolve the caller's identity once per run
    let metadata = MetadataClient::new(&config.metadata_url);
    let project_id = metadata.numeric_project_id().await?;
    let token = metadata.access_token().await?;
    let client = MonitoringClient::new(&config.monitoring_url, &project_id, token)?;

    // One timestamp shared by the write and the read that confirms it
    let now = now_rfc3339();
    let labels = LabelSet::new(&config.color, &config.size);

    println!("Labels: color: {}, size: {}.", config.color, config.size);

    println!("Creating custom metric...");
    if let Err(err) = client.create_metric_descriptor().await {
        log_failure("Failed to create custom metric", &err);
        return Err(err);
    }
    async_std::task::sleep(DESCRIPTOR_PROPAGATION_DELAY).await;

    println!("Writing new data to custom metric timeseries...");
    if let Err(err) = client.write_point(&labels, &now, config.count).await {
        log_failure("Failed to write data to custom metric", &err);
        return Err(err);
    }

    println!("Reading data from custom metric timeseries...");
    let read = with_retry(
        "read custom metric data",
        READ_RETRY_INTERVAL,
        READ_RETRY_BUDGET,
        || client.read_points(&labels, &now),
    )
    .await;
    let points = match read {
        Ok(points) => points,
        Err(err) => {
            log_failure("Failed to read custom metric data, aborting", &err);
            return Err(err);
        }
    };
    for point in &points {
        println!("  {}: {}", point.end, point.value);
    }
    Ok(points)
}
