//! The `ingest` subcommand.

use dealforge_common::{
    config::Config,
    db,
    ingest::{process_ingestion_job, IngestionRequest},
    prelude::*,
    queue::{enqueue_job, queues, EnqueueOptions},
};
use std::{fs::File, path::Path};

/// Submit a batch from a JSON file, either synchronously or onto the
/// ingestion queue.
pub fn run(batch_json: &Path, enqueue: bool) -> Result<()> {
    let f = File::open(batch_json)
        .with_context(|| format!("can't open batch file {}", batch_json.display()))?;
    let request: IngestionRequest = serde_json::from_reader(f)
        .with_context(|| format!("can't parse batch file {}", batch_json.display()))?;

    let mut conn = db::connect()?;
    if enqueue {
        let payload = serde_json::to_value(&request)
            .context("can't serialize ingestion request")?;
        let job = enqueue_job(
            queues::INGESTION,
            "process-ingestion-batch",
            payload,
            EnqueueOptions::default(),
            &mut conn,
        )?;
        println!("Enqueued queue job {}", job.id);
    } else {
        let config = Config::load()?;
        let report = process_ingestion_job(&request, &config, &mut conn)?;
        println!(
            "Job {}: {} total, {} recorded, {} errors",
            report.job_id, report.stats.total, report.stats.recorded, report.stats.errors,
        );
    }
    Ok(())
}
