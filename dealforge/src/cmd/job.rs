//! The `job` subcommand.

use clap::Subcommand;
use dealforge_common::{db, prelude::*};
use prettytable::{format, row, Table};
use uuid::Uuid;

/// The `job` subcommand.
#[derive(Debug, Subcommand)]
pub enum Opt {
    /// List recent ingestion jobs.
    Ls {
        /// How many jobs to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Describe one ingestion job, including its recorded errors.
    Describe {
        /// The job to describe.
        id: Uuid,
    },
}

/// Run the `job` subcommand.
pub fn run(opt: &Opt) -> Result<()> {
    match opt {
        Opt::Ls { limit } => run_ls(*limit),
        Opt::Describe { id } => run_describe(*id),
    }
}

fn run_ls(limit: i64) -> Result<()> {
    let mut conn = db::connect()?;
    let jobs = IngestionJob::recent(limit, &mut conn)?;

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_CLEAN);
    table.set_titles(row!["ID", "SOURCE", "SCOPE", "STATUS", "TOTAL", "RECORDED", "ERRORS"]);
    for job in jobs {
        table.add_row(row![
            job.id,
            job.source,
            job.scope.as_deref().unwrap_or("-"),
            job.status,
            job.total_count,
            job.recorded_count,
            job.error_count,
        ]);
    }
    table.printstd();
    Ok(())
}

fn run_describe(id: Uuid) -> Result<()> {
    let mut conn = db::connect()?;
    let job = IngestionJob::find(id, &mut conn)?;

    println!("Job {}", job.id);
    println!("  source:   {}", job.source);
    println!("  scope:    {}", job.scope.as_deref().unwrap_or("-"));
    println!("  status:   {}", job.status);
    println!("  started:  {}", job.started_at);
    match job.finished_at {
        Some(finished) => println!("  finished: {}", finished),
        None => println!("  finished: -"),
    }
    println!(
        "  stats:    {} total, {} recorded, {} errors",
        job.total_count, job.recorded_count, job.error_count,
    );

    let errors = IngestionError::for_job(job.id, &mut conn)?;
    if !errors.is_empty() {
        println!("  errors:");
        for error in errors {
            println!("    [{}] {}", error.stage, error.error_message);
        }
    }
    Ok(())
}
