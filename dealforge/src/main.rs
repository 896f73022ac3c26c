//! The dealforge operator CLI.

use clap::Parser;
use dealforge_common::{prelude::*, tracing_support};
use std::path::PathBuf;
use uuid::Uuid;

mod cmd;

/// Command-line options.
#[derive(Debug, Parser)]
#[command(version, about = "Operate the deal ingestion and promotion pipeline.")]
enum Opt {
    /// Submit an ingestion batch from a JSON file.
    Ingest {
        /// Path to a JSON ingestion request.
        batch_json: PathBuf,

        /// Enqueue onto the ingestion queue instead of processing
        /// synchronously.
        #[arg(long)]
        enqueue: bool,
    },

    /// Job-related commands.
    Job {
        #[command(subcommand)]
        cmd: cmd::job::Opt,
    },

    /// Migrate the database schema to the latest version.
    Migrate,

    /// Promote pending raw deals into the catalog.
    Promote {
        /// Promote up to this many pending rows, oldest first.
        #[arg(long, conflicts_with = "ids", default_value_t = 50)]
        limit: i64,

        /// Promote these specific raw rows instead.
        #[arg(long = "id")]
        ids: Vec<Uuid>,
    },

    /// Reject pending raw deals.
    Reject {
        /// The raw rows to reject.
        #[arg(required = true)]
        ids: Vec<Uuid>,
    },
}

fn main() -> Result<()> {
    tracing_support::initialize_tracing();
    let opt = Opt::parse();
    debug!("args: {:?}", opt);

    match opt {
        Opt::Ingest { ref batch_json, enqueue } => cmd::ingest::run(batch_json, enqueue),
        Opt::Job { ref cmd } => cmd::job::run(cmd),
        Opt::Migrate => cmd::migrate::run(),
        Opt::Promote { limit, ref ids } => cmd::promote::run(limit, ids),
        Opt::Reject { ref ids } => cmd::reject::run(ids),
    }
}
