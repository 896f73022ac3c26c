//! The `promote` subcommand.

use dealforge_common::{
    config::Config,
    db,
    prelude::*,
    promote::{promote_ingested_deals_by_ids, promote_pending_ingested_deals},
};
use uuid::Uuid;

/// Promote pending raw deals, either a FIFO batch or an explicit set.
pub fn run(limit: i64, ids: &[Uuid]) -> Result<()> {
    let config = Config::load()?;
    let mut conn = db::connect()?;

    let report = if ids.is_empty() {
        promote_pending_ingested_deals(limit, &config, &mut conn)?
    } else {
        promote_ingested_deals_by_ids(ids, &config, &mut conn)?
    };

    println!(
        "{} fetched, {} promoted, {} errors",
        report.fetched, report.promoted, report.errors,
    );
    Ok(())
}
