//! The `reject` subcommand.

use dealforge_common::{db, prelude::*, promote::reject_ingested_deals_by_ids};
use uuid::Uuid;

/// Reject pending raw deals. Rows already promoted, rejected, or errored
/// are left untouched.
pub fn run(ids: &[Uuid]) -> Result<()> {
    let mut conn = db::connect()?;
    let updated = reject_ingested_deals_by_ids(ids, &mut conn)?;
    println!("{} of {} rows rejected", updated, ids.len());
    Ok(())
}
