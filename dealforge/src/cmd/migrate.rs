//! The `migrate` subcommand.

use dealforge_common::{db, prelude::*};

/// Migrate the database schema to the latest version.
pub fn run() -> Result<()> {
    let mut conn = db::connect()?;
    db::run_pending_migrations(&mut conn)?;
    println!("Schema is up to date.");
    Ok(())
}
