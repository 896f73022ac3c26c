//! Subcommands of the `dealforge` CLI.

pub mod ingest;
pub mod job;
pub mod migrate;
pub mod promote;
pub mod reject;
