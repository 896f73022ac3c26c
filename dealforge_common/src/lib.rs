//! Code shared between the dealforge pipeline tools.
//!
//! This crate owns the ingestion-and-promotion core: the quality scorer,
//! the merchant/location resolver, the ingestion recorder, the promotion
//! engine, and the durable queue that drives them. The worker and CLI
//! binaries are thin shells around the functions exported here.

#![warn(missing_docs)]

pub use anyhow;
pub use chrono;
pub use diesel;
pub use serde_json;
pub use uuid;

pub mod config;
pub mod dates;
pub mod db;
pub mod ingest;
pub mod models;
pub mod payload;
pub mod promote;
pub mod quality;
pub mod queue;
pub mod resolve;
#[allow(missing_docs)]
pub mod schema;
pub mod tracing_support;

/// Common imports used by many modules.
pub mod prelude {
    pub use anyhow::{anyhow, bail, Context as _};
    pub use chrono::{NaiveDateTime, Utc};
    pub use diesel::{self, prelude::*, PgConnection};
    pub use serde::{Deserialize, Serialize};
    pub use std::collections::HashMap;
    pub use tracing::{debug, error, info, trace, warn};
    pub use uuid::Uuid;

    pub use crate::models::*;
    pub use crate::{Error, Result};
}

/// Error type for this crate's functions.
pub type Error = anyhow::Error;

/// Result type for this crate's functions.
pub type Result<T> = std::result::Result<T, Error>;

/// Our version, for `--version` output in all three binaries.
pub fn dealforge_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
