//! Database models.

mod deal;
mod ingestion_error;
mod ingestion_job;
mod merchant;
mod queue_job;
mod raw_deal;
mod status;

pub use self::deal::*;
pub use self::ingestion_error::*;
pub use self::ingestion_job::*;
pub use self::merchant::*;
pub use self::queue_job::*;
pub use self::raw_deal::*;
pub use self::status::*;
