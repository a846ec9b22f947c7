//! # mailarchiver-core
//!
//! Archival engine for `mailarchiver`.
//!
//! This crate provides:
//! - **Header Normalization** - author, date and subject from malformed headers
//! - **Identity Resolution** - which list archive a message belongs to
//! - **Sharding** - size-bounded git repositories per list, with rollover
//! - **Records** - one commit per message, holding the verbatim message
//! - **Ingestion Index** - resumable, idempotent runs over a maildir tree
//! - **Configuration** - JSON run settings with validation
//!
//! ## Layout
//!
//! ```text
//! <archive_root>/<list>/<ordinal>    bare repository, history on refs/heads/master
//! <index_path>                       sorted keys of archived message files
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use mailarchiver_core::{Archiver, ArchiverConfig};
//!
//! # fn main() -> mailarchiver_core::Result<()> {
//! let config = ArchiverConfig::load("archiver.json".as_ref())?;
//! let mut archiver: Archiver = Archiver::open(config)?;
//! let summary = archiver.run()?;
//! println!("{summary}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod config;
mod driver;
mod error;
pub mod identity;
pub mod index;
pub mod maildir;
pub mod normalize;
pub mod record;
pub mod shard;
pub mod store;

pub use config::{ArchiverConfig, IndexKeyScheme, ValidationError, validate_config};
pub use driver::{Archiver, Candidate, Plan, RunSummary};
pub use error::{Error, Result};
pub use identity::{IdentityResolver, ListIdentity};
pub use index::IngestionIndex;
pub use normalize::{Author, HeaderNormalizer};
pub use record::{RECORD_ENTRY_NAME, RecordBuilder};
pub use shard::{Shard, ShardSelector};
pub use store::{GitStore, ObjectStore, Signature};
