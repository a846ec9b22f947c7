//! `mailarchiver` - maildir to sharded git archive converter
//!
//! Walks a maildir tree and appends every new mailing list message to its
//! list's archive, one commit per message.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use mailarchiver_core::{Archiver, ArchiverConfig, IndexKeyScheme};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command line arguments. Flags override the configuration file.
#[derive(Parser, Debug)]
#[command(
    name = "mailarchiver",
    version,
    about = "Archive maildir mailing list mail into sharded, append-only git repositories"
)]
struct Cli {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory searched for maildirs
    #[arg(long)]
    mail_root: Option<PathBuf>,

    /// Directory holding the list archives
    #[arg(long)]
    archive_root: Option<PathBuf>,

    /// Ingestion index file
    #[arg(long)]
    index: Option<PathBuf>,

    /// Records per shard before rolling over
    #[arg(long)]
    max_records: Option<u64>,

    /// How index keys are derived from file names (`file-name` or `imap-prefix`)
    #[arg(long)]
    index_key: Option<IndexKeyScheme>,

    /// Persist the index every N archived messages
    #[arg(long)]
    checkpoint: Option<usize>,

    /// Show what would be archived without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    /// Loads the configuration file, if any, and applies flag overrides.
    fn resolve_config(&self) -> anyhow::Result<ArchiverConfig> {
        let mut config = match &self.config {
            Some(path) => ArchiverConfig::load(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?,
            None => ArchiverConfig::default(),
        };

        if let Some(mail_root) = &self.mail_root {
            config.mail_root.clone_from(mail_root);
        }
        if let Some(archive_root) = &self.archive_root {
            config.archive_root.clone_from(archive_root);
        }
        if let Some(index) = &self.index {
            config.index_path.clone_from(index);
        }
        if let Some(max_records) = self.max_records {
            config.max_records_per_shard = max_records;
        }
        if let Some(index_key) = self.index_key {
            config.index_key = index_key;
        }
        if self.checkpoint.is_some() {
            config.checkpoint_interval = self.checkpoint;
        }
        config.dry_run |= self.dry_run;

        Ok(config)
    }

    fn default_filter(&self) -> &'static str {
        if self.verbose {
            "mailarchiver=debug,mailarchiver_core=debug"
        } else {
            "mailarchiver=info,mailarchiver_core=info"
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.default_filter().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.resolve_config()?;
    info!(
        mail_root = %config.mail_root.display(),
        archive_root = %config.archive_root.display(),
        dry_run = config.dry_run,
        "Starting mailarchiver"
    );

    let mut archiver: Archiver = Archiver::open(config).context("Failed to prepare run")?;
    let summary = archiver.run().context("Run aborted")?;
    info!(%summary, "Finished");

    Ok(())
}
