//! Ingestion runs.
//!
//! A run discovers message files that are not in the index yet, orders them
//! by date and appends each one to its list's current shard. Failures are
//! confined to the message that caused them; the index only records
//! messages whose record was written.

use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use mailarchiver_mime::{MessageDate, RawMessage, parse_date};
use tracing::{debug, error, info, warn};

use crate::config::ArchiverConfig;
use crate::identity::{IdentityResolver, ListIdentity};
use crate::index::IngestionIndex;
use crate::maildir::{find_maildirs, message_files};
use crate::normalize::HeaderNormalizer;
use crate::record::RecordBuilder;
use crate::shard::ShardSelector;
use crate::store::{GitStore, ObjectStore};
use crate::{Error, Result};

/// A message file selected for archiving.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Message file.
    pub path: PathBuf,
    /// Index key derived from the file name.
    pub key: String,
    /// `Date` header, used for ordering.
    pub date: MessageDate,
    /// Archive the message is routed to.
    pub identity: ListIdentity,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Message files not yet in the index.
    pub discovered: usize,
    /// Message files skipped because their key is indexed.
    pub already_indexed: usize,
    /// Files sharing a key with an earlier file of the same run.
    pub duplicates: usize,
    /// Records appended.
    pub archived: usize,
    /// Messages skipped for lack of a `Message-Id`.
    pub skipped_missing_id: usize,
    /// Messages whose `Date` could not be parsed.
    pub defaulted_dates: usize,
    /// Messages that could not be read or stored.
    pub failed: usize,
    /// Archives created.
    pub archives_created: usize,
    /// Shards created, including each new archive's first shard.
    pub shards_created: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} archived, {} skipped without Message-Id, {} failed, {} new archives, {} new shards",
            self.archived,
            self.skipped_missing_id,
            self.failed,
            self.archives_created,
            self.shards_created
        )
    }
}

/// Ordered work for a run.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    /// Messages to archive, oldest first.
    pub candidates: Vec<Candidate>,
    /// Discovery counters.
    pub summary: RunSummary,
}

/// Archives maildir messages into sharded list archives.
#[derive(Debug)]
pub struct Archiver<S = GitStore> {
    config: ArchiverConfig,
    index: IngestionIndex,
    shards: ShardSelector<S>,
    resolver: IdentityResolver,
    builder: RecordBuilder,
}

impl<S: ObjectStore> Archiver<S> {
    /// Prepares a run: validates `config`, loads the index and scans the
    /// archive root.
    ///
    /// Nothing is written unless the archive root has to be created.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, the mail root is
    /// missing, the index is unreadable, or the archive root cannot be
    /// created or scanned.
    pub fn open(config: ArchiverConfig) -> Result<Self> {
        config.validate()?;

        if !config.mail_root.is_dir() {
            return Err(Error::MailRootNotFound(config.mail_root.clone()));
        }

        let index = IngestionIndex::load(&config.index_path)?;
        let shards = ShardSelector::load(&config.archive_root, config.max_records_per_shard)?;
        if !config.dry_run {
            std::fs::create_dir_all(&config.archive_root)?;
        }

        let resolver =
            IdentityResolver::new(&config.unknown_list_address, &config.assorted_bucket);
        let builder = RecordBuilder::new(
            HeaderNormalizer::new(config.unknown_author_address.clone()),
            resolver.clone(),
        );

        Ok(Self {
            config,
            index,
            shards,
            resolver,
            builder,
        })
    }

    /// The run's configuration.
    #[must_use]
    pub const fn config(&self) -> &ArchiverConfig {
        &self.config
    }

    /// The ingestion index as of now.
    #[must_use]
    pub const fn index(&self) -> &IngestionIndex {
        &self.index
    }

    /// The shard registry as of now.
    #[must_use]
    pub const fn shards(&self) -> &ShardSelector<S> {
        &self.shards
    }

    /// Discovers, classifies and orders the messages to archive.
    ///
    /// Only headers are read. Messages without a `Message-Id` are left
    /// out; messages with an unusable `Date` sort as the epoch.
    ///
    /// # Errors
    ///
    /// Returns an error if the mail root is missing.
    pub fn plan(&self) -> Result<Plan> {
        let mut summary = RunSummary::default();
        let mut candidates = Vec::new();
        let mut seen = HashSet::new();

        for maildir in find_maildirs(&self.config.mail_root)? {
            let files = match message_files(&maildir) {
                Ok(files) => files,
                Err(e) => {
                    warn!(path = %maildir.display(), error = %e, "Skipping unreadable maildir");
                    continue;
                }
            };

            for path in files {
                let Some(key) = self.config.index_key.key_for(&path) else {
                    warn!(
                        path = %path.display(),
                        "Skipping file whose name is not UTF-8 or contains whitespace"
                    );
                    summary.failed += 1;
                    continue;
                };

                if self.index.contains(&key) {
                    summary.already_indexed += 1;
                    continue;
                }
                summary.discovered += 1;

                if !seen.insert(key.clone()) {
                    debug!(path = %path.display(), key, "Key already queued, skipping copy");
                    summary.duplicates += 1;
                    continue;
                }

                if let Some(candidate) = self.classify(path, key, &mut summary) {
                    candidates.push(candidate);
                }
            }
        }

        candidates.sort_by(|a, b| {
            a.date
                .datetime
                .cmp(&b.date.datetime)
                .then_with(|| a.path.cmp(&b.path))
        });

        info!(
            discovered = summary.discovered,
            queued = candidates.len(),
            already_indexed = summary.already_indexed,
            "Planned run"
        );

        Ok(Plan {
            candidates,
            summary,
        })
    }

    /// Reads a message's headers and turns it into a candidate.
    fn classify(&self, path: PathBuf, key: String, summary: &mut RunSummary) -> Option<Candidate> {
        let headers = match RawMessage::read_headers(&path) {
            Ok(headers) => headers,
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read message headers");
                summary.failed += 1;
                return None;
            }
        };

        if headers.get("message-id").is_none_or(|id| id.trim().is_empty()) {
            warn!(path = %path.display(), "Skipping message without Message-Id");
            summary.skipped_missing_id += 1;
            return None;
        }

        let date = parse_date(headers.get("date"));
        if date.is_defaulted() {
            warn!(path = %path.display(), date = ?headers.get("date"), "Unusable Date header, ordering as epoch");
            summary.defaulted_dates += 1;
        }

        Some(Candidate {
            identity: self.resolver.resolve(&headers),
            path,
            key,
            date,
        })
    }

    /// Runs ingestion to completion.
    ///
    /// In dry-run mode the plan is logged and nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery fails or the index cannot be
    /// persisted. Errors of individual messages are counted, not returned.
    pub fn run(&mut self) -> Result<RunSummary> {
        let Plan {
            candidates,
            mut summary,
        } = self.plan()?;

        if candidates.is_empty() {
            info!("Nothing to archive");
            return Ok(summary);
        }

        if self.config.dry_run {
            for candidate in &candidates {
                info!(
                    path = %candidate.path.display(),
                    list = %candidate.identity,
                    date = %candidate.date.datetime,
                    "Would archive"
                );
            }
            info!(queued = candidates.len(), "Dry run, nothing written");
            return Ok(summary);
        }

        let mut since_checkpoint = 0;
        for candidate in candidates {
            match self.archive(&candidate) {
                Ok(()) => {
                    self.index.add(candidate.key);
                    summary.archived += 1;
                    since_checkpoint += 1;

                    if let Some(interval) = self.config.checkpoint_interval
                        && since_checkpoint >= interval
                    {
                        self.index.persist()?;
                        since_checkpoint = 0;
                        info!(archived = summary.archived, "Checkpoint");
                    }
                }
                Err(Error::MissingMessageId) => {
                    warn!(path = %candidate.path.display(), "Skipping message without Message-Id");
                    summary.skipped_missing_id += 1;
                }
                Err(e) => {
                    error!(path = %candidate.path.display(), error = %e, "Failed to archive message");
                    summary.failed += 1;
                }
            }
        }

        self.index.persist()?;

        summary.archives_created = self.shards.archives_created();
        summary.shards_created = self.shards.shards_created();
        info!(
            archived = summary.archived,
            skipped_missing_id = summary.skipped_missing_id,
            defaulted_dates = summary.defaulted_dates,
            failed = summary.failed,
            archives_created = summary.archives_created,
            shards_created = summary.shards_created,
            "Run complete"
        );

        Ok(summary)
    }

    /// Appends one candidate to its archive.
    fn archive(&mut self, candidate: &Candidate) -> Result<()> {
        let message = RawMessage::load(&candidate.path)?;
        let shard = self.shards.select(&candidate.identity)?;
        self.builder.append(shard, &message)?;
        Ok(())
    }
}
