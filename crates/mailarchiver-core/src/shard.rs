//! Shard registry and selection.
//!
//! Each list archive is a directory of numbered shards:
//!
//! ```text
//! <archive_root>/<identity>/0
//! <archive_root>/<identity>/1
//! ```
//!
//! Only the highest-numbered shard of an archive accepts appends. Once it
//! holds the maximum number of records a new shard is started next to it.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::identity::ListIdentity;
use crate::store::{GitStore, ObjectStore};
use crate::{Error, Result};

/// One size-bounded repository of an archive.
#[derive(Debug)]
pub struct Shard<S = GitStore> {
    identity: ListIdentity,
    ordinal: u32,
    path: PathBuf,
    records: u64,
    store: S,
}

impl<S: ObjectStore> Shard<S> {
    /// The archive this shard belongs to.
    #[must_use]
    pub const fn identity(&self) -> &ListIdentity {
        &self.identity
    }

    /// Position of the shard within its archive, starting at 0.
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// Repository location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records currently in the shard.
    #[must_use]
    pub const fn records(&self) -> u64 {
        self.records
    }

    /// The shard's object store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns `true` if the shard accepts no more appends.
    #[must_use]
    pub const fn is_full(&self, max_records: u64) -> bool {
        self.records >= max_records
    }

    pub(crate) const fn record_appended(&mut self) {
        self.records += 1;
    }
}

/// Registry of every archive's shards, owned by one run.
#[derive(Debug)]
pub struct ShardSelector<S = GitStore> {
    root: PathBuf,
    max_records: u64,
    archives: BTreeMap<ListIdentity, Vec<Shard<S>>>,
    archives_created: usize,
    shards_created: usize,
}

impl<S: ObjectStore> ShardSelector<S> {
    /// Scans `root` for existing shards and counts their records.
    ///
    /// A missing root yields an empty registry; it is created with the first
    /// shard. Entries that are not archives or shards are skipped, as are
    /// numbered directories that cannot be opened as a repository.
    ///
    /// # Errors
    ///
    /// Returns an error if `root` exists but is not a directory, or if an
    /// archive directory cannot be listed.
    pub fn load(root: impl Into<PathBuf>, max_records: u64) -> Result<Self> {
        let root = root.into();
        let mut archives = BTreeMap::new();

        if root.exists() {
            if !root.is_dir() {
                return Err(Error::InvalidLayout(format!(
                    "archive root {} is not a directory",
                    root.display()
                )));
            }

            for entry in std::fs::read_dir(&root)? {
                let entry = entry?;
                if !entry.file_type()?.is_dir() {
                    continue;
                }
                let name = entry.file_name();
                let Some(identity) = name
                    .to_str()
                    .filter(|name| ListIdentity::is_safe(name))
                    .and_then(ListIdentity::sanitize)
                else {
                    warn!(path = %entry.path().display(), "Skipping directory that is not an archive");
                    continue;
                };

                let shards = load_archive(&identity, &entry.path())?;
                if !shards.is_empty() {
                    archives.insert(identity, shards);
                }
            }
        }

        let shard_count: usize = archives.values().map(Vec::len).sum();
        info!(
            root = %root.display(),
            archives = archives.len(),
            shards = shard_count,
            "Loaded archive registry"
        );

        Ok(Self {
            root,
            max_records,
            archives,
            archives_created: 0,
            shards_created: 0,
        })
    }

    /// Returns the shard the next record for `identity` goes to.
    ///
    /// Creates the archive's first shard, or its next shard when the
    /// current one is full. Otherwise nothing is written.
    ///
    /// # Errors
    ///
    /// Returns an error if a new shard cannot be created.
    pub fn select(&mut self, identity: &ListIdentity) -> Result<&mut Shard<S>> {
        let next = match self.archives.get(identity).and_then(|shards| shards.last()) {
            None => Some(0),
            Some(shard) if shard.is_full(self.max_records) => Some(shard.ordinal + 1),
            Some(_) => None,
        };

        if let Some(ordinal) = next {
            let shard = self.create_shard(identity, ordinal)?;
            let shards = self.archives.entry(identity.clone()).or_default();
            if shards.is_empty() {
                self.archives_created += 1;
            }
            shards.push(shard);
        }

        self.archives
            .get_mut(identity)
            .and_then(|shards| shards.last_mut())
            .ok_or_else(|| Error::InvalidLayout(format!("archive {identity} has no shards")))
    }

    /// Shards of one archive, lowest ordinal first.
    #[must_use]
    pub fn shards(&self, identity: &ListIdentity) -> &[Shard<S>] {
        self.archives.get(identity).map_or(&[], Vec::as_slice)
    }

    /// Known archives in name order.
    pub fn identities(&self) -> impl Iterator<Item = &ListIdentity> {
        self.archives.keys()
    }

    /// Archives created since the registry was loaded.
    #[must_use]
    pub const fn archives_created(&self) -> usize {
        self.archives_created
    }

    /// Shards created since the registry was loaded.
    #[must_use]
    pub const fn shards_created(&self) -> usize {
        self.shards_created
    }

    fn create_shard(&mut self, identity: &ListIdentity, ordinal: u32) -> Result<Shard<S>> {
        let path = self.root.join(identity.as_str()).join(ordinal.to_string());
        let store = S::create(&path)?;
        self.shards_created += 1;

        if ordinal == 0 {
            info!(list = %identity, path = %path.display(), "Created archive");
        } else {
            info!(
                list = %identity,
                ordinal,
                max_records = self.max_records,
                "Shard full, rolled over"
            );
        }

        Ok(Shard {
            identity: identity.clone(),
            ordinal,
            path,
            records: 0,
            store,
        })
    }
}

/// Opens every numbered shard below an archive directory.
fn load_archive<S: ObjectStore>(identity: &ListIdentity, dir: &Path) -> Result<Vec<Shard<S>>> {
    let mut shards = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let ordinal = name.to_str().and_then(|name| {
            name.parse::<u32>()
                .ok()
                .filter(|ordinal| ordinal.to_string() == name)
        });

        let Some(ordinal) = ordinal.filter(|_| path.is_dir()) else {
            warn!(path = %path.display(), "Skipping entry that is not a shard");
            continue;
        };

        let (store, records) =
            match S::open(&path).and_then(|store| store.history_len().map(|n| (store, n))) {
                Ok(loaded) => loaded,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable shard");
                    continue;
                }
            };
        debug!(list = %identity, ordinal, records, "Loaded shard");

        shards.push(Shard {
            identity: identity.clone(),
            ordinal,
            path,
            records,
            store,
        });
    }

    shards.sort_by_key(|shard| shard.ordinal);
    Ok(shards)
}
