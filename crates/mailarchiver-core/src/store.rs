//! Content-addressed object storage for shards.
//!
//! A shard is one repository with a single linear history. The archiver
//! only needs a handful of plumbing operations, captured by [`ObjectStore`];
//! [`GitStore`] implements them on bare git repositories.

use std::fmt;
use std::path::Path;

use git2::{ErrorCode, FileMode, Oid, Repository, Sort, Time};

use crate::Result;

/// The branch every shard's history lives on.
pub const HEAD_REF: &str = "refs/heads/master";

/// Identity and timestamp attached to a commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    /// Display name.
    pub name: String,
    /// Email address.
    pub email: String,
    /// Seconds since the Unix epoch.
    pub time: i64,
    /// Offset from UTC in minutes.
    pub offset_minutes: i32,
}

impl Signature {
    /// A signature stamped with the current time in UTC.
    #[must_use]
    pub fn now(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            time: chrono::Utc::now().timestamp(),
            offset_minutes: 0,
        }
    }

    fn to_git(&self) -> Result<git2::Signature<'static>> {
        let time = Time::new(self.time, self.offset_minutes);
        Ok(git2::Signature::new(&self.name, &self.email, &time)?)
    }
}

/// Plumbing operations the archiver drives on one shard repository.
///
/// Ids are opaque content addresses.
pub trait ObjectStore: Sized {
    /// Content address of a stored object.
    type Id: Copy + Eq + fmt::Debug + fmt::Display;

    /// Initializes a new, empty store at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be created.
    fn create(path: &Path) -> Result<Self>;

    /// Opens an existing store.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is not a store.
    fn open(path: &Path) -> Result<Self>;

    /// Stores `data` as a blob.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be written.
    fn put_blob(&self, data: &[u8]) -> Result<Self::Id>;

    /// Stores a tree holding exactly one regular file `name` → `blob`.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be written.
    fn put_single_entry_tree(&self, name: &str, blob: Self::Id) -> Result<Self::Id>;

    /// Stores a commit and advances the head to it.
    ///
    /// `parent` must be the current head (`None` for an empty store).
    ///
    /// # Errors
    ///
    /// Returns an error if the commit cannot be written or the head moved
    /// since `parent` was read.
    fn put_commit(
        &self,
        parent: Option<Self::Id>,
        author: &Signature,
        committer: &Signature,
        message: &str,
        tree: Self::Id,
    ) -> Result<Self::Id>;

    /// The current head, or `None` if nothing was committed yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the head reference cannot be read.
    fn head(&self) -> Result<Option<Self::Id>>;

    /// Number of commits reachable from the head along first parents.
    ///
    /// # Errors
    ///
    /// Returns an error if the history cannot be walked.
    fn history_len(&self) -> Result<u64>;
}

/// A bare git repository used as a shard.
pub struct GitStore {
    repo: Repository,
}

impl fmt::Debug for GitStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GitStore")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl GitStore {
    /// The underlying repository.
    #[must_use]
    pub const fn repository(&self) -> &Repository {
        &self.repo
    }
}

impl ObjectStore for GitStore {
    type Id = Oid;

    fn create(path: &Path) -> Result<Self> {
        std::fs::create_dir_all(path)?;
        let repo = Repository::init_bare(path)?;
        // Pin the branch name regardless of init.defaultBranch.
        repo.set_head(HEAD_REF)?;
        Ok(Self { repo })
    }

    fn open(path: &Path) -> Result<Self> {
        Ok(Self {
            repo: Repository::open_bare(path)?,
        })
    }

    fn put_blob(&self, data: &[u8]) -> Result<Oid> {
        Ok(self.repo.blob(data)?)
    }

    fn put_single_entry_tree(&self, name: &str, blob: Oid) -> Result<Oid> {
        let mut builder = self.repo.treebuilder(None)?;
        builder.insert(name, blob, i32::from(FileMode::Blob))?;
        Ok(builder.write()?)
    }

    fn put_commit(
        &self,
        parent: Option<Oid>,
        author: &Signature,
        committer: &Signature,
        message: &str,
        tree: Oid,
    ) -> Result<Oid> {
        let tree = self.repo.find_tree(tree)?;
        let parent = parent.map(|oid| self.repo.find_commit(oid)).transpose()?;
        let parents: Vec<&git2::Commit<'_>> = parent.iter().collect();

        Ok(self.repo.commit(
            Some(HEAD_REF),
            &author.to_git()?,
            &committer.to_git()?,
            message,
            &tree,
            &parents,
        )?)
    }

    fn head(&self) -> Result<Option<Oid>> {
        match self.repo.find_reference(HEAD_REF) {
            Ok(reference) => Ok(reference.target()),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn history_len(&self) -> Result<u64> {
        let Some(head) = self.head()? else {
            return Ok(0);
        };

        let mut walk = self.repo.revwalk()?;
        walk.set_sorting(Sort::TOPOLOGICAL)?;
        walk.simplify_first_parent()?;
        walk.push(head)?;

        let mut count = 0;
        for oid in walk {
            oid?;
            count += 1;
        }
        Ok(count)
    }
}
