//! Record construction.
//!
//! A record is one commit whose tree holds the verbatim message as its only
//! file. Commits of a shard form a single chain in append order.

use mailarchiver_mime::RawMessage;
use tracing::debug;

use crate::identity::IdentityResolver;
use crate::normalize::HeaderNormalizer;
use crate::shard::Shard;
use crate::store::{ObjectStore, Signature};
use crate::{Error, Result};

/// File name of the message inside a record's tree.
pub const RECORD_ENTRY_NAME: &str = "m";

/// Appends messages to shards as records.
#[derive(Debug, Clone)]
pub struct RecordBuilder {
    normalizer: HeaderNormalizer,
    resolver: IdentityResolver,
}

impl RecordBuilder {
    /// Creates a builder.
    #[must_use]
    pub const fn new(normalizer: HeaderNormalizer, resolver: IdentityResolver) -> Self {
        Self {
            normalizer,
            resolver,
        }
    }

    /// Appends `message` to `shard` and returns the new record's id.
    ///
    /// The author comes from `From` and `Date`, the committer is the
    /// archive name with the list's posting address at the current time,
    /// and the commit message is the decoded subject.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingMessageId`] without writing anything if the
    /// message has no `Message-Id`, or a store error if an object cannot be
    /// written. The shard's record count only changes on success.
    pub fn append<S: ObjectStore>(
        &self,
        shard: &mut Shard<S>,
        message: &RawMessage,
    ) -> Result<S::Id> {
        let message_id = message.message_id().ok_or(Error::MissingMessageId)?;
        let headers = &message.headers;

        let author = self.normalizer.author(headers);
        let subject = HeaderNormalizer::subject(headers);
        let committer = Signature::now(
            shard.identity().as_str(),
            self.resolver.posting_address(headers),
        );

        let store = shard.store();
        let blob = store.put_blob(&message.bytes)?;
        let tree = store.put_single_entry_tree(RECORD_ENTRY_NAME, blob)?;
        let parent = store.head()?;
        let id = store.put_commit(parent, &author.signature(), &committer, &subject, tree)?;

        shard.record_appended();
        debug!(
            %id,
            message_id,
            list = %shard.identity(),
            ordinal = shard.ordinal(),
            records = shard.records(),
            "Appended record"
        );

        Ok(id)
    }
}
