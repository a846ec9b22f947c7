//! Configuration model types.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default upper bound on records per shard.
pub const DEFAULT_MAX_RECORDS_PER_SHARD: u64 = 350_000;

/// Routing address used when no list header identifies the message.
pub const DEFAULT_UNKNOWN_LIST_ADDRESS: &str = "unknown@address.com";

/// Author address used when the `From` header is unusable.
pub const DEFAULT_UNKNOWN_AUTHOR_ADDRESS: &str = "UNKNOWN@UNKNOWN.COM";

/// Archive receiving administrative and no-archive mail.
pub const DEFAULT_ASSORTED_BUCKET: &str = "ASSORTED";

/// How a message file name is turned into an ingestion index key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IndexKeyScheme {
    /// The file's base name.
    #[default]
    FileName,
    /// The base name without its last dot-delimited segment, when it has at
    /// least two dots. Re-synced copies of one message then share a key.
    ImapPrefix,
}

impl IndexKeyScheme {
    /// Derives the index key for a message file.
    ///
    /// Returns `None` for paths without a UTF-8 file name, and for names
    /// containing whitespace, which the index file cannot store as one key.
    #[must_use]
    pub fn key_for(self, path: &Path) -> Option<String> {
        let name = path
            .file_name()?
            .to_str()
            .filter(|name| !name.contains(char::is_whitespace))?;
        let key = match self {
            Self::FileName => name,
            Self::ImapPrefix if name.matches('.').count() >= 2 => {
                name.rsplit_once('.').map_or(name, |(prefix, _)| prefix)
            }
            Self::ImapPrefix => name,
        };
        Some(key.to_string())
    }
}

impl FromStr for IndexKeyScheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file-name" => Ok(Self::FileName),
            "imap-prefix" => Ok(Self::ImapPrefix),
            other => Err(format!(
                "unknown index key scheme {other:?} (expected \"file-name\" or \"imap-prefix\")"
            )),
        }
    }
}

/// Settings for one archiving run.
///
/// Every field has a default, so a configuration file only needs to name
/// what it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ArchiverConfig {
    /// Directory searched recursively for maildirs.
    pub mail_root: PathBuf,
    /// Directory holding one sub-directory per list archive.
    pub archive_root: PathBuf,
    /// File listing the keys of already archived messages.
    pub index_path: PathBuf,
    /// A shard holding this many records is closed for appends.
    pub max_records_per_shard: u64,
    /// Routing fallback when no list header is present.
    pub unknown_list_address: String,
    /// Author fallback when the `From` address is unusable.
    pub unknown_author_address: String,
    /// Archive for administrative and no-archive messages.
    pub assorted_bucket: String,
    /// How index keys are derived from file names.
    pub index_key: IndexKeyScheme,
    /// Persist the index after this many appends, in addition to run end.
    pub checkpoint_interval: Option<usize>,
    /// Plan the run and report it without writing anything.
    pub dry_run: bool,
}

impl Default for ArchiverConfig {
    fn default() -> Self {
        Self {
            mail_root: dirs::home_dir()
                .map_or_else(|| PathBuf::from("Mail"), |home| home.join("Mail")),
            archive_root: PathBuf::from("./archives"),
            index_path: PathBuf::from("./index"),
            max_records_per_shard: DEFAULT_MAX_RECORDS_PER_SHARD,
            unknown_list_address: DEFAULT_UNKNOWN_LIST_ADDRESS.to_string(),
            unknown_author_address: DEFAULT_UNKNOWN_AUTHOR_ADDRESS.to_string(),
            assorted_bucket: DEFAULT_ASSORTED_BUCKET.to_string(),
            index_key: IndexKeyScheme::default(),
            checkpoint_interval: None,
            dry_run: false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_file_name_key() {
        let key = IndexKeyScheme::FileName.key_for(Path::new("/m/cur/1700.M1P2.host:2,S"));
        assert_eq!(key.as_deref(), Some("1700.M1P2.host:2,S"));
    }

    #[test]
    fn test_imap_prefix_key_strips_last_segment() {
        let scheme = IndexKeyScheme::ImapPrefix;
        assert_eq!(
            scheme.key_for(Path::new("cur/1700.M1P2.host:2,S")).as_deref(),
            Some("1700.M1P2")
        );
        assert_eq!(
            scheme.key_for(Path::new("cur/1700.M1P2.host:2,RS")).as_deref(),
            Some("1700.M1P2")
        );
    }

    #[test]
    fn test_imap_prefix_key_needs_two_dots() {
        let scheme = IndexKeyScheme::ImapPrefix;
        assert_eq!(scheme.key_for(Path::new("a.b")).as_deref(), Some("a.b"));
        assert_eq!(scheme.key_for(Path::new("plain")).as_deref(), Some("plain"));
    }

    #[test]
    fn test_names_unfit_for_index_have_no_key() {
        for scheme in [IndexKeyScheme::FileName, IndexKeyScheme::ImapPrefix] {
            assert_eq!(scheme.key_for(Path::new("cur/msg 1")), None);
            assert_eq!(scheme.key_for(Path::new("cur/a.b\tc.d")), None);
            assert_eq!(scheme.key_for(Path::new("/")), None);
        }
    }

    #[test]
    fn test_key_scheme_from_str() {
        assert_eq!("file-name".parse::<IndexKeyScheme>(), Ok(IndexKeyScheme::FileName));
        assert_eq!(
            "imap-prefix".parse::<IndexKeyScheme>(),
            Ok(IndexKeyScheme::ImapPrefix)
        );
        assert!("other".parse::<IndexKeyScheme>().is_err());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ArchiverConfig =
            serde_json::from_str(r#"{"max_records_per_shard": 10, "index_key": "imap-prefix"}"#)
                .unwrap();
        assert_eq!(config.max_records_per_shard, 10);
        assert_eq!(config.index_key, IndexKeyScheme::ImapPrefix);
        assert_eq!(config.assorted_bucket, DEFAULT_ASSORTED_BUCKET);
        assert_eq!(config.archive_root, PathBuf::from("./archives"));
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = serde_json::from_str::<ArchiverConfig>(r#"{"max_records": 10}"#);
        assert!(result.is_err());
    }
}
