//! Maildir discovery.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::{Error, Result};

/// Sub-directories that make a directory a maildir.
const MAILDIR_SUBDIRS: [&str; 3] = ["cur", "new", "tmp"];

/// Sub-directories holding delivered messages. `tmp` is still being written.
const MESSAGE_SUBDIRS: [&str; 2] = ["cur", "new"];

/// Returns `true` if `dir` has `cur`, `new` and `tmp` sub-directories.
#[must_use]
pub fn is_maildir(dir: &Path) -> bool {
    MAILDIR_SUBDIRS.iter().all(|sub| dir.join(sub).is_dir())
}

/// Finds every maildir at or below `root`, in walk order.
///
/// Hidden directories are searched too, so Maildir++ folders such as
/// `.Lists.dev` are found. The walk does not enter the message directories
/// of a maildir. Unreadable directories are logged and skipped.
///
/// # Errors
///
/// Returns [`Error::MailRootNotFound`] if `root` is not a directory.
pub fn find_maildirs(root: &Path) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        return Err(Error::MailRootNotFound(root.to_path_buf()));
    }

    let walker = WalkDir::new(root)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_maildir_subdir(entry.path()));

    let mut maildirs = Vec::new();
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "Skipping unreadable path during discovery");
                continue;
            }
        };

        if entry.file_type().is_dir() && is_maildir(entry.path()) {
            debug!(path = %entry.path().display(), "Found maildir");
            maildirs.push(entry.into_path());
        }
    }

    Ok(maildirs)
}

/// Lists the message files in a maildir's `cur` and `new`, sorted by path.
///
/// # Errors
///
/// Returns an error if either directory cannot be read.
pub fn message_files(maildir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for sub in MESSAGE_SUBDIRS {
        for entry in std::fs::read_dir(maildir.join(sub))? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
    }

    files.sort();
    Ok(files)
}

fn is_maildir_subdir(path: &Path) -> bool {
    let is_named = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| MAILDIR_SUBDIRS.contains(&name));

    is_named && path.is_dir() && path.parent().is_some_and(is_maildir)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn make_maildir(path: &Path) {
        for sub in MAILDIR_SUBDIRS {
            std::fs::create_dir_all(path.join(sub)).unwrap();
        }
    }

    #[test]
    fn test_missing_root() {
        let dir = tempfile::tempdir().unwrap();
        let result = find_maildirs(&dir.path().join("missing"));
        assert!(matches!(result, Err(Error::MailRootNotFound(_))));
    }

    #[test]
    fn test_finds_nested_and_hidden_maildirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        make_maildir(&root.join("INBOX"));
        make_maildir(&root.join("INBOX").join(".Lists.dev"));
        make_maildir(&root.join("work").join("lists"));
        std::fs::create_dir_all(root.join("not-a-maildir").join("cur")).unwrap();

        let found = find_maildirs(root).unwrap();
        assert_eq!(
            found,
            vec![
                root.join("INBOX"),
                root.join("INBOX").join(".Lists.dev"),
                root.join("work").join("lists"),
            ]
        );
    }

    #[test]
    fn test_does_not_enter_message_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        make_maildir(root);
        // A maildir-shaped tree inside cur is message storage, not a folder.
        make_maildir(&root.join("cur").join("odd"));

        assert_eq!(find_maildirs(root).unwrap(), vec![root.to_path_buf()]);
    }

    #[test]
    fn test_message_files_skip_tmp() {
        let dir = tempfile::tempdir().unwrap();
        let maildir = dir.path();
        make_maildir(maildir);
        std::fs::write(maildir.join("cur").join("b:2,S"), "x").unwrap();
        std::fs::write(maildir.join("new").join("a"), "x").unwrap();
        std::fs::write(maildir.join("tmp").join("partial"), "x").unwrap();
        std::fs::create_dir(maildir.join("new").join("subdir")).unwrap();

        let files = message_files(maildir).unwrap();
        assert_eq!(
            files,
            vec![maildir.join("cur").join("b:2,S"), maildir.join("new").join("a")]
        );
    }
}
