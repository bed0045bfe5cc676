/*!
On-disk snapshot directory: naming, selection and retention.

Archives are named `<commit>_<YYYYMMDDThhmm>_<index>.tar.gz`. The timestamp and
the zero-padded index are fixed width, so within one commit a lexicographic
sort of file names is also a chronological sort, and the selector and pruner
work from the directory listing alone.
*/

use crate::{archive, IgnoregretsError, Manifest, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File extension of snapshot archives
pub const ARCHIVE_EXTENSION: &str = ".tar.gz";

/// Timestamp format used in archive names
pub const NAME_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M";

/// Digits of the zero-padded index in archive names
pub const INDEX_WIDTH: usize = 4;

/// Attempts at reserving a fresh archive name before giving up
const MAX_RESERVE_ATTEMPTS: usize = 16;

/// Parsed `(commit, timestamp, index)` key of an archive file name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotName {
    pub commit: String,
    pub timestamp: NaiveDateTime,
    pub index: usize,
}

impl SnapshotName {
    pub fn new<S: Into<String>>(commit: S, timestamp: DateTime<Utc>, index: usize) -> Self {
        Self {
            commit: commit.into(),
            timestamp: timestamp.naive_utc(),
            index,
        }
    }

    /// Render the archive file name
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{:0width$}{}",
            self.commit,
            self.timestamp.format(NAME_TIMESTAMP_FORMAT),
            self.index,
            ARCHIVE_EXTENSION,
            width = INDEX_WIDTH
        )
    }

    /// Parse an archive file name; `None` for anything else
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(ARCHIVE_EXTENSION)?;
        let mut parts = stem.rsplitn(3, '_');
        let index = parts.next()?.parse().ok()?;
        let timestamp = NaiveDateTime::parse_from_str(parts.next()?, NAME_TIMESTAMP_FORMAT).ok()?;
        let commit = parts.next()?;
        if commit.is_empty() {
            return None;
        }
        Some(Self {
            commit: commit.to_string(),
            timestamp,
            index,
        })
    }
}

/// Commit id an archive name is grouped under: the text before the first `_`
pub fn commit_prefix(file_name: &str) -> Option<&str> {
    file_name
        .split_once('_')
        .map(|(commit, _)| commit)
        .filter(|commit| !commit.is_empty())
}

/// One archive on disk together with its decoded manifest
#[derive(Debug, Clone)]
pub struct SnapshotListing {
    pub file_name: String,
    pub path: PathBuf,
    pub size_bytes: u64,
    pub manifest: Manifest,
}

/// Files deleted by a prune, grouped by commit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PruneReport {
    pub deleted: BTreeMap<String, Vec<String>>,
}

impl PruneReport {
    pub fn deleted_count(&self) -> usize {
        self.deleted.values().map(Vec::len).sum()
    }
}

/// Snapshot directory adapter
///
/// # Example
/// ```rust,no_run
/// use ignoregrets_core::SnapshotStore;
///
/// let store = SnapshotStore::new(".ignoregrets/snapshots");
/// let latest = store.latest("abc123")?;
/// let manifest = store.read_manifest(&latest)?;
/// # Ok::<(), ignoregrets_core::IgnoregretsError>(())
/// ```
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// All archive file names in the directory, in no particular order
    ///
    /// A directory that does not exist yet holds no archives.
    pub fn archive_names(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(IgnoregretsError::storage(format!(
                    "Failed to read snapshots directory {}: {}",
                    self.dir.display(),
                    e
                )))
            }
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if name.ends_with(ARCHIVE_EXTENSION) {
                    names.push(name.to_string());
                }
            }
        }
        Ok(names)
    }

    /// Archive names of one commit, newest first
    pub fn names_for_commit(&self, commit: &str) -> Result<Vec<String>> {
        let prefix = format!("{commit}_");
        let mut names: Vec<String> = self
            .archive_names()?
            .into_iter()
            .filter(|name| name.starts_with(&prefix))
            .collect();
        names.sort_unstable_by(|a, b| b.cmp(a));
        Ok(names)
    }

    /// Index the next snapshot of `commit` receives
    ///
    /// The number of archives of the commit, or one past the highest index
    /// still on disk when a prune left gaps below it.
    pub fn next_index(&self, commit: &str) -> Result<usize> {
        let names = self.names_for_commit(commit)?;
        let after_highest = names
            .iter()
            .filter_map(|name| SnapshotName::parse(name))
            .map(|name| name.index + 1)
            .max()
            .unwrap_or(0);
        Ok(names.len().max(after_highest))
    }

    /// Select an archive by commit and index (0 = newest)
    pub fn find_snapshot(&self, commit: &str, index: usize) -> Result<PathBuf> {
        let names = self.names_for_commit(commit)?;
        if names.is_empty() {
            return Err(IgnoregretsError::SnapshotNotFound {
                commit: commit.to_string(),
            });
        }
        let available = names.len();
        let name = names.into_iter().nth(index).ok_or_else(|| {
            IgnoregretsError::SnapshotIndexOutOfRange {
                commit: commit.to_string(),
                index,
                available,
            }
        })?;
        Ok(self.dir.join(name))
    }

    /// Newest archive of `commit`
    pub fn latest(&self, commit: &str) -> Result<PathBuf> {
        self.find_snapshot(commit, 0)
    }

    /// Decode only the manifest of an archive
    pub fn read_manifest<P: AsRef<Path>>(&self, path: P) -> Result<Manifest> {
        archive::read_manifest(path)
    }

    /// Every archive with a readable manifest, by commit, timestamp and index
    pub fn list(&self) -> Result<Vec<SnapshotListing>> {
        let mut listings = Vec::new();
        for file_name in self.archive_names()? {
            let path = self.dir.join(&file_name);
            let manifest = match archive::read_manifest(&path) {
                Ok(manifest) => manifest,
                Err(e) => {
                    warn!(file = %file_name, error = %e, "failed to read manifest, skipping");
                    continue;
                }
            };
            let size_bytes = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
            listings.push(SnapshotListing {
                file_name,
                path,
                size_bytes,
                manifest,
            });
        }

        listings.sort_by(|a, b| {
            a.manifest
                .commit_hash
                .cmp(&b.manifest.commit_hash)
                .then(a.manifest.timestamp.cmp(&b.manifest.timestamp))
                .then(a.manifest.index.cmp(&b.manifest.index))
        });
        Ok(listings)
    }

    /// Create the archive file for a new snapshot of `commit`
    ///
    /// The index starts at [`next_index`](Self::next_index). The file is
    /// created exclusively; if the name is taken, the next index is tried.
    pub fn reserve(&self, commit: &str, timestamp: DateTime<Utc>) -> Result<(SnapshotName, File)> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            IgnoregretsError::storage(format!(
                "Failed to create directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let first = self.next_index(commit)?;
        for index in first..first + MAX_RESERVE_ATTEMPTS {
            let name = SnapshotName::new(commit, timestamp, index);
            let path = self.dir.join(name.file_name());
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => {
                    debug!(path = %path.display(), "reserved snapshot file");
                    return Ok((name, file));
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "snapshot name taken, trying next index");
                }
                Err(e) => {
                    return Err(IgnoregretsError::storage(format!(
                        "Failed to create snapshot file {}: {}",
                        path.display(),
                        e
                    )))
                }
            }
        }

        Err(IgnoregretsError::storage(format!(
            "Failed to reserve a snapshot name for commit {commit}"
        )))
    }

    /// Keep the newest `retention` archives of every commit, delete the rest
    ///
    /// The first failed deletion aborts the prune; files deleted before it
    /// stay deleted.
    pub fn prune(&self, retention: usize) -> Result<PruneReport> {
        if retention < 1 {
            return Err(IgnoregretsError::validation(format!(
                "retention must be greater than 0, got {retention}"
            )));
        }

        let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for name in self.archive_names()? {
            if let Some(commit) = commit_prefix(&name) {
                groups.entry(commit.to_string()).or_default().push(name);
            }
        }

        let mut report = PruneReport::default();
        for (commit, mut names) in groups {
            if names.len() <= retention {
                continue;
            }
            names.sort_unstable_by(|a, b| b.cmp(a));
            info!(commit = %commit, keep = retention, total = names.len(), "pruning snapshots");
            for name in names.split_off(retention) {
                let path = self.dir.join(&name);
                fs::remove_file(&path).map_err(|e| {
                    IgnoregretsError::storage(format!("Failed to delete snapshot {name}: {e}"))
                })?;
                info!(file = %name, "deleted snapshot");
                report.deleted.entry(commit.clone()).or_default().push(name);
            }
        }
        Ok(report)
    }
}
