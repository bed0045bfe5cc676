/*!
Main snapshot engine that orchestrates the snapshot and restore operations.

This module contains the core business logic for creating snapshots,
orchestrating the revision source, file filter, archive codec and snapshot
directory. Restoring, pruning and status comparison are exposed here too so a
command only needs one engine value.
*/

use crate::{
    archive::ArchiveWriter,
    config::{RepoLayout, Settings},
    filter::{self, FileFilter},
    restore::{self, RestoreReport, RestoreRequest},
    status::{self, StatusReport},
    store::{PruneReport, SnapshotListing, SnapshotStore},
    vcs::RevisionSource,
    IgnoregretsError, Manifest, Result,
};
use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Outcome of a successful snapshot
#[derive(Debug, Clone)]
pub struct SnapshotSummary {
    pub path: PathBuf,
    pub commit: String,
    pub index: usize,
    pub file_count: usize,
    pub compressed_size: u64,
}

/// Main engine for snapshot and restore operations
///
/// Generic over the [`RevisionSource`] so tests and scripted callers can
/// supply a fixed revision and file listing instead of running `git`.
///
/// # Example
/// ```rust,no_run
/// use ignoregrets_core::{GitCli, RestoreRequest, Settings, SnapshotEngine};
///
/// let engine = SnapshotEngine::new(GitCli::new("."), ".");
/// let settings = Settings::default();
///
/// let summary = engine.create_snapshot(&settings)?;
/// let report = engine.restore(&RestoreRequest::new(summary.commit).dry_run(true))?;
/// # Ok::<(), ignoregrets_core::IgnoregretsError>(())
/// ```
pub struct SnapshotEngine<V: RevisionSource> {
    vcs: V,
    layout: RepoLayout,
    store: SnapshotStore,
}

impl<V: RevisionSource> SnapshotEngine<V> {
    /// Create an engine for the working tree at `root`
    pub fn new<P: Into<PathBuf>>(vcs: V, root: P) -> Self {
        let layout = RepoLayout::new(root.into());
        let store = SnapshotStore::new(layout.snapshots_dir());
        Self { vcs, layout, store }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn layout(&self) -> &RepoLayout {
        &self.layout
    }

    pub fn revision_source(&self) -> &V {
        &self.vcs
    }

    /// Current revision, from the revision source
    pub fn current_revision(&self) -> Result<String> {
        self.vcs.current_revision()
    }

    /// Create a snapshot of the eligible ignored files for the current revision
    ///
    /// This method:
    /// 1. Reads the current revision (fails outside a repository)
    /// 2. Gathers candidates: ignored paths plus literal include paths
    /// 3. Filters them and drops anything that is not a regular file
    /// 4. Reserves `<commit>_<timestamp>_<index>.tar.gz`
    /// 5. Streams every file and the manifest into the archive
    ///
    /// # Errors
    /// * `IgnoregretsError::NotARepository` / `Vcs` - no revision available
    /// * `IgnoregretsError::NothingToSnapshot` - filtering left no files
    /// * `IgnoregretsError::Io` / `Archive` - reading a file or writing the archive failed
    pub fn create_snapshot(&self, settings: &Settings) -> Result<SnapshotSummary> {
        let commit = self.vcs.current_revision()?;
        let files = self.eligible_files(settings)?;
        if files.is_empty() {
            return Err(IgnoregretsError::NothingToSnapshot);
        }

        let mut manifest = Manifest::new(&commit, 0, settings.clone());
        let (name, file) = self.store.reserve(&commit, manifest.timestamp)?;
        manifest.index = name.index;
        let path = self.store.dir().join(name.file_name());

        info!(
            commit = %commit,
            index = name.index,
            files = files.len(),
            path = %path.display(),
            "creating snapshot"
        );

        let written = self.write_archive(file, &files, &mut manifest);
        if let Err(e) = written {
            if let Err(cleanup) = fs::remove_file(&path) {
                warn!(path = %path.display(), error = %cleanup, "failed to remove partial snapshot");
            }
            return Err(e);
        }

        let compressed_size = fs::metadata(&path)?.len();
        info!(path = %path.display(), bytes = compressed_size, "snapshot written");

        Ok(SnapshotSummary {
            path,
            commit,
            index: name.index,
            file_count: manifest.file_count(),
            compressed_size,
        })
    }

    /// Restore a snapshot into the working tree
    pub fn restore(&self, request: &RestoreRequest) -> Result<RestoreReport> {
        restore::restore(&self.store, self.layout.root(), request)
    }

    /// Delete all but the newest `retention` snapshots of every commit
    pub fn prune(&self, retention: usize) -> Result<PruneReport> {
        self.store.prune(retention)
    }

    /// All snapshots on disk
    pub fn list(&self) -> Result<Vec<SnapshotListing>> {
        self.store.list()
    }

    /// Manifest of the selected snapshot
    pub fn inspect(&self, commit: &str, index: usize) -> Result<Manifest> {
        let path = self.store.find_snapshot(commit, index)?;
        self.store.read_manifest(path)
    }

    /// Re-hash every entry of the selected snapshot against its manifest
    pub fn verify(&self, commit: &str, index: usize) -> Result<Manifest> {
        let path = self.store.find_snapshot(commit, index)?;
        restore::verify_snapshot(path)
    }

    /// Compare the current eligible files with the latest snapshot of the current revision
    pub fn status(&self, settings: &Settings) -> Result<StatusReport> {
        let commit = self.vcs.current_revision()?;
        let path = self.store.latest(&commit)?;
        let manifest = self.store.read_manifest(&path)?;
        let files = self.eligible_files(settings)?;
        status::compare(self.layout.root(), &files, &manifest)
    }

    /// Candidate paths after state-dir removal, filtering and the regular-file check
    pub fn eligible_files(&self, settings: &Settings) -> Result<Vec<String>> {
        let mut candidates: Vec<String> = self
            .vcs
            .ignored_paths()?
            .into_iter()
            .filter(|p| !filter::is_state_path(p))
            .collect();

        for pattern in settings.include.iter().filter(|p| filter::is_literal_pattern(p)) {
            if !filter::is_state_path(pattern) && self.layout.root().join(pattern).is_file() {
                candidates.push(pattern.clone());
            }
        }

        let filtered = FileFilter::new(&settings.exclude, &settings.include).apply(&candidates);
        debug!(
            candidates = candidates.len(),
            kept = filtered.len(),
            "filtered candidate files"
        );

        let mut files = Vec::with_capacity(filtered.len());
        for path in filtered {
            match fs::symlink_metadata(self.layout.root().join(&path)) {
                Ok(meta) if meta.file_type().is_file() => files.push(path),
                Ok(_) => warn!(path = %path, "not a regular file, skipping"),
                Err(e) => warn!(path = %path, error = %e, "cannot stat file, skipping"),
            }
        }
        Ok(files)
    }

    fn write_archive(&self, file: fs::File, files: &[String], manifest: &mut Manifest) -> Result<()> {
        let mut writer = ArchiveWriter::new(BufWriter::new(file));
        for path in files {
            writer.append_file(self.layout.root(), path, manifest).map_err(|e| match e {
                IgnoregretsError::Io(io) => IgnoregretsError::archive(
                    format!("failed to add file to archive: {path}"),
                    io,
                ),
                other => other,
            })?;
        }
        writer
            .finish(manifest)?
            .into_inner()
            .map_err(|e| IgnoregretsError::archive("failed to flush snapshot", e.into_error()))?
            .sync_all()?;
        Ok(())
    }
}

/// Convenience function to create an engine backed by `git` in `root`
pub fn create_git_engine<P: Into<PathBuf>>(root: P) -> SnapshotEngine<crate::vcs::GitCli> {
    let root = root.into();
    SnapshotEngine::new(crate::vcs::GitCli::new(&root), root)
}
