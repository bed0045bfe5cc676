/*!
Restore engine.

Unpacks a snapshot into the working tree. The manifest is decoded first and
must be bound to the requested commit; only then is the archive read again
for its file entries. A restore without `force` never replaces an existing
path, and a dry run touches nothing while reporting the same actions a real
run would take.
*/

use crate::{
    archive,
    checksum::HashingReader,
    store::SnapshotStore,
    IgnoregretsError, Manifest, Result,
};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Which snapshot to restore and how
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    pub commit: String,
    /// 0 = newest snapshot of the commit
    pub index: usize,
    /// Replace files that already exist
    pub force: bool,
    /// Report actions without touching the filesystem
    pub dry_run: bool,
}

impl RestoreRequest {
    /// Restore the newest snapshot of `commit`, no overwrite, not a dry run
    pub fn new<S: Into<String>>(commit: S) -> Self {
        Self {
            commit: commit.into(),
            index: 0,
            force: false,
            dry_run: false,
        }
    }

    pub fn index(mut self, index: usize) -> Self {
        self.index = index;
        self
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

/// What happens to one archived file
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RestoreAction {
    /// Written to the working tree
    Restore,
    /// Left alone because the destination already exists
    Skip,
}

impl fmt::Display for RestoreAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreAction::Restore => write!(f, "restore"),
            RestoreAction::Skip => write!(f, "skip"),
        }
    }
}

/// Action taken (or planned) for one path
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RestoreOutcome {
    pub path: String,
    pub action: RestoreAction,
}

/// Result of a restore or a dry run
#[derive(Debug, Clone)]
pub struct RestoreReport {
    pub snapshot: PathBuf,
    pub dry_run: bool,
    pub outcomes: Vec<RestoreOutcome>,
}

impl RestoreReport {
    fn record(&mut self, path: String, action: RestoreAction) {
        self.outcomes.push(RestoreOutcome { path, action });
    }

    fn paths_with(&self, action: RestoreAction) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.action == action)
            .map(|o| o.path.as_str())
            .collect()
    }

    /// Paths restored (or that would be restored in a dry run)
    pub fn restored(&self) -> Vec<&str> {
        self.paths_with(RestoreAction::Restore)
    }

    /// Paths skipped because they already exist
    pub fn skipped(&self) -> Vec<&str> {
        self.paths_with(RestoreAction::Skip)
    }
}

/// Restore the snapshot selected by `request` into `root`
///
/// # Errors
/// * `IgnoregretsError::SnapshotNotFound` / `SnapshotIndexOutOfRange` - no such snapshot
/// * `IgnoregretsError::CommitMismatch` - the manifest names another commit; nothing is written
/// * `IgnoregretsError::IntegrityCheckFailed` - restored content does not match its checksum
/// * `IgnoregretsError::Storage` - a file could not be written; earlier files stay restored
pub fn restore(store: &SnapshotStore, root: &Path, request: &RestoreRequest) -> Result<RestoreReport> {
    let snapshot = store.find_snapshot(&request.commit, request.index)?;
    let manifest = archive::read_manifest(&snapshot)?;
    if manifest.commit_hash != request.commit {
        return Err(IgnoregretsError::CommitMismatch {
            expected: request.commit.clone(),
            actual: manifest.commit_hash,
        });
    }

    info!(
        snapshot = %snapshot.display(),
        files = manifest.file_count(),
        force = request.force,
        dry_run = request.dry_run,
        "restoring snapshot"
    );

    let mut report = RestoreReport {
        snapshot: snapshot.clone(),
        dry_run: request.dry_run,
        outcomes: Vec::with_capacity(manifest.file_count()),
    };

    archive::read_entries(&snapshot, |entry| {
        if !manifest.files.contains_key(&entry.path) {
            return Err(IgnoregretsError::invalid_format(format!(
                "{} is not listed in the manifest",
                entry.path
            )));
        }

        let dest = root.join(&entry.path);
        let planned = plan(&dest, request.force);

        if request.dry_run {
            match planned {
                RestoreAction::Restore => info!(path = %entry.path, "would restore"),
                RestoreAction::Skip => info!(path = %entry.path, "would skip existing file"),
            }
            report.record(entry.path, planned);
            return Ok(());
        }

        let action = match planned {
            RestoreAction::Skip => RestoreAction::Skip,
            RestoreAction::Restore => write_entry(
                &dest,
                &entry.path,
                entry.mode,
                entry.body,
                &manifest,
                request.force,
            )?,
        };
        match action {
            RestoreAction::Restore => info!(path = %entry.path, "restored"),
            RestoreAction::Skip => info!(path = %entry.path, "skipping existing file"),
        }
        report.record(entry.path, action);
        Ok(())
    })?;

    Ok(report)
}

/// Decode the whole snapshot at `path` and check every entry against the manifest
///
/// # Errors
/// * `IgnoregretsError::IntegrityCheckFailed` - an entry's content does not match its checksum
/// * `IgnoregretsError::InvalidFormat` - entries missing from, absent in, or duplicated against the manifest
pub fn verify_snapshot<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let mut seen = BTreeSet::new();
    let mut digests = Vec::new();

    let manifest = archive::read_entries(path.as_ref(), |entry| {
        let mut reader = HashingReader::new(entry.body);
        io::copy(&mut reader, &mut io::sink()).map_err(|e| {
            IgnoregretsError::archive(format!("failed to read {}", entry.path), e)
        })?;
        if !seen.insert(entry.path.clone()) {
            return Err(IgnoregretsError::invalid_format(format!(
                "duplicate entry in archive: {}",
                entry.path
            )));
        }
        digests.push((entry.path, reader.finalize()));
        Ok(())
    })?;

    for (entry_path, digest) in &digests {
        manifest.verify_digest(entry_path, digest)?;
    }
    if let Some(missing) = manifest.files.keys().find(|p| !seen.contains(*p)) {
        return Err(IgnoregretsError::invalid_format(format!(
            "{missing} is listed in the manifest but not archived"
        )));
    }

    debug!(path = %path.as_ref().display(), files = digests.len(), "snapshot verified");
    Ok(manifest)
}

fn plan(dest: &Path, force: bool) -> RestoreAction {
    // symlink_metadata so a dangling link still counts as an existing path
    if !force && fs::symlink_metadata(dest).is_ok() {
        RestoreAction::Skip
    } else {
        RestoreAction::Restore
    }
}

fn write_entry(
    dest: &Path,
    rel_path: &str,
    mode: u32,
    body: &mut dyn io::Read,
    manifest: &Manifest,
    force: bool,
) -> Result<RestoreAction> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            IgnoregretsError::storage(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    let mut options = OpenOptions::new();
    options.write(true);
    if force {
        // Never write through a link that may point outside the tree
        if fs::symlink_metadata(dest)
            .map(|m| m.file_type().is_symlink())
            .unwrap_or(false)
        {
            fs::remove_file(dest)?;
        }
        options.create(true).truncate(true);
    } else {
        options.create_new(true);
    }

    let mut file = match options.open(dest) {
        Ok(file) => file,
        Err(e) if !force && e.kind() == io::ErrorKind::AlreadyExists => {
            warn!(path = rel_path, "appeared during restore, leaving it untouched");
            return Ok(RestoreAction::Skip);
        }
        Err(e) => {
            return Err(IgnoregretsError::storage(format!(
                "Failed to create file {rel_path}: {e}"
            )))
        }
    };

    let mut reader = HashingReader::new(body);
    io::copy(&mut reader, &mut file)
        .map_err(|e| IgnoregretsError::storage(format!("Failed to write file {rel_path}: {e}")))?;
    apply_mode(&file, mode)
        .map_err(|e| IgnoregretsError::storage(format!("Failed to set mode of {rel_path}: {e}")))?;

    manifest.verify_digest(rel_path, &reader.finalize())?;
    Ok(RestoreAction::Restore)
}

#[cfg(unix)]
fn apply_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode & 0o7777))
}

#[cfg(not(unix))]
fn apply_mode(file: &File, mode: u32) -> io::Result<()> {
    let mut permissions = file.metadata()?.permissions();
    permissions.set_readonly(mode & 0o200 == 0);
    file.set_permissions(permissions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Settings, SnapshotEngine, StaticRevisionSource};
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn snapshot_of(root: &Path, files: &[(&str, &str)]) -> SnapshotEngine<StaticRevisionSource> {
        for (path, content) in files {
            write(root, path, content);
        }
        let paths = files.iter().map(|(p, _)| p.to_string()).collect();
        let engine = SnapshotEngine::new(StaticRevisionSource::new("abc123", paths), root);
        engine.create_snapshot(&Settings::default()).unwrap();
        for (path, _) in files {
            fs::remove_file(root.join(path)).unwrap();
        }
        engine
    }

    #[test]
    fn test_restore_into_empty_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let engine = snapshot_of(root, &[("build/out.txt", "x"), (".env", "y")]);
        fs::remove_dir_all(root.join("build")).unwrap();

        let report = engine.restore(&RestoreRequest::new("abc123")).unwrap();
        assert!(!report.dry_run);
        assert_eq!(report.restored().len(), 2);
        assert_eq!(fs::read_to_string(root.join("build/out.txt")).unwrap(), "x");
        assert_eq!(fs::read_to_string(root.join(".env")).unwrap(), "y");
    }

    #[test]
    fn test_no_clobber_without_force() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let engine = snapshot_of(root, &[("build/out.txt", "x"), (".env", "y")]);
        write(root, ".env", "local");

        let report = engine.restore(&RestoreRequest::new("abc123")).unwrap();
        assert_eq!(report.skipped(), vec![".env"]);
        assert_eq!(report.restored(), vec!["build/out.txt"]);
        assert_eq!(fs::read_to_string(root.join(".env")).unwrap(), "local");
        assert_eq!(fs::read_to_string(root.join("build/out.txt")).unwrap(), "x");

        let report = engine
            .restore(&RestoreRequest::new("abc123").force(true))
            .unwrap();
        assert_eq!(report.skipped().len(), 0);
        assert_eq!(fs::read_to_string(root.join(".env")).unwrap(), "y");
    }

    #[test]
    fn test_dry_run_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let engine = snapshot_of(root, &[("build/out.txt", "x"), (".env", "y")]);
        fs::remove_dir_all(root.join("build")).unwrap();
        write(root, ".env", "local");

        for force in [false, true] {
            let report = engine
                .restore(&RestoreRequest::new("abc123").force(force).dry_run(true))
                .unwrap();
            assert!(report.dry_run);
            assert!(!root.join("build").exists());
            assert_eq!(fs::read_to_string(root.join(".env")).unwrap(), "local");
            if force {
                assert!(report.skipped().is_empty());
            } else {
                assert_eq!(report.skipped(), vec![".env"]);
            }
        }
    }

    #[test]
    fn test_dry_run_predicts_real_run() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let engine = snapshot_of(root, &[("a.txt", "a"), ("b.txt", "b"), ("c/d.txt", "d")]);
        write(root, "b.txt", "changed");

        let preview = engine
            .restore(&RestoreRequest::new("abc123").dry_run(true))
            .unwrap();
        let actual = engine.restore(&RestoreRequest::new("abc123")).unwrap();
        assert_eq!(preview.outcomes, actual.outcomes);
    }

    #[test]
    fn test_commit_mismatch_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let engine = snapshot_of(root, &[(".env", "y")]);

        // Rename the archive so the selector finds it under another commit
        let original = engine.store().latest("abc123").unwrap();
        let renamed = engine
            .store()
            .dir()
            .join(original.file_name().unwrap().to_str().unwrap().replacen("abc123", "fff999", 1));
        fs::rename(&original, &renamed).unwrap();

        let result = engine.restore(&RestoreRequest::new("fff999"));
        assert!(matches!(result, Err(IgnoregretsError::CommitMismatch { .. })));
        assert!(!root.join(".env").exists());
    }

    #[test]
    fn test_unknown_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let engine = snapshot_of(temp_dir.path(), &[(".env", "y")]);
        assert!(matches!(
            engine.restore(&RestoreRequest::new("abc123").index(3)),
            Err(IgnoregretsError::SnapshotIndexOutOfRange { .. })
        ));
        assert!(matches!(
            engine.restore(&RestoreRequest::new("nope")),
            Err(IgnoregretsError::SnapshotNotFound { .. })
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_mode_is_restored() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "run.sh", "#!/bin/sh\n");
        fs::set_permissions(root.join("run.sh"), fs::Permissions::from_mode(0o751)).unwrap();
        let engine = SnapshotEngine::new(
            StaticRevisionSource::new("abc123", vec!["run.sh".to_string()]),
            root,
        );
        engine.create_snapshot(&Settings::default()).unwrap();
        fs::remove_file(root.join("run.sh")).unwrap();

        engine.restore(&RestoreRequest::new("abc123")).unwrap();
        let mode = fs::metadata(root.join("run.sh")).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o751);
    }

    #[test]
    fn test_failure_keeps_earlier_files() {
        use crate::{checksum::digest_bytes, ArchiveWriter, RepoLayout, SnapshotName};

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        let layout = RepoLayout::new(root);
        layout.ensure_dirs().unwrap();

        let mut manifest = Manifest::new("abc123", 0, Settings::default());
        manifest.record_file("a.txt", digest_bytes(b"good"));
        manifest.record_file("b.txt", digest_bytes(b"expected"));
        let name = SnapshotName::new("abc123", chrono::Utc::now(), 0);
        let file = File::create(layout.snapshots_dir().join(name.file_name())).unwrap();
        let mut writer = ArchiveWriter::new(file);
        writer.append_bytes("a.txt", 0o644, b"good").unwrap();
        writer.append_bytes("b.txt", 0o644, b"corrupted").unwrap();
        writer.finish(&manifest).unwrap();

        let store = SnapshotStore::new(layout.snapshots_dir());
        let err = restore(&store, root, &RestoreRequest::new("abc123")).unwrap_err();
        assert!(matches!(
            err,
            IgnoregretsError::IntegrityCheckFailed { ref path, .. } if path == "b.txt"
        ));
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "good");
    }

    #[test]
    fn test_verify_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let engine = snapshot_of(temp_dir.path(), &[("a.txt", "a"), ("b.txt", "b")]);
        let manifest = engine.verify("abc123", 0).unwrap();
        assert_eq!(manifest.file_count(), 2);
    }
}
