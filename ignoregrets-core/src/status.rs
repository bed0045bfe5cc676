//! Comparison of the working tree against a snapshot manifest.

use crate::{checksum, Manifest, Result};
use std::collections::BTreeMap;
use std::path::Path;

/// A file whose content differs from the snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModifiedFile {
    pub path: String,
    pub snapshot_checksum: String,
    pub current_checksum: String,
}

/// Per-file differences between the working tree and a snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusReport {
    pub commit: String,
    pub unchanged: Vec<String>,
    pub modified: Vec<ModifiedFile>,
    pub added: Vec<String>,
    pub deleted: Vec<String>,
}

impl StatusReport {
    /// True when the working tree matches the snapshot exactly
    pub fn is_clean(&self) -> bool {
        self.modified.is_empty() && self.added.is_empty() && self.deleted.is_empty()
    }
}

/// Compare the files at `root/current_files` with `manifest`
///
/// `added` holds current paths the snapshot does not list at all; a path
/// present in both with a different checksum is only reported as modified.
pub fn compare<S: AsRef<str>>(
    root: &Path,
    current_files: &[S],
    manifest: &Manifest,
) -> Result<StatusReport> {
    let mut current = BTreeMap::new();
    for path in current_files {
        let path = path.as_ref();
        current.insert(path.to_string(), checksum::digest_file(root.join(path))?);
    }

    let mut report = StatusReport {
        commit: manifest.commit_hash.clone(),
        ..StatusReport::default()
    };

    for (path, snapshot_checksum) in &manifest.files {
        checksum::validate_digest(snapshot_checksum)?;
        match current.get(path) {
            None => report.deleted.push(path.clone()),
            Some(current_checksum) if current_checksum != snapshot_checksum => {
                report.modified.push(ModifiedFile {
                    path: path.clone(),
                    snapshot_checksum: snapshot_checksum.clone(),
                    current_checksum: current_checksum.clone(),
                })
            }
            Some(_) => report.unchanged.push(path.clone()),
        }
    }

    report.added = current
        .into_keys()
        .filter(|path| !manifest.files.contains_key(path))
        .collect();

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{checksum::digest_bytes, Settings};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_compare_all_categories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        fs::write(root.join("same.txt"), "same").unwrap();
        fs::write(root.join("changed.txt"), "new").unwrap();
        fs::write(root.join("fresh.txt"), "fresh").unwrap();

        let mut manifest = Manifest::new("abc123", 0, Settings::default());
        manifest.record_file("same.txt", digest_bytes(b"same"));
        manifest.record_file("changed.txt", digest_bytes(b"old"));
        manifest.record_file("gone.txt", digest_bytes(b"gone"));

        let report = compare(root, &["same.txt", "changed.txt", "fresh.txt"], &manifest).unwrap();
        assert_eq!(report.unchanged, vec!["same.txt"]);
        assert_eq!(report.modified.len(), 1);
        assert_eq!(report.modified[0].path, "changed.txt");
        assert_eq!(report.modified[0].current_checksum, digest_bytes(b"new"));
        assert_eq!(report.added, vec!["fresh.txt"]);
        assert_eq!(report.deleted, vec!["gone.txt"]);
        assert!(!report.is_clean());
    }

    #[test]
    fn test_modified_file_is_not_reported_as_added() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join(".env"), "B=2").unwrap();

        let mut manifest = Manifest::new("abc123", 0, Settings::default());
        manifest.record_file(".env", digest_bytes(b"A=1"));

        let report = compare(temp_dir.path(), &[".env"], &manifest).unwrap();
        assert!(report.added.is_empty());
        assert_eq!(report.modified.len(), 1);
    }

    #[test]
    fn test_clean_tree() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a"), "a").unwrap();
        let mut manifest = Manifest::new("abc123", 0, Settings::default());
        manifest.record_file("a", digest_bytes(b"a"));

        assert!(compare(temp_dir.path(), &["a"], &manifest).unwrap().is_clean());
    }

    #[test]
    fn test_malformed_snapshot_checksum() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a"), "a").unwrap();
        let mut manifest = Manifest::new("abc123", 0, Settings::default());
        manifest.record_file("a", "not-a-digest".to_string());

        let err = compare(temp_dir.path(), &["a"], &manifest).unwrap_err();
        assert!(err.to_string().contains("not-a-digest"));
    }
}
