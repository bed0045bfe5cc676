/*!
Snapshot manifest management and schema definition.
*/

use crate::{checksum, config::Settings, IgnoregretsError, Result};
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current manifest format version for compatibility tracking
pub const MANIFEST_FORMAT_VERSION: u8 = 1;

fn default_format_version() -> u8 {
    MANIFEST_FORMAT_VERSION
}

/// Metadata record describing one snapshot: its identity, file checksums and provenance
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Manifest {
    /// Format version for compatibility (current: 1)
    #[serde(default = "default_format_version")]
    pub format_version: u8,

    /// Revision the snapshot is bound to
    #[serde(rename = "commit")]
    pub commit_hash: String,

    /// Creation time, UTC, whole seconds
    pub timestamp: DateTime<Utc>,

    /// Ordinal among the snapshots of the same commit (0, 1, 2, ...)
    pub index: usize,

    /// Relative path -> SHA-256 of the archived content
    pub files: BTreeMap<String, String>,

    /// Settings in effect when the snapshot was taken
    #[serde(rename = "config")]
    pub effective_config: Settings,
}

impl Manifest {
    /// Create a manifest with no files, stamped with the current time
    ///
    /// # Example
    /// ```rust
    /// use ignoregrets_core::{Manifest, Settings};
    ///
    /// let manifest = Manifest::new("abc123", 0, Settings::default());
    /// assert_eq!(manifest.commit_hash, "abc123");
    /// assert!(manifest.files.is_empty());
    /// ```
    pub fn new<S: Into<String>>(commit_hash: S, index: usize, effective_config: Settings) -> Self {
        Self {
            format_version: MANIFEST_FORMAT_VERSION,
            commit_hash: commit_hash.into(),
            timestamp: Utc::now().trunc_subsecs(0),
            index,
            files: BTreeMap::new(),
            effective_config,
        }
    }

    /// Override the creation time (truncated to whole seconds)
    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp.trunc_subsecs(0);
        self
    }

    /// Record the checksum of an archived file
    pub fn record_file<S: Into<String>>(&mut self, path: S, checksum: String) {
        self.files.insert(path.into(), checksum);
    }

    /// Number of data files described by the manifest
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Verify data against the checksum stored for `path`
    pub fn verify_file(&self, path: &str, data: &[u8]) -> Result<()> {
        self.verify_digest(path, &checksum::digest_bytes(data))
    }

    /// Compare an already computed digest against the one stored for `path`
    pub fn verify_digest(&self, path: &str, actual: &str) -> Result<()> {
        let expected = self.files.get(path).ok_or_else(|| {
            IgnoregretsError::invalid_format(format!("{path} is not listed in the manifest"))
        })?;
        if expected == actual {
            Ok(())
        } else {
            Err(IgnoregretsError::IntegrityCheckFailed {
                path: path.to_string(),
                expected: expected.clone(),
                actual: actual.to_string(),
            })
        }
    }

    /// Validate that all required fields are properly set
    pub fn validate(&self) -> Result<()> {
        if self.commit_hash.is_empty() {
            return Err(IgnoregretsError::validation("commit cannot be empty"));
        }
        if !self.is_compatible() {
            return Err(IgnoregretsError::invalid_format(format!(
                "Incompatible manifest format version: {} (current: {})",
                self.format_version, MANIFEST_FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Check if this manifest is compatible with the current format version
    pub fn is_compatible(&self) -> bool {
        self.format_version <= MANIFEST_FORMAT_VERSION
    }

    /// Serialize to the JSON stored in the archive
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decode the JSON stored in the archive
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let manifest: Manifest = serde_json::from_slice(data)
            .map_err(|e| IgnoregretsError::ManifestDecode(e.to_string()))?;
        manifest
            .validate()
            .map_err(|e| IgnoregretsError::ManifestDecode(e.to_string()))?;
        Ok(manifest)
    }
}
