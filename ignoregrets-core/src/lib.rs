/*!
# ignoregrets Core Engine

Snapshot and restore of files a repository deliberately does not track:
build outputs, local secrets, IDE state.

This crate provides:

- Gzip-compressed tar snapshots with a `manifest.json` of SHA-256 checksums
- Commit-bound snapshots, several per commit, selected newest-first
- Exclude/include glob filtering on file base names
- No-clobber restore with an optional force flag and a dry-run preview
- Per-commit retention pruning

## Architecture

- [`RevisionSource`] is the port to version control; [`GitCli`] runs `git`
- [`SnapshotStore`] owns the on-disk snapshot directory and its naming
- [`archive`] is the only code that knows the container format
- [`SnapshotEngine`] ties them together with the [`Settings`] passed in

## Usage

```rust,no_run
use ignoregrets_core::{create_git_engine, RepoLayout, RestoreRequest};

let engine = create_git_engine(".");
let settings = RepoLayout::new(".").load_settings()?;

// Save a snapshot for HEAD
let summary = engine.create_snapshot(&settings)?;

// Preview, then restore it without overwriting anything
let preview = engine.restore(&RestoreRequest::new(&summary.commit).dry_run(true))?;
let report = engine.restore(&RestoreRequest::new(&summary.commit))?;
# Ok::<(), ignoregrets_core::IgnoregretsError>(())
```
*/

pub mod archive;
pub mod checksum;
pub mod config;
pub mod error;
#[cfg(test)]
mod error_tests;
pub mod filter;
pub mod manifest;
#[cfg(test)]
mod manifest_tests;
pub mod observability;
pub mod restore;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod vcs;

pub use archive::{ArchiveWriter, DataEntry, DecodeMode, MANIFEST_ENTRY_NAME};
pub use config::{RepoLayout, Settings};
pub use error::{IgnoregretsError, Result};
pub use filter::{filter_paths, FileFilter};
pub use manifest::Manifest;
pub use restore::{RestoreAction, RestoreOutcome, RestoreReport, RestoreRequest};
pub use snapshot::{create_git_engine, SnapshotEngine, SnapshotSummary};
pub use status::{ModifiedFile, StatusReport};
pub use store::{PruneReport, SnapshotListing, SnapshotName, SnapshotStore};
pub use vcs::{GitCli, RevisionSource, StaticRevisionSource};
