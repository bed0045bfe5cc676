/*!
Archive codec for snapshot files.

A snapshot is a gzip-compressed tar stream holding one entry per archived
file followed by a single trailing `manifest.json` entry. Writing hashes each
file while it streams into the tar body; reading goes through one decoder
with a [`DecodeMode`] that either stops at the manifest or hands every data
entry to a visitor.
*/

use crate::{checksum::HashingReader, IgnoregretsError, Manifest, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Component, Path};
use tar::{Archive, Builder, EntryType, Header};
use tracing::debug;

/// Reserved entry name holding the serialized manifest
pub const MANIFEST_ENTRY_NAME: &str = "manifest.json";

/// Mode of the manifest entry
const MANIFEST_MODE: u32 = 0o644;

/// How much of an archive [`decode`] reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeMode {
    /// Stop at the manifest entry without touching file bodies
    ManifestOnly,
    /// Visit every data entry, then return the manifest
    Full,
}

/// One data entry handed to a [`decode`] visitor
pub struct DataEntry<'a> {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    /// Stored permission bits
    pub mode: u32,
    /// Content length in bytes
    pub size: u64,
    /// Entry content; unread bytes are skipped by the decoder
    pub body: &'a mut dyn Read,
}

/// Streaming writer producing a snapshot archive
///
/// # Example
/// ```rust,no_run
/// use ignoregrets_core::{ArchiveWriter, Manifest, Settings};
///
/// let file = std::fs::File::create("snapshot.tar.gz")?;
/// let mut manifest = Manifest::new("abc123", 0, Settings::default());
/// let mut writer = ArchiveWriter::new(file);
/// writer.append_file(std::path::Path::new("."), ".env", &mut manifest)?;
/// writer.finish(&manifest)?;
/// # Ok::<(), ignoregrets_core::IgnoregretsError>(())
/// ```
pub struct ArchiveWriter<W: Write> {
    builder: Builder<GzEncoder<W>>,
}

impl<W: Write> ArchiveWriter<W> {
    /// Create a writer with the default gzip level
    pub fn new(writer: W) -> Self {
        Self::with_level(writer, Compression::default())
    }

    /// Create a writer with an explicit gzip level
    pub fn with_level(writer: W, level: Compression) -> Self {
        Self {
            builder: Builder::new(GzEncoder::new(writer, level)),
        }
    }

    /// Stream `root/rel_path` into the archive and record its checksum in `manifest`
    pub fn append_file(
        &mut self,
        root: &Path,
        rel_path: &str,
        manifest: &mut Manifest,
    ) -> Result<()> {
        let full_path = root.join(rel_path);
        let file = File::open(&full_path)?;
        let metadata = file.metadata()?;

        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(metadata.len());
        header.set_mode(file_mode(&metadata));

        let mut reader = HashingReader::new(file.take(metadata.len()));
        self.builder
            .append_data(&mut header, rel_path, &mut reader)
            .map_err(|e| IgnoregretsError::archive(format!("failed to add {rel_path}"), e))?;

        if reader.bytes_read() != metadata.len() {
            return Err(IgnoregretsError::storage(format!(
                "{rel_path} changed size while being archived"
            )));
        }

        let digest = reader.finalize();
        debug!(path = rel_path, size = metadata.len(), checksum = %digest, "archived file");
        manifest.record_file(rel_path, digest);
        Ok(())
    }

    /// Append raw content under `path` without touching the manifest
    pub fn append_bytes(&mut self, path: &str, mode: u32, data: &[u8]) -> Result<()> {
        let mut header = Header::new_gnu();
        header.set_entry_type(EntryType::Regular);
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        self.builder
            .append_data(&mut header, path, data)
            .map_err(|e| IgnoregretsError::archive(format!("failed to add {path}"), e))
    }

    /// Append the manifest as the final entry and close the tar and gzip streams
    pub fn finish(mut self, manifest: &Manifest) -> Result<W> {
        let manifest_data = manifest.to_json()?;
        self.append_bytes(MANIFEST_ENTRY_NAME, MANIFEST_MODE, &manifest_data)?;

        let encoder = self
            .builder
            .into_inner()
            .map_err(|e| IgnoregretsError::archive("failed to finish tar stream", e))?;
        encoder
            .finish()
            .map_err(|e| IgnoregretsError::archive("failed to finish gzip stream", e))
    }
}

/// Decode an archive stream
///
/// In [`DecodeMode::ManifestOnly`] the visitor is never called. In
/// [`DecodeMode::Full`] it receives every entry except the manifest.
///
/// # Errors
/// * `IgnoregretsError::ManifestMissing` - no manifest entry in the archive
/// * `IgnoregretsError::ManifestDecode` - the manifest entry is not a valid manifest
/// * `IgnoregretsError::InvalidFormat` - an entry path escapes the repository root
/// * `IgnoregretsError::Archive` - the gzip or tar stream is corrupt
pub fn decode<R, F>(reader: R, mode: DecodeMode, mut visit: F) -> Result<Manifest>
where
    R: Read,
    F: FnMut(DataEntry<'_>) -> Result<()>,
{
    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|e| IgnoregretsError::archive("failed to read archive", e))?;

    let mut manifest = None;
    for entry in entries {
        let mut entry =
            entry.map_err(|e| IgnoregretsError::archive("failed to read tar header", e))?;
        let path = entry
            .path()
            .map_err(|e| IgnoregretsError::archive("failed to read entry path", e))?
            .to_string_lossy()
            .into_owned();

        if path == MANIFEST_ENTRY_NAME {
            let mut data = Vec::new();
            entry
                .read_to_end(&mut data)
                .map_err(|e| IgnoregretsError::archive("failed to read manifest", e))?;
            if manifest.is_none() {
                manifest = Some(Manifest::from_json(&data)?);
            }
            if mode == DecodeMode::ManifestOnly {
                break;
            }
            continue;
        }

        if mode == DecodeMode::ManifestOnly {
            continue;
        }

        check_entry_path(&path)?;
        let entry_mode = entry
            .header()
            .mode()
            .map_err(|e| IgnoregretsError::archive(format!("bad mode for {path}"), e))?;
        let size = entry.size();
        visit(DataEntry {
            path,
            mode: entry_mode,
            size,
            body: &mut entry,
        })?;
    }

    manifest.ok_or_else(|| IgnoregretsError::ManifestMissing("archive stream".to_string()))
}

/// Read only the manifest of the archive at `path`
pub fn read_manifest<P: AsRef<Path>>(path: P) -> Result<Manifest> {
    let path = path.as_ref();
    let file = File::open(path)?;
    decode(file, DecodeMode::ManifestOnly, |_| Ok(())).map_err(|e| with_archive_name(e, path))
}

/// Full pass over the archive at `path`
pub fn read_entries<P, F>(path: P, visit: F) -> Result<Manifest>
where
    P: AsRef<Path>,
    F: FnMut(DataEntry<'_>) -> Result<()>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    decode(file, DecodeMode::Full, visit).map_err(|e| with_archive_name(e, path))
}

fn with_archive_name(error: IgnoregretsError, path: &Path) -> IgnoregretsError {
    match error {
        IgnoregretsError::ManifestMissing(_) => {
            IgnoregretsError::ManifestMissing(path.display().to_string())
        }
        other => other,
    }
}

/// Reject entry paths that would land outside the restore root
fn check_entry_path(path: &str) -> Result<()> {
    let escapes = path.is_empty()
        || Path::new(path)
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(IgnoregretsError::invalid_format(format!(
            "unsafe entry path in archive: {path}"
        )));
    }
    Ok(())
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    if metadata.permissions().readonly() {
        0o444
    } else {
        0o644
    }
}
