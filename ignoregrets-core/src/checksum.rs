/*!
SHA-256 content digests for archived files.
*/

use crate::{IgnoregretsError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Length of a hex-encoded SHA-256 digest
pub const DIGEST_HEX_LEN: usize = 64;

/// Compute the SHA-256 hash of the provided data
///
/// # Returns
/// Lowercase hexadecimal string representation of the hash
pub fn digest_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Compute the SHA-256 hash of a file, streaming its content
pub fn digest_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let file = File::open(path.as_ref())?;
    let mut reader = HashingReader::new(file);
    io::copy(&mut reader, &mut io::sink())?;
    Ok(reader.finalize())
}

/// Check that a stored checksum is a well-formed digest before comparing against it
pub fn validate_digest(digest: &str) -> Result<()> {
    let well_formed = digest.len() == DIGEST_HEX_LEN
        && digest
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if well_formed {
        Ok(())
    } else {
        Err(IgnoregretsError::validation(format!(
            "malformed checksum: {digest:?}"
        )))
    }
}

/// Reader adapter that hashes every byte passing through it
///
/// Lets the archive writer stream a file into the tar body and the
/// digest accumulator in a single pass.
pub struct HashingReader<R> {
    inner: R,
    hasher: Sha256,
    bytes_read: u64,
}

impl<R: Read> HashingReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
            bytes_read: 0,
        }
    }

    /// Number of bytes hashed so far
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Consume the reader and return the hex digest of everything read
    pub fn finalize(self) -> String {
        format!("{:x}", self.hasher.finalize())
    }
}

impl<R: Read> Read for HashingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.hasher.update(&buf[..n]);
        self.bytes_read += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_digest_bytes() {
        // SHA-256 of "test data" should be consistent
        assert_eq!(
            digest_bytes(b"test data"),
            "916f0027a575074ce72a331777c3478d6513f786a591bd892da1a577bf2335f9"
        );
    }

    #[test]
    fn test_hashing_reader_matches_digest_bytes() {
        let data = b"streamed through the archive body".repeat(100);
        let mut reader = HashingReader::new(&data[..]);
        let mut sink = Vec::new();
        reader.read_to_end(&mut sink).unwrap();

        assert_eq!(sink, data);
        assert_eq!(reader.bytes_read(), data.len() as u64);
        assert_eq!(reader.finalize(), digest_bytes(&data));
    }

    #[test]
    fn test_digest_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join(".env");
        std::fs::write(&path, b"SECRET=1").unwrap();

        assert_eq!(digest_file(&path).unwrap(), digest_bytes(b"SECRET=1"));
        assert!(digest_file(temp_dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_validate_digest() {
        assert!(validate_digest(&digest_bytes(b"x")).is_ok());
        assert!(validate_digest("abc").is_err());
        assert!(validate_digest(&"G".repeat(DIGEST_HEX_LEN)).is_err());
        assert!(validate_digest(&"A".repeat(DIGEST_HEX_LEN)).is_err());
    }
}
