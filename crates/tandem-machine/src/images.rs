//! Image file loading with content digests.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{MachineError, Result};

/// A raw binary image read from disk.
#[derive(Debug, Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub data: Vec<u8>,
    /// Lower-case hex SHA-256 of the file contents.
    pub digest: String,
}

impl LoadedImage {
    pub fn len(&self) -> u64 {
        self.data.len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Read a flat binary image, tagging failures with the boot stage that
/// requested it.
pub fn load_image(stage: &'static str, path: &Path) -> Result<LoadedImage> {
    if !path.is_file() {
        return Err(MachineError::ImageNotFound {
            stage,
            path: path.to_path_buf(),
        });
    }
    let data = fs::read(path).map_err(|source| MachineError::ImageRead {
        stage,
        path: path.to_path_buf(),
        source,
    })?;
    let digest = sha256_hex(&data);
    Ok(LoadedImage {
        path: path.to_path_buf(),
        data,
        digest,
    })
}

/// Lower-case hex SHA-256 digest of a byte slice.
pub fn sha256_hex(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut out = String::with_capacity(digest.len() * 2);
    for byte in digest {
        // Writing to a String cannot fail.
        let _ = write!(out, "{byte:02x}");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_image_reads_bytes_and_digest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fw.bin");
        fs::write(&path, b"abc").unwrap();

        let image = load_image("firmware", &path).unwrap();
        assert_eq!(image.data, b"abc");
        assert_eq!(image.len(), 3);
        // Known SHA-256 of "abc".
        assert_eq!(
            image.digest,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn missing_image_names_the_stage() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_image("kernel", &dir.path().join("nope.bin")).unwrap_err();
        match err {
            MachineError::ImageNotFound { stage, .. } => assert_eq!(stage, "kernel"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn directory_is_not_an_image() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_image("firmware", dir.path()),
            Err(MachineError::ImageNotFound { .. })
        ));
    }
}
