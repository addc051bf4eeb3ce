//! Password-protected 7z archives holding a single kubeconfig

use std::io::Read;
use std::path::Path;

use sevenz_rust::{Password, SevenZReader};

use crate::error::{KubeError, Result};

/// Extract the only file of a password-protected 7z archive
///
/// Directory entries are ignored. An archive with more than one file is
/// rejected with `MultipleEntries`.
pub fn extract_single_file_archive(path: &Path, password: &str) -> Result<Vec<u8>> {
    if !path.exists() {
        return Err(KubeError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let mut reader =
        SevenZReader::open(path, Password::from(password)).map_err(KubeError::archive)?;

    let mut files: Vec<Vec<u8>> = Vec::new();
    let mut read_error = None;
    reader
        .for_each_entries(|entry, content| {
            if entry.is_directory() {
                return Ok(true);
            }
            let mut buf = Vec::new();
            if let Err(e) = content.read_to_end(&mut buf) {
                read_error = Some(e);
                return Ok(false);
            }
            files.push(buf);
            Ok(true)
        })
        .map_err(KubeError::archive)?;

    if let Some(e) = read_error {
        return Err(KubeError::archive(e));
    }

    match files.len() {
        1 => Ok(files.remove(0)),
        0 => Err(KubeError::archive("archive contains no files")),
        count => Err(KubeError::MultipleEntries { count }),
    }
}


#[cfg(test)]
mod tests {
    use super::testing::write_archive;
    use super::*;
    use tempfile::TempDir;

    const KUBECONFIG: &[u8] = b"apiVersion: v1\nkind: Config\nclusters: []\n";

    #[test]
    fn test_extract_single_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kubeconfig.enc.7z");
        write_archive(&path, "test123", &[("kubeconfig", KUBECONFIG)]);

        assert_eq!(extract_single_file_archive(&path, "test123").unwrap(), KUBECONFIG);
    }

    #[test]
    fn test_wrong_password() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kubeconfig.enc.7z");
        write_archive(&path, "test123", &[("kubeconfig", KUBECONFIG)]);

        assert!(matches!(
            extract_single_file_archive(&path, "wrong"),
            Err(KubeError::Archive { .. })
        ));
    }

    #[test]
    fn test_multiple_entries() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("two.7z");
        write_archive(&path, "test123", &[("a", KUBECONFIG), ("b", KUBECONFIG)]);

        assert!(matches!(
            extract_single_file_archive(&path, "test123"),
            Err(KubeError::MultipleEntries { count: 2 })
        ));
    }

    #[test]
    fn test_corrupt_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.7z");
        let mut bytes = crate::classify::SEVEN_ZIP_MAGIC.to_vec();
        bytes.extend_from_slice(&[0u8; 32]);
        std::fs::write(&path, bytes).unwrap();

        assert!(matches!(
            extract_single_file_archive(&path, "test123"),
            Err(KubeError::Archive { .. })
        ));
    }

    #[test]
    fn test_missing_archive() {
        assert!(matches!(
            extract_single_file_archive(Path::new("/nonexistent.7z"), "k"),
            Err(KubeError::NotFound { .. })
        ));
    }
}
