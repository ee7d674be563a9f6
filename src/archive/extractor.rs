//! # Archive Extractor
//!
//! Unpacks a submitted archive into a freshly created scratch directory.
//!
//! Only the zip container format is accepted; any other declared format fails
//! with [`UploadError::UnsupportedFormat`] before anything touches disk.
//! Entry names are checked with the zip crate's `enclosed_name` guard:
//! absolute paths and parent-traversal segments abort the extraction, so
//! nothing is ever written outside the scratch root.

use crate::error::{Result, UploadError};
use std::fs;
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;
use zip::ZipArchive;

/// The single accepted container format.
const ZIP_FORMAT: &str = "zip";

/// A uniquely named scratch directory owned by the upload that created it.
///
/// Deleted on drop, so every exit path of the pipeline (success, rejection,
/// fault) releases it without explicit cleanup calls.
#[derive(Debug)]
pub struct ScratchDir {
    dir: TempDir,
}

impl ScratchDir {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Eagerly delete, surfacing the I/O error instead of swallowing it in
    /// drop. Useful in tests; production paths rely on drop.
    pub fn close(self) -> Result<()> {
        self.dir.close().map_err(UploadError::from)
    }
}

/// Extract `archive_bytes` (declared as `declared_format`) into a new scratch
/// directory under `scratch_root`.
pub fn extract_archive(
    archive_bytes: &[u8],
    declared_format: &str,
    scratch_root: &Path,
) -> Result<ScratchDir> {
    if !declared_format.eq_ignore_ascii_case(ZIP_FORMAT) {
        return Err(UploadError::UnsupportedFormat(declared_format.to_string()));
    }

    fs::create_dir_all(scratch_root)?;
    let dir = TempDir::with_prefix_in("upload-", scratch_root)?;

    let mut archive = ZipArchive::new(Cursor::new(archive_bytes))?;
    let mut file_count: usize = 0;
    let mut total_bytes: u64 = 0;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        let relative: PathBuf = match entry.enclosed_name() {
            Some(p) => p,
            None => {
                return Err(UploadError::Archive(format!(
                    "archive entry {:?} escapes the extraction root",
                    entry.name()
                )));
            }
        };
        let target = dir.path().join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&target)?;
        total_bytes += io::copy(&mut entry, &mut out)?;
        file_count += 1;
    }

    debug!(
        files = file_count,
        bytes = total_bytes,
        scratch = %dir.path().display(),
        "extracted archive into scratch directory"
    );

    Ok(ScratchDir { dir })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, body) in entries {
            writer.start_file(name.to_string(), options).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn rejects_unknown_container_format() {
        let scratch = TempDir::new().unwrap();
        let err = extract_archive(b"irrelevant", "tar.gz", scratch.path()).unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedFormat(f) if f == "tar.gz"));
    }

    #[test]
    fn extracts_nested_entries() {
        let scratch = TempDir::new().unwrap();
        let bytes = zip_of(&[("a.job", "type=command\n"), ("inner/b.job", "type=command\n")]);
        let dir = extract_archive(&bytes, "zip", scratch.path()).unwrap();
        assert!(dir.path().join("a.job").is_file());
        assert!(dir.path().join("inner/b.job").is_file());
        assert_eq!(
            fs::read_to_string(dir.path().join("a.job")).unwrap(),
            "type=command\n"
        );
    }

    #[test]
    fn rejects_parent_traversal_entries() {
        let scratch = TempDir::new().unwrap();
        let bytes = zip_of(&[("../evil.txt", "nope")]);
        let err = extract_archive(&bytes, "zip", scratch.path()).unwrap_err();
        assert!(matches!(err, UploadError::Archive(_)));
        // Nothing escaped the scratch root.
        assert!(!scratch.path().parent().unwrap().join("evil.txt").exists());
    }

    #[test]
    fn corrupt_archive_is_an_archive_failure() {
        let scratch = TempDir::new().unwrap();
        let err = extract_archive(b"this is not a zip", "zip", scratch.path()).unwrap_err();
        assert!(matches!(err, UploadError::Archive(_)));
    }

    #[test]
    fn scratch_directory_is_removed_on_drop() {
        let scratch = TempDir::new().unwrap();
        let bytes = zip_of(&[("a.job", "type=command\n")]);
        let dir = extract_archive(&bytes, "zip", scratch.path()).unwrap();
        let path = dir.path().to_path_buf();
        assert!(path.exists());
        drop(dir);
        assert!(!path.exists());
    }
}
