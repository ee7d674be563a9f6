//! Re-serializes a scratch directory into canonical archive bytes.
//!
//! Used when a validator rewrote or removed files: the stored artifact must
//! always reflect the post-validation state of the directory. Entries are
//! walked in sorted order so packing the same tree twice yields the same
//! byte sequence.

use crate::error::Result;
use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Pack the contents of `dir` (not the directory itself) into a zip archive.
pub fn pack_directory(dir: &Path) -> Result<Vec<u8>> {
    let mut entries = Vec::new();
    collect_files(dir, dir, &mut entries)?;
    entries.sort();

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for relative in entries {
        // Zip entry names use forward slashes regardless of platform.
        let name = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        writer.start_file(name, options)?;
        let bytes = fs::read(dir.join(&relative))?;
        writer.write_all(&bytes)?;
    }

    Ok(writer.finish()?.into_inner())
}

fn collect_files(root: &Path, current: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(current)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_files(root, &path, out)?;
        } else {
            let relative = path
                .strip_prefix(root)
                .expect("walked path is under the walk root")
                .to_path_buf();
            out.push(relative);
        }
    }
    Ok(())
}
