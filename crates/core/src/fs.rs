//! Filesystem utilities

use std::fs;
use std::io::Write;
use std::path::Path;

/// Atomically replace the file at `path` with `contents`.
///
/// Writes to a sibling temp file, fsyncs, then renames over the target.
/// A crash mid-write leaves either the old file or the new one, never a
/// torn mix.
pub fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| String::from("file"));
    let tmp_path = dir.join(format!(".{}.tmp-{}", file_name, std::process::id()));

    let mut tmp = fs::File::create(&tmp_path)?;
    tmp.write_all(contents)?;
    tmp.sync_all()?;
    drop(tmp);

    if let Err(e) = fs::rename(&tmp_path, path) {
        // Leave no stray temp file behind on failure
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    Ok(())
}
