use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// A regular file found under a root directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelativeFile {
    /// Absolute (or root-joined) path on disk.
    pub path: PathBuf,
    /// Path relative to the walked root, always `/`-separated.
    pub relative: String,
}

/// Collect every regular file below `root`, sorted by relative path.
///
/// Symlinks are not followed.
pub fn walk_files(root: &Path) -> std::io::Result<Vec<RelativeFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(std::io::Error::other)?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(std::io::Error::other)?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        files.push(RelativeFile {
            path: entry.path().to_path_buf(),
            relative,
        });
    }
    Ok(files)
}
