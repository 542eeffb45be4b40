//! Packaging several local output directories into one upload bundle.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

use kargo_util::errors::{PublishError, PublishResult};
use tracing::{debug, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Write a zip at `dest` holding every file of every directory in `dirs`,
/// each stored at its path relative to its own directory.
///
/// When two directories contain the same relative path the later directory
/// wins. Returns the number of entries written.
pub fn write_bundle(dirs: &[PathBuf], dest: &Path) -> PublishResult<usize> {
    let mut entries: BTreeMap<String, PathBuf> = BTreeMap::new();
    for dir in dirs {
        let files = kargo_util::fs::walk_files(dir).map_err(|e| archive_err(dir, e))?;
        for file in files {
            if let Some(previous) = entries.insert(file.relative.clone(), file.path) {
                warn!(
                    entry = %file.relative,
                    replaced = %previous.display(),
                    "duplicate bundle entry, keeping the later directory's file"
                );
            }
        }
    }

    let out = File::create(dest).map_err(|e| archive_err(dest, e))?;
    let mut zip = ZipWriter::new(out);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, source) in &entries {
        zip.start_file(name.as_str(), options)
            .map_err(|e| archive_err(dest, e))?;
        let mut input = File::open(source).map_err(|e| archive_err(source, e))?;
        std::io::copy(&mut input, &mut zip).map_err(|e| archive_err(source, e))?;
    }
    zip.finish().map_err(|e| archive_err(dest, e))?;

    debug!(bundle = %dest.display(), entries = entries.len(), "wrote upload bundle");
    Ok(entries.len())
}

fn archive_err(path: &Path, e: impl std::fmt::Display) -> PublishError {
    PublishError::Archive {
        message: format!("{}: {e}", path.display()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn entry_names(path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    #[test]
    fn bundles_files_relative_to_each_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("A");
        let b = tmp.path().join("B");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(a.join("x.txt"), "x").unwrap();
        std::fs::write(a.join("y.txt"), "y").unwrap();
        std::fs::write(b.join("z.txt"), "z").unwrap();

        let dest = tmp.path().join("bundle.zip");
        let count = write_bundle(&[a.clone(), b.clone()], &dest).unwrap();
        assert_eq!(count, 3);
        assert_eq!(entry_names(&dest), vec!["x.txt", "y.txt", "z.txt"]);

        let again = tmp.path().join("again.zip");
        write_bundle(&[a, b], &again).unwrap();
        assert_eq!(entry_names(&again), entry_names(&dest));
    }

    #[test]
    fn nested_paths_use_forward_slashes() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("repo");
        let nested = dir.join("io/example/lib/1.0");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("lib-1.0.jar"), "jar").unwrap();

        let dest = tmp.path().join("bundle.zip");
        write_bundle(&[dir], &dest).unwrap();
        assert_eq!(entry_names(&dest), vec!["io/example/lib/1.0/lib-1.0.jar"]);
    }

    #[test]
    fn later_directory_wins_on_collision() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("A");
        let b = tmp.path().join("B");
        std::fs::create_dir_all(&a).unwrap();
        std::fs::create_dir_all(&b).unwrap();
        std::fs::write(a.join("same.txt"), "from a").unwrap();
        std::fs::write(b.join("same.txt"), "from b").unwrap();

        let dest = tmp.path().join("bundle.zip");
        assert_eq!(write_bundle(&[a, b], &dest).unwrap(), 1);

        let mut archive = zip::ZipArchive::new(File::open(&dest).unwrap()).unwrap();
        let mut content = String::new();
        archive
            .by_name("same.txt")
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "from b");
    }

    #[test]
    fn missing_directory_is_archive_error() {
        let tmp = tempfile::tempdir().unwrap();
        let err = write_bundle(&[tmp.path().join("nope")], &tmp.path().join("b.zip")).unwrap_err();
        assert!(matches!(err, PublishError::Archive { .. }));
    }
}
