//! Small filesystem helpers shared by the tasks.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::pipeline::BuildError;

/// Collect files under `root` accepted by `filter`, as paths relative to `root`.
///
/// A missing root yields an empty list. Results are sorted so that runs are
/// reproducible.
pub(crate) fn collect_files<F>(root: &Path, filter: F) -> Vec<PathBuf>
where
    F: Fn(&Path) -> bool,
{
    if !root.exists() {
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
        .filter(|rel| filter(rel))
        .collect();

    files.sort();
    files
}

/// True if the file name starts with `_`, the partial convention for
/// templates and stylesheets.
pub(crate) fn is_partial(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

/// Lowercased extension of `path`, or an empty string.
pub(crate) fn extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default()
}

/// Write `contents` to `path`, creating parent directories as needed.
pub(crate) fn write_file(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| BuildError::WriteError(format!("{}: {}", parent.display(), e)))?;
    }

    fs::write(path, contents).map_err(|e| BuildError::WriteError(format!("{}: {}", path.display(), e)))
}

/// Read a file into memory, mapping failures to [`BuildError::ReadError`].
pub(crate) fn read_file(path: &Path) -> Result<Vec<u8>, BuildError> {
    fs::read(path).map_err(|e| BuildError::ReadError(format!("{}: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn collects_relative_sorted_files() {
        let temp = tempdir().unwrap();
        fs::create_dir_all(temp.path().join("b")).unwrap();
        fs::write(temp.path().join("b/two.txt"), "2").unwrap();
        fs::write(temp.path().join("one.txt"), "1").unwrap();
        fs::write(temp.path().join("skip.md"), "x").unwrap();

        let files = collect_files(temp.path(), |p| extension(p) == "txt");

        assert_eq!(files, vec![PathBuf::from("b/two.txt"), PathBuf::from("one.txt")]);
    }

    #[test]
    fn missing_root_is_empty() {
        let temp = tempdir().unwrap();
        assert!(collect_files(&temp.path().join("nope"), |_| true).is_empty());
    }

    #[test]
    fn detects_partials() {
        assert!(is_partial(Path::new("nested/_header.jinja")));
        assert!(!is_partial(Path::new("_dir/index.jinja")));
    }
}
