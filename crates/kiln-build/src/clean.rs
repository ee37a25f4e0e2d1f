//! Removal of generated output.
//!
//! Deletion is best-effort: anything that cannot be removed is logged and
//! skipped.

use std::fs;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

/// Deletes generated files under an output root while leaving preserved
/// subdirectories, and everything beneath them, in place.
pub struct Cleaner {
    output_dir: PathBuf,
    preserved: Vec<PathBuf>,
}

impl Cleaner {
    /// Create a cleaner. `preserved` are full paths under `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, preserved: Vec<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            preserved,
        }
    }

    /// Remove everything under the output root except the preserved
    /// directories. Returns the number of entries removed.
    pub fn clean(&self) -> usize {
        self.sweep(|_| true)
    }

    /// Remove every `.html` file outside the preserved directories.
    pub fn clean_html(&self) -> usize {
        self.sweep(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|e| e.eq_ignore_ascii_case("html"))
        })
    }

    /// Walk the output root, removing entries accepted by `select`. Preserved
    /// directories are never entered; a removed directory is not descended into.
    fn sweep<F>(&self, select: F) -> usize
    where
        F: Fn(&Path) -> bool,
    {
        if !self.output_dir.exists() {
            return 0;
        }

        let mut removed = 0;
        let mut walker = WalkDir::new(&self.output_dir).min_depth(1).into_iter();

        while let Some(entry) = walker.next() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Skipping unreadable output entry: {}", e);
                    continue;
                }
            };
            let path = entry.path();

            if self.is_preserved(path) {
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
                continue;
            }

            // Directories holding a preserved directory must stay
            if entry.file_type().is_dir() && self.contains_preserved(path) {
                continue;
            }

            if select(path) && remove(path) {
                removed += 1;
                if entry.file_type().is_dir() {
                    walker.skip_current_dir();
                }
            }
        }

        tracing::debug!("Removed {} entries from {}", removed, self.output_dir.display());
        removed
    }

    fn is_preserved(&self, path: &Path) -> bool {
        self.preserved.iter().any(|p| path.starts_with(p))
    }

    fn contains_preserved(&self, dir: &Path) -> bool {
        self.preserved.iter().any(|p| p.starts_with(dir))
    }
}

/// Remove every entry inside `dir`, keeping `dir` itself. Used for the image
/// output, which is itself a preserved directory.
pub fn clean_contents(dir: &Path) -> usize {
    let Ok(entries) = fs::read_dir(dir) else {
        return 0;
    };

    entries
        .filter_map(|e| e.ok())
        .filter(|e| remove(&e.path()))
        .count()
}

fn remove(path: &Path) -> bool {
    let result = if path.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn populate(root: &Path) -> Cleaner {
        for dir in ["css/maps", "js", "img/icons", "blog", "assets/css"] {
            fs::create_dir_all(root.join(dir)).unwrap();
        }
        for file in [
            "index.html",
            "blog/post.html",
            "robots.txt",
            "css/main.css",
            "css/maps/main.css.map",
            "css/legacy.html",
            "js/main.js",
            "img/photo.jpg",
            "img/icons/logo.png",
            "assets/css/theme.css",
        ] {
            fs::write(root.join(file), "x").unwrap();
        }

        Cleaner::new(
            root,
            vec![root.join("css"), root.join("js"), root.join("img")],
        )
    }

    #[test]
    fn clean_keeps_preserved_directories() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let cleaner = populate(root);

        cleaner.clean();

        assert!(!root.join("index.html").exists());
        assert!(!root.join("robots.txt").exists());
        assert!(!root.join("blog").exists());
        assert!(!root.join("assets").exists());
        for kept in [
            "css/main.css",
            "css/maps/main.css.map",
            "css/legacy.html",
            "js/main.js",
            "img/photo.jpg",
            "img/icons/logo.png",
        ] {
            assert!(root.join(kept).exists(), "{} was removed", kept);
        }
    }

    #[test]
    fn clean_html_only_touches_html() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        let cleaner = populate(root);

        assert_eq!(cleaner.clean_html(), 2);

        assert!(!root.join("index.html").exists());
        assert!(!root.join("blog/post.html").exists());
        assert!(root.join("robots.txt").exists());
        assert!(root.join("css/legacy.html").exists());
    }

    #[test]
    fn nested_preserved_directory_survives() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("static/css")).unwrap();
        fs::write(root.join("static/css/site.css"), "x").unwrap();
        fs::write(root.join("static/old.txt"), "x").unwrap();

        Cleaner::new(root, vec![root.join("static/css")]).clean();

        assert!(root.join("static/css/site.css").exists());
        assert!(!root.join("static/old.txt").exists());
    }

    #[test]
    fn clean_contents_empties_directory() {
        let temp = tempdir().unwrap();
        let root = temp.path();
        populate(root);

        assert_eq!(clean_contents(&root.join("img")), 2);
        assert!(root.join("img").exists());
        assert!(fs::read_dir(root.join("img")).unwrap().next().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn unremovable_entries_are_skipped() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("locked")).unwrap();
        fs::write(root.join("locked/keep.txt"), "x").unwrap();
        fs::write(root.join("index.html"), "x").unwrap();
        fs::write(root.join("robots.txt"), "x").unwrap();

        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o555)).unwrap();

        // Permission bits do not bind a privileged user
        if fs::write(locked.join("writable.txt"), "x").is_ok() {
            fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
            return;
        }

        let removed = Cleaner::new(root, vec![]).clean();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(removed, 2);
        assert!(!root.join("index.html").exists());
        assert!(!root.join("robots.txt").exists());
        assert!(root.join("locked/keep.txt").exists());
    }

    #[test]
    fn missing_output_is_noop() {
        let temp = tempdir().unwrap();
        let cleaner = Cleaner::new(temp.path().join("dest"), vec![]);
        assert_eq!(cleaner.clean(), 0);
        assert_eq!(clean_contents(&temp.path().join("dest/img")), 0);
    }
}
