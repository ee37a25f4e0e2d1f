//! Script copying.

use std::path::Path;

use crate::fsutil::{collect_files, extension, read_file, write_file};
use crate::pipeline::BuildError;

/// Mirror every `.js` file under `scripts_dir` into `js_dir`.
pub fn copy_scripts(scripts_dir: &Path, js_dir: &Path) -> Result<usize, BuildError> {
    let files = collect_files(scripts_dir, |rel| {
        matches!(extension(rel).as_str(), "js" | "mjs")
    });

    for rel in &files {
        let contents = read_file(&scripts_dir.join(rel))?;
        write_file(&js_dir.join(rel), contents)?;
    }

    Ok(files.len())
}
